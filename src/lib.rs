pub mod config;
pub mod error;
pub mod retry;
pub mod graph;
pub mod context;
pub mod embeddings;
pub mod retrieval;
pub mod generation;
pub mod corpus;
pub mod rag;
pub mod eval;
pub mod experiment;

pub use config::Config;
pub use error::{KgragError, Result};
pub use rag::{AppContext, RagMethod, RagPipeline, RagResponse};
