use serde::Serialize;
use std::time::{Duration, Instant};

use super::AppContext;
use crate::context::{ContextBundle, RagMethod};
use crate::error::Result;

/// One generated answer with the context it was generated from.
#[derive(Debug, Clone, Serialize)]
pub struct RagResponse {
    pub query: String,
    pub method: RagMethod,
    pub answer: String,
    pub bundle: ContextBundle,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    /// The generator failed and `answer` carries the error text.
    pub generation_failed: bool,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Retrieval, optional graph expansion, fusion and generation for one method.
pub struct RagPipeline<'a> {
    ctx: &'a AppContext,
    method: RagMethod,
}

impl<'a> RagPipeline<'a> {
    pub fn new(ctx: &'a AppContext, method: RagMethod) -> Self {
        Self { ctx, method }
    }

    pub fn method(&self) -> RagMethod {
        self.method
    }

    /// Build the context bundle without generating. Graph lookups never fail
    /// the bundle; only retrieval errors propagate.
    pub async fn prepare(&self, query: &str) -> Result<ContextBundle> {
        let passages = self
            .ctx
            .retriever
            .retrieve(query, self.ctx.config.retrieval.top_k)
            .await?;

        let graph = match self.method {
            RagMethod::Traditional => None,
            RagMethod::GraphAugmented => Some(self.ctx.expander.expand(query, &passages)),
        };

        Ok(self.ctx.ranker.fuse(query, self.method, passages, graph))
    }

    /// Prepare and generate. A generation failure becomes the answer text
    /// and is flagged on the response.
    pub async fn answer(&self, query: &str) -> Result<RagResponse> {
        let start = Instant::now();
        let bundle = self.prepare(query).await?;

        let (answer, generation_failed) = match self.ctx.generator.generate(&bundle).await {
            Ok(text) => (text, false),
            Err(e) => {
                log::warn!("{} generation failed: {}", self.method.label(), e);
                (format!("Error generating response: {}", e), true)
            }
        };

        let elapsed = start.elapsed();
        log::debug!(
            "{} answered in {:?} ({} passages, {} entities)",
            self.method.label(),
            elapsed,
            bundle.passages.len(),
            bundle.entities_used()
        );

        Ok(RagResponse {
            query: query.to_string(),
            method: self.method,
            answer,
            bundle,
            elapsed,
            generation_failed,
        })
    }
}
