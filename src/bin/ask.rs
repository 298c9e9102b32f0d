//! Answer one query and show the context bundle each method built for it.

use clap::Parser;
use kgrag::context::{ContextBundle, MitigationStatus};
use kgrag::corpus::{self, sample};
use kgrag::{AppContext, Config, RagMethod};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ask")]
struct Args {
    /// The question to answer.
    query: String,

    /// traditional, graph_augmented or both.
    #[arg(long, default_value = "both", value_parser = ["traditional", "graph_augmented", "both"])]
    method: String,

    /// Run offline: hashing embeddings and template answers.
    #[arg(long)]
    demo: bool,

    /// Corpus directory or JSON file (default: built-in sample).
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Print responses as JSON.
    #[arg(long)]
    json: bool,
}

fn print_bundle(bundle: &ContextBundle) {
    println!("Retrieved passages:");
    for p in &bundle.passages {
        let preview: String = p.text.chars().take(100).collect();
        println!("  {}. [{}] ({:.4}) {}", p.rank, p.id, p.score, preview);
    }

    if let Some(graph) = &bundle.graph {
        if graph.entities.is_empty() {
            println!("Knowledge graph: no entities matched");
        }
        for expansion in graph.expansions.values() {
            println!("Entity: {} ({})", expansion.name, expansion.kind);
            if let Some(desc) = &expansion.attributes.description {
                println!("  {}", desc);
            }
            for (name, reach) in expansion.related.iter().filter(|(_, r)| r.hops == 1) {
                if let Some(step) = reach.path.first() {
                    println!("  - {} {}", step.relation, name);
                }
            }
            match &expansion.mitigations {
                MitigationStatus::Found(routes) => {
                    for route in routes {
                        let effectiveness = route
                            .effectiveness
                            .map(|e| e.as_str())
                            .unwrap_or("unknown");
                        let hops = route
                            .path
                            .as_ref()
                            .map(|p| format!("{} hop(s)", p.hops()))
                            .unwrap_or_else(|| "no path".to_string());
                        println!("  mitigation: {} ({}, {})", route.mitigation, effectiveness, hops);
                    }
                }
                MitigationStatus::NoneFound => println!("  mitigation: none found"),
                MitigationStatus::NotApplicable => {}
            }
        }
        for omission in &graph.omissions {
            println!("Omitted: {} ({:?})", omission.entity, omission.reason);
        }
    }
    println!("Retrieval score: {:.4}", bundle.retrieval_score);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    if args.query.trim().is_empty() {
        anyhow::bail!("Query cannot be empty");
    }

    let mut config = Config::load()?;
    if args.demo {
        config = config.into_demo();
    }
    if args.corpus.is_some() {
        config.experiment.corpus = args.corpus.clone();
    }

    let documents = match &config.experiment.corpus {
        Some(path) => corpus::load_documents(path)?,
        None => sample::documents(),
    };
    let ctx = AppContext::build(config, documents).await?;

    let methods: Vec<RagMethod> = match args.method.as_str() {
        "traditional" => vec![RagMethod::Traditional],
        "graph_augmented" => vec![RagMethod::GraphAugmented],
        _ => RagMethod::ALL.to_vec(),
    };

    let mut responses = Vec::with_capacity(methods.len());
    for method in methods {
        responses.push(ctx.pipeline(method).answer(&args.query).await?);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&responses)?);
        return Ok(());
    }

    for response in &responses {
        println!("\n=== {} ===\n", response.method.label());
        print_bundle(&response.bundle);
        println!("\nAnswer ({:.2}s):\n{}", response.elapsed.as_secs_f64(), response.answer);
    }

    Ok(())
}
