use anyhow::{Context, Result};
use clap::Parser;
use kgrag::config::GenerationProvider;
use kgrag::experiment::{self, ExperimentResults, ExperimentRunner};
use kgrag::{Config, RagMethod};
use std::path::PathBuf;

/// Compare traditional RAG with knowledge-graph-augmented RAG.
#[derive(Parser, Debug)]
#[command(name = "kgrag", version)]
struct Args {
    /// Config file (default: $KGRAG_CONFIG or ./config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run offline: hashing embeddings and template answers, no API calls.
    #[arg(long)]
    demo: bool,

    /// Generation provider override.
    #[arg(long, value_parser = ["openai", "anthropic", "template"])]
    provider: Option<String>,

    /// Generation model override.
    #[arg(long)]
    model: Option<String>,

    /// Corpus directory or JSON file.
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Evaluation queries JSON file.
    #[arg(long)]
    queries: Option<PathBuf>,

    /// Output directory for results and report.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let _ = dotenv::dotenv();
            Config::from_path(path)?
        }
        None => Config::load()?,
    };

    if let Some(provider) = args.provider.as_deref() {
        config.generation.provider = match provider {
            "openai" => GenerationProvider::OpenAI,
            "anthropic" => GenerationProvider::Anthropic,
            _ => GenerationProvider::Template,
        };
        config.generation.api_key_env = None;
    }
    if args.model.is_some() {
        config.generation.model = args.model.clone();
    }
    if args.corpus.is_some() {
        config.experiment.corpus = args.corpus.clone();
    }
    if args.queries.is_some() {
        config.experiment.queries = args.queries.clone();
    }
    if let Some(output) = &args.output {
        config.experiment.output_dir = output.clone();
    }
    if args.demo {
        config = config.into_demo();
    }

    config.validate()?;
    Ok(config)
}

fn print_comparison(results: &ExperimentResults) {
    let row = |method: RagMethod| results.run(method).map(|r| r.aggregate.clone()).unwrap_or_default();
    let trad = row(RagMethod::Traditional);
    let graph = row(RagMethod::GraphAugmented);
    let winner = |m: Option<RagMethod>| m.map(|m| m.label()).unwrap_or("-");
    let cmp = &results.comparison;

    println!("\n=== Comparison ({} queries) ===\n", trad.num_queries);
    println!("{:-<92}", "");
    println!(
        "{:<25} {:>20} {:>22} {:>22}",
        "Metric", "Traditional RAG", "Graph-Augmented RAG", "Winner"
    );
    println!("{:-<92}", "");
    println!(
        "{:<25} {:>20.4} {:>22.4} {:>22}",
        "Semantic Similarity",
        trad.avg_semantic_similarity,
        graph.avg_semantic_similarity,
        winner(cmp.semantic_similarity)
    );
    println!(
        "{:<25} {:>20.4} {:>22.4} {:>22}",
        "Avg Response Time (s)",
        trad.avg_response_time,
        graph.avg_response_time,
        winner(cmp.response_time)
    );
    println!(
        "{:<25} {:>20.4} {:>22.4} {:>22}",
        "Avg Retrieval Score",
        trad.avg_fused_score,
        graph.avg_fused_score,
        winner(cmp.retrieval_score)
    );
    println!(
        "{:<25} {:>20.1} {:>22.1}",
        "Avg Response Length", trad.avg_response_length, graph.avg_response_length
    );
    println!("{:<25} {:>20} {:>22.1}", "Avg KG Entities Used", "-", graph.avg_entities_used);
    println!("{:-<92}", "");

    let failures = trad.generation_failures + graph.generation_failures;
    if failures > 0 {
        println!("\n{} answers failed to generate; see the log for details.", failures);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.experiment.log_level.as_str()),
    )
    .init();

    log::info!("Starting kgrag v{}", env!("CARGO_PKG_VERSION"));
    if args.demo {
        log::info!("Demo mode: offline embeddings and template answers");
    }

    let output_dir = config.experiment.output_dir.clone();
    let runner = ExperimentRunner::from_config(config)
        .await
        .context("Failed to initialise experiment")?;

    let stats = runner.context().graph.stats();
    println!(
        "Loaded {} documents, {} queries; knowledge graph has {} nodes and {} edges",
        runner.context().retriever.len(),
        runner.queries().len(),
        stats.num_nodes,
        stats.num_edges
    );

    let results = runner.run().await?;
    print_comparison(&results);

    let saved = experiment::save(&results, &output_dir)?;
    println!("\nResults saved to {}", saved.results.display());
    println!("Report saved to {}", saved.report.display());
    println!("HTML report saved to {}", saved.html.display());

    Ok(())
}
