//! Knowledge graph statistics, entity lookup and export.

use clap::{Parser, Subcommand};
use kgrag::graph::{GraphStore, PathFinder};
use kgrag::rag::load_graph;
use kgrag::{Config, KgragError};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "graph")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Node/edge counts per type (default).
    Stats,
    /// Attributes, neighbours and mitigations of one entity.
    Show {
        name: String,
        #[arg(long, default_value_t = 1)]
        depth: usize,
    },
    /// Write the graph specification as JSON or YAML (by extension), or JSON to stdout.
    Export { output: Option<PathBuf> },
}

fn print_stats(graph: &GraphStore) {
    let stats = graph.stats();
    println!("\n=== Knowledge Graph ===\n");
    println!("{:<20} {:>8}", "Nodes", stats.num_nodes);
    println!("{:<20} {:>8}", "Edges", stats.num_edges);
    println!("{:<20} {:>8.2}", "Average degree", stats.avg_degree);
    println!("{:-<30}", "");
    for (kind, count) in &stats.node_types {
        println!("{:<20} {:>8}", kind.as_str(), count);
    }
}

fn show_entity(
    graph: Arc<GraphStore>,
    name: &str,
    depth: usize,
    max_path_depth: usize,
) -> anyhow::Result<()> {
    let node = graph.node(name)?;
    println!("{} ({})", node.name, node.kind());
    if let Some(desc) = &node.attributes.description {
        println!("  {}", desc);
    }

    let finder = PathFinder::new(graph.clone());
    let related = finder.related_entities(&node.name, depth)?;
    println!("\nRelated within {} hop(s):", depth);
    for (other, reach) in &related {
        let route: Vec<String> = reach
            .path
            .iter()
            .map(|s| {
                if s.reversed {
                    format!("{} <-{}- {}", s.from, s.relation, s.to)
                } else {
                    format!("{} -{}-> {}", s.from, s.relation, s.to)
                }
            })
            .collect();
        println!("  {} [{}]: {}", other, reach.hops, route.join(", "));
    }

    let mitigations = finder.find_mitigations(&node.name)?;
    if !mitigations.is_empty() {
        println!("\nMitigations:");
    }
    for mitigation in mitigations {
        match finder.mitigation_path(&mitigation, &node.name, max_path_depth) {
            Ok(path) => println!("  {} ({} hop(s)): {}", mitigation, path.hops(), path.nodes.join(" -> ")),
            Err(e @ KgragError::NoPathFound { .. }) => println!("  {} ({})", mitigation, e),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn export(graph: &GraphStore, output: Option<PathBuf>) -> anyhow::Result<()> {
    let spec = graph.to_spec();
    let Some(path) = output else {
        println!("{}", serde_json::to_string_pretty(&spec)?);
        return Ok(());
    };

    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml_ng::to_string(&spec)?,
        _ => serde_json::to_string_pretty(&spec)?,
    };
    std::fs::write(&path, content)?;
    println!(
        "Exported {} nodes and {} edges to {}",
        spec.nodes.len(),
        spec.edges.len(),
        path.display()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = Config::load()?;
    let graph = Arc::new(load_graph(&config)?);

    match args.command.unwrap_or(Command::Stats) {
        Command::Stats => print_stats(&graph),
        Command::Show { name, depth } => {
            show_entity(graph, &name, depth, config.graph.mitigation_max_depth)?
        }
        Command::Export { output } => export(&graph, output)?,
    }
    Ok(())
}
