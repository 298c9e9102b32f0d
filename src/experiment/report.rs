//! Results file and Markdown report.

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::{ExperimentResults, QueryResult};
use crate::context::RagMethod;
use crate::error::Result;
use crate::eval::AggregateMetrics;

pub const RESULTS_FILE: &str = "experiment_results.json";
pub const REPORT_FILE: &str = "report.md";
pub const HTML_REPORT_FILE: &str = "report.html";

#[derive(Serialize)]
struct ResultsFile<'a> {
    run_id: String,
    timestamp: String,
    embedding_model: &'a str,
    generator: &'a str,
    num_documents: usize,
    graph: &'a crate::graph::GraphStats,
    methods: IndexMap<&'static str, MethodSummary<'a>>,
    comparison: &'a crate::eval::Comparison,
}

#[derive(Serialize)]
struct MethodSummary<'a> {
    label: &'static str,
    evaluation: &'a AggregateMetrics,
    avg_entities: f32,
    queries: &'a [QueryResult],
}

/// Paths written by [`save`].
#[derive(Debug, Clone)]
pub struct SavedReport {
    pub results: PathBuf,
    pub report: PathBuf,
    pub html: PathBuf,
}

/// Write the JSON results and the Markdown and HTML reports into `output_dir`.
pub fn save(results: &ExperimentResults, output_dir: &Path) -> Result<SavedReport> {
    std::fs::create_dir_all(output_dir)?;

    let file = ResultsFile {
        run_id: results.run_id.to_string(),
        timestamp: results.timestamp.to_rfc3339(),
        embedding_model: &results.embedding_model,
        generator: &results.generator,
        num_documents: results.num_documents,
        graph: &results.graph,
        methods: results
            .runs
            .iter()
            .map(|run| {
                (
                    run.method.as_str(),
                    MethodSummary {
                        label: run.method.label(),
                        evaluation: &run.aggregate,
                        avg_entities: run.aggregate.avg_entities_used,
                        queries: &run.queries,
                    },
                )
            })
            .collect(),
        comparison: &results.comparison,
    };

    let results_path = output_dir.join(RESULTS_FILE);
    std::fs::write(&results_path, serde_json::to_string_pretty(&file)?)?;

    let report_path = output_dir.join(REPORT_FILE);
    std::fs::write(&report_path, render_markdown(results))?;

    let html_path = output_dir.join(HTML_REPORT_FILE);
    std::fs::write(&html_path, render_html(results))?;

    log::info!(
        "Saved results to {} and reports to {}",
        results_path.display(),
        output_dir.display()
    );
    Ok(SavedReport {
        results: results_path,
        report: report_path,
        html: html_path,
    })
}

fn winner(method: Option<RagMethod>) -> String {
    match method {
        Some(m) => format!("✓ {}", m.label()),
        None => "-".to_string(),
    }
}

fn change_pct(from: f32, to: f32) -> Option<f32> {
    (from > 0.0).then(|| (to - from) / from * 100.0)
}

/// Render the comparison of a two-method experiment as Markdown.
pub fn render_markdown(results: &ExperimentResults) -> String {
    let empty = AggregateMetrics::default();
    let trad = results
        .run(RagMethod::Traditional)
        .map_or(&empty, |r| &r.aggregate);
    let graph = results
        .run(RagMethod::GraphAugmented)
        .map_or(&empty, |r| &r.aggregate);
    let cmp = &results.comparison;

    let mut out = String::new();
    let _ = writeln!(out, "# Graph-Augmented RAG Experiment Report\n");
    let _ = writeln!(out, "- **Run**: {}", results.run_id);
    let _ = writeln!(out, "- **Timestamp**: {}", results.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "- **Embedding model**: {}", results.embedding_model);
    let _ = writeln!(out, "- **Generator**: {}", results.generator);
    let _ = writeln!(out, "- **Documents**: {}", results.num_documents);
    let _ = writeln!(out, "- **Queries**: {}\n", trad.num_queries.max(graph.num_queries));

    let _ = writeln!(out, "## Results\n");
    let _ = writeln!(out, "| Metric | Traditional RAG | Graph-Augmented RAG | Winner |");
    let _ = writeln!(out, "|--------|-----------------|---------------------|--------|");
    let _ = writeln!(
        out,
        "| **Semantic Similarity** | {:.4} | {:.4} | {} |",
        trad.avg_semantic_similarity,
        graph.avg_semantic_similarity,
        winner(cmp.semantic_similarity)
    );
    let _ = writeln!(
        out,
        "| **Response Time (s)** | {:.4} | {:.4} | {} |",
        trad.avg_response_time,
        graph.avg_response_time,
        winner(cmp.response_time)
    );
    let _ = writeln!(
        out,
        "| **Retrieval Score** | {:.4} | {:.4} | {} |",
        trad.avg_fused_score,
        graph.avg_fused_score,
        winner(cmp.retrieval_score)
    );
    let _ = writeln!(
        out,
        "| **Passage Score (mean)** | {:.4} | {:.4} | - |",
        trad.avg_retrieval_score, graph.avg_retrieval_score
    );
    let _ = writeln!(
        out,
        "| **Response Length** | {:.1} words | {:.1} words | - |",
        trad.avg_response_length, graph.avg_response_length
    );
    let _ = writeln!(
        out,
        "| **KG Entities Used** | N/A | {:.1} | - |\n",
        graph.avg_entities_used
    );

    let _ = writeln!(out, "### Change vs Traditional RAG\n");
    if let Some(pct) = change_pct(trad.avg_semantic_similarity, graph.avg_semantic_similarity) {
        let _ = writeln!(out, "- **Semantic Similarity**: {:+.1}%", pct);
    }
    if let Some(pct) = change_pct(trad.avg_fused_score, graph.avg_fused_score) {
        let _ = writeln!(out, "- **Retrieval Score**: {:+.1}%", pct);
    }
    let _ = writeln!(
        out,
        "- **Time Overhead**: {:+.2}s per query",
        graph.avg_response_time - trad.avg_response_time
    );
    let failures = trad.generation_failures + graph.generation_failures;
    if failures > 0 {
        let _ = writeln!(out, "- **Generation Failures**: {}", failures);
    }

    let stats = &results.graph;
    let _ = writeln!(out, "\n## Knowledge Graph\n");
    let _ = writeln!(out, "- **Nodes**: {}", stats.num_nodes);
    let _ = writeln!(out, "- **Edges**: {}", stats.num_edges);
    let _ = writeln!(out, "- **Average Degree**: {:.2}", stats.avg_degree);
    let types: Vec<String> = stats
        .node_types
        .iter()
        .map(|(kind, count)| format!("{}: {}", kind, count))
        .collect();
    let _ = writeln!(out, "- **Node Types**: {}", types.join(", "));

    let _ = writeln!(out, "\n## Processing Time\n");
    let _ = writeln!(out, "- **Traditional RAG**: {:.2}s total", trad.total_time);
    let _ = writeln!(out, "- **Graph-Augmented RAG**: {:.2}s total", graph.total_time);

    out
}

const HTML_STYLE: &str = "body { font-family: sans-serif; max-width: 1100px; margin: 0 auto; padding: 20px; background: #f5f5f5; }
.header { background: #5a67d8; color: white; padding: 24px; border-radius: 8px; }
.card { background: white; padding: 20px; border-radius: 8px; margin: 20px 0; }
.metrics { display: flex; gap: 20px; }
.metric { flex: 1; background: white; padding: 16px; border-radius: 8px; text-align: center; }
.metric .value { font-size: 2em; font-weight: bold; color: #5a67d8; }
table { width: 100%; border-collapse: collapse; }
th, td { padding: 8px; text-align: left; border-bottom: 1px solid #ddd; vertical-align: top; }
th { background: #5a67d8; color: white; }
.winner { color: #27ae60; font-weight: bold; }
.bar { background: #5a67d8; color: white; padding: 4px 8px; margin: 4px 0; border-radius: 4px; white-space: nowrap; }";

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// One labelled bar per method, widths relative to the larger value.
fn bars(out: &mut String, title: &str, trad: f64, graph: f64) {
    let max = trad.max(graph);
    let width = |v: f64| if max > 0.0 { (v / max * 100.0).max(1.0) } else { 1.0 };
    let _ = writeln!(out, "<h3>{}</h3>", title);
    for (label, v) in [("Traditional RAG", trad), ("Graph-Augmented RAG", graph)] {
        let _ = writeln!(
            out,
            "<div class=\"bar\" style=\"width: {:.1}%\">{}: {:.4}</div>",
            width(v),
            label,
            v
        );
    }
}

/// Render the experiment as a self-contained HTML page.
pub fn render_html(results: &ExperimentResults) -> String {
    let empty = AggregateMetrics::default();
    let trad = results
        .run(RagMethod::Traditional)
        .map_or(&empty, |r| &r.aggregate);
    let graph = results
        .run(RagMethod::GraphAugmented)
        .map_or(&empty, |r| &r.aggregate);
    let cmp = &results.comparison;

    let mut out = String::new();
    let _ = writeln!(out, "<!DOCTYPE html>\n<html lang=\"en\">\n<head>");
    let _ = writeln!(out, "<meta charset=\"UTF-8\">");
    let _ = writeln!(out, "<title>Graph-Augmented RAG Experiment Report</title>");
    let _ = writeln!(out, "<style>\n{}\n</style>\n</head>\n<body>", HTML_STYLE);

    let _ = writeln!(out, "<div class=\"header\">");
    let _ = writeln!(out, "<h1>Graph-Augmented RAG Experiment Report</h1>");
    let _ = writeln!(
        out,
        "<p>Run {} at {} &middot; embeddings {} &middot; generator {}</p>",
        results.run_id,
        results.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        escape_html(&results.embedding_model),
        escape_html(&results.generator)
    );
    let _ = writeln!(out, "</div>");

    let _ = writeln!(out, "<div class=\"metrics\">");
    for (value, label) in [
        (trad.num_queries.max(graph.num_queries).to_string(), "Test Queries"),
        (results.num_documents.to_string(), "Documents"),
        (format!("{:.1}", graph.avg_entities_used), "Avg KG Entities Used"),
    ] {
        let _ = writeln!(
            out,
            "<div class=\"metric\"><div class=\"value\">{}</div><div>{}</div></div>",
            value, label
        );
    }
    let _ = writeln!(out, "</div>");

    let _ = writeln!(out, "<div class=\"card\">\n<h2>Performance Comparison</h2>\n<table>");
    let _ = writeln!(
        out,
        "<tr><th>Metric</th><th>Traditional RAG</th><th>Graph-Augmented RAG</th><th>Winner</th></tr>"
    );
    let rows = [
        (
            "Semantic Similarity",
            trad.avg_semantic_similarity as f64,
            graph.avg_semantic_similarity as f64,
            winner(cmp.semantic_similarity),
        ),
        (
            "Response Time (s)",
            trad.avg_response_time,
            graph.avg_response_time,
            winner(cmp.response_time),
        ),
        (
            "Retrieval Score",
            trad.avg_fused_score as f64,
            graph.avg_fused_score as f64,
            winner(cmp.retrieval_score),
        ),
        (
            "Response Length (words)",
            trad.avg_response_length as f64,
            graph.avg_response_length as f64,
            "-".to_string(),
        ),
    ];
    for (label, t, g, w) in &rows {
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{:.4}</td><td>{:.4}</td><td class=\"winner\">{}</td></tr>",
            label, t, g, w
        );
    }
    let _ = writeln!(out, "</table>\n</div>");

    let _ = writeln!(out, "<div class=\"card\">\n<h2>Charts</h2>");
    for (label, t, g, _) in rows.iter().take(3) {
        bars(&mut out, label, *t, *g);
    }
    let _ = writeln!(out, "</div>");

    for run in &results.runs {
        let _ = writeln!(out, "<div class=\"card\">\n<h2>{}</h2>\n<table>", run.method.label());
        let _ = writeln!(
            out,
            "<tr><th>Query</th><th>Similarity</th><th>Score</th><th>Entities</th><th>Answer</th></tr>"
        );
        for q in &run.queries {
            let similarity = q
                .metrics
                .semantic_similarity
                .map(|s| format!("{:.4}", s))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "<tr><td>{}</td><td>{}</td><td>{:.4}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&q.metrics.query),
                similarity,
                q.metrics.fused_score,
                escape_html(&q.entities.join(", ")),
                escape_html(&q.answer)
            );
        }
        let _ = writeln!(out, "</table>\n</div>");
    }

    let stats = &results.graph;
    let _ = writeln!(out, "<div class=\"card\">\n<h2>Knowledge Graph</h2>");
    let _ = writeln!(
        out,
        "<p>{} nodes, {} edges, average degree {:.2}</p>",
        stats.num_nodes, stats.num_edges, stats.avg_degree
    );
    let _ = writeln!(out, "</div>\n</body>\n</html>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::experiment::ExperimentRunner;

    async fn sample_results() -> ExperimentResults {
        let runner = ExperimentRunner::from_config(Config::default()).await.unwrap();
        runner.run().await.unwrap()
    }

    #[tokio::test]
    async fn test_save_writes_results_and_report() {
        let results = sample_results().await;
        let temp_dir = tempfile::TempDir::new().unwrap();
        let out = temp_dir.path().join("results");

        let saved = save(&results, &out).unwrap();
        assert_eq!(saved.results, out.join(RESULTS_FILE));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&saved.results).unwrap()).unwrap();
        assert_eq!(json["run_id"], results.run_id.to_string());
        assert_eq!(json["generator"], "template");
        assert_eq!(json["methods"]["traditional"]["evaluation"]["num_queries"], 10);
        assert_eq!(json["methods"]["graph_augmented"]["label"], "Graph-Augmented RAG");
        assert_eq!(
            json["methods"]["graph_augmented"]["queries"].as_array().unwrap().len(),
            10
        );
        assert_eq!(json["comparison"]["retrieval_score"], "graph_augmented");
        assert_eq!(json["graph"]["num_nodes"], 24);

        let report = std::fs::read_to_string(&saved.report).unwrap();
        assert!(report.starts_with("# Graph-Augmented RAG Experiment Report"));
        assert!(report.contains("| **Retrieval Score** |"));
        assert!(report.contains("✓ Graph-Augmented RAG"));
        assert!(report.contains("- **Nodes**: 24"));

        assert_eq!(saved.html, out.join(HTML_REPORT_FILE));
        let html = std::fs::read_to_string(&saved.html).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h2>Graph-Augmented RAG</h2>"));
        assert!(html.contains("24 nodes, 24 edges"));
        assert!(html.contains("<td class=\"winner\">✓ Graph-Augmented RAG</td>"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>\"x\" & 'y'</script>"),
            "&lt;script&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/script&gt;"
        );
    }

    #[test]
    fn test_change_pct() {
        assert_eq!(change_pct(0.0, 0.5), None);
        assert!((change_pct(0.5, 0.6).unwrap() - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_winner_cell() {
        assert_eq!(winner(None), "-");
        assert_eq!(winner(Some(RagMethod::Traditional)), "✓ Traditional RAG");
    }
}
