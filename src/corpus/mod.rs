//! Document corpus and evaluation queries: built-in sample, a directory of
//! .md/.txt files, or JSON files.

pub mod sample;

use pulldown_cmark::{Event, Parser as CmarkParser, TagEnd};
use serde::{Deserialize, Serialize};
use std::path::Path;
use walkdir::WalkDir;

use crate::error::{KgragError, Result};

/// One retrievable passage of the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A query with its reference answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalQuery {
    pub query: String,
    pub ground_truth: String,
}

/// Accepted shapes of a JSON corpus entry
#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentRecord {
    Text(String),
    Full { id: Option<String>, text: String },
}

/// Load documents from a directory (recursive .md/.txt) or a JSON file
/// (array of strings or of `{id?, text}` objects).
pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let documents = if path.is_dir() {
        load_directory(path)?
    } else {
        load_json_documents(path)?
    };

    if documents.is_empty() {
        return Err(KgragError::InvalidInput(format!(
            "No documents found in {}",
            path.display()
        )));
    }
    log::info!("Loaded {} documents from {}", documents.len(), path.display());
    Ok(documents)
}

/// Load `[{query, ground_truth}]` records from a JSON file.
pub fn load_queries(path: &Path) -> Result<Vec<EvalQuery>> {
    let content = std::fs::read_to_string(path)?;
    let queries: Vec<EvalQuery> = serde_json::from_str(&content)?;
    if queries.is_empty() {
        return Err(KgragError::InvalidInput(format!(
            "No queries found in {}",
            path.display()
        )));
    }
    if let Some(q) = queries.iter().find(|q| q.query.trim().is_empty()) {
        return Err(KgragError::InvalidInput(format!(
            "Empty query in {} (ground truth: {:?})",
            path.display(),
            q.ground_truth
        )));
    }
    Ok(queries)
}

fn load_json_documents(path: &Path) -> Result<Vec<Document>> {
    let content = std::fs::read_to_string(path)?;
    let records: Vec<DocumentRecord> = serde_json::from_str(&content)?;
    Ok(records
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| {
            let (id, text) = match record {
                DocumentRecord::Text(text) => (None, text),
                DocumentRecord::Full { id, text } => (id, text),
            };
            let text = text.trim().to_string();
            (!text.is_empty()).then(|| Document::new(id.unwrap_or_else(|| format!("doc_{}", i)), text))
        })
        .collect())
}

/// Recursively collect .md and .txt files, sorted by relative path so the
/// corpus order (and therefore tie-breaking) is stable.
fn load_directory(root: &Path) -> Result<Vec<Document>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        if matches!(extension.as_str(), "md" | "txt") {
            paths.push((path.to_path_buf(), extension));
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for (path, extension) in paths {
        let content = std::fs::read_to_string(&path)?;
        let text = if extension == "md" {
            markdown_to_text(&content)
        } else {
            collapse_whitespace(&content)
        };
        if text.is_empty() {
            log::debug!("Skipping empty document {}", path.display());
            continue;
        }
        let id = path
            .strip_prefix(root)
            .map_err(|_| {
                KgragError::Config(format!(
                    "Failed to compute relative path for: {}",
                    path.display()
                ))
            })?
            .to_string_lossy()
            .to_string();
        documents.push(Document::new(id, text));
    }
    Ok(documents)
}

/// Flatten markdown to plain text: headings, paragraphs and list items
/// become space-separated runs; inline code keeps its text.
fn markdown_to_text(content: &str) -> String {
    let mut out = String::new();
    for event in CmarkParser::new(content) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push(' '),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock) => {
                out.push(' ')
            }
            _ => {}
        }
    }
    collapse_whitespace(&out)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_markdown_to_text() {
        let md = "# Phishing\n\nPhishing uses *fake* emails.\n\n- check `sender`\n- report it\n";
        assert_eq!(
            markdown_to_text(md),
            "Phishing Phishing uses fake emails. check sender report it"
        );
    }

    #[test]
    fn test_load_directory_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("nested")).unwrap();
        fs::write(root.join("b.txt"), "Ransomware   encrypts\nfiles.").unwrap();
        fs::write(root.join("a.md"), "## XSS\nInjects scripts.").unwrap();
        fs::write(root.join("nested/c.md"), "MFA helps.").unwrap();
        fs::write(root.join("ignored.rs"), "fn main() {}").unwrap();
        fs::write(root.join("empty.txt"), "   ").unwrap();

        let docs = load_documents(root).unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], "a.md");
        assert_eq!(ids[1], "b.txt");
        assert!(ids[2].ends_with("c.md"));
        assert_eq!(docs[0].text, "XSS Injects scripts.");
        assert_eq!(docs[1].text, "Ransomware encrypts files.");
    }

    #[test]
    fn test_load_json_documents_both_shapes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("docs.json");
        fs::write(
            &path,
            r#"["plain text doc", {"id": "custom", "text": "object doc"}, {"text": "no id"}, "  "]"#,
        )
        .unwrap();
        let docs = load_documents(&path).unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0], Document::new("doc_0", "plain text doc"));
        assert_eq!(docs[1].id, "custom");
        assert_eq!(docs[2].id, "doc_2");
    }

    #[test]
    fn test_load_documents_empty_dir_is_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            load_documents(temp_dir.path()),
            Err(KgragError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_load_queries() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("queries.json");
        fs::write(
            &path,
            r#"[{"query": "What is XSS?", "ground_truth": "Script injection."}]"#,
        )
        .unwrap();
        let queries = load_queries(&path).unwrap();
        assert_eq!(queries[0].query, "What is XSS?");

        fs::write(&path, r#"[{"query": " ", "ground_truth": "x"}]"#).unwrap();
        assert!(load_queries(&path).is_err());
        fs::write(&path, "[]").unwrap();
        assert!(load_queries(&path).is_err());
    }
}
