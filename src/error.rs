use thiserror::Error;

/// Main error type for kgrag
#[derive(Error, Debug)]
pub enum KgragError {
    /// A node name is already taken by a node of another type
    #[error("Duplicate node: {name} already exists as {existing}, cannot add as {requested}")]
    DuplicateNode {
        name: String,
        existing: String,
        requested: String,
    },

    /// Lookup of a node that was never added to the graph
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// No path between two nodes within the hop budget
    #[error("No path found from {from} to {to} within {max_depth} hops")]
    NoPathFound {
        from: String,
        to: String,
        max_depth: usize,
    },

    /// Node attributes failed schema validation
    #[error("Invalid attributes for node {node}: {reason}")]
    InvalidAttribute { node: String, reason: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding API errors
    #[error("Embedding API error: {0}")]
    Embedding(String),

    /// Generation (LLM) API errors
    #[error("Generation API error: {0}")]
    Generation(String),

    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding store errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KgragError {
    /// True for outcomes that carry domain information rather than a failure.
    /// Only a missing path qualifies: "no mitigation known" is a valid answer.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, KgragError::NoPathFound { .. })
    }
}

/// Convenient Result type using KgragError
pub type Result<T> = std::result::Result<T, KgragError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KgragError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_duplicate_node_display() {
        let err = KgragError::DuplicateNode {
            name: "Phishing".to_string(),
            existing: "threat".to_string(),
            requested: "mitigation".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Phishing"));
        assert!(msg.contains("threat"));
        assert!(msg.contains("mitigation"));
    }

    #[test]
    fn test_only_no_path_is_recoverable() {
        let no_path = KgragError::NoPathFound {
            from: "Firewall".to_string(),
            to: "SQL Injection".to_string(),
            max_depth: 2,
        };
        assert!(no_path.is_recoverable());
        assert!(!KgragError::UnknownNode("x".to_string()).is_recoverable());
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: KgragError = rusqlite_err.into();
        assert!(matches!(err, KgragError::Database(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: KgragError = io_err.into();
        assert!(matches!(err, KgragError::Io(_)));
    }
}
