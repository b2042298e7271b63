use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoriaError {
    /// Input does not have the shape of a repository record.
    #[error("{0} must be a valid OAI record")]
    InvalidRecord(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A prerequisite was not set before the operation was called.
    #[error("Missing attribute: {0}")]
    MissingAttribute(String),

    #[error("Schema mismatch: expected columns {expected:?}, found {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MemoriaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_record_message_names_argument() {
        let err = MemoriaError::InvalidRecord("oai_record".to_string());
        assert_eq!(err.to_string(), "oai_record must be a valid OAI record");
    }

    #[test]
    fn test_schema_mismatch_lists_columns() {
        let err = MemoriaError::SchemaMismatch {
            expected: vec!["title".to_string()],
            found: vec!["name".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("title"));
        assert!(msg.contains("name"));
    }
}
