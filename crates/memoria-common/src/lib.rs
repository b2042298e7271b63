//! memoria-common — Shared error type, configuration and HTTP client used across memoria crates.

pub mod config;
pub mod error;
pub mod http;

// Re-export commonly used types
pub use config::{AnalysisConfig, DocumentsConfig, ExportConfig, HttpConfig, MemoriaConfig, RepositoryConfig};
pub use error::{MemoriaError, Result};
pub use http::HttpClient;
