//! Per-document working state for one analysis pass.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use memoria_common::{DocumentsConfig, HttpClient};

use crate::retrieval::DocumentFetcher;

pub const PDF_INVALID_URL: &str = "invalid URL";
pub const PDF_INVALID_FILE_NAME: &str = "invalid file name";

/// Analysis progress of a document. A pass walks these states in order;
/// `Failed` can be entered from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    UrlResolved,
    ContentFetched,
    Extracted,
    Sanitized,
    Tokenized,
    Persisted,
    Failed,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentState::UrlResolved    => "url_resolved",
            DocumentState::ContentFetched => "content_fetched",
            DocumentState::Extracted      => "extracted",
            DocumentState::Sanitized      => "sanitized",
            DocumentState::Tokenized      => "tokenized",
            DocumentState::Persisted      => "persisted",
            DocumentState::Failed         => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PdfDocument {
    source_url: String,
    file_name: String,
    pdf_path: Option<PathBuf>,
    output_text_path: Option<PathBuf>,
    pub(crate) content_buffer: Option<Vec<u8>>,
    language: Option<String>,
    pub(crate) state: DocumentState,

    pub page_count: Option<usize>,
    pub image_count: Option<usize>,
    pub raw_text: Option<String>,
    pub ocr_quality: Option<f64>,
    pub token_count: Option<usize>,
}

impl PdfDocument {
    fn with_paths(
        source_url: String,
        file_name: String,
        pdf_path: Option<PathBuf>,
        output_text_path: Option<PathBuf>,
    ) -> Self {
        Self {
            source_url,
            file_name,
            pdf_path,
            output_text_path,
            content_buffer: None,
            language: None,
            state: DocumentState::UrlResolved,
            page_count: None,
            image_count: None,
            raw_text: None,
            ocr_quality: None,
            token_count: None,
        }
    }

    /// Placeholder for a URL that does not point to a reachable PDF.
    pub fn invalid() -> Self {
        Self::with_paths(PDF_INVALID_URL.to_string(), PDF_INVALID_FILE_NAME.to_string(), None, None)
    }

    /// Derive file name and output paths from the last two path segments of
    /// `url`, without touching the network:
    /// `<pdf_output_root>/<dir>/<file>` and
    /// `<ocr_output_root>/<dir>/<file lowercased, .pdf → .txt>`.
    ///
    /// Dot segments are normalised away while parsing, so both output paths
    /// stay under their configured roots.
    pub fn resolve(url: &str, config: &DocumentsConfig) -> Self {
        let Ok(parsed) = HttpClient::parse_url(url) else {
            return Self::invalid();
        };
        let segments: Vec<&str> = parsed.path_segments().map(Iterator::collect).unwrap_or_default();
        let [.., directory, file_name] = segments.as_slice() else {
            return Self::invalid();
        };
        let usable = |segment: &str| !matches!(segment, "" | "." | "..");
        if !usable(*directory) || !usable(*file_name) || !file_name.to_lowercase().ends_with(".pdf") {
            return Self::invalid();
        }

        let txt_file = file_name.to_lowercase().replace(".pdf", ".txt");
        Self::with_paths(
            url.to_string(),
            file_name.to_string(),
            Some(config.pdf_output_root.join(directory).join(file_name)),
            Some(config.ocr_output_root.join(directory).join(txt_file)),
        )
    }

    /// Check that `url` answers a HEAD request and names a PDF; otherwise
    /// return the invalid placeholder instead of failing.
    pub async fn from_url(url: &str, fetcher: &DocumentFetcher, config: &DocumentsConfig) -> Self {
        if !url.to_lowercase().ends_with(".pdf") {
            warn!(url, "URL does not point to a .pdf file");
            return Self::invalid();
        }
        if !fetcher.validate(url).await {
            warn!(url, "Invalid URL");
            return Self::invalid();
        }
        Self::resolve(url, config)
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_text_path = Some(path.into());
        self
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = Some(language.into());
    }

    pub fn is_valid(&self) -> bool {
        self.source_url != PDF_INVALID_URL
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn pdf_path(&self) -> Option<&Path> {
        self.pdf_path.as_deref()
    }

    pub fn output_text_path(&self) -> Option<&Path> {
        self.output_text_path.as_deref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn state(&self) -> DocumentState {
        self.state
    }

    /// The downloaded bytes, while a pass holds them.
    pub fn content_buffer(&self) -> Option<&[u8]> {
        self.content_buffer.as_deref()
    }
}
