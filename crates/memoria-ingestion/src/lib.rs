//! memoria-ingestion — Dissertation harvesting and document analysis.
//! Covers:
//! - Record harvesting (OAI-PMH, JSON-lines dumps)
//! - Record normalization and the dissertation entity
//! - The deduplicated corpus table and its CSV export
//! - PDF retrieval, text and image extraction
//! - Text sanitization and OCR-quality grading
//! - Tokenization and title language detection
//! - The per-document analysis pipeline

pub mod sources;
pub mod corpus;
pub mod dissertation;
pub mod document;
pub mod export;
pub mod language;
pub mod models;
pub mod pdf_parser;
pub mod pipeline;
pub mod retrieval;
pub mod sanitize;
pub mod tokenizer;

pub use corpus::{CellValue, DissertationCorpus};
pub use dissertation::Dissertation;
pub use document::{DocumentState, PdfDocument};
pub use models::{MetadataRecord, RawRecord};
pub use pipeline::{AnalysisOutcome, AnalysisReport, DocumentAnalyzer};
pub use retrieval::{DocumentFetcher, Download};
