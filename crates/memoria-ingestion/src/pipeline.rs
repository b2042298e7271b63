//! Document analysis pipeline.
//!
//! [`DocumentAnalyzer::analyze`] runs one document through
//!   1. fetch the PDF into memory
//!   2. count pages and extract per-page text and images
//!   3. sanitize the text and grade its OCR quality
//!   4. tokenize in the document's language
//!   5. optionally keep the PDF, release the buffer
//!   6. write the sanitized text to disk
//!
//! Failures past the language check never escape: they are logged and
//! reported as [`AnalysisOutcome::Failed`] next to the partially populated
//! document. [`DocumentAnalyzer::analyze_corpus`] drives the same pass over
//! every row of a corpus and writes the metrics back as columns.

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use memoria_common::{AnalysisConfig, DocumentsConfig, MemoriaConfig, MemoriaError, Result};

use crate::corpus::{CellValue, DissertationCorpus, COL_DELETED, COL_PUBLICATION_DATE, COL_URL};
use crate::dissertation::{Dissertation, NO_URL};
use crate::document::{DocumentState, PdfDocument};
use crate::language::{COL_LANGUAGE, COL_LANGUAGE_SCORE};
use crate::models::RawRecord;
use crate::pdf_parser::{count_pages, extract_content};
use crate::retrieval::{DocumentFetcher, Download};
use crate::sanitize::sanitize;
use crate::tokenizer::Tokenizer;

pub const COL_PAGE_COUNT: &str = "page_count";
pub const COL_IMAGE_COUNT: &str = "image_count";
pub const COL_OCR_QUALITY: &str = "ocr_quality";
pub const COL_TOKEN_COUNT: &str = "token_count";
pub const COL_TEXT_PATH: &str = "text_path";
pub const COL_ANALYSIS_STATUS: &str = "analysis_status";

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_NO_URL: &str = "no_url";
pub const STATUS_DELETED: &str = "deleted";

// ── Outcomes ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Persisted,
    /// `reached` is the last state completed before the failure.
    Failed { reached: DocumentState, reason: String },
}

impl AnalysisOutcome {
    /// Value written to the `analysis_status` column.
    pub fn status_label(&self) -> String {
        match self {
            AnalysisOutcome::Persisted => DocumentState::Persisted.as_str().to_string(),
            AnalysisOutcome::Failed { reached, .. } => format!("failed:{}", reached.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub document: PdfDocument,
    pub outcome: AnalysisOutcome,
}

impl AnalysisReport {
    pub fn is_complete(&self) -> bool {
        self.outcome == AnalysisOutcome::Persisted
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorpusAnalysisSummary {
    pub analyzed: usize,
    pub failed: usize,
    pub skipped: usize,
}

// ── Corpus construction ───────────────────────────────────────────────────────

/// Build a corpus from harvested records. Duplicates are logged and dropped
/// by [`DissertationCorpus::append`].
pub fn build_corpus(records: &[RawRecord], server_base: &str) -> DissertationCorpus {
    let mut corpus = DissertationCorpus::new();
    let mut duplicates = 0usize;
    for record in records {
        if !corpus.append(&Dissertation::create(record, server_base)) {
            duplicates += 1;
        }
    }
    info!(rows = corpus.len(), duplicates, "Corpus built");
    corpus
}

/// Drop rows published after `max_date`, when one is configured.
pub fn apply_date_filter(corpus: &mut DissertationCorpus, analysis: &AnalysisConfig) {
    let Some(max_date) = analysis.max_publication_date else {
        return;
    };
    let before = corpus.len();
    corpus.retain(|_, row| {
        row.get(COL_PUBLICATION_DATE)
            .and_then(CellValue::as_date)
            .is_some_and(|date| date <= max_date)
    });
    info!(%max_date, kept = corpus.len(), dropped = before - corpus.len(), "Publication date filter applied");
}

// ── Analyzer ──────────────────────────────────────────────────────────────────

pub struct DocumentAnalyzer {
    fetcher: DocumentFetcher,
    tokenizer: Arc<dyn Tokenizer>,
    analysis: AnalysisConfig,
    documents: DocumentsConfig,
}

impl DocumentAnalyzer {
    pub fn new(fetcher: DocumentFetcher, tokenizer: Arc<dyn Tokenizer>, config: &MemoriaConfig) -> Self {
        Self {
            fetcher,
            tokenizer,
            analysis: config.analysis.clone(),
            documents: config.documents.clone(),
        }
    }

    /// Resolve `url` into a document with the configured output paths.
    pub async fn document(&self, url: &str) -> PdfDocument {
        PdfDocument::from_url(url, &self.fetcher, &self.documents).await
    }

    /// Run the full pass on `doc`.
    ///
    /// Fails with `MissingAttribute`, before any network access, when the
    /// document has no language. Every later error is contained in the
    /// returned report.
    #[instrument(skip(self, doc), fields(url = %doc.source_url()))]
    pub async fn analyze(&self, mut doc: PdfDocument) -> Result<AnalysisReport> {
        let language = doc
            .language()
            .map(str::to_string)
            .ok_or_else(|| {
                MemoriaError::MissingAttribute(format!(
                    "language must be set before analyzing {}",
                    doc.source_url()
                ))
            })?;

        let outcome = match self.run(&mut doc, &language).await {
            Ok(()) => {
                info!(
                    file = %doc.file_name(),
                    pages = ?doc.page_count,
                    tokens = ?doc.token_count,
                    ocr_quality = ?doc.ocr_quality,
                    "Document analyzed"
                );
                AnalysisOutcome::Persisted
            }
            Err(e) => {
                let reached = doc.state;
                warn!(
                    url = %doc.source_url(),
                    file = %doc.file_name(),
                    reached = reached.as_str(),
                    error = %e,
                    "Analysis of document failed"
                );
                doc.state = DocumentState::Failed;
                AnalysisOutcome::Failed { reached, reason: e.to_string() }
            }
        };

        Ok(AnalysisReport { document: doc, outcome })
    }

    async fn run(&self, doc: &mut PdfDocument, language: &str) -> Result<()> {
        // fetch
        let buffer = match self.fetcher.fetch(doc.source_url()).await? {
            Download::Complete(buffer) => buffer,
            Download::Failed => {
                return Err(MemoriaError::Transport(format!("download of {} failed", doc.source_url())));
            }
        };
        doc.state = DocumentState::ContentFetched;

        // extract
        let (buffer, pages, content) = tokio::task::spawn_blocking(move || {
            let pages = count_pages(&buffer);
            let content = extract_content(&buffer);
            (buffer, pages, content)
        })
        .await
        .map_err(|e| MemoriaError::Other(e.into()))?;
        doc.content_buffer = Some(buffer);
        doc.page_count = Some(pages?);
        doc.image_count = Some(content.image_count());
        doc.state = DocumentState::Extracted;

        // sanitize
        let sanitized = sanitize(&content.pages);
        doc.ocr_quality = Some(sanitized.ocr_quality);
        doc.raw_text = Some(sanitized.text);
        doc.state = DocumentState::Sanitized;

        // tokenize
        let token_language = self.analysis.clamp_language(language);
        if token_language != language {
            debug!(language, fallback = token_language, "Unsupported language, using fallback");
        }
        let text = doc.raw_text.as_deref().unwrap_or_default();
        doc.token_count = Some(self.tokenizer.count_tokens(text, token_language)?);
        doc.state = DocumentState::Tokenized;

        // keep the PDF, then release the buffer
        if self.documents.keep_pdf {
            if let (Some(path), Some(bytes)) = (doc.pdf_path(), doc.content_buffer()) {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(path, bytes).await?;
                debug!(path = %path.display(), "PDF kept");
            }
        }
        doc.content_buffer = None;

        // persist
        let path = doc
            .output_text_path()
            .ok_or_else(|| MemoriaError::MissingAttribute("output text path".to_string()))?
            .to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, doc.raw_text.as_deref().unwrap_or_default().as_bytes()).await?;
        doc.state = DocumentState::Persisted;
        Ok(())
    }

    /// Language used to analyze a corpus row: the detected title language
    /// when it is supported and confident enough, else the fallback.
    fn row_language(&self, language: Option<&CellValue>, score: Option<&CellValue>) -> String {
        let language = language.and_then(CellValue::as_str);
        let score = score.and_then(CellValue::as_f64).unwrap_or(0.0);
        match language {
            Some(code) if score >= self.analysis.min_language_score && self.analysis.supports(code) => {
                code.to_string()
            }
            _ => self.analysis.fallback_language.clone(),
        }
    }

    /// Analyze every row that has a document URL and store the metrics in
    /// the corpus. At most `max_concurrent_documents` passes run at once;
    /// only this loop writes to the corpus.
    pub async fn analyze_corpus(&self, corpus: &mut DissertationCorpus) -> Result<CorpusAnalysisSummary> {
        for column in [COL_PAGE_COUNT, COL_IMAGE_COUNT, COL_OCR_QUALITY, COL_TOKEN_COUNT, COL_TEXT_PATH] {
            if !corpus.has_column(column) {
                corpus.add_column(column, CellValue::Null)?;
            }
        }
        if !corpus.has_column(COL_ANALYSIS_STATUS) {
            corpus.add_column(COL_ANALYSIS_STATUS, STATUS_PENDING)?;
        }

        let mut summary = CorpusAnalysisSummary::default();
        let mut jobs = Vec::new();
        let mut skipped = Vec::new();
        for (id, row) in corpus.iter() {
            if row.get(COL_DELETED).and_then(CellValue::as_bool).unwrap_or(false) {
                skipped.push((id.to_string(), STATUS_DELETED));
                continue;
            }
            match row.get(COL_URL).and_then(CellValue::as_str) {
                Some(url) if url != NO_URL && !url.is_empty() => {
                    let language = self.row_language(row.get(COL_LANGUAGE), row.get(COL_LANGUAGE_SCORE));
                    jobs.push((id.to_string(), url.to_string(), language));
                }
                _ => skipped.push((id.to_string(), STATUS_NO_URL)),
            }
        }
        for (id, status) in skipped {
            corpus.set(&id, COL_ANALYSIS_STATUS, status)?;
            summary.skipped += 1;
        }

        info!(documents = jobs.len(), skipped = summary.skipped, "Analyzing corpus documents");

        let concurrency = self.analysis.max_concurrent_documents.max(1);
        let mut results = stream::iter(jobs)
            .map(|(id, url, language)| async move {
                // fetch re-validates the URL, no HEAD here
                let mut doc = PdfDocument::resolve(&url, &self.documents);
                doc.set_language(language);
                (id, self.analyze(doc).await)
            })
            .buffer_unordered(concurrency);

        while let Some((id, result)) = results.next().await {
            let report = result?;
            write_metrics(corpus, &id, &report)?;
            if report.is_complete() {
                summary.analyzed += 1;
            } else {
                summary.failed += 1;
            }
        }

        info!(
            analyzed = summary.analyzed,
            failed = summary.failed,
            skipped = summary.skipped,
            "Corpus analysis finished"
        );
        Ok(summary)
    }
}

fn write_metrics(corpus: &mut DissertationCorpus, id: &str, report: &AnalysisReport) -> Result<()> {
    let doc = &report.document;
    corpus.set(id, COL_PAGE_COUNT, doc.page_count)?;
    corpus.set(id, COL_IMAGE_COUNT, doc.image_count)?;
    corpus.set(id, COL_OCR_QUALITY, doc.ocr_quality)?;
    corpus.set(id, COL_TOKEN_COUNT, doc.token_count)?;
    let text_path = report
        .is_complete()
        .then(|| doc.output_text_path())
        .flatten()
        .map(|p| p.display().to_string());
    corpus.set(id, COL_TEXT_PATH, text_path)?;
    corpus.set(id, COL_ANALYSIS_STATUS, report.outcome.status_label())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::RegexTokenizer;
    use chrono::NaiveDate;
    use memoria_common::HttpClient;
    use serde_json::json;

    fn analyzer(config: &MemoriaConfig) -> DocumentAnalyzer {
        let fetcher = DocumentFetcher::new(HttpClient::new(&config.http).unwrap());
        let tokenizer = Arc::new(RegexTokenizer::from_config(&config.analysis));
        DocumentAnalyzer::new(fetcher, tokenizer, config)
    }

    fn record(uuid: &str, date: &str, url: &str) -> RawRecord {
        RawRecord::from_value(&json!({
            "header": { "identifier": format!("oai:repo:{uuid}"), "deleted": false },
            "metadata": {
                "title": ["Essai"],
                "creator": ["Tremblay, Marie"],
                "date": [date],
                "identifier": [url],
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(AnalysisOutcome::Persisted.status_label(), "persisted");
        let failed = AnalysisOutcome::Failed {
            reached: DocumentState::ContentFetched,
            reason: "bad pdf".to_string(),
        };
        assert_eq!(failed.status_label(), "failed:content_fetched");
    }

    #[test]
    fn test_build_corpus_drops_duplicates() {
        let a = "0a1b2c3d-0000-4000-8000-000000000001";
        let records = vec![
            record(a, "1999-05-01", "https://docs.example.org/a/x.pdf"),
            record(a, "1999-05-01", "https://docs.example.org/a/x.pdf"),
        ];
        let corpus = build_corpus(&records, "https://docs.example.org/");
        assert_eq!(corpus.len(), 1);
        assert!(corpus.contains(a));
    }

    #[test]
    fn test_date_filter_keeps_older_rows() {
        let old = "0a1b2c3d-0000-4000-8000-000000000001";
        let new = "0a1b2c3d-0000-4000-8000-000000000002";
        let undated = "0a1b2c3d-0000-4000-8000-000000000003";
        let records = vec![
            record(old, "1998", "u"),
            record(new, "2005-01-01", "u"),
            record(undated, "n.d.", "u"),
        ];
        let mut corpus = build_corpus(&records, "");
        let analysis = AnalysisConfig {
            max_publication_date: NaiveDate::from_ymd_opt(2001, 6, 1),
            ..AnalysisConfig::default()
        };
        apply_date_filter(&mut corpus, &analysis);
        assert_eq!(corpus.ids().collect::<Vec<_>>(), vec![old]);
    }

    #[test]
    fn test_date_filter_without_limit_is_noop() {
        let mut corpus = build_corpus(&[record("0a1b2c3d-0000-4000-8000-000000000009", "2020", "u")], "");
        apply_date_filter(&mut corpus, &AnalysisConfig::default());
        assert_eq!(corpus.len(), 1);
    }

    #[test]
    fn test_row_language_falls_back_on_low_score() {
        let analyzer = analyzer(&MemoriaConfig::default());
        let en = CellValue::from("en");
        assert_eq!(analyzer.row_language(Some(&en), Some(&CellValue::from(0.9))), "en");
        assert_eq!(analyzer.row_language(Some(&en), Some(&CellValue::from(0.5))), "fr");
        let de = CellValue::from("de");
        assert_eq!(analyzer.row_language(Some(&de), Some(&CellValue::from(1.0))), "fr");
        assert_eq!(analyzer.row_language(None, None), "fr");
    }

    #[tokio::test]
    async fn test_missing_language_fails_before_fetch() {
        let analyzer = analyzer(&MemoriaConfig::default());
        let doc = PdfDocument::resolve("http://127.0.0.1:9/dir/file.pdf", &DocumentsConfig::default());
        let err = analyzer.analyze(doc).await.unwrap_err();
        assert!(matches!(err, MemoriaError::MissingAttribute(_)));
    }

    #[tokio::test]
    async fn test_unreachable_document_is_contained() {
        let analyzer = analyzer(&MemoriaConfig::default());
        let mut doc = PdfDocument::resolve("http://127.0.0.1:9/dir/file.pdf", &DocumentsConfig::default());
        doc.set_language("fr");
        let report = analyzer.analyze(doc).await.unwrap();
        assert!(!report.is_complete());
        assert_eq!(report.document.state(), DocumentState::Failed);
        assert!(report.document.page_count.is_none());
        assert!(matches!(
            report.outcome,
            AnalysisOutcome::Failed { reached: DocumentState::UrlResolved, .. }
        ));
    }

    #[tokio::test]
    async fn test_rows_without_url_are_skipped() {
        let id = "0a1b2c3d-0000-4000-8000-000000000001";
        let mut corpus = build_corpus(&[record(id, "1999", "https://elsewhere.org/a/x.pdf")], "https://docs.example.org/");
        let summary = analyzer(&MemoriaConfig::default()).analyze_corpus(&mut corpus).await.unwrap();
        assert_eq!(summary, CorpusAnalysisSummary { analyzed: 0, failed: 0, skipped: 1 });
        assert_eq!(corpus.get(id, COL_ANALYSIS_STATUS), Some(&CellValue::from(STATUS_NO_URL)));
        assert!(corpus.get(id, COL_PAGE_COUNT).unwrap().is_null());
    }
}
