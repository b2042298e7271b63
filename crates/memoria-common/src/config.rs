//! Configuration loading for memoria.
//! Reads memoria.toml from the current directory or the path in MEMORIA_CONFIG,
//! then applies overrides from the environment (and a `.env` file if present).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{MemoriaError, Result};

pub const CONFIG_PATH_ENV: &str = "MEMORIA_CONFIG";
pub const REPOSITORY_URL_ENV: &str = "MEMORIA_REPOSITORY_URL";
pub const OAI_SET_ENV: &str = "MEMORIA_OAI_SET";
pub const DOCUMENT_SERVER_ENV: &str = "MEMORIA_DOCUMENT_SERVER";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoriaConfig {
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub url: String,
    pub set: Option<String>,
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,
}

fn default_metadata_prefix() -> String { "oai_dc".to_string() }

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            set: None,
            metadata_prefix: default_metadata_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// Prefix a dissertation URL must start with to count as its PDF.
    #[serde(default)]
    pub server_base: String,
    #[serde(default = "default_pdf_output_root")]
    pub pdf_output_root: PathBuf,
    #[serde(default = "default_ocr_output_root")]
    pub ocr_output_root: PathBuf,
    #[serde(default)]
    pub keep_pdf: bool,
}

fn default_pdf_output_root() -> PathBuf { PathBuf::from("original_pdf") }
fn default_ocr_output_root() -> PathBuf { PathBuf::from("ocr_text") }

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            server_base: String::new(),
            pdf_output_root: default_pdf_output_root(),
            ocr_output_root: default_ocr_output_root(),
            keep_pdf: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_supported_languages")]
    pub supported_languages: BTreeSet<String>,
    #[serde(default = "default_fallback_language")]
    pub fallback_language: String,
    #[serde(default = "default_min_language_score")]
    pub min_language_score: f64,
    #[serde(default = "default_max_concurrent_documents")]
    pub max_concurrent_documents: usize,
    /// Rows published after this date are dropped from the corpus.
    pub max_publication_date: Option<NaiveDate>,
}

fn default_supported_languages() -> BTreeSet<String> {
    ["fr", "en", "es"].iter().map(|s| s.to_string()).collect()
}
fn default_fallback_language()        -> String { "fr".to_string() }
fn default_min_language_score()       -> f64    { 0.714281 }
fn default_max_concurrent_documents() -> usize  { 1 }

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            supported_languages: default_supported_languages(),
            fallback_language: default_fallback_language(),
            min_language_score: default_min_language_score(),
            max_concurrent_documents: default_max_concurrent_documents(),
            max_publication_date: None,
        }
    }
}

impl AnalysisConfig {
    pub fn supports(&self, language: &str) -> bool {
        self.supported_languages.contains(language)
    }

    /// Returns `language` if supported, otherwise the fallback language.
    pub fn clamp_language<'a>(&'a self, language: &'a str) -> &'a str {
        if self.supports(language) {
            language
        } else {
            &self.fallback_language
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 { 60 }
fn default_user_agent() -> String { "memoria/0.1 (dissertation harvester)".to_string() }

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_path")]
    pub path: PathBuf,
}

fn default_export_path() -> PathBuf { PathBuf::from("dissertations.csv") }

impl Default for ExportConfig {
    fn default() -> Self {
        Self { path: default_export_path() }
    }
}

impl MemoriaConfig {
    /// Load configuration from memoria.toml.
    /// Checks MEMORIA_CONFIG env var first, then current directory.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let path = std::env::var(CONFIG_PATH_ENV)
            .unwrap_or_else(|_| "memoria.toml".to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MemoriaError::Config(format!(
                "Config file not found: {}\n\
                 Copy memoria.example.toml to memoria.toml and edit it.",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Like [`MemoriaConfig::load`], but a missing file yields the defaults
    /// (environment overrides still apply).
    pub fn load_or_default() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let path = std::env::var(CONFIG_PATH_ENV)
            .unwrap_or_else(|_| "memoria.toml".to_string());
        let path = Path::new(&path);
        if path.exists() {
            return Self::load_from(path);
        }

        tracing::warn!(path = %path.display(), "Config file not found, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MemoriaError::Config(e.to_string()))
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(REPOSITORY_URL_ENV) {
            self.repository.url = url;
        }
        if let Ok(set) = std::env::var(OAI_SET_ENV) {
            self.repository.set = Some(set).filter(|s| !s.is_empty());
        }
        if let Ok(base) = std::env::var(DOCUMENT_SERVER_ENV) {
            self.documents.server_base = base;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let analysis = &self.analysis;
        if analysis.supported_languages.is_empty() {
            return Err(MemoriaError::Config(
                "analysis.supported_languages must not be empty".to_string(),
            ));
        }
        if !analysis.supports(&analysis.fallback_language) {
            return Err(MemoriaError::Config(format!(
                "analysis.fallback_language '{}' is not one of the supported languages",
                analysis.fallback_language
            )));
        }
        if analysis.max_concurrent_documents == 0 {
            return Err(MemoriaError::Config(
                "analysis.max_concurrent_documents must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&analysis.min_language_score) {
            return Err(MemoriaError::Config(
                "analysis.min_language_score must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}
