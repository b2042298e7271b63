//! Dissertation entity built from a normalized repository record.
//!
//! All fields are fixed at construction; the single-valued views
//! (`title`, `canonical_date`, `canonical_url`, …) are derived on demand.

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use tracing::warn;

use memoria_common::Result;

use crate::models::{MetadataRecord, RawRecord, NULL_UUID};

pub const NO_URL: &str = "URL not found";

lazy_static! {
    static ref UUID_RE: Regex =
        Regex::new(r"[0-9a-f]{8}-(?:[0-9a-f]{4}-){3}[0-9a-f]{12}$").unwrap();
    static ref ISO_DATE_RE: Regex = Regex::new(r"(?-u)^\d{4}-\d{2}-\d{2}$").unwrap();
    static ref YEAR_RE: Regex = Regex::new(r"(?-u)^\d{4}$").unwrap();
}

/// Date given to dissertations whose catalogued dates cannot be parsed.
pub fn unparseable_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2038, 1, 20).unwrap_or_default()
}

/// Extract the trailing UUID from a prefixed repository identifier
/// such as `oai:repo.example.org:1a2b…`.
pub fn extract_uuid(identifier: &str) -> Option<&str> {
    UUID_RE.find(identifier).map(|m| m.as_str())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dissertation {
    id: String,
    titles: Vec<String>,
    authors: Vec<String>,
    publishers: Vec<String>,
    contributors: Vec<String>,
    dates: Vec<String>,
    candidate_urls: Vec<String>,
    is_deleted: bool,
    server_base: String,
}

impl Dissertation {
    /// Normalize `raw` and build the entity. `server_base` is the prefix
    /// that identifies the dissertation's PDF among its identifiers.
    pub fn create(raw: &RawRecord, server_base: &str) -> Self {
        Self::from_record(MetadataRecord::from_raw(raw), server_base)
    }

    /// Same as [`Dissertation::create`] for a loosely-typed JSON record.
    pub fn create_from_value(value: &Value, server_base: &str) -> Result<Self> {
        MetadataRecord::from_value(value).map(|record| Self::from_record(record, server_base))
    }

    pub fn from_record(record: MetadataRecord, server_base: &str) -> Self {
        let header_id = record.header.identifier;
        // No UUID in the identifier: the id keeps its null default.
        let id = match extract_uuid(&header_id) {
            Some(uuid) => uuid.to_string(),
            None => {
                warn!(identifier = %header_id, "No UUID found in record identifier, keeping null id");
                NULL_UUID.to_string()
            }
        };

        let metadata = record.metadata;
        Self {
            id,
            titles: metadata.title,
            authors: metadata.creator,
            publishers: metadata.publisher,
            contributors: metadata.contributor,
            dates: metadata.date,
            candidate_urls: metadata.identifier,
            is_deleted: record.header.deleted,
            server_base: server_base.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub fn title(&self) -> String {
        self.titles.join("|")
    }

    pub fn authors(&self) -> String {
        self.authors.join(", ")
    }

    pub fn authors_list(&self) -> &[String] {
        &self.authors
    }

    pub fn publishers(&self) -> String {
        self.publishers.join(", ")
    }

    pub fn publishers_list(&self) -> &[String] {
        &self.publishers
    }

    pub fn contributors(&self) -> String {
        self.contributors.join(", ")
    }

    pub fn contributors_list(&self) -> &[String] {
        &self.contributors
    }

    pub fn candidate_urls(&self) -> &[String] {
        &self.candidate_urls
    }

    /// First full ISO date, else first bare year as June 1st, else the
    /// unparseable-date sentinel.
    pub fn canonical_date(&self) -> NaiveDate {
        let iso = self
            .dates
            .iter()
            .filter(|d| ISO_DATE_RE.is_match(d))
            .find_map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        if let Some(date) = iso {
            return date;
        }

        self.dates
            .iter()
            .filter(|d| YEAR_RE.is_match(d))
            .find_map(|d| d.parse::<i32>().ok())
            .and_then(|year| NaiveDate::from_ymd_opt(year, 6, 1))
            .unwrap_or_else(unparseable_date)
    }

    /// First identifier hosted on the document server, else [`NO_URL`].
    pub fn canonical_url(&self) -> &str {
        if self.server_base.is_empty() {
            return NO_URL;
        }
        self.candidate_urls
            .iter()
            .find(|url| url.starts_with(&self.server_base))
            .map(String::as_str)
            .unwrap_or(NO_URL)
    }

    pub fn has_url(&self) -> bool {
        self.canonical_url() != NO_URL
    }
}

impl fmt::Display for Dissertation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {} ({})", self.authors(), self.title(), self.canonical_date().year())
    }
}
