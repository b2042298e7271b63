//! Record models for the ingestion pipeline.
//!
//! `RawRecord` is what a record source produces; `MetadataRecord` is the
//! normalized form with every mandatory key present.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use memoria_common::{MemoriaError, Result};

pub const NULL_UUID: &str = "00000000-0000-0000-0000-000000000000";

pub const MANDATORY_HEADER_KEYS: &[&str] = &["identifier", "deleted"];

pub const MANDATORY_METADATA_KEYS: &[&str] = &[
    "title",
    "creator",
    "publisher",
    "contributor",
    "date",
    "identifier",
];

/// Header of a record as delivered by the repository. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHeader {
    pub identifier: Option<String>,
    pub deleted: Option<bool>,
    pub datestamp: Option<String>,
}

/// A repository record before normalization: a header plus a multi-valued
/// Dublin Core mapping (element name → values in document order).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub header: RawHeader,
    #[serde(default)]
    pub metadata: BTreeMap<String, Vec<String>>,
}

impl RawRecord {
    /// Build a record from a loosely-typed JSON value.
    ///
    /// The value must be an object holding a `header` object and a
    /// `metadata` object. Missing fields inside them are fine; a bare string
    /// metadata value is treated as a one-element list.
    pub fn from_value(value: &Value) -> Result<Self> {
        let invalid = || MemoriaError::InvalidRecord("oai_record".to_string());

        let object = value.as_object().ok_or_else(invalid)?;
        let header = object.get("header").and_then(Value::as_object).ok_or_else(invalid)?;
        let metadata = object.get("metadata").and_then(Value::as_object).ok_or_else(invalid)?;

        let raw_header = RawHeader {
            identifier: header.get("identifier").and_then(Value::as_str).map(String::from),
            deleted: header.get("deleted").and_then(Value::as_bool),
            datestamp: header.get("datestamp").and_then(Value::as_str).map(String::from),
        };

        let mut raw_metadata = BTreeMap::new();
        for (key, values) in metadata {
            let list = match values {
                Value::Array(items) => items.iter().filter_map(scalar_to_string).collect(),
                Value::Null => Vec::new(),
                other => scalar_to_string(other).into_iter().collect(),
            };
            raw_metadata.insert(key.clone(), list);
        }

        Ok(Self { header: raw_header, metadata: raw_metadata })
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub identifier: String,
    pub deleted: bool,
}

impl Default for RecordHeader {
    fn default() -> Self {
        Self {
            identifier: NULL_UUID.to_string(),
            deleted: false,
        }
    }
}

/// The six Dublin Core elements a dissertation is built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DublinCore {
    pub title: Vec<String>,
    pub creator: Vec<String>,
    pub publisher: Vec<String>,
    pub contributor: Vec<String>,
    pub date: Vec<String>,
    pub identifier: Vec<String>,
}

impl DublinCore {
    /// Look up one of the mandatory metadata keys.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        match key {
            "title" => Some(&self.title),
            "creator" => Some(&self.creator),
            "publisher" => Some(&self.publisher),
            "contributor" => Some(&self.contributor),
            "date" => Some(&self.date),
            "identifier" => Some(&self.identifier),
            _ => None,
        }
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Vec<String>> {
        match key {
            "title" => Some(&mut self.title),
            "creator" => Some(&mut self.creator),
            "publisher" => Some(&mut self.publisher),
            "contributor" => Some(&mut self.contributor),
            "date" => Some(&mut self.date),
            "identifier" => Some(&mut self.identifier),
            _ => None,
        }
    }
}

/// Normalized record: every mandatory key is present, absent source
/// fields keep their filler defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub header: RecordHeader,
    pub metadata: DublinCore,
}

impl MetadataRecord {
    pub fn from_raw(raw: &RawRecord) -> Self {
        let mut record = Self::default();

        if let Some(identifier) = &raw.header.identifier {
            record.header.identifier = identifier.clone();
        }
        if let Some(deleted) = raw.header.deleted {
            record.header.deleted = deleted;
        }

        for key in MANDATORY_METADATA_KEYS {
            if let (Some(values), Some(slot)) = (raw.metadata.get(*key), record.metadata.slot_mut(key)) {
                *slot = values.clone();
            }
        }

        record
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        RawRecord::from_value(value).map(|raw| Self::from_raw(&raw))
    }
}
