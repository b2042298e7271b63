//! JSON-lines record dumps: one `{"header": …, "metadata": …}` object per line.
//! Lets a harvest be replayed offline.

use async_trait::async_trait;
use serde_json::Value;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use memoria_common::{MemoriaError, Result};

use super::RecordSource;
use crate::models::RawRecord;

pub struct JsonlSource {
    path: PathBuf,
}

impl JsonlSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecordSource for JsonlSource {
    async fn records(&self, limit: Option<usize>) -> Result<Vec<RawRecord>> {
        read_records(&self.path, limit)
    }
}

/// Read records from `path`. Blank lines are skipped; a line that is not a
/// record object fails with `InvalidRecord`.
pub fn read_records(path: &Path, limit: Option<usize>) -> Result<Vec<RawRecord>> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut records = Vec::new();

    for (n, line) in reader.lines().enumerate() {
        if limit.is_some_and(|max| records.len() >= max) {
            break;
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)?;
        let record = RawRecord::from_value(&value)
            .map_err(|_| MemoriaError::InvalidRecord(format!("line {} of {}", n + 1, path.display())))?;
        records.push(record);
    }

    info!(path = %path.display(), n = records.len(), "Records loaded from dump");
    Ok(records)
}

pub fn write_records(path: &Path, records: &[RawRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(std::fs::File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
