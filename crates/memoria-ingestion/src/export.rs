//! CSV export of the corpus: header `id` + column names, one line per row.

use std::io::Write;
use std::path::Path;
use tracing::info;

use memoria_common::{MemoriaError, Result};

use crate::corpus::DissertationCorpus;

fn csv_error(e: csv::Error) -> MemoriaError {
    MemoriaError::Export(e.to_string())
}

/// Write the corpus as CSV into `writer`. Null cells are empty fields.
pub fn write_csv_to<W: Write>(corpus: &DissertationCorpus, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);

    let header = std::iter::once("id").chain(corpus.columns().iter().map(String::as_str));
    out.write_record(header).map_err(csv_error)?;

    for (id, row) in corpus.iter() {
        let mut record = Vec::with_capacity(row.values().len() + 1);
        record.push(id.to_string());
        record.extend(row.values().iter().map(ToString::to_string));
        out.write_record(&record).map_err(csv_error)?;
    }

    out.flush()?;
    Ok(())
}

/// Write the corpus to `path`, creating parent directories as needed.
pub fn write_csv(corpus: &DissertationCorpus, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_csv_to(corpus, file)?;
    info!(path = %path.display(), rows = corpus.len(), "Corpus exported");
    Ok(())
}
