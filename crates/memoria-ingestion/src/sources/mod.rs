//! Record source clients.

pub mod jsonl;
pub mod oai;

use async_trait::async_trait;
use memoria_common::Result;

use crate::models::RawRecord;

/// Common interface for anything that produces repository records.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Return up to `limit` records (all of them when `None`), in source order.
    async fn records(&self, limit: Option<usize>) -> Result<Vec<RawRecord>>;
}
