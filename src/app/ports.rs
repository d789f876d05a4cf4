use async_trait::async_trait;

use crate::domain::RawRecord;
use crate::error::Result;

/// Where aid records live. The cleanup job rewrites through it and the
/// report path reads through it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All stored records, ordered by id
    async fn list_records(&self) -> Result<Vec<RawRecord>>;

    /// Replace the stored record with the same id
    async fn update_record(&self, record: &RawRecord) -> Result<()>;

    /// Delete by id; returns how many records were actually removed
    async fn delete_records(&self, ids: &[i64]) -> Result<usize>;

    async fn count(&self) -> Result<usize>;
}
