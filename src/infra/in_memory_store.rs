use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::app::ports::RecordStore;
use crate::domain::RawRecord;
use crate::error::{NormalizerError, Result};

/// In-memory record store, loadable from and savable to a JSON array file
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<Mutex<BTreeMap<i64, RawRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from records. Records without an id, or whose id is
    /// already taken, get the next free one.
    pub fn from_records(records: Vec<RawRecord>) -> Self {
        let mut next_id = records.iter().filter_map(|r| r.id).max().unwrap_or(0) + 1;
        let mut map = BTreeMap::new();
        for mut record in records {
            if let Some(id) = record.id {
                if !map.contains_key(&id) {
                    map.insert(id, record);
                    continue;
                }
                warn!(id, new_id = next_id, "Duplicate record id; assigning a new one");
            }
            record.id = Some(next_id);
            map.insert(next_id, record);
            next_id += 1;
        }
        Self {
            records: Arc::new(Mutex::new(map)),
        }
    }

    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let records: Vec<RawRecord> = serde_json::from_str(&content)?;
        info!(path = %path.display(), records = records.len(), "Loaded records");
        Ok(Self::from_records(records))
    }

    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let records = self.snapshot()?;
        let content = serde_json::to_string_pretty(&records)?;
        tokio::fs::write(path, content).await?;
        info!(path = %path.display(), records = records.len(), "Saved records");
        Ok(())
    }

    /// Copy of the stored records, ordered by id
    pub fn snapshot(&self) -> Result<Vec<RawRecord>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<i64, RawRecord>>> {
        self.records.lock().map_err(|e| NormalizerError::Storage {
            message: format!("record store lock poisoned: {}", e),
        })
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn list_records(&self) -> Result<Vec<RawRecord>> {
        self.snapshot()
    }

    async fn update_record(&self, record: &RawRecord) -> Result<()> {
        let id = record.id.ok_or_else(|| NormalizerError::Storage {
            message: "cannot update a record without an id".to_string(),
        })?;
        let mut records = self.lock()?;
        match records.get_mut(&id) {
            Some(existing) => {
                *existing = record.clone();
                debug!(id, "Updated record");
                Ok(())
            }
            None => Err(NormalizerError::NotFound(id)),
        }
    }

    async fn delete_records(&self, ids: &[i64]) -> Result<usize> {
        let mut records = self.lock()?;
        let removed = ids.iter().filter(|id| records.remove(id).is_some()).count();
        debug!(requested = ids.len(), removed, "Deleted records");
        Ok(removed)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawRecord {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_missing_ids_are_assigned() {
        let store = InMemoryRecordStore::from_records(vec![
            raw(json!({"id": 4, "departamento": "CENTRAL"})),
            raw(json!({"departamento": "ITAPUA"})),
        ]);
        let records = store.list_records().await.unwrap();
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![Some(4), Some(5)]);
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_kept_under_new_ids() {
        let store = InMemoryRecordStore::from_records(vec![
            raw(json!({"id": 4, "departamento": "CENTRAL"})),
            raw(json!({"id": 4, "departamento": "ITAPÚA"})),
            raw(json!({"departamento": "MISIONES"})),
        ]);

        assert_eq!(store.count().await.unwrap(), 3);
        let stored = store.snapshot().unwrap();
        let ids: Vec<_> = stored.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![Some(4), Some(5), Some(6)]);
        assert_eq!(stored[1].department.as_deref(), Some("ITAPÚA"));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = InMemoryRecordStore::from_records(vec![
            raw(json!({"id": 1, "departamento": "central"})),
            raw(json!({"id": 2, "departamento": "itapua"})),
        ]);

        let mut first = store.list_records().await.unwrap().remove(0);
        first.department = Some("CENTRAL".to_string());
        store.update_record(&first).await.unwrap();

        let missing = raw(json!({"id": 99}));
        assert!(matches!(
            store.update_record(&missing).await,
            Err(NormalizerError::NotFound(99))
        ));

        assert_eq!(store.delete_records(&[2, 3]).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
        let records = store.list_records().await.unwrap();
        assert_eq!(records[0].department.as_deref(), Some("CENTRAL"));
    }

    #[tokio::test]
    async fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        tokio::fs::write(
            &path,
            json!([{"id": 1, "fecha": "2023-01-02", "departamento": "CENTRAL", "kit_a": "3"}]).to_string(),
        )
        .await
        .unwrap();

        let store = InMemoryRecordStore::load_json(&path).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        store.save_json(&path).await.unwrap();

        let reloaded = InMemoryRecordStore::load_json(&path).await.unwrap();
        assert_eq!(reloaded.snapshot().unwrap(), store.snapshot().unwrap());
    }
}
