use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::app::ports::RecordStore;
use crate::domain::CanonicalRecord;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::processing::aggregate::{
    self, GeneralStats, GroupBy, GroupSummary, MapPoint, TablePage,
};
use crate::pipeline::processing::normalize::{normalize_all, Normalizer};

struct CachedDataset {
    records: Arc<Vec<CanonicalRecord>>,
    loaded_at: Instant,
}

/// Memoized cleaned dataset with a fixed time-to-live. Owned by whoever
/// builds the report path; the cleanup job invalidates it after writing.
pub struct ReportCache {
    ttl: Duration,
    entry: Mutex<Option<CachedDataset>>,
}

impl ReportCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// The cached dataset if it has not expired
    pub fn get(&self) -> Option<Arc<Vec<CanonicalRecord>>> {
        let guard = match self.entry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Report cache lock poisoned; treating as empty");
                poisoned.into_inner()
            }
        };
        guard
            .as_ref()
            .filter(|cached| cached.loaded_at.elapsed() < self.ttl)
            .map(|cached| cached.records.clone())
    }

    pub fn put(&self, records: Vec<CanonicalRecord>) -> Arc<Vec<CanonicalRecord>> {
        let records = Arc::new(records);
        let mut guard = self.entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(CachedDataset {
            records: records.clone(),
            loaded_at: Instant::now(),
        });
        records
    }

    pub fn invalidate(&self) {
        let mut guard = self.entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.take().is_some() {
            debug!("Report cache invalidated");
        }
    }
}

impl Default for ReportCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

/// Result of checking a dataset before serving it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetCheck {
    pub stored_records: usize,
    pub kept_records: usize,
    pub discarded_records: usize,
    pub stats: GeneralStats,
}

/// Read path: cleans stored records on the fly and summarizes them
pub struct ReportUseCase {
    store: Arc<dyn RecordStore>,
    normalizer: Arc<dyn Normalizer>,
    cache: Arc<ReportCache>,
}

impl ReportUseCase {
    pub fn new(store: Arc<dyn RecordStore>, normalizer: Arc<dyn Normalizer>, cache: Arc<ReportCache>) -> Self {
        Self {
            store,
            normalizer,
            cache,
        }
    }

    pub fn cache(&self) -> Arc<ReportCache> {
        self.cache.clone()
    }

    /// Cleaned dataset, from cache when fresh
    #[instrument(skip(self))]
    pub async fn cleaned_records(&self) -> Result<Arc<Vec<CanonicalRecord>>> {
        if let Some(records) = self.cache.get() {
            metrics::report::cache_hit();
            return Ok(records);
        }
        metrics::report::cache_miss();

        let raws = self.store.list_records().await?;
        let records = normalize_all(self.normalizer.as_ref(), &raws);
        info!(
            stored = raws.len(),
            kept = records.len(),
            ruleset = self.normalizer.ruleset_version(),
            "Cleaned dataset for reporting"
        );
        Ok(self.cache.put(records))
    }

    pub async fn summary(&self, group_by: GroupBy) -> Result<Vec<GroupSummary>> {
        let records = self.cleaned_records().await?;
        Ok(aggregate::summarize(&records, group_by))
    }

    pub async fn general(&self) -> Result<GeneralStats> {
        let records = self.cleaned_records().await?;
        Ok(aggregate::general_stats(&records))
    }

    pub async fn map(&self) -> Result<Vec<MapPoint>> {
        let records = self.cleaned_records().await?;
        Ok(aggregate::map_points(&records))
    }

    pub async fn table(&self, page: usize, per_page: usize) -> Result<TablePage> {
        let records = self.cleaned_records().await?;
        Ok(aggregate::paginate(&records, page, per_page))
    }

    #[instrument(skip(self))]
    pub async fn check(&self) -> Result<DatasetCheck> {
        let stored_records = self.store.count().await?;
        let records = self.cleaned_records().await?;
        Ok(DatasetCheck {
            stored_records,
            kept_records: records.len(),
            discarded_records: stored_records.saturating_sub(records.len()),
            stats: aggregate::general_stats(&records),
        })
    }
}
