use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::app::ports::RecordStore;
use crate::app::report_use_case::ReportCache;
use crate::domain::{AidField, RawRecord};
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::processing::normalize::{NormalizationOutcome, Normalizer};

/// What the cleanup job did to one stored record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Updated,
    NoChange,
    Deleted,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupRecord {
    pub record_id: Option<i64>,
    pub change_type: ChangeType,
    pub change_log: String,
    /// Storage columns whose value changed
    pub fields_changed: Vec<String>,
}

impl CleanupRecord {
    fn new(record_id: Option<i64>, change_type: ChangeType, change_log: impl Into<String>) -> Self {
        Self {
            record_id,
            change_type,
            change_log: change_log.into(),
            fields_changed: Vec::new(),
        }
    }
}

/// One execution of the cleanup job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupRun {
    pub id: Uuid,
    pub name: String,
    pub dry_run: bool,
    pub ruleset_version: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CleanupRun {
    pub fn new(dry_run: bool, ruleset_version: &str) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: format!(
                "cleanup-{}{}",
                created_at.format("%Y%m%dT%H%M%S"),
                if dry_run { "-dry-run" } else { "" }
            ),
            dry_run,
            ruleset_version: ruleset_version.to_string(),
            created_at,
            finished_at: None,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CleanupOptions {
    /// Compute everything, write nothing
    pub dry_run: bool,
    /// Keep the per-record change log in the summary
    pub verbose: bool,
    /// Log progress every N written records; 0 disables
    pub progress_every: usize,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            verbose: false,
            progress_every: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupSummary {
    pub run: CleanupRun,
    pub total_records: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub errors: usize,
    /// Records with a usable date after cleaning
    pub dated_records: usize,
    /// Kept records per canonical department
    pub departments: BTreeMap<String, usize>,
    /// Kept records per canonical event
    pub events: BTreeMap<String, usize>,
    /// Per-record log; only filled in verbose mode
    pub changes: Vec<CleanupRecord>,
}

impl CleanupSummary {
    fn new(run: CleanupRun, total_records: usize) -> Self {
        Self {
            run,
            total_records,
            updated: 0,
            unchanged: 0,
            deleted: 0,
            errors: 0,
            dated_records: 0,
            departments: BTreeMap::new(),
            events: BTreeMap::new(),
            changes: Vec::new(),
        }
    }
}

/// Batch job: normalize every stored record, write corrections back and
/// delete the records the ruleset discards
pub struct CleanupUseCase {
    store: Arc<dyn RecordStore>,
    normalizer: Arc<dyn Normalizer>,
    cache: Option<Arc<ReportCache>>,
}

impl std::fmt::Debug for CleanupUseCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupUseCase")
            .field("store", &"<Arc<dyn RecordStore>>")
            .field("ruleset_version", &self.normalizer.ruleset_version())
            .finish()
    }
}

impl CleanupUseCase {
    pub fn new(store: Arc<dyn RecordStore>, normalizer: Arc<dyn Normalizer>) -> Self {
        Self {
            store,
            normalizer,
            cache: None,
        }
    }

    /// Invalidate this cache after a run that wrote changes
    pub fn with_cache(mut self, cache: Arc<ReportCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[instrument(skip(self), fields(dry_run = options.dry_run))]
    pub async fn run(&self, options: CleanupOptions) -> Result<CleanupSummary> {
        let started = Instant::now();
        let mut run = CleanupRun::new(options.dry_run, self.normalizer.ruleset_version());
        let records = self.store.list_records().await?;

        info!(
            run_id = %run.id,
            records = records.len(),
            ruleset = %run.ruleset_version,
            "Starting cleanup run"
        );
        if options.dry_run {
            warn!(run_id = %run.id, "Dry run: no changes will be written");
        }
        metrics::cleanup::batch_size(records.len());

        let mut summary = CleanupSummary::new(run.clone(), records.len());
        let mut discarded_ids = Vec::new();
        let mut written = 0usize;

        for raw in &records {
            let change = match self.normalizer.normalize_detailed(raw) {
                NormalizationOutcome::Discarded(reason) => match raw.id {
                    Some(id) => {
                        discarded_ids.push(id);
                        CleanupRecord::new(
                            Some(id),
                            ChangeType::Deleted,
                            format!("Discarded: event {:?}", reason.raw_event.unwrap_or_default()),
                        )
                    }
                    None => CleanupRecord::new(None, ChangeType::Error, "Discarded record has no id"),
                },
                NormalizationOutcome::Kept(normalized) => {
                    let canonical = normalized.record;
                    *summary.departments.entry(canonical.department.clone()).or_default() += 1;
                    *summary.events.entry(canonical.event.clone()).or_default() += 1;
                    if canonical.date.is_some() {
                        summary.dated_records += 1;
                    }

                    let mut cleaned = canonical.to_raw();
                    // a date that does not parse is kept as stored
                    if canonical.date.is_none() {
                        cleaned.date = raw.date.clone();
                    }
                    let fields_changed = changed_fields(raw, &cleaned);
                    if fields_changed.is_empty() {
                        CleanupRecord::new(raw.id, ChangeType::NoChange, "Already clean")
                    } else {
                        let mut change = self.write_back(&cleaned, options.dry_run).await;
                        if change.change_type == ChangeType::Updated {
                            written += 1;
                            if options.progress_every > 0 && written % options.progress_every == 0 {
                                info!(run_id = %run.id, written, total = records.len(), "Cleanup progress");
                            }
                        }
                        change.fields_changed = fields_changed;
                        change
                    }
                }
            };

            match change.change_type {
                ChangeType::Updated => summary.updated += 1,
                ChangeType::NoChange => summary.unchanged += 1,
                ChangeType::Deleted => summary.deleted += 1,
                ChangeType::Error => summary.errors += 1,
            }
            if options.verbose {
                summary.changes.push(change);
            }
        }

        if !discarded_ids.is_empty() {
            if options.dry_run {
                info!(run_id = %run.id, count = discarded_ids.len(), "Would delete discarded records");
            } else {
                let removed = self.store.delete_records(&discarded_ids).await?;
                info!(run_id = %run.id, removed, "Deleted discarded records");
                metrics::cleanup::records_deleted(removed);
            }
        }

        if !options.dry_run && summary.updated + summary.deleted > 0 {
            if let Some(cache) = &self.cache {
                cache.invalidate();
            }
        }

        run.finish();
        summary.run = run;
        metrics::cleanup::duration(started.elapsed().as_secs_f64());
        info!(
            run_id = %summary.run.id,
            updated = summary.updated,
            unchanged = summary.unchanged,
            deleted = summary.deleted,
            errors = summary.errors,
            "Finished cleanup run"
        );

        Ok(summary)
    }

    async fn write_back(&self, cleaned: &RawRecord, dry_run: bool) -> CleanupRecord {
        if dry_run {
            return CleanupRecord::new(cleaned.id, ChangeType::Updated, "Would update (dry run)");
        }
        match self.store.update_record(cleaned).await {
            Ok(()) => {
                debug!(id = ?cleaned.id, "Updated record");
                metrics::cleanup::record_updated();
                CleanupRecord::new(cleaned.id, ChangeType::Updated, "Updated")
            }
            Err(e) => {
                error!(id = ?cleaned.id, error = %e, "Failed to update record");
                metrics::cleanup::record_error();
                CleanupRecord::new(cleaned.id, ChangeType::Error, format!("Update failed: {}", e))
            }
        }
    }
}

/// Storage columns that differ between the stored and the cleaned record
fn changed_fields(stored: &RawRecord, cleaned: &RawRecord) -> Vec<String> {
    let mut fields = Vec::new();
    let text_columns = [
        ("fecha", &stored.date, &cleaned.date),
        ("departamento", &stored.department, &cleaned.department),
        ("distrito", &stored.district, &cleaned.district),
        ("localidad", &stored.locality, &cleaned.locality),
        ("evento", &stored.event, &cleaned.event),
    ];
    for (name, before, after) in text_columns {
        if before != after {
            fields.push(name.to_string());
        }
    }
    for field in AidField::ALL {
        if stored.aid_value(field) != cleaned.aid_value(field) {
            fields.push(field.name().to_string());
        }
    }
    if stored.viveres != cleaned.viveres {
        fields.push("viveres".to_string());
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::in_memory_store::InMemoryRecordStore;
    use crate::pipeline::processing::normalize::{AidNormalizer, NormalizerPolicy};
    use serde_json::json;

    fn store() -> Arc<InMemoryRecordStore> {
        let records = vec![
            json!({"id": 1, "fecha": "2023-05-10", "departamento": "pdte hayes", "distrito": "", "localidad": "villa hayes", "evento": "OLLA P.", "kit_a": "5"}),
            json!({"id": 2, "fecha": "2023-05-11", "departamento": "CENTRAL", "distrito": "Luque", "localidad": "Centro", "evento": "PREP.", "kit_a": 10}),
            json!({"id": 3, "fecha": "2023-05-12", "departamento": "CENTRAL", "distrito": "Luque", "localidad": "Centro", "evento": "INUNDACION",
                   "kit_a": 1, "kit_b": 0, "chapa_fibrocemento": 0, "chapa_zinc": 0, "colchones": 0, "frazadas": 0, "terciadas": 0, "puntales": 0, "carpas_plasticas": 0}),
        ];
        let raws = records
            .into_iter()
            .map(|r| serde_json::from_value(r).unwrap())
            .collect();
        Arc::new(InMemoryRecordStore::from_records(raws))
    }

    fn use_case(store: Arc<InMemoryRecordStore>) -> CleanupUseCase {
        let normalizer = AidNormalizer::with_embedded_ruleset(NormalizerPolicy::default()).unwrap();
        CleanupUseCase::new(store, Arc::new(normalizer))
    }

    #[tokio::test]
    async fn test_cleanup_updates_and_deletes() {
        let store = store();
        let summary = use_case(store.clone()).run(CleanupOptions::default()).await.unwrap();

        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.errors, 0);
        assert!(summary.run.finished_at.is_some());
        assert_eq!(summary.departments.get("PDTE. HAYES"), Some(&1));

        let records = store.list_records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].department.as_deref(), Some("PDTE. HAYES"));
        assert_eq!(records[0].event.as_deref(), Some("OLLA POPULAR"));
        assert_eq!(records[0].kit_a, json!(5));
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let store = store();
        let before = store.snapshot().unwrap();
        let options = CleanupOptions {
            dry_run: true,
            verbose: true,
            ..CleanupOptions::default()
        };
        let summary = use_case(store.clone()).run(options).await.unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.changes.len(), 3);
        assert!(summary.run.dry_run);
        assert_eq!(store.snapshot().unwrap(), before);
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let store = store();
        let cleanup = use_case(store.clone());
        cleanup.run(CleanupOptions::default()).await.unwrap();
        let second = cleanup.run(CleanupOptions::default()).await.unwrap();

        assert_eq!(second.total_records, 2);
        assert_eq!(second.updated, 0);
        assert_eq!(second.deleted, 0);
        assert_eq!(second.unchanged, 2);
    }

    #[tokio::test]
    async fn test_unparseable_date_is_not_erased() {
        let raw: RawRecord = serde_json::from_value(json!({
            "id": 1, "fecha": "marzo 2021", "departamento": "central", "distrito": "Luque", "evento": "INCENDIO", "kit_a": 1
        }))
        .unwrap();
        let store = Arc::new(InMemoryRecordStore::from_records(vec![raw]));
        let summary = use_case(store.clone()).run(CleanupOptions::default()).await.unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.dated_records, 0);
        let records = store.list_records().await.unwrap();
        assert_eq!(records[0].date.as_deref(), Some("marzo 2021"));
        assert_eq!(records[0].department.as_deref(), Some("CENTRAL"));

        let second = use_case(store.clone()).run(CleanupOptions::default()).await.unwrap();
        assert_eq!(second.unchanged, 1);
    }

    #[test]
    fn test_changed_fields() {
        let stored: RawRecord = serde_json::from_value(json!({"departamento": "central", "kit_a": "2"})).unwrap();
        let mut cleaned = stored.clone();
        cleaned.department = Some("CENTRAL".to_string());
        cleaned.kit_a = json!(2);
        assert_eq!(changed_fields(&stored, &cleaned), vec!["departamento", "kit_a"]);
    }
}
