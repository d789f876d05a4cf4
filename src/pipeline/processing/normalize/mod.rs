pub mod rules;
pub mod ruleset;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::constants::UNSPECIFIED;
use crate::domain::{AidField, AidQuantities, CanonicalRecord, RawRecord};
use crate::error::Result;
use crate::observability::metrics;

use rules::{
    canonicalize_text, coerce_optional_quantity, coerce_with_policy, parse_record_date,
    reclassify_detailed, resolve_department, resolve_event_detailed, EventRule,
    NegativeQuantityPolicy, PartialRecord, ReclassificationRule, ResidualEventPolicy,
    UnmatchedEventPolicy,
};
use rules::text::title_case;
pub use ruleset::Ruleset;

/// Switches for the behaviors the data owners have not settled on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerPolicy {
    pub negative_quantities: NegativeQuantityPolicy,
    pub residual_event: ResidualEventPolicy,
    pub unmatched_event: UnmatchedEventPolicy,
}

/// A canonical record plus what the pipeline did to produce it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub record: CanonicalRecord,
    pub normalization: NormalizationMetadata,
}

/// Metadata about the normalization process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationMetadata {
    /// Version string of the ruleset that produced the record
    pub ruleset_version: String,
    /// The department column held a district name and was repaired
    pub department_swapped: bool,
    /// The final department is one of the official names
    pub department_mapped: bool,
    /// The district was blank and was filled from the department
    pub district_backfilled: bool,
    pub event_rule: EventRule,
    pub reclassification: ReclassificationRule,
    /// Non-fatal oddities noticed on the way (unparseable date, negatives)
    pub warnings: Vec<String>,
    pub normalized_at: DateTime<Utc>,
}

/// Why a record was dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardReason {
    pub id: Option<i64>,
    /// The event text that resolved to a discarded category
    pub raw_event: Option<String>,
    pub event_rule: EventRule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NormalizationOutcome {
    Kept(NormalizedRecord),
    Discarded(DiscardReason),
}

impl NormalizationOutcome {
    pub fn into_record(self) -> Option<CanonicalRecord> {
        match self {
            NormalizationOutcome::Kept(normalized) => Some(normalized.record),
            NormalizationOutcome::Discarded(_) => None,
        }
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, NormalizationOutcome::Discarded(_))
    }
}

/// Trait for normalizing raw aid records into canonical ones
pub trait Normalizer: Send + Sync {
    /// Run the full pipeline and report how each field was decided
    fn normalize_detailed(&self, raw: &RawRecord) -> NormalizationOutcome;

    /// The canonical record, or `None` when the record must be discarded
    fn normalize_record(&self, raw: &RawRecord) -> Option<CanonicalRecord> {
        self.normalize_detailed(raw).into_record()
    }

    fn ruleset_version(&self) -> &str;
}

/// Ruleset-driven normalizer. Immutable after construction; share it with `Arc`.
#[derive(Debug, Clone)]
pub struct AidNormalizer {
    ruleset: Arc<Ruleset>,
    policy: NormalizerPolicy,
}

impl AidNormalizer {
    pub fn new(ruleset: Arc<Ruleset>, policy: NormalizerPolicy) -> Self {
        Self { ruleset, policy }
    }

    /// Normalizer over the ruleset compiled into the binary
    pub fn with_embedded_ruleset(policy: NormalizerPolicy) -> Result<Self> {
        Ok(Self::new(Arc::new(Ruleset::embedded()?), policy))
    }

    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }

    pub fn policy(&self) -> NormalizerPolicy {
        self.policy
    }

    fn coerce_quantities(&self, raw: &RawRecord, warnings: &mut Vec<String>) -> AidQuantities {
        let mut aid = AidQuantities::default();
        for field in AidField::ALL {
            let value = coerce_with_policy(raw.aid_value(field), NegativeQuantityPolicy::Passthrough);
            if value < 0 {
                warnings.push(format!("negative quantity {} in {}", value, field));
            }
            let value = match self.policy.negative_quantities {
                NegativeQuantityPolicy::Passthrough => value,
                NegativeQuantityPolicy::ClampToZero => value.max(0),
            };
            aid.set(field, value);
        }
        aid
    }
}

impl Normalizer for AidNormalizer {
    fn normalize_detailed(&self, raw: &RawRecord) -> NormalizationOutcome {
        let mut warnings = Vec::new();

        // 1. quantities
        let aid = self.coerce_quantities(raw, &mut warnings);
        let viveres = coerce_optional_quantity(&raw.viveres, self.policy.negative_quantities);

        // 2. district
        let mut district = canonicalize_text(raw.district.as_deref());

        // 3. department, backfilling the district when the columns were swapped
        let department = resolve_department(
            raw.department.as_deref(),
            raw.district.as_deref(),
            &self.ruleset,
        );
        if let Some(original) = department.district.as_deref() {
            district = canonicalize_text(Some(original));
            debug!(
                id = ?raw.id,
                district = %district,
                department = %department.department,
                "Department column held a district name"
            );
            metrics::normalize::department_swapped();
        }
        // an official department with no district fills the district from it
        let district_backfilled = district == UNSPECIFIED && department.mapped;
        if district_backfilled {
            district = title_case(&department.department);
        }
        if !department.mapped {
            metrics::normalize::department_unmapped();
        }

        // 4. locality
        let locality = canonicalize_text(raw.locality.as_deref());

        // 5. event
        let event = resolve_event_detailed(
            raw.event.as_deref(),
            &self.ruleset,
            self.policy.unmatched_event,
        );

        // 6. date
        let date = parse_record_date(raw.date.as_deref());
        if date.is_none() && raw.date.as_deref().is_some_and(|d| !d.trim().is_empty()) {
            warnings.push(format!("unparseable date {:?}", raw.date.as_deref().unwrap_or_default()));
        }

        // 7. reclassification, which also honors the discard marker
        let partial = PartialRecord {
            department: department.department.clone(),
            event: event.label.clone(),
            date,
            aid,
            viveres,
        };
        let (final_event, reclassification) =
            reclassify_detailed(&partial, &self.ruleset, self.policy.residual_event);

        let Some(final_event) = final_event else {
            trace!(id = ?raw.id, event = ?raw.event, "Discarding record");
            metrics::normalize::record_discarded();
            return NormalizationOutcome::Discarded(DiscardReason {
                id: raw.id,
                raw_event: raw.event.clone(),
                event_rule: event.rule,
            });
        };

        if reclassification != ReclassificationRule::Unchanged {
            metrics::normalize::record_reclassified(reclassification.as_str());
        }
        metrics::normalize::record_kept(event.rule.as_str());

        NormalizationOutcome::Kept(NormalizedRecord {
            record: CanonicalRecord {
                id: raw.id,
                date,
                department: department.department,
                district,
                locality,
                event: final_event,
                aid,
                viveres,
            },
            normalization: NormalizationMetadata {
                ruleset_version: self.ruleset.version.clone(),
                department_swapped: department.district.is_some(),
                district_backfilled,
                department_mapped: department.mapped,
                event_rule: event.rule,
                reclassification,
                warnings,
                normalized_at: Utc::now(),
            },
        })
    }

    fn ruleset_version(&self) -> &str {
        &self.ruleset.version
    }
}

/// Normalize a batch, dropping discarded records
pub fn normalize_all<N: Normalizer + ?Sized>(normalizer: &N, raws: &[RawRecord]) -> Vec<CanonicalRecord> {
    metrics::normalize::batch_size(raws.len());
    raws.iter()
        .filter_map(|raw| normalizer.normalize_record(raw))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn normalizer() -> AidNormalizer {
        AidNormalizer::with_embedded_ruleset(NormalizerPolicy::default()).unwrap()
    }

    fn raw(value: serde_json::Value) -> RawRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_end_to_end_record() {
        let input = raw(json!({
            "fecha": "2023-05-10",
            "departamento": "pdte hayes",
            "distrito": "",
            "localidad": "  villa hayes ",
            "evento": "OLLA P.",
            "kit_a": "5",
            "kit_b": null,
            "chapa_zinc": 12.7
        }));

        let record = normalizer().normalize_record(&input).unwrap();
        assert_eq!(record.department, "PDTE. HAYES");
        assert_eq!(record.district, "Pdte. Hayes");
        assert_eq!(record.locality, "Villa Hayes");
        assert_eq!(record.event, "OLLA POPULAR");
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2023, 5, 10));
        assert_eq!(record.aid.kit_a, 5);
        assert_eq!(record.aid.kit_b, 0);
        assert_eq!(record.aid.chapa_zinc, 12);
        assert_eq!(record.aid.frazadas, 0);
    }

    #[test]
    fn test_prepositioning_discarded_regardless_of_aid() {
        let input = raw(json!({
            "departamento": "CENTRAL",
            "evento": "PREP.",
            "kit_a": 100,
            "kit_b": 40
        }));

        match normalizer().normalize_detailed(&input) {
            NormalizationOutcome::Discarded(reason) => {
                assert_eq!(reason.raw_event.as_deref(), Some("PREP."));
                assert_eq!(reason.event_rule, EventRule::Alias);
            }
            other => panic!("expected discard, got {:?}", other),
        }
    }

    #[test]
    fn test_swap_backfills_district() {
        let input = raw(json!({"departamento": "LIMPIO", "distrito": "", "evento": "INUNDACION"}));
        let outcome = normalizer().normalize_detailed(&input);
        let NormalizationOutcome::Kept(normalized) = outcome else {
            panic!("record should be kept");
        };
        assert_eq!(normalized.record.department, "CENTRAL");
        assert_eq!(normalized.record.district, "Limpio");
        assert!(normalized.normalization.department_swapped);
        assert!(normalized.normalization.department_mapped);
    }

    #[test]
    fn test_unlabeled_record_is_reclassified() {
        let kit = raw(json!({"departamento": "ITAPUA", "kit_b": 2}));
        let outcome = normalizer().normalize_detailed(&kit);
        let NormalizationOutcome::Kept(normalized) = outcome else {
            panic!("record should be kept");
        };
        assert_eq!(normalized.record.event, "EXTREMA VULNERABILIDAD");
        assert_eq!(normalized.normalization.reclassification, ReclassificationRule::KitSignal);

        let drought = raw(json!({"departamento": "Boquerón", "evento": ""}));
        assert_eq!(normalizer().normalize_record(&drought).unwrap().event, "SEQUIA");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let inputs = [
            json!({"fecha": "10/05/2023", "departamento": "pdte hayes", "evento": "OLLA P.", "kit_a": "5"}),
            json!({"departamento": "LIMPIO", "distrito": "", "localidad": "barrio SAN JOSÉ", "evento": "inund."}),
            json!({"departamento": "VARIOS DEPARTAMENTOS", "evento": "algo raro", "chapa_zinc": "-4"}),
            json!({"departamento": "caaguazu - canindeyu", "evento": "", "viveres": 3, "frazadas": 2}),
            json!({"departamento": "CAPITAL", "viveres": 40, "fecha": "2021-02-01T10:00:00"}),
        ];
        let normalizer = normalizer();
        for input in inputs {
            let first = normalizer.normalize_record(&raw(input.clone())).unwrap();
            let second = normalizer.normalize_record(&first.to_raw()).unwrap();
            assert_eq!(first, second, "input: {}", input);
        }
    }

    #[test]
    fn test_policies_change_behavior() {
        let ruleset = Arc::new(Ruleset::embedded().unwrap());
        let strict = AidNormalizer::new(
            ruleset,
            NormalizerPolicy {
                negative_quantities: NegativeQuantityPolicy::ClampToZero,
                residual_event: ResidualEventPolicy::KeepSinEvento,
                unmatched_event: UnmatchedEventPolicy::Passthrough,
            },
        );

        let input = raw(json!({"departamento": "CENTRAL", "evento": "", "colchones": -3}));
        let NormalizationOutcome::Kept(normalized) = strict.normalize_detailed(&input) else {
            panic!("record should be kept");
        };
        assert_eq!(normalized.record.aid.colchones, 0);
        assert_eq!(normalized.record.event, "SIN EVENTO");
        assert_eq!(normalized.normalization.warnings.len(), 1);

        let unmatched = raw(json!({"departamento": "CENTRAL", "evento": "Visita oficial"}));
        assert_eq!(strict.normalize_record(&unmatched).unwrap().event, "VISITA OFICIAL");
    }

    #[test]
    fn test_normalize_all_drops_discards() {
        let raws = vec![
            raw(json!({"departamento": "CENTRAL", "evento": "INCENDIO"})),
            raw(json!({"departamento": "CENTRAL", "evento": "PREPOSICIONAMIENTO"})),
        ];
        let records = normalize_all(&normalizer(), &raws);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event, "INCENDIO");
    }
}
