use std::sync::Arc;

use aid_normalizer::domain::RawRecord;
use aid_normalizer::pipeline::processing::aggregate::{self, GroupBy};
use aid_normalizer::pipeline::processing::normalize::rules::{
    coerce_aid_quantity, resolve_department, resolve_event,
};
use aid_normalizer::pipeline::processing::normalize::{
    normalize_all, AidNormalizer, NormalizationOutcome, Normalizer, NormalizerPolicy, Ruleset,
};
use aid_normalizer::pipeline::processing::quality_gate::{
    DefaultQualityGate, QualityDecision, QualityGate,
};
use serde_json::{json, Value};
use tempfile::tempdir;

const DEFAULT_RULES: &str = include_str!("../rules/default.toml");

fn raw(value: Value) -> RawRecord {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_numeric_coercion_is_total() {
    assert_eq!(coerce_aid_quantity(&Value::Null), 0);
    assert_eq!(coerce_aid_quantity(&json!("")), 0);
    assert_eq!(coerce_aid_quantity(&json!("abc")), 0);
    assert_eq!(coerce_aid_quantity(&json!("12.7")), 12);
    assert_eq!(coerce_aid_quantity(&json!(7)), 7);
    assert_eq!(coerce_aid_quantity(&json!(7.9)), 7);
    assert_eq!(coerce_aid_quantity(&json!(-3)), -3);
}

#[test]
fn test_department_resolution_properties() {
    let ruleset = Ruleset::embedded().unwrap();

    assert_eq!(resolve_department(Some("VARIOS DEPARTAMENTOS"), Some(""), &ruleset).department, "CENTRAL");
    assert_eq!(resolve_department(Some(""), Some(""), &ruleset).department, "CENTRAL");

    let swapped = resolve_department(Some("LIMPIO"), Some(""), &ruleset);
    assert_eq!(swapped.department, "CENTRAL");
    assert_eq!(swapped.district.as_deref(), Some("LIMPIO"));

    let compound = resolve_department(Some("CAAGUAZU - CANINDEYU"), Some("x"), &ruleset);
    assert_eq!(compound.department, "CAAGUAZÚ");
    assert!(!compound.swapped());
}

#[test]
fn test_prepositioning_is_discarded_by_the_pipeline() {
    let ruleset = Ruleset::embedded().unwrap();
    assert_eq!(resolve_event(Some("PREP."), &ruleset), None);

    let normalizer = AidNormalizer::new(Arc::new(ruleset), NormalizerPolicy::default());
    let record = raw(json!({"departamento": "ITAPUA", "evento": "prep.", "kit_a": 50, "frazadas": 9}));
    assert!(normalizer.normalize_detailed(&record).is_discarded());
}

#[test]
fn test_unlabeled_records_are_reclassified() {
    let normalizer = AidNormalizer::with_embedded_ruleset(NormalizerPolicy::default()).unwrap();

    let kit = raw(json!({"departamento": "CENTRAL", "evento": "", "kit_a": 3}));
    assert_eq!(normalizer.normalize_record(&kit).unwrap().event, "EXTREMA VULNERABILIDAD");

    let drought = raw(json!({"departamento": "BOQUERON", "evento": "", "kit_a": 3}));
    assert_eq!(normalizer.normalize_record(&drought).unwrap().event, "SEQUIA");

    let fire = raw(json!({"departamento": "CENTRAL", "viveres": 2, "chapa_zinc": 4}));
    assert_eq!(normalizer.normalize_record(&fire).unwrap().event, "INCENDIO");

    let soup = raw(json!({"departamento": "CENTRAL", "fecha": "2020-08-01", "viveres": 5}));
    assert_eq!(normalizer.normalize_record(&soup).unwrap().event, "OLLA POPULAR");

    let flood = raw(json!({"departamento": "ASUNCION", "fecha": "2019-08-01", "viveres": 30}));
    let flood = normalizer.normalize_record(&flood).unwrap();
    assert_eq!(flood.department, "CAPITAL");
    assert_eq!(flood.event, "INUNDACION");
}

#[test]
fn test_ruleset_file_overrides_embedded_rules() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("rules.toml");
    let earlier = DEFAULT_RULES
        .replace("version = \"2024.3\"", "version = \"2022.1\"")
        .replace("discard = [\"PREPOSICIONAMIENTO\"]", "discard = []");
    std::fs::write(&path, earlier).unwrap();

    let ruleset = Ruleset::load(&path).unwrap();
    assert_eq!(ruleset.version, "2022.1");

    let normalizer = AidNormalizer::new(Arc::new(ruleset), NormalizerPolicy::default());
    assert_eq!(normalizer.ruleset_version(), "2022.1");
    let record = raw(json!({"departamento": "CENTRAL", "evento": "PREP.", "kit_a": 1}));
    assert_eq!(normalizer.normalize_record(&record).unwrap().event, "PREPOSICIONAMIENTO");
}

#[test]
fn test_custom_discard_list_replaces_the_default() {
    let rules = DEFAULT_RULES.replace(
        "discard = [\"PREPOSICIONAMIENTO\"]",
        "discard = [\"APOYO LOGISTICO\"]",
    );
    let ruleset = Ruleset::from_toml_str(&rules).unwrap();
    let normalizer = AidNormalizer::new(Arc::new(ruleset), NormalizerPolicy::default());

    let logistics = raw(json!({"departamento": "CENTRAL", "evento": "APOY.LOG"}));
    assert!(normalizer.normalize_record(&logistics).is_none());
    assert!(normalizer.normalize_detailed(&logistics).is_discarded());

    let prepositioning = raw(json!({"departamento": "CENTRAL", "evento": "PREP.", "kit_a": 1}));
    assert_eq!(
        normalizer.normalize_record(&prepositioning).unwrap().event,
        "PREPOSICIONAMIENTO"
    );
}

#[test]
fn test_huge_quantities_summarize_without_overflow() {
    let normalizer = AidNormalizer::with_embedded_ruleset(NormalizerPolicy::default()).unwrap();
    let raws = vec![
        raw(json!({"departamento": "CENTRAL", "evento": "INUNDACION", "kit_a": "1e30"})),
        raw(json!({"departamento": "CENTRAL", "evento": "INUNDACION", "kit_a": 5})),
    ];
    let records = normalize_all(&normalizer, &raws);
    assert_eq!(records.len(), 2);

    let summaries = aggregate::summarize(&records, GroupBy::Department);
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].totals.kit_a, i64::MAX);
    assert_eq!(summaries[0].total_aid, i64::MAX);
}

#[test]
fn test_broken_ruleset_is_rejected() {
    assert!(Ruleset::from_toml_str("version = \"\"").is_err());

    let bad_pattern = DEFAULT_RULES.to_string()
        + "\n[[events.patterns]]\npattern = \"(unclosed\"\ncategory = \"INCENDIO\"\n";
    assert!(Ruleset::from_toml_str(&bad_pattern).is_err());
}

#[test]
fn test_quality_gate_over_normalized_records() {
    let normalizer = AidNormalizer::with_embedded_ruleset(NormalizerPolicy::default()).unwrap();
    let gate = DefaultQualityGate::new();

    let clean = raw(json!({
        "fecha": "2022-03-14",
        "departamento": "CENTRAL",
        "distrito": "Luque",
        "localidad": "Centro",
        "evento": "INUNDACION",
        "colchones": 10
    }));
    let NormalizationOutcome::Kept(normalized) = normalizer.normalize_detailed(&clean) else {
        panic!("record should be kept");
    };
    assert_eq!(gate.assess(&normalized).quality_assessment.decision, QualityDecision::Accept);

    let negative = raw(json!({
        "fecha": "2022-03-14",
        "departamento": "CENTRAL",
        "distrito": "Luque",
        "localidad": "Centro",
        "evento": "INUNDACION",
        "colchones": -10
    }));
    let NormalizationOutcome::Kept(normalized) = normalizer.normalize_detailed(&negative) else {
        panic!("record should be kept");
    };
    assert_eq!(normalized.record.aid.colchones, -10);
    assert_ne!(gate.assess(&normalized).quality_assessment.decision, QualityDecision::Accept);
}
