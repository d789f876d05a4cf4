use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::rules::text::fold_accents;
use crate::constants::{
    DEPARTMENT_CAPITAL, EVENT_DROUGHT, EVENT_EXTREME_VULNERABILITY, EVENT_FIRE, EVENT_FLOOD,
    EVENT_SOUP_KITCHEN, NO_EVENT,
};
use crate::error::{NormalizerError, Result};

/// The ruleset shipped with the crate.
pub const EMBEDDED_RULESET: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/rules/default.toml"));

/// On-disk shape of a ruleset document.
#[derive(Debug, Deserialize)]
pub struct RulesetDocument {
    pub version: String,
    pub departments: DepartmentRulesDocument,
    #[serde(default)]
    pub districts: BTreeMap<String, String>,
    pub events: EventRulesDocument,
}

#[derive(Debug, Deserialize)]
pub struct DepartmentRulesDocument {
    pub catch_all: Vec<String>,
    pub fallback: String,
    pub separators: Vec<String>,
    pub drought: Vec<String>,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct EventRulesDocument {
    pub discard: Vec<String>,
    pub pandemic_years: Vec<i32>,
    pub small_food_ration: i64,
    #[serde(default)]
    pub canonical: Vec<String>,
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub patterns: Vec<EventPatternDocument>,
    #[serde(default)]
    pub keywords: Vec<EventKeywordDocument>,
}

#[derive(Debug, Deserialize)]
pub struct EventPatternDocument {
    pub pattern: String,
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct EventKeywordDocument {
    pub keyword: String,
    pub category: String,
}

#[derive(Debug, Clone)]
pub struct EventPattern {
    pub regex: Regex,
    pub category: String,
}

#[derive(Debug, Clone)]
pub struct EventKeyword {
    /// Uppercase, accent-folded needle.
    pub keyword: String,
    pub category: String,
}

/// A compiled, immutable ruleset. Built once and shared read-only.
#[derive(Debug, Clone)]
pub struct Ruleset {
    pub version: String,
    pub department_aliases: HashMap<String, String>,
    pub catch_all_departments: Vec<String>,
    pub fallback_department: String,
    pub compound_separators: Vec<String>,
    pub drought_departments: Vec<String>,
    /// Accent-folded district name -> parent department.
    pub district_departments: HashMap<String, String>,
    pub event_aliases: HashMap<String, String>,
    pub canonical_events: HashSet<String>,
    pub discard_events: HashSet<String>,
    pub event_patterns: Vec<EventPattern>,
    pub event_keywords: Vec<EventKeyword>,
    pub pandemic_years: Vec<i32>,
    pub small_food_ration: i64,
}

fn table_key(key: &str) -> String {
    key.trim().to_uppercase()
}

fn fold_table(
    table: &BTreeMap<String, String>,
    name: &str,
    key_fn: impl Fn(&str) -> String,
) -> Result<HashMap<String, String>> {
    let mut folded = HashMap::with_capacity(table.len());
    for (key, value) in table {
        let normalized = key_fn(key);
        let value = value.trim().to_string();
        if let Some(existing) = folded.get(&normalized) {
            if existing != &value {
                return Err(NormalizerError::Ruleset(format!(
                    "{} key '{}' maps to both '{}' and '{}'",
                    name, normalized, existing, value
                )));
            }
        }
        folded.insert(normalized, value);
    }
    Ok(folded)
}

impl Ruleset {
    /// Compile the ruleset embedded in the binary.
    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(EMBEDDED_RULESET)
    }

    /// Load and compile a ruleset from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            NormalizerError::Ruleset(format!(
                "Failed to read ruleset file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let ruleset = Self::from_toml_str(&content)?;
        info!(path = %path.display(), version = %ruleset.version, "Loaded ruleset");
        Ok(ruleset)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let document: RulesetDocument = toml::from_str(content)?;
        Self::compile(document)
    }

    pub fn compile(document: RulesetDocument) -> Result<Self> {
        if document.version.trim().is_empty() {
            return Err(NormalizerError::Ruleset("ruleset version is empty".to_string()));
        }
        if document.departments.separators.iter().any(|s| s.is_empty()) {
            return Err(NormalizerError::Ruleset(
                "department separators must not be empty".to_string(),
            ));
        }

        let department_aliases =
            fold_table(&document.departments.aliases, "department alias", table_key)?;
        let district_departments = fold_table(&document.districts, "district", |k| {
            fold_accents(&table_key(k))
        })?;
        let event_aliases = fold_table(&document.events.aliases, "event alias", table_key)?;

        let mut event_patterns = Vec::with_capacity(document.events.patterns.len());
        for p in &document.events.patterns {
            event_patterns.push(EventPattern {
                regex: Regex::new(&p.pattern)?,
                category: p.category.trim().to_string(),
            });
        }

        let event_keywords: Vec<EventKeyword> = document
            .events
            .keywords
            .iter()
            .filter(|k| !k.keyword.trim().is_empty())
            .map(|k| EventKeyword {
                keyword: fold_accents(&table_key(&k.keyword)),
                category: k.category.trim().to_string(),
            })
            .collect();

        let discard_events: HashSet<String> =
            document.events.discard.iter().map(|e| table_key(e)).collect();

        // Every label the rules can produce is canonical, so re-normalizing a
        // canonical record maps each event onto itself.
        let mut canonical_events: HashSet<String> =
            document.events.canonical.iter().map(|e| table_key(e)).collect();
        canonical_events.extend(event_aliases.values().cloned());
        canonical_events.extend(event_patterns.iter().map(|p| p.category.clone()));
        canonical_events.extend(event_keywords.iter().map(|k| k.category.clone()));
        canonical_events.extend(discard_events.iter().cloned());
        for label in [
            NO_EVENT,
            EVENT_DROUGHT,
            EVENT_EXTREME_VULNERABILITY,
            EVENT_FIRE,
            EVENT_SOUP_KITCHEN,
            EVENT_FLOOD,
        ] {
            canonical_events.insert(label.to_string());
        }

        let ruleset = Self {
            version: document.version.trim().to_string(),
            department_aliases,
            catch_all_departments: document
                .departments
                .catch_all
                .iter()
                .map(|d| table_key(d))
                .collect(),
            fallback_department: table_key(&document.departments.fallback),
            compound_separators: document.departments.separators.clone(),
            drought_departments: document
                .departments
                .drought
                .iter()
                .map(|d| table_key(d))
                .collect(),
            district_departments,
            event_aliases,
            canonical_events,
            discard_events,
            event_patterns,
            event_keywords,
            pandemic_years: document.events.pandemic_years.clone(),
            small_food_ration: document.events.small_food_ration,
        };

        debug!(
            version = %ruleset.version,
            department_aliases = ruleset.department_aliases.len(),
            districts = ruleset.district_departments.len(),
            event_aliases = ruleset.event_aliases.len(),
            patterns = ruleset.event_patterns.len(),
            keywords = ruleset.event_keywords.len(),
            "Compiled ruleset"
        );

        Ok(ruleset)
    }

    pub fn is_catch_all(&self, department: &str) -> bool {
        self.catch_all_departments.iter().any(|d| d == department)
    }

    pub fn is_drought_department(&self, department: &str) -> bool {
        self.drought_departments.iter().any(|d| d == department)
    }

    pub fn is_capital(&self, department: &str) -> bool {
        department == DEPARTMENT_CAPITAL
    }

    pub fn is_discarded_event(&self, event: &str) -> bool {
        self.discard_events.contains(event)
    }

    pub fn is_canonical_event(&self, event: &str) -> bool {
        self.canonical_events.contains(event)
    }

    pub fn is_pandemic_year(&self, year: i32) -> bool {
        self.pandemic_years.contains(&year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_ruleset_compiles() {
        let ruleset = Ruleset::embedded().unwrap();
        assert!(!ruleset.version.is_empty());
        assert_eq!(ruleset.fallback_department, "CENTRAL");
        assert_eq!(
            ruleset.compound_separators,
            vec![" - ", " / ", ", ", " Y "]
        );
        assert_eq!(ruleset.district_departments.get("LIMPIO").map(String::as_str), Some("CENTRAL"));
        assert_eq!(
            ruleset.event_aliases.get("PREP.").map(String::as_str),
            Some("PREPOSICIONAMIENTO")
        );
        assert!(ruleset.is_discarded_event("PREPOSICIONAMIENTO"));
        assert!(ruleset.is_canonical_event("EXTREMA VULNERABILIDAD"));
    }

    #[test]
    fn test_district_keys_are_accent_folded() {
        let ruleset = Ruleset::from_toml_str(
            r#"
            version = "test"
            [departments]
            catch_all = []
            fallback = "CENTRAL"
            separators = [" - "]
            drought = []
            [districts]
            "Ñemby" = "CENTRAL"
            "Itauguá" = "CENTRAL"
            [events]
            discard = []
            pandemic_years = []
            small_food_ration = 10
            "#,
        )
        .unwrap();
        assert!(ruleset.district_departments.contains_key("NEMBY"));
        assert!(ruleset.district_departments.contains_key("ITAUGUA"));
    }

    #[test]
    fn test_conflicting_aliases_are_rejected() {
        let result = Ruleset::from_toml_str(
            r#"
            version = "test"
            [departments]
            catch_all = []
            fallback = "CENTRAL"
            separators = []
            drought = []
            [departments.aliases]
            "guaira" = "GUAIRÁ"
            "GUAIRA" = "CAAZAPÁ"
            [events]
            discard = []
            pandemic_years = []
            small_food_ration = 10
            "#,
        );
        assert!(matches!(result, Err(NormalizerError::Ruleset(_))));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let result = Ruleset::from_toml_str(
            r#"
            version = "test"
            [departments]
            catch_all = []
            fallback = "CENTRAL"
            separators = []
            drought = []
            [events]
            discard = []
            pandemic_years = []
            small_food_ration = 10
            [[events.patterns]]
            pattern = "(unclosed"
            category = "X"
            "#,
        );
        assert!(matches!(result, Err(NormalizerError::Regex(_))));
    }
}
