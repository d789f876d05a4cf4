use serde::{Deserialize, Serialize};

use super::text::{fold_accents, is_blank, upper_key};
use crate::constants::{is_canonical_department, NO_DEPARTMENT};
use crate::pipeline::processing::normalize::ruleset::Ruleset;

/// Result of resolving the department column against the district column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentResolution {
    pub department: String,
    /// Set when the department value was really a district name; holds the
    /// original value so the caller can backfill the district column.
    pub district: Option<String>,
    /// Whether the final value is one of the official department names.
    pub mapped: bool,
}

impl DepartmentResolution {
    pub fn swapped(&self) -> bool {
        self.district.is_some()
    }
}

/// Resolve a free-text department, repairing district-as-department entries,
/// collapsing catch-all buckets, splitting compound values and applying the
/// alias table. Never returns an empty department.
pub fn resolve_department(
    raw_department: Option<&str>,
    raw_district: Option<&str>,
    ruleset: &Ruleset,
) -> DepartmentResolution {
    let mut department = match raw_department {
        Some(d) if !d.trim().is_empty() => upper_key(d),
        _ => NO_DEPARTMENT.to_string(),
    };
    let mut backfilled_district = None;

    if is_blank(raw_district) && !is_canonical_department(&department) {
        if let Some(parent) = ruleset.district_departments.get(&fold_accents(&department)) {
            backfilled_district = raw_department.map(|d| d.trim().to_string());
            department = parent.clone();
        }
    }

    if ruleset.is_catch_all(&department) {
        department = ruleset.fallback_department.clone();
    }

    if let Some(separator) = ruleset
        .compound_separators
        .iter()
        .find(|sep| department.contains(sep.as_str()))
    {
        if let Some((first, _)) = department.split_once(separator.as_str()) {
            department = first.trim().to_string();
        }
    }

    if let Some(alias) = ruleset.department_aliases.get(&department) {
        department = alias.clone();
    }

    // Aliases such as "VARIOS DPTOS." expand into a catch-all label.
    if ruleset.is_catch_all(&department) || department.is_empty() {
        department = ruleset.fallback_department.clone();
    }

    DepartmentResolution {
        mapped: is_canonical_department(&department),
        department,
        district: backfilled_district,
    }
}
