use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::constants::{
    EVENT_DROUGHT, EVENT_EXTREME_VULNERABILITY, EVENT_FIRE, EVENT_FLOOD, EVENT_SOUP_KITCHEN,
    NO_EVENT,
};
use crate::domain::AidQuantities;
use crate::pipeline::processing::normalize::ruleset::Ruleset;

/// Label for records that match no reclassification rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResidualEventPolicy {
    /// Force `EXTREMA VULNERABILIDAD` (current ruleset).
    #[default]
    ExtremaVulnerabilidad,
    /// Leave `SIN EVENTO` in place (earlier rulesets).
    KeepSinEvento,
}

impl ResidualEventPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            ResidualEventPolicy::ExtremaVulnerabilidad => EVENT_EXTREME_VULNERABILITY,
            ResidualEventPolicy::KeepSinEvento => NO_EVENT,
        }
    }
}

/// The branch of the priority chain that decided the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReclassificationRule {
    Discarded,
    Unchanged,
    DroughtDepartment,
    KitSignal,
    HouseFire,
    PandemicFoodRelief,
    CapitalFlood,
    Residual,
}

impl ReclassificationRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReclassificationRule::Discarded => "discarded",
            ReclassificationRule::Unchanged => "unchanged",
            ReclassificationRule::DroughtDepartment => "drought_department",
            ReclassificationRule::KitSignal => "kit_signal",
            ReclassificationRule::HouseFire => "house_fire",
            ReclassificationRule::PandemicFoodRelief => "pandemic_food_relief",
            ReclassificationRule::CapitalFlood => "capital_flood",
            ReclassificationRule::Residual => "residual",
        }
    }
}

/// A record whose quantities are coerced and whose event is resolved, but
/// whose event has not been refined from the aid signal yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialRecord {
    pub department: String,
    /// Resolved event label, including labels the ruleset discards.
    pub event: String,
    pub date: Option<NaiveDate>,
    pub aid: AidQuantities,
    pub viveres: Option<i64>,
}

/// Refine an unlabeled event from the aid it carried. `None` drops the record.
pub fn reclassify_by_signal(
    record: &PartialRecord,
    ruleset: &Ruleset,
    residual: ResidualEventPolicy,
) -> Option<String> {
    reclassify_detailed(record, ruleset, residual).0
}

pub fn reclassify_detailed(
    record: &PartialRecord,
    ruleset: &Ruleset,
    residual: ResidualEventPolicy,
) -> (Option<String>, ReclassificationRule) {
    if ruleset.is_discarded_event(&record.event) {
        return (None, ReclassificationRule::Discarded);
    }
    if record.event != NO_EVENT {
        return (Some(record.event.clone()), ReclassificationRule::Unchanged);
    }

    let (label, rule) = if ruleset.is_drought_department(&record.department) {
        (EVENT_DROUGHT, ReclassificationRule::DroughtDepartment)
    } else if record.aid.kit_a > 0 || record.aid.kit_b > 0 {
        (EVENT_EXTREME_VULNERABILITY, ReclassificationRule::KitSignal)
    } else if small_food_ration(record, ruleset) && record.aid.any_material() {
        (EVENT_FIRE, ReclassificationRule::HouseFire)
    } else if small_food_ration(record, ruleset)
        && record
            .date
            .map(|d| ruleset.is_pandemic_year(d.year()))
            .unwrap_or(false)
    {
        (EVENT_SOUP_KITCHEN, ReclassificationRule::PandemicFoodRelief)
    } else if ruleset.is_capital(&record.department)
        && record.viveres.map(|v| v > 0).unwrap_or(false)
        && record.aid.no_materials()
    {
        (EVENT_FLOOD, ReclassificationRule::CapitalFlood)
    } else {
        (residual.label(), ReclassificationRule::Residual)
    };

    (Some(label.to_string()), rule)
}

fn small_food_ration(record: &PartialRecord, ruleset: &Ruleset) -> bool {
    record
        .viveres
        .map(|v| v > 0 && v < ruleset.small_food_ration)
        .unwrap_or(false)
}
