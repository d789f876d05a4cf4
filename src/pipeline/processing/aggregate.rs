//! Pure summaries over canonical records for the read path: grouped totals,
//! general statistics, department map points and the paginated table.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::domain::{AidQuantities, CanonicalRecord};

/// Dimension a summary is grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Department,
    /// Department and district
    District,
    Locality,
    Event,
    /// Department and event
    DepartmentEvent,
    Year,
    /// Year and month
    Month,
}

impl GroupBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Department => "department",
            GroupBy::District => "district",
            GroupBy::Locality => "locality",
            GroupBy::Event => "event",
            GroupBy::DepartmentEvent => "department_event",
            GroupBy::Year => "year",
            GroupBy::Month => "month",
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Totals for one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Group key parts, outermost first (e.g. department then district)
    pub key: Vec<String>,
    pub total_records: usize,
    pub totals: AidQuantities,
    pub total_aid: i64,
}

impl GroupSummary {
    fn new(key: Vec<String>) -> Self {
        Self {
            key,
            total_records: 0,
            totals: AidQuantities::default(),
            total_aid: 0,
        }
    }

    fn add(&mut self, record: &CanonicalRecord) {
        self.total_records += 1;
        self.totals.accumulate(&record.aid);
        self.total_aid = self.totals.total();
    }

    pub fn label(&self) -> String {
        self.key.join(" / ")
    }
}

fn group_key(record: &CanonicalRecord, group_by: GroupBy) -> Option<Vec<String>> {
    let key = match group_by {
        GroupBy::Department => vec![record.department.clone()],
        GroupBy::District => vec![record.department.clone(), record.district.clone()],
        GroupBy::Locality => vec![record.locality.clone()],
        GroupBy::Event => vec![record.event.clone()],
        GroupBy::DepartmentEvent => vec![record.department.clone(), record.event.clone()],
        GroupBy::Year => vec![record.year()?.to_string()],
        GroupBy::Month => {
            let date = record.date?;
            vec![date.format("%Y").to_string(), date.format("%m").to_string()]
        }
    };
    Some(key)
}

/// Group records and sum their aid. Records without a date are left out of
/// the year and month groupings.
pub fn summarize(records: &[CanonicalRecord], group_by: GroupBy) -> Vec<GroupSummary> {
    let mut groups: BTreeMap<Vec<String>, GroupSummary> = BTreeMap::new();
    for record in records {
        let Some(key) = group_key(record, group_by) else {
            continue;
        };
        groups
            .entry(key.clone())
            .or_insert_with(|| GroupSummary::new(key))
            .add(record);
    }

    // BTreeMap order is already key-ascending
    let mut summaries: Vec<GroupSummary> = groups.into_values().collect();
    match group_by {
        GroupBy::Department | GroupBy::Locality => {
            summaries.sort_by(|a, b| b.total_aid.cmp(&a.total_aid).then_with(|| a.key.cmp(&b.key)))
        }
        GroupBy::District => summaries.sort_by(|a, b| {
            a.key[0]
                .cmp(&b.key[0])
                .then_with(|| b.total_aid.cmp(&a.total_aid))
                .then_with(|| a.key.cmp(&b.key))
        }),
        GroupBy::Event => summaries.sort_by(|a, b| {
            b.total_records
                .cmp(&a.total_records)
                .then_with(|| a.key.cmp(&b.key))
        }),
        GroupBy::DepartmentEvent => summaries.sort_by(|a, b| {
            a.key[0]
                .cmp(&b.key[0])
                .then_with(|| b.total_records.cmp(&a.total_records))
                .then_with(|| a.key.cmp(&b.key))
        }),
        GroupBy::Year | GroupBy::Month => {}
    }
    summaries
}

/// Headline numbers for the whole dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralStats {
    pub total_records: usize,
    pub total_departments: usize,
    pub total_localities: usize,
    pub earliest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
    pub undated_records: usize,
    pub total_kits: i64,
    pub total_aid: i64,
    pub departments: Vec<String>,
    pub events: Vec<String>,
}

pub fn general_stats(records: &[CanonicalRecord]) -> GeneralStats {
    let mut departments = BTreeSet::new();
    let mut localities = BTreeSet::new();
    let mut events = BTreeSet::new();
    let mut totals = AidQuantities::default();
    let mut earliest: Option<NaiveDate> = None;
    let mut latest: Option<NaiveDate> = None;
    let mut undated = 0;

    for record in records {
        departments.insert(record.department.clone());
        localities.insert(record.locality.clone());
        events.insert(record.event.clone());
        totals.accumulate(&record.aid);
        match record.date {
            Some(date) => {
                earliest = Some(earliest.map_or(date, |e| e.min(date)));
                latest = Some(latest.map_or(date, |l| l.max(date)));
            }
            None => undated += 1,
        }
    }

    GeneralStats {
        total_records: records.len(),
        total_departments: departments.len(),
        total_localities: localities.len(),
        earliest_date: earliest,
        latest_date: latest,
        undated_records: undated,
        total_kits: totals.kits(),
        total_aid: totals.total(),
        departments: departments.into_iter().collect(),
        events: events.into_iter().collect(),
    }
}

/// Map center and zoom for a department
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
    pub zoom: u8,
}

/// Center of Paraguay, used for anything not in the table
pub const DEFAULT_COORDINATES: Coordinates = Coordinates {
    lat: -23.442503,
    lng: -58.443832,
    zoom: 6,
};

static DEPARTMENT_COORDINATES: Lazy<HashMap<&'static str, Coordinates>> = Lazy::new(|| {
    let c = |lat, lng, zoom| Coordinates { lat, lng, zoom };
    HashMap::from([
        ("CAPITAL", c(-25.2967, -57.6359, 12)),
        ("CENTRAL", c(-25.3637, -57.4259, 10)),
        ("ALTO PARANÁ", c(-25.5163, -54.6436, 9)),
        ("ITAPÚA", c(-26.8753, -55.9178, 9)),
        ("CAAGUAZÚ", c(-25.4669, -56.0175, 9)),
        ("SAN PEDRO", c(-24.0669, -57.0789, 9)),
        ("CORDILLERA", c(-25.3219, -56.8467, 9)),
        ("GUAIRÁ", c(-25.7833, -56.4500, 9)),
        ("CAAZAPÁ", c(-26.1978, -56.3711, 9)),
        ("MISIONES", c(-26.8833, -57.0833, 9)),
        ("PARAGUARÍ", c(-25.6319, -57.1456, 9)),
        ("ALTO PARAGUAY", c(-20.3167, -58.1833, 8)),
        ("PDTE. HAYES", c(-23.3500, -59.0500, 8)),
        ("BOQUERON", c(-22.6833, -60.4167, 8)),
        ("AMAMBAY", c(-22.5667, -56.0333, 9)),
        ("CANINDEYÚ", c(-24.1167, -55.1667, 9)),
        ("CONCEPCIÓN", c(-23.4167, -57.4333, 9)),
        ("ÑEEMBUCÚ", c(-26.9167, -58.2833, 9)),
    ])
});

pub fn department_coordinates(department: &str) -> Coordinates {
    DEPARTMENT_COORDINATES
        .get(department)
        .copied()
        .unwrap_or(DEFAULT_COORDINATES)
}

/// One department marker for the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub department: String,
    #[serde(flatten)]
    pub coordinates: Coordinates,
    pub total_records: usize,
    pub total_aid: i64,
    pub total_kits: i64,
    pub total_chapa_fibrocemento: i64,
    pub total_chapa_zinc: i64,
}

pub fn map_points(records: &[CanonicalRecord]) -> Vec<MapPoint> {
    summarize(records, GroupBy::Department)
        .into_iter()
        .map(|group| {
            let department = group.key.into_iter().next().unwrap_or_default();
            MapPoint {
                coordinates: department_coordinates(&department),
                department,
                total_records: group.total_records,
                total_aid: group.total_aid,
                total_kits: group.totals.kits(),
                total_chapa_fibrocemento: group.totals.chapa_fibrocemento,
                total_chapa_zinc: group.totals.chapa_zinc,
            }
        })
        .collect()
}

/// A row of the record table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub id: Option<i64>,
    pub fecha: Option<NaiveDate>,
    pub localidad: String,
    pub distrito: String,
    pub departamento: String,
    pub evento: String,
    pub kit_a: i64,
    pub kit_b: i64,
    pub total_ayudas: i64,
}

impl From<&CanonicalRecord> for TableRow {
    fn from(record: &CanonicalRecord) -> Self {
        Self {
            id: record.id,
            fecha: record.date,
            localidad: record.locality.clone(),
            distrito: record.district.clone(),
            departamento: record.department.clone(),
            evento: record.event.clone(),
            kit_a: record.aid.kit_a,
            kit_b: record.aid.kit_b,
            total_ayudas: record.total_aid(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePage {
    pub data: Vec<TableRow>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

/// Newest records first, undated records last. Pages are 1-based; a page
/// past the end is empty.
pub fn paginate(records: &[CanonicalRecord], page: usize, per_page: usize) -> TablePage {
    let page = page.max(1);
    let per_page = per_page.max(1);

    let mut ordered: Vec<&CanonicalRecord> = records.iter().collect();
    ordered.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));

    let total = ordered.len();
    let data = ordered
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .map(TableRow::from)
        .collect();

    TablePage {
        data,
        total,
        page,
        per_page,
        total_pages: total.div_ceil(per_page),
    }
}
