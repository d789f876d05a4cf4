use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The nine persisted aid-quantity columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AidField {
    KitB,
    KitA,
    ChapaFibrocemento,
    ChapaZinc,
    Colchones,
    Frazadas,
    Terciadas,
    Puntales,
    CarpasPlasticas,
}

impl AidField {
    pub const ALL: [AidField; 9] = [
        AidField::KitB,
        AidField::KitA,
        AidField::ChapaFibrocemento,
        AidField::ChapaZinc,
        AidField::Colchones,
        AidField::Frazadas,
        AidField::Terciadas,
        AidField::Puntales,
        AidField::CarpasPlasticas,
    ];

    /// Construction and bedding materials: everything that is not a kit.
    pub const MATERIALS: [AidField; 7] = [
        AidField::ChapaFibrocemento,
        AidField::ChapaZinc,
        AidField::Colchones,
        AidField::Frazadas,
        AidField::Terciadas,
        AidField::Puntales,
        AidField::CarpasPlasticas,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AidField::KitB => "kit_b",
            AidField::KitA => "kit_a",
            AidField::ChapaFibrocemento => "chapa_fibrocemento",
            AidField::ChapaZinc => "chapa_zinc",
            AidField::Colchones => "colchones",
            AidField::Frazadas => "frazadas",
            AidField::Terciadas => "terciadas",
            AidField::Puntales => "puntales",
            AidField::CarpasPlasticas => "carpas_plasticas",
        }
    }

    pub fn is_kit(&self) -> bool {
        matches!(self, AidField::KitA | AidField::KitB)
    }
}

impl fmt::Display for AidField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A distribution record as it sits in storage. Nothing here is trusted:
/// quantities may be strings, floats, empty or null, and text fields carry
/// whatever casing and typos the data entry produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, alias = "fecha")]
    pub date: Option<String>,
    #[serde(default, alias = "departamento")]
    pub department: Option<String>,
    #[serde(default, alias = "distrito")]
    pub district: Option<String>,
    #[serde(default, alias = "localidad")]
    pub locality: Option<String>,
    #[serde(default, alias = "evento")]
    pub event: Option<String>,
    #[serde(default)]
    pub kit_b: Value,
    #[serde(default)]
    pub kit_a: Value,
    #[serde(default)]
    pub chapa_fibrocemento: Value,
    #[serde(default)]
    pub chapa_zinc: Value,
    #[serde(default)]
    pub colchones: Value,
    #[serde(default)]
    pub frazadas: Value,
    #[serde(default)]
    pub terciadas: Value,
    #[serde(default)]
    pub puntales: Value,
    #[serde(default)]
    pub carpas_plasticas: Value,
    /// Food-supply quantity. Not one of the nine persisted columns; only
    /// present when the source export carries it.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub viveres: Value,
}

impl RawRecord {
    pub fn aid_value(&self, field: AidField) -> &Value {
        match field {
            AidField::KitB => &self.kit_b,
            AidField::KitA => &self.kit_a,
            AidField::ChapaFibrocemento => &self.chapa_fibrocemento,
            AidField::ChapaZinc => &self.chapa_zinc,
            AidField::Colchones => &self.colchones,
            AidField::Frazadas => &self.frazadas,
            AidField::Terciadas => &self.terciadas,
            AidField::Puntales => &self.puntales,
            AidField::CarpasPlasticas => &self.carpas_plasticas,
        }
    }

    pub fn set_aid_value(&mut self, field: AidField, value: Value) {
        let slot = match field {
            AidField::KitB => &mut self.kit_b,
            AidField::KitA => &mut self.kit_a,
            AidField::ChapaFibrocemento => &mut self.chapa_fibrocemento,
            AidField::ChapaZinc => &mut self.chapa_zinc,
            AidField::Colchones => &mut self.colchones,
            AidField::Frazadas => &mut self.frazadas,
            AidField::Terciadas => &mut self.terciadas,
            AidField::Puntales => &mut self.puntales,
            AidField::CarpasPlasticas => &mut self.carpas_plasticas,
        };
        *slot = value;
    }
}

/// Coerced aid quantities. Every field is always a valid integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AidQuantities {
    pub kit_b: i64,
    pub kit_a: i64,
    pub chapa_fibrocemento: i64,
    pub chapa_zinc: i64,
    pub colchones: i64,
    pub frazadas: i64,
    pub terciadas: i64,
    pub puntales: i64,
    pub carpas_plasticas: i64,
}

impl AidQuantities {
    pub fn get(&self, field: AidField) -> i64 {
        match field {
            AidField::KitB => self.kit_b,
            AidField::KitA => self.kit_a,
            AidField::ChapaFibrocemento => self.chapa_fibrocemento,
            AidField::ChapaZinc => self.chapa_zinc,
            AidField::Colchones => self.colchones,
            AidField::Frazadas => self.frazadas,
            AidField::Terciadas => self.terciadas,
            AidField::Puntales => self.puntales,
            AidField::CarpasPlasticas => self.carpas_plasticas,
        }
    }

    pub fn set(&mut self, field: AidField, value: i64) {
        match field {
            AidField::KitB => self.kit_b = value,
            AidField::KitA => self.kit_a = value,
            AidField::ChapaFibrocemento => self.chapa_fibrocemento = value,
            AidField::ChapaZinc => self.chapa_zinc = value,
            AidField::Colchones => self.colchones = value,
            AidField::Frazadas => self.frazadas = value,
            AidField::Terciadas => self.terciadas = value,
            AidField::Puntales => self.puntales = value,
            AidField::CarpasPlasticas => self.carpas_plasticas = value,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (AidField, i64)> + '_ {
        AidField::ALL.iter().map(move |f| (*f, self.get(*f)))
    }

    /// Sum of all nine fields, saturating at the `i64` bounds.
    pub fn total(&self) -> i64 {
        AidField::ALL
            .iter()
            .fold(0i64, |acc, f| acc.saturating_add(self.get(*f)))
    }

    pub fn kits(&self) -> i64 {
        AidField::ALL
            .iter()
            .filter(|f| f.is_kit())
            .fold(0i64, |acc, f| acc.saturating_add(self.get(*f)))
    }

    pub fn any_material(&self) -> bool {
        AidField::MATERIALS.iter().any(|f| self.get(*f) > 0)
    }

    pub fn no_materials(&self) -> bool {
        AidField::MATERIALS.iter().all(|f| self.get(*f) == 0)
    }

    /// Field-wise saturating sum, used by the aggregation path.
    pub fn accumulate(&mut self, other: &AidQuantities) {
        for field in AidField::ALL {
            self.set(field, self.get(field).saturating_add(other.get(field)));
        }
    }
}

/// A record after normalization, ready for aggregation or write-back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub department: String,
    pub district: String,
    pub locality: String,
    pub event: String,
    #[serde(flatten)]
    pub aid: AidQuantities,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viveres: Option<i64>,
}

impl CanonicalRecord {
    pub fn year(&self) -> Option<i32> {
        self.date.map(|d| d.year())
    }

    pub fn month(&self) -> Option<u32> {
        self.date.map(|d| d.month())
    }

    pub fn total_aid(&self) -> i64 {
        self.aid.total()
    }

    /// Denormalize back into the storage shape, as the batch job writes it.
    pub fn to_raw(&self) -> RawRecord {
        let mut raw = RawRecord {
            id: self.id,
            date: self.date.map(|d| d.format("%Y-%m-%d").to_string()),
            department: Some(self.department.clone()),
            district: Some(self.district.clone()),
            locality: Some(self.locality.clone()),
            event: Some(self.event.clone()),
            viveres: self.viveres.map(Value::from).unwrap_or(Value::Null),
            ..RawRecord::default()
        };
        for (field, value) in self.aid.iter() {
            raw.set_aid_value(field, Value::from(value));
        }
        raw
    }
}
