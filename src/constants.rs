//! Sentinel values and canonical names shared across the normalizer.
//! Lookup tables live in the ruleset; only the labels the rules themselves
//! reason about are pinned here.

// Text sentinels
pub const UNSPECIFIED: &str = "SIN ESPECIFICAR";
pub const NO_DEPARTMENT: &str = "SIN_DEPARTAMENTO";
pub const NO_EVENT: &str = "SIN EVENTO";

// Event labels produced by the reclassification chain
pub const EVENT_DROUGHT: &str = "SEQUIA";
pub const EVENT_EXTREME_VULNERABILITY: &str = "EXTREMA VULNERABILIDAD";
pub const EVENT_FIRE: &str = "INCENDIO";
pub const EVENT_SOUP_KITCHEN: &str = "OLLA POPULAR";
pub const EVENT_FLOOD: &str = "INUNDACION";

// Department the rules reference by name
pub const DEPARTMENT_CAPITAL: &str = "CAPITAL";

/// The 18 official department names (17 departments plus the capital).
pub const CANONICAL_DEPARTMENTS: [&str; 18] = [
    "CAPITAL",
    "CONCEPCIÓN",
    "SAN PEDRO",
    "CORDILLERA",
    "GUAIRÁ",
    "CAAGUAZÚ",
    "CAAZAPÁ",
    "ITAPÚA",
    "MISIONES",
    "PARAGUARÍ",
    "ALTO PARANÁ",
    "CENTRAL",
    "ÑEEMBUCÚ",
    "AMAMBAY",
    "CANINDEYÚ",
    "PDTE. HAYES",
    "BOQUERON",
    "ALTO PARAGUAY",
];

pub fn is_canonical_department(name: &str) -> bool {
    CANONICAL_DEPARTMENTS.contains(&name)
}
