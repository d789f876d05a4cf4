// Individual normalization rules, applied by the pipeline in this order:
// numeric -> text -> department -> event -> date -> reclassify
pub mod date;
pub mod department;
pub mod event;
pub mod numeric;
pub mod reclassify;
pub mod text;

// Re-export the rule entry points
pub use date::parse_record_date;
pub use department::{resolve_department, DepartmentResolution};
pub use event::{resolve_event, resolve_event_detailed, EventResolution, EventRule, UnmatchedEventPolicy};
pub use numeric::{coerce_aid_quantity, coerce_optional_quantity, coerce_with_policy, NegativeQuantityPolicy};
pub use reclassify::{
    reclassify_by_signal, reclassify_detailed, PartialRecord, ReclassificationRule,
    ResidualEventPolicy,
};
pub use text::canonicalize_text;
