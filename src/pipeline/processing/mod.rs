// Pipeline processing: normalization, quality checks and summaries

pub mod normalize;
pub mod quality_gate;
pub mod aggregate;
