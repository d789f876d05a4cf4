// Record processing: normalization, quality assessment and aggregation

pub mod processing;
