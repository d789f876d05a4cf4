pub mod ports;
pub mod cleanup_use_case;
pub mod report_use_case;
