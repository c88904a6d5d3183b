pub mod compose_use_case;
pub mod merge;
pub mod ports;
