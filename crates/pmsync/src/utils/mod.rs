pub mod fs;
pub mod time;

pub use fs::write_atomic;
pub use time::{format_day, format_generated, format_iso_timestamp, parse_iso_datetime};
