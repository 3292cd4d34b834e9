//! Report rendering.
//!
//! HTML page, JSON snapshot and console summary, all built from an
//! aggregated result.

pub mod generator;
pub mod summary;

pub use generator::{generate_html_report, write_html_report, write_json_report};
pub use summary::generate_console_summary;
