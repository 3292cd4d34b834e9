//! LoadReport - k6 NDJSON results aggregation.
//!
//! The [`analysis`] module turns raw NDJSON text into an
//! [`AggregatedResult`](models::AggregatedResult); [`report`] renders it
//! and [`live`] keeps it current while a test is running.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod live;
pub mod models;
pub mod report;

pub use analysis::{aggregate_file, aggregate_reader, aggregate_str, AggregateOptions};
pub use error::AggregateError;
pub use models::AggregatedResult;
