//! NDJSON metric aggregation.
//!
//! The classifier reads lines, the reducer summarizes metric buffers and
//! the aggregator assembles both into one result.

pub mod aggregator;
pub mod classifier;
pub mod reducer;

pub use aggregator::*;
