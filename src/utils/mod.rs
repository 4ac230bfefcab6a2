//! Shared numeric helpers

pub mod stats;

pub use stats::{corrcoef, nanmean_columns};
