//! # Fieldchip Parallel
//!
//! Batch execution of per-row pipeline stages over a catalog.
//!
//! This crate provides:
//! - `ProcessingMode`: sequential or data-parallel execution, with an
//!   optional worker-count override
//! - `run_batch`: ordered map over catalog rows where one row's failure
//!   never aborts the batch

pub mod batch;
pub mod strategy;

pub use batch::{failures, run_batch, successes, RowOutcome};
pub use strategy::{num_workers, ParallelStrategy, ProcessingMode};
