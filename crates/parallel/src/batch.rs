//! Batch execution over catalog rows
//!
//! Drives a row function (chip extraction, label rasterization, or any
//! other per-row stage) over every row of a catalog. Each row runs
//! independently; a failing row is converted into a tagged outcome
//! instead of aborting the batch, and results come back in input order.

use crate::strategy::{ParallelStrategy, ProcessingMode};
use fieldchip_core::{CatalogRow, Result};
use tracing::{info, warn};

/// Result of one catalog row after a batch pass
#[derive(Debug, Clone)]
pub enum RowOutcome {
    /// The row function completed; carries the augmented row
    Success(CatalogRow),
    /// The row function failed; the batch continued without it
    Failure {
        /// Site name of the failing row
        name: String,
        /// Rendered error message
        message: String,
    },
}

impl RowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RowOutcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RowOutcome::Failure { .. })
    }
}

/// Run a row function over every catalog row.
///
/// Rows execute under the given [`ProcessingMode`]; results are returned
/// in the same order as the input rows regardless of completion order.
/// No retry happens here; a failed row is reported once and left for
/// the caller to re-run.
pub fn run_batch<F>(rows: &[CatalogRow], mode: ProcessingMode, row_fn: F) -> Vec<RowOutcome>
where
    F: Fn(&CatalogRow) -> Result<CatalogRow> + Sync + Send,
{
    let outcomes = mode.par_map(0..rows.len(), |index| {
        let row = &rows[index];
        match row_fn(row) {
            Ok(out_row) => RowOutcome::Success(out_row),
            Err(err) => {
                warn!("{}: {}", row.name, err);
                RowOutcome::Failure {
                    name: row.name.clone(),
                    message: err.to_string(),
                }
            }
        }
    });

    let failed = outcomes.iter().filter(|o| o.is_failure()).count();
    info!(
        "Completed run: {} rows, {} failed",
        outcomes.len(),
        failed
    );
    outcomes
}

/// Extract the successful rows from a batch, in order
pub fn successes(outcomes: &[RowOutcome]) -> Vec<CatalogRow> {
    outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            RowOutcome::Success(row) => Some(row.clone()),
            RowOutcome::Failure { .. } => None,
        })
        .collect()
}

/// Extract `(name, message)` pairs for the failed rows, in order
pub fn failures(outcomes: &[RowOutcome]) -> Vec<(String, String)> {
    outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            RowOutcome::Success(_) => None,
            RowOutcome::Failure { name, message } => Some((name.clone(), message.clone())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldchip_core::catalog::{parse_catalog, ColumnSpec};
    use fieldchip_core::Error;

    fn test_rows(n: usize) -> Vec<CatalogRow> {
        let records: Vec<String> = (0..n)
            .map(|i| {
                format!(
                    r#"{{"name": "site{i}", "x": 10.0, "y": 20.0, "date": "2021-07-15",
                        "assignment_id": "A{i}", "source_image": "site{i}_src.tif", "nflds": 1}}"#
                )
            })
            .collect();
        let text = format!("[{}]", records.join(","));
        parse_catalog(&text, &ColumnSpec::default()).unwrap()
    }

    #[test]
    fn test_batch_success_order() {
        let rows = test_rows(8);
        let outcomes = run_batch(&rows, ProcessingMode::Parallel, |row| {
            let mut out = row.clone();
            out.image = Some(format!("{}.tif", row.name));
            Ok(out)
        });

        assert_eq!(outcomes.len(), 8);
        for (i, outcome) in outcomes.iter().enumerate() {
            match outcome {
                RowOutcome::Success(row) => {
                    assert_eq!(row.name, format!("site{i}"));
                    assert_eq!(row.image.as_deref(), Some(format!("site{i}.tif").as_str()));
                }
                RowOutcome::Failure { .. } => panic!("unexpected failure at {i}"),
            }
        }
    }

    #[test]
    fn test_batch_isolates_single_failure() {
        let rows = test_rows(10);
        let outcomes = run_batch(&rows, ProcessingMode::Parallel, |row| {
            if row.name == "site4" {
                Err(Error::Other("deliberate failure".into()))
            } else {
                Ok(row.clone())
            }
        });

        // Same length and order as input, exactly one failure
        assert_eq!(outcomes.len(), 10);
        assert_eq!(outcomes.iter().filter(|o| o.is_failure()).count(), 1);
        assert!(outcomes[4].is_failure());

        let failed = failures(&outcomes);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "site4");
        assert!(failed[0].1.contains("deliberate failure"));

        let ok = successes(&outcomes);
        assert_eq!(ok.len(), 9);
        assert_eq!(ok[4].name, "site5");
    }

    #[test]
    fn test_batch_sequential_matches_parallel() {
        let rows = test_rows(5);
        let seq = run_batch(&rows, ProcessingMode::Sequential, |row| Ok(row.clone()));
        let par = run_batch(&rows, ProcessingMode::ParallelWith(3), |row| Ok(row.clone()));

        assert_eq!(seq.len(), par.len());
        for (a, b) in seq.iter().zip(par.iter()) {
            match (a, b) {
                (RowOutcome::Success(ra), RowOutcome::Success(rb)) => {
                    assert_eq!(ra.name, rb.name)
                }
                _ => panic!("expected success in both modes"),
            }
        }
    }

    #[test]
    fn test_batch_empty_catalog() {
        let outcomes = run_batch(&[], ProcessingMode::Parallel, |row| Ok(row.clone()));
        assert!(outcomes.is_empty());
    }
}
