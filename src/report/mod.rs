//! Run aggregation and reporting.
//!
//! - [`aggregator`] — drives the per-package pipeline and writes `Index.csv`,
//!   the per-license group files and the consolidated license text bundle.
//! - [`terminal`] — colored end-of-run summary; respects `--verbose` / `--quiet`.

pub mod aggregator;
pub mod terminal;
