//! Logging facilities for Lattice Data.
//!
//! Lattice Data uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("lattice_data=debug")
//!     .init();
//! ```
//!
//! The [`targets`] constants name the subsystems so they can be filtered
//! individually, and [`PerfSpan`] marks the duration of the heavier
//! operations (sorting, filter recomputation).

/// Span names used throughout Lattice Data for tracing.
pub mod span_names {
    /// Full sort of a container.
    pub const SORT: &str = "lattice_data::sort";
    /// Visible-sequence recomputation.
    pub const FILTER: &str = "lattice_data::filter";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "lattice_data_core";
    /// Signal/listener dispatch target.
    pub const SIGNAL: &str = "lattice_data_core::signal";
    /// Container lifecycle (items, properties, values).
    pub const CONTAINER: &str = "lattice_data::container";
    /// Filter registration and recomputation.
    pub const FILTER: &str = "lattice_data::filter";
    /// Sorting.
    pub const SORT: &str = "lattice_data::sort";
    /// Configuration loading.
    pub const CONFIG: &str = "lattice_data::config";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// This is useful for tracking the duration of operations.
#[derive(Debug)]
pub struct PerfSpan {
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::debug_span!(target: "lattice_data::perf", "perf", operation = name);
        Self {
            _span: span.entered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perf_span_with_subscriber() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let _span = PerfSpan::new(span_names::SORT);
            tracing::debug!(target: targets::SORT, "inside span");
        });
    }

    #[test]
    fn test_targets_are_namespaced() {
        for target in [targets::CONTAINER, targets::FILTER, targets::SORT, targets::CONFIG] {
            assert!(target.starts_with("lattice_data::"));
        }
        assert!(targets::SIGNAL.starts_with(targets::CORE));
    }
}
