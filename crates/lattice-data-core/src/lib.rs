//! Core systems for Lattice Data.
//!
//! This crate provides the foundational pieces shared by the Lattice Data
//! containers:
//!
//! - **Signal/Listener System**: Type-safe observer callbacks with
//!   snapshot-at-fire-time dispatch
//! - **Logging**: `tracing` targets and performance spans
//!
//! # Signal Example
//!
//! ```
//! use lattice_data_core::Signal;
//!
//! // Create a signal that notifies when a value changes
//! let value_changed = Signal::<i32>::new();
//!
//! // Connect a slot to handle the signal
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! // Emit the signal
//! value_changed.emit(42);
//!
//! // Disconnect when done
//! value_changed.disconnect(conn_id);
//! ```

pub mod logging;
pub mod signal;

pub use logging::PerfSpan;
pub use signal::{ConnectionId, Signal, SignalSnapshot};
