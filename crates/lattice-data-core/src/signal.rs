//! Signal/listener system for Lattice Data.
//!
//! This module provides a type-safe observer mechanism used by containers to
//! notify data-bound consumers. Signals are emitted when container state
//! changes, and connected slots (callbacks) are invoked in response.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The main signal type for emitting notifications
//! - [`ConnectionId`] - Unique identifier returned when connecting a slot
//! - [`SignalSnapshot`] - Frozen set of slots captured at fire time
//!
//! # Dispatch Semantics
//!
//! Emission always works on a snapshot of the connected slots, taken when the
//! signal fires. The internal lock is released before any slot runs, so a slot
//! may connect or disconnect slots (on this or any other signal) without
//! deadlocking. Such changes take effect from the next emission on; the
//! in-flight emission is unaffected.
//!
//! Slots run synchronously on the emitting thread, in connection order.
//!
//! # Example
//!
//! ```
//! use lattice_data_core::Signal;
//!
//! // Create a signal that passes a string argument
//! let text_changed = Signal::<String>::new();
//!
//! // Connect a slot (closure)
//! let conn_id = text_changed.connect(|text| {
//!     println!("Text changed to: {}", text);
//! });
//!
//! // Emit the signal
//! text_changed.emit("Hello, World!".to_string());
//!
//! // Disconnect when done
//! text_changed.disconnect(conn_id);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via [`Signal::disconnect`].
    /// The ID remains valid until the connection is explicitly disconnected or
    /// the signal is dropped.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// Internal storage for a single connection.
struct Connection<Args> {
    slot: Slot<Args>,
    /// Connection order; slot map iteration order is not insertion order once
    /// keys are recycled.
    sequence: u64,
}

/// A type-safe signal that can have multiple connected slots.
///
/// # Type Parameter
///
/// - `Args`: The argument type passed to connected slots. Use `()` for signals
///   with no arguments, or a tuple/struct for richer payloads.
///
/// # Thread Safety
///
/// `Signal<Args>` is `Send + Sync` and can be shared between threads. Slots
/// are always invoked directly on the emitting thread.
pub struct Signal<Args> {
    /// All active connections.
    connections: Mutex<SlotMap<ConnectionId, Connection<Args>>>,
    /// Next connection sequence number.
    next_sequence: AtomicU64,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Connect a slot (closure) to this signal.
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the slot later.
    ///
    /// # Example
    ///
    /// ```
    /// use lattice_data_core::Signal;
    ///
    /// let signal = Signal::<String>::new();
    /// let id = signal.connect(|s| println!("Got: {}", s));
    /// signal.emit("Hello".to_string());
    /// assert!(signal.disconnect(id));
    /// ```
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        self.connections.lock().insert(Connection {
            slot: Arc::new(slot),
            sequence,
        })
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed, `false` otherwise.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Capture the currently connected slots, in connection order.
    ///
    /// The snapshot owns its slots, so it can be emitted after the caller has
    /// released any locks of its own.
    pub fn snapshot(&self) -> SignalSnapshot<Args> {
        let connections = self.connections.lock();
        let mut ordered: Vec<(u64, Slot<Args>)> = connections
            .values()
            .map(|conn| (conn.sequence, conn.slot.clone()))
            .collect();
        drop(connections);

        ordered.sort_by_key(|(sequence, _)| *sequence);
        SignalSnapshot {
            slots: ordered.into_iter().map(|(_, slot)| slot).collect(),
        }
    }

    /// Emit the signal, invoking all connected slots.
    #[tracing::instrument(skip_all, target = "lattice_data_core::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        self.snapshot().emit(&args);
    }
}

/// The slots of a [`Signal`] frozen at a point in time.
pub struct SignalSnapshot<Args> {
    slots: Vec<Slot<Args>>,
}

impl<Args> SignalSnapshot<Args> {
    /// Invoke every captured slot with `args`.
    pub fn emit(&self, args: &Args) {
        tracing::trace!(
            target: targets::SIGNAL,
            connection_count = self.slots.len(),
            "emitting signal"
        );
        for slot in &self.slots {
            slot(args);
        }
    }

    /// Number of captured slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no slots were captured.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

static_assertions::assert_impl_all!(Signal<()>: Send, Sync);
static_assertions::assert_impl_all!(SignalSnapshot<()>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_connect_emit() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.emit(42);
        signal.emit(100);

        let values = received.lock();
        assert_eq!(*values, vec![42, 100]);
    }

    #[test]
    fn test_signal_disconnect() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        let conn_id = signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        signal.emit(1);
        assert!(signal.disconnect(conn_id));
        assert!(!signal.disconnect(conn_id));
        signal.emit(2);

        let values = received.lock();
        assert_eq!(*values, vec![1]); // Only received before disconnect
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let signal = Signal::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        signal.connect(move |&value| received_clone.lock().push(value));
        let snapshot = signal.snapshot();
        assert_eq!(snapshot.len(), 1);

        // Connections made after the snapshot are not part of it.
        let received_late = received.clone();
        signal.connect(move |&value| received_late.lock().push(value * 10));
        snapshot.emit(&1);
        signal.emit(2);

        assert_eq!(*received.lock(), vec![1, 2, 20]);
    }

    #[test]
    fn test_dispatch_in_connection_order() {
        let signal = Signal::<()>::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut ids = Vec::new();
        for n in 0..4 {
            let order = order.clone();
            ids.push(signal.connect(move |_| order.lock().push(n)));
        }
        // Free a slot so the next connection reuses its key.
        signal.disconnect(ids[1]);
        let order_clone = order.clone();
        signal.connect(move |_| order_clone.lock().push(4));

        signal.emit(());
        assert_eq!(*order.lock(), vec![0, 2, 3, 4]);
    }

    #[test]
    fn test_connect_during_emit_is_deferred() {
        let signal = Arc::new(Signal::<()>::new());
        let calls = Arc::new(Mutex::new(0));

        let signal_clone = signal.clone();
        let calls_clone = calls.clone();
        signal.connect(move |_| {
            *calls_clone.lock() += 1;
            let calls_inner = calls_clone.clone();
            signal_clone.connect(move |_| *calls_inner.lock() += 100);
        });

        signal.emit(());
        // The slot connected mid-emit did not run in the same emission.
        assert_eq!(*calls.lock(), 1);
        assert_eq!(signal.connection_count(), 2);
    }

    #[test]
    fn test_disconnect_during_emit_does_not_affect_snapshot() {
        let signal = Arc::new(Signal::<()>::new());
        let calls = Arc::new(Mutex::new(Vec::new()));

        let second_id = Arc::new(Mutex::new(None));
        let signal_clone = signal.clone();
        let second_clone = second_id.clone();
        let calls_first = calls.clone();
        signal.connect(move |_| {
            calls_first.lock().push("first");
            if let Some(id) = *second_clone.lock() {
                signal_clone.disconnect(id);
            }
        });
        let calls_second = calls.clone();
        *second_id.lock() = Some(signal.connect(move |_| calls_second.lock().push("second")));

        signal.emit(());
        signal.emit(());
        assert_eq!(*calls.lock(), vec!["first", "second", "first"]);
    }

    #[test]
    fn test_emit_from_multiple_threads() {
        let signal = Arc::new(Signal::<i32>::new());
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        signal.connect(move |&value| {
            received_clone.lock().push(value);
        });

        let mut handles = vec![];
        for i in 0..10 {
            let signal_clone = signal.clone();
            handles.push(std::thread::spawn(move || {
                signal_clone.emit(i);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let values = received.lock();
        assert_eq!(values.len(), 10);
        for i in 0..10 {
            assert!(values.contains(&i), "Missing value {}", i);
        }
    }
}
