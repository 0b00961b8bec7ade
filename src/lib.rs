//! Shared keyed state with change notifications.
//!
//! A [`Store`] holds named `serde_json` values. Every mutation that actually
//! changes something publishes a [`StateUpdate`] (the kind of change plus the
//! list of touched keys) to all registered listeners, synchronously and in
//! registration order. The `watchers` module ships two ready-made listeners:
//! a per-key change counter and a modified-keys tracer.

pub mod events;
pub mod store;
pub mod watchers;

// Re-export main types for convenience
pub use events::{StateUpdate, UpdateKind};
pub use store::{ListenerId, Store};

/// Identifier prefix for everything this crate registers.
pub const BUS_ID: &str = "statebus";
