//! In-process event bus for render and edit lifecycle events.
//!
//! - [`EventBus`]: publish/subscribe hub backed by `tokio::sync::broadcast`.
//! - [`StudioEvent`]: the event envelope.
//! - [`event_types`]: the event names the edit pipeline emits.

pub mod bus;

pub use bus::{event_types, EventBus, StudioEvent};
