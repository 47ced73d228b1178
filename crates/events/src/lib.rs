//! `stockwise-events`: domain events and the audit stream.
//!
//! Every committed change is wrapped in an [`EventEnvelope`] (actor, time,
//! reason) and published on an [`EventBus`].

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod projection;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use projection::Projection;
