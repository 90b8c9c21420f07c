//! Client-side synchronization for a duet portal.
//!
//! Every realtime feature is the same primitive: subscribe to the inserts of a
//! table, publish inserts, and fold both into local current-value stores.
//! [`EventBus`] supervises the subscriptions, [`store`] holds the merged state,
//! [`machines`] holds the timer-driven UI state machines and [`PortalSession`]
//! wires them together for one portal.

pub mod backend;
pub mod backoff;
pub mod bus;
pub mod clock;
pub mod config;
pub mod error;
pub mod glyphs;
pub mod machines;
pub mod session;
pub mod store;

pub use backend::{Backend, Feed, MemoryBackend, RemoteBackend};
pub use bus::{Delivery, EventBus, LinkState, Subscription};
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use session::{ActionOutcome, PortalSession};
pub use store::{CurrentValue, RecentMemories};
