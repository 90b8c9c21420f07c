//! Timer-driven UI state machines.
//!
//! None of these own a timer. Callers pass the current [`Instant`] and the
//! machines compute their state from it, so they can be driven by a render
//! loop, a tokio task, or a test with made-up instants.
//!
//! [`Instant`]: tokio::time::Instant

pub mod alarm;
pub mod boot;
pub mod companion;
pub mod decrypt;
pub mod dock;
pub mod pulse;
pub mod status;

pub use alarm::{Alarm, AlarmState};
pub use boot::{BootPhase, BootSequence};
pub use companion::Companion;
pub use decrypt::DecryptReveal;
pub use dock::{DockState, TokenDock};
pub use pulse::Pulse;
pub use status::StatusLine;
