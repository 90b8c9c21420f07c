pub mod api;
pub mod companion;
pub mod events;
pub mod models;

pub use models::{
    Interaction, InteractionKind, Memory, MoodId, MoodLog, NewRow, Portal, Quote, Record, Row,
    SecureMessage, Table,
};
