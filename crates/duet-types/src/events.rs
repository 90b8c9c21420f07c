use serde::{Deserialize, Serialize};

use crate::models::{Portal, Row, Table};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { portal: Portal },

    /// A row was appended to one of the shared tables
    RowInserted { row: Row },

    /// A portal opened its first gateway connection or closed its last one
    PresenceUpdate { portal: Portal, online: bool },

    /// Acknowledges a `Subscribe`; inserts committed after this are delivered
    Subscribed { tables: Vec<Table> },
}

impl GatewayEvent {
    /// Returns the table if this event is scoped to one.
    /// Events that return `None` are global and should be delivered to all clients.
    pub fn table(&self) -> Option<Table> {
        match self {
            Self::RowInserted { row } => Some(row.table()),
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Replace the set of tables whose inserts this connection receives.
    Subscribe { tables: Vec<Table> },
}
