use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use duet_types::events::GatewayEvent;
use duet_types::{Portal, Row};

/// Fans row-insert notifications and presence changes out to every gateway connection.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for gateway events; every connection sees every event
    /// and filters by its own table subscriptions.
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Open connections per portal: portal -> conn ids
    connections: RwLock<HashMap<Portal, HashSet<Uuid>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Announce a freshly inserted row.
    pub fn publish_row(&self, row: Row) {
        self.broadcast(GatewayEvent::RowInserted { row });
    }

    /// Register a connection for a portal. Returns its conn_id.
    /// The portal goes online with its first connection.
    pub async fn connect(&self, portal: Portal) -> Uuid {
        let conn_id = Uuid::new_v4();
        let first = {
            let mut connections = self.inner.connections.write().await;
            let set = connections.entry(portal).or_default();
            set.insert(conn_id);
            set.len() == 1
        };

        if first {
            self.broadcast(GatewayEvent::PresenceUpdate {
                portal,
                online: true,
            });
        }

        conn_id
    }

    /// Drop a connection. The portal goes offline when its last connection closes.
    pub async fn disconnect(&self, portal: Portal, conn_id: Uuid) {
        let last = {
            let mut connections = self.inner.connections.write().await;
            match connections.get_mut(&portal) {
                Some(set) => {
                    let removed = set.remove(&conn_id);
                    let empty = set.is_empty();
                    if empty {
                        connections.remove(&portal);
                    }
                    removed && empty
                }
                None => false,
            }
        };

        if last {
            self.broadcast(GatewayEvent::PresenceUpdate {
                portal,
                online: false,
            });
        }
    }

    pub async fn is_online(&self, portal: Portal) -> bool {
        self.inner.connections.read().await.contains_key(&portal)
    }

    pub async fn online_portals(&self) -> Vec<Portal> {
        self.inner.connections.read().await.keys().copied().collect()
    }
}
