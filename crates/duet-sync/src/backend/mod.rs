mod memory;
mod remote;

pub use memory::MemoryBackend;
pub use remote::RemoteBackend;

use async_trait::async_trait;
use tokio::sync::mpsc;

use duet_types::companion::{CompanionReply, CompanionRequest};
use duet_types::{NewRow, Row, Table};

use crate::error::Result;

/// Live stream of rows inserted into one table.
///
/// The feed ends (`next` returns `None`) when the underlying connection drops.
/// Dropping the feed releases the connection.
pub struct Feed {
    rx: mpsc::UnboundedReceiver<Row>,
}

impl Feed {
    pub fn channel() -> (mpsc::UnboundedSender<Row>, Feed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Feed { rx })
    }

    pub async fn next(&mut self) -> Option<Row> {
        self.rx.recv().await
    }
}

/// The shared store both portals read and append to.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Most recent rows of a table, newest first (memories by date).
    async fn select(&self, table: Table, limit: u32) -> Result<Vec<Row>>;

    /// Append a row. Returns the stored row with its insertion order.
    async fn insert(&self, row: NewRow) -> Result<Row>;

    /// Start receiving inserts of `table`. Inserts committed after this
    /// returns are guaranteed to appear on the feed.
    async fn listen(&self, table: Table) -> Result<Feed>;

    /// Store a memory image and return its public URL.
    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<String>;

    async fn companion(&self, req: &CompanionRequest) -> Result<CompanionReply>;
}
