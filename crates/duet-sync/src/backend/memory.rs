use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::debug;

use duet_types::companion::{CompanionReply, CompanionRequest};
use duet_types::{NewRow, Row, Table};

use super::{Backend, Feed};
use crate::error::{Result, SyncError};

/// In-process backend holding everything in memory.
///
/// Useful for running two portals against each other without a server, and
/// for exercising reconnect paths: feeds can be severed and listens or writes
/// made to fail on demand.
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    rows: HashMap<Table, Vec<Row>>,
    listeners: Vec<(Table, mpsc::UnboundedSender<Row>)>,
    blobs: HashMap<String, Vec<u8>>,
    failing_listens: u32,
    offline: bool,
    listens: u32,
    selects: u32,
    companion: Option<CompanionReply>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// End every open feed, as a dropped connection would.
    pub fn sever_feeds(&self) {
        let dropped = std::mem::take(&mut self.lock().listeners);
        debug!("Severed {} feeds", dropped.len());
    }

    /// Make the next `n` listen calls fail.
    pub fn fail_next_listens(&self, n: u32) {
        self.lock().failing_listens = n;
    }

    /// While offline, inserts, uploads and companion calls fail.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Reply returned by `companion`. With none set the call fails.
    pub fn set_companion_reply(&self, reply: Option<CompanionReply>) {
        self.lock().companion = reply;
    }

    /// Successful listen calls so far.
    pub fn listen_count(&self) -> u32 {
        self.lock().listens
    }

    pub fn select_count(&self) -> u32 {
        self.lock().selects
    }

    pub fn open_feeds(&self) -> usize {
        let mut inner = self.lock();
        inner.listeners.retain(|(_, tx)| !tx.is_closed());
        inner.listeners.len()
    }

    pub fn blob(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().blobs.get(name).cloned()
    }

    fn check_online(inner: &MemoryInner) -> Result<()> {
        if inner.offline {
            Err(SyncError::Transport("backend offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select(&self, table: Table, limit: u32) -> Result<Vec<Row>> {
        let mut inner = self.lock();
        inner.selects += 1;

        let mut rows = inner.rows.get(&table).cloned().unwrap_or_default();
        match table {
            Table::Memories => rows.sort_by(|a, b| match (a, b) {
                (Row::Memories(a), Row::Memories(b)) => {
                    b.memory_date.cmp(&a.memory_date).then(b.seq.cmp(&a.seq))
                }
                _ => b.seq().cmp(&a.seq()),
            }),
            _ => rows.sort_by(|a, b| b.seq().cmp(&a.seq())),
        }
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn insert(&self, new: NewRow) -> Result<Row> {
        let mut inner = self.lock();
        Self::check_online(&inner)?;

        let table = new.table();
        let stored = inner.rows.entry(table).or_default();
        let seq = stored.len() as i64 + 1;
        let row = new.into_stored(seq, Utc::now());
        stored.push(row.clone());

        inner
            .listeners
            .retain(|(t, tx)| *t != table || tx.send(row.clone()).is_ok());
        Ok(row)
    }

    async fn listen(&self, table: Table) -> Result<Feed> {
        let mut inner = self.lock();
        if inner.failing_listens > 0 {
            inner.failing_listens -= 1;
            return Err(SyncError::Transport("listen refused".into()));
        }
        inner.listens += 1;

        let (tx, feed) = Feed::channel();
        inner.listeners.push((table, tx));
        Ok(feed)
    }

    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<String> {
        let mut inner = self.lock();
        Self::check_online(&inner)?;
        inner.blobs.insert(name.to_string(), bytes);
        Ok(format!("memory://storage/memories/{}", name))
    }

    async fn companion(&self, _req: &CompanionRequest) -> Result<CompanionReply> {
        let inner = self.lock();
        Self::check_online(&inner)?;
        inner.companion.clone().ok_or(SyncError::Status(500))
    }
}
