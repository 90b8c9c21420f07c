use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use duet_types::{NewRow, Row, Table};

use crate::backend::{Backend, Feed};
use crate::backoff::Backoff;
use crate::config::SyncConfig;
use crate::error::Result;

/// What a subscription hands to its handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Bulk read taken right after the feed was (re)established.
    Snapshot(Vec<Row>),
    /// A row inserted while the feed was live.
    Insert(Row),
}

/// Observable state of a supervised subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Live,
    Backoff { attempt: u32, delay: Duration },
    Closed,
}

/// Entry point for publishing rows and subscribing to a table's inserts.
#[derive(Clone)]
pub struct EventBus {
    backend: Arc<dyn Backend>,
    config: SyncConfig,
}

impl EventBus {
    pub fn new(backend: Arc<dyn Backend>, config: SyncConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Append a row. The returned row is the store's acknowledgment and can be
    /// applied to local state right away; the echo on the feed applies again.
    pub async fn publish(&self, row: NewRow) -> Result<Row> {
        let table = row.table();
        let stored = self.backend.insert(row).await?;
        debug!("Published {} seq {}", table, stored.seq());
        Ok(stored)
    }

    /// Subscribe to inserts of `table`.
    ///
    /// On every (re)connect the feed is established first, then the latest
    /// `snapshot` rows are read and delivered, so nothing falls between the
    /// bulk read and the live feed. `None` skips the snapshot for tables whose
    /// history nobody reads. Lost feeds are retried with exponential backoff.
    pub fn subscribe<F>(&self, table: Table, snapshot: Option<u32>, handler: F) -> Subscription
    where
        F: FnMut(Delivery) + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let (link_tx, link_rx) = watch::channel(LinkState::Connecting);

        tokio::spawn(supervise(
            self.backend.clone(),
            table,
            snapshot,
            Backoff::from_config(&self.config),
            handler,
            link_tx,
            cancel.clone(),
        ));

        Subscription {
            table,
            cancel,
            link: link_rx,
        }
    }
}

/// Handle to a supervised subscription. Cancelled on drop.
pub struct Subscription {
    table: Table,
    cancel: CancellationToken,
    link: watch::Receiver<LinkState>,
}

impl Subscription {
    pub fn table(&self) -> Table {
        self.table
    }

    /// Stop the supervisor and release its feed.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn link_state(&self) -> LinkState {
        *self.link.borrow()
    }

    pub fn watch_link(&self) -> watch::Receiver<LinkState> {
        self.link.clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn establish(
    backend: &dyn Backend,
    table: Table,
    snapshot: Option<u32>,
) -> Result<(Feed, Option<Vec<Row>>)> {
    let feed = backend.listen(table).await?;
    let rows = match snapshot {
        Some(limit) => Some(backend.select(table, limit).await?),
        None => None,
    };
    Ok((feed, rows))
}

async fn supervise<F>(
    backend: Arc<dyn Backend>,
    table: Table,
    snapshot: Option<u32>,
    mut backoff: Backoff,
    mut handler: F,
    link: watch::Sender<LinkState>,
    cancel: CancellationToken,
) where
    F: FnMut(Delivery) + Send + 'static,
{
    'supervise: loop {
        link.send_replace(LinkState::Connecting);

        let established = tokio::select! {
            _ = cancel.cancelled() => break 'supervise,
            result = establish(backend.as_ref(), table, snapshot) => result,
        };

        match established {
            Ok((mut feed, rows)) => {
                backoff.reset();
                link.send_replace(LinkState::Live);
                info!("Subscription to {} is live", table);

                if let Some(rows) = rows {
                    handler(Delivery::Snapshot(rows));
                }

                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break 'supervise,
                        next = feed.next() => match next {
                            Some(row) => handler(Delivery::Insert(row)),
                            None => {
                                warn!("Feed for {} ended", table);
                                break;
                            }
                        },
                    }
                }
            }
            Err(e) => warn!("Could not establish feed for {}: {}", table, e),
        }

        let delay = backoff.next_delay();
        link.send_replace(LinkState::Backoff {
            attempt: backoff.attempt(),
            delay,
        });
        debug!("Retrying {} in {:?} (attempt {})", table, delay, backoff.attempt());

        tokio::select! {
            _ = cancel.cancelled() => break 'supervise,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    link.send_replace(LinkState::Closed);
    debug!("Subscription to {} closed", table);
}
