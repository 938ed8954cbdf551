mod conflict;
mod error;
mod lifecycle;
mod mutations;
mod queries;
mod store;

pub use conflict::{has_conflict, now_ms, validate_span};
pub use error::EngineError;
pub use lifecycle::{BookingEdit, NewBooking};
pub use store::InMemoryStore;

use std::io;
use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot, RwLock};

use crate::model::*;
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
    /// Stop the writer; later appends fail as if the disk went away.
    #[cfg(test)]
    Close,
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Drain every Append already queued (the batch window).
/// 3. One flush_sync for the whole batch, then answer every sender.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                    .record(batch.len() as f64);
                let flush_start = std::time::Instant::now();
                let result = flush_batch(&mut wal, &batch);
                metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                    .record(flush_start.elapsed().as_secs_f64());
                for (_, tx) in batch {
                    let r = match &result {
                        Ok(()) => Ok(()),
                        Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
                    };
                    let _ = tx.send(r);
                }

                match deferred {
                    #[cfg(test)]
                    Some(WalCommand::Close) => break,
                    Some(other) => handle_non_append(&mut wal, other),
                    None => {}
                }
            }
            #[cfg(test)]
            WalCommand::Close => break,
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let append_result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so half-written bytes don't leak into
    // the next batch.
    let flush_result = wal.flush_sync();
    append_result.and(flush_result)
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
        #[cfg(test)]
        WalCommand::Close => unreachable!("close is handled by the writer loop"),
    }
}

/// Persistence boundary and booking rules for rooms, doctors, users and bookings.
///
/// Every write goes WAL-first, then into the in-memory store, while the store
/// write lock is held. Check-then-write sequences inside one method are
/// therefore atomic within the process.
pub struct Engine {
    pub(super) store: RwLock<InMemoryStore>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
}

impl Engine {
    /// Replay the WAL at `wal_path` and start its writer task.
    /// Must be called from inside a tokio runtime.
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let mut store = InMemoryStore::new();
        for event in &events {
            store.apply(event);
        }
        tracing::debug!(
            "replayed {} events ({} bookings) from {}",
            events.len(),
            store.booking_count(),
            wal_path.display()
        );

        Ok(Self {
            store: RwLock::new(store),
            wal_tx,
        })
    }

    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append then apply. Caller holds the store write lock.
    pub(super) async fn persist_and_apply(
        &self,
        store: &mut InMemoryStore,
        event: Event,
    ) -> Result<(), EngineError> {
        self.wal_append(&event).await?;
        store.apply(&event);
        Ok(())
    }

    /// Rewrite the WAL from a snapshot of the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        // Hold the read lock until the writer has the snapshot queued so no
        // append can slip in between snapshot and swap.
        let store = self.store.read().await;
        let events = store.snapshot();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        drop(store);
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    #[cfg(test)]
    pub(crate) async fn close_wal(&self) {
        let _ = self.wal_tx.send(WalCommand::Close).await;
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
