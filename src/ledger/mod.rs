mod conflict;
mod error;
mod mutations;
mod queries;

pub use error::LedgerError;

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::model::*;
use crate::wal::Wal;

pub type SharedServiceBookings = Arc<RwLock<ServiceBookings>>;

// ── Group-commit log channel ─────────────────────────────

pub(super) struct WalAppend {
    event: LedgerEvent,
    /// Arrival sequence the event was written at.
    response: oneshot::Sender<io::Result<u64>>,
}

/// Background task that owns the log and batches appends for group commit.
/// 1. Block until the first append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders with the sequence each event was buffered at.
///
/// Sequences follow log position, so replay reproduces them exactly.
async fn wal_writer_loop(mut wal: Wal, mut next_seq: u64, mut rx: mpsc::Receiver<WalAppend>) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = rx.try_recv() {
            batch.push(next);
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let first_seq = next_seq;
        let result = flush_batch(&mut wal, &batch);
        // A failed batch still consumes its sequences; only relative order matters.
        next_seq += batch.len() as u64;
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            tracing::error!(path = %wal.path().display(), "ledger flush failed: {e}");
        }

        for (seq, req) in (first_seq..).zip(batch) {
            let r = match &result {
                Ok(()) => Ok(seq),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = req.response.send(r);
        }
    }
    tracing::debug!(appended = wal.appended(), "ledger writer stopped");
}

fn flush_batch(wal: &mut Wal, batch: &[WalAppend]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for req in batch {
        if let Err(e) = wal.append_buffered(&req.event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error; buffered bytes must not carry into
    // the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

/// Apply a recorded event to one service's bookings (caller holds the lock).
fn apply_event(sb: &mut ServiceBookings, event: &LedgerEvent, seq: u64) -> Booking {
    match *event {
        LedgerEvent::BookingRecorded {
            user_id,
            service_id,
            span,
        } => {
            let booking = Booking {
                user_id,
                service_id,
                slot: span,
            };
            sb.insert(BookingEntry { seq, booking });
            booking
        }
    }
}

fn event_service_id(event: &LedgerEvent) -> ServiceId {
    match event {
        LedgerEvent::BookingRecorded { service_id, .. } => *service_id,
    }
}

/// Append-only booking ledger.
///
/// Each service's bookings sit behind their own `RwLock`; an append holds the
/// write lock across conflict check, log write and apply, so same-service
/// appends are serialized while different services never contend.
pub struct Ledger {
    services: DashMap<ServiceId, SharedServiceBookings>,
    wal_tx: mpsc::Sender<WalAppend>,
}

impl Ledger {
    /// Replay the log at `path` and start its writer task.
    /// Must be called from within a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let (wal, events) = Wal::recover(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, events.len() as u64, wal_rx));

        // Replay into plain maps first; nothing else can see them yet.
        let mut replayed: HashMap<ServiceId, ServiceBookings> = HashMap::new();
        for (seq, event) in events.iter().enumerate() {
            let service_id = event_service_id(event);
            let sb = replayed
                .entry(service_id)
                .or_insert_with(|| ServiceBookings::new(service_id));
            apply_event(sb, event, seq as u64);
        }

        let services = DashMap::new();
        for (service_id, sb) in replayed {
            services.insert(service_id, Arc::new(RwLock::new(sb)));
        }
        tracing::info!(path = %path.display(), bookings = events.len(), "ledger opened");

        Ok(Self { services, wal_tx })
    }

    pub(super) fn get_service(&self, service_id: ServiceId) -> Option<SharedServiceBookings> {
        self.services.get(&service_id).map(|e| e.value().clone())
    }

    pub(super) fn get_or_create_service(&self, service_id: ServiceId) -> SharedServiceBookings {
        self.services
            .entry(service_id)
            .or_insert_with(|| Arc::new(RwLock::new(ServiceBookings::new(service_id))))
            .value()
            .clone()
    }

    pub(super) fn service_handles(&self) -> Vec<SharedServiceBookings> {
        self.services.iter().map(|e| e.value().clone()).collect()
    }

    /// Write event to the log via the background group-commit writer.
    async fn wal_append(&self, event: &LedgerEvent) -> Result<u64, LedgerError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalAppend {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| LedgerError::Wal("ledger writer shut down".into()))?;
        rx.await
            .map_err(|_| LedgerError::Wal("ledger writer dropped response".into()))?
            .map_err(|e| LedgerError::Wal(e.to_string()))
    }

    /// Log-append + apply in one call. Caller holds the service's write lock.
    pub(super) async fn persist_and_apply(
        &self,
        sb: &mut ServiceBookings,
        event: &LedgerEvent,
    ) -> Result<Booking, LedgerError> {
        let seq = self.wal_append(event).await?;
        Ok(apply_event(sb, event, seq))
    }
}
