use thiserror::Error;
use ulid::Ulid;

use crate::model::{ServiceId, Span};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("service {service_id} slot [{}, {}) overlaps booking {existing}", .slot.start, .slot.end)]
    SlotAlreadyBooked {
        service_id: ServiceId,
        slot: Span,
        existing: Ulid,
    },
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("WAL error: {0}")]
    Wal(String),
}
