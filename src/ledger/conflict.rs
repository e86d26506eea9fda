use crate::model::*;

use super::LedgerError;

/// Reject `span` if any booking of this service overlaps it.
pub(crate) fn check_no_conflict(sb: &ServiceBookings, span: &Span) -> Result<(), LedgerError> {
    match sb.overlapping(span).next() {
        Some(existing) => Err(LedgerError::SlotAlreadyBooked {
            service_id: sb.service_id,
            slot: *span,
            existing: existing.booking.user_id,
        }),
        None => Ok(()),
    }
}
