use ulid::Ulid;

use crate::limits::MAX_BOOKINGS_PER_SERVICE;
use crate::model::*;

use super::conflict::check_no_conflict;
use super::{Ledger, LedgerError};

impl Ledger {
    /// Record a booking for `candidate` unless it overlaps an existing one.
    ///
    /// The conflict check, the durable write and the in-memory apply all happen
    /// under the service's write lock, so two overlapping appends for the same
    /// service can never both succeed.
    pub async fn append(&self, service_id: ServiceId, candidate: Span) -> Result<Booking, LedgerError> {
        let handle = self.get_or_create_service(service_id);
        let mut guard = handle.write().await;
        if guard.len() >= MAX_BOOKINGS_PER_SERVICE {
            return Err(LedgerError::LimitExceeded("too many bookings for service"));
        }

        if let Err(e) = check_no_conflict(&guard, &candidate) {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }

        let event = LedgerEvent::BookingRecorded {
            user_id: Ulid::new(),
            service_id,
            span: candidate,
        };
        let booking = self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(crate::observability::BOOKINGS_TOTAL).increment(1);
        tracing::info!(service_id, user_id = %booking.user_id, "booking recorded");
        Ok(booking)
    }
}
