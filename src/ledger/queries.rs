use crate::model::*;

use super::Ledger;

impl Ledger {
    /// Every booking, in the order it was appended.
    pub async fn list_bookings(&self) -> Vec<Booking> {
        let mut entries: Vec<BookingEntry> = Vec::new();
        for handle in self.service_handles() {
            let guard = handle.read().await;
            entries.extend(guard.entries.iter().copied());
        }
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.booking).collect()
    }

    /// True iff a booking of `service_id` overlaps `candidate`. Never writes.
    pub async fn has_conflict(&self, service_id: ServiceId, candidate: &Span) -> bool {
        match self.get_service(service_id) {
            Some(handle) => handle.read().await.overlapping(candidate).next().is_some(),
            None => false,
        }
    }

    /// Booked slots of one service, sorted by start.
    pub async fn bookings_for(&self, service_id: ServiceId) -> Vec<Span> {
        match self.get_service(service_id) {
            Some(handle) => handle.read().await.slots(),
            None => Vec::new(),
        }
    }

    pub async fn booking_count(&self) -> usize {
        let mut total = 0;
        for handle in self.service_handles() {
            total += handle.read().await.len();
        }
        total
    }
}
