use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The only time type.
pub type Ms = i64;

pub const MINUTE_MS: Ms = 60_000;

pub type ServiceId = u32;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// `None` unless `start < end`.
    pub fn try_new(start: Ms, end: Ms) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// A bookable service, as read from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub service_id: ServiceId,
    pub name: String,
    pub employee_name: String,
    /// e.g. `2026-02-01 09:00-13:00 14:00-16:00|2026-02-02 10:00-14:00`
    pub schedule: String,
    #[serde(alias = "duration")]
    pub duration_minutes: u32,
}

impl Service {
    pub fn duration_ms(&self) -> Ms {
        Ms::from(self.duration_minutes) * MINUTE_MS
    }
}

/// A committed booking. Never updated or removed once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub user_id: Ulid,
    pub service_id: ServiceId,
    pub slot: Span,
}

/// A booking plus its position in the ledger's arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingEntry {
    pub seq: u64,
    pub booking: Booking,
}

/// Bookings of a single service, sorted by `slot.start`.
#[derive(Debug, Clone)]
pub struct ServiceBookings {
    pub service_id: ServiceId,
    pub entries: Vec<BookingEntry>,
}

impl ServiceBookings {
    pub fn new(service_id: ServiceId) -> Self {
        Self {
            service_id,
            entries: Vec::new(),
        }
    }

    /// Insert maintaining sort order by slot start.
    pub fn insert(&mut self, entry: BookingEntry) {
        let pos = self
            .entries
            .binary_search_by_key(&entry.booking.slot.start, |e| e.booking.slot.start)
            .unwrap_or_else(|e| e);
        self.entries.insert(pos, entry);
    }

    /// Return only entries whose slot overlaps the query window.
    /// Uses binary search to skip entries starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &BookingEntry> {
        let right_bound = self
            .entries
            .partition_point(|e| e.booking.slot.start < query.end);
        self.entries[..right_bound]
            .iter()
            .filter(move |e| e.booking.slot.end > query.start)
    }

    pub fn slots(&self) -> Vec<Span> {
        self.entries.iter().map(|e| e.booking.slot).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The ledger record format. One event per committed booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    BookingRecorded {
        user_id: Ulid,
        service_id: ServiceId,
        span: Span,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(seq: u64, start: Ms, end: Ms) -> BookingEntry {
        BookingEntry {
            seq,
            booking: Booking {
                user_id: Ulid::new(),
                service_id: 1,
                slot: Span::new(start, end),
            },
        }
    }

    #[test]
    fn span_basics() {
        let s = Span::new(100, 200);
        assert_eq!(s.duration_ms(), 100);
        assert!(Span::try_new(200, 200).is_none());
        assert!(Span::try_new(300, 200).is_none());
        assert_eq!(Span::try_new(100, 200), Some(s));
    }

    #[test]
    fn span_overlap() {
        let a = Span::new(100, 200);
        let b = Span::new(150, 250);
        let c = Span::new(200, 300);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn span_contains_span() {
        let outer = Span::new(100, 400);
        let inner = Span::new(150, 300);
        let partial = Span::new(50, 200);
        assert!(outer.contains_span(&inner));
        assert!(outer.contains_span(&outer));
        assert!(!outer.contains_span(&partial));
    }

    #[test]
    fn service_duration_alias() {
        let json = r#"{"service_id":1,"name":"Haircut","employee_name":"Anna",
            "schedule":"2026-02-01 09:00-10:00","duration":30}"#;
        let svc: Service = serde_json::from_str(json).unwrap();
        assert_eq!(svc.duration_minutes, 30);
        assert_eq!(svc.duration_ms(), 30 * MINUTE_MS);
    }

    #[test]
    fn bookings_kept_sorted() {
        let mut sb = ServiceBookings::new(1);
        sb.insert(entry(0, 300, 400));
        sb.insert(entry(1, 100, 200));
        sb.insert(entry(2, 200, 300));
        let starts: Vec<Ms> = sb.entries.iter().map(|e| e.booking.slot.start).collect();
        assert_eq!(starts, vec![100, 200, 300]);
        assert_eq!(sb.len(), 3);
    }

    #[test]
    fn overlapping_skips_past_and_future() {
        let mut sb = ServiceBookings::new(1);
        sb.insert(entry(0, 100, 200));
        sb.insert(entry(1, 450, 600));
        sb.insert(entry(2, 1000, 1100));

        let hits: Vec<_> = sb.overlapping(&Span::new(500, 800)).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].booking.slot, Span::new(450, 600));
    }

    #[test]
    fn overlapping_adjacent_not_included() {
        let mut sb = ServiceBookings::new(1);
        sb.insert(entry(0, 100, 200));
        assert_eq!(sb.overlapping(&Span::new(200, 300)).count(), 0);
        assert_eq!(sb.overlapping(&Span::new(0, 100)).count(), 0);
    }

    #[test]
    fn overlapping_single_ms() {
        let mut sb = ServiceBookings::new(1);
        sb.insert(entry(0, 100, 201));
        assert_eq!(sb.overlapping(&Span::new(200, 300)).count(), 1);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = LedgerEvent::BookingRecorded {
            user_id: Ulid::new(),
            service_id: 7,
            span: Span::new(1000, 2000),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: LedgerEvent = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
