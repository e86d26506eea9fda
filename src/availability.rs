use std::sync::Arc;

use crate::model::*;
use crate::schedule::{ScheduleError, ScheduleFormat, parse_day_blocks};

// ── Availability Algorithm ────────────────────────────────────────

/// Free windows of a service, lazily computed one day block at a time.
///
/// Blocks come out in the order the schedule lists them; windows within a
/// block come out chronologically. Cloning yields an independent iterator
/// over the same sequence.
#[derive(Debug, Clone)]
pub struct AvailableSlots {
    blocks: std::vec::IntoIter<Vec<Span>>,
    /// Sorted and merged.
    booked: Arc<[Span]>,
    min_duration: Ms,
    pending: std::vec::IntoIter<Span>,
}

impl Iterator for AvailableSlots {
    type Item = Span;

    fn next(&mut self) -> Option<Span> {
        loop {
            if let Some(span) = self.pending.next() {
                return Some(span);
            }
            let block = self.blocks.next()?;
            self.pending = free_in_block(block, &self.booked, self.min_duration).into_iter();
        }
    }
}

/// Free windows of `service` at least its duration long, given the slots
/// already booked for it.
pub fn available_slots(
    service: &Service,
    booked: &[Span],
    fmt: &ScheduleFormat,
) -> Result<AvailableSlots, ScheduleError> {
    let blocks: Vec<Vec<Span>> = parse_day_blocks(&service.schedule, fmt)?
        .into_iter()
        .map(|block| block.spans)
        .collect();

    let mut booked = booked.to_vec();
    booked.sort_by_key(|s| s.start);

    Ok(AvailableSlots {
        blocks: blocks.into_iter(),
        booked: merge_overlapping(&booked).into(),
        min_duration: service.duration_ms(),
        pending: Vec::new().into_iter(),
    })
}

/// True iff `candidate` fits inside one free window and is at least the
/// service duration long.
pub fn slot_is_available(
    service: &Service,
    booked: &[Span],
    candidate: &Span,
    fmt: &ScheduleFormat,
) -> Result<bool, ScheduleError> {
    if candidate.duration_ms() < service.duration_ms() {
        return Ok(false);
    }
    Ok(available_slots(service, booked, fmt)?.any(|free| free.contains_span(candidate)))
}

fn free_in_block(mut block: Vec<Span>, booked: &[Span], min_duration: Ms) -> Vec<Span> {
    block.sort_by_key(|s| s.start);
    let mut free = subtract_intervals(&merge_overlapping(&block), booked);
    free.retain(|span| span.duration_ms() >= min_duration);
    free
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end
        {
            last.end = last.end.max(span.end);
            continue;
        }
        merged.push(span);
    }
    merged
}

/// Interval difference `base - to_remove`. Both inputs sorted by start;
/// `base` disjoint.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{format_span, parse_slot};
    use proptest::prelude::*;

    const M: Ms = MINUTE_MS;

    fn fmt() -> ScheduleFormat {
        ScheduleFormat::default()
    }

    fn service(schedule: &str, duration_minutes: u32) -> Service {
        Service {
            service_id: 1,
            name: "Haircut".into(),
            employee_name: "Anna".into(),
            schedule: schedule.into(),
            duration_minutes,
        }
    }

    fn slot(text: &str) -> Span {
        parse_slot(text, &fmt()).unwrap()
    }

    fn free_text(svc: &Service, booked: &[Span]) -> Vec<String> {
        available_slots(svc, booked, &fmt())
            .unwrap()
            .map(|s| format_span(&s, &fmt()))
            .collect()
    }

    // ── subtract_intervals ────────────────────────────────

    #[test]
    fn subtract_no_overlap() {
        let base = vec![Span::new(100, 200), Span::new(300, 400)];
        let result = subtract_intervals(&base, &[Span::new(200, 300)]);
        assert_eq!(result, base);
    }

    #[test]
    fn subtract_full_overlap() {
        let result = subtract_intervals(&[Span::new(100, 200)], &[Span::new(50, 250)]);
        assert!(result.is_empty());
    }

    #[test]
    fn subtract_partial_edges() {
        assert_eq!(
            subtract_intervals(&[Span::new(100, 200)], &[Span::new(50, 150)]),
            vec![Span::new(150, 200)]
        );
        assert_eq!(
            subtract_intervals(&[Span::new(100, 200)], &[Span::new(150, 250)]),
            vec![Span::new(100, 150)]
        );
    }

    #[test]
    fn subtract_multiple_punches() {
        let remove = vec![Span::new(100, 200), Span::new(400, 500), Span::new(800, 900)];
        assert_eq!(
            subtract_intervals(&[Span::new(0, 1000)], &remove),
            vec![
                Span::new(0, 100),
                Span::new(200, 400),
                Span::new(500, 800),
                Span::new(900, 1000),
            ]
        );
    }

    #[test]
    fn merge_overlapping_and_adjacent() {
        let spans = vec![Span::new(100, 300), Span::new(200, 400), Span::new(400, 450), Span::new(500, 600)];
        assert_eq!(
            merge_overlapping(&spans),
            vec![Span::new(100, 450), Span::new(500, 600)]
        );
    }

    // ── available_slots ───────────────────────────────────

    #[test]
    fn whole_block_free_when_nothing_booked() {
        let svc = service("2026-02-01 09:00-10:00", 30);
        assert_eq!(free_text(&svc, &[]), vec!["2026-02-01 09:00-10:00"]);
    }

    #[test]
    fn booking_at_block_start_leaves_remainder() {
        let svc = service("2026-02-01 09:00-10:00", 30);
        let booked = [slot("2026-02-01 09:00-09:30")];
        assert_eq!(free_text(&svc, &booked), vec!["2026-02-01 09:30-10:00"]);
    }

    #[test]
    fn booking_covering_block_leaves_nothing() {
        let svc = service("2026-02-01 09:00-10:00|2026-02-02 09:00-10:00", 30);
        let booked = [slot("2026-02-01 09:00-10:00")];
        assert_eq!(free_text(&svc, &booked), vec!["2026-02-02 09:00-10:00"]);
    }

    #[test]
    fn booking_crossing_block_boundary_shortens_it() {
        let svc = service("2026-02-01 09:00-12:00", 30);
        let booked = [slot("2026-02-01 08:00-09:45")];
        assert_eq!(free_text(&svc, &booked), vec!["2026-02-01 09:45-12:00"]);
    }

    #[test]
    fn short_remainders_are_dropped() {
        let svc = service("2026-02-01 09:00-11:00", 30);
        let booked = [slot("2026-02-01 09:20-10:00"), slot("2026-02-01 10:45-11:00")];
        // 09:00-09:20 is too short, 10:00-10:45 qualifies.
        assert_eq!(free_text(&svc, &booked), vec!["2026-02-01 10:00-10:45"]);
    }

    #[test]
    fn blocks_in_written_order_ranges_chronological() {
        let svc = service("2026-02-02 09:00-10:00|2026-02-01 14:00-15:00 09:00-10:00", 30);
        assert_eq!(
            free_text(&svc, &[]),
            vec![
                "2026-02-02 09:00-10:00",
                "2026-02-01 09:00-10:00",
                "2026-02-01 14:00-15:00",
            ]
        );
    }

    #[test]
    fn unsorted_overlapping_bookings_are_handled() {
        let svc = service("2026-02-01 09:00-13:00", 30);
        let booked = [
            slot("2026-02-01 11:00-12:00"),
            slot("2026-02-01 09:30-10:00"),
            slot("2026-02-01 09:45-10:15"),
        ];
        assert_eq!(
            free_text(&svc, &booked),
            vec![
                "2026-02-01 09:00-09:30",
                "2026-02-01 10:15-11:00",
                "2026-02-01 12:00-13:00",
            ]
        );
    }

    #[test]
    fn sequence_is_restartable() {
        let svc = service("2026-02-01 09:00-10:00 11:00-12:00", 30);
        let slots = available_slots(&svc, &[], &fmt()).unwrap();
        let first: Vec<Span> = slots.clone().collect();
        let second: Vec<Span> = slots.collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn malformed_schedule_is_an_error() {
        let svc = service("2026-02-01 nine-ten", 30);
        assert!(matches!(
            available_slots(&svc, &[], &fmt()),
            Err(ScheduleError::MalformedSchedule { .. })
        ));
    }

    #[test]
    fn slot_availability_checks() {
        let svc = service("2026-02-01 09:00-10:00", 30);
        let booked = [slot("2026-02-01 09:00-09:30")];
        let check = |text: &str| slot_is_available(&svc, &booked, &slot(text), &fmt()).unwrap();

        assert!(check("2026-02-01 09:30-10:00"));
        assert!(!check("2026-02-01 09:15-09:45")); // overlaps a booking
        assert!(!check("2026-02-01 09:45-10:15")); // runs past the schedule
        assert!(!check("2026-02-01 09:30-09:45")); // shorter than the service
        assert!(!check("2026-02-02 09:30-10:00")); // not a scheduled day
    }

    fn arb_case() -> impl Strategy<Value = (u32, Vec<(Ms, Ms)>)> {
        (
            prop_oneof![Just(15u32), Just(30), Just(45), Just(60)],
            prop::collection::vec((0i64..(10 * 60), 5i64..120), 0..8),
        )
    }

    proptest! {
        #[test]
        fn free_windows_are_long_enough_and_unbooked((duration, raw) in arb_case()) {
            let svc = service("2026-02-01 08:00-12:00 13:00-18:00|2026-02-02 09:00-17:00", duration);
            let origin = slot("2026-02-01 08:00-08:30").start;
            let booked: Vec<Span> = raw
                .into_iter()
                .map(|(offset, len)| Span::new(origin + offset * M, origin + (offset + len) * M))
                .collect();

            for free in available_slots(&svc, &booked, &fmt()).unwrap() {
                prop_assert!(free.duration_ms() >= svc.duration_ms());
                prop_assert!(booked.iter().all(|b| !b.overlaps(&free)));
            }
        }
    }
}
