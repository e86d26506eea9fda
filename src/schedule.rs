use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

use crate::limits::{MAX_SCHEDULE_LEN, MAX_SLOT_LEN};
use crate::model::{Ms, Span};

/// Offset all schedule times are written in: UTC+3.
pub const DEFAULT_OFFSET_SECONDS: i32 = 3 * 3600;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("malformed schedule at `{fragment}`: {reason}")]
    MalformedSchedule { fragment: String, reason: &'static str },
    #[error("malformed slot `{fragment}`: {reason}")]
    MalformedSlot { fragment: String, reason: &'static str },
}

/// How dates and times are written, and the offset they are written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleFormat {
    pub date_format: String,
    pub time_format: String,
    pub offset_seconds: i32,
}

impl Default for ScheduleFormat {
    fn default() -> Self {
        Self {
            date_format: "%Y-%m-%d".into(),
            time_format: "%H:%M".into(),
            offset_seconds: DEFAULT_OFFSET_SECONDS,
        }
    }
}

impl ScheduleFormat {
    fn offset_ms(&self) -> Ms {
        Ms::from(self.offset_seconds) * 1000
    }

    fn to_ms(&self, date: NaiveDate, time: NaiveTime) -> Ms {
        NaiveDateTime::new(date, time).and_utc().timestamp_millis() - self.offset_ms()
    }

    fn to_local(&self, ms: Ms) -> Option<NaiveDateTime> {
        DateTime::from_timestamp_millis(ms + self.offset_ms()).map(|dt| dt.naive_utc())
    }
}

/// One `date range range ...` group, ranges in written order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayBlock {
    pub date: NaiveDate,
    pub spans: Vec<Span>,
}

/// Fragment + reason; the caller decides which error variant it becomes.
type Malformed<'a> = (&'a str, &'static str);

/// First few characters of an oversized input, for error messages.
fn head(text: &str) -> &str {
    let end = text.char_indices().nth(32).map_or(text.len(), |(i, _)| i);
    &text[..end]
}

fn parse_range<'a>(
    token: &'a str,
    date: NaiveDate,
    fmt: &ScheduleFormat,
) -> Result<Span, Malformed<'a>> {
    let (from, to) = token
        .split_once('-')
        .ok_or((token, "time range must be HH:MM-HH:MM"))?;
    let start = NaiveTime::parse_from_str(from, &fmt.time_format)
        .map_err(|_| (token, "invalid start time"))?;
    let end = NaiveTime::parse_from_str(to, &fmt.time_format)
        .map_err(|_| (token, "invalid end time"))?;
    Span::try_new(fmt.to_ms(date, start), fmt.to_ms(date, end))
        .ok_or((token, "range must end after it starts"))
}

fn parse_block<'a>(block: &'a str, fmt: &ScheduleFormat) -> Result<DayBlock, Malformed<'a>> {
    let mut tokens = block.split_whitespace();
    let date_token = tokens.next().ok_or((block, "empty day block"))?;
    let date = NaiveDate::parse_from_str(date_token, &fmt.date_format)
        .map_err(|_| (date_token, "invalid date"))?;

    let spans = tokens
        .map(|token| parse_range(token, date, fmt))
        .collect::<Result<Vec<_>, _>>()?;
    if spans.is_empty() {
        return Err((block, "day block has no time ranges"));
    }
    Ok(DayBlock { date, spans })
}

/// Parse a schedule into its day blocks, in the order they are written.
///
/// ```text
/// schedule  := day_block ( '|' day_block )*
/// day_block := date WS range ( WS range )*
/// range     := time '-' time
/// ```
pub fn parse_day_blocks(text: &str, fmt: &ScheduleFormat) -> Result<Vec<DayBlock>, ScheduleError> {
    let malformed = |(fragment, reason): Malformed<'_>| ScheduleError::MalformedSchedule {
        fragment: fragment.to_string(),
        reason,
    };
    if text.len() > MAX_SCHEDULE_LEN {
        return Err(malformed((head(text), "schedule too long")));
    }
    if text.trim().is_empty() {
        return Err(malformed((text, "empty schedule")));
    }
    text.split('|')
        .map(|block| parse_block(block, fmt).map_err(malformed))
        .collect()
}

/// Parse a schedule into every interval it declares.
pub fn parse_schedule(text: &str, fmt: &ScheduleFormat) -> Result<Vec<Span>, ScheduleError> {
    Ok(parse_day_blocks(text, fmt)?
        .into_iter()
        .flat_map(|block| block.spans)
        .collect())
}

/// Parse a single `YYYY-MM-DD HH:MM-HH:MM` slot.
pub fn parse_slot(text: &str, fmt: &ScheduleFormat) -> Result<Span, ScheduleError> {
    let malformed = |(fragment, reason): Malformed<'_>| ScheduleError::MalformedSlot {
        fragment: fragment.to_string(),
        reason,
    };
    if text.len() > MAX_SLOT_LEN {
        return Err(malformed((head(text), "slot too long")));
    }
    if text.contains('|') {
        return Err(malformed((text, "slot must be a single day")));
    }
    let block = parse_block(text, fmt).map_err(malformed)?;
    match block.spans.as_slice() {
        [span] => Ok(*span),
        _ => Err(malformed((text, "slot must contain exactly one time range"))),
    }
}

/// Canonical slot text. Spans are expected to fall within one local day.
pub fn format_span(span: &Span, fmt: &ScheduleFormat) -> String {
    match (fmt.to_local(span.start), fmt.to_local(span.end)) {
        (Some(start), Some(end)) => format!(
            "{} {}-{}",
            start.format(&fmt.date_format),
            start.format(&fmt.time_format),
            end.format(&fmt.time_format)
        ),
        _ => format!("[{}, {})", span.start, span.end),
    }
}

/// Canonical schedule text: consecutive spans on the same date share a block.
pub fn format_schedule(spans: &[Span], fmt: &ScheduleFormat) -> String {
    let mut blocks: Vec<(NaiveDate, Vec<String>)> = Vec::new();
    for span in spans {
        let (Some(start), Some(end)) = (fmt.to_local(span.start), fmt.to_local(span.end)) else {
            continue;
        };
        let range = format!(
            "{}-{}",
            start.format(&fmt.time_format),
            end.format(&fmt.time_format)
        );
        match blocks.last_mut() {
            Some((date, ranges)) if *date == start.date() => ranges.push(range),
            _ => blocks.push((start.date(), vec![range])),
        }
    }
    blocks
        .into_iter()
        .map(|(date, ranges)| format!("{} {}", date.format(&fmt.date_format), ranges.join(" ")))
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MINUTE_MS;
    use proptest::prelude::*;

    const H: Ms = 3_600_000;

    fn fmt() -> ScheduleFormat {
        ScheduleFormat::default()
    }

    /// 2026-02-01 00:00 at UTC+3, in unix ms.
    fn feb1() -> Ms {
        NaiveDate::from_ymd_opt(2026, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
            - 3 * H
    }

    #[test]
    fn parses_multi_block_schedule() {
        let spans =
            parse_schedule("2026-02-01 09:00-13:00 14:00-16:00|2026-02-02 10:00-14:00", &fmt())
                .unwrap();
        let d = feb1();
        assert_eq!(
            spans,
            vec![
                Span::new(d + 9 * H, d + 13 * H),
                Span::new(d + 14 * H, d + 16 * H),
                Span::new(d + 24 * H + 10 * H, d + 24 * H + 14 * H),
            ]
        );
    }

    #[test]
    fn times_are_read_at_utc_plus_three() {
        let span = parse_slot("2026-02-01 09:00-09:30", &fmt()).unwrap();
        // 09:00 at +03:00 is 06:00 UTC.
        let utc = DateTime::from_timestamp_millis(span.start).unwrap();
        assert_eq!(utc.format("%Y-%m-%d %H:%M").to_string(), "2026-02-01 06:00");
        assert_eq!(span.duration_ms(), 30 * MINUTE_MS);
    }

    #[test]
    fn tolerates_extra_whitespace() {
        let spans = parse_schedule(" 2026-02-01  09:00-10:00 | 2026-02-02 10:00-11:00 ", &fmt())
            .unwrap();
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn day_blocks_keep_written_order() {
        let blocks =
            parse_day_blocks("2026-02-02 10:00-11:00|2026-02-01 14:00-15:00 09:00-10:00", &fmt())
                .unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].date, NaiveDate::from_ymd_opt(2026, 2, 2).unwrap());
        assert_eq!(blocks[1].spans[0].start, feb1() + 14 * H);
    }

    #[test]
    fn rejects_empty_input() {
        for text in ["", "   "] {
            let err = parse_schedule(text, &fmt()).unwrap_err();
            assert!(matches!(err, ScheduleError::MalformedSchedule { reason: "empty schedule", .. }));
        }
    }

    #[test]
    fn rejects_bad_date() {
        let err = parse_schedule("2026-13-01 09:00-10:00", &fmt()).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::MalformedSchedule {
                fragment: "2026-13-01".into(),
                reason: "invalid date",
            }
        );
    }

    #[test]
    fn rejects_bad_range() {
        let err = parse_schedule("2026-02-01 09:00-10:00 1100-1200", &fmt()).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::MalformedSchedule {
                fragment: "1100-1200".into(),
                reason: "invalid start time",
            }
        );
        let err = parse_schedule("2026-02-01 09:00", &fmt()).unwrap_err();
        assert!(matches!(err, ScheduleError::MalformedSchedule { ref fragment, .. } if fragment == "09:00"));
    }

    #[test]
    fn rejects_inverted_or_empty_range() {
        for text in ["2026-02-01 10:00-09:00", "2026-02-01 10:00-10:00"] {
            let err = parse_schedule(text, &fmt()).unwrap_err();
            assert!(matches!(
                err,
                ScheduleError::MalformedSchedule { reason: "range must end after it starts", .. }
            ));
        }
    }

    #[test]
    fn rejects_empty_block_and_date_only_block() {
        let err = parse_schedule("2026-02-01 09:00-10:00||2026-02-02 09:00-10:00", &fmt()).unwrap_err();
        assert!(matches!(err, ScheduleError::MalformedSchedule { reason: "empty day block", .. }));
        let err = parse_schedule("2026-02-01", &fmt()).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::MalformedSchedule { reason: "day block has no time ranges", .. }
        ));
    }

    #[test]
    fn slot_requires_exactly_one_range() {
        assert!(parse_slot("2026-02-01 09:00-09:30", &fmt()).is_ok());
        let err = parse_slot("2026-02-01 09:00-09:30 10:00-10:30", &fmt()).unwrap_err();
        assert!(matches!(err, ScheduleError::MalformedSlot { .. }));
        let err = parse_slot("2026-02-01 09:00-09:30|2026-02-02 09:00-09:30", &fmt()).unwrap_err();
        assert!(matches!(err, ScheduleError::MalformedSlot { .. }));
        let err = parse_slot("tomorrow at nine", &fmt()).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::MalformedSlot {
                fragment: "tomorrow".into(),
                reason: "invalid date",
            }
        );
    }

    #[test]
    fn format_span_is_canonical() {
        let span = parse_slot("2026-02-01 9:05-10:00", &fmt()).unwrap();
        assert_eq!(format_span(&span, &fmt()), "2026-02-01 09:05-10:00");
    }

    #[test]
    fn format_schedule_groups_by_date() {
        let text = "2026-02-01 09:00-13:00 14:00-16:00|2026-02-02 10:00-14:00";
        let spans = parse_schedule(text, &fmt()).unwrap();
        assert_eq!(format_schedule(&spans, &fmt()), text);
    }

    fn arb_spans() -> impl Strategy<Value = Vec<Span>> {
        // (day offset, start minute, length in minutes) within a single local day
        prop::collection::vec((0i64..60, 0i64..(23 * 60), 1i64..60), 1..12).prop_map(|raw| {
            raw.into_iter()
                .map(|(day, start_min, len)| {
                    let start = feb1() + day * 24 * H + start_min * MINUTE_MS;
                    Span::new(start, start + len * MINUTE_MS)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn parse_is_left_inverse_of_format(spans in arb_spans()) {
            let text = format_schedule(&spans, &fmt());
            let reparsed = parse_schedule(&text, &fmt()).unwrap();
            prop_assert_eq!(reparsed, spans);
        }
    }
}
