/// Longest schedule description accepted from the catalog.
pub const MAX_SCHEDULE_LEN: usize = 16 * 1024;

/// Longest slot string accepted from a tool call.
pub const MAX_SLOT_LEN: usize = 64;

/// Services per catalog load.
pub const MAX_SERVICES: usize = 10_000;

/// Committed bookings per service.
pub const MAX_BOOKINGS_PER_SERVICE: usize = 100_000;

/// Longest model reply the loop will try to parse.
pub const MAX_REPLY_LEN: usize = 64 * 1024;

/// Longest `terminate` message surfaced to the user.
pub const MAX_MESSAGE_LEN: usize = 8 * 1024;
