// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: booking attempts. Labels: kind (`appointment` | `leave`), status.
pub const BOOKINGS_TOTAL: &str = "slotbook_bookings_total";

/// Histogram: availability computation latency in seconds.
pub const AVAILABILITY_DURATION_SECONDS: &str = "slotbook_availability_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "slotbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "slotbook_wal_flush_batch_size";

/// Booking outcome as a metric label.
pub fn status_label(result: &Result<ulid::Ulid, crate::engine::EngineError>) -> &'static str {
    use crate::engine::EngineError;
    match result {
        Ok(_) => "ok",
        Err(EngineError::InvalidSlot { .. }) => "invalid_slot",
        Err(EngineError::InvalidRange(_)) => "invalid_range",
        Err(EngineError::SchedulingConflict(_)) => "conflict",
        Err(EngineError::ResourceNotFound(_)) => "not_found",
        Err(EngineError::LimitExceeded(_)) => "limit_exceeded",
        Err(_) => "error",
    }
}

/// Record one booking attempt.
pub fn record_booking(kind: &'static str, result: &Result<ulid::Ulid, crate::engine::EngineError>) {
    metrics::counter!(BOOKINGS_TOTAL, "kind" => kind, "status" => status_label(result)).increment(1);
}
