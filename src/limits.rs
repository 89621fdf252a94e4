use crate::model::{DAY, Ms};

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_LEAVE_TYPE_LEN: usize = 256;
pub const MAX_RESOURCES: usize = 100_000;
pub const MAX_PAGE_SIZE: usize = 100;

/// Longest single leave block.
pub const MAX_LEAVE_SPAN_MS: Ms = 31 * DAY;

pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// 2100-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// Largest encoded WAL payload. A length prefix above this marks a corrupt entry.
pub const MAX_WAL_ENTRY_BYTES: usize = 64 * 1024;
