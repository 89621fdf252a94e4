use ulid::Ulid;

use crate::store::StoreError;

pub const ALREADY_BOOKED: &str = "The selected date is already booked";
pub const END_BEFORE_START: &str = "End date must be after start date";
pub const IN_THE_PAST: &str = "Picked date cannot be in the past";

#[derive(Debug)]
pub enum EngineError {
    /// Every violated slot rule, not just the first.
    InvalidSlot { reasons: Vec<String> },
    InvalidRange(&'static str),
    SchedulingConflict(&'static str),
    ResourceNotFound(Ulid),
    AlreadyExists(Ulid),
    InvalidArgument(&'static str),
    LimitExceeded(&'static str),
    Storage(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidSlot { reasons } => write!(f, "{}", reasons.join(", ")),
            EngineError::InvalidRange(msg) => write!(f, "{msg}"),
            EngineError::SchedulingConflict(msg) => write!(f, "{msg}"),
            EngineError::ResourceNotFound(id) => write!(f, "Doctor with id {id} does not exist"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            // A write refused by the store's exclusion check lost a booking race.
            StoreError::Overlap(_) => EngineError::SchedulingConflict(ALREADY_BOOKED),
            StoreError::UnknownResource(id) => EngineError::ResourceNotFound(id),
            StoreError::DuplicateResource(id) => EngineError::AlreadyExists(id),
            StoreError::Wal(e) => EngineError::Storage(e),
        }
    }
}
