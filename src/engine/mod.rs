mod availability;
mod booking;
mod error;
mod queries;
#[cfg(test)]
mod tests;
mod validator;

pub use availability::{free_slots, horizon, merge_overlapping};
pub use error::{ALREADY_BOOKED, END_BEFORE_START, EngineError, IN_THE_PAST};
pub use validator::{IntervalValidator, slot_violations};

use std::io;
use std::sync::Arc;

use ulid::Ulid;

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, SchedulePolicy};
use crate::model::Ms;
use crate::store::{PagedAppointmentReader, ReservationStore, WalStore};

/// Books appointments and leave blocks against doctors and reports their free slots.
///
/// Holds no mutable state of its own: every decision is a read against the store
/// followed by at most one write. Exclusion between racing writers is the store's job.
pub struct SchedulingEngine {
    store: Arc<dyn ReservationStore>,
    appointments: Arc<dyn PagedAppointmentReader>,
    validator: IntervalValidator,
}

impl SchedulingEngine {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        appointments: Arc<dyn PagedAppointmentReader>,
        clock: Arc<dyn Clock>,
        policy: SchedulePolicy,
    ) -> Self {
        let validator = IntervalValidator::new(store.clone(), clock, policy);
        Self {
            store,
            appointments,
            validator,
        }
    }

    /// Use one backend for both the booking store and the appointment listing.
    pub fn with_store<S>(store: Arc<S>, clock: Arc<dyn Clock>, policy: SchedulePolicy) -> Self
    where
        S: ReservationStore + PagedAppointmentReader + 'static,
    {
        Self::new(store.clone(), store, clock, policy)
    }

    /// Open the WAL-backed store under `config.data_dir` on wall-clock time.
    pub fn open(config: &Config) -> io::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = Arc::new(WalStore::open(&config.wal_path())?);
        Ok(Self::with_store(store, Arc::new(SystemClock), config.policy))
    }

    pub fn policy(&self) -> &SchedulePolicy {
        self.validator.policy()
    }

    pub async fn has_conflict(
        &self,
        resource_id: Ulid,
        start: Ms,
        end: Ms,
    ) -> Result<bool, EngineError> {
        self.validator.has_conflict(resource_id, start, end).await
    }
}
