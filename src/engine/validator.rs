use std::sync::Arc;

use ulid::Ulid;

use crate::clock::Clock;
use crate::config::SchedulePolicy;
use crate::limits::*;
use crate::model::*;
use crate::store::ReservationStore;

use super::EngineError;
use super::error::{END_BEFORE_START, IN_THE_PAST};

/// Every rule `instant` breaks, in a fixed order. Empty means bookable.
/// Both checks always run: callers learn about all violations at once.
pub fn slot_violations(policy: &SchedulePolicy, instant: Ms, now: Ms) -> Vec<String> {
    let mut reasons = Vec::new();
    if instant < now {
        reasons.push(IN_THE_PAST.to_string());
    }
    if !policy.within_business_hours(instant) {
        reasons.push(policy.business_hours_reason());
    }
    reasons
}

pub(crate) fn validate_timestamp(t: Ms) -> Result<(), EngineError> {
    if !(MIN_VALID_TIMESTAMP_MS..=MAX_VALID_TIMESTAMP_MS).contains(&t) {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    Ok(())
}

/// Decides whether a candidate interval is bookable for a resource right now.
pub struct IntervalValidator {
    store: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
    policy: SchedulePolicy,
}

impl IntervalValidator {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        clock: Arc<dyn Clock>,
        policy: SchedulePolicy,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &SchedulePolicy {
        &self.policy
    }

    pub fn now(&self) -> Ms {
        self.clock.now()
    }

    /// Not in the past (per the injected clock) and inside business hours.
    pub fn validate_input_instant(&self, instant: Ms) -> Result<(), EngineError> {
        let reasons = slot_violations(&self.policy, instant, self.clock.now());
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(EngineError::InvalidSlot { reasons })
        }
    }

    pub fn align_to_hour(&self, instant: Ms) -> Ms {
        align_to_hour(instant)
    }

    /// Align both bounds; the aligned span must still be non-empty.
    pub fn aligned_span(&self, start: Ms, end: Ms) -> Result<Span, EngineError> {
        let (start, end) = (align_to_hour(start), align_to_hour(end));
        if end <= start {
            return Err(EngineError::InvalidRange(END_BEFORE_START));
        }
        Ok(Span::new(start, end))
    }

    /// True iff an existing reservation overlaps `[candidate_start, candidate_end)`
    /// after both sides are aligned to the hour grid. Touching boundaries do not conflict.
    /// A candidate that aligns to an empty span covers no time and never conflicts.
    pub async fn has_conflict(
        &self,
        resource_id: Ulid,
        candidate_start: Ms,
        candidate_end: Ms,
    ) -> Result<bool, EngineError> {
        let Ok(candidate) = self.aligned_span(candidate_start, candidate_end) else {
            return Ok(false);
        };
        let existing = self.store.find_overlapping(resource_id, candidate).await?;
        Ok(existing
            .iter()
            .any(|r| r.span.aligned().overlaps(&candidate)))
    }
}
