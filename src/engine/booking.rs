use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::record_booking;

use super::error::{ALREADY_BOOKED, END_BEFORE_START};
use super::validator::validate_timestamp;
use super::{EngineError, SchedulingEngine};

impl SchedulingEngine {
    /// Book a one-hour appointment for `subject_id` starting at `requested_start`.
    ///
    /// Validation, conflict and existence checks all run before the single write; a
    /// failure at any stage leaves the store untouched.
    pub async fn book_appointment(
        &self,
        resource_id: Ulid,
        subject_id: Ulid,
        requested_start: Ms,
    ) -> Result<Ulid, EngineError> {
        let result = self
            .admit(
                resource_id,
                Some(subject_id),
                None,
                requested_start,
                requested_start.saturating_add(HOUR),
            )
            .await;
        record_booking("appointment", &result);
        result
    }

    /// Block out `[requested_start, requested_end)` as leave. A missing end means one hour.
    pub async fn book_leave(
        &self,
        resource_id: Ulid,
        leave_type: &str,
        requested_start: Ms,
        requested_end: Option<Ms>,
    ) -> Result<Ulid, EngineError> {
        let result = self
            .try_book_leave(resource_id, leave_type, requested_start, requested_end)
            .await;
        record_booking("leave", &result);
        result
    }

    async fn try_book_leave(
        &self,
        resource_id: Ulid,
        leave_type: &str,
        requested_start: Ms,
        requested_end: Option<Ms>,
    ) -> Result<Ulid, EngineError> {
        if leave_type.trim().is_empty() {
            return Err(EngineError::InvalidArgument("leave type must not be blank"));
        }
        if leave_type.len() > MAX_LEAVE_TYPE_LEN {
            return Err(EngineError::LimitExceeded("leave type too long"));
        }
        let requested_end = match requested_end {
            None => requested_start.saturating_add(HOUR),
            Some(end) if end < requested_start => {
                return Err(EngineError::InvalidRange(END_BEFORE_START));
            }
            Some(end) => end,
        };
        if requested_end.saturating_sub(requested_start) > MAX_LEAVE_SPAN_MS {
            return Err(EngineError::LimitExceeded("leave too long"));
        }

        self.admit(
            resource_id,
            None,
            Some(leave_type.to_string()),
            requested_start,
            requested_end,
        )
        .await
    }

    /// Received → Validated → ConflictChecked → Persisted.
    ///
    /// Only `requested_start` is checked against the clock and business hours; the end
    /// bound is aligned but may fall outside business hours (a leave can run overnight).
    async fn admit(
        &self,
        resource_id: Ulid,
        subject_id: Option<Ulid>,
        reason: Option<String>,
        requested_start: Ms,
        requested_end: Ms,
    ) -> Result<Ulid, EngineError> {
        validate_timestamp(requested_start)?;
        validate_timestamp(requested_end)?;
        if let Err(e) = self.validator.validate_input_instant(requested_start) {
            debug!(%resource_id, requested_start, "rejected slot: {e}");
            return Err(e);
        }

        let span = self.validator.aligned_span(requested_start, requested_end)?;

        if self
            .validator
            .has_conflict(resource_id, span.start, span.end)
            .await?
        {
            debug!(%resource_id, start = span.start, end = span.end, "rejected: already booked");
            return Err(EngineError::SchedulingConflict(ALREADY_BOOKED));
        }

        if !self.store.resource_exists(resource_id).await? {
            return Err(EngineError::ResourceNotFound(resource_id));
        }

        // The store re-checks overlap under its own lock; losing a race surfaces here
        // as SchedulingConflict through From<StoreError>.
        let saved = self
            .store
            .save(NewReservation {
                resource_id,
                subject_id,
                span,
                reason,
            })
            .await?;

        let kind = if saved.is_leave() { "leave" } else { "appointment" };
        info!(
            id = %saved.id,
            %resource_id,
            start = span.start,
            end = span.end,
            kind,
            "reservation booked"
        );
        Ok(saved.id)
    }
}
