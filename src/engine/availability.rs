use ulid::Ulid;

use crate::config::SchedulePolicy;
use crate::model::*;

use super::validator::validate_timestamp;
use super::{EngineError, SchedulingEngine};

// ── Availability Algorithm ────────────────────────────────────────

/// `[align_to_hour(now), align_to_hour(now) + horizon)`.
pub fn horizon(policy: &SchedulePolicy, now: Ms) -> Span {
    let start = align_to_hour(now);
    Span::new(start, start + policy.horizon_ms())
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

/// Walk the hour grid across `horizon` and keep every slot that starts inside business
/// hours and does not overlap a busy span. `busy` may be unsorted and unaligned.
pub fn free_slots(policy: &SchedulePolicy, horizon: &Span, busy: &[Span]) -> Vec<TimeSlot> {
    let mut busy: Vec<Span> = busy.iter().map(Span::aligned).filter(|s| s.start < s.end).collect();
    busy.sort_by_key(|s| s.start);
    let busy = merge_overlapping(&busy);

    let mut slots = Vec::new();
    let mut bi = 0;
    let mut start = align_to_hour(horizon.start);

    while start < horizon.end {
        let slot = Span::new(start, start + HOUR);
        start += HOUR;

        if !policy.within_business_hours(slot.start) {
            continue;
        }
        while bi < busy.len() && busy[bi].end <= slot.start {
            bi += 1;
        }
        if bi < busy.len() && busy[bi].overlaps(&slot) {
            continue;
        }
        slots.push(slot.into());
    }

    slots
}

impl SchedulingEngine {
    /// Free one-hour slots for `resource_id` over the horizon starting at `now`.
    ///
    /// One range query fetches every reservation touching the horizon; the grid is then
    /// filtered in memory. Recomputed on every call.
    pub async fn compute_availability(
        &self,
        resource_id: Ulid,
        now: Ms,
    ) -> Result<Vec<TimeSlot>, EngineError> {
        validate_timestamp(now)?;
        let started = std::time::Instant::now();
        let policy = self.validator.policy();
        let horizon = horizon(policy, now);

        let existing = self.store.find_overlapping(resource_id, horizon).await?;
        let busy: Vec<Span> = existing.iter().map(|r| r.span).collect();
        let slots = free_slots(policy, &horizon, &busy);

        metrics::histogram!(crate::observability::AVAILABILITY_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        tracing::debug!(
            %resource_id,
            reservations = existing.len(),
            free = slots.len(),
            "computed availability"
        );
        Ok(slots)
    }

    /// `compute_availability` at the engine clock's current time.
    pub async fn availability(&self, resource_id: Ulid) -> Result<Vec<TimeSlot>, EngineError> {
        self.compute_availability(resource_id, self.validator.now()).await
    }
}
