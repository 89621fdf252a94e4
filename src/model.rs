use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds in UTC. Every instant in the crate uses this type.
pub type Ms = i64;

pub const HOUR: Ms = 3_600_000;
pub const DAY: Ms = 24 * HOUR;

/// Truncate minutes, seconds and sub-second precision to zero.
pub fn align_to_hour(t: Ms) -> Ms {
    t - t.rem_euclid(HOUR)
}

/// UTC hour of day, `0..=23`.
pub fn hour_of_day(t: Ms) -> i64 {
    t.div_euclid(HOUR).rem_euclid(24)
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Adjacent spans (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Both bounds snapped down to the hour grid.
    pub fn aligned(&self) -> Span {
        Span {
            start: align_to_hour(self.start),
            end: align_to_hour(self.end),
        }
    }
}

/// A doctor: the unit of exclusivity for conflict checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Ulid,
    pub name: String,
    pub specialty: Option<String>,
}

/// A booked interval against a resource. `subject_id == None` marks a leave block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub subject_id: Option<Ulid>,
    pub span: Span,
    /// Leave type; only set on leave blocks.
    pub reason: Option<String>,
}

impl Reservation {
    pub fn is_appointment(&self) -> bool {
        self.subject_id.is_some()
    }

    pub fn is_leave(&self) -> bool {
        self.subject_id.is_none()
    }
}

/// A reservation that has not been persisted yet. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub resource_id: Ulid,
    pub subject_id: Option<Ulid>,
    pub span: Span,
    pub reason: Option<String>,
}

impl NewReservation {
    pub fn into_reservation(self, id: Ulid) -> Reservation {
        Reservation {
            id,
            resource_id: self.resource_id,
            subject_id: self.subject_id,
            span: self.span,
            reason: self.reason,
        }
    }
}

/// One hour of free capacity. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: Ms,
    pub end: Ms,
}

impl From<Span> for TimeSlot {
    fn from(span: Span) -> Self {
        Self {
            start: span.start,
            end: span.end,
        }
    }
}

/// Per-resource in-memory state held by the store.
#[derive(Debug, Clone)]
pub struct ResourceState {
    pub resource: Resource,
    /// All reservations, sorted by `span.start`.
    pub reservations: Vec<Reservation>,
}

impl ResourceState {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            reservations: Vec::new(),
        }
    }

    /// Insert reservation maintaining sort order by span.start.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.span.start, |r| r.span.start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    /// Return only reservations whose span overlaps the query window.
    /// Uses binary search to skip reservations starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.span.start < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.span.end > query.start)
    }

    pub fn appointments(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.iter().filter(|r| r.is_appointment())
    }
}

/// The WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ResourceCreated {
        id: Ulid,
        name: String,
        specialty: Option<String>,
    },
    ReservationSaved {
        reservation: Reservation,
    },
}

// ── Query result types ───────────────────────────────────────────

/// One page of a listing. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

impl<T> Page<T> {
    /// Slice a fully materialized, already-ordered listing.
    pub fn slice(all: Vec<T>, page: usize, page_size: usize) -> Self {
        let total = all.len();
        let skip = page.saturating_sub(1).saturating_mul(page_size);
        let items = all.into_iter().skip(skip).take(page_size).collect();
        Self {
            items,
            page,
            page_size,
            total,
        }
    }

    /// An empty listing still has one (empty) page.
    pub fn total_pages(&self) -> usize {
        if self.total == 0 {
            1
        } else {
            self.total.div_ceil(self.page_size)
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}
