pub mod clock;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod store;
pub mod wal;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, SchedulePolicy};
pub use engine::{EngineError, IntervalValidator, SchedulingEngine};
pub use model::{Ms, Page, Reservation, Resource, Span, TimeSlot};
pub use store::{PagedAppointmentReader, ReservationStore, StoreError, WalStore};
