use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

pub type SharedResourceState = Arc<RwLock<ResourceState>>;

#[derive(Debug)]
pub enum StoreError {
    UnknownResource(Ulid),
    DuplicateResource(Ulid),
    /// The write would overlap an existing reservation (the exclusion constraint).
    Overlap(Ulid),
    Wal(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::UnknownResource(id) => write!(f, "unknown resource: {id}"),
            StoreError::DuplicateResource(id) => write!(f, "resource already exists: {id}"),
            StoreError::Overlap(id) => write!(f, "overlaps reservation: {id}"),
            StoreError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Backing store for reservations and the resources they are booked against.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Every reservation for `resource_id` whose span intersects `span` (half-open).
    /// An unknown resource has no reservations.
    async fn find_overlapping(
        &self,
        resource_id: Ulid,
        span: Span,
    ) -> Result<Vec<Reservation>, StoreError>;

    /// Persist a reservation and assign its id. Must refuse a write that would overlap
    /// an existing reservation for the same resource, even if the caller checked first.
    async fn save(&self, reservation: NewReservation) -> Result<Reservation, StoreError>;

    async fn resource_exists(&self, resource_id: Ulid) -> Result<bool, StoreError>;

    async fn create_resource(&self, resource: Resource) -> Result<(), StoreError>;

    /// Resources ordered by id.
    async fn list_resources(
        &self,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Resource>, StoreError>;
}

/// Read side used by appointment listings.
#[async_trait]
pub trait PagedAppointmentReader: Send + Sync {
    /// Appointments only (leave blocks excluded), ordered by start ascending.
    async fn appointments_page(
        &self,
        resource_id: Ulid,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Reservation>, StoreError>;
}

// ── Group-commit WAL channel ─────────────────────────────

struct WalAppend {
    event: Event,
    response: oneshot::Sender<io::Result<()>>,
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first append arrives.
/// 2. Drain all immediately available appends (the batch window).
/// 3. Single flush_sync for the whole batch.
/// 4. Respond to all senders with the batch result.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalAppend>) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = rx.try_recv() {
            batch.push(next);
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            tracing::error!(path = %wal.path().display(), "WAL flush failed: {e}");
        }

        for cmd in batch {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = cmd.response.send(r);
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[WalAppend]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for cmd in batch {
        if let Err(e) = wal.append_buffered(&cmd.event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even on append error, so partially buffered bytes
    // don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

/// In-memory reservation store made durable by a write-ahead log.
///
/// Each resource sits behind its own `RwLock`; `save` re-checks overlap while holding the
/// write lock, which serializes racing bookings for the same doctor.
pub struct WalStore {
    resources: DashMap<Ulid, SharedResourceState>,
    wal_tx: mpsc::Sender<WalAppend>,
    /// Held from the duplicate check until the new resource is visible in `resources`.
    create_lock: Mutex<()>,
}

impl WalStore {
    /// Replay the WAL at `path` and start the group-commit writer.
    /// Must be called from within a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let (wal, events) = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Self {
            resources: DashMap::new(),
            wal_tx,
            create_lock: Mutex::new(()),
        };

        // We are the sole owner of these Arcs during replay, so try_write never contends.
        for event in &events {
            match event {
                Event::ResourceCreated { id, name, specialty } => {
                    let rs = ResourceState::new(Resource {
                        id: *id,
                        name: name.clone(),
                        specialty: specialty.clone(),
                    });
                    store.resources.insert(*id, Arc::new(RwLock::new(rs)));
                }
                Event::ReservationSaved { reservation } => {
                    let Some(rs) = store.get(&reservation.resource_id) else {
                        tracing::warn!(
                            "replay: reservation {} for unknown resource {}",
                            reservation.id,
                            reservation.resource_id
                        );
                        continue;
                    };
                    let Ok(mut guard) = rs.try_write() else {
                        continue;
                    };
                    guard.insert_reservation(reservation.clone());
                }
            }
        }
        tracing::info!(
            path = %path.display(),
            events = events.len(),
            resources = store.resources.len(),
            "reservation store opened"
        );

        Ok(store)
    }

    fn get(&self, id: &Ulid) -> Option<SharedResourceState> {
        self.resources.get(id).map(|e| e.value().clone())
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalAppend {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }
}

#[cfg(test)]
impl WalStore {
    /// A store whose WAL writer is already gone, so every durable write fails.
    pub(crate) fn with_failing_wal(resources: Vec<Resource>) -> Self {
        let (wal_tx, wal_rx) = mpsc::channel(1);
        drop(wal_rx);
        let store = Self {
            resources: DashMap::new(),
            wal_tx,
            create_lock: Mutex::new(()),
        };
        for resource in resources {
            store
                .resources
                .insert(resource.id, Arc::new(RwLock::new(ResourceState::new(resource))));
        }
        store
    }
}

#[async_trait]
impl ReservationStore for WalStore {
    async fn find_overlapping(
        &self,
        resource_id: Ulid,
        span: Span,
    ) -> Result<Vec<Reservation>, StoreError> {
        let Some(rs) = self.get(&resource_id) else {
            return Ok(Vec::new());
        };
        let guard = rs.read().await;
        Ok(guard.overlapping(&span).cloned().collect())
    }

    async fn save(&self, reservation: NewReservation) -> Result<Reservation, StoreError> {
        let rs = self
            .get(&reservation.resource_id)
            .ok_or(StoreError::UnknownResource(reservation.resource_id))?;
        let mut guard = rs.write().await;

        if let Some(existing) = guard.overlapping(&reservation.span).next() {
            return Err(StoreError::Overlap(existing.id));
        }

        let reservation = reservation.into_reservation(Ulid::new());
        let event = Event::ReservationSaved {
            reservation: reservation.clone(),
        };
        self.wal_append(&event).await?;
        guard.insert_reservation(reservation.clone());
        Ok(reservation)
    }

    async fn resource_exists(&self, resource_id: Ulid) -> Result<bool, StoreError> {
        Ok(self.resources.contains_key(&resource_id))
    }

    async fn create_resource(&self, resource: Resource) -> Result<(), StoreError> {
        let _creating = self.create_lock.lock().await;
        if self.resources.contains_key(&resource.id) {
            return Err(StoreError::DuplicateResource(resource.id));
        }
        let event = Event::ResourceCreated {
            id: resource.id,
            name: resource.name.clone(),
            specialty: resource.specialty.clone(),
        };
        self.wal_append(&event).await?;
        self.resources
            .insert(resource.id, Arc::new(RwLock::new(ResourceState::new(resource))));
        Ok(())
    }

    async fn list_resources(
        &self,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Resource>, StoreError> {
        let states: Vec<SharedResourceState> =
            self.resources.iter().map(|e| e.value().clone()).collect();
        let mut all = Vec::with_capacity(states.len());
        for rs in states {
            all.push(rs.read().await.resource.clone());
        }
        all.sort_by_key(|r| r.id);
        Ok(Page::slice(all, page, page_size))
    }
}

#[async_trait]
impl PagedAppointmentReader for WalStore {
    async fn appointments_page(
        &self,
        resource_id: Ulid,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Reservation>, StoreError> {
        let Some(rs) = self.get(&resource_id) else {
            return Ok(Page::slice(Vec::new(), page, page_size));
        };
        let guard = rs.read().await;
        let all: Vec<Reservation> = guard.appointments().cloned().collect();
        Ok(Page::slice(all, page, page_size))
    }
}
