use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{EngineError, SchedulingEngine};

fn check_page(page: usize, page_size: usize) -> Result<(), EngineError> {
    if page == 0 {
        return Err(EngineError::InvalidArgument("page must be at least 1"));
    }
    if page_size == 0 {
        return Err(EngineError::InvalidArgument("page size must be at least 1"));
    }
    if page_size > MAX_PAGE_SIZE {
        return Err(EngineError::LimitExceeded("page size too large"));
    }
    Ok(())
}

impl SchedulingEngine {
    /// Register a doctor under a fresh id.
    pub async fn create_resource(
        &self,
        name: &str,
        specialty: Option<&str>,
    ) -> Result<Ulid, EngineError> {
        let id = Ulid::new();
        self.create_resource_with_id(id, name, specialty).await?;
        Ok(id)
    }

    pub async fn create_resource_with_id(
        &self,
        id: Ulid,
        name: &str,
        specialty: Option<&str>,
    ) -> Result<(), EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidArgument("name must not be blank"));
        }
        if name.len() > MAX_NAME_LEN || specialty.is_some_and(|s| s.len() > MAX_NAME_LEN) {
            return Err(EngineError::LimitExceeded("name too long"));
        }
        if self.store.list_resources(1, 1).await?.total >= MAX_RESOURCES {
            return Err(EngineError::LimitExceeded("too many resources"));
        }
        self.store
            .create_resource(Resource {
                id,
                name: name.to_string(),
                specialty: specialty.map(str::to_string),
            })
            .await?;
        tracing::info!(%id, name, "resource created");
        Ok(())
    }

    /// Doctors, ordered by id.
    pub async fn list_resources(
        &self,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Resource>, EngineError> {
        check_page(page, page_size)?;
        Ok(self.store.list_resources(page, page_size).await?)
    }

    /// Patient appointments for a doctor ordered by start. Leave blocks are not listed.
    pub async fn list_appointments(
        &self,
        resource_id: Ulid,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Reservation>, EngineError> {
        check_page(page, page_size)?;
        Ok(self
            .appointments
            .appointments_page(resource_id, page, page_size)
            .await?)
    }
}
