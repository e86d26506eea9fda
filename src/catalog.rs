use std::collections::HashSet;
use std::path::PathBuf;

use thiserror::Error;

use crate::limits::{MAX_SCHEDULE_LEN, MAX_SERVICES};
use crate::model::{Service, ServiceId};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read service catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse service catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate service_id {0}")]
    DuplicateId(ServiceId),
    #[error("service {0} has a zero duration")]
    ZeroDuration(ServiceId),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
}

/// Where services come from. Read in full on every operation that needs them.
pub trait ServiceSource: Send + Sync {
    fn load(&self) -> Result<Vec<Service>, CatalogError>;

    fn find(&self, service_id: ServiceId) -> Result<Option<Service>, CatalogError> {
        Ok(self
            .load()?
            .into_iter()
            .find(|s| s.service_id == service_id))
    }
}

/// A JSON array of service rows on disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ServiceSource for JsonFileSource {
    fn load(&self) -> Result<Vec<Service>, CatalogError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| CatalogError::Io {
            path: self.path.clone(),
            source,
        })?;
        let services: Vec<Service> = serde_json::from_str(&raw)?;
        validate(&services)?;
        tracing::debug!(path = %self.path.display(), count = services.len(), "service catalog loaded");
        Ok(services)
    }
}

/// Services held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    services: Vec<Service>,
}

impl StaticSource {
    pub fn new(services: Vec<Service>) -> Result<Self, CatalogError> {
        validate(&services)?;
        Ok(Self { services })
    }
}

impl ServiceSource for StaticSource {
    fn load(&self) -> Result<Vec<Service>, CatalogError> {
        Ok(self.services.clone())
    }
}

fn validate(services: &[Service]) -> Result<(), CatalogError> {
    if services.len() > MAX_SERVICES {
        return Err(CatalogError::LimitExceeded("too many services"));
    }
    let mut seen = HashSet::new();
    for svc in services {
        if !seen.insert(svc.service_id) {
            return Err(CatalogError::DuplicateId(svc.service_id));
        }
        if svc.duration_minutes == 0 {
            return Err(CatalogError::ZeroDuration(svc.service_id));
        }
        if svc.schedule.len() > MAX_SCHEDULE_LEN {
            return Err(CatalogError::LimitExceeded("schedule too long"));
        }
    }
    Ok(())
}
