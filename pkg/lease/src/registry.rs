use tracing::{info, warn};
use uuid::Uuid;

use pkg_constants::state::{RESOURCE_INDEX_PREFIX, RESOURCES_PREFIX};
use pkg_state::StateStore;
use pkg_state::store::resource_key;
use pkg_types::resource::Resource;
use pkg_types::validate::validate_name;

use crate::error::{LeaseError, LeaseResult};

/// Plain record CRUD for resources. Resources are immutable and never deleted.
#[derive(Clone)]
pub struct ResourceRegistry {
    store: StateStore,
}

fn index_key(kind: &str, identifier: &str) -> String {
    format!("{}{}/{}", RESOURCE_INDEX_PREFIX, kind, identifier)
}

impl ResourceRegistry {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Register a resource; `(kind, identifier)` must not be taken.
    pub async fn create(&self, kind: &str, identifier: &str) -> LeaseResult<Resource> {
        validate_name("type", kind).map_err(|e| LeaseError::InvalidRequest(e.to_string()))?;
        validate_name("identifier", identifier)
            .map_err(|e| LeaseError::InvalidRequest(e.to_string()))?;
        if kind.contains('/') {
            return Err(LeaseError::InvalidRequest(
                "type must not contain '/'".to_string(),
            ));
        }

        let index = index_key(kind, identifier);
        let _guard = self.store.lock_key(&index).await;
        if self.store.get(&index).await?.is_some() {
            return Err(LeaseError::ResourceExists {
                kind: kind.to_string(),
                identifier: identifier.to_string(),
            });
        }

        let resource = Resource {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            identifier: identifier.to_string(),
        };
        let data = serde_json::to_vec(&resource).map_err(anyhow::Error::from)?;
        self.store
            .put_all(&[
                (resource_key(resource.id), data),
                (index, resource.id.to_string().into_bytes()),
            ])
            .await?;

        info!(
            "Registered resource {}/{} (id={})",
            resource.kind, resource.identifier, resource.id
        );
        Ok(resource)
    }

    /// All resources ordered by type, then identifier.
    pub async fn list(&self) -> LeaseResult<Vec<Resource>> {
        let entries = self.store.list_prefix(RESOURCES_PREFIX).await?;
        let mut resources: Vec<Resource> = entries
            .into_iter()
            .filter_map(|(key, v)| match serde_json::from_slice(&v) {
                Ok(resource) => Some(resource),
                Err(e) => {
                    warn!("Skipping unreadable resource at {}: {}", key, e);
                    None
                }
            })
            .collect();
        resources.sort_by(|a, b| {
            (a.kind.as_str(), a.identifier.as_str()).cmp(&(b.kind.as_str(), b.identifier.as_str()))
        });
        Ok(resources)
    }

    pub async fn get(&self, id: Uuid) -> LeaseResult<Resource> {
        match self.store.get(&resource_key(id)).await? {
            Some(data) => Ok(serde_json::from_slice(&data).map_err(anyhow::Error::from)?),
            None => Err(LeaseError::ResourceNotFound(id)),
        }
    }
}
