use uuid::Uuid;

use crate::core::services::{ServiceError, ServiceResult};
use crate::domain::Client;
use crate::storage::StorageBackend;

/// Onboarding and lookup helpers for client entities.
pub struct ClientService;

impl ClientService {
    /// Registers a client under the given organization.
    pub fn register(
        store: &dyn StorageBackend,
        organization_id: Uuid,
        name: impl Into<String>,
    ) -> ServiceResult<Client> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ServiceError::Validation("client name must not be empty".into()));
        }
        let client = Client::new(organization_id, name);
        let mut tx = store.begin()?;
        tx.insert_client(client.clone())?;
        tx.commit()?;
        Ok(client)
    }

    /// Fetches a client by id.
    pub fn get(store: &dyn StorageBackend, client_id: Uuid) -> ServiceResult<Client> {
        store
            .client(client_id)?
            .ok_or(ServiceError::ClientNotFound(client_id))
    }
}
