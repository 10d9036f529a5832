//! Bridge facade
//!
//! [`HealthBridge`] owns the boundary binding and the registry and exposes
//! the public surface: availability, the type catalog, authorization, query,
//! aggregation, store and delete. The query/aggregation/write entry points
//! live in their own modules as further `impl` blocks on this type.

use tracing::info;

use crate::error::BridgeError;
use crate::registry::TypeRegistry;
use crate::resolver::TypeResolver;
use crate::store::HealthStore;
use crate::types::{AccessScope, DataTypeEntry};

/// Facade over one boundary binding.
///
/// Construction is cheap; the registry tables are static. The bridge is
/// stateless between calls, so one instance can serve any number of requests.
pub struct HealthBridge<S> {
    pub(crate) store: S,
    pub(crate) registry: TypeRegistry,
}

impl<S: HealthStore> HealthBridge<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            registry: TypeRegistry::new(),
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Whether the native health store exists on this device
    pub async fn is_available(&self) -> Result<bool, BridgeError> {
        Ok(self.store.is_available().await?)
    }

    /// Catalog of every generic data type this bridge understands
    pub fn available_data_types(&self) -> Vec<DataTypeEntry> {
        self.registry.entries()
    }

    /// Request read/write authorization for the given scopes.
    ///
    /// Scopes resolve to native identifier sets first; one unknown name fails
    /// the whole request and nothing reaches the boundary.
    pub async fn request_authorization(&self, scopes: &[AccessScope]) -> Result<(), BridgeError> {
        let resolved = TypeResolver::new(&self.registry).resolve(scopes)?;
        info!(
            read = resolved.read.len(),
            write = resolved.write.len(),
            "requesting authorization"
        );
        self.store
            .request_authorization(&resolved.read, &resolved.write)
            .await?;
        Ok(())
    }

    /// Whether every native type the scopes resolve to is authorized.
    ///
    /// Statuses are checked one at a time; the first non-authorized type
    /// short-circuits to `false`. Scopes resolving to nothing (only
    /// characteristics) are authorized by definition.
    pub async fn is_authorized(&self, scopes: &[AccessScope]) -> Result<bool, BridgeError> {
        let resolved = TypeResolver::new(&self.registry).resolve(scopes)?;
        for native_type in resolved.combined() {
            let status = self.store.authorization_status(&native_type).await?;
            if !status.is_authorized() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
