//! Capability handle passed to extensions

use std::sync::Arc;

use crate::application::services::TenantConfigStore;
use crate::domain::traits::Gateway;
use crate::infrastructure::database::Database;

/// Narrow capability handle given to extension code.
///
/// Cogs get exactly what they may use: sending through the gateway,
/// reading tenant configuration, and storage sessions. They never hold
/// the host itself or another extension's record.
#[derive(Clone)]
pub struct HostHandle {
    gateway: Arc<dyn Gateway>,
    tenant_config: Arc<TenantConfigStore>,
    database: Arc<Database>,
}

impl HostHandle {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        tenant_config: Arc<TenantConfigStore>,
        database: Arc<Database>,
    ) -> Self {
        Self {
            gateway,
            tenant_config,
            database,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn tenant_config(&self) -> &Arc<TenantConfigStore> {
        &self.tenant_config
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }
}
