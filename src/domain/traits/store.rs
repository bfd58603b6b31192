use std::collections::{HashMap, HashSet};

use crate::application::errors::StorageError;
use crate::domain::entities::FieldValue;

/// ConfigBackend trait - narrow interface over the persistence engine for
/// per-tenant configuration state.
///
/// Calls may block on the underlying store; callers are expected to keep
/// them off the hot event path (the tenant config service caches resolved
/// documents).
pub trait ConfigBackend: Send + Sync {
    /// Stored override values for one tenant and extension.
    fn load_overrides(
        &self,
        tenant_id: &str,
        extension: &str,
    ) -> Result<HashMap<String, FieldValue>, StorageError>;

    /// Replace the stored override set for one tenant and extension.
    fn save_overrides(
        &self,
        tenant_id: &str,
        extension: &str,
        values: &HashMap<String, FieldValue>,
    ) -> Result<(), StorageError>;

    /// Extensions explicitly disabled for a tenant.
    fn disabled_extensions(&self, tenant_id: &str) -> Result<HashSet<String>, StorageError>;

    /// Record an explicit enable/disable decision for a tenant.
    fn set_extension_enabled(
        &self,
        tenant_id: &str,
        extension: &str,
        enabled: bool,
    ) -> Result<(), StorageError>;
}
