//! Per-tenant configuration resolution and mutation
//!
//! Every loaded extension registers its declared schema here; tenants get
//! the declared defaults with their stored overrides layered on top.
//! Resolved documents are cached per tenant and invalidated whenever that
//! tenant's overrides change or the set of registered schemas changes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::application::errors::ConfigError;
use crate::domain::entities::{ConfigSchema, FieldValue};
use crate::domain::traits::ConfigBackend;

/// Metadata key carried by exchanged config documents alongside the
/// schema fields.
pub const TENANT_ID_KEY: &str = "tenant-id";

/// One tenant's effective configuration.
#[derive(Debug, Clone)]
pub struct TenantConfig {
    pub tenant_id: String,
    pub enabled_extensions: HashSet<String>,
    pub extensions: HashMap<String, ConfigSchema>,
}

/// Registry of extension schemas plus the per-tenant resolution cache.
pub struct TenantConfigStore {
    backend: Arc<dyn ConfigBackend>,
    /// Registered schemas in registration order; order is what keeps
    /// exported documents stable.
    schemas: RwLock<Vec<(String, ConfigSchema)>>,
    cache: RwLock<HashMap<String, TenantConfig>>,
}

impl TenantConfigStore {
    pub fn new(backend: Arc<dyn ConfigBackend>) -> Self {
        Self {
            backend,
            schemas: RwLock::new(Vec::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Register the schema of a newly loaded extension. Replaces any
    /// earlier registration under the same name and invalidates every
    /// cached resolution (the schema set changed).
    pub fn register_schema(&self, extension: impl Into<String>, schema: ConfigSchema) {
        let extension = extension.into();
        {
            let mut schemas = write_lock(&self.schemas);
            schemas.retain(|(name, _)| *name != extension);
            schemas.push((extension.clone(), schema));
        }
        self.invalidate_all();
        info!("Registered config schema for extension '{}'", extension);
    }

    /// Drop an unloaded extension's schema and invalidate the cache.
    pub fn deregister_schema(&self, extension: &str) {
        write_lock(&self.schemas).retain(|(name, _)| name != extension);
        self.invalidate_all();
    }

    pub fn is_registered(&self, extension: &str) -> bool {
        read_lock(&self.schemas)
            .iter()
            .any(|(name, _)| name == extension)
    }

    pub fn registered(&self) -> Vec<String> {
        read_lock(&self.schemas)
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Compute a tenant's effective configuration: declared defaults with
    /// stored overrides layered on top. Cached until invalidated.
    pub fn resolve(&self, tenant_id: &str) -> Result<TenantConfig, ConfigError> {
        if let Some(cached) = read_lock(&self.cache).get(tenant_id) {
            return Ok(cached.clone());
        }

        let schemas: Vec<(String, ConfigSchema)> = read_lock(&self.schemas).clone();
        let mut extensions = HashMap::new();
        for (name, schema) in &schemas {
            let mut resolved = schema.clone();
            let overrides = self.backend.load_overrides(tenant_id, name)?;
            for (key, value) in overrides {
                // Overrides written against an older schema revision are
                // skipped, not fatal.
                if let Err(e) = resolved.set_value(&key, value) {
                    warn!(
                        "Ignoring stale override {}.{} for tenant '{}': {}",
                        name, key, tenant_id, e
                    );
                }
            }
            extensions.insert(name.clone(), resolved);
        }

        let disabled = self.backend.disabled_extensions(tenant_id)?;
        let enabled_extensions = schemas
            .iter()
            .map(|(name, _)| name.clone())
            .filter(|name| !disabled.contains(name))
            .collect();

        let config = TenantConfig {
            tenant_id: tenant_id.to_string(),
            enabled_extensions,
            extensions,
        };
        write_lock(&self.cache).insert(tenant_id.to_string(), config.clone());
        Ok(config)
    }

    /// Download a tenant's current configuration as a flat document keyed
    /// `"<extension>.<field>"`, plus the tenant-id metadata key.
    pub fn export(&self, tenant_id: &str) -> Result<serde_json::Value, ConfigError> {
        let resolved = self.resolve(tenant_id)?;
        let schemas = read_lock(&self.schemas);

        let mut doc = serde_json::Map::new();
        doc.insert(
            TENANT_ID_KEY.to_string(),
            serde_json::Value::from(tenant_id),
        );
        for (name, _) in schemas.iter() {
            if let Some(schema) = resolved.extensions.get(name) {
                for (key, field) in schema.iter() {
                    doc.insert(format!("{}.{}", name, key), field.value.to_json());
                }
            }
        }
        Ok(serde_json::Value::Object(doc))
    }

    /// Upload a config document, replacing a tenant's overrides.
    ///
    /// The document's key set must match the currently resolved schema's
    /// key set exactly (plus the tenant-id key): any missing or extra key
    /// rejects the whole upload before a single value is written, so an
    /// out-of-date document can never silently drop fields.
    pub fn patch(&self, tenant_id: &str, doc: &serde_json::Value) -> Result<(), ConfigError> {
        let obj = doc
            .as_object()
            .ok_or_else(|| ConfigError::Parse("config document must be an object".to_string()))?;

        let resolved = self.resolve(tenant_id)?;

        let mut expected: HashSet<String> = HashSet::new();
        expected.insert(TENANT_ID_KEY.to_string());
        for (name, schema) in &resolved.extensions {
            for key in schema.keys() {
                expected.insert(format!("{}.{}", name, key));
            }
        }

        let uploaded: HashSet<String> = obj.keys().cloned().collect();
        let missing: Vec<String> = expected.difference(&uploaded).cloned().collect();
        let extra: Vec<String> = uploaded.difference(&expected).cloned().collect();
        if !missing.is_empty() || !extra.is_empty() {
            let mut missing = missing;
            let mut extra = extra;
            missing.sort();
            extra.sort();
            return Err(ConfigError::SchemaMismatch { missing, extra });
        }

        // Validate every value before writing anything.
        let mut per_extension: HashMap<String, HashMap<String, FieldValue>> = HashMap::new();
        for (doc_key, raw) in obj {
            if doc_key == TENANT_ID_KEY {
                continue;
            }
            let (name, key) = doc_key
                .split_once('.')
                .ok_or_else(|| ConfigError::Parse(format!("malformed key: {}", doc_key)))?;
            let field = resolved
                .extensions
                .get(name)
                .and_then(|schema| schema.get(key))
                .ok_or_else(|| ConfigError::Parse(format!("unknown key: {}", doc_key)))?;
            let value = FieldValue::from_json(field.datatype, raw).ok_or_else(|| {
                ConfigError::InvalidValue {
                    key: doc_key.clone(),
                    expected: field.datatype.as_str(),
                }
            })?;
            per_extension
                .entry(name.to_string())
                .or_default()
                .insert(key.to_string(), value);
        }

        for (name, values) in &per_extension {
            self.backend.save_overrides(tenant_id, name, values)?;
        }

        self.invalidate(tenant_id);
        info!("Patched config for tenant '{}'", tenant_id);
        Ok(())
    }

    /// Enable or disable one extension for a tenant. The extension must
    /// be currently loaded.
    pub fn set_extension_enabled(
        &self,
        tenant_id: &str,
        extension: &str,
        enabled: bool,
    ) -> Result<(), ConfigError> {
        if !self.is_registered(extension) {
            return Err(ConfigError::UnknownExtension(extension.to_string()));
        }
        self.backend
            .set_extension_enabled(tenant_id, extension, enabled)?;
        self.invalidate(tenant_id);
        Ok(())
    }

    pub fn invalidate(&self, tenant_id: &str) {
        write_lock(&self.cache).remove(tenant_id);
    }

    pub fn invalidate_all(&self) {
        write_lock(&self.cache).clear();
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::FieldType;
    use crate::infrastructure::database::Database;

    fn store() -> TenantConfigStore {
        let db = Arc::new(Database::in_memory().expect("in-memory db"));
        TenantConfigStore::new(db)
    }

    fn greeter_schema() -> ConfigSchema {
        ConfigSchema::new()
            .with_field(
                "greeting",
                FieldType::Text,
                "Greeting",
                "What to say",
                FieldValue::Text("hello".to_string()),
            )
            .with_field(
                "loud",
                FieldType::Bool,
                "Loud",
                "Shout the greeting",
                FieldValue::Bool(false),
            )
    }

    #[test]
    fn resolve_uses_defaults_when_no_overrides() {
        let store = store();
        store.register_schema("greeter", greeter_schema());

        let resolved = store.resolve("t1").unwrap();
        let schema = &resolved.extensions["greeter"];
        assert_eq!(schema.text_value("greeting"), Some("hello"));
        assert_eq!(schema.bool_value("loud"), Some(false));
        assert!(resolved.enabled_extensions.contains("greeter"));
    }

    #[test]
    fn resolved_keys_match_registered_schema() {
        let store = store();
        store.register_schema("greeter", greeter_schema());

        let resolved = store.resolve("t1").unwrap();
        let keys: Vec<String> = resolved.extensions["greeter"]
            .keys()
            .map(str::to_string)
            .collect();
        let declared: Vec<String> = greeter_schema().keys().map(str::to_string).collect();
        assert_eq!(keys, declared);
    }

    #[test]
    fn patch_round_trips_through_export() {
        let store = store();
        store.register_schema("greeter", greeter_schema());

        let mut doc = store.export("t1").unwrap();
        doc["greeter.greeting"] = serde_json::json!("howdy");
        doc["greeter.loud"] = serde_json::json!(true);
        store.patch("t1", &doc).unwrap();

        let resolved = store.resolve("t1").unwrap();
        let schema = &resolved.extensions["greeter"];
        assert_eq!(schema.text_value("greeting"), Some("howdy"));
        assert_eq!(schema.bool_value("loud"), Some(true));

        // Other tenants keep the defaults.
        let other = store.resolve("t2").unwrap();
        assert_eq!(other.extensions["greeter"].text_value("greeting"), Some("hello"));
    }

    #[test]
    fn patch_rejects_missing_and_extra_keys() {
        let store = store();
        store.register_schema("greeter", greeter_schema());

        // Missing key.
        let doc = serde_json::json!({
            "tenant-id": "t1",
            "greeter.greeting": "hi",
        });
        let err = store.patch("t1", &doc).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaMismatch { .. }));

        // Extra key.
        let doc = serde_json::json!({
            "tenant-id": "t1",
            "greeter.greeting": "hi",
            "greeter.loud": true,
            "greeter.bogus": 1,
        });
        let err = store.patch("t1", &doc).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaMismatch { .. }));

        // Stored config unchanged after both rejections.
        let resolved = store.resolve("t1").unwrap();
        assert_eq!(resolved.extensions["greeter"].text_value("greeting"), Some("hello"));
    }

    #[test]
    fn patch_rejects_ill_typed_values_without_writing() {
        let store = store();
        store.register_schema("greeter", greeter_schema());

        let doc = serde_json::json!({
            "tenant-id": "t1",
            "greeter.greeting": "hi",
            "greeter.loud": "very",
        });
        let err = store.patch("t1", &doc).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let resolved = store.resolve("t1").unwrap();
        assert_eq!(resolved.extensions["greeter"].text_value("greeting"), Some("hello"));
    }

    #[test]
    fn deregister_removes_extension_from_resolution() {
        let store = store();
        store.register_schema("greeter", greeter_schema());
        assert!(store.resolve("t1").unwrap().extensions.contains_key("greeter"));

        store.deregister_schema("greeter");
        let resolved = store.resolve("t1").unwrap();
        assert!(resolved.extensions.is_empty());
        assert!(resolved.enabled_extensions.is_empty());
    }

    #[test]
    fn enable_disable_round_trip() {
        let store = store();
        store.register_schema("greeter", greeter_schema());

        store.set_extension_enabled("t1", "greeter", false).unwrap();
        assert!(!store.resolve("t1").unwrap().enabled_extensions.contains("greeter"));

        store.set_extension_enabled("t1", "greeter", true).unwrap();
        assert!(store.resolve("t1").unwrap().enabled_extensions.contains("greeter"));

        let err = store
            .set_extension_enabled("t1", "missing", true)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownExtension(_)));
    }

    #[test]
    fn schema_registration_invalidates_cache() {
        let store = store();
        store.register_schema("greeter", greeter_schema());
        let before = store.resolve("t1").unwrap();
        assert_eq!(before.extensions.len(), 1);

        let other = ConfigSchema::new().with_field(
            "count",
            FieldType::Int,
            "Count",
            "",
            FieldValue::Int(0),
        );
        store.register_schema("counter", other);

        let after = store.resolve("t1").unwrap();
        assert_eq!(after.extensions.len(), 2);
    }
}
