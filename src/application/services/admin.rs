//! Operator commands over the extension loader and tenant config
//!
//! Registered under the reserved `core` namespace, so they are routed
//! for every tenant regardless of the enabled-extension set.

use std::sync::{Arc, Weak};

use crate::application::errors::{CommandError, ConfigError};
use crate::application::services::{CommandRouter, TenantConfigStore, CORE_NAMESPACE};
use crate::domain::entities::Command;
use crate::extensions::loader::ExtensionLoader;

/// Register the `core` operator commands.
///
/// The loader is captured weakly: the loader reaches the router through
/// the records it wires up, so a strong reference here would cycle.
pub fn register_core_commands(
    router: &CommandRouter,
    loader: Weak<ExtensionLoader>,
    tenant_config: Arc<TenantConfigStore>,
) {
    let weak = loader.clone();
    router.register(
        CORE_NAMESPACE,
        Command::new("extensions")
            .with_description("List loaded and available extensions")
            .with_handler(move |_event, _args| {
                let loader = upgrade(&weak)?;
                let status = loader.status();
                Ok(format!(
                    "Loaded: {}\nAvailable: {}",
                    join_or_none(&status.loaded),
                    join_or_none(&status.available)
                ))
            }),
    );

    let weak = loader.clone();
    router.register(
        CORE_NAMESPACE,
        Command::new("load")
            .with_description("Load an extension")
            .with_usage("load <name>")
            .with_handler(move |_event, args| {
                let name = single_arg(args, "load <name>")?;
                let loader = upgrade(&weak)?;
                // Explicit admin action: failures propagate instead of
                // being swallowed.
                let result = loader
                    .load(&name, false)
                    .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
                Ok(format!("{}: {}", name, result.message))
            }),
    );

    let weak = loader;
    router.register(
        CORE_NAMESPACE,
        Command::new("unload")
            .with_description("Unload an extension")
            .with_usage("unload <name>")
            .with_handler(move |_event, args| {
                let name = single_arg(args, "unload <name>")?;
                let loader = upgrade(&weak)?;
                let result = loader
                    .unload(&name, false)
                    .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
                Ok(format!("{}: {}", name, result.message))
            }),
    );

    let store = tenant_config.clone();
    router.register(
        CORE_NAMESPACE,
        Command::new("enable")
            .with_description("Enable an extension for this tenant")
            .with_usage("enable <name>")
            .with_handler(move |event, args| {
                let name = single_arg(args, "enable <name>")?;
                store
                    .set_extension_enabled(&event.tenant_id, &name, true)
                    .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
                Ok(format!("Enabled '{}'", name))
            }),
    );

    let store = tenant_config.clone();
    router.register(
        CORE_NAMESPACE,
        Command::new("disable")
            .with_description("Disable an extension for this tenant")
            .with_usage("disable <name>")
            .with_handler(move |event, args| {
                let name = single_arg(args, "disable <name>")?;
                store
                    .set_extension_enabled(&event.tenant_id, &name, false)
                    .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
                Ok(format!("Disabled '{}'", name))
            }),
    );

    let store = tenant_config.clone();
    router.register(
        CORE_NAMESPACE,
        Command::new("config-export")
            .with_description("Download this tenant's config as a document")
            .with_handler(move |event, _args| {
                let doc = store
                    .export(&event.tenant_id)
                    .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
                serde_json::to_string_pretty(&doc)
                    .map_err(|e| CommandError::ExecutionFailed(e.to_string()))
            }),
    );

    let store = tenant_config;
    router.register(
        CORE_NAMESPACE,
        Command::new("config-import")
            .with_description("Upload a config document for this tenant")
            .with_usage("config-import <json>")
            .with_handler(move |event, args| {
                if args.is_empty() {
                    return Err(CommandError::InvalidArgs(
                        "usage: config-import <json>".to_string(),
                    ));
                }
                let raw = args.join(" ");
                let doc: serde_json::Value = serde_json::from_str(&raw)
                    .map_err(|e| CommandError::InvalidArgs(format!("bad JSON: {}", e)))?;
                match store.patch(&event.tenant_id, &doc) {
                    Ok(()) => Ok("Config updated".to_string()),
                    // Schema mismatches are a user-facing deny, not an
                    // internal failure.
                    Err(e @ ConfigError::SchemaMismatch { .. })
                    | Err(e @ ConfigError::InvalidValue { .. }) => Ok(format!("Rejected: {}", e)),
                    Err(e) => Err(CommandError::ExecutionFailed(e.to_string())),
                }
            }),
    );
}

fn upgrade(weak: &Weak<ExtensionLoader>) -> Result<Arc<ExtensionLoader>, CommandError> {
    weak.upgrade()
        .ok_or_else(|| CommandError::ExecutionFailed("extension loader is gone".to_string()))
}

fn single_arg(args: &[String], usage: &str) -> Result<String, CommandError> {
    args.first()
        .cloned()
        .ok_or_else(|| CommandError::InvalidArgs(format!("usage: {}", usage)))
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}
