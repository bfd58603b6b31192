//! Extension loader - single source of truth for active extension code
//!
//! Extensions are compiled in and listed explicitly; the loader invokes
//! their registration entry point, wires the returned cogs into the
//! dispatcher, router, and scheduler, and tracks one
//! [`ExtensionRecord`] per name.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{error, info, warn};

use crate::application::dispatch::MatchDispatcher;
use crate::application::errors::ExtensionError;
use crate::application::services::CommandRouter;
use crate::extensions::cog::Extension;
use crate::extensions::host::HostHandle;
use crate::extensions::record::{ExtensionRecord, ExtensionState, ExtensionStatus, LoadResult};
use crate::extensions::scheduler::LoopScheduler;

/// Discovers, loads, and unloads extensions.
pub struct ExtensionLoader {
    /// Explicit registration list, in registration order.
    factories: RwLock<Vec<Box<dyn Extension>>>,
    records: RwLock<HashMap<String, ExtensionRecord>>,
    host: HostHandle,
    dispatcher: Arc<MatchDispatcher>,
    scheduler: Arc<LoopScheduler>,
    commands: Arc<CommandRouter>,
}

impl ExtensionLoader {
    pub fn new(
        host: HostHandle,
        dispatcher: Arc<MatchDispatcher>,
        scheduler: Arc<LoopScheduler>,
        commands: Arc<CommandRouter>,
    ) -> Self {
        Self {
            factories: RwLock::new(Vec::new()),
            records: RwLock::new(HashMap::new()),
            host,
            dispatcher,
            scheduler,
            commands,
        }
    }

    /// Add an extension to the registration list. Duplicate names are
    /// rejected; the first registration wins.
    pub fn register_factory(&self, extension: Box<dyn Extension>) {
        let mut factories = write_lock(&self.factories);
        if factories.iter().any(|f| f.name() == extension.name()) {
            warn!(
                "Extension '{}' already registered, ignoring duplicate",
                extension.name()
            );
            return;
        }
        factories.push(extension);
    }

    /// Names of every registered extension, in registration order.
    pub fn discover(&self) -> Vec<String> {
        read_lock(&self.factories)
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }

    /// Load one extension.
    ///
    /// Loading an already-loaded extension is a no-op. A registration
    /// failure is logged and reported when `allow_failure` is set (the
    /// bulk-startup policy) and propagated otherwise (the explicit admin
    /// action policy).
    pub fn load(&self, name: &str, allow_failure: bool) -> Result<LoadResult, ExtensionError> {
        let mut records = write_lock(&self.records);
        if records.get(name).map(|r| r.is_loaded()).unwrap_or(false) {
            return Ok(LoadResult::failed("already loaded"));
        }

        match self.try_load(name) {
            Ok(record) => {
                info!(
                    "Loaded extension '{}' ({} commands, {} matchers, {} loops)",
                    name,
                    record.command_names.len(),
                    record.matcher_count,
                    record.loop_count
                );
                records.insert(name.to_string(), record);
                Ok(LoadResult::success("loaded"))
            }
            Err(e) => {
                records.insert(
                    name.to_string(),
                    ExtensionRecord {
                        name: name.to_string(),
                        state: ExtensionState::Failed,
                        owned_tables: Vec::new(),
                        command_names: Vec::new(),
                        matcher_count: 0,
                        loop_count: 0,
                        has_schema: false,
                    },
                );
                if allow_failure {
                    error!("Failed to load extension '{}': {}", name, e);
                    Ok(LoadResult::failed(format!("failed: {}", e)))
                } else {
                    Err(e)
                }
            }
        }
    }

    fn try_load(&self, name: &str) -> Result<ExtensionRecord, ExtensionError> {
        let factories = read_lock(&self.factories);
        let factory = factories
            .iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| ExtensionError::Unknown(name.to_string()))?;

        let registration = factory.register(&self.host)?;

        // Storage models first: an extension that cannot create its
        // tables must not be loaded at all.
        let mut owned_tables = Vec::new();
        for model in &registration.models {
            self.host.database().ensure_table(model).map_err(|e| {
                ExtensionError::Registration(format!("table '{}': {}", model.name, e))
            })?;
            owned_tables.push(model.name.clone());
        }

        // Every loaded extension gets a schema entry, empty if it
        // declared none, so tenant resolution covers the full loaded set.
        let has_schema = registration.schema.is_some();
        self.host
            .tenant_config()
            .register_schema(name, registration.schema.unwrap_or_default());

        let command_names: Vec<String> = registration
            .commands
            .iter()
            .map(|c| c.name.clone())
            .collect();
        self.commands.register_all(name, registration.commands);

        let matcher_count = registration.matchers.len();
        for matcher in registration.matchers {
            self.dispatcher.subscribe(name, matcher);
        }

        let loop_count = registration.loops.len();
        for cog in registration.loops {
            self.scheduler.spawn(name, cog);
        }

        Ok(ExtensionRecord {
            name: name.to_string(),
            state: ExtensionState::Loaded,
            owned_tables,
            command_names,
            matcher_count,
            loop_count,
            has_schema,
        })
    }

    /// Unload one extension: stop its loops (cooperatively), drop its
    /// dispatcher subscriptions and commands, and deregister its schema.
    pub fn unload(&self, name: &str, allow_failure: bool) -> Result<LoadResult, ExtensionError> {
        let mut records = write_lock(&self.records);
        if !records.get(name).map(|r| r.is_loaded()).unwrap_or(false) {
            return Ok(LoadResult::failed("not loaded"));
        }

        match self.try_unload(name) {
            Ok(()) => {
                if let Some(record) = records.get_mut(name) {
                    record.state = ExtensionState::Unloaded;
                    record.command_names.clear();
                    record.matcher_count = 0;
                    record.loop_count = 0;
                }
                info!("Unloaded extension '{}'", name);
                Ok(LoadResult::success("unloaded"))
            }
            Err(e) => {
                if allow_failure {
                    error!("Failed to unload extension '{}': {}", name, e);
                    Ok(LoadResult::failed(format!("failed: {}", e)))
                } else {
                    Err(e)
                }
            }
        }
    }

    fn try_unload(&self, name: &str) -> Result<(), ExtensionError> {
        // Cooperative stop: loops observe the signal at their next
        // checkpoint; unload does not wait for task exit.
        let stopped = self.scheduler.stop_extension(name);
        if !stopped.is_empty() {
            info!(
                "Signalled {} loop(s) of extension '{}' to stop",
                stopped.len(),
                name
            );
        }

        self.dispatcher.unsubscribe_extension(name);
        self.commands.remove_extension(name);
        self.host.tenant_config().deregister_schema(name);
        Ok(())
    }

    /// Admin-facing status snapshot.
    pub fn status(&self) -> ExtensionStatus {
        let records = read_lock(&self.records);
        let mut loaded: Vec<String> = records
            .values()
            .filter(|r| r.is_loaded())
            .map(|r| r.name.clone())
            .collect();
        loaded.sort();

        let mut available: Vec<String> = self
            .discover()
            .into_iter()
            .filter(|name| !loaded.contains(name))
            .collect();
        available.sort();

        ExtensionStatus { loaded, available }
    }

    pub fn record(&self, name: &str) -> Option<ExtensionRecord> {
        read_lock(&self.records).get(name).cloned()
    }

    /// Load every discovered extension, isolating failures per extension
    /// so one bad registration never blocks the rest.
    pub fn load_all(&self, allow_failure: bool) -> Result<Vec<(String, LoadResult)>, ExtensionError> {
        let mut results = Vec::new();
        for name in self.discover() {
            let result = self.load(&name, allow_failure)?;
            results.push((name, result));
        }
        Ok(results)
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
