//! Chat command routing
//!
//! Commands are owned by extensions; routing consults the tenant's
//! enabled-extension set before running anything outside the reserved
//! `core` namespace.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::application::errors::CommandError;
use crate::application::services::TenantConfigStore;
use crate::domain::entities::{Command, MessageEvent};

/// Extension namespace for operator commands, routed for every tenant.
pub const CORE_NAMESPACE: &str = "core";

/// Routes prefixed chat messages to extension-owned command handlers.
pub struct CommandRouter {
    prefix: String,
    commands: RwLock<HashMap<String, (String, Arc<Command>)>>,
    tenant_config: Arc<TenantConfigStore>,
}

impl CommandRouter {
    pub fn new(prefix: impl Into<String>, tenant_config: Arc<TenantConfigStore>) -> Self {
        Self {
            prefix: prefix.into(),
            commands: RwLock::new(HashMap::new()),
            tenant_config,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Register a command under the extension that owns it.
    pub fn register(&self, extension: impl Into<String>, command: Command) {
        let extension = extension.into();
        write_lock(&self.commands).insert(command.name.clone(), (extension, Arc::new(command)));
    }

    pub fn register_all(&self, extension: &str, commands: Vec<Command>) {
        for command in commands {
            self.register(extension, command);
        }
    }

    /// Remove every command owned by an extension, returning their names.
    pub fn remove_extension(&self, extension: &str) -> Vec<String> {
        let mut commands = write_lock(&self.commands);
        let names: Vec<String> = commands
            .iter()
            .filter(|(_, (owner, _))| owner == extension)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &names {
            commands.remove(name);
        }
        names
    }

    pub fn is_command(&self, text: &str) -> bool {
        text.starts_with(&self.prefix)
    }

    /// Route a prefixed message. Returns `Ok(None)` for non-command text.
    pub fn handle(&self, event: &MessageEvent) -> Result<Option<String>, CommandError> {
        let Some(rest) = event.content.strip_prefix(&self.prefix) else {
            return Ok(None);
        };

        let parts: Vec<&str> = rest.split_whitespace().collect();
        let Some(name) = parts.first() else {
            return Ok(None);
        };
        let args: Vec<String> = parts[1..].iter().map(|s| s.to_string()).collect();

        // Clone the command out so no lock is held while the handler
        // runs; handlers may re-enter the router (load/unload commands).
        let (owner, command) = {
            let commands = read_lock(&self.commands);
            commands
                .get(*name)
                .cloned()
                .ok_or_else(|| CommandError::NotFound(name.to_string()))?
        };

        if owner != CORE_NAMESPACE {
            let enabled = self
                .tenant_config
                .resolve(&event.tenant_id)
                .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?
                .enabled_extensions
                .contains(&owner);
            if !enabled {
                return Err(CommandError::PermissionDenied);
            }
        }

        match &command.handler {
            Some(handler) => Ok(Some(handler(event, &args)?)),
            None => Ok(Some(format!("Command {} not implemented", command.name))),
        }
    }

    /// Help text listing every registered command.
    pub fn help(&self) -> String {
        let commands = read_lock(&self.commands);
        let mut lines: Vec<String> = commands
            .values()
            .map(|(_, cmd)| {
                format!(
                    "  {}{} - {}",
                    self.prefix,
                    cmd.name,
                    cmd.description.as_deref().unwrap_or("")
                )
            })
            .collect();
        lines.sort();
        format!("Available commands:\n{}", lines.join("\n"))
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
    use crate::domain::entities::User;
    use crate::infrastructure::database::Database;

    fn router() -> CommandRouter {
        let db = Arc::new(Database::in_memory().expect("in-memory db"));
        let store = Arc::new(TenantConfigStore::new(db));
        CommandRouter::new("!", store)
    }

    fn event(content: &str) -> MessageEvent {
        MessageEvent::new("t1", "general", User::new("u1"), content)
    }

    #[test]
    fn routes_core_commands_without_enablement() {
        let router = router();
        router.register(
            CORE_NAMESPACE,
            Command::new("ping").with_handler(|_, _| Ok("pong".to_string())),
        );

        let reply = router.handle(&event("!ping")).unwrap();
        assert_eq!(reply.as_deref(), Some("pong"));
    }

    #[test]
    fn extension_commands_require_enablement() {
        let router = router();
        router.register(
            "karma",
            Command::new("karma").with_handler(|_, _| Ok("0".to_string())),
        );

        // "karma" owns the command but is not a registered extension, so
        // the tenant's enabled set does not contain it.
        let err = router.handle(&event("!karma")).unwrap_err();
        assert!(matches!(err, CommandError::PermissionDenied));
    }

    #[test]
    fn non_command_text_is_ignored() {
        let router = router();
        assert!(router.handle(&event("hello there")).unwrap().is_none());
        assert!(router.handle(&event("!")).unwrap().is_none());
    }

    #[test]
    fn unknown_command_is_reported() {
        let router = router();
        let err = router.handle(&event("!nope")).unwrap_err();
        assert!(matches!(err, CommandError::NotFound(_)));
    }

    #[test]
    fn remove_extension_drops_only_its_commands() {
        let router = router();
        router.register(
            CORE_NAMESPACE,
            Command::new("ping").with_handler(|_, _| Ok("pong".to_string())),
        );
        router.register(
            "karma",
            Command::new("karma").with_handler(|_, _| Ok("0".to_string())),
        );

        let removed = router.remove_extension("karma");
        assert_eq!(removed, vec!["karma".to_string()]);
        assert!(router.handle(&event("!ping")).unwrap().is_some());
        assert!(matches!(
            router.handle(&event("!karma")),
            Err(CommandError::NotFound(_))
        ));
    }
}
