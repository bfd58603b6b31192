//! Extension archetype contracts
//!
//! An extension contributes units of one or more archetypes: plain chat
//! commands, message-matching cogs, scheduled-loop cogs, and persisted
//! table models. Everything it contributes is collected into a single
//! [`Registration`] returned from its entry point.

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::errors::ExtensionError;
use crate::domain::entities::{Command, ConfigSchema, EventContext};
use crate::extensions::host::HostHandle;
use crate::extensions::scheduler::WaitPolicy;
use crate::infrastructure::database::TableSpec;

/// Value produced by a successful `matches` call.
///
/// Threaded through to `respond` unchanged, so a matcher can hand its
/// responder either a plain hit or the fragment it matched on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchHit {
    Hit,
    Fragment(String),
}

/// Message-matching cog: inspects every inbound event and answers the
/// ones it cares about.
///
/// Both methods default to a fail-fast "must be overridden" error rather
/// than silently matching everything; a cog that implements neither is a
/// programming error, and the dispatcher will log it on first contact.
#[async_trait]
pub trait MatchCog: Send + Sync {
    fn name(&self) -> &str;

    /// Decide whether this cog wants the event. `Ok(None)` means no match.
    async fn matches(
        &self,
        config: &ConfigSchema,
        ctx: &EventContext,
    ) -> Result<Option<MatchHit>, ExtensionError> {
        let _ = (config, ctx);
        Err(ExtensionError::NotImplemented("matches"))
    }

    /// Act on a matched event. Receives the hit `matches` produced.
    async fn respond(
        &self,
        config: &ConfigSchema,
        ctx: &EventContext,
        hit: MatchHit,
    ) -> Result<(), ExtensionError> {
        let _ = (config, ctx, hit);
        Err(ExtensionError::NotImplemented("respond"))
    }
}

/// Scheduled-loop cog: runs a wait/execute cycle on a supervised task
/// until its extension is unloaded.
#[async_trait]
pub trait LoopCog: Send + Sync {
    fn name(&self) -> &str;

    /// One-time setup before the first cycle (resolving channels,
    /// validating config). A failure here is fatal to this loop: the
    /// cycle never starts.
    async fn preconfigure(&self) -> Result<(), ExtensionError> {
        Ok(())
    }

    /// How the loop suspends between cycles. Re-read every iteration, so
    /// a policy can follow live tenant configuration.
    fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::default()
    }

    /// The periodic action. Defaults to the same fail-fast guard as the
    /// matching contract.
    async fn execute(&self) -> Result<(), ExtensionError> {
        Err(ExtensionError::NotImplemented("execute"))
    }
}

/// Everything one extension contributes at registration time.
#[derive(Default)]
pub struct Registration {
    pub commands: Vec<Command>,
    pub matchers: Vec<Arc<dyn MatchCog>>,
    pub loops: Vec<Arc<dyn LoopCog>>,
    pub models: Vec<TableSpec>,
    pub schema: Option<ConfigSchema>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn MatchCog>) -> Self {
        self.matchers.push(matcher);
        self
    }

    pub fn with_loop(mut self, cog: Arc<dyn LoopCog>) -> Self {
        self.loops.push(cog);
        self
    }

    pub fn with_model(mut self, model: TableSpec) -> Self {
        self.models.push(model);
        self
    }

    pub fn with_schema(mut self, schema: ConfigSchema) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Extension registration contract.
///
/// Extensions are compiled in and listed explicitly with the loader; the
/// entry point receives a narrow [`HostHandle`] rather than the host
/// itself.
pub trait Extension: Send + Sync {
    /// Unique extension name; doubles as the tenant-config namespace.
    fn name(&self) -> &str;

    /// Build this extension's cogs, models, and config schema.
    fn register(&self, host: &HostHandle) -> Result<Registration, ExtensionError>;
}
