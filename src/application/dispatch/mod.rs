//! Match dispatcher - Routes inbound events to matching extensions
//!
//! Every loaded matching-type extension sees every event, in registration
//! order, with per-extension fault isolation: one cog's failure is logged
//! and never reorders or skips the others.

use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use tracing::error;

use crate::application::services::TenantConfigStore;
use crate::domain::entities::{ConfigSchema, EventContext, MessageEvent};
use crate::domain::traits::GatewayIdentity;
use crate::extensions::cog::MatchCog;

/// Routes each inbound [`MessageEvent`] to subscribed match cogs.
pub struct MatchDispatcher {
    /// Subscriptions in registration order; the order is fixed for the
    /// lifetime of a subscription.
    subscriptions: RwLock<Vec<(String, Arc<dyn MatchCog>)>>,
    tenant_config: Arc<TenantConfigStore>,
    identity: GatewayIdentity,
}

impl MatchDispatcher {
    pub fn new(tenant_config: Arc<TenantConfigStore>, identity: GatewayIdentity) -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            tenant_config,
            identity,
        }
    }

    /// Subscribe a match cog on behalf of an extension.
    pub fn subscribe(&self, extension: impl Into<String>, matcher: Arc<dyn MatchCog>) {
        write_lock(&self.subscriptions).push((extension.into(), matcher));
    }

    /// Drop every subscription owned by an extension.
    pub fn unsubscribe_extension(&self, extension: &str) -> usize {
        let mut subs = write_lock(&self.subscriptions);
        let before = subs.len();
        subs.retain(|(owner, _)| owner != extension);
        before - subs.len()
    }

    pub fn subscription_count(&self) -> usize {
        read_lock(&self.subscriptions).len()
    }

    /// Route one event to every subscribed cog.
    pub async fn dispatch(&self, event: &MessageEvent) {
        // The bot's own messages are discarded before anything else runs,
        // so an extension replying in-channel cannot feed itself.
        if event.author.id == self.identity.user_id || event.author.is_bot {
            return;
        }

        let ctx = EventContext::from_event(event);

        let resolved = match self.tenant_config.resolve(&event.tenant_id) {
            Ok(resolved) => resolved,
            Err(e) => {
                error!(
                    "Dropping event for tenant '{}': config resolution failed: {}",
                    event.tenant_id, e
                );
                return;
            }
        };

        // Snapshot so no lock is held across cog calls.
        let subscriptions: Vec<(String, Arc<dyn MatchCog>)> =
            read_lock(&self.subscriptions).clone();
        static EMPTY_SCHEMA: Lazy<ConfigSchema> = Lazy::new(ConfigSchema::new);

        for (extension, matcher) in subscriptions {
            if !resolved.enabled_extensions.contains(&extension) {
                continue;
            }
            let config = resolved
                .extensions
                .get(&extension)
                .unwrap_or(&EMPTY_SCHEMA);

            match matcher.matches(config, &ctx).await {
                Ok(None) => {}
                Ok(Some(hit)) => {
                    if let Err(e) = matcher.respond(config, &ctx, hit).await {
                        error!(
                            "Extension '{}' respond failed for event {}: {}",
                            extension, event.id, e
                        );
                    }
                }
                Err(e) => {
                    error!(
                        "Extension '{}' match failed for event {}: {}",
                        extension, event.id, e
                    );
                }
            }
        }
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
