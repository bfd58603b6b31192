use super::User;
use chrono::{DateTime, Utc};

/// An inbound chat message delivered by the platform gateway.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub id: String,
    pub tenant_id: String,
    pub channel_id: String,
    pub author: User,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl MessageEvent {
    pub fn new(
        tenant_id: impl Into<String>,
        channel_id: impl Into<String>,
        author: User,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            channel_id: channel_id.into(),
            author,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Snapshot of one event handed to matching extensions.
///
/// Carries only what a `matches`/`respond` pair needs: the tenant scope,
/// the channel to reply into, the author, and the raw content.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub tenant_id: String,
    pub channel_id: String,
    pub author: User,
    pub content: String,
}

impl EventContext {
    pub fn from_event(event: &MessageEvent) -> Self {
        Self {
            tenant_id: event.tenant_id.clone(),
            channel_id: event.channel_id.clone(),
            author: event.author.clone(),
            content: event.content.clone(),
        }
    }
}
