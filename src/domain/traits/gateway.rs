use async_trait::async_trait;

use crate::application::errors::BotError;

/// Gateway trait - abstraction for the chat-platform client.
///
/// The real platform client (event delivery, rate limiting, REST calls)
/// lives behind this seam; the runtime only sends messages, reacts, and
/// asks who it is.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send a message to a channel, returning the platform message id.
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<String, BotError>;

    /// Add a reaction to an existing message.
    async fn add_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), BotError>;

    /// Identity of the bot account on the platform.
    fn identity(&self) -> GatewayIdentity;
}

/// Bot account information
#[derive(Debug, Clone)]
pub struct GatewayIdentity {
    pub user_id: String,
    pub username: String,
}
