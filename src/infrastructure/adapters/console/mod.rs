//! Console adapter for development/testing

use async_trait::async_trait;

use crate::application::errors::BotError;
use crate::domain::traits::{Gateway, GatewayIdentity};

/// Console gateway for local development: messages print to stdout.
pub struct ConsoleGateway {
    identity: GatewayIdentity,
}

impl ConsoleGateway {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            identity: GatewayIdentity {
                user_id: "console-bot".to_string(),
                username: name,
            },
        }
    }

    pub fn read_line(&self, prompt: &str) -> Option<String> {
        use std::io::Write;
        print!("{}", prompt);
        std::io::stdout().flush().ok()?;
        let mut input = String::new();
        std::io::stdin().read_line(&mut input).ok()?;
        if input.is_empty() {
            return None; // EOF
        }
        Some(input.trim().to_string())
    }
}

impl Default for ConsoleGateway {
    fn default() -> Self {
        Self::new("corvid-bot")
    }
}

#[async_trait]
impl Gateway for ConsoleGateway {
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<String, BotError> {
        println!("[{}] {}", channel_id, text);
        Ok("console_msg".to_string())
    }

    async fn add_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), BotError> {
        println!("[{}] reacted to {} with {}", channel_id, message_id, emoji);
        Ok(())
    }

    fn identity(&self) -> GatewayIdentity {
        self.identity.clone()
    }
}
