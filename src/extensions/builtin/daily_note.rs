//! Daily note extension: posts a configured note on a schedule
//!
//! Exercises the scheduled-loop archetype: `preconfigure` validates the
//! target channel, the wait policy follows live tenant configuration
//! (cron expression or the default fixed wait), and `execute` posts the
//! note.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use cron::Schedule;
use tracing::warn;

use crate::application::errors::ExtensionError;
use crate::domain::entities::{ConfigSchema, FieldType, FieldValue};
use crate::extensions::cog::{Extension, LoopCog, Registration};
use crate::extensions::host::HostHandle;
use crate::extensions::scheduler::WaitPolicy;

pub struct DailyNoteExtension {
    tenant_id: String,
}

impl DailyNoteExtension {
    /// `tenant_id` is the scope whose configuration drives the loop.
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
        }
    }
}

impl Extension for DailyNoteExtension {
    fn name(&self) -> &str {
        "daily-note"
    }

    fn register(&self, host: &HostHandle) -> Result<Registration, ExtensionError> {
        let mut schema = ConfigSchema::new();
        schema.add(
            "channel",
            FieldType::Text,
            "Channel",
            "Channel the note is posted to",
            FieldValue::Text("general".to_string()),
        )?;
        schema.add(
            "note",
            FieldType::Text,
            "Note",
            "Text of the note",
            FieldValue::Text("Don't forget to stretch.".to_string()),
        )?;
        schema.add(
            "schedule",
            FieldType::Text,
            "Schedule",
            "Cron expression (sec min hour dom mon dow year); empty uses the default wait",
            FieldValue::Text(String::new()),
        )?;

        let cog = Arc::new(DailyNoteCog {
            host: host.clone(),
            tenant_id: self.tenant_id.clone(),
        });

        Ok(Registration::new().with_schema(schema).with_loop(cog))
    }
}

struct DailyNoteCog {
    host: HostHandle,
    tenant_id: String,
}

impl DailyNoteCog {
    fn config(&self) -> Result<ConfigSchema, ExtensionError> {
        let resolved = self
            .host
            .tenant_config()
            .resolve(&self.tenant_id)
            .map_err(|e| ExtensionError::Execution(e.to_string()))?;
        resolved
            .extensions
            .get("daily-note")
            .cloned()
            .ok_or_else(|| ExtensionError::MissingConfig("daily-note schema".to_string()))
    }
}

#[async_trait]
impl LoopCog for DailyNoteCog {
    fn name(&self) -> &str {
        "daily-note"
    }

    async fn preconfigure(&self) -> Result<(), ExtensionError> {
        let config = self.config()?;
        let channel = config.text_value("channel").unwrap_or_default();
        if channel.is_empty() {
            return Err(ExtensionError::MissingConfig("channel".to_string()));
        }
        let expr = config.text_value("schedule").unwrap_or_default();
        if !expr.is_empty() && Schedule::from_str(expr).is_err() {
            return Err(ExtensionError::MissingConfig(format!(
                "invalid schedule expression: {}",
                expr
            )));
        }
        Ok(())
    }

    fn wait_policy(&self) -> WaitPolicy {
        let expr = self
            .config()
            .ok()
            .and_then(|c| c.text_value("schedule").map(str::to_string))
            .unwrap_or_default();
        if expr.is_empty() {
            return WaitPolicy::default();
        }
        match Schedule::from_str(&expr) {
            Ok(schedule) => WaitPolicy::Cron(Box::new(schedule)),
            Err(e) => {
                // Preconfigure validated the expression once, but config
                // can change while the loop runs.
                warn!("daily-note: bad schedule '{}' ({}), using default wait", expr, e);
                WaitPolicy::default()
            }
        }
    }

    async fn execute(&self) -> Result<(), ExtensionError> {
        let config = self.config()?;
        let channel = config
            .text_value("channel")
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ExtensionError::MissingConfig("channel".to_string()))?
            .to_string();
        let note = config.text_value("note").unwrap_or_default().to_string();

        self.host
            .gateway()
            .send_message(&channel, &note)
            .await
            .map_err(|e| ExtensionError::Execution(e.to_string()))?;
        Ok(())
    }
}
