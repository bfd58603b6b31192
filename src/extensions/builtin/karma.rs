//! Karma extension: tracks `subject++` / `subject--` per tenant
//!
//! Exercises three archetypes at once: a match cog watching every
//! message, an owned storage table, and a `karma` chat command.

use std::sync::Arc;

use async_trait::async_trait;
use regex_lite::Regex;

use crate::application::errors::{CommandError, ExtensionError};
use crate::domain::entities::{
    Command, ConfigSchema, EventContext, FieldType, FieldValue,
};
use crate::extensions::cog::{Extension, MatchCog, MatchHit, Registration};
use crate::extensions::host::HostHandle;
use crate::infrastructure::database::TableSpec;

const TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS karma_scores (
    tenant_id TEXT NOT NULL,
    subject TEXT NOT NULL,
    score INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (tenant_id, subject)
)";

pub struct KarmaExtension;

impl Extension for KarmaExtension {
    fn name(&self) -> &str {
        "karma"
    }

    fn register(&self, host: &HostHandle) -> Result<Registration, ExtensionError> {
        let mut schema = ConfigSchema::new();
        schema.add(
            "increment",
            FieldType::Int,
            "Increment",
            "Points added or removed per vote",
            FieldValue::Int(1),
        )?;
        schema.add(
            "announce",
            FieldType::Bool,
            "Announce",
            "Reply in channel when karma changes",
            FieldValue::Bool(true),
        )?;

        let pattern = Regex::new(r"(\w+)(\+\+|--)")
            .map_err(|e| ExtensionError::Registration(format!("karma pattern: {}", e)))?;
        let cog = Arc::new(KarmaCog {
            host: host.clone(),
            pattern,
        });

        let command_host = host.clone();
        let karma_command = Command::new("karma")
            .with_description("Show karma for a subject")
            .with_usage("karma <subject>")
            .with_handler(move |event, args| {
                let Some(subject) = args.first() else {
                    return Err(CommandError::InvalidArgs("usage: karma <subject>".to_string()));
                };
                let score = lookup_score(&command_host, &event.tenant_id, subject)
                    .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;
                Ok(format!("{} has {} karma", subject, score))
            });

        Ok(Registration::new()
            .with_schema(schema)
            .with_model(TableSpec::new("karma_scores", TABLE_DDL))
            .with_matcher(cog)
            .with_command(karma_command))
    }
}

fn lookup_score(host: &HostHandle, tenant_id: &str, subject: &str) -> Result<i64, ExtensionError> {
    let score = host.database().with_session(|conn| {
        conn.query_row(
            "SELECT score FROM karma_scores WHERE tenant_id = ?1 AND subject = ?2",
            rusqlite::params![tenant_id, subject],
            |row| row.get(0),
        )
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(0),
            other => Err(other),
        })
    })?;
    Ok(score)
}

struct KarmaCog {
    host: HostHandle,
    pattern: Regex,
}

#[async_trait]
impl MatchCog for KarmaCog {
    fn name(&self) -> &str {
        "karma"
    }

    async fn matches(
        &self,
        _config: &ConfigSchema,
        ctx: &EventContext,
    ) -> Result<Option<MatchHit>, ExtensionError> {
        Ok(self
            .pattern
            .find(&ctx.content)
            .map(|m| MatchHit::Fragment(m.as_str().to_string())))
    }

    async fn respond(
        &self,
        config: &ConfigSchema,
        ctx: &EventContext,
        hit: MatchHit,
    ) -> Result<(), ExtensionError> {
        let MatchHit::Fragment(vote) = hit else {
            return Ok(());
        };

        let (subject, suffix) = vote.split_at(vote.len() - 2);
        let increment = config.int_value("increment").unwrap_or(1);
        let delta = if suffix == "++" { increment } else { -increment };

        let score: i64 = self.host.database().with_session(|conn| {
            conn.execute(
                "INSERT INTO karma_scores (tenant_id, subject, score) VALUES (?1, ?2, ?3)
                 ON CONFLICT(tenant_id, subject) DO UPDATE SET score = score + ?3",
                rusqlite::params![ctx.tenant_id, subject, delta],
            )?;
            conn.query_row(
                "SELECT score FROM karma_scores WHERE tenant_id = ?1 AND subject = ?2",
                rusqlite::params![ctx.tenant_id, subject],
                |row| row.get(0),
            )
        })?;

        if config.bool_value("announce").unwrap_or(true) {
            self.host
                .gateway()
                .send_message(
                    &ctx.channel_id,
                    &format!("{} now has {} karma", subject, score),
                )
                .await
                .map_err(|e| ExtensionError::Execution(e.to_string()))?;
        }
        Ok(())
    }
}
