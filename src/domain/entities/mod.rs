//! Domain entities - Core runtime objects with no external dependencies

pub mod command;
pub mod message;
pub mod schema;
pub mod user;

pub use command::{Command, CommandHandler};
pub use message::{EventContext, MessageEvent};
pub use schema::{ConfigField, ConfigSchema, FieldType, FieldValue};
pub use user::User;
