//! Application services - Runtime orchestration

pub mod admin;
pub mod command_router;
pub mod tenant_config;

pub use command_router::{CommandRouter, CORE_NAMESPACE};
pub use tenant_config::{TenantConfig, TenantConfigStore, TENANT_ID_KEY};
