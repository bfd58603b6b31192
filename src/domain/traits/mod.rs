//! Domain traits - Abstractions for infrastructure implementations

pub mod gateway;
pub mod store;

pub use gateway::{Gateway, GatewayIdentity};
pub use store::ConfigBackend;
