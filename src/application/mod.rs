//! Application layer - Runtime orchestration
//!
//! This layer contains:
//! - Services: Tenant configuration, command routing, operator commands
//! - Dispatch: Event routing to matching extensions
//! - Errors: Layered error taxonomy

pub mod dispatch;
pub mod errors;
pub mod services;
