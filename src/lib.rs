//! corvid-bot: a multi-tenant chat-bot extension runtime
//!
//! The host process loads independently-authored extensions, routes
//! inbound chat events to the ones that want them, supervises their
//! background loops, and gives each extension a per-tenant configuration
//! surface.

pub mod application;
pub mod domain;
pub mod extensions;
pub mod infrastructure;
