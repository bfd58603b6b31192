//! Extension runtime
//!
//! The lifecycle core of the bot: archetype contracts, the loader that
//! activates extensions, the scheduler supervising their background
//! loops, and the capability handle extension code receives.

pub mod builtin;
pub mod cog;
pub mod host;
pub mod loader;
pub mod record;
pub mod scheduler;

pub use cog::{Extension, LoopCog, MatchCog, MatchHit, Registration};
pub use host::HostHandle;
pub use loader::ExtensionLoader;
pub use record::{ExtensionRecord, ExtensionState, ExtensionStatus, LoadResult};
pub use scheduler::{LoopHandle, LoopScheduler, WaitPolicy, DEFAULT_WAIT};
