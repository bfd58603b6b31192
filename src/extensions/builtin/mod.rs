//! Built-in reference extensions

pub mod daily_note;
pub mod karma;

pub use daily_note::DailyNoteExtension;
pub use karma::KarmaExtension;

use crate::extensions::cog::Extension;

/// Default extension manifest compiled into the binary.
///
/// `loop_tenant` is the tenant scope whose configuration drives
/// bot-global loops.
pub fn manifest(loop_tenant: &str) -> Vec<Box<dyn Extension>> {
    vec![
        Box::new(KarmaExtension),
        Box::new(DailyNoteExtension::new(loop_tenant)),
    ]
}
