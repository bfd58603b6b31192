//! Runtime bookkeeping for loaded extensions

/// Lifecycle state of one extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionState {
    Loaded,
    Failed,
    Unloaded,
}

/// Bookkeeping for one extension the loader has touched.
///
/// Exactly one record exists per distinct extension name; loading an
/// already-loaded extension is a no-op.
#[derive(Debug, Clone)]
pub struct ExtensionRecord {
    pub name: String,
    pub state: ExtensionState,
    pub owned_tables: Vec<String>,
    pub command_names: Vec<String>,
    pub matcher_count: usize,
    pub loop_count: usize,
    pub has_schema: bool,
}

impl ExtensionRecord {
    pub fn is_loaded(&self) -> bool {
        self.state == ExtensionState::Loaded
    }
}

/// Outcome of a load or unload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub ok: bool,
    pub message: String,
}

impl LoadResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Admin-facing status snapshot: what is loaded and what could be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionStatus {
    pub loaded: Vec<String>,
    pub available: Vec<String>,
}
