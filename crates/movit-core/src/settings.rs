//! Process-wide settings passed to `init_movit`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugLevel {
    #[default]
    Off,
    /// Write a `.dot` file for every finalize step.
    Debug,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MovitSettings {
    /// Directory searched for shader overrides. Built-in shaders are used for
    /// any name not found there.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub debug_level: DebugLevel,
}

/// Identifier of a GL context, used to key non-shareable objects (FBOs, VAOs).
///
/// The host chooses the values; any scheme works as long as two live contexts
/// never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(pub u64);
