//! Snapshot resolution.
//!
//! Decides once, at startup, whether the simulation resumes from a saved machine state or
//! boots from reset. Only existence is checked: a snapshot is a directory at the configured
//! path. Writing snapshots is the engine's business.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::config::Config;

/// A snapshot location and whether it was present at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckpointRef {
    /// Snapshot directory.
    pub path: PathBuf,
    /// Whether the directory existed when resolved.
    pub exists: bool,
}

/// How the engine should construct the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StartMode {
    /// Boot from reset on the starting core model.
    Fresh,
    /// Restore the snapshot at the given path.
    Resume(PathBuf),
}

impl StartMode {
    /// Returns `true` when the boot phase is skipped.
    pub const fn is_resume(&self) -> bool {
        matches!(self, Self::Resume(_))
    }
}

/// Resolves snapshot references.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckpointManager;

impl CheckpointManager {
    /// Checks whether a snapshot directory exists at `path`.
    pub fn resolve(path: impl AsRef<Path>) -> CheckpointRef {
        let path = path.as_ref().to_path_buf();
        let exists = path.is_dir();
        info!(path = %path.display(), exists, "resolved checkpoint");
        CheckpointRef { path, exists }
    }

    /// Resolves the configured snapshot directory relative to the working directory.
    pub fn resolve_config(config: &Config) -> CheckpointRef {
        Self::resolve(config.resolve_path(&config.checkpoint.dir))
    }

    /// Maps a resolved reference to the engine start mode.
    pub fn start_mode(checkpoint: &CheckpointRef) -> StartMode {
        if checkpoint.exists {
            StartMode::Resume(checkpoint.path.clone())
        } else {
            StartMode::Fresh
        }
    }
}
