//! Canonical on-disk layout for a project's forge state.

use std::path::{Path, PathBuf};

use crate::core::stage::StageName;

/// State directory name used when none is given.
pub const DEFAULT_STATE_DIR: &str = ".forge";

/// All canonical paths under the state directory for one project root.
///
/// Every component receives one of these instead of computing paths itself,
/// so tests can point the whole system at a scratch directory.
#[derive(Debug, Clone)]
pub struct ForgePaths {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub execute_dir: PathBuf,
    pub inbox_dir: PathBuf,
    pub sentinel_path: PathBuf,
    pub log_path: PathBuf,
    pub config_path: PathBuf,
}

impl ForgePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_state_dir(root, DEFAULT_STATE_DIR)
    }

    pub fn with_state_dir(root: impl Into<PathBuf>, state_dir_name: &str) -> Self {
        let root = root.into();
        let state_dir = root.join(state_dir_name);
        let execute_dir = state_dir.join("05-execute");
        let inbox_dir = execute_dir.join("inbox");
        Self {
            root,
            state_dir: state_dir.clone(),
            execute_dir,
            sentinel_path: inbox_dir.join(".active"),
            inbox_dir,
            log_path: state_dir.join("log.jsonl"),
            config_path: state_dir.join("config.toml"),
        }
    }

    pub fn artifact_path(&self, stage: StageName) -> PathBuf {
        self.state_dir.join(stage.artifact_rel_path())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_stable() {
        let paths = ForgePaths::new("/tmp/project");
        assert!(paths.inbox_dir.ends_with(".forge/05-execute/inbox"));
        assert!(paths.sentinel_path.ends_with(".forge/05-execute/inbox/.active"));
        assert!(paths.log_path.ends_with(".forge/log.jsonl"));
        assert!(
            paths
                .artifact_path(StageName::Split)
                .ends_with(".forge/04-tracks/manifest.json")
        );
    }

    #[test]
    fn state_dir_is_injectable() {
        let paths = ForgePaths::with_state_dir("/tmp/project", ".proteus");
        assert!(paths.inbox_dir.ends_with(".proteus/05-execute/inbox"));
    }
}
