use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TASKS_FILE: &str = "tasks.json";
pub const CONTEXT_FILE: &str = "context.json";
pub const LOCK_FILE: &str = ".taskpilot.lock";
pub const CONFIG_FILE: &str = ".taskpilot.toml";
pub const DEFAULT_BRIEF_FILE: &str = "assistant-context.md";
pub const DEFAULT_PRIORITY: u8 = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse {CONFIG_FILE}: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Optional per-project overrides, read from `.taskpilot.toml` at the root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project: Option<String>,
    /// File name for the generated assistant brief, relative to the root.
    pub brief_file: Option<String>,
    /// Priority assigned to tasks created without an explicit one (1..=3).
    pub default_priority: Option<u8>,
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn load_config(root: &Path) -> Result<Option<ProjectConfig>, ConfigError> {
    let path = config_path(root);
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(&path)?;
    let config = toml::from_str::<ProjectConfig>(&text)?;
    Ok(Some(config))
}

/// Every file path the tool touches, derived once from a root directory and
/// injected into the store. Nothing else resolves paths or reads environment
/// variables.
#[derive(Debug, Clone)]
pub struct StoreLocation {
    root: PathBuf,
    tasks_path: PathBuf,
    context_path: PathBuf,
    brief_path: PathBuf,
    lock_path: PathBuf,
}

impl StoreLocation {
    pub fn new(root: &Path) -> Self {
        Self::with_brief_file(root, DEFAULT_BRIEF_FILE)
    }

    pub fn with_brief_file(root: &Path, brief_file: &str) -> Self {
        StoreLocation {
            root: root.to_path_buf(),
            tasks_path: root.join(TASKS_FILE),
            context_path: root.join(CONTEXT_FILE),
            brief_path: root.join(brief_file),
            lock_path: root.join(LOCK_FILE),
        }
    }

    /// Apply `.taskpilot.toml` overrides, if the file exists.
    pub fn resolve(root: &Path) -> Result<(Self, Option<ProjectConfig>), ConfigError> {
        let config = load_config(root)?;
        let brief = config
            .as_ref()
            .and_then(|c| c.brief_file.as_deref())
            .unwrap_or(DEFAULT_BRIEF_FILE);
        Ok((Self::with_brief_file(root, brief), config))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tasks_path(&self) -> &Path {
        &self.tasks_path
    }

    pub fn context_path(&self) -> &Path {
        &self.context_path
    }

    pub fn brief_path(&self) -> &Path {
        &self.brief_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}
