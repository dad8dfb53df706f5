use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CANONICAL_FILENAME: &str = "brhc.db";
pub const DEFAULT_USER_FILENAME: &str = "brhc_user.db";

/// Where the two stores live. Paths are resolved by whoever installed the
/// databases on the device; this crate only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    pub canonical_path: PathBuf,
    pub user_path: PathBuf,
    #[serde(default)]
    pub user_seed_path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn new(canonical_path: impl Into<PathBuf>, user_path: impl Into<PathBuf>) -> Self {
        Self {
            canonical_path: canonical_path.into(),
            user_path: user_path.into(),
            user_seed_path: None,
        }
    }

    /// Both stores under `directory` with their default file names.
    pub fn in_directory(directory: &Path) -> Self {
        Self::new(
            directory.join(DEFAULT_CANONICAL_FILENAME),
            directory.join(DEFAULT_USER_FILENAME),
        )
    }

    pub fn with_user_seed(mut self, seed_path: impl Into<PathBuf>) -> Self {
        self.user_seed_path = Some(seed_path.into());
        self
    }

    /// Loads a JSON config; relative paths are resolved against the file's
    /// own directory.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: StoreConfig = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.canonical_path = resolve_relative(base, &config.canonical_path);
            config.user_path = resolve_relative(base, &config.user_path);
            config.user_seed_path = config
                .user_seed_path
                .as_deref()
                .map(|seed| resolve_relative(base, seed));
        }

        Ok(config)
    }
}

fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
