use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::error::StoreInitError;
use crate::util::{ensure_directory, file_len};

/// Copies a packaged database to `target` when nothing is there yet.
///
/// Returns `true` when a copy happened. An existing target is left alone,
/// whatever its contents.
pub fn install_from_seed(seed: &Path, target: &Path) -> Result<bool> {
    if file_len(target)?.is_some() {
        return Ok(false);
    }

    match file_len(seed)? {
        Some(0) => return Err(StoreInitError::SeedEmpty(seed.to_path_buf()).into()),
        Some(_) => {}
        None => anyhow::bail!("seed database missing: {}", seed.display()),
    }

    if let Some(parent) = target.parent() {
        ensure_directory(parent)?;
    }

    let copied = fs::copy(seed, target).with_context(|| {
        format!(
            "failed to copy seed {} to {}",
            seed.display(),
            target.display()
        )
    })?;
    info!(
        seed = %seed.display(),
        target = %target.display(),
        bytes = copied,
        "installed database from seed"
    );

    Ok(true)
}
