use std::path::PathBuf;

use thiserror::Error;

/// Conditions that stop the stores from opening at all.
///
/// These surface wrapped in `anyhow::Error`; callers that need to tell a
/// broken install apart from a failed query can `downcast_ref` to this type.
#[derive(Debug, Error)]
pub enum StoreInitError {
    #[error("canonical store is missing: {}", .0.display())]
    CanonicalMissing(PathBuf),

    #[error("canonical store is empty: {}", .0.display())]
    CanonicalEmpty(PathBuf),

    #[error("user store is empty: {}", .0.display())]
    UserEmpty(PathBuf),

    #[error("user store seed is empty: {}", .0.display())]
    SeedEmpty(PathBuf),
}
