//! Lifecycle of the canonical (read-only) and user (read-write) stores.
//!
//! Each store is opened at most once; concurrent first callers wait on the
//! same open. Content queries run on the canonical connection with the user
//! store attached, so marks can be left-joined into content rows.

pub mod bootstrap;
pub(crate) mod schema;

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OpenFlags};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::error::StoreInitError;
use crate::util::{ensure_directory, file_len};

pub use schema::CanonicalCapabilities;
use schema::{attach_user_store, configure_connection, prepare_audit_marks, probe_canonical};

pub(crate) type SharedConnection = Arc<Mutex<Connection>>;

#[derive(Debug, Clone)]
pub(crate) struct CanonicalHandle {
    pub(crate) connection: SharedConnection,
    pub(crate) capabilities: CanonicalCapabilities,
}

#[derive(Debug, Clone)]
pub(crate) struct UserHandle {
    pub(crate) connection: SharedConnection,
    pub(crate) audit_marks_available: bool,
}

/// What a content query may rely on once both stores are linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreScope {
    pub audit_marks: bool,
    pub canonical: CanonicalCapabilities,
}

#[derive(Debug, Clone)]
pub(crate) struct LinkedStores {
    pub(crate) connection: SharedConnection,
    pub(crate) scope: StoreScope,
}

#[derive(Debug)]
pub struct Database {
    config: StoreConfig,
    canonical: OnceCell<CanonicalHandle>,
    user: OnceCell<UserHandle>,
    link: OnceCell<()>,
}

impl Database {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            canonical: OnceCell::new(),
            user: OnceCell::new(),
            link: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) async fn canonical(&self) -> Result<&CanonicalHandle> {
        self.canonical
            .get_or_try_init(|| async {
                let path = self.config.canonical_path.clone();
                tokio::task::spawn_blocking(move || open_canonical(&path))
                    .await
                    .context("canonical store open task failed")?
            })
            .await
    }

    pub(crate) async fn user(&self) -> Result<&UserHandle> {
        self.user
            .get_or_try_init(|| async {
                let config = self.config.clone();
                tokio::task::spawn_blocking(move || open_user(&config))
                    .await
                    .context("user store open task failed")?
            })
            .await
    }

    /// Opens both stores and attaches the user store to the canonical
    /// connection. The attach runs once; later calls return the linked
    /// handles directly.
    pub(crate) async fn linked(&self) -> Result<LinkedStores> {
        let user = self.user().await?;
        let canonical = self.canonical().await?;

        self.link
            .get_or_try_init(|| async {
                let user_path = self.config.user_path.to_string_lossy().into_owned();
                run_blocking(Arc::clone(&canonical.connection), move |connection| {
                    attach_user_store(connection, &user_path).map(|_| ())
                })
                .await
            })
            .await?;

        Ok(LinkedStores {
            connection: Arc::clone(&canonical.connection),
            scope: StoreScope {
                audit_marks: user.audit_marks_available,
                canonical: canonical.capabilities,
            },
        })
    }

    pub async fn scope(&self) -> Result<StoreScope> {
        Ok(self.linked().await?.scope)
    }

    pub async fn audit_marks_available(&self) -> Result<bool> {
        Ok(self.user().await?.audit_marks_available)
    }
}

/// Runs `job` against `connection` on the blocking pool.
pub(crate) async fn run_blocking<T, F>(connection: SharedConnection, job: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let guard = connection
            .lock()
            .map_err(|_| anyhow!("store connection lock poisoned"))?;
        job(&guard)
    })
    .await
    .context("store task failed")?
}

fn open_canonical(path: &Path) -> Result<CanonicalHandle> {
    match file_len(path)? {
        None => return Err(StoreInitError::CanonicalMissing(path.to_path_buf()).into()),
        Some(0) => return Err(StoreInitError::CanonicalEmpty(path.to_path_buf()).into()),
        Some(_) => {}
    }

    let connection = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open canonical store read-only: {}", path.display()))?;
    configure_connection(&connection)?;
    let capabilities = probe_canonical(&connection)?;

    info!(
        path = %path.display(),
        image_table = capabilities.image_table,
        image_map = capabilities.image_map,
        legacy_image_column = capabilities.legacy_image_column,
        "opened canonical store"
    );

    Ok(CanonicalHandle {
        connection: Arc::new(Mutex::new(connection)),
        capabilities,
    })
}

fn open_user(config: &StoreConfig) -> Result<UserHandle> {
    let path = config.user_path.as_path();

    match file_len(path)? {
        Some(0) => return Err(StoreInitError::UserEmpty(path.to_path_buf()).into()),
        Some(_) => {}
        None => match config.user_seed_path.as_deref() {
            Some(seed) if file_len(seed)?.is_some() => {
                bootstrap::install_from_seed(seed, path)?;
            }
            seed => {
                if let Some(seed) = seed {
                    warn!(seed = %seed.display(), "user store seed missing; creating empty store");
                }
                if let Some(parent) = path.parent() {
                    ensure_directory(parent)?;
                }
                info!(path = %path.display(), "creating user store");
            }
        },
    }

    let connection = Connection::open(path)
        .with_context(|| format!("failed to open user store: {}", path.display()))?;
    configure_connection(&connection)?;
    let audit_marks_available = prepare_audit_marks(&connection)?;

    info!(
        path = %path.display(),
        audit_marks_available,
        "opened user store"
    );

    Ok(UserHandle {
        connection: Arc::new(Mutex::new(connection)),
        audit_marks_available,
    })
}
