use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};

pub(crate) const USER_SCHEMA: &str = "user_store";

const AUDIT_MARK_COLUMNS: [&str; 3] = ["question_id", "checked", "updated_at"];

/// Optional parts of the canonical schema, probed once at open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanonicalCapabilities {
    pub image_table: bool,
    pub image_map: bool,
    pub legacy_image_column: bool,
}

pub(crate) fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .busy_timeout(std::time::Duration::from_secs(30))
        .context("failed to set busy_timeout")?;
    Ok(())
}

pub(crate) fn probe_canonical(connection: &Connection) -> Result<CanonicalCapabilities> {
    let image_table = table_exists(connection, "main", "brhc_images")?;
    let image_map = table_exists(connection, "main", "brhc_image_block_map")?;
    let legacy_image_column = column_exists(connection, "main", "doc_blocks", "image_blob_id")?;

    if !image_table {
        warn!("brhc_images table missing; blocks will load without images");
    } else if !image_map {
        warn!("brhc_image_block_map table missing; only legacy image references will load");
    }

    Ok(CanonicalCapabilities {
        image_table,
        image_map,
        legacy_image_column,
    })
}

/// Creates `audit_marks` when the store has none, then reports whether the
/// table has the shape the mark store writes to. A table left behind by an
/// older build is not migrated.
pub(crate) fn prepare_audit_marks(connection: &Connection) -> Result<bool> {
    if !table_exists(connection, "main", "audit_marks")? {
        connection
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS audit_marks (
                  question_id INTEGER PRIMARY KEY,
                  checked INTEGER NOT NULL DEFAULT 0,
                  updated_at TEXT
                );
                ",
            )
            .context("failed to create audit_marks table")?;
        info!("created audit_marks table");
        return Ok(true);
    }

    let mut missing = Vec::new();
    for column in AUDIT_MARK_COLUMNS {
        if !column_exists(connection, "main", "audit_marks", column)? {
            missing.push(column);
        }
    }

    if missing.is_empty() {
        return Ok(true);
    }

    warn!(
        missing_columns = %missing.join(","),
        "audit_marks table is incompatible; audit marks disabled"
    );
    Ok(false)
}

/// Attaches the user store under [`USER_SCHEMA`] unless it already is.
/// Returns whether an ATTACH was issued.
pub(crate) fn attach_user_store(connection: &Connection, user_path: &str) -> Result<bool> {
    if attached_schemas(connection)?
        .iter()
        .any(|name| name == USER_SCHEMA)
    {
        return Ok(false);
    }

    connection
        .execute(&format!("ATTACH DATABASE ?1 AS {USER_SCHEMA}"), [user_path])
        .with_context(|| format!("failed to attach user store {user_path}"))?;
    info!(path = %user_path, schema = USER_SCHEMA, "attached user store");
    Ok(true)
}

pub(crate) fn attached_schemas(connection: &Connection) -> Result<Vec<String>> {
    let mut statement = connection
        .prepare("PRAGMA database_list")
        .context("failed to list attached databases")?;
    let mut rows = statement.query([])?;
    let mut names = Vec::new();
    while let Some(row) = rows.next()? {
        names.push(row.get::<_, String>(1)?);
    }
    Ok(names)
}

pub(crate) fn table_exists(
    connection: &Connection,
    schema: &str,
    table_name: &str,
) -> Result<bool> {
    let sql = format!(
        "SELECT COUNT(*) FROM {schema}.sqlite_master WHERE type = 'table' AND name = ?1"
    );
    let count: i64 = connection
        .query_row(&sql, [table_name], |row| row.get(0))
        .with_context(|| format!("failed to look up table {schema}.{table_name}"))?;
    Ok(count > 0)
}

pub(crate) fn column_exists(
    connection: &Connection,
    schema: &str,
    table_name: &str,
    column_name: &str,
) -> Result<bool> {
    let pragma_sql = format!("PRAGMA {schema}.table_info({table_name})");
    let mut statement = connection
        .prepare(&pragma_sql)
        .with_context(|| format!("failed to inspect schema for table {table_name}"))?;

    let mut rows = statement.query([])?;
    while let Some(row) = rows.next()? {
        let existing_name: String = row.get(1)?;
        if existing_name == column_name {
            return Ok(true);
        }
    }

    Ok(false)
}
