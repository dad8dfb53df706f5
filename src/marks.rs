//! Per-question audit marks in the user store.
//!
//! Marks are keyed by the block id of the question anchor. Rows are never
//! deleted: clearing a mark sets `checked = 0`.

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use crate::model::{AuditMark, MarkWrite};
use crate::util::{now_utc_string, parse_stored_timestamp};

pub fn validate_question_id(question_id: i64) -> Result<()> {
    if question_id <= 0 {
        bail!("invalid question id {question_id}: must be positive");
    }
    Ok(())
}

pub(crate) fn write_audit_mark(
    connection: &Connection,
    question_id: i64,
    checked: bool,
) -> Result<MarkWrite> {
    validate_question_id(question_id)?;
    let updated_at = now_utc_string();

    if checked {
        connection
            .execute(
                "
                INSERT INTO audit_marks(question_id, checked, updated_at)
                VALUES(?1, 1, ?2)
                ON CONFLICT(question_id) DO UPDATE SET
                  checked=1,
                  updated_at=excluded.updated_at
                ",
                params![question_id, updated_at],
            )
            .with_context(|| format!("failed to set audit mark for question {question_id}"))?;
        debug!(question_id, "audit mark set");
        return Ok(MarkWrite::Applied);
    }

    let changed = connection
        .execute(
            "UPDATE audit_marks SET checked=0, updated_at=?2 WHERE question_id=?1",
            params![question_id, updated_at],
        )
        .with_context(|| format!("failed to clear audit mark for question {question_id}"))?;

    if changed == 0 {
        debug!(question_id, "no audit mark to clear");
        return Ok(MarkWrite::NothingToClear);
    }
    debug!(question_id, "audit mark cleared");
    Ok(MarkWrite::Applied)
}

pub(crate) fn read_audit_mark(
    connection: &Connection,
    question_id: i64,
) -> Result<Option<AuditMark>> {
    connection
        .query_row(
            "SELECT question_id, checked, updated_at FROM audit_marks WHERE question_id = ?1",
            [question_id],
            audit_mark_from_row,
        )
        .optional()
        .with_context(|| format!("failed to read audit mark for question {question_id}"))
}

pub(crate) fn read_audit_marks(connection: &Connection) -> Result<Vec<AuditMark>> {
    let mut statement = connection
        .prepare(
            "
            SELECT question_id, checked, updated_at
            FROM audit_marks
            ORDER BY question_id ASC
            ",
        )
        .context("failed to prepare audit mark list")?;
    let mut rows = statement.query([])?;

    let mut marks = Vec::new();
    while let Some(row) = rows.next()? {
        marks.push(audit_mark_from_row(row)?);
    }
    Ok(marks)
}

fn audit_mark_from_row(row: &Row<'_>) -> rusqlite::Result<AuditMark> {
    Ok(AuditMark {
        question_id: row.get(0)?,
        checked: row.get::<_, Option<i64>>(1)?.unwrap_or(0) != 0,
        updated_at: parse_stored_timestamp(row.get_ref(2)?),
    })
}
