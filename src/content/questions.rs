use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tracing::debug;

use super::resolver::{resolve_chapter_titles, resolve_section_titles};
use super::{audit_mark_join, in_list, text_values};
use crate::model::QuestionAnchor;
use crate::store::StoreScope;
use crate::titles::TitleNormalizer;

/// Question anchors of one chapter, ordered by question number.
pub fn fetch_question_index(
    connection: &Connection,
    titles: &TitleNormalizer,
    scope: StoreScope,
    section_title: &str,
    chapter_title: &str,
) -> Result<Vec<QuestionAnchor>> {
    let section_titles = resolve_section_titles(connection, titles, section_title)?;
    let chapter_titles =
        resolve_chapter_titles(connection, titles, &section_titles, chapter_title)?;

    let filter = format!(
        "WHERE q.section_title IN ({}) AND q.chapter_title IN ({})",
        in_list(section_titles.len()),
        in_list(chapter_titles.len())
    );
    let values: Vec<Value> = text_values(&section_titles)
        .chain(text_values(&chapter_titles))
        .collect();

    let anchors = query_anchors(
        connection,
        scope,
        &filter,
        "ORDER BY q.question_number ASC, q.block_id ASC",
        values,
    )?;
    debug!(
        section = %section_title,
        chapter = %chapter_title,
        questions = anchors.len(),
        "fetched question index"
    );
    Ok(anchors)
}

/// Every question anchor of the work in document order.
pub fn fetch_all_question_anchors(
    connection: &Connection,
    scope: StoreScope,
) -> Result<Vec<QuestionAnchor>> {
    let anchors = query_anchors(connection, scope, "", "ORDER BY q.block_id ASC", Vec::new())?;
    debug!(questions = anchors.len(), "fetched all question anchors");
    Ok(anchors)
}

fn query_anchors(
    connection: &Connection,
    scope: StoreScope,
    filter: &str,
    order: &str,
    values: Vec<Value>,
) -> Result<Vec<QuestionAnchor>> {
    let (checked_column, mark_join) = audit_mark_join(scope, "q.block_id");
    let sql = format!(
        "
        SELECT
          q.block_id,
          q.question_number,
          q.question_text,
          q.section_title,
          q.chapter_title,
          {checked_column}
        FROM d_questions q
        {mark_join}
        {filter}
        {order}
        "
    );

    let mut statement = connection
        .prepare(&sql)
        .context("failed to prepare question anchor query")?;
    let mut rows = statement.query(params_from_iter(values))?;

    let mut anchors = Vec::new();
    while let Some(row) = rows.next()? {
        anchors.push(QuestionAnchor {
            block_id: row.get(0)?,
            question_number: row.get::<_, Option<i64>>(1)?.unwrap_or_default(),
            question_text: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            section_title: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            chapter_title: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            checked: row.get::<_, i64>(5)? != 0,
        });
    }
    Ok(anchors)
}
