use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tracing::{debug, warn};

use super::chapters::section_fence;
use super::images::load_block_images;
use super::resolver::{resolve_chapter_titles, resolve_section_titles};
use super::{audit_mark_join, in_list, text_values};
use crate::model::{BlockType, DocBlock, TablePayload};
use crate::store::StoreScope;
use crate::titles::TitleNormalizer;

/// Content of one chapter in block order, images and marks attached.
pub fn fetch_chapter_blocks(
    connection: &Connection,
    titles: &TitleNormalizer,
    scope: StoreScope,
    section_title: &str,
    chapter_title: &str,
) -> Result<Vec<DocBlock>> {
    let section_titles = resolve_section_titles(connection, titles, section_title)?;
    let chapter_titles =
        resolve_chapter_titles(connection, titles, &section_titles, chapter_title)?;

    let Some(fence) = section_fence(connection, &section_titles)? else {
        warn!(section = %section_title, "section has no blocks");
        return Ok(Vec::new());
    };

    let (checked_column, mark_join) = audit_mark_join(scope, "b.block_id");
    let sql = format!(
        "
        SELECT
          b.block_id,
          b.block_type,
          b.raw_text,
          b.normalized_text,
          b.table_json,
          CASE WHEN b.block_type = 'question' THEN {checked_column} ELSE 0 END
        FROM doc_blocks b
        {mark_join}
        WHERE b.section_title IN ({})
          AND b.chapter_title IN ({})
          AND b.block_id >= ?
        ORDER BY b.block_id ASC
        ",
        in_list(section_titles.len()),
        in_list(chapter_titles.len())
    );
    let values: Vec<Value> = text_values(&section_titles)
        .chain(text_values(&chapter_titles))
        .chain(std::iter::once(Value::Integer(fence)))
        .collect();

    let mut statement = connection
        .prepare(&sql)
        .context("failed to prepare chapter block query")?;
    let mut rows = statement.query(params_from_iter(values))?;

    let mut blocks = Vec::new();
    while let Some(row) = rows.next()? {
        let raw_text: String = row.get::<_, Option<String>>(2)?.unwrap_or_default();
        let normalized_text = row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| raw_text.clone());
        let table_json: Option<String> = row.get(4)?;
        let table = table_json
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(TablePayload::parse);

        blocks.push(DocBlock {
            block_id: row.get(0)?,
            block_type: BlockType::from_label(
                row.get::<_, Option<String>>(1)?.as_deref().unwrap_or("text"),
            ),
            raw_text,
            normalized_text,
            table_json,
            table,
            images: Vec::new(),
            checked: row.get::<_, i64>(5)? != 0,
        });
    }

    let block_ids: Vec<i64> = blocks.iter().map(|block| block.block_id).collect();
    let mut images = load_block_images(connection, scope.canonical, &block_ids)?;
    for block in &mut blocks {
        if let Some(block_images) = images.remove(&block.block_id) {
            block.images = block_images;
        }
    }

    if blocks.is_empty() {
        warn!(section = %section_title, chapter = %chapter_title, "chapter has no blocks");
    } else {
        debug!(
            section = %section_title,
            chapter = %chapter_title,
            blocks = blocks.len(),
            "fetched chapter blocks"
        );
    }

    Ok(blocks)
}
