use std::collections::HashSet;

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use tracing::{debug, warn};

use super::resolver::{resolve_chapter_titles, resolve_section_titles};
use super::{in_list, text_values};
use crate::model::ChapterEntry;
use crate::titles::TitleNormalizer;

/// Chapters of one section in document order.
///
/// Raw chapter variants that share a match key collapse into one entry that
/// keeps the earliest block id.
pub fn fetch_chapters(
    connection: &Connection,
    titles: &TitleNormalizer,
    section_title: &str,
) -> Result<Vec<ChapterEntry>> {
    let section_titles = resolve_section_titles(connection, titles, section_title)?;

    let sql = format!(
        "
        SELECT section_title, chapter_title, MIN(block_id) AS first_block_id
        FROM doc_blocks
        WHERE chapter_title IS NOT NULL
          AND section_title IN ({})
        GROUP BY section_title, chapter_title
        ORDER BY first_block_id ASC
        ",
        in_list(section_titles.len())
    );
    let rows = query_title_pairs(connection, &sql, text_values(&section_titles).collect())?;

    let mut seen = HashSet::new();
    let chapters: Vec<ChapterEntry> = rows
        .into_iter()
        .filter(|(_, raw_chapter, _)| seen.insert(titles.chapter_match_key(raw_chapter)))
        .map(|(raw_section, raw_chapter, first_block_id)| {
            chapter_entry(titles, raw_section, raw_chapter, first_block_id)
        })
        .collect();

    if chapters.is_empty() {
        warn!(section = %section_title, "section has no chapters");
    } else {
        debug!(section = %section_title, chapters = chapters.len(), "fetched chapters");
    }

    Ok(chapters)
}

/// Every chapter of the document in block order, one entry per
/// (section key, chapter key).
pub fn chapter_outline(
    connection: &Connection,
    titles: &TitleNormalizer,
) -> Result<Vec<ChapterEntry>> {
    let rows = query_title_pairs(
        connection,
        "
        SELECT section_title, chapter_title, MIN(block_id) AS first_block_id
        FROM doc_blocks
        WHERE section_title IS NOT NULL
          AND chapter_title IS NOT NULL
        GROUP BY section_title, chapter_title
        ORDER BY first_block_id ASC
        ",
        Vec::new(),
    )?;

    let mut seen = HashSet::new();
    Ok(rows
        .into_iter()
        .filter(|(raw_section, raw_chapter, _)| {
            seen.insert((
                titles.section_match_key(raw_section),
                titles.chapter_match_key(raw_chapter),
            ))
        })
        .map(|(raw_section, raw_chapter, first_block_id)| {
            chapter_entry(titles, raw_section, raw_chapter, first_block_id)
        })
        .collect())
}

/// Lowest block id at or after the section's first block that belongs to
/// the resolved chapter.
pub fn chapter_first_block(
    connection: &Connection,
    section_titles: &[String],
    chapter_titles: &[String],
) -> Result<Option<i64>> {
    let Some(fence) = section_fence(connection, section_titles)? else {
        return Ok(None);
    };

    let sql = format!(
        "
        SELECT MIN(block_id)
        FROM doc_blocks
        WHERE section_title IN ({})
          AND chapter_title IN ({})
          AND block_id >= ?
        ",
        in_list(section_titles.len()),
        in_list(chapter_titles.len())
    );
    let values: Vec<Value> = text_values(section_titles)
        .chain(text_values(chapter_titles))
        .chain(std::iter::once(Value::Integer(fence)))
        .collect();

    connection
        .query_row(&sql, params_from_iter(values), |row| row.get::<_, Option<i64>>(0))
        .context("failed to locate chapter start")
}

/// First block id of the resolved section. Blocks of a chapter are only
/// read at or after it, so an earlier chapter of the same name elsewhere in
/// the book cannot leak in.
pub fn section_fence(connection: &Connection, section_titles: &[String]) -> Result<Option<i64>> {
    let sql = format!(
        "SELECT MIN(block_id) FROM doc_blocks WHERE section_title IN ({})",
        in_list(section_titles.len())
    );
    let fence = connection
        .query_row(&sql, params_from_iter(text_values(section_titles)), |row| {
            row.get::<_, Option<i64>>(0)
        })
        .optional()
        .context("failed to locate section start")?;
    Ok(fence.flatten())
}

pub fn fetch_previous_chapter(
    connection: &Connection,
    titles: &TitleNormalizer,
    section_title: &str,
    chapter_title: &str,
) -> Result<Option<ChapterEntry>> {
    let Some(current) = current_chapter_start(connection, titles, section_title, chapter_title)?
    else {
        return Ok(None);
    };

    Ok(chapter_outline(connection, titles)?
        .into_iter()
        .take_while(|entry| entry.first_block_id < current)
        .last())
}

pub fn fetch_next_chapter(
    connection: &Connection,
    titles: &TitleNormalizer,
    section_title: &str,
    chapter_title: &str,
) -> Result<Option<ChapterEntry>> {
    let Some(current) = current_chapter_start(connection, titles, section_title, chapter_title)?
    else {
        return Ok(None);
    };

    Ok(chapter_outline(connection, titles)?
        .into_iter()
        .find(|entry| entry.first_block_id > current))
}

fn current_chapter_start(
    connection: &Connection,
    titles: &TitleNormalizer,
    section_title: &str,
    chapter_title: &str,
) -> Result<Option<i64>> {
    let section_titles = resolve_section_titles(connection, titles, section_title)?;
    let chapter_titles =
        resolve_chapter_titles(connection, titles, &section_titles, chapter_title)?;
    let current = chapter_first_block(connection, &section_titles, &chapter_titles)?;

    if current.is_none() {
        debug!(
            section = %section_title,
            chapter = %chapter_title,
            "chapter has no blocks; no neighbours"
        );
    }
    Ok(current)
}

pub(crate) fn chapter_entry(
    titles: &TitleNormalizer,
    raw_section_title: String,
    raw_chapter_title: String,
    first_block_id: i64,
) -> ChapterEntry {
    let section = titles.parse_section_title(&raw_section_title);
    let chapter = titles.parse_chapter_title(&raw_chapter_title);
    ChapterEntry {
        section_title: section.title,
        chapter_title: chapter.title,
        raw_section_title,
        raw_chapter_title,
        chapter_number: chapter.number,
        first_block_id,
    }
}

fn query_title_pairs(
    connection: &Connection,
    sql: &str,
    values: Vec<Value>,
) -> Result<Vec<(String, String, i64)>> {
    let mut statement = connection
        .prepare(sql)
        .context("failed to prepare chapter projection")?;
    let mut rows = statement.query(params_from_iter(values))?;

    let mut pairs = Vec::new();
    while let Some(row) = rows.next()? {
        pairs.push((row.get(0)?, row.get(1)?, row.get(2)?));
    }
    Ok(pairs)
}
