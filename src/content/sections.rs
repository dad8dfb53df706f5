use std::collections::HashSet;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::debug;

use super::chapters::chapter_outline;
use crate::model::{ChapterEntry, Section, SectionJump};
use crate::titles::TitleNormalizer;

pub fn fetch_sections(connection: &Connection, titles: &TitleNormalizer) -> Result<Vec<Section>> {
    let mut statement = connection
        .prepare(
            "
            SELECT section_title
            FROM brhc_sections
            WHERE section_title IS NOT NULL
            ORDER BY order_index ASC, section_id ASC
            ",
        )
        .context("failed to prepare section list")?;
    let mut rows = statement.query([])?;

    let mut sections = Vec::new();
    while let Some(row) = rows.next()? {
        let raw_title: String = row.get(0)?;
        sections.push(section_from_raw(titles, raw_title));
    }

    debug!(sections = sections.len(), "fetched sections");
    Ok(sections)
}

pub fn section_from_raw(titles: &TitleNormalizer, raw_title: String) -> Section {
    let parsed = titles.parse_section_title(&raw_title);
    Section {
        title: parsed.title,
        raw_title,
        number: parsed.number,
    }
}

#[derive(Debug, Clone)]
struct SectionBoundary {
    raw_title: String,
    key: String,
    first_block_id: i64,
}

/// First block of every section in document order, merged by match key.
fn section_boundaries(
    connection: &Connection,
    titles: &TitleNormalizer,
) -> Result<Vec<SectionBoundary>> {
    let mut statement = connection
        .prepare(
            "
            SELECT section_title, MIN(block_id) AS first_block_id
            FROM doc_blocks
            WHERE section_title IS NOT NULL
            GROUP BY section_title
            ORDER BY first_block_id ASC
            ",
        )
        .context("failed to prepare section boundaries")?;
    let mut rows = statement.query([])?;

    let mut seen = HashSet::new();
    let mut boundaries = Vec::new();
    while let Some(row) = rows.next()? {
        let raw_title: String = row.get(0)?;
        let key = titles.section_match_key(&raw_title);
        if seen.insert(key.clone()) {
            boundaries.push(SectionBoundary {
                raw_title,
                key,
                first_block_id: row.get(1)?,
            });
        }
    }
    Ok(boundaries)
}

/// Sections that own at least one chapter, paired with their first chapter.
fn sections_with_content(
    connection: &Connection,
    titles: &TitleNormalizer,
) -> Result<Vec<(SectionBoundary, ChapterEntry)>> {
    let outline = chapter_outline(connection, titles)?;

    Ok(section_boundaries(connection, titles)?
        .into_iter()
        .filter_map(|boundary| {
            outline
                .iter()
                .find(|chapter| {
                    titles.section_match_key(&chapter.raw_section_title) == boundary.key
                })
                .cloned()
                .map(|chapter| (boundary, chapter))
        })
        .collect())
}

/// Nearest section with chapters that starts after `block_id`.
pub fn fetch_next_section_with_content(
    connection: &Connection,
    titles: &TitleNormalizer,
    block_id: i64,
) -> Result<Option<SectionJump>> {
    Ok(sections_with_content(connection, titles)?
        .into_iter()
        .find(|(boundary, _)| boundary.first_block_id > block_id)
        .map(|(boundary, chapter)| section_jump(titles, boundary, chapter)))
}

/// Nearest section with chapters that starts before the section holding
/// `block_id`.
pub fn fetch_previous_section_with_content(
    connection: &Connection,
    titles: &TitleNormalizer,
    block_id: i64,
) -> Result<Option<SectionJump>> {
    let current_start = section_boundaries(connection, titles)?
        .into_iter()
        .take_while(|boundary| boundary.first_block_id <= block_id)
        .last()
        .map(|boundary| boundary.first_block_id)
        .unwrap_or(block_id);

    Ok(sections_with_content(connection, titles)?
        .into_iter()
        .take_while(|(boundary, _)| boundary.first_block_id < current_start)
        .last()
        .map(|(boundary, chapter)| section_jump(titles, boundary, chapter)))
}

fn section_jump(
    titles: &TitleNormalizer,
    boundary: SectionBoundary,
    first_chapter: ChapterEntry,
) -> SectionJump {
    SectionJump {
        first_block_id: boundary.first_block_id,
        section: section_from_raw(titles, boundary.raw_title),
        first_chapter,
    }
}
