//! Expands a caller-held title into every raw variant stored for it.
//!
//! Each content row repeats its parent's title verbatim, so the string a
//! caller holds may differ from the stored one in tag or numbering. Both
//! resolvers always return at least one candidate: with no match the input
//! is used literally.

use anyhow::{Context, Result};
use rusqlite::{Connection, params, params_from_iter};
use tracing::debug;

use super::{in_list, text_values};
use crate::titles::TitleNormalizer;

pub fn resolve_section_titles(
    connection: &Connection,
    titles: &TitleNormalizer,
    input: &str,
) -> Result<Vec<String>> {
    let mut statement = connection
        .prepare(
            "
            SELECT DISTINCT section_title FROM doc_blocks WHERE section_title IS NOT NULL
            UNION
            SELECT DISTINCT section_title FROM brhc_sections WHERE section_title IS NOT NULL
            ",
        )
        .context("failed to prepare section title scan")?;
    let candidates = collect_titles(&mut statement, params![])?;

    let wanted = titles.section_match_key(input);
    let matches: Vec<String> = candidates
        .into_iter()
        .filter(|candidate| titles.section_match_key(candidate) == wanted)
        .collect();

    Ok(or_literal(matches, input, "section"))
}

pub fn resolve_chapter_titles(
    connection: &Connection,
    titles: &TitleNormalizer,
    section_titles: &[String],
    input: &str,
) -> Result<Vec<String>> {
    if section_titles.is_empty() {
        return Ok(vec![input.to_string()]);
    }

    let sql = format!(
        "
        SELECT DISTINCT chapter_title
        FROM doc_blocks
        WHERE chapter_title IS NOT NULL
          AND section_title IN ({})
        ",
        in_list(section_titles.len())
    );
    let mut statement = connection
        .prepare(&sql)
        .context("failed to prepare chapter title scan")?;
    let candidates = collect_titles(&mut statement, params_from_iter(text_values(section_titles)))?;

    let wanted = titles.chapter_match_key(input);
    let matches: Vec<String> = candidates
        .into_iter()
        .filter(|candidate| titles.chapter_match_key(candidate) == wanted)
        .collect();

    Ok(or_literal(matches, input, "chapter"))
}

fn collect_titles<P: rusqlite::Params>(
    statement: &mut rusqlite::Statement<'_>,
    params: P,
) -> Result<Vec<String>> {
    let mut rows = statement.query(params)?;
    let mut values = Vec::new();
    while let Some(row) = rows.next()? {
        values.push(row.get::<_, String>(0)?);
    }
    values.sort();
    Ok(values)
}

fn or_literal(matches: Vec<String>, input: &str, kind: &'static str) -> Vec<String> {
    if matches.is_empty() {
        debug!(kind, input = %input, "no stored title matched; using input literally");
        return vec![input.to_string()];
    }
    debug!(kind, input = %input, variants = matches.len(), "resolved title variants");
    matches
}
