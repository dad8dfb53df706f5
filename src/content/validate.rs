//! Read-only integrity checks over the canonical store.
//!
//! Nothing here repairs data; a failed check becomes an [`IntegrityIssue`]
//! in the report and the store is left as found.

use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::titles::TitleNormalizer;

/// Block types that legitimately sit outside any chapter.
const UNCHAPTERED_BLOCK_TYPES: [&str; 3] = ["intro_heading", "intro_paragraph", "section"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// Content block with no chapter title.
    OrphanBlock {
        block_id: i64,
        block_type: String,
        section_title: Option<String>,
    },
    /// Question numbers of one chapter are not `1..=n`. A missing number
    /// is reported as 0.
    QuestionNumbering {
        section_title: String,
        chapter_title: String,
        numbers: Vec<i64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterQuestionCount {
    pub section_title: String,
    pub chapter_title: String,
    pub questions: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockTypeCount {
    pub block_type: String,
    pub blocks: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub issues: Vec<IntegrityIssue>,
    pub questions_per_chapter: Vec<ChapterQuestionCount>,
    pub blocks_per_type: Vec<BlockTypeCount>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn total_questions(&self) -> i64 {
        self.questions_per_chapter
            .iter()
            .map(|count| count.questions)
            .sum()
    }

    pub fn total_blocks(&self) -> i64 {
        self.blocks_per_type.iter().map(|count| count.blocks).sum()
    }
}

pub fn check_integrity(
    connection: &Connection,
    titles: &TitleNormalizer,
) -> Result<IntegrityReport> {
    let mut issues = find_orphan_blocks(connection)?;
    issues.extend(find_question_numbering_gaps(connection, titles)?);

    let report = IntegrityReport {
        issues,
        questions_per_chapter: count_questions_per_chapter(connection)?,
        blocks_per_type: count_blocks_per_type(connection)?,
    };

    if report.is_clean() {
        info!(
            questions = report.total_questions(),
            blocks = report.total_blocks(),
            "canonical store integrity check passed"
        );
    } else {
        warn!(
            issues = report.issues.len(),
            questions = report.total_questions(),
            blocks = report.total_blocks(),
            "canonical store integrity check found issues"
        );
    }
    Ok(report)
}

pub fn find_orphan_blocks(connection: &Connection) -> Result<Vec<IntegrityIssue>> {
    let sql = format!(
        "
        SELECT block_id, COALESCE(block_type, ''), section_title
        FROM doc_blocks
        WHERE chapter_title IS NULL
          AND COALESCE(block_type, '') NOT IN ({})
        ORDER BY block_id ASC
        ",
        UNCHAPTERED_BLOCK_TYPES
            .iter()
            .map(|block_type| format!("'{block_type}'"))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let mut statement = connection
        .prepare(&sql)
        .context("failed to prepare orphan block check")?;
    let mut rows = statement.query([])?;

    let mut issues = Vec::new();
    while let Some(row) = rows.next()? {
        issues.push(IntegrityIssue::OrphanBlock {
            block_id: row.get(0)?,
            block_type: row.get(1)?,
            section_title: row.get(2)?,
        });
    }
    Ok(issues)
}

/// Chapters are grouped by match key, so drifted titles of one chapter are
/// numbered together.
pub fn find_question_numbering_gaps(
    connection: &Connection,
    titles: &TitleNormalizer,
) -> Result<Vec<IntegrityIssue>> {
    let mut statement = connection
        .prepare(
            "
            SELECT section_title, chapter_title, question_number
            FROM d_questions
            ORDER BY block_id ASC
            ",
        )
        .context("failed to prepare question numbering check")?;
    let mut rows = statement.query([])?;

    let mut groups: Vec<(String, String, Vec<i64>)> = Vec::new();
    let mut group_index: HashMap<(String, String), usize> = HashMap::new();
    while let Some(row) = rows.next()? {
        let section_title: String = row.get::<_, Option<String>>(0)?.unwrap_or_default();
        let chapter_title: String = row.get::<_, Option<String>>(1)?.unwrap_or_default();
        let number = row.get::<_, Option<i64>>(2)?.unwrap_or(0);

        let key = (
            titles.section_match_key(&section_title),
            titles.chapter_match_key(&chapter_title),
        );
        let index = *group_index.entry(key).or_insert_with(|| {
            groups.push((section_title, chapter_title, Vec::new()));
            groups.len() - 1
        });
        groups[index].2.push(number);
    }

    Ok(groups
        .into_iter()
        .filter_map(|(section_title, chapter_title, mut numbers)| {
            numbers.sort_unstable();
            let sequential = numbers
                .iter()
                .zip(1_i64..)
                .all(|(number, expected)| *number == expected);
            (!sequential).then_some(IntegrityIssue::QuestionNumbering {
                section_title,
                chapter_title,
                numbers,
            })
        })
        .collect())
}

pub fn count_questions_per_chapter(connection: &Connection) -> Result<Vec<ChapterQuestionCount>> {
    let mut statement = connection
        .prepare(
            "
            SELECT section_title, chapter_title, COUNT(*)
            FROM d_questions
            GROUP BY section_title, chapter_title
            ORDER BY section_title, chapter_title
            ",
        )
        .context("failed to prepare question count")?;
    let mut rows = statement.query([])?;

    let mut counts = Vec::new();
    while let Some(row) = rows.next()? {
        counts.push(ChapterQuestionCount {
            section_title: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
            chapter_title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            questions: row.get(2)?,
        });
    }
    Ok(counts)
}

pub fn count_blocks_per_type(connection: &Connection) -> Result<Vec<BlockTypeCount>> {
    let mut statement = connection
        .prepare(
            "
            SELECT COALESCE(block_type, ''), COUNT(*) AS blocks
            FROM doc_blocks
            GROUP BY block_type
            ORDER BY blocks DESC, block_type ASC
            ",
        )
        .context("failed to prepare block type count")?;
    let mut rows = statement.query([])?;

    let mut counts = Vec::new();
    while let Some(row) = rows.next()? {
        counts.push(BlockTypeCount {
            block_type: row.get(0)?,
            blocks: row.get(1)?,
        });
    }
    Ok(counts)
}
