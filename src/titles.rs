//! Title normalization for denormalized section and chapter labels.
//!
//! Raw titles in the canonical store carry a structural tag (`[S]`, `[Ch]`)
//! and an ordinal (`Section 3 - `, `Chapter 12 `). Display parsing and
//! equality keys are kept separate: the parsers produce text for people, the
//! match keys only ever get compared with each other.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

use crate::util::condense_whitespace;

const CHAPTER_TAG: &str = "[Ch]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedTitle {
    pub number: Option<u32>,
    pub title: String,
}

impl ParsedTitle {
    /// `"<number>. <title>"` when numbered, the bare title otherwise.
    pub fn display(&self) -> String {
        match self.number {
            Some(number) if self.title.is_empty() => format!("{number}."),
            Some(number) => format!("{number}. {}", self.title),
            None => self.title.clone(),
        }
    }
}

#[derive(Debug)]
pub struct TitleNormalizer {
    tag_prefix: Regex,
    section_prefix: Regex,
    chapter_prefix: Regex,
    section_ordinal: Regex,
}

impl TitleNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            tag_prefix: Regex::new(r"^\s*\[[A-Za-z]+\]\s*")
                .context("failed to compile title tag regex")?,
            section_prefix: Regex::new(r"(?i)^section\s+(\d+)\s*[-.:]?\s*")
                .context("failed to compile section prefix regex")?,
            chapter_prefix: Regex::new(r"(?i)^chapter\s+(\d+)\s*[-.:]?\s*")
                .context("failed to compile chapter prefix regex")?,
            section_ordinal: Regex::new(r"(?i)^(?:section\s+)?\d+\s*[-.:)]*\s*")
                .context("failed to compile section ordinal regex")?,
        })
    }

    pub fn strip_tag_prefix<'a>(&self, input: &'a str) -> &'a str {
        match self.tag_prefix.find(input) {
            Some(found) => &input[found.end()..],
            None => input,
        }
    }

    pub fn parse_section_title(&self, raw: &str) -> ParsedTitle {
        parse_numbered(&self.section_prefix, self.strip_tag_prefix(raw))
    }

    pub fn parse_chapter_title(&self, raw: &str) -> ParsedTitle {
        parse_numbered(&self.chapter_prefix, self.strip_tag_prefix(raw))
    }

    pub fn section_match_key(&self, raw: &str) -> String {
        let untagged = self.strip_tag_prefix(raw).trim_start();
        let unnumbered = match self.section_ordinal.find(untagged) {
            Some(found) => &untagged[found.end()..],
            None => untagged,
        };
        condense_whitespace(unnumbered).to_lowercase()
    }

    pub fn chapter_match_key(&self, raw: &str) -> String {
        condense_whitespace(&raw.replacen(CHAPTER_TAG, "", 1)).to_lowercase()
    }
}

fn parse_numbered(prefix: &Regex, untagged: &str) -> ParsedTitle {
    let trimmed = untagged.trim();
    let Some(captures) = prefix.captures(trimmed) else {
        return ParsedTitle {
            number: None,
            title: trimmed.to_string(),
        };
    };

    let number = captures
        .get(1)
        .and_then(|digits| digits.as_str().parse::<u32>().ok());
    match (number, captures.get(0)) {
        (Some(number), Some(whole)) => ParsedTitle {
            number: Some(number),
            title: trimmed[whole.end()..].trim().to_string(),
        },
        _ => ParsedTitle {
            number: None,
            title: trimmed.to_string(),
        },
    }
}
