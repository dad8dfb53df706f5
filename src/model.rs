use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub title: String,
    pub raw_title: String,
    pub number: Option<u32>,
}

impl Section {
    pub fn display_title(&self) -> String {
        match self.number {
            Some(number) => format!("{number}. {}", self.title),
            None => self.title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterEntry {
    pub section_title: String,
    pub chapter_title: String,
    pub raw_section_title: String,
    pub raw_chapter_title: String,
    pub chapter_number: Option<u32>,
    pub first_block_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionJump {
    pub section: Section,
    pub first_block_id: i64,
    pub first_chapter: ChapterEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum BlockType {
    Text,
    Question,
    Answer,
    Note,
    NoteHeading,
    Poetry,
    Responsive,
    Table,
    Reading,
    TitleRef,
    Image,
    Section,
    Chapter,
    Intro,
    IntroHeading,
    IntroParagraph,
    Introduction,
    Other(String),
}

impl BlockType {
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "text" => BlockType::Text,
            "question" => BlockType::Question,
            "answer" => BlockType::Answer,
            "note" => BlockType::Note,
            "note_heading" => BlockType::NoteHeading,
            "poetry" => BlockType::Poetry,
            "responsive" => BlockType::Responsive,
            "table" => BlockType::Table,
            "reading" => BlockType::Reading,
            "title_ref" => BlockType::TitleRef,
            "image" => BlockType::Image,
            "section" => BlockType::Section,
            "chapter" => BlockType::Chapter,
            "intro" => BlockType::Intro,
            "intro_heading" => BlockType::IntroHeading,
            "intro_paragraph" => BlockType::IntroParagraph,
            "introduction" => BlockType::Introduction,
            other => BlockType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BlockType::Text => "text",
            BlockType::Question => "question",
            BlockType::Answer => "answer",
            BlockType::Note => "note",
            BlockType::NoteHeading => "note_heading",
            BlockType::Poetry => "poetry",
            BlockType::Responsive => "responsive",
            BlockType::Table => "table",
            BlockType::Reading => "reading",
            BlockType::TitleRef => "title_ref",
            BlockType::Image => "image",
            BlockType::Section => "section",
            BlockType::Chapter => "chapter",
            BlockType::Intro => "intro",
            BlockType::IntroHeading => "intro_heading",
            BlockType::IntroParagraph => "intro_paragraph",
            BlockType::Introduction => "introduction",
            BlockType::Other(label) => label,
        }
    }
}

impl From<BlockType> for String {
    fn from(value: BlockType) -> Self {
        value.as_str().to_string()
    }
}

/// Structured payload carried in `doc_blocks.table_json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TablePayload {
    Grid { rows: Vec<Vec<String>> },
    TitleRef { left: String, right: String },
    /// The stored JSON did not parse; render the block as plain text.
    Empty,
}

impl TablePayload {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<RawTablePayload>(raw) {
            Ok(RawTablePayload::TitleRef { left, right }) => TablePayload::TitleRef { left, right },
            Ok(RawTablePayload::Grid(rows)) => TablePayload::Grid { rows },
            Ok(RawTablePayload::CellLines(rows)) => TablePayload::Grid {
                rows: rows
                    .into_iter()
                    .map(|row| row.into_iter().map(|lines| lines.join("\n")).collect())
                    .collect(),
            },
            Err(err) => {
                tracing::debug!(error = %err, "table payload did not parse");
                TablePayload::Empty
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            TablePayload::Grid { rows } => rows.is_empty(),
            TablePayload::TitleRef { .. } => false,
            TablePayload::Empty => true,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTablePayload {
    TitleRef { left: String, right: String },
    Grid(Vec<Vec<String>>),
    CellLines(Vec<Vec<Vec<String>>>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageBlob {
    pub image_id: i64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocBlock {
    pub block_id: i64,
    pub block_type: BlockType,
    pub raw_text: String,
    pub normalized_text: String,
    pub table_json: Option<String>,
    pub table: Option<TablePayload>,
    pub images: Vec<ImageBlob>,
    pub checked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionAnchor {
    pub block_id: i64,
    pub question_number: i64,
    pub question_text: String,
    pub section_title: String,
    pub chapter_title: String,
    pub checked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditMark {
    pub question_id: i64,
    pub checked: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkWrite {
    Applied,
    NothingToClear,
    Unavailable,
}
