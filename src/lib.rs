//! Read-side data layer for the Bible Readings for the Home Circle reader.
//!
//! Content comes from a read-only canonical SQLite store; per-question audit
//! marks live in a separate user store that is attached to the canonical
//! connection so both can be queried together. [`Library`] is the async
//! entry point.

pub mod config;
pub mod content;
pub mod error;
pub mod library;
pub mod marks;
pub mod model;
pub mod store;
pub mod titles;
mod util;

#[cfg(test)]
mod test_support;

pub use config::StoreConfig;
pub use content::navigation::{QuestionNavigator, ReadingPosition};
pub use content::validate::{IntegrityIssue, IntegrityReport};
pub use error::StoreInitError;
pub use library::Library;
pub use model::{
    AuditMark, BlockType, ChapterEntry, DocBlock, ImageBlob, MarkWrite, QuestionAnchor, Section,
    SectionJump, TablePayload,
};
pub use store::{CanonicalCapabilities, Database, StoreScope};
pub use titles::{ParsedTitle, TitleNormalizer};
