use std::sync::Arc;

use anyhow::Result;
use rusqlite::Connection;
use tracing::{error, info, warn};

use crate::config::StoreConfig;
use crate::content::navigation::QuestionNavigator;
use crate::content::validate::{self, IntegrityReport};
use crate::content::{blocks, chapters, questions, resolver, sections};
use crate::marks;
use crate::model::{
    AuditMark, ChapterEntry, DocBlock, MarkWrite, QuestionAnchor, Section, SectionJump,
};
use crate::store::{Database, StoreScope, run_blocking};
use crate::titles::TitleNormalizer;

/// Async entry point for the presentation layer.
///
/// Cheap to clone; clones share the same stores.
#[derive(Debug, Clone)]
pub struct Library {
    database: Arc<Database>,
    titles: Arc<TitleNormalizer>,
}

impl Library {
    pub fn new(config: StoreConfig) -> Result<Self> {
        Ok(Self {
            database: Arc::new(Database::new(config)),
            titles: Arc::new(TitleNormalizer::new()?),
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn titles(&self) -> &TitleNormalizer {
        &self.titles
    }

    /// Opens and links both stores up front instead of on first query.
    pub async fn open(&self) -> Result<StoreScope> {
        let scope = log_failure("open", self.database.scope().await)?;
        info!(audit_marks = scope.audit_marks, "library ready");
        Ok(scope)
    }

    pub async fn fetch_sections(&self) -> Result<Vec<Section>> {
        self.query("fetch_sections", |connection, titles, _| {
            sections::fetch_sections(connection, titles)
        })
        .await
    }

    pub async fn resolve_section_titles(&self, input: &str) -> Result<Vec<String>> {
        let input = input.to_string();
        self.query("resolve_section_titles", move |connection, titles, _| {
            resolver::resolve_section_titles(connection, titles, &input)
        })
        .await
    }

    pub async fn resolve_chapter_titles(
        &self,
        section_titles: &[String],
        input: &str,
    ) -> Result<Vec<String>> {
        let section_titles = section_titles.to_vec();
        let input = input.to_string();
        self.query("resolve_chapter_titles", move |connection, titles, _| {
            resolver::resolve_chapter_titles(connection, titles, &section_titles, &input)
        })
        .await
    }

    pub async fn fetch_chapters(&self, section_title: &str) -> Result<Vec<ChapterEntry>> {
        let section_title = section_title.to_string();
        self.query("fetch_chapters", move |connection, titles, _| {
            chapters::fetch_chapters(connection, titles, &section_title)
        })
        .await
    }

    pub async fn fetch_chapter_blocks(
        &self,
        section_title: &str,
        chapter_title: &str,
    ) -> Result<Vec<DocBlock>> {
        let (section_title, chapter_title) = (section_title.to_string(), chapter_title.to_string());
        self.query("fetch_chapter_blocks", move |connection, titles, scope| {
            blocks::fetch_chapter_blocks(connection, titles, scope, &section_title, &chapter_title)
        })
        .await
    }

    pub async fn fetch_question_index(
        &self,
        section_title: &str,
        chapter_title: &str,
    ) -> Result<Vec<QuestionAnchor>> {
        let (section_title, chapter_title) = (section_title.to_string(), chapter_title.to_string());
        self.query("fetch_question_index", move |connection, titles, scope| {
            questions::fetch_question_index(
                connection,
                titles,
                scope,
                &section_title,
                &chapter_title,
            )
        })
        .await
    }

    pub async fn fetch_all_question_anchors(&self) -> Result<Vec<QuestionAnchor>> {
        self.query("fetch_all_question_anchors", |connection, _, scope| {
            questions::fetch_all_question_anchors(connection, scope)
        })
        .await
    }

    pub async fn question_navigator(&self) -> Result<QuestionNavigator> {
        let anchors = self.fetch_all_question_anchors().await?;
        Ok(QuestionNavigator::new(anchors, Arc::clone(&self.titles)))
    }

    pub async fn fetch_previous_chapter(
        &self,
        section_title: &str,
        chapter_title: &str,
    ) -> Result<Option<ChapterEntry>> {
        let (section_title, chapter_title) = (section_title.to_string(), chapter_title.to_string());
        self.query("fetch_previous_chapter", move |connection, titles, _| {
            chapters::fetch_previous_chapter(connection, titles, &section_title, &chapter_title)
        })
        .await
    }

    pub async fn fetch_next_chapter(
        &self,
        section_title: &str,
        chapter_title: &str,
    ) -> Result<Option<ChapterEntry>> {
        let (section_title, chapter_title) = (section_title.to_string(), chapter_title.to_string());
        self.query("fetch_next_chapter", move |connection, titles, _| {
            chapters::fetch_next_chapter(connection, titles, &section_title, &chapter_title)
        })
        .await
    }

    pub async fn fetch_previous_section_with_content(
        &self,
        block_id: i64,
    ) -> Result<Option<SectionJump>> {
        self.query("fetch_previous_section_with_content", move |connection, titles, _| {
            sections::fetch_previous_section_with_content(connection, titles, block_id)
        })
        .await
    }

    pub async fn fetch_next_section_with_content(
        &self,
        block_id: i64,
    ) -> Result<Option<SectionJump>> {
        self.query("fetch_next_section_with_content", move |connection, titles, _| {
            sections::fetch_next_section_with_content(connection, titles, block_id)
        })
        .await
    }

    /// Runs the read-only integrity checks over the canonical store.
    pub async fn check_integrity(&self) -> Result<IntegrityReport> {
        self.query("check_integrity", |connection, titles, _| {
            validate::check_integrity(connection, titles)
        })
        .await
    }

    /// Sets or clears the audit mark of a question. Returns
    /// [`MarkWrite::Unavailable`] without touching storage when the user
    /// store cannot hold marks.
    pub async fn set_audit_mark(&self, question_id: i64, checked: bool) -> Result<MarkWrite> {
        log_failure("set_audit_mark", marks::validate_question_id(question_id))?;

        let user = log_failure("set_audit_mark", self.database.user().await)?;
        if !user.audit_marks_available {
            warn!(question_id, checked, "audit marks unavailable; mark not stored");
            return Ok(MarkWrite::Unavailable);
        }

        let result = run_blocking(Arc::clone(&user.connection), move |connection| {
            marks::write_audit_mark(connection, question_id, checked)
        })
        .await;
        log_failure("set_audit_mark", result)
    }

    pub async fn audit_mark(&self, question_id: i64) -> Result<Option<AuditMark>> {
        let user = log_failure("audit_mark", self.database.user().await)?;
        if !user.audit_marks_available {
            return Ok(None);
        }

        let result = run_blocking(Arc::clone(&user.connection), move |connection| {
            marks::read_audit_mark(connection, question_id)
        })
        .await;
        log_failure("audit_mark", result)
    }

    pub async fn fetch_audit_marks(&self) -> Result<Vec<AuditMark>> {
        let user = log_failure("fetch_audit_marks", self.database.user().await)?;
        if !user.audit_marks_available {
            return Ok(Vec::new());
        }

        let result = run_blocking(Arc::clone(&user.connection), marks::read_audit_marks).await;
        log_failure("fetch_audit_marks", result)
    }

    async fn query<T, F>(&self, operation: &'static str, job: F) -> Result<T>
    where
        F: FnOnce(&Connection, &TitleNormalizer, StoreScope) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let result = async {
            let linked = self.database.linked().await?;
            let titles = Arc::clone(&self.titles);
            let scope = linked.scope;
            run_blocking(linked.connection, move |connection| {
                job(connection, titles.as_ref(), scope)
            })
            .await
        }
        .await;
        log_failure(operation, result)
    }
}

fn log_failure<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        error!(operation, error = %err, "content operation failed");
        for cause in err.chain().skip(1) {
            error!(operation, cause = %cause, "caused by");
        }
    }
    result
}

#[cfg(test)]
mod tests;
