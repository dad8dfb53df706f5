use std::sync::Arc;

use super::Library;
use crate::content::navigation::ReadingPosition;
use crate::content::validate::IntegrityIssue;
use crate::model::MarkWrite;
use crate::test_support::{
    BEGINNING, CapturedLogs, FALL, PREFACE, S2, S2_DRIFT, drop_image_map, fixture,
    fixture_with_legacy_user_store,
};

#[tokio::test]
async fn open_reports_store_scope() {
    let fixture = fixture();
    let library = Library::new(fixture.config.clone()).expect("library should build");

    let scope = library.open().await.expect("stores should open");
    assert!(scope.audit_marks);
    assert!(scope.canonical.image_table);
    assert!(scope.canonical.image_map);
    assert!(fixture.config.user_path.exists());
}

#[tokio::test]
async fn browsing_a_section_end_to_end() {
    let fixture = fixture();
    let library = Library::new(fixture.config.clone()).expect("library should build");

    let sections = library.fetch_sections().await.expect("sections should load");
    assert_eq!(sections.len(), 4);
    assert_eq!(sections[1].raw_title, S2);

    let chapters = library
        .fetch_chapters(&sections[1].raw_title)
        .await
        .expect("chapters should load");
    assert_eq!(chapters.len(), 2);

    let blocks = library
        .fetch_chapter_blocks(S2_DRIFT, &chapters[0].raw_chapter_title)
        .await
        .expect("blocks should load");
    assert_eq!(blocks.first().map(|block| block.block_id), Some(100));
    assert_eq!(blocks.last().map(|block| block.block_id), Some(249));
}

#[tokio::test]
async fn audit_marks_show_up_in_content_queries() {
    let fixture = fixture();
    let library = Library::new(fixture.config.clone()).expect("library should build");

    assert_eq!(
        library.set_audit_mark(102, true).await.expect("mark should save"),
        MarkWrite::Applied
    );

    let index = library
        .fetch_question_index(S2, BEGINNING)
        .await
        .expect("index should load");
    let checked: Vec<(i64, bool)> = index
        .iter()
        .map(|anchor| (anchor.block_id, anchor.checked))
        .collect();
    assert_eq!(checked, vec![(102, true), (105, false)]);

    let blocks = library
        .fetch_chapter_blocks(S2, BEGINNING)
        .await
        .expect("blocks should load");
    let question = blocks.iter().find(|block| block.block_id == 102).expect("block 102");
    assert!(question.checked);

    assert_eq!(
        library.set_audit_mark(102, false).await.expect("mark should clear"),
        MarkWrite::Applied
    );
    let mark = library
        .audit_mark(102)
        .await
        .expect("mark should read")
        .expect("cleared mark keeps its row");
    assert!(!mark.checked);

    let anchors = library
        .fetch_all_question_anchors()
        .await
        .expect("anchors should load");
    assert!(anchors.iter().all(|anchor| !anchor.checked));
}

#[tokio::test]
async fn clearing_a_mark_that_was_never_set_writes_nothing() {
    let fixture = fixture();
    let library = Library::new(fixture.config.clone()).expect("library should build");

    assert_eq!(
        library.set_audit_mark(251, false).await.expect("clear should succeed"),
        MarkWrite::NothingToClear
    );
    assert!(library.fetch_audit_marks().await.expect("marks should list").is_empty());
}

#[tokio::test]
async fn invalid_question_ids_are_rejected_before_storage() {
    let fixture = fixture();
    let library = Library::new(fixture.config.clone()).expect("library should build");

    let err = library
        .set_audit_mark(0, true)
        .await
        .expect_err("zero is not a question id");
    assert!(err.to_string().contains("invalid question id"));
    assert!(library.fetch_audit_marks().await.expect("marks should list").is_empty());
}

#[tokio::test]
async fn legacy_user_store_disables_marks_but_not_content() {
    let fixture = fixture_with_legacy_user_store();
    let library = Library::new(fixture.config.clone()).expect("library should build");

    let scope = library.open().await.expect("stores should open");
    assert!(!scope.audit_marks);

    assert_eq!(
        library.set_audit_mark(102, true).await.expect("write should degrade"),
        MarkWrite::Unavailable
    );
    assert!(library.audit_mark(102).await.expect("read should degrade").is_none());
    assert!(library.fetch_audit_marks().await.expect("list should degrade").is_empty());

    let index = library
        .fetch_question_index(S2, BEGINNING)
        .await
        .expect("index should still load");
    assert_eq!(index.len(), 2);
    assert!(index.iter().all(|anchor| !anchor.checked));
}

#[tokio::test]
async fn missing_image_map_falls_back_to_legacy_references() {
    let fixture = fixture();
    drop_image_map(&fixture);
    let library = Library::new(fixture.config.clone()).expect("library should build");

    let scope = library.open().await.expect("stores should open");
    assert!(!scope.canonical.image_map);

    let blocks = library
        .fetch_chapter_blocks(S2, BEGINNING)
        .await
        .expect("blocks should load");
    let image_block = blocks.iter().find(|block| block.block_id == 104).expect("block 104");
    assert!(image_block.images.is_empty());
    let table_block = blocks.iter().find(|block| block.block_id == 106).expect("block 106");
    assert_eq!(table_block.images.len(), 1);
}

#[tokio::test]
async fn navigation_walks_chapters_sections_and_questions() {
    let fixture = fixture();
    let library = Library::new(fixture.config.clone()).expect("library should build");

    let previous = library
        .fetch_previous_chapter(S2, BEGINNING)
        .await
        .expect("lookup should succeed")
        .expect("preface precedes");
    assert_eq!(previous.raw_chapter_title, PREFACE);

    let next = library
        .fetch_next_chapter(S2, BEGINNING)
        .await
        .expect("lookup should succeed")
        .expect("the fall follows");
    assert_eq!(next.raw_chapter_title, FALL);

    let jump = library
        .fetch_next_section_with_content(next.first_block_id)
        .await
        .expect("lookup should succeed")
        .expect("section 3 follows");
    assert_eq!(jump.first_chapter.first_block_id, 301);
    let back = library
        .fetch_previous_section_with_content(jump.first_chapter.first_block_id)
        .await
        .expect("lookup should succeed")
        .expect("section 2 precedes");
    assert_eq!(back.section.raw_title, S2);

    let navigator = library.question_navigator().await.expect("navigator should build");
    assert_eq!(navigator.anchors().len(), 6);
    assert_eq!(navigator.next_question(102).map(|anchor| anchor.block_id), Some(105));
    let fall_heading = ReadingPosition::chapter_start(&next);
    assert_eq!(
        navigator.next_chapter_anchor(fall_heading).map(|anchor| anchor.block_id),
        Some(302)
    );
    assert_eq!(
        navigator.previous_chapter_anchor(fall_heading).map(|anchor| anchor.block_id),
        Some(102)
    );
}

#[tokio::test]
async fn unknown_titles_resolve_to_themselves() {
    let fixture = fixture();
    let library = Library::new(fixture.config.clone()).expect("library should build");

    let sections = library
        .resolve_section_titles("Section 12 - Unknown")
        .await
        .expect("resolution should succeed");
    assert_eq!(sections, vec!["Section 12 - Unknown".to_string()]);

    let chapters = library
        .resolve_chapter_titles(&sections, "Chapter 1")
        .await
        .expect("resolution should succeed");
    assert_eq!(chapters, vec!["Chapter 1".to_string()]);

    let blocks = library
        .fetch_chapter_blocks("Section 12 - Unknown", "Chapter 1")
        .await
        .expect("unknown titles are not an error");
    assert!(blocks.is_empty());
}

#[tokio::test]
async fn query_errors_carry_context() {
    let fixture = fixture();
    {
        let connection = rusqlite::Connection::open(&fixture.config.canonical_path)
            .expect("canonical db should open");
        connection
            .execute_batch("DROP TABLE d_questions")
            .expect("question table should drop");
    }
    let library = Library::new(fixture.config.clone()).expect("library should build");

    let err = library
        .fetch_all_question_anchors()
        .await
        .expect_err("missing table should fail");
    assert!(format!("{err:#}").contains("failed to prepare question anchor query"));

    // Other queries keep working on the same connection.
    let sections = library.fetch_sections().await.expect("sections should load");
    assert_eq!(sections.len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_queries_share_one_library() {
    let fixture = fixture();
    let library = Arc::new(Library::new(fixture.config.clone()).expect("library should build"));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let library = Arc::clone(&library);
        tasks.push(tokio::spawn(async move {
            library.fetch_chapters(S2).await.map(|chapters| chapters.len())
        }));
    }
    for task in tasks {
        let count = task.await.expect("task should join").expect("chapters should load");
        assert_eq!(count, 2);
    }
}

#[tokio::test]
async fn integrity_check_reports_fixture_defects() {
    let fixture = fixture();
    let library = Library::new(fixture.config.clone()).expect("library should build");

    let report = library.check_integrity().await.expect("check should run");
    let kinds: Vec<&str> = report
        .issues
        .iter()
        .map(|issue| match issue {
            IntegrityIssue::OrphanBlock { .. } => "orphan_block",
            IntegrityIssue::QuestionNumbering { .. } => "question_numbering",
        })
        .collect();
    assert_eq!(kinds, vec!["orphan_block", "question_numbering"]);
    assert_eq!(report.total_questions(), 6);
}

#[tokio::test]
async fn rejected_question_ids_are_logged_with_the_operation() {
    let fixture = fixture();
    let library = Library::new(fixture.config.clone()).expect("library should build");
    let logs = CapturedLogs::default();
    let _guard = tracing::subscriber::set_default(logs.subscriber());

    library
        .set_audit_mark(-3, true)
        .await
        .expect_err("negative ids are not question ids");

    let logged = logs.contents();
    assert!(logged.contains("set_audit_mark"), "logs: {logged}");
    assert!(logged.contains("invalid question id -3"), "logs: {logged}");
}
