//! Fixture stores shared by the async tests.

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, params};
use tempfile::TempDir;

use crate::config::StoreConfig;

pub(crate) const S1: &str = "[S] Section 1 - Introduction";
pub(crate) const S2: &str = "[S] Section 2 - Creation";
pub(crate) const S2_DRIFT: &str = "Section 2 - Creation";
pub(crate) const S3: &str = "[S] Section 3 - Redemption";
pub(crate) const S4: &str = "[S] Section 4 - Appendix";

pub(crate) const PREFACE: &str = "[Ch] Chapter 1 - Preface";
pub(crate) const BEGINNING: &str = "[Ch] Chapter 1 - The Beginning";
pub(crate) const FALL: &str = "[Ch] Chapter 2 - The Fall";
pub(crate) const PROMISE: &str = "[Ch] Chapter 3 - The Promise";

pub(crate) struct Fixture {
    pub(crate) dir: TempDir,
    pub(crate) config: StoreConfig,
}

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Log sink for tests that assert on what was logged. Install with
/// `tracing::subscriber::set_default` on a current-thread runtime.
#[derive(Debug, Clone, Default)]
pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub(crate) fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .finish()
    }

    pub(crate) fn contents(&self) -> String {
        let bytes = self.0.lock().expect("log buffer lock").clone();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Canonical store with four sections; the user store path is left empty.
///
/// Carries two integrity defects on purpose: block 95 has no chapter, and
/// "The Promise" numbers its questions 1, 3.
pub(crate) fn fixture() -> Fixture {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let config = StoreConfig::in_directory(dir.path());
    write_canonical(&config.canonical_path);
    Fixture { dir, config }
}

/// Same canonical store, plus a user store from an older build whose
/// `audit_marks` table has no `checked` column.
pub(crate) fn fixture_with_legacy_user_store() -> Fixture {
    let fixture = fixture();
    let connection = Connection::open(&fixture.config.user_path).expect("user db should open");
    connection
        .execute_batch(
            "
            CREATE TABLE audit_marks (
              question_id INTEGER PRIMARY KEY,
              updated_at TEXT
            );
            INSERT INTO audit_marks(question_id, updated_at) VALUES (102, '2024-01-01 00:00:00');
            ",
        )
        .expect("legacy user schema should be created");
    fixture
}

/// block_id, section, chapter, block_type, text, table_json, image_blob_id
type BlockRow<'a> = (
    i64,
    Option<&'a str>,
    Option<&'a str>,
    &'a str,
    &'a str,
    Option<&'a str>,
    Option<i64>,
);

fn write_canonical(path: &Path) {
    let connection = Connection::open(path).expect("canonical db should open");
    connection
        .execute_batch(
            "
            CREATE TABLE brhc_sections (
              section_id INTEGER PRIMARY KEY AUTOINCREMENT,
              section_title TEXT NOT NULL,
              order_index INTEGER NOT NULL
            );
            CREATE TABLE doc_blocks (
              block_id INTEGER PRIMARY KEY,
              section_title TEXT,
              chapter_title TEXT,
              block_order INTEGER NOT NULL,
              block_type TEXT NOT NULL,
              raw_text TEXT,
              normalized_text TEXT,
              table_json TEXT,
              image_blob_id INTEGER
            );
            CREATE TABLE d_questions (
              question_id INTEGER PRIMARY KEY AUTOINCREMENT,
              block_id INTEGER NOT NULL,
              question_number INTEGER,
              question_text TEXT NOT NULL,
              section_title TEXT,
              chapter_title TEXT
            );
            CREATE TABLE brhc_images (
              image_id INTEGER PRIMARY KEY AUTOINCREMENT,
              image_blob BLOB NOT NULL
            );
            CREATE TABLE brhc_image_block_map (
              image_id INTEGER NOT NULL,
              block_id INTEGER NOT NULL
            );
            ",
        )
        .expect("canonical schema should be created");

    for (title, order_index) in [(S3, 3), (S1, 1), (S4, 4), (S2, 2)] {
        connection
            .execute(
                "INSERT INTO brhc_sections(section_title, order_index) VALUES (?1, ?2)",
                params![title, order_index],
            )
            .expect("section should insert");
    }

    let blocks: [BlockRow<'_>; 25] = [
        (1, None, None, "intro_heading", "Bible Readings for the Home Circle", None, None),
        (10, Some(S1), None, "section", S1, None, None),
        (11, Some(S1), Some(PREFACE), "chapter", PREFACE, None, None),
        (12, Some(S1), Some(PREFACE), "question", "Why study the Scriptures?", None, None),
        (13, Some(S1), Some(PREFACE), "answer", "They testify of Christ.", None, None),
        (90, Some(S2), None, "section", S2, None, None),
        (95, Some(S2), None, "text", "A paragraph that lost its chapter.", None, None),
        (100, Some(S2), Some(BEGINNING), "chapter", BEGINNING, None, None),
        (101, Some(S2), Some(BEGINNING), "text", "In the beginning.", None, None),
        (102, Some(S2), Some(BEGINNING), "question", "Who created the heavens?", None, None),
        (103, Some(S2_DRIFT), Some(BEGINNING), "answer", "God created them.", None, None),
        (104, Some(S2), Some(BEGINNING), "image", "", None, None),
        (105, Some(S2), Some(BEGINNING), "question", "What was made first?", None, None),
        (
            106,
            Some(S2),
            Some(BEGINNING),
            "table",
            "Day\tWork",
            Some(r#"[["Day","Work"],["1","Light"]]"#),
            Some(2),
        ),
        (249, Some(S2), Some(BEGINNING), "note", "[N] Note:- God rested.", None, None),
        (250, Some(S2), Some(FALL), "chapter", FALL, None, None),
        (251, Some(S2), Some(FALL), "question", "How did sin enter?", None, None),
        (
            252,
            Some(S2),
            Some(FALL),
            "title_ref",
            "The Fall\nGen. 3",
            Some(r#"{"left":"The Fall","right":"Gen. 3"}"#),
            None,
        ),
        (253, Some(S2), Some(FALL), "table", "broken", Some("{oops"), None),
        (300, Some(S3), None, "section", S3, None, None),
        (301, Some(S3), Some(PROMISE), "chapter", PROMISE, None, None),
        (302, Some(S3), Some(PROMISE), "question", "What was promised?", None, None),
        (303, Some(S3), Some(PROMISE), "poetry", "Come, Thou long expected", None, None),
        (304, Some(S3), Some(PROMISE), "question", "Who is the seed?", None, None),
        (400, Some(S4), None, "section", S4, None, None),
    ];

    for (order, (block_id, section, chapter, block_type, text, table_json, image_blob_id)) in
        blocks.into_iter().enumerate()
    {
        connection
            .execute(
                "
                INSERT INTO doc_blocks(
                  block_id, section_title, chapter_title, block_order, block_type,
                  raw_text, normalized_text, table_json, image_blob_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7, ?8)
                ",
                params![
                    block_id,
                    section,
                    chapter,
                    order as i64,
                    block_type,
                    text,
                    table_json,
                    image_blob_id
                ],
            )
            .expect("block should insert");
    }

    let questions = [
        (105, 2, "What was made first?", S2, BEGINNING),
        (12, 1, "Why study the Scriptures?", S1, PREFACE),
        (102, 1, "Who created the heavens?", S2, BEGINNING),
        (251, 1, "How did sin enter?", S2, FALL),
        (302, 1, "What was promised?", S3, PROMISE),
        (304, 3, "Who is the seed?", S3, PROMISE),
    ];
    for (block_id, number, text, section, chapter) in questions {
        connection
            .execute(
                "
                INSERT INTO d_questions(
                  block_id, question_number, question_text, section_title, chapter_title
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                ",
                params![block_id, number, text, section, chapter],
            )
            .expect("question should insert");
    }

    for blob in [vec![1_u8, 2, 3], vec![4_u8, 5], vec![6_u8]] {
        connection
            .execute("INSERT INTO brhc_images(image_blob) VALUES (?1)", [blob])
            .expect("image should insert");
    }
    for (image_id, block_id) in [(2, 104), (1, 104), (1, 251)] {
        connection
            .execute(
                "INSERT INTO brhc_image_block_map(image_id, block_id) VALUES (?1, ?2)",
                params![image_id, block_id],
            )
            .expect("image link should insert");
    }
}

/// Drops the image association table to mimic an older canonical build.
pub(crate) fn drop_image_map(fixture: &Fixture) {
    let connection =
        Connection::open(&fixture.config.canonical_path).expect("canonical db should open");
    connection
        .execute_batch("DROP TABLE brhc_image_block_map")
        .expect("image map should drop");
}
