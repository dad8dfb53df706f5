//! Hierarchical content queries over the canonical store.
//!
//! Every query takes resolved title sets (see [`resolver`]) as its join key.
//! Chapters and section boundaries are never stored; they are projected from
//! `doc_blocks` as the minimum block id per title pair.

pub mod blocks;
pub mod chapters;
pub mod images;
pub mod navigation;
pub mod questions;
pub mod resolver;
pub mod sections;
pub mod validate;

use rusqlite::types::Value;

use crate::store::StoreScope;
use crate::store::schema::USER_SCHEMA;

/// `?, ?, ?` for an IN list of `count` values.
pub(crate) fn in_list(count: usize) -> String {
    vec!["?"; count].join(", ")
}

pub(crate) fn text_values(values: &[String]) -> impl Iterator<Item = Value> + '_ {
    values.iter().map(|value| Value::Text(value.clone()))
}

/// SELECT expression and JOIN clause for the audit mark of the question whose
/// block id is `block_column`. Without usable marks every row reads unchecked.
pub(crate) fn audit_mark_join(scope: StoreScope, block_column: &str) -> (String, String) {
    if !scope.audit_marks {
        return ("0".to_string(), String::new());
    }

    (
        "COALESCE(am.checked, 0)".to_string(),
        format!("LEFT JOIN {USER_SCHEMA}.audit_marks am ON am.question_id = {block_column}"),
    )
}
