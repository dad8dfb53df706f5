//! Traversal over the global question anchor list.
//!
//! Question steps only need a block id: a block that is not itself an anchor
//! sits between the anchors around it. Chapter and section steps also need
//! the titles of the block being read, since a chapter heading or the text
//! before a chapter's first question has no anchor of its own to go by.

use std::sync::Arc;

use crate::model::{ChapterEntry, QuestionAnchor};
use crate::titles::TitleNormalizer;

/// A block and the raw titles of the section and chapter holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingPosition<'a> {
    pub block_id: i64,
    pub section_title: &'a str,
    pub chapter_title: &'a str,
}

impl<'a> ReadingPosition<'a> {
    pub fn at_anchor(anchor: &'a QuestionAnchor) -> Self {
        Self {
            block_id: anchor.block_id,
            section_title: &anchor.section_title,
            chapter_title: &anchor.chapter_title,
        }
    }

    pub fn chapter_start(chapter: &'a ChapterEntry) -> Self {
        Self {
            block_id: chapter.first_block_id,
            section_title: &chapter.raw_section_title,
            chapter_title: &chapter.raw_chapter_title,
        }
    }
}

type GroupKey = (String, String);

#[derive(Debug, Clone)]
pub struct QuestionNavigator {
    anchors: Vec<QuestionAnchor>,
    keys: Vec<GroupKey>,
    titles: Arc<TitleNormalizer>,
}

impl QuestionNavigator {
    /// `anchors` must be in block id order, as returned by
    /// `fetch_all_question_anchors`.
    pub fn new(anchors: Vec<QuestionAnchor>, titles: Arc<TitleNormalizer>) -> Self {
        let keys = anchors
            .iter()
            .map(|anchor| chapter_key(&titles, &anchor.section_title, &anchor.chapter_title))
            .collect();
        Self {
            anchors,
            keys,
            titles,
        }
    }

    pub fn anchors(&self) -> &[QuestionAnchor] {
        &self.anchors
    }

    pub fn next_question(&self, block_id: i64) -> Option<&QuestionAnchor> {
        self.anchors.get(self.first_after(block_id))
    }

    pub fn previous_question(&self, block_id: i64) -> Option<&QuestionAnchor> {
        let index = self.first_at_or_after(block_id).checked_sub(1)?;
        self.anchors.get(index)
    }

    /// First anchor of the chapter after the one holding `position`.
    pub fn next_chapter_anchor(&self, position: ReadingPosition<'_>) -> Option<&QuestionAnchor> {
        let current = chapter_key(&self.titles, position.section_title, position.chapter_title);
        self.next_group_start(position.block_id, &current, |key| key.clone())
    }

    /// First anchor of the chapter before the one holding `position`.
    pub fn previous_chapter_anchor(
        &self,
        position: ReadingPosition<'_>,
    ) -> Option<&QuestionAnchor> {
        let current = chapter_key(&self.titles, position.section_title, position.chapter_title);
        self.previous_group_start(position.block_id, &current, |key| key.clone())
    }

    /// First anchor of the next section, crossing any chapter boundaries.
    pub fn next_section_anchor(&self, position: ReadingPosition<'_>) -> Option<&QuestionAnchor> {
        let current = section_key(&self.titles, position.section_title);
        self.next_group_start(position.block_id, &current, section_of)
    }

    pub fn previous_section_anchor(
        &self,
        position: ReadingPosition<'_>,
    ) -> Option<&QuestionAnchor> {
        let current = section_key(&self.titles, position.section_title);
        self.previous_group_start(position.block_id, &current, section_of)
    }

    fn first_after(&self, block_id: i64) -> usize {
        self.anchors.partition_point(|anchor| anchor.block_id <= block_id)
    }

    fn first_at_or_after(&self, block_id: i64) -> usize {
        self.anchors.partition_point(|anchor| anchor.block_id < block_id)
    }

    /// First anchor after `block_id` outside the reader's own group.
    fn next_group_start<F>(
        &self,
        block_id: i64,
        current: &GroupKey,
        group: F,
    ) -> Option<&QuestionAnchor>
    where
        F: Fn(&GroupKey) -> GroupKey,
    {
        (self.first_after(block_id)..self.anchors.len())
            .find(|&index| group(&self.keys[index]) != *current)
            .map(|index| &self.anchors[index])
    }

    /// Start of the nearest group before `block_id` that is not the
    /// reader's own.
    fn previous_group_start<F>(
        &self,
        block_id: i64,
        current: &GroupKey,
        group: F,
    ) -> Option<&QuestionAnchor>
    where
        F: Fn(&GroupKey) -> GroupKey,
    {
        let previous_end = (0..self.first_at_or_after(block_id))
            .rev()
            .find(|&index| group(&self.keys[index]) != *current)?;

        let previous_group = group(&self.keys[previous_end]);
        let mut start = previous_end;
        while start > 0 && group(&self.keys[start - 1]) == previous_group {
            start -= 1;
        }
        self.anchors.get(start)
    }
}

fn chapter_key(titles: &TitleNormalizer, section_title: &str, chapter_title: &str) -> GroupKey {
    (
        titles.section_match_key(section_title),
        titles.chapter_match_key(chapter_title),
    )
}

fn section_key(titles: &TitleNormalizer, section_title: &str) -> GroupKey {
    (titles.section_match_key(section_title), String::new())
}

fn section_of(key: &GroupKey) -> GroupKey {
    (key.0.clone(), String::new())
}
