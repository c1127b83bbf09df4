//! Structural edits over the flat outline list.
//!
//! Every function takes explicit coordinates and silently ignores requests
//! that would break the level bounds or point past the end of the document.

use super::visibility::{parent_index, ExpansionState};
use super::{OutlineDocument, OutlineItem, MAX_LEVEL};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deleted {
    pub item: OutlineItem,
    /// Item that should take focus after the removal, if any.
    pub focus: Option<usize>,
}

/// Inserts an empty item after `after` (or at the end) at the reference
/// item's level and returns the index the caller should focus.
pub fn insert_after(doc: &mut OutlineDocument, after: Option<usize>) -> usize {
    let reference = after.filter(|&idx| idx < doc.len());
    let level = reference.and_then(|idx| doc.level_at(idx)).unwrap_or(0);
    let position = reference.map(|idx| idx + 1).unwrap_or(doc.len());
    doc.items_mut().insert(position, OutlineItem::blank(level));
    position
}

/// Raises the item one level and expands its new parent so it stays visible.
pub fn indent(doc: &mut OutlineDocument, index: usize, expansion: &mut ExpansionState) -> bool {
    let Some(item) = doc.items_mut().get_mut(index) else {
        return false;
    };
    if item.level >= MAX_LEVEL {
        return false;
    }
    item.level += 1;
    if let Some(parent) = parent_index(doc, index) {
        let parent_id = doc.items()[parent].id;
        expansion.expand(parent_id);
    }
    true
}

pub fn outdent(doc: &mut OutlineDocument, index: usize) -> bool {
    match doc.items_mut().get_mut(index) {
        Some(item) if item.level > 0 => {
            item.level -= 1;
            true
        }
        _ => false,
    }
}

/// Removes one item. Descendants are not removed; they attach to whichever
/// preceding item now has a lower level.
pub fn delete_item(doc: &mut OutlineDocument, index: usize) -> Option<Deleted> {
    if index >= doc.len() {
        return None;
    }
    let item = doc.items_mut().remove(index);
    let focus = (item.text.is_empty() && index > 0).then(|| index - 1);
    Some(Deleted { item, focus })
}

/// Replaces an item's text. Line breaks become spaces so every item still
/// encodes to a single line.
pub fn update_text(doc: &mut OutlineDocument, index: usize, text: &str) -> bool {
    let Some(item) = doc.items_mut().get_mut(index) else {
        return false;
    };
    let sanitized = if text.contains(['\n', '\r']) {
        text.replace("\r\n", " ").replace(['\n', '\r'], " ")
    } else {
        text.to_string()
    };
    if item.text == sanitized {
        return false;
    }
    item.text = sanitized;
    true
}
