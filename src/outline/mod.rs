//! Outline documents: a flat, leveled list of text items where order alone
//! encodes the hierarchy.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod codec;
pub mod history;
pub mod keys;
pub mod mutation;
pub mod session;
pub mod visibility;

pub use codec::{decode, decode_with, encode, DecodePolicy};
pub use history::History;
pub use keys::{InputContext, Key, KeyInput, KeyOutcome, Modifiers};
pub use session::OutlineSession;
pub use visibility::ExpansionState;

/// Deepest indentation an item may reach (levels `0..=MAX_LEVEL`).
pub const MAX_LEVEL: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineItem {
    pub id: ItemId,
    pub text: String,
    pub level: u8,
}

impl OutlineItem {
    pub fn new(text: impl Into<String>, level: u8) -> Self {
        Self {
            id: ItemId::new(),
            text: text.into(),
            level: level.min(MAX_LEVEL),
        }
    }

    pub fn blank(level: u8) -> Self {
        Self::new(String::new(), level)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutlineDocument {
    items: Vec<OutlineItem>,
}

impl OutlineDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<OutlineItem>) -> Self {
        Self { items }
    }

    /// Convenience constructor used heavily by tests and the CLI.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u8, S)>,
        S: Into<String>,
    {
        Self {
            items: pairs
                .into_iter()
                .map(|(level, text)| OutlineItem::new(text, level))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[OutlineItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&OutlineItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutlineItem> {
        self.items.iter()
    }

    pub fn level_at(&self, index: usize) -> Option<u8> {
        self.items.get(index).map(|item| item.level)
    }

    pub fn position_of(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    /// A document shown to the user always holds at least one item.
    pub fn ensure_non_empty(&mut self) {
        if self.items.is_empty() {
            self.items.push(OutlineItem::blank(0));
        }
    }

    /// `(level, text)` pairs, the part of a document that survives encoding.
    pub fn shape(&self) -> Vec<(u8, &str)> {
        self.items
            .iter()
            .map(|item| (item.level, item.text.as_str()))
            .collect()
    }

    /// Equality ignoring item ids.
    pub fn content_eq(&self, other: &OutlineDocument) -> bool {
        self.shape() == other.shape()
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<OutlineItem> {
        &mut self.items
    }
}
