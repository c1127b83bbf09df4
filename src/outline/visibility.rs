//! Which items are on screen, derived from the expanded-id set.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::{ItemId, OutlineDocument};

/// Ids whose children are shown. Absence means collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpansionState {
    expanded: IndexSet<ItemId>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn expand(&mut self, id: ItemId) -> bool {
        self.expanded.insert(id)
    }

    pub fn collapse(&mut self, id: ItemId) -> bool {
        self.expanded.shift_remove(&id)
    }

    /// Flips membership and returns whether the id is now expanded.
    pub fn toggle(&mut self, id: ItemId) -> bool {
        if self.collapse(id) {
            false
        } else {
            self.expand(id);
            true
        }
    }

    pub fn clear(&mut self) {
        self.expanded.clear();
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemId> {
        self.expanded.iter()
    }

    /// Drops ids that no longer exist in `doc`.
    pub fn retain_existing(&mut self, doc: &OutlineDocument) {
        self.expanded.retain(|id| doc.position_of(*id).is_some());
    }

    /// Indices of expanded items, in document order.
    pub fn to_indices(&self, doc: &OutlineDocument) -> Vec<usize> {
        doc.iter()
            .enumerate()
            .filter(|(_, item)| self.contains(item.id))
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn from_indices(doc: &OutlineDocument, indices: &[usize]) -> Self {
        let mut state = Self::new();
        for &idx in indices {
            if let Some(item) = doc.get(idx) {
                state.expand(item.id);
            }
        }
        state
    }
}

/// Nearest preceding item with a strictly lower level.
pub fn parent_index(doc: &OutlineDocument, index: usize) -> Option<usize> {
    let level = doc.level_at(index)?;
    if level == 0 {
        return None;
    }
    (0..index).rev().find(|&i| doc.items()[i].level < level)
}

/// Level-0 items are always visible; deeper items need every ancestor expanded.
/// An item without a lower-level predecessor (hand-edited input) is shown.
pub fn is_visible(doc: &OutlineDocument, index: usize, expanded: &ExpansionState) -> bool {
    if index >= doc.len() {
        return false;
    }
    let mut current = index;
    while let Some(parent) = parent_index(doc, current) {
        if !expanded.contains(doc.items()[parent].id) {
            return false;
        }
        current = parent;
    }
    true
}

pub fn has_children(doc: &OutlineDocument, index: usize) -> bool {
    let Some(level) = doc.level_at(index) else {
        return false;
    };
    doc.items()[index + 1..]
        .iter()
        .take_while(|item| item.level > level)
        .any(|item| item.level == level + 1)
}

/// Direct children of `index`.
pub fn child_indices(doc: &OutlineDocument, index: usize) -> Vec<usize> {
    let Some(level) = doc.level_at(index) else {
        return Vec::new();
    };
    doc.items()[index + 1..]
        .iter()
        .enumerate()
        .take_while(|(_, item)| item.level > level)
        .filter(|(_, item)| item.level == level + 1)
        .map(|(offset, _)| index + 1 + offset)
        .collect()
}

pub fn visible_indices(doc: &OutlineDocument, expanded: &ExpansionState) -> Vec<usize> {
    (0..doc.len())
        .filter(|&idx| is_visible(doc, idx, expanded))
        .collect()
}

pub fn next_visible(doc: &OutlineDocument, from: usize, expanded: &ExpansionState) -> Option<usize> {
    (from + 1..doc.len()).find(|&idx| is_visible(doc, idx, expanded))
}

pub fn previous_visible(
    doc: &OutlineDocument,
    from: usize,
    expanded: &ExpansionState,
) -> Option<usize> {
    (0..from.min(doc.len()))
        .rev()
        .find(|&idx| is_visible(doc, idx, expanded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OutlineDocument {
        // 0 A
        // 1   B
        // 2     C
        // 3   D
        // 4 E
        // 5   F
        OutlineDocument::from_pairs([
            (0, "A"),
            (1, "B"),
            (2, "C"),
            (1, "D"),
            (0, "E"),
            (1, "F"),
        ])
    }

    fn id(doc: &OutlineDocument, idx: usize) -> ItemId {
        doc.get(idx).expect("item").id
    }

    #[test]
    fn roots_are_visible_and_children_start_collapsed() {
        let doc = sample();
        let expanded = ExpansionState::new();
        assert_eq!(visible_indices(&doc, &expanded), vec![0, 4]);
    }

    #[test]
    fn visibility_requires_every_ancestor_expanded() {
        let doc = sample();
        let mut expanded = ExpansionState::new();
        expanded.expand(id(&doc, 1));
        assert!(!is_visible(&doc, 2, &expanded), "A is still collapsed");

        expanded.expand(id(&doc, 0));
        assert_eq!(visible_indices(&doc, &expanded), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn collapsing_hides_only_descendants_and_expanding_restores_them() {
        let doc = sample();
        let mut expanded = ExpansionState::new();
        for idx in [0, 1, 4] {
            expanded.expand(id(&doc, idx));
        }
        let before = visible_indices(&doc, &expanded);
        assert_eq!(before, vec![0, 1, 2, 3, 4, 5]);

        expanded.collapse(id(&doc, 1));
        assert_eq!(visible_indices(&doc, &expanded), vec![0, 1, 3, 4, 5]);

        expanded.expand(id(&doc, 1));
        assert_eq!(visible_indices(&doc, &expanded), before);
    }

    #[test]
    fn has_children_checks_direct_successors() {
        let doc = sample();
        assert!(has_children(&doc, 0));
        assert!(has_children(&doc, 1));
        assert!(!has_children(&doc, 2));
        assert!(!has_children(&doc, 3));
        assert!(has_children(&doc, 4));
        assert!(!has_children(&doc, 5));
        assert!(!has_children(&doc, 42));
    }

    #[test]
    fn child_indices_skip_grandchildren() {
        let doc = sample();
        assert_eq!(child_indices(&doc, 0), vec![1, 3]);
        assert_eq!(child_indices(&doc, 4), vec![5]);
        assert!(child_indices(&doc, 2).is_empty());
    }

    #[test]
    fn orphaned_deep_item_is_visible() {
        let doc = OutlineDocument::from_pairs([(2, "orphan"), (0, "root")]);
        assert!(is_visible(&doc, 0, &ExpansionState::new()));
        assert_eq!(parent_index(&doc, 0), None);
    }

    #[test]
    fn navigation_skips_hidden_items() {
        let doc = sample();
        let mut expanded = ExpansionState::new();
        expanded.expand(id(&doc, 0));
        assert_eq!(next_visible(&doc, 1, &expanded), Some(3));
        assert_eq!(previous_visible(&doc, 4, &expanded), Some(3));
        assert_eq!(next_visible(&doc, 4, &expanded), None);
        assert_eq!(previous_visible(&doc, 0, &expanded), None);
    }

    #[test]
    fn toggle_flips_membership() {
        let doc = sample();
        let mut expanded = ExpansionState::new();
        assert!(expanded.toggle(id(&doc, 0)));
        assert!(expanded.contains(id(&doc, 0)));
        assert!(!expanded.toggle(id(&doc, 0)));
        assert!(expanded.is_empty());
    }

    #[test]
    fn indices_round_trip_onto_fresh_ids() {
        let doc = sample();
        let mut expanded = ExpansionState::new();
        expanded.expand(id(&doc, 4));
        expanded.expand(id(&doc, 0));
        assert_eq!(expanded.to_indices(&doc), vec![0, 4]);

        let reopened = OutlineDocument::from_pairs(doc.shape());
        let restored = ExpansionState::from_indices(&reopened, &[0, 4, 99]);
        assert_eq!(restored.len(), 2);
        assert!(restored.contains(reopened.get(4).expect("item").id));
    }
}
