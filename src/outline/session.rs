use unicode_segmentation::UnicodeSegmentation;

use super::history::History;
use super::keys::{InputContext, Key, KeyInput, KeyOutcome, Modifiers};
use super::visibility::{self, ExpansionState};
use super::{codec, mutation, DecodePolicy, OutlineDocument, OutlineItem};

/// Editing state for the one outline file that is currently open: the
/// document, which nodes are expanded, structural history and the focused
/// line with its cursor.
#[derive(Debug, Clone)]
pub struct OutlineSession {
    file_id: i64,
    document: OutlineDocument,
    expansion: ExpansionState,
    history: History,
    focus: usize,
    cursor: usize,
}

impl OutlineSession {
    pub fn open(file_id: i64, content: &str, policy: DecodePolicy, history_limit: usize) -> Self {
        let mut document = codec::decode_with(content, policy);
        document.ensure_non_empty();
        Self {
            file_id,
            document,
            expansion: ExpansionState::new(),
            history: History::with_limit(history_limit),
            focus: 0,
            cursor: 0,
        }
    }

    /// Restores expansion by item position; ids are fresh on every open.
    pub fn restore_expansion(&mut self, indices: &[usize]) {
        self.expansion = ExpansionState::from_indices(&self.document, indices);
        self.normalize_focus();
    }

    pub fn file_id(&self) -> i64 {
        self.file_id
    }

    pub fn document(&self) -> &OutlineDocument {
        &self.document
    }

    pub fn expansion(&self) -> &ExpansionState {
        &self.expansion
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn focused_item(&self) -> Option<&OutlineItem> {
        self.document.get(self.focus)
    }

    pub fn encoded(&self) -> String {
        codec::encode(&self.document)
    }

    pub fn visible_indices(&self) -> Vec<usize> {
        visibility::visible_indices(&self.document, &self.expansion)
    }

    pub fn is_expanded(&self, index: usize) -> bool {
        self.document
            .get(index)
            .map(|item| self.expansion.contains(item.id))
            .unwrap_or(false)
    }

    pub fn has_children(&self, index: usize) -> bool {
        visibility::has_children(&self.document, index)
    }

    pub fn handle_key(&mut self, input: KeyInput, context: InputContext) -> KeyOutcome {
        if context == InputContext::TextField {
            return KeyOutcome::Ignored;
        }
        if input.is_undo() {
            return changed_or_handled(self.undo());
        }
        if input.is_redo() {
            return changed_or_handled(self.redo());
        }
        if input.modifiers.contains(Modifiers::PRIMARY) {
            return match input.key {
                Key::Right => {
                    self.set_expanded(self.focus, true);
                    KeyOutcome::Handled
                }
                Key::Left => {
                    self.set_expanded(self.focus, false);
                    KeyOutcome::Handled
                }
                _ => KeyOutcome::Ignored,
            };
        }

        match input.key {
            Key::Enter => {
                self.add_after(self.focus);
                KeyOutcome::ContentChanged
            }
            Key::Backspace => self.backspace(),
            Key::Delete => self.delete_forward(),
            Key::Tab if input.modifiers.contains(Modifiers::SHIFT) => {
                changed_or_handled(self.outdent(self.focus))
            }
            Key::Tab => changed_or_handled(self.indent(self.focus)),
            Key::BackTab => changed_or_handled(self.outdent(self.focus)),
            Key::Up => {
                self.focus_previous();
                KeyOutcome::Handled
            }
            Key::Down => {
                self.focus_next();
                KeyOutcome::Handled
            }
            Key::Left => {
                let text = self.focused_text();
                self.cursor = prev_grapheme_boundary(text, self.cursor);
                KeyOutcome::Handled
            }
            Key::Right => {
                let text = self.focused_text();
                self.cursor = next_grapheme_boundary(text, self.cursor);
                KeyOutcome::Handled
            }
            Key::Home => {
                self.cursor = 0;
                KeyOutcome::Handled
            }
            Key::End => {
                self.cursor = self.focused_text().len();
                KeyOutcome::Handled
            }
            Key::Char(_) => match input.printable() {
                Some(ch) => self.insert_char(ch),
                None => KeyOutcome::Ignored,
            },
            Key::Esc => KeyOutcome::Ignored,
        }
    }

    pub fn add_after(&mut self, index: usize) -> usize {
        let mut inserted = 0;
        self.structural(|doc, _| {
            inserted = mutation::insert_after(doc, Some(index));
            true
        });
        self.set_focus(inserted);
        inserted
    }

    pub fn indent(&mut self, index: usize) -> bool {
        let changed = self.structural(|doc, expansion| mutation::indent(doc, index, expansion));
        if changed {
            self.normalize_focus();
        }
        changed
    }

    pub fn outdent(&mut self, index: usize) -> bool {
        let changed = self.structural(|doc, _| mutation::outdent(doc, index));
        if changed {
            self.normalize_focus();
        }
        changed
    }

    /// Removes an item. The last remaining item is kept so the document is
    /// never empty.
    pub fn delete(&mut self, index: usize) -> bool {
        if self.document.len() <= 1 || index >= self.document.len() {
            return false;
        }
        let mut focus = None;
        self.structural(|doc, _| match mutation::delete_item(doc, index) {
            Some(deleted) => {
                focus = deleted.focus;
                true
            }
            None => false,
        });
        self.expansion.retain_existing(&self.document);
        let target = focus.unwrap_or_else(|| index.min(self.document.len() - 1));
        self.set_focus(target);
        self.cursor = self.focused_text().len();
        true
    }

    pub fn set_text(&mut self, index: usize, text: &str) -> bool {
        let changed = mutation::update_text(&mut self.document, index, text);
        if changed && index == self.focus {
            self.cursor = clamp_to_boundary(self.focused_text(), self.cursor);
        }
        changed
    }

    pub fn undo(&mut self) -> bool {
        let changed = self.history.undo(&mut self.document);
        if changed {
            self.normalize_focus();
        }
        changed
    }

    pub fn redo(&mut self) -> bool {
        let changed = self.history.redo(&mut self.document);
        if changed {
            self.normalize_focus();
        }
        changed
    }

    /// Flips an item's expansion. Not a content change: no history, no save.
    pub fn toggle_expanded(&mut self, index: usize) -> bool {
        let Some(id) = self.document.get(index).map(|item| item.id) else {
            return false;
        };
        let expanded = self.expansion.toggle(id);
        self.normalize_focus();
        expanded
    }

    pub fn set_expanded(&mut self, index: usize, expanded: bool) {
        if self.is_expanded(index) != expanded {
            self.toggle_expanded(index);
        }
    }

    pub fn set_focus(&mut self, index: usize) {
        if self.document.is_empty() {
            self.focus = 0;
            self.cursor = 0;
            return;
        }
        self.focus = index.min(self.document.len() - 1);
        self.cursor = clamp_to_boundary(self.focused_text(), self.cursor);
        self.normalize_focus();
    }

    pub fn focus_previous(&mut self) -> bool {
        match visibility::previous_visible(&self.document, self.focus, &self.expansion) {
            Some(target) => {
                self.move_focus_keeping_column(target);
                true
            }
            None => false,
        }
    }

    pub fn focus_next(&mut self) -> bool {
        match visibility::next_visible(&self.document, self.focus, &self.expansion) {
            Some(target) => {
                self.move_focus_keeping_column(target);
                true
            }
            None => false,
        }
    }

    fn structural<F>(&mut self, edit: F) -> bool
    where
        F: FnOnce(&mut OutlineDocument, &mut ExpansionState) -> bool,
    {
        let before = self.document.clone();
        let changed = edit(&mut self.document, &mut self.expansion);
        if changed {
            self.history.push(before);
        }
        changed
    }

    fn backspace(&mut self) -> KeyOutcome {
        if self.focused_text().is_empty() {
            return changed_or_handled(self.delete(self.focus));
        }
        if self.cursor == 0 {
            return KeyOutcome::Handled;
        }
        let mut text = self.focused_text().to_string();
        let prev = prev_grapheme_boundary(&text, self.cursor);
        text.drain(prev..self.cursor);
        self.cursor = prev;
        changed_or_handled(mutation::update_text(&mut self.document, self.focus, &text))
    }

    fn delete_forward(&mut self) -> KeyOutcome {
        let mut text = self.focused_text().to_string();
        let next = next_grapheme_boundary(&text, self.cursor);
        if next == self.cursor {
            return KeyOutcome::Handled;
        }
        text.drain(self.cursor..next);
        changed_or_handled(mutation::update_text(&mut self.document, self.focus, &text))
    }

    fn insert_char(&mut self, ch: char) -> KeyOutcome {
        if ch == '\n' || ch == '\r' {
            return KeyOutcome::Ignored;
        }
        let mut text = self.focused_text().to_string();
        text.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
        changed_or_handled(mutation::update_text(&mut self.document, self.focus, &text))
    }

    fn focused_text(&self) -> &str {
        self.document
            .get(self.focus)
            .map(|item| item.text.as_str())
            .unwrap_or("")
    }

    fn move_focus_keeping_column(&mut self, target: usize) {
        let column = self.focused_text()[..self.cursor].graphemes(true).count();
        self.focus = target;
        self.cursor = position_for_column(self.focused_text(), column);
    }

    /// Keeps focus on an existing, visible item after the document or the
    /// expansion state changed underneath it.
    fn normalize_focus(&mut self) {
        if self.document.is_empty() {
            self.focus = 0;
            self.cursor = 0;
            return;
        }
        self.focus = self.focus.min(self.document.len() - 1);
        if !visibility::is_visible(&self.document, self.focus, &self.expansion) {
            self.focus = visibility::previous_visible(&self.document, self.focus, &self.expansion)
                .unwrap_or(0);
        }
        self.cursor = clamp_to_boundary(self.focused_text(), self.cursor);
    }
}

fn changed_or_handled(changed: bool) -> KeyOutcome {
    if changed {
        KeyOutcome::ContentChanged
    } else {
        KeyOutcome::Handled
    }
}

fn prev_grapheme_boundary(text: &str, cursor: usize) -> usize {
    if cursor == 0 {
        return 0;
    }
    let mut last = 0;
    for (idx, _) in text[..cursor].grapheme_indices(true) {
        last = idx;
    }
    last
}

fn next_grapheme_boundary(text: &str, cursor: usize) -> usize {
    if cursor >= text.len() {
        return text.len();
    }
    text[cursor..]
        .graphemes(true)
        .next()
        .map(|grapheme| cursor + grapheme.len())
        .unwrap_or(text.len())
}

fn clamp_to_boundary(text: &str, cursor: usize) -> usize {
    if cursor >= text.len() {
        return text.len();
    }
    let mut boundary = 0;
    for (idx, _) in text.grapheme_indices(true) {
        if idx > cursor {
            break;
        }
        boundary = idx;
    }
    boundary
}

fn position_for_column(text: &str, column: usize) -> usize {
    text.grapheme_indices(true)
        .nth(column)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::MAX_LEVEL;

    fn session(content: &str) -> OutlineSession {
        OutlineSession::open(1, content, DecodePolicy::DropUnmatched, 50)
    }

    fn key(key: Key) -> KeyInput {
        KeyInput::plain(key)
    }

    fn type_text(session: &mut OutlineSession, text: &str) {
        for ch in text.chars() {
            session.handle_key(key(Key::Char(ch)), InputContext::OutlineItem);
        }
    }

    #[test]
    fn blank_file_opens_with_one_empty_item() {
        let session = session("");
        assert_eq!(session.document().shape(), vec![(0, "")]);
        assert_eq!(session.focus(), 0);
        assert_eq!(session.encoded(), "• ");
    }

    #[test]
    fn enter_inserts_and_focuses_new_item() {
        let mut session = session("");
        let outcome = session.handle_key(key(Key::Enter), InputContext::OutlineItem);
        assert_eq!(outcome, KeyOutcome::ContentChanged);
        assert_eq!(session.document().shape(), vec![(0, ""), (0, "")]);
        assert_eq!(session.focus(), 1);
    }

    #[test]
    fn typing_edits_focused_line_without_history() {
        let mut session = session("• a");
        session.handle_key(key(Key::End), InputContext::OutlineItem);
        type_text(&mut session, "bc");
        assert_eq!(session.document().shape(), vec![(0, "abc")]);
        assert!(!session.history().can_undo());

        let outcome = session.handle_key(KeyInput::primary('z'), InputContext::OutlineItem);
        assert_eq!(outcome, KeyOutcome::Handled);
        assert_eq!(session.document().shape(), vec![(0, "abc")]);
    }

    #[test]
    fn backspace_on_empty_line_deletes_and_focuses_previous() {
        let mut session = session("• a\n• b");
        session.handle_key(key(Key::Down), InputContext::OutlineItem);
        session.handle_key(key(Key::Enter), InputContext::OutlineItem);
        assert_eq!(session.focus(), 2);

        let outcome = session.handle_key(key(Key::Backspace), InputContext::OutlineItem);
        assert_eq!(outcome, KeyOutcome::ContentChanged);
        assert_eq!(session.document().shape(), vec![(0, "a"), (0, "b")]);
        assert_eq!(session.focus(), 1);
        assert_eq!(session.cursor(), 1);
    }

    #[test]
    fn backspace_never_empties_the_document() {
        let mut session = session("");
        let outcome = session.handle_key(key(Key::Backspace), InputContext::OutlineItem);
        assert_eq!(outcome, KeyOutcome::Handled);
        assert_eq!(session.document().len(), 1);
    }

    #[test]
    fn backspace_removes_whole_graphemes() {
        let mut session = session("• e\u{301}x");
        session.handle_key(key(Key::End), InputContext::OutlineItem);
        session.handle_key(key(Key::Left), InputContext::OutlineItem);
        session.handle_key(key(Key::Backspace), InputContext::OutlineItem);
        assert_eq!(session.document().shape(), vec![(0, "x")]);
        assert_eq!(session.cursor(), 0);
    }

    #[test]
    fn tab_and_shift_tab_change_levels_within_bounds() {
        let mut session = session("• a\n• b");
        session.set_focus(1);
        for _ in 0..10 {
            session.handle_key(key(Key::Tab), InputContext::OutlineItem);
        }
        assert_eq!(session.document().level_at(1), Some(MAX_LEVEL));
        assert_eq!(session.history().undo_depth(), MAX_LEVEL as usize);
        assert_eq!(session.focus(), 1, "indented item stays visible and focused");

        for _ in 0..10 {
            session.handle_key(
                KeyInput::new(Key::Tab, Modifiers::SHIFT),
                InputContext::OutlineItem,
            );
        }
        assert_eq!(session.document().level_at(1), Some(0));
    }

    #[test]
    fn arrows_skip_collapsed_children() {
        let mut session = session("• a\n  • hidden\n• b");
        assert_eq!(session.visible_indices(), vec![0, 2]);
        session.handle_key(key(Key::Down), InputContext::OutlineItem);
        assert_eq!(session.focus(), 2);

        session.handle_key(KeyInput::new(Key::Right, Modifiers::PRIMARY), InputContext::OutlineItem);
        session.handle_key(key(Key::Up), InputContext::OutlineItem);
        assert_eq!(session.focus(), 0);
        session.toggle_expanded(0);
        session.handle_key(key(Key::Down), InputContext::OutlineItem);
        assert_eq!(session.focus(), 1);
    }

    #[test]
    fn collapsing_parent_moves_focus_off_hidden_child() {
        let mut session = session("• a\n  • child");
        session.toggle_expanded(0);
        session.set_focus(1);
        assert_eq!(session.focus(), 1);
        session.toggle_expanded(0);
        assert_eq!(session.focus(), 0);
        assert!(!session.history().can_undo());
    }

    #[test]
    fn arrows_keep_column() {
        let mut session = session("• abcdef\n• xy\n• 123456");
        session.handle_key(key(Key::End), InputContext::OutlineItem);
        session.handle_key(key(Key::Left), InputContext::OutlineItem);
        session.handle_key(key(Key::Down), InputContext::OutlineItem);
        assert_eq!(session.cursor(), 2);
        session.handle_key(key(Key::Down), InputContext::OutlineItem);
        assert_eq!(session.cursor(), 2);
    }

    #[test]
    fn undo_redo_restore_structure() {
        let mut session = session("• a\n• b");
        let start = session.document().clone();
        session.set_focus(1);
        session.handle_key(key(Key::Tab), InputContext::OutlineItem);
        session.handle_key(key(Key::Enter), InputContext::OutlineItem);
        let end = session.document().clone();

        let undo = KeyInput::primary('z');
        assert!(session.handle_key(undo, InputContext::OutlineItem).content_changed());
        assert!(session.handle_key(undo, InputContext::OutlineItem).content_changed());
        assert!(session.document().content_eq(&start));

        let redo = KeyInput::new(Key::Char('z'), Modifiers::PRIMARY | Modifiers::SHIFT);
        session.handle_key(redo, InputContext::OutlineItem);
        session.handle_key(KeyInput::primary('y'), InputContext::OutlineItem);
        assert!(session.document().content_eq(&end));
    }

    #[test]
    fn text_fields_are_left_alone() {
        let mut session = session("• a\n• b");
        session.set_focus(1);
        session.handle_key(key(Key::Tab), InputContext::OutlineItem);
        let outcome = session.handle_key(KeyInput::primary('z'), InputContext::TextField);
        assert_eq!(outcome, KeyOutcome::Ignored);
        assert_eq!(session.document().level_at(1), Some(1));
    }

    #[test]
    fn delete_scenario_reparents_following_sibling() {
        let mut session = session("• A\n  • B\n  • C");
        assert!(session.delete(1));
        assert_eq!(session.document().shape(), vec![(0, "A"), (1, "C")]);
    }

    #[test]
    fn restored_expansion_maps_onto_positions() {
        let mut session = session("• a\n  • b\n    • c");
        session.restore_expansion(&[0, 1]);
        assert_eq!(session.visible_indices(), vec![0, 1, 2]);
        assert_eq!(session.expansion().to_indices(session.document()), vec![0, 1]);
    }
}
