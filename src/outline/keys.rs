//! Logical keyboard surface of the outline editor, independent of the
//! terminal backend.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        /// Ctrl on most platforms, Cmd/Super on macOS.
        const PRIMARY = 0b0010;
        const ALT = 0b0100;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Delete,
    Tab,
    BackTab,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Esc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyInput {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    pub fn plain(key: Key) -> Self {
        Self::new(key, Modifiers::empty())
    }

    pub fn primary(ch: char) -> Self {
        Self::new(Key::Char(ch), Modifiers::PRIMARY)
    }

    pub fn is_undo(&self) -> bool {
        self.modifiers.contains(Modifiers::PRIMARY)
            && !self.modifiers.contains(Modifiers::SHIFT)
            && matches!(self.key, Key::Char('z'))
    }

    pub fn is_redo(&self) -> bool {
        if !self.modifiers.contains(Modifiers::PRIMARY) {
            return false;
        }
        match self.key {
            Key::Char('y') => true,
            Key::Char('Z') => true,
            Key::Char('z') => self.modifiers.contains(Modifiers::SHIFT),
            _ => false,
        }
    }

    /// A character that should be typed into the focused line.
    pub fn printable(&self) -> Option<char> {
        match self.key {
            Key::Char(ch)
                if !self
                    .modifiers
                    .intersects(Modifiers::PRIMARY | Modifiers::ALT) =>
            {
                Some(ch)
            }
            _ => None,
        }
    }
}

/// Where a key event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputContext {
    /// One of the outline's own item lines.
    OutlineItem,
    /// A plain text field (prompt, rename box) with its own editing semantics;
    /// structural undo/redo must not be intercepted there.
    TextField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    /// Handled without touching document content (navigation, expansion).
    Handled,
    /// Document content changed; the caller should notify autosave.
    ContentChanged,
}

impl KeyOutcome {
    pub fn is_handled(self) -> bool {
        !matches!(self, KeyOutcome::Ignored)
    }

    pub fn content_changed(self) -> bool {
        matches!(self, KeyOutcome::ContentChanged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redo_accepts_y_and_shift_z() {
        assert!(KeyInput::primary('y').is_redo());
        assert!(KeyInput::new(Key::Char('z'), Modifiers::PRIMARY | Modifiers::SHIFT).is_redo());
        assert!(KeyInput::new(Key::Char('Z'), Modifiers::PRIMARY | Modifiers::SHIFT).is_redo());
        assert!(!KeyInput::primary('z').is_redo());
    }

    #[test]
    fn undo_requires_primary_without_shift() {
        assert!(KeyInput::primary('z').is_undo());
        assert!(!KeyInput::plain(Key::Char('z')).is_undo());
        assert!(!KeyInput::new(Key::Char('z'), Modifiers::PRIMARY | Modifiers::SHIFT).is_undo());
    }

    #[test]
    fn shifted_characters_are_printable() {
        let input = KeyInput::new(Key::Char('A'), Modifiers::SHIFT);
        assert_eq!(input.printable(), Some('A'));
        assert_eq!(KeyInput::primary('a').printable(), None);
    }
}
