use super::OutlineDocument;

pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Undo/redo stacks of whole-document snapshots taken before structural edits.
#[derive(Debug, Clone)]
pub struct History {
    undo: Vec<OutlineDocument>,
    redo: Vec<OutlineDocument>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Snapshots `current` ahead of a structural edit.
    pub fn record(&mut self, current: &OutlineDocument) {
        self.push(current.clone());
    }

    pub fn push(&mut self, snapshot: OutlineDocument) {
        self.redo.clear();
        self.undo.push(snapshot);
        trim_stack(&mut self.undo, self.limit);
    }

    pub fn undo(&mut self, current: &mut OutlineDocument) -> bool {
        let Some(previous) = self.undo.pop() else {
            return false;
        };
        self.redo.push(std::mem::replace(current, previous));
        trim_stack(&mut self.redo, self.limit);
        true
    }

    pub fn redo(&mut self, current: &mut OutlineDocument) -> bool {
        let Some(next) = self.redo.pop() else {
            return false;
        };
        self.undo.push(std::mem::replace(current, next));
        trim_stack(&mut self.undo, self.limit);
        true
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }
}

fn trim_stack(stack: &mut Vec<OutlineDocument>, limit: usize) {
    if stack.len() > limit {
        let overflow = stack.len() - limit;
        stack.drain(0..overflow);
    }
}
