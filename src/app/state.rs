use anyhow::Result;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::storage::{FileRecord, FileStore};

const NAME_LIMIT: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Files,
    Outline,
}

#[derive(Debug, Clone)]
pub struct FileSummary {
    pub id: i64,
    pub name: String,
    pub updated_at: String,
    pub preview: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewFileOverlay {
    pub name: String,
}

impl NewFileOverlay {
    pub fn push(&mut self, ch: char) {
        if self.name.chars().count() < NAME_LIMIT {
            self.name.push(ch);
        }
    }
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    NewFile(NewFileOverlay),
    Help,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub focus: FocusPane,
    pub selected: usize,
    pub preview_lines: usize,
    pub files: Vec<FileSummary>,
    pub status_message: Option<String>,
    pub overlay: Option<OverlayState>,
}

impl AppState {
    pub fn load(store: &dyn FileStore, preview_lines: usize) -> Result<Self> {
        let files = store
            .list_files()?
            .into_iter()
            .map(|record| summarize_record(record, preview_lines))
            .collect();
        Ok(Self {
            focus: FocusPane::Files,
            selected: 0,
            preview_lines,
            files,
            status_message: None,
            overlay: None,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn selected(&self) -> Option<&FileSummary> {
        self.files.get(self.selected)
    }

    pub fn selected_file_id(&self) -> Option<i64> {
        self.selected().map(|file| file.id)
    }

    pub fn select_file_by_id(&mut self, file_id: i64) {
        if let Some(idx) = self.files.iter().position(|file| file.id == file_id) {
            self.selected = idx;
        } else {
            self.normalize_selection();
        }
    }

    pub fn move_selection(&mut self, delta: isize) {
        if self.files.is_empty() {
            return;
        }
        let len = self.files.len() as isize;
        let next = (self.selected as isize + delta).clamp(0, len - 1);
        self.selected = next as usize;
    }

    pub fn refresh(&mut self, store: &dyn FileStore) -> Result<()> {
        let keep = self.selected_file_id();
        self.files = store
            .list_files()?
            .into_iter()
            .map(|record| summarize_record(record, self.preview_lines))
            .collect();
        match keep {
            Some(id) => self.select_file_by_id(id),
            None => self.normalize_selection(),
        }
        Ok(())
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            FocusPane::Files => FocusPane::Outline,
            FocusPane::Outline => FocusPane::Files,
        };
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn open_new_file(&mut self) {
        self.overlay = Some(OverlayState::NewFile(NewFileOverlay::default()));
    }

    pub fn new_file_overlay(&self) -> Option<&NewFileOverlay> {
        match &self.overlay {
            Some(OverlayState::NewFile(draft)) => Some(draft),
            _ => None,
        }
    }

    pub fn new_file_overlay_mut(&mut self) -> Option<&mut NewFileOverlay> {
        match &mut self.overlay {
            Some(OverlayState::NewFile(draft)) => Some(draft),
            _ => None,
        }
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    fn normalize_selection(&mut self) {
        if self.files.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.files.len() {
            self.selected = self.files.len() - 1;
        }
    }
}

fn summarize_record(record: FileRecord, preview_lines: usize) -> FileSummary {
    let FileRecord {
        id,
        name,
        content,
        updated_at,
        ..
    } = record;
    FileSummary {
        id,
        name,
        updated_at: format_timestamp(updated_at),
        preview: build_preview(&content, preview_lines),
    }
}

fn format_timestamp(epoch: i64) -> String {
    OffsetDateTime::from_unix_timestamp(epoch)
        .map(|dt| dt.format(&Rfc3339).unwrap_or_else(|_| epoch.to_string()))
        .unwrap_or_else(|_| epoch.to_string())
}

fn build_preview(body: &str, preview_lines: usize) -> String {
    if preview_lines == 0 {
        return String::new();
    }
    let mut lines = body.lines().filter(|line| !line.trim().is_empty());
    let mut collected = Vec::with_capacity(preview_lines);
    for _ in 0..preview_lines {
        match lines.next() {
            Some(line) => collected.push(line.trim()),
            None => break,
        }
    }
    let mut preview = collected.join(" ");
    if lines.next().is_some() {
        preview.push_str(" …");
    }
    preview
}
