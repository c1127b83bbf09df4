use parking_lot::Mutex;
use time::OffsetDateTime;

use super::{FileRecord, FileStore, StoreError, StoreResult};

/// Process-local store. Can be told to fail saves, which the workspace tests
/// use to drive the failed status.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    files: Vec<FileRecord>,
    next_id: i64,
    fail_saves: bool,
    saves: Vec<(i64, String)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.inner.lock().fail_saves = fail;
    }

    /// Every successful save in order, as `(file_id, content)`.
    pub fn save_log(&self) -> Vec<(i64, String)> {
        self.inner.lock().saves.clone()
    }
}

impl FileStore for MemoryStore {
    fn create_file(&self, name: &str, content: &str) -> StoreResult<i64> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(StoreError::EmptyName);
        }
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        inner.files.push(FileRecord {
            id,
            name: trimmed.to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    fn list_files(&self) -> StoreResult<Vec<FileRecord>> {
        Ok(self.inner.lock().files.clone())
    }

    fn load_content(&self, file_id: i64) -> StoreResult<String> {
        self.inner
            .lock()
            .files
            .iter()
            .find(|file| file.id == file_id)
            .map(|file| file.content.clone())
            .ok_or(StoreError::NotFound(file_id))
    }

    fn save_content(&self, file_id: i64, content: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.fail_saves {
            return Err(StoreError::Io {
                path: format!("memory://{file_id}").into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "store unavailable"),
            });
        }
        let file = inner
            .files
            .iter_mut()
            .find(|file| file.id == file_id)
            .ok_or(StoreError::NotFound(file_id))?;
        file.content = content.to_string();
        file.updated_at = OffsetDateTime::now_utc().unix_timestamp();
        inner.saves.push((file_id, content.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn round_trips_content_and_logs_saves() {
        let store = MemoryStore::new();
        let id = store.create_file("a", "• x").expect("create");
        store.save_content(id, "• y").expect("save");
        assert_eq!(store.load_content(id).expect("load"), "• y");
        assert_eq!(store.save_log(), vec![(id, "• y".to_string())]);
    }

    #[test]
    fn failing_mode_rejects_saves() {
        let store = MemoryStore::new();
        let id = store.create_file("a", "").expect("create");
        store.set_fail_saves(true);
        assert_matches!(store.save_content(id, "• y"), Err(StoreError::Io { .. }));
        assert_eq!(store.load_content(id).expect("load"), "");
    }
}
