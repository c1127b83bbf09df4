use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use time::OffsetDateTime;

use crate::config::{ConfigPaths, StorageOptions};

mod memory;
mod schema;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file {0} not found")]
    NotFound(i64),
    #[error("file name cannot be empty")]
    EmptyName,
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: i64,
    pub name: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Where outline files live. Shared with the save worker thread.
pub trait FileStore: Send + Sync {
    fn create_file(&self, name: &str, content: &str) -> StoreResult<i64>;
    fn list_files(&self) -> StoreResult<Vec<FileRecord>>;
    fn load_content(&self, file_id: i64) -> StoreResult<String>;
    fn save_content(&self, file_id: i64, content: &str) -> StoreResult<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct WalCheckpointStats {
    pub busy_frames: i64,
    pub wal_frames: i64,
    pub checkpointed_frames: i64,
}

#[derive(Debug, Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn connect(&self) -> StoreResult<Connection> {
        let conn = Connection::open(&*self.db_path)?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub fn run_wal_health_check(&self) -> StoreResult<WalCheckpointStats> {
        self.with_connection(|conn| {
            let stats = conn.query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |row| {
                Ok(WalCheckpointStats {
                    busy_frames: row.get(0)?,
                    wal_frames: row.get(1)?,
                    checkpointed_frames: row.get(2)?,
                })
            })?;
            Ok(stats)
        })
    }

    pub fn fetch_file(&self, file_id: i64) -> StoreResult<Option<FileRecord>> {
        self.with_connection(|conn| {
            let record = conn
                .query_row(
                    "SELECT id, name, content, created_at, updated_at
                     FROM files WHERE id = ?1",
                    params![file_id],
                    map_record,
                )
                .optional()?;
            Ok(record)
        })
    }
}

impl FileStore for StorageHandle {
    fn create_file(&self, name: &str, content: &str) -> StoreResult<i64> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(StoreError::EmptyName);
        }
        self.with_connection(|conn| {
            let now = OffsetDateTime::now_utc().unix_timestamp();
            conn.execute(
                "INSERT INTO files (name, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![trimmed, content, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn list_files(&self) -> StoreResult<Vec<FileRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, content, created_at, updated_at
                 FROM files ORDER BY updated_at DESC, id DESC",
            )?;
            let rows = stmt.query_map([], map_record)?;
            let mut files = Vec::new();
            for row in rows {
                files.push(row?);
            }
            Ok(files)
        })
    }

    fn load_content(&self, file_id: i64) -> StoreResult<String> {
        self.fetch_file(file_id)?
            .map(|record| record.content)
            .ok_or(StoreError::NotFound(file_id))
    }

    fn save_content(&self, file_id: i64, content: &str) -> StoreResult<()> {
        self.with_connection(|conn| {
            let updated = conn.execute(
                "UPDATE files SET content = ?1 WHERE id = ?2",
                params![content, file_id],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(file_id));
            }
            Ok(())
        })
    }
}

fn map_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> StoreResult<StorageHandle> {
    let db_path = if storage.database_path.as_os_str().is_empty() {
        paths.database_path.clone()
    } else {
        storage.database_path.clone()
    };
    let existed = db_path.exists();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let conn = Connection::open(&db_path)?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    if !existed {
        seed_initial_files(&conn)?;
    }
    Ok(StorageHandle {
        db_path: Arc::new(db_path),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> StoreResult<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )?;
    Ok(())
}

fn seed_initial_files(conn: &Connection) -> StoreResult<()> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM files LIMIT 1", [], |row| row.get(0))
        .optional()?;
    if existing.is_some() {
        return Ok(());
    }

    tracing::info!("seeding first-run outline");
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let body = "• Welcome to Outline TUI\n  \
                • Enter adds a line, Tab and Shift+Tab change its level\n  \
                • Ctrl+Right and Ctrl+Left expand or collapse a line\n  \
                • Ctrl+Z undoes structural edits, Ctrl+Y redoes them\n\
                • Ctrl+S saves now; changes also save on their own";
    conn.execute(
        "INSERT INTO files (name, content, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)",
        params!["Welcome", body, now],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn init_storage() -> anyhow::Result<(TempDir, StorageHandle)> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(temp.path());
        paths.ensure_directories()?;
        let storage = init(&paths, &StorageOptions::default())?;
        Ok((temp, storage))
    }

    #[test]
    fn first_run_seeds_a_decodable_outline() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let files = storage.list_files()?;
        assert_eq!(files.len(), 1);
        let doc = crate::outline::decode(&files[0].content);
        assert_eq!(doc.len(), 5);
        assert_eq!(doc.level_at(1), Some(1));
        Ok(())
    }

    #[test]
    fn save_and_load_content() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let id = storage.create_file("  Plans  ", "• a")?;
        storage.save_content(id, "• a\n  • b")?;
        assert_eq!(storage.load_content(id)?, "• a\n  • b");
        let record = storage.fetch_file(id)?.expect("file present");
        assert_eq!(record.name, "Plans");
        Ok(())
    }

    #[test]
    fn missing_files_and_empty_names_are_typed_errors() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        assert_matches!(storage.load_content(999), Err(StoreError::NotFound(999)));
        assert_matches!(storage.save_content(999, "x"), Err(StoreError::NotFound(999)));
        assert_matches!(storage.create_file("   ", ""), Err(StoreError::EmptyName));
        Ok(())
    }

    #[test]
    fn wal_health_check_runs() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let stats = storage.run_wal_health_check()?;
        assert!(stats.wal_frames >= 0);
        Ok(())
    }
}
