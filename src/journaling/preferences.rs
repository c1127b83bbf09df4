use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const PREF_EXTENSION: &str = "json";
const PREF_TMP_EXTENSION: &str = "json.tmp";

#[derive(Debug, Default, Serialize, Deserialize)]
struct ExpansionRecord {
    file_id: i64,
    expanded: Vec<usize>,
}

/// Per-file record of which outline rows were expanded, keyed by row index.
#[derive(Debug, Clone)]
pub struct ExpansionPreferences {
    dir: PathBuf,
}

impl ExpansionPreferences {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Missing or unreadable preferences mean nothing is expanded.
    pub fn load(&self, file_id: i64) -> Vec<usize> {
        let path = self.path_for(file_id);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                tracing::warn!(?err, "reading expansion preferences {}", path.display());
                return Vec::new();
            }
        };
        match serde_json::from_slice::<ExpansionRecord>(&raw) {
            Ok(record) => record.expanded,
            Err(err) => {
                tracing::warn!(?err, "ignoring corrupt expansion preferences {}", path.display());
                Vec::new()
            }
        }
    }

    pub fn store(&self, file_id: i64, expanded: &[usize]) -> Result<()> {
        let final_path = self.path_for(file_id);
        if expanded.is_empty() {
            return remove_path(&final_path);
        }
        let record = ExpansionRecord {
            file_id,
            expanded: expanded.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&record).context("serialising expansion preferences")?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("ensuring preferences dir {}", self.dir.display()))?;
        let tmp_path = final_path.with_extension(PREF_TMP_EXTENSION);
        fs::write(&tmp_path, &json)
            .with_context(|| format!("writing temporary preferences {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &final_path).with_context(|| {
            format!("atomically persisting preferences {}", final_path.display())
        })?;
        Ok(())
    }

    fn path_for(&self, file_id: i64) -> PathBuf {
        self.dir.join(format!("file-{file_id}.{PREF_EXTENSION}"))
    }
}

fn remove_path(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("removing preferences {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn stores_and_reloads_indices() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let prefs = ExpansionPreferences::new(temp.path().join("expansion"));
        assert!(prefs.load(3).is_empty());

        prefs.store(3, &[0, 4])?;
        assert_eq!(prefs.load(3), vec![0, 4]);
        assert!(prefs.dir().join("file-3.json").exists());
        assert!(!prefs.dir().join("file-3.json.tmp").exists());

        prefs.store(3, &[])?;
        assert!(!prefs.dir().join("file-3.json").exists());
        Ok(())
    }

    #[test]
    fn corrupt_file_reads_as_nothing_expanded() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let prefs = ExpansionPreferences::new(temp.path().to_path_buf());
        fs::write(temp.path().join("file-9.json"), b"{not json")?;
        assert!(prefs.load(9).is_empty());
        Ok(())
    }
}
