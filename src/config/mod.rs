use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

use crate::outline::history::DEFAULT_HISTORY_LIMIT;
use crate::outline::DecodePolicy;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "OutlineTui";
const APP_NAME: &str = "outlinetui";

pub const CONFIG_ENV: &str = "OUTLINETUI_CONFIG";
pub const DATA_ENV: &str = "OUTLINETUI_DATA";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths)?;
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let override_data = env::var(DATA_ENV).ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data
            .clone()
            .unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let state_dir = match (&override_data, project_dirs.state_dir()) {
            (None, Some(dir)) => dir.to_path_buf(),
            _ => data_root.join("state"),
        };

        Ok(Self::from_roots(config_dir, config_file, data_root, state_dir))
    }

    /// Lays every path out under a single directory.
    pub fn rooted_at(root: &Path) -> Self {
        let config_dir = root.join("config");
        let config_file = config_dir.join("config.toml");
        Self::from_roots(config_dir, config_file, root.join("data"), root.join("state"))
    }

    fn from_roots(
        config_dir: PathBuf,
        config_file: PathBuf,
        data_dir: PathBuf,
        state_dir: PathBuf,
    ) -> Self {
        let database_path = data_dir.join("outlines.db");
        Self {
            config_dir,
            config_file,
            data_dir,
            database_path,
            state_dir,
        }
    }

    pub fn expansion_dir(&self) -> PathBuf {
        self.state_dir.join("expansion")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.data_dir, &self.state_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub auto_save: AutoSaveConfig,
    pub outline: OutlineOptions,
    pub storage: StorageOptions,
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.storage
            .resolve(paths)
            .context("resolving storage paths")?;
        if !(0.0..=1.0).contains(&self.auto_save.simulated_failure_rate) {
            tracing::warn!(
                rate = self.auto_save.simulated_failure_rate,
                "simulated_failure_rate outside 0..=1, disabling"
            );
            self.auto_save.simulated_failure_rate = 0.0;
        }
        if self.outline.history_limit == 0 {
            tracing::warn!("history_limit of 0 is not usable, falling back to default");
            self.outline.history_limit = DEFAULT_HISTORY_LIMIT;
        }
        Ok(())
    }
}

/// Debounce policy for outline autosave. Inputs closer together than
/// `rapid_window` count as a burst and push the flush further out.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveConfig {
    pub enabled: bool,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "base_delay_ms")]
    pub base_delay: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "burst_delay_ms")]
    pub burst_delay: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "sustained_delay_ms")]
    pub sustained_delay: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "rapid_window_ms")]
    pub rapid_window: Duration,
    pub burst_threshold: u32,
    pub sustained_threshold: u32,
    /// Fraction of saves the worker fails on purpose (0 = never).
    pub simulated_failure_rate: f64,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_delay: Duration::from_millis(1000),
            burst_delay: Duration::from_millis(2000),
            sustained_delay: Duration::from_millis(3000),
            rapid_window: Duration::from_millis(500),
            burst_threshold: 5,
            sustained_threshold: 10,
            simulated_failure_rate: 0.0,
        }
    }
}

impl AutoSaveConfig {
    /// Delay before flushing, given how many rapid inputs preceded this one.
    pub fn delay_for(&self, rapid_inputs: u32) -> Duration {
        if rapid_inputs > self.sustained_threshold {
            self.sustained_delay
        } else if rapid_inputs > self.burst_threshold {
            self.burst_delay
        } else {
            self.base_delay
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineOptions {
    pub history_limit: usize,
    pub preserve_unmatched_lines: bool,
    pub persist_expansion: bool,
}

impl Default for OutlineOptions {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            preserve_unmatched_lines: false,
            persist_expansion: true,
        }
    }
}

impl OutlineOptions {
    pub fn decode_policy(&self) -> DecodePolicy {
        if self.preserve_unmatched_lines {
            DecodePolicy::PreserveAsText
        } else {
            DecodePolicy::DropUnmatched
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub database_path: PathBuf,
    pub wal_autocheckpoint: u32,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database_path: PathBuf::new(),
            wal_autocheckpoint: 1000,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            self.database_path = paths.database_path.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_load_writes_defaults() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::with_paths(ConfigPaths::rooted_at(temp.path()));
        let cfg = loader.load_or_init()?;
        assert!(loader.paths().config_file.exists());
        assert_eq!(cfg.auto_save, AutoSaveConfig::default());
        assert_eq!(cfg.storage.database_path, loader.paths().database_path);

        let raw = fs::read_to_string(&loader.paths().config_file)?;
        assert!(raw.contains("base_delay_ms = 1000"));
        Ok(())
    }

    #[test]
    fn partial_file_keeps_other_defaults() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted_at(temp.path());
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "[auto_save]\nbase_delay_ms = 250\nsimulated_failure_rate = 4.0\n\n[outline]\npreserve_unmatched_lines = true\nhistory_limit = 0\n",
        )?;
        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.auto_save.base_delay, Duration::from_millis(250));
        assert_eq!(cfg.auto_save.burst_delay, Duration::from_millis(2000));
        assert_eq!(cfg.auto_save.simulated_failure_rate, 0.0);
        assert_eq!(cfg.outline.decode_policy(), DecodePolicy::PreserveAsText);
        assert_eq!(cfg.outline.history_limit, DEFAULT_HISTORY_LIMIT);
        Ok(())
    }

    #[test]
    fn delay_escalates_with_rapid_inputs() {
        let cfg = AutoSaveConfig::default();
        assert_eq!(cfg.delay_for(0), Duration::from_millis(1000));
        assert_eq!(cfg.delay_for(5), Duration::from_millis(1000));
        assert_eq!(cfg.delay_for(6), Duration::from_millis(2000));
        assert_eq!(cfg.delay_for(10), Duration::from_millis(2000));
        assert_eq!(cfg.delay_for(11), Duration::from_millis(3000));
    }
}
