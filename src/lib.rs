pub mod app;
pub mod cli;
pub mod config;
pub mod journaling;
pub mod outline;
pub mod storage;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
