//! School configuration loading from config.toml
//!
//! The classes and terms listed in config.toml seed the database on first
//! run. The optional `[sync]` table configures the remote document store.

use super::sync::SyncConfig;
use crate::errors::{Error, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Classes to seed
    #[serde(default)]
    pub classes: Vec<ClassConfig>,
    /// Terms to seed
    #[serde(default)]
    pub terms: Vec<TermConfig>,
    /// Remote sync settings
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Configuration for a single class
#[derive(Debug, Deserialize, Clone)]
pub struct ClassConfig {
    /// Display code
    pub code: String,
    /// Year-group label
    pub year_group: String,
    /// Enrolled male students
    pub male: u32,
    /// Enrolled female students
    pub female: u32,
}

/// Configuration for a single term
#[derive(Debug, Deserialize, Clone)]
pub struct TermConfig {
    /// Display name
    pub name: String,
    /// First day, `YYYY-MM-DD`
    pub start_date: NaiveDate,
    /// Last day, `YYYY-MM-DD`
    pub end_date: NaiveDate,
    /// Number of teaching weeks
    pub weeks: u32,
    /// Whether this is the current term
    #[serde(default)]
    pub active: bool,
}

/// Loads school configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path_ref.display()),
    })
}

/// Configuration file read when no path is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Loads school configuration from the default location (./config.toml)
pub fn load_default_config() -> Result<AppConfig> {
    load_config(DEFAULT_CONFIG_PATH)
}
