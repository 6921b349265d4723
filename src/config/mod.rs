/// Database configuration and connection management
pub mod database;

/// Class, term and sync settings loaded from config.toml
pub mod school;

/// Remote sync settings resolved from config.toml and the environment
pub mod sync;

pub use school::{
    AppConfig, ClassConfig, DEFAULT_CONFIG_PATH, TermConfig, load_config, load_default_config,
};
pub use sync::SyncConfig;
