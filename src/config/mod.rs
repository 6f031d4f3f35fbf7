/// Database configuration and connection management
pub mod database;

/// Bot settings loading from config.toml
pub mod settings;

pub use settings::{AppConfig, load_app_configuration};
