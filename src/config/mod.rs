//! Configuration management for the marketplace process.

/// Seed catalog loading from config.toml
pub mod catalog;
/// Database configuration and connection management
pub mod database;

use crate::errors::Result;

/// Application configuration assembled by the process entry point.
///
/// The entry point owns the store lifecycle: it builds this configuration,
/// opens the connection, and passes both into the services. Nothing in this
/// crate keeps module-level connection state.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection URL
    pub database_url: String,
    /// Path to the seed catalog (config.toml)
    pub seed_config_path: String,
}

/// Loads the application configuration from the environment.
///
/// `DATABASE_URL` and `SEED_CONFIG` are read if present; both fall back to
/// local defaults so a fresh checkout runs without any setup.
pub fn load_app_configuration() -> Result<AppConfig> {
    Ok(AppConfig {
        database_url: database::get_database_url()?,
        seed_config_path: std::env::var("SEED_CONFIG").unwrap_or_else(|_| "config.toml".to_string()),
    })
}
