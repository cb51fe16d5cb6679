mod config;
pub mod database;
mod store;

pub use config::{Config, DisplayConfig, LogConfig, StorageConfig, WatchConfig};
pub use database::Database;
pub use store::{MemoryStore, StateStore};

use std::path::PathBuf;

use crate::clock::{RipenessClock, SystemTimeSource};
use crate::error::{Result, StoreError};
use crate::events::Event;

/// Clock persisted in the on-disk database and driven by the system clock.
pub type PersistentClock = RipenessClock<Database, SystemTimeSource>;

/// Open the on-disk store and restore the clock saved under the configured key.
///
/// # Errors
/// Returns an error only if the database itself cannot be opened; unreadable
/// state falls back to defaults.
pub fn open_clock(config: &Config) -> Result<(PersistentClock, Option<Event>)> {
    let db = Database::open()?;
    Ok(RipenessClock::load(
        db,
        SystemTimeSource,
        config.storage.state_key.clone(),
    ))
}

/// Returns `~/.config/banana-timer[-dev]/` based on BANANA_TIMER_ENV.
///
/// Set BANANA_TIMER_ENV=dev to use the development data directory, or
/// BANANA_TIMER_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    let dir = match std::env::var_os("BANANA_TIMER_DATA_DIR") {
        Some(custom) => PathBuf::from(custom),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env =
                std::env::var("BANANA_TIMER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("banana-timer-dev")
            } else {
                base_dir.join("banana-timer")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|source| StoreError::DataDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
