//! Application service: configuration use-cases.

use crate::application::ports::ConfigStore;
use crate::domain::config::{TetherConfig, apply_config_value};
use anyhow::Result;

/// Load configuration.
pub fn load_config(store: &impl ConfigStore) -> Result<TetherConfig> {
    store.load()
}

/// Save configuration.
pub fn save_config(store: &impl ConfigStore, config: &TetherConfig) -> Result<()> {
    store.save(config)
}

/// Validate and persist a single `key = value` setting.
pub fn set_value(store: &impl ConfigStore, key: &str, value: &str) -> Result<TetherConfig> {
    let mut config = store.load()?;
    apply_config_value(&mut config, key, value)?;
    store.save(&config)?;
    Ok(config)
}
