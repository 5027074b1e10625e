//! Configuration for the ytm session core.
//!
//! Two kinds of configuration live here:
//! - per-backend [`AppConfig`] / [`AuthConfig`], persisted with each account
//! - local [`ClientSettings`] loaded from `settings.yaml` in the config dir

pub mod discovery;
pub mod error;
pub mod settings;
pub mod types;

pub use discovery::{
    config_dir, load_settings, load_settings_from, save_settings, save_settings_to, settings_path,
};
pub use error::{ConfigError, Result};
pub use settings::ClientSettings;
pub use types::{AppConfig, AuthConfig, remove_trailing_slash};
