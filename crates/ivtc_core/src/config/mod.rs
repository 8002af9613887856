//! TOML configuration for the `ivtc` tools.
//!
//! Sections: `[paths]`, `[logging]`, `[wibbly]` and `[replay]`. Files are
//! written atomically and single sections can be rewritten in place.
//!
//! # Example
//!
//! ```no_run
//! use ivtc_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new("ivtc.toml");
//! config.load_or_create().unwrap();
//!
//! config.settings_mut().replay.orphan_handling = "bn".into();
//! config.update_section(ConfigSection::Replay).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult, DEFAULT_CONFIG_FILE};
pub use settings::{ConfigSection, LoggingSettings, PathSettings, ReplaySettings, Settings};
