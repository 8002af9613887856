//! Config manager for loading, saving, and atomic updates.
//!
//! - Atomic writes (temp file, then rename)
//! - Section-level updates that leave the other tables untouched
//! - Unknown tables are dropped on load
//! - Comments are attached with `toml_edit`

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::{DocumentMut, Item};

use super::settings::{ConfigSection, Settings};

/// File name used when no config path is given.
pub const DEFAULT_CONFIG_FILE: &str = "ivtc.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Failed to parse config for editing: {0}")]
    EditParseError(#[from] toml_edit::TomlError),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Owns the settings file and the settings loaded from it.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Does not touch the disk; call [`load`](Self::load) or
    /// [`load_or_create`](Self::load_or_create) afterwards.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Changes stay in memory until `save()` or `update_section()`.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Load config from file. Fails if the file doesn't exist.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }

        let content = fs::read_to_string(&self.config_path)?;
        self.settings = toml::from_str(&content)?;
        Ok(())
    }

    /// Load config from file, creating it with defaults if missing.
    ///
    /// A file with unknown tables or missing keys is rewritten in full.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path)?;
            let (settings, was_modified) = self.parse_validate_and_clean(&content)?;
            self.settings = settings;

            if was_modified {
                tracing::debug!(
                    "[Config] Normalising {}",
                    self.config_path.display()
                );
                self.save()?;
            }
        } else {
            tracing::info!(
                "[Config] Creating default config at {}",
                self.config_path.display()
            );
            self.settings = Settings::default();
            self.save()?;
        }
        Ok(())
    }

    /// Create the output, temp and logs directories.
    pub fn ensure_dirs_exist(&self) -> ConfigResult<()> {
        let paths = &self.settings.paths;
        for dir in [&paths.output_folder, &paths.temp_root, &paths.logs_folder] {
            fs::create_dir_all(self.resolve(dir))?;
        }
        Ok(())
    }

    pub fn output_folder(&self) -> PathBuf {
        self.resolve(&self.settings.paths.output_folder)
    }

    pub fn logs_folder(&self) -> PathBuf {
        self.resolve(&self.settings.paths.logs_folder)
    }

    /// Relative directories are taken relative to the config file.
    fn resolve(&self, dir: &str) -> PathBuf {
        let path = PathBuf::from(dir);
        if path.is_absolute() {
            return path;
        }
        match self.config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(path),
            _ => path,
        }
    }

    /// Returns the settings and whether the file needs rewriting.
    fn parse_validate_and_clean(&self, content: &str) -> ConfigResult<(Settings, bool)> {
        let doc: DocumentMut = content.parse()?;
        let settings: Settings = toml::from_str(content)?;

        let valid_sections: Vec<&str> = ConfigSection::ALL.iter().map(|s| s.table_name()).collect();
        let unknown: Vec<&str> = doc
            .iter()
            .map(|(key, _)| key)
            .filter(|key| !valid_sections.contains(key))
            .collect();
        if !unknown.is_empty() {
            tracing::warn!("[Config] Dropping unknown sections: {}", unknown.join(", "));
        }

        let missing_keys = toml::to_string_pretty(&settings)?
            .parse::<DocumentMut>()?
            .iter()
            .any(|(key, item)| !item_covers(doc.get(key), item));

        Ok((settings, !unknown.is_empty() || missing_keys))
    }

    /// Save the entire config atomically.
    pub fn save(&self) -> ConfigResult<()> {
        let content = self.generate_config_with_comments()?;
        self.atomic_write(&content)?;
        Ok(())
    }

    /// Rewrite one section, keeping the rest of the file as it is on disk.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        let current_content = if self.config_path.exists() {
            fs::read_to_string(&self.config_path)?
        } else {
            String::new()
        };

        let mut doc: DocumentMut = if current_content.is_empty() {
            DocumentMut::new()
        } else {
            current_content.parse()?
        };

        let section_toml = match section {
            ConfigSection::Paths => toml::to_string_pretty(&self.settings.paths)?,
            ConfigSection::Logging => toml::to_string_pretty(&self.settings.logging)?,
            ConfigSection::Wibbly => toml::to_string_pretty(&self.settings.wibbly)?,
            ConfigSection::Replay => toml::to_string_pretty(&self.settings.replay)?,
        };
        let section_doc: DocumentMut = section_toml.parse()?;
        let mut section_table = section_doc.as_table().clone();

        let table_name = section.table_name();
        if let Some(existing) = doc.get(table_name).and_then(Item::as_table) {
            *section_table.decor_mut() = existing.decor().clone();
        }
        doc[table_name] = Item::Table(section_table);

        self.atomic_write(&doc.to_string())?;
        Ok(())
    }

    fn generate_config_with_comments(&self) -> ConfigResult<String> {
        let mut doc: DocumentMut = toml::to_string_pretty(&self.settings)?.parse()?;

        for section in ConfigSection::ALL {
            if let Some(table) = doc
                .get_mut(section.table_name())
                .and_then(Item::as_table_mut)
            {
                table.set_implicit(false);
                table
                    .decor_mut()
                    .set_prefix(format!("\n# {}\n", section.description()));
            }
        }

        let mut output = String::new();
        output.push_str("# ivtc configuration\n");
        output.push_str("# Unknown sections are removed when the file is loaded.\n");
        output.push_str(&doc.to_string());
        Ok(output)
    }

    fn atomic_write(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.config_path.with_extension("toml.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.config_path)?;
        Ok(())
    }
}

/// Whether `existing` holds every key of `expected`, recursing into tables.
fn item_covers(existing: Option<&Item>, expected: &Item) -> bool {
    match (existing, expected.as_table_like()) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(existing), Some(expected)) => match existing.as_table_like() {
            Some(existing) => expected
                .iter()
                .all(|(key, item)| item_covers(existing.get(key), item)),
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FadeMode;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_or_create_creates_default() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(".config").join(DEFAULT_CONFIG_FILE);

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert!(config_path.exists());
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[paths]"));
        assert!(content.contains("[wibbly]"));
        assert!(content.contains("# Defaults for replaying Wobbly projects"));

        let mut reloaded = ConfigManager::new(&config_path);
        reloaded.load().unwrap();
        assert_eq!(reloaded.settings().wibbly, manager.settings().wibbly);
    }

    #[test]
    fn load_or_create_preserves_existing() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");
        fs::write(
            &config_path,
            "[replay]\nfade_mode = \"brighten\"\n\n[wibbly.dmetrics]\nnt = 4\n",
        )
        .unwrap();

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert_eq!(manager.settings().replay.fade_mode, FadeMode::Brighten);
        assert_eq!(manager.settings().wibbly.dmetrics.nt, 4);
        assert!(manager.settings().wibbly.dmetrics.enabled);
        // Missing keys were filled in on disk
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[logging]"));
    }

    #[test]
    fn unknown_sections_are_dropped() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");
        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        let mut content = fs::read_to_string(&config_path).unwrap();
        content.push_str("\n[stale]\nkey = 1\n");
        fs::write(&config_path, content).unwrap();

        manager.load_or_create().unwrap();
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(!content.contains("[stale]"));
    }

    #[test]
    fn update_section_only_changes_target() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        manager.settings_mut().logging.compact = false;
        manager.settings_mut().paths.output_folder = "elsewhere".into();
        manager.update_section(ConfigSection::Logging).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("compact = false"));
        assert!(!content.contains("elsewhere"));
        assert!(content.contains("# Logging configuration"));
    }

    #[test]
    fn atomic_write_creates_no_temp_on_success() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("settings.toml");

        let mut manager = ConfigManager::new(&config_path);
        manager.load_or_create().unwrap();

        assert!(!config_path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn relative_dirs_follow_config_file() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().join("ivtc.toml"));
        assert_eq!(manager.logs_folder(), dir.path().join(".logs"));
        manager.ensure_dirs_exist().unwrap();
        assert!(dir.path().join("ivtc_output").is_dir());
    }
}
