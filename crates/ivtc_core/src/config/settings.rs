//! Settings struct with TOML-based sections.
//!
//! Each section maps to one TOML table and can be rewritten on its own
//! through [`ConfigManager::update_section`](super::ConfigManager::update_section).

use serde::{Deserialize, Serialize};

use crate::filters::FadeFix;
use crate::logging::{LogConfig, LogLevel};
use crate::models::FadeMode;
use crate::timecodes::TimecodeFormat;
use crate::wobbly::{OrphanHandling, ReplayOptions, WibblyConfig, WobblyResult};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    /// Metric gathering for new projects.
    #[serde(default)]
    pub wibbly: WibblyConfig,

    /// Defaults for replaying existing projects.
    #[serde(default)]
    pub replay: ReplaySettings,
}

/// Output, log and scratch directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Where scripts and timecodes go when no output path is given.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_output_folder() -> String {
    "ivtc_output".to_string()
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub level: LogLevel,

    /// Only log progress every `progress_step` percent.
    #[serde(default = "default_true")]
    pub compact: bool,

    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Lines kept for the error tail.
    #[serde(default = "default_error_tail")]
    pub error_tail: usize,

    #[serde(default = "default_true")]
    pub show_timestamps: bool,

    /// Also write a daily rolling log file into `paths.logs_folder`.
    #[serde(default)]
    pub log_to_file: bool,
}

fn default_true() -> bool {
    true
}

fn default_progress_step() -> u32 {
    20
}

fn default_error_tail() -> usize {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            compact: true,
            progress_step: default_progress_step(),
            error_tail: default_error_tail(),
            show_timestamps: true,
            log_to_file: false,
        }
    }
}

impl LoggingSettings {
    /// Configuration for a [`RunLogger`](crate::logging::RunLogger).
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            compact: self.compact,
            progress_step: self.progress_step.max(1),
            error_tail: self.error_tail,
            show_timestamps: self.show_timestamps,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySettings {
    /// `none`, `all`, or orphan match letters such as `bn`.
    #[serde(default = "default_orphan_handling")]
    pub orphan_handling: String,

    #[serde(default)]
    pub fade_mode: FadeMode,

    /// Per-plane fade baseline, `[0, 1]`.
    #[serde(default = "default_fade_colors")]
    pub fade_colors: Vec<f64>,

    /// Planes the fade fix touches; luma only by default.
    #[serde(default = "default_fade_planes")]
    pub fade_planes: Vec<usize>,

    #[serde(default)]
    pub timecode_format: TimecodeFormat,
}

fn default_orphan_handling() -> String {
    "none".to_string()
}

fn default_fade_colors() -> Vec<f64> {
    vec![0.0]
}

fn default_fade_planes() -> Vec<usize> {
    vec![0]
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            orphan_handling: default_orphan_handling(),
            fade_mode: FadeMode::default(),
            fade_colors: default_fade_colors(),
            fade_planes: default_fade_planes(),
            timecode_format: TimecodeFormat::default(),
        }
    }
}

impl ReplaySettings {
    pub fn orphan_handling(&self) -> WobblyResult<OrphanHandling> {
        self.orphan_handling.parse()
    }

    pub fn to_replay_options(&self) -> WobblyResult<ReplayOptions> {
        Ok(ReplayOptions {
            field_order: None,
            orphan_handling: self.orphan_handling()?,
            fade: FadeFix::new(self.fade_mode)
                .with_colors(self.fade_colors.clone())
                .with_planes(self.fade_planes.clone()),
        })
    }
}

/// Config sections that can be updated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Paths,
    Logging,
    Wibbly,
    Replay,
}

impl ConfigSection {
    pub const ALL: [ConfigSection; 4] = [
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Wibbly,
        ConfigSection::Replay,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Wibbly => "wibbly",
            ConfigSection::Replay => "replay",
        }
    }

    /// Comment written above the table.
    pub fn description(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Output and working directories",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Wibbly => "Metric gathering for new Wobbly projects",
            ConfigSection::Replay => "Defaults for replaying Wobbly projects",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrphanMatch;

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[logging]"));
        assert!(toml.contains("[wibbly.vfm]"));
        assert!(toml.contains("orphan_handling"));
    }

    #[test]
    fn settings_round_trip() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.paths.output_folder, settings.paths.output_folder);
        assert_eq!(parsed.logging.compact, settings.logging.compact);
        assert_eq!(parsed.wibbly, settings.wibbly);
        assert_eq!(parsed.replay.timecode_format, TimecodeFormat::V2);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[replay]\norphan_handling = \"bn\"\nfade_mode = \"darken\"";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        assert_eq!(parsed.replay.fade_mode, FadeMode::Darken);
        assert_eq!(parsed.replay.fade_colors, vec![0.0]);
        assert_eq!(parsed.replay.fade_planes, vec![0]);
        assert_eq!(parsed.paths.logs_folder, ".logs");
        assert!(parsed.wibbly.vfm.micmatch);

        let options = parsed.replay.to_replay_options().unwrap();
        assert!(options.orphan_handling.includes(OrphanMatch::B));
        assert!(!options.orphan_handling.includes(OrphanMatch::P));
        assert_eq!(options.fade.mode, FadeMode::Darken);
    }

    #[test]
    fn bad_orphan_handling_is_reported() {
        let settings = ReplaySettings {
            orphan_handling: "bx".into(),
            ..ReplaySettings::default()
        };
        assert!(settings.to_replay_options().is_err());
    }
}
