//! CLI subcommand implementations.

pub mod fieldmatch;
pub mod info;
pub mod sar;
pub mod script;
pub mod timecodes;
pub mod wibbly;

pub use fieldmatch::CmdFieldMatch;
pub use info::CmdInfo;
pub use sar::CmdSar;
pub use script::CmdScript;
pub use timecodes::CmdTimecodes;
pub use wibbly::CmdWibbly;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail};
use indicatif::{ProgressBar, ProgressStyle};
use ivtc_core::config::{ConfigManager, Settings};
use ivtc_core::logging::RunLogger;
use num_rational::Rational64;

/// State shared by every subcommand.
pub struct Context {
    config: ConfigManager,
}

impl Context {
    pub fn new(config: ConfigManager) -> Self {
        Self { config }
    }

    pub fn settings(&self) -> &Settings {
        self.config.settings()
    }

    /// Default location for an output file named `file_name`.
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.config.output_folder().join(file_name)
    }

    /// Per-run log in the configured logs folder.
    pub fn run_logger(&self, name: &str) -> anyhow::Result<RunLogger> {
        let logs = self.config.logs_folder();
        RunLogger::new(name, &logs, self.settings().logging.to_log_config(), None)
            .map_err(|e| anyhow!("cannot create run log in {}: {}", logs.display(), e))
    }
}

/// `30000/1001`, `25` or `29.97` (snapped to a /1001 rate).
pub fn parse_rational(s: &str) -> anyhow::Result<Rational64> {
    let s = s.trim();
    if let Some((n, d)) = s.split_once('/') {
        let n: i64 = n.trim().parse()?;
        let d: i64 = d.trim().parse()?;
        if n <= 0 || d <= 0 {
            bail!("frame rate must be positive, got {}", s);
        }
        return Ok(Rational64::new(n, d));
    }
    if let Ok(n) = s.parse::<i64>() {
        if n <= 0 {
            bail!("frame rate must be positive, got {}", s);
        }
        return Ok(Rational64::from_integer(n));
    }
    let fps: f64 = s.parse()?;
    if !(fps > 0.0 && fps.is_finite()) {
        bail!("frame rate must be positive, got {}", s);
    }
    Ok(Rational64::new((fps * 1001.0).round() as i64, 1001))
}

/// Inclusive `start-end` or `start:end`.
pub fn parse_trim(s: &str) -> anyhow::Result<(usize, usize)> {
    let (start, end) = s
        .split_once('-')
        .or_else(|| s.split_once(':'))
        .ok_or_else(|| anyhow!("trim must look like START-END, got {}", s))?;
    let start: usize = start.trim().parse()?;
    let end: usize = end.trim().parse()?;
    if start > end {
        bail!("trim start {} is after end {}", start, end);
    }
    Ok((start, end))
}

/// `WIDTHxHEIGHT`.
pub fn parse_resolution(s: &str) -> anyhow::Result<(usize, usize)> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("resolution must look like 720x480, got {}", s))?;
    Ok((w.trim().parse()?, h.trim().parse()?))
}

#[cfg_attr(not(feature = "vapoursynth"), allow(dead_code))]
pub fn progress_bar(total: usize, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{prefix:>10.cyan.bold} [{bar:40.cyan/blue}] {pos}/{len} frames ({per_sec}, eta {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> "),
    );
    pb.set_prefix(label.to_string());
    pb.enable_steady_tick(Duration::from_millis(200));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frame_rates() {
        assert_eq!(parse_rational("30000/1001").unwrap(), Rational64::new(30000, 1001));
        assert_eq!(parse_rational("25").unwrap(), Rational64::from_integer(25));
        assert_eq!(parse_rational("29.97").unwrap(), Rational64::new(30000, 1001));
        assert!(parse_rational("0/1").is_err());
        assert!(parse_rational("fast").is_err());
    }

    #[test]
    fn parses_trims() {
        assert_eq!(parse_trim("10-200").unwrap(), (10, 200));
        assert_eq!(parse_trim("0:5").unwrap(), (0, 5));
        assert!(parse_trim("5-1").is_err());
        assert!(parse_trim("7").is_err());
    }

    #[test]
    fn parses_resolution() {
        assert_eq!(parse_resolution("720x480").unwrap(), (720, 480));
        assert!(parse_resolution("720").is_err());
    }
}
