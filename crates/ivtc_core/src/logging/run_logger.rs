//! Per-run logger with file and callback output.
//!
//! Each replay or analysis run gets its own log file next to the others in
//! the logs folder. Lines also go to an optional callback, and the most
//! recent ones are kept for printing after a failure.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;
use serde::Serialize;

use super::types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

pub struct RunLogger {
    run_name: String,
    log_path: PathBuf,
    file_writer: Arc<Mutex<Option<BufWriter<File>>>>,
    callback: Arc<Mutex<Option<LogCallback>>>,
    config: LogConfig,
    tail_buffer: Arc<Mutex<VecDeque<String>>>,
    /// Last progress value logged, for compact mode.
    last_progress: Arc<Mutex<Option<u32>>>,
}

impl RunLogger {
    /// Create `<log_dir>/<run_name>_<timestamp>.log`.
    pub fn new(
        run_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        callback: Option<LogCallback>,
    ) -> std::io::Result<Self> {
        let run_name = run_name.into();
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("{}_{}.log", sanitize_filename(&run_name), stamp));
        let file = File::create(&log_path)?;

        Ok(Self {
            run_name,
            log_path,
            file_writer: Arc::new(Mutex::new(Some(BufWriter::new(file)))),
            callback: Arc::new(Mutex::new(callback)),
            tail_buffer: Arc::new(Mutex::new(VecDeque::with_capacity(config.error_tail))),
            config,
            last_progress: Arc::new(Mutex::new(None)),
        })
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }
        self.push_tail(message);
        self.output(&self.format_message(message));
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    pub fn phase(&self, phase_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(phase_name));
    }

    pub fn section(&self, section_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Section.format(section_name));
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    /// Log `done` out of `total` as a percentage.
    ///
    /// In compact mode only the first update, each `progress_step` boundary
    /// and 100% are written. Returns whether the line was logged.
    pub fn progress(&self, done: usize, total: usize) -> bool {
        let percent = if total == 0 {
            100
        } else {
            ((done.min(total) * 100) / total) as u32
        };

        if self.config.compact {
            let mut last = self.last_progress.lock();
            let step = self.config.progress_step.max(1);
            if let Some(previous) = *last {
                if percent / step <= previous / step && percent < 100 {
                    return false;
                }
                if previous == 100 {
                    return false;
                }
            }
            *last = Some(percent);
        }

        self.log(LogLevel::Info, &format!("Progress: {}%", percent));
        true
    }

    /// Record a line of tool output, such as a generated script.
    ///
    /// In compact mode these only go to the tail buffer.
    pub fn output_line(&self, line: &str) {
        self.push_tail(line);
        if !self.config.compact {
            self.output(&self.format_message(line));
        }
    }

    /// Write `value` as pretty JSON between markers.
    pub fn json<T: Serialize + ?Sized>(&self, label: &str, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => {
                self.info(&format!("--- {} (json) ---", label));
                for line in json.lines() {
                    self.info(line);
                }
            }
            Err(e) => self.warn(&format!("could not serialise {}: {}", label, e)),
        }
    }

    /// Repeat the tail buffer, typically after an error.
    pub fn show_tail(&self, header: &str) {
        let lines = self.tail();
        if lines.is_empty() {
            return;
        }
        self.output(&self.format_message(&format!("[{}/tail]", header)));
        for line in &lines {
            self.output(&self.format_message(line));
        }
    }

    pub fn clear_tail(&self) {
        self.tail_buffer.lock().clear();
    }

    pub fn tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    fn push_tail(&self, line: &str) {
        if self.config.error_tail == 0 {
            return;
        }
        let mut buffer = self.tail_buffer.lock();
        while buffer.len() >= self.config.error_tail {
            buffer.pop_front();
        }
        buffer.push_back(line.to_string());
    }

    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            format!("[{}] {}", Local::now().format("%H:%M:%S"), message)
        } else {
            message.to_string()
        }
    }

    fn output(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }
        if let Some(ref callback) = *self.callback.lock() {
            callback(formatted);
        }
    }
}

impl Drop for RunLogger {
    fn drop(&mut self) {
        self.close();
    }
}

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn plain() -> LogConfig {
        LogConfig {
            show_timestamps: false,
            ..LogConfig::default()
        }
    }

    #[test]
    fn writes_to_file() {
        let dir = tempdir().unwrap();
        let logger = RunLogger::new("replay ep01", dir.path(), plain(), None).unwrap();
        assert!(logger
            .log_path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("replay_ep01_"));

        logger.phase("Replay");
        logger.debug("hidden at info level");
        logger.flush();

        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert!(content.contains("=== Replay ==="));
        assert!(!content.contains("hidden"));
    }

    #[test]
    fn calls_callback() {
        let dir = tempdir().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let callback: LogCallback = Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let logger = RunLogger::new("run", dir.path(), plain(), Some(callback)).unwrap();
        logger.info("one");
        logger.success("two");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn compact_mode_filters_progress() {
        let dir = tempdir().unwrap();
        let logger = RunLogger::new("run", dir.path(), plain(), None).unwrap();

        assert!(logger.progress(0, 100));
        assert!(!logger.progress(5, 100));
        assert!(!logger.progress(19, 100));
        assert!(logger.progress(20, 100));
        assert!(!logger.progress(39, 100));
        assert!(logger.progress(100, 100));
        assert!(!logger.progress(100, 100));
    }

    #[test]
    fn tail_buffer_keeps_recent_lines() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            error_tail: 3,
            ..plain()
        };
        let logger = RunLogger::new("run", dir.path(), config, None).unwrap();

        for i in 0..6 {
            logger.output_line(&format!("clip{} = core.std.Trim(...)", i));
        }
        let tail = logger.tail();
        assert_eq!(tail.len(), 3);
        assert!(tail[0].starts_with("clip3"));

        // Compact mode keeps tool output out of the file until shown
        logger.flush();
        assert!(!fs::read_to_string(logger.log_path()).unwrap().contains("clip5"));
        logger.show_tail("script");
        logger.flush();
        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert!(content.contains("[script/tail]"));
        assert!(content.contains("clip5"));
    }

    #[test]
    fn sanitizes_filename() {
        assert_eq!(sanitize_filename("has/slash"), "has_slash");
        assert_eq!(sanitize_filename("a<b>c d"), "a_b_c_d");
    }
}
