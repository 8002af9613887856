//! v1/v2 timecode file text.
//!
//! v1: `# timecode format v1`, an optional `Assume <fps>` line, then
//! inclusive `start,end,fps` overrides. v2: one cumulative timestamp in
//! milliseconds per line, plus a final line closing the last frame.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};

use super::error::{TimecodeError, TimecodeResult};
use super::{rate_to_f64, Timecodes};

/// Denominator used to snap decimal rates back to NTSC fractions.
pub const DEFAULT_DENOMINATOR: i64 = 1001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimecodeFormat {
    #[serde(rename = "v1")]
    V1,
    #[default]
    #[serde(rename = "v2")]
    V2,
}

impl TimecodeFormat {
    pub fn version(&self) -> u8 {
        match self {
            TimecodeFormat::V1 => 1,
            TimecodeFormat::V2 => 2,
        }
    }
}

impl TryFrom<u8> for TimecodeFormat {
    type Error = TimecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TimecodeFormat::V1),
            2 => Ok(TimecodeFormat::V2),
            other => Err(TimecodeError::UnsupportedFormat(format!("v{}", other))),
        }
    }
}

impl std::fmt::Display for TimecodeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.version())
    }
}

/// Snap a decimal rate to `round(fps * den) / den`. `None` if it rounds to zero.
fn snap(fps: f64, den: i64) -> Option<Rational64> {
    let num = (fps * den as f64).round();
    (num >= 1.0 && num < i64::MAX as f64).then(|| Rational64::new(num as i64, den))
}

fn body_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .skip(1)
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
}

pub(super) fn parse(text: &str, num_frames: usize, den: i64) -> TimecodeResult<Timecodes> {
    if den <= 0 {
        return Err(TimecodeError::InvalidDenominator(den));
    }
    let header = text.lines().next().unwrap_or_default();
    let rates = if header.contains("v1") {
        parse_v1(text, num_frames, den)?
    } else if header.contains("v2") {
        parse_v2(text, den)?
    } else {
        return Err(TimecodeError::UnsupportedFormat(header.to_string()));
    };

    if rates.len() != num_frames {
        return Err(TimecodeError::LengthMismatch {
            timecodes: rates.len(),
            clip: num_frames,
        });
    }
    Ok(Timecodes::new(rates))
}

fn parse_v1(text: &str, num_frames: usize, den: i64) -> TimecodeResult<Vec<Rational64>> {
    let parse_fps = |line: usize, content: &str, value: &str| -> TimecodeResult<Rational64> {
        let fps: f64 = value
            .trim()
            .parse()
            .map_err(|_| TimecodeError::invalid_line(line, content, "invalid frame rate"))?;
        if !(fps > 0.0 && fps.is_finite()) {
            return Err(TimecodeError::invalid_line(line, content, "frame rate must be positive"));
        }
        snap(fps, den).ok_or_else(|| TimecodeError::invalid_line(line, content, "frame rate rounds to zero"))
    };

    let mut rates: Vec<Option<Rational64>> = vec![None; num_frames];
    for (line, content) in body_lines(text) {
        if let Some(value) = content.strip_prefix("Assume") {
            let fps = parse_fps(line, content, value)?;
            for rate in rates.iter_mut().filter(|r| r.is_none()) {
                *rate = Some(fps);
            }
            continue;
        }

        let fields: Vec<&str> = content.split(',').collect();
        let [start, end, fps] = fields.as_slice() else {
            return Err(TimecodeError::invalid_line(line, content, "expected start,end,fps"));
        };
        let parse_frame = |value: &str| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| TimecodeError::invalid_line(line, content, "invalid frame number"))
        };
        let (start, end) = (parse_frame(start)?, parse_frame(end)?);
        if start > end {
            return Err(TimecodeError::invalid_line(line, content, "start after end"));
        }
        if end >= num_frames {
            return Err(TimecodeError::invalid_line(line, content, "frame out of range"));
        }
        let fps = parse_fps(line, content, fps)?;
        for rate in &mut rates[start..=end] {
            *rate = Some(fps);
        }
    }

    rates
        .into_iter()
        .enumerate()
        .map(|(n, rate)| rate.ok_or(TimecodeError::MissingRate(n)))
        .collect()
}

fn parse_v2(text: &str, den: i64) -> TimecodeResult<Vec<Rational64>> {
    let stamps = body_lines(text)
        .map(|(line, content)| {
            content
                .parse::<f64>()
                .map(|ms| (line, content, ms))
                .map_err(|_| TimecodeError::invalid_line(line, content, "invalid timestamp"))
        })
        .collect::<TimecodeResult<Vec<_>>>()?;

    stamps
        .windows(2)
        .map(|pair| {
            let (_, _, prev) = pair[0];
            let (line, content, next) = pair[1];
            let delta = next - prev;
            if !(delta > 0.0) {
                return Err(TimecodeError::invalid_line(line, content, "timestamps must increase"));
            }
            snap(1000.0 / delta, den)
                .ok_or_else(|| TimecodeError::invalid_line(line, content, "frame rate rounds to zero"))
        })
        .collect()
}

/// Rate with up to twelve decimals and no trailing zeros.
fn format_rate(rate: Rational64) -> String {
    let text = format!("{:.12}", rate_to_f64(rate));
    let trimmed = text.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{}0", trimmed)
    } else {
        trimmed.to_string()
    }
}

pub(super) fn render_v1(timecodes: &Timecodes) -> TimecodeResult<String> {
    let (major, minor) = timecodes.separate().ok_or(TimecodeError::Empty)?;
    let mut out = vec![
        "# timecode format v1".to_string(),
        format!("Assume {}", format_rate(major)),
    ];
    out.extend(
        minor
            .iter()
            .map(|r| format!("{},{},{}", r.start, r.end, format_rate(r.rate))),
    );
    out.push(String::new());
    Ok(out.join("\n"))
}

pub(super) fn render_v2(timecodes: &Timecodes) -> TimecodeResult<String> {
    if timecodes.is_empty() {
        return Err(TimecodeError::Empty);
    }
    let mut out = vec!["# timecode format v2".to_string()];
    let mut elapsed = Rational64::from_integer(0);
    out.push(format!("{:.6}", rate_to_f64(elapsed)));
    for (frame, rate) in timecodes.rates().iter().enumerate() {
        if *rate.numer() <= 0 {
            return Err(TimecodeError::InvalidRate {
                frame,
                rate: rate.to_string(),
            });
        }
        elapsed += Rational64::from_integer(1000) / *rate;
        out.push(format!("{:.6}", rate_to_f64(elapsed)));
    }
    out.push(String::new());
    Ok(out.join("\n"))
}
