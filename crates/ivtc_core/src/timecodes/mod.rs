//! Variable frame rate timecodes.
//!
//! [`Timecodes`] holds one frame rate per output frame. It can be read from
//! or written to v1/v2 timecode files, derived from a Wobbly project, or
//! collected from `_DurationNum`/`_DurationDen` frame props.

mod error;
mod format;

pub use error::{TimecodeError, TimecodeResult};
pub use format::{TimecodeFormat, DEFAULT_DENOMINATOR};

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use num_rational::Rational64;

use crate::clip::{Clip, MetricsSource};
use crate::models::FramePropsPlan;

pub(crate) fn rate_to_f64(rate: Rational64) -> f64 {
    *rate.numer() as f64 / *rate.denom() as f64
}

/// Inclusive frame range sharing one rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpsRange {
    pub start: usize,
    pub end: usize,
    pub rate: Rational64,
}

/// Per-frame frame rates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timecodes {
    rates: Vec<Rational64>,
}

impl Timecodes {
    pub fn new(rates: Vec<Rational64>) -> Self {
        Self { rates }
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn rates(&self) -> &[Rational64] {
        &self.rates
    }

    pub fn get(&self, frame: usize) -> Option<Rational64> {
        self.rates.get(frame).copied()
    }

    /// Parse v1 or v2 text for a clip of `num_frames` frames.
    ///
    /// Decimal rates are snapped to `round(fps * den) / den`.
    pub fn parse(text: &str, num_frames: usize, den: i64) -> TimecodeResult<Self> {
        format::parse(text, num_frames, den)
    }

    pub fn read(path: impl AsRef<Path>, num_frames: usize, den: i64) -> TimecodeResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| TimecodeError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let timecodes = Self::parse(&text, num_frames, den)?;
        tracing::debug!(
            "[Timecodes] Read {} frames from {}",
            timecodes.len(),
            path.display()
        );
        Ok(timecodes)
    }

    /// Collect rates from frame durations (`_DurationNum / _DurationDen`
    /// seconds per frame).
    pub fn from_source(source: &dyn MetricsSource) -> TimecodeResult<Self> {
        let mut rates = Vec::with_capacity(source.frame_count());
        for n in 0..source.frame_count() {
            let props = source.frame_props(n).map_err(|e| {
                TimecodeError::invalid_line(n, "", format!("frame props unavailable: {}", e))
            })?;
            let get = |key: &str| props.get(key).and_then(|v| v.as_int());
            match (get("_DurationNum"), get("_DurationDen")) {
                (Some(num), Some(den)) if num > 0 && den > 0 => {
                    rates.push(Rational64::new(den, num))
                }
                _ => return Err(TimecodeError::MissingRate(n)),
            }
        }
        Ok(Self::new(rates))
    }

    /// Collapse runs of equal rates into inclusive ranges.
    pub fn normalize(&self) -> Vec<FpsRange> {
        let mut ranges: Vec<FpsRange> = Vec::new();
        for (n, &rate) in self.rates.iter().enumerate() {
            match ranges.last_mut() {
                Some(last) if last.rate == rate => last.end = n,
                _ => ranges.push(FpsRange {
                    start: n,
                    end: n,
                    rate,
                }),
            }
        }
        ranges
    }

    /// The rate used by the most ranges (first seen wins a tie) and the
    /// ranges using any other rate.
    pub fn separate(&self) -> Option<(Rational64, Vec<FpsRange>)> {
        let ranges = self.normalize();
        let mut counts: Vec<(Rational64, usize)> = Vec::new();
        for range in &ranges {
            match counts.iter_mut().find(|(rate, _)| *rate == range.rate) {
                Some((_, count)) => *count += 1,
                None => counts.push((range.rate, 1)),
            }
        }
        let best = counts.iter().map(|(_, c)| *c).max()?;
        let (major, _) = counts.into_iter().find(|(_, c)| *c == best)?;
        let minor = ranges.into_iter().filter(|r| r.rate != major).collect();
        Some((major, minor))
    }

    /// Like [`Self::separate`], with the minor ranges grouped by rate.
    pub fn accumulate(&self) -> Option<(Rational64, BTreeMap<Rational64, Vec<(usize, usize)>>)> {
        let (major, minor) = self.separate()?;
        let mut grouped: BTreeMap<Rational64, Vec<(usize, usize)>> = BTreeMap::new();
        for range in minor {
            grouped
                .entry(range.rate)
                .or_default()
                .push((range.start, range.end));
        }
        Some((major, grouped))
    }

    /// Give `clip` these frame rates as per-frame `_DurationNum`/`_DurationDen`.
    ///
    /// The most common rate goes on every frame; the minor ranges override it.
    pub fn assume_vfr<C: Clip>(&self, clip: &C) -> TimecodeResult<C> {
        if self.len() != clip.num_frames() {
            return Err(TimecodeError::LengthMismatch {
                timecodes: self.len(),
                clip: clip.num_frames(),
            });
        }
        let (major, minor) = self.accumulate().ok_or(TimecodeError::Empty)?;
        if let Some(frame) = self.rates.iter().position(|r| *r.numer() <= 0) {
            return Err(TimecodeError::InvalidRate {
                frame,
                rate: self.rates[frame].to_string(),
            });
        }

        let mut plan = FramePropsPlan::new()
            .with_all("_DurationNum", *major.denom())
            .with_all("_DurationDen", *major.numer());
        for (rate, ranges) in &minor {
            for &(start, end) in ranges {
                for n in start..=end {
                    plan.set(n, "_DurationNum", *rate.denom());
                    plan.set(n, "_DurationDen", *rate.numer());
                }
            }
        }
        tracing::debug!(
            "[Timecodes] Assumed {} base with {} other rate(s)",
            major,
            minor.len()
        );
        Ok(clip.with_frame_props(&plan)?)
    }

    pub fn to_v1(&self) -> TimecodeResult<String> {
        format::render_v1(self)
    }

    pub fn to_v2(&self) -> TimecodeResult<String> {
        format::render_v2(self)
    }

    /// Write a timecode file, replacing anything at `path`.
    pub fn write(&self, path: impl AsRef<Path>, format: TimecodeFormat) -> TimecodeResult<()> {
        let path = path.as_ref();
        let text = match format {
            TimecodeFormat::V1 => self.to_v1()?,
            TimecodeFormat::V2 => self.to_v2()?,
        };
        let write_err = |source| TimecodeError::WriteError {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, text).map_err(write_err)?;
        tracing::info!(
            "[Timecodes] Wrote {} {} timecodes to {}",
            self.len(),
            format,
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{Clip, MemoryClip};
    use crate::models::{Frame, FramePropsPlan};
    use tempfile::tempdir;

    fn r(num: i64, den: i64) -> Rational64 {
        Rational64::new(num, den)
    }

    fn sample() -> Timecodes {
        let ntsc = r(30000, 1001);
        let film = r(24000, 1001);
        Timecodes::new(vec![ntsc, ntsc, film, film, ntsc, r(18000, 1001), ntsc])
    }

    #[test]
    fn normalize_covers_every_frame() {
        let ranges = sample().normalize();
        assert_eq!(ranges.len(), 5);
        assert_eq!((ranges[0].start, ranges[0].end), (0, 1));
        assert_eq!((ranges[4].start, ranges[4].end), (6, 6));
        let covered: usize = ranges.iter().map(|r| r.end - r.start + 1).sum();
        assert_eq!(covered, 7);
    }

    #[test]
    fn separate_picks_most_common_rate() {
        let (major, minor) = sample().separate().unwrap();
        assert_eq!(major, r(30000, 1001));
        assert_eq!(minor.len(), 2);
        assert!(Timecodes::default().separate().is_none());
    }

    #[test]
    fn accumulate_groups_minor_ranges() {
        let tc = Timecodes::new(vec![r(30, 1), r(24, 1), r(30, 1), r(24, 1), r(30, 1)]);
        let (major, grouped) = tc.accumulate().unwrap();
        assert_eq!(major, r(30, 1));
        assert_eq!(grouped[&r(24, 1)], vec![(1, 1), (3, 3)]);
    }

    #[test]
    fn from_source_reads_durations() {
        let frames = vec![Frame::gray(4, 4, 0.0); 2];
        let mut plan = FramePropsPlan::new()
            .with_all("_DurationNum", 1001i64)
            .with_all("_DurationDen", 30000i64);
        plan.set(1, "_DurationDen", 24000i64);
        let clip = MemoryClip::new(frames, r(30000, 1001))
            .with_frame_props(&plan)
            .unwrap();
        let tc = Timecodes::from_source(&clip).unwrap();
        assert_eq!(tc.rates(), &[r(30000, 1001), r(24000, 1001)]);
    }

    #[test]
    fn assume_vfr_stamps_durations() {
        let frames = vec![Frame::gray(4, 4, 0.0); 5];
        let clip = MemoryClip::new(frames, r(30000, 1001));
        let tc = Timecodes::new(vec![
            r(30000, 1001),
            r(24000, 1001),
            r(24000, 1001),
            r(30000, 1001),
            r(30000, 1001),
        ]);
        let out = tc.assume_vfr(&clip).unwrap();
        assert_eq!(Timecodes::from_source(&out).unwrap(), tc);

        let short = MemoryClip::new(vec![Frame::gray(4, 4, 0.0); 4], r(30000, 1001));
        assert!(matches!(
            tc.assume_vfr(&short),
            Err(TimecodeError::LengthMismatch { timecodes: 5, clip: 4 })
        ));
    }

    #[test]
    fn write_and_read_v1() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("timecodes.txt");
        let tc = sample();
        tc.write(&path, TimecodeFormat::V1).unwrap();
        let back = Timecodes::read(&path, tc.len(), DEFAULT_DENOMINATOR).unwrap();
        assert_eq!(back, tc);
    }

    #[test]
    fn empty_cannot_be_written() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Timecodes::default().write(dir.path().join("tc.txt"), TimecodeFormat::V2),
            Err(TimecodeError::Empty)
        ));
    }
}
