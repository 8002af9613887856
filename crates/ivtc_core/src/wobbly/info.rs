//! Wobbly project data model.
//!
//! Plain values derived from a project file. Invariants are enforced by the
//! constructors, so holding one of these means it is already valid.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use num_rational::Rational64;
use serde::{Deserialize, Serialize};

use super::error::{WobblyError, WobblyResult};
use super::file::lenient;
use crate::clip::ScriptClip;
use crate::ivtc::VfmMode;
use crate::models::{FieldOrder, OrphanMatch};

/// A contiguous scene with the presets applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub start: usize,
    pub end: usize,
    pub presets: Vec<String>,
}

impl Section {
    pub fn new(start: usize, end: usize, presets: Vec<String>) -> WobblyResult<Self> {
        if start > end {
            return Err(WobblyError::InvalidRange { start, end });
        }
        Ok(Self {
            start,
            end,
            presets,
        })
    }

    pub fn frames(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }

    /// Number of frames in the section.
    pub fn frame_count(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn contains(&self, frame: usize) -> bool {
        self.frames().contains(&frame)
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Section({}..={}, presets={:?})", self.start, self.end, self.presets)
    }
}

/// Range of frames replaced by a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FreezeFrame {
    pub start: usize,
    pub end: usize,
    pub replacement: usize,
}

impl FreezeFrame {
    pub fn new(start: usize, end: usize, replacement: usize) -> WobblyResult<Self> {
        if start > end {
            return Err(WobblyError::InvalidRange { start, end });
        }
        Ok(Self {
            start,
            end,
            replacement,
        })
    }

    pub fn frames(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Frame whose fields differ in brightness because of a fade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterlacedFade {
    pub frame: usize,
    /// Always non-negative.
    pub field_difference: f64,
}

impl InterlacedFade {
    pub fn new(frame: usize, field_difference: f64) -> Self {
        Self {
            frame,
            field_difference: field_difference.abs(),
        }
    }
}

/// Field without a partner at a section boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrphanField {
    pub frame: usize,
    pub matched: OrphanMatch,
}

impl OrphanField {
    pub fn new(frame: usize, matched: OrphanMatch) -> Self {
        Self { frame, matched }
    }

    pub fn deinterlace_order(&self) -> FieldOrder {
        self.matched.deinterlace_order()
    }
}

impl std::fmt::Display for OrphanField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrphanField(frame={}, match={})", self.frame, self.matched)
    }
}

/// Named snippet of VapourSynth code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub contents: String,
}

/// VFM parameters the project was analysed with.
///
/// Booleans are written as floats, which is what Wobbly itself expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfmParams {
    #[serde(deserialize_with = "lenient::int")]
    pub order: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub field: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub mode: i64,
    #[serde(deserialize_with = "lenient::boolean", serialize_with = "lenient::bool_as_float")]
    pub mchroma: bool,
    pub cthresh: f64,
    #[serde(deserialize_with = "lenient::boolean", serialize_with = "lenient::bool_as_float")]
    pub chroma: bool,
    pub mi: f64,
    pub blockx: f64,
    pub blocky: f64,
    pub y0: f64,
    pub y1: f64,
    pub scthresh: f64,
    #[serde(deserialize_with = "lenient::boolean", serialize_with = "lenient::bool_as_float")]
    pub micmatch: bool,
    #[serde(deserialize_with = "lenient::boolean", serialize_with = "lenient::bool_as_float")]
    pub micout: bool,
}

impl VfmParams {
    /// Matching mode, if `mode` holds a known value.
    pub fn vfm_mode(&self) -> Option<VfmMode> {
        VfmMode::from_index(self.mode)
    }
}

impl Default for VfmParams {
    fn default() -> Self {
        Self {
            order: 1,
            field: 2,
            mode: 1,
            mchroma: true,
            cthresh: 9.0,
            chroma: true,
            mi: 80.0,
            blockx: 16.0,
            blocky: 16.0,
            y0: 16.0,
            y1: 16.0,
            scthresh: 12.0,
            micmatch: false,
            micout: false,
        }
    }
}

impl VfmParams {
    /// Field order implied by `order`.
    pub fn field_order(&self) -> WobblyResult<FieldOrder> {
        FieldOrder::from_vfm_order(self.order)
            .ok_or(WobblyError::UnsupportedFieldOrder(self.order))
    }
}

/// VDecimate parameters the project was analysed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VDecParams {
    #[serde(deserialize_with = "lenient::int")]
    pub cycle: i64,
    #[serde(deserialize_with = "lenient::boolean", serialize_with = "lenient::bool_as_float")]
    pub chroma: bool,
    pub dupthresh: f64,
    pub scthresh: f64,
    pub blockx: f64,
    pub blocky: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ovr: Option<String>,
    #[serde(deserialize_with = "lenient::boolean", serialize_with = "lenient::bool_as_float")]
    pub dryrun: bool,
}

impl Default for VDecParams {
    fn default() -> Self {
        Self {
            cycle: 5,
            chroma: true,
            dupthresh: 1.1,
            scthresh: 15.0,
            blockx: 32.0,
            blocky: 32.0,
            ovr: None,
            dryrun: false,
        }
    }
}

/// Provenance of a project file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WobblyMeta {
    /// `-1` when absent.
    pub wobbly_version: i64,
    /// `-1` when absent.
    pub project_format_version: i64,
    pub generated_with: Option<String>,
}

impl Default for WobblyMeta {
    fn default() -> Self {
        Self {
            wobbly_version: -1,
            project_format_version: -1,
            generated_with: None,
        }
    }
}

/// How to re-create the clip the project was made from.
#[derive(Debug, Clone, PartialEq)]
pub struct WobblyVideo {
    pub file_path: PathBuf,
    /// Host source filter, e.g. `lsmas.LWLibavSource`.
    pub source_filter: String,
    /// Inclusive frame ranges kept from the source, in order.
    pub trims: Vec<(usize, usize)>,
    pub framerate: Rational64,
}

impl WobblyVideo {
    /// Index the input file, set the base frame rate and apply trims.
    ///
    /// `num_frames` is the length after trimming; the script cannot know it
    /// without evaluating the source.
    pub fn source(&self, num_frames: usize) -> WobblyResult<ScriptClip> {
        if !self.file_path.exists() {
            return Err(WobblyError::FileNotFound(self.file_path.clone()));
        }
        Ok(self.source_unchecked(num_frames))
    }

    /// Same as [`Self::source`] without checking the input file exists.
    pub fn source_unchecked(&self, num_frames: usize) -> ScriptClip {
        let clip = ScriptClip::source(&self.file_path, &self.source_filter, self.framerate);
        let clip = if self.trims.is_empty() {
            clip
        } else {
            clip.splice_trims(&self.trims)
        };
        clip.assume_length(num_frames)
    }

    pub fn file_name(&self) -> String {
        Path::new(&self.file_path)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
