//! Inverse telecine.
//!
//! For clean 3:2 pulldown without edits, weaving every pair of neighbouring
//! fields and keeping a fixed subset per cycle recovers the film frames
//! ([`sivtc`]). Everything else goes through VIVTC field matching and
//! decimation ([`vfm`], [`vdecimate`]).

mod vivtc;

pub use vivtc::{vdecimate, vfm, PostProcess};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::clip::{Clip, ClipError, ClipResult, MemoryClip, ScriptClip};
use crate::models::FieldOrder;

/// Frame-selection tables, indexed by pattern phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IvtcCycle {
    #[default]
    #[serde(rename = "cycle_10")]
    Cycle10,
    #[serde(rename = "cycle_08")]
    Cycle08,
    #[serde(rename = "cycle_05")]
    Cycle05,
}

const CYCLE_10: [[usize; 4]; 5] = [[0, 3, 6, 8], [0, 2, 5, 8], [0, 2, 4, 7], [2, 4, 6, 9], [1, 4, 6, 8]];
const CYCLE_08: [[usize; 4]; 5] = [[0, 3, 4, 6], [0, 2, 5, 6], [0, 2, 4, 7], [0, 2, 4, 7], [1, 2, 4, 6]];
const CYCLE_05: [[usize; 4]; 5] = [[0, 1, 3, 4], [0, 1, 2, 4], [0, 1, 2, 3], [1, 2, 3, 4], [0, 2, 3, 4]];

impl IvtcCycle {
    fn table(&self) -> &'static [[usize; 4]; 5] {
        match self {
            IvtcCycle::Cycle10 => &CYCLE_10,
            IvtcCycle::Cycle08 => &CYCLE_08,
            IvtcCycle::Cycle05 => &CYCLE_05,
        }
    }

    /// Frames per selection cycle.
    pub fn pattern_length(&self) -> usize {
        match self {
            IvtcCycle::Cycle10 => 10,
            IvtcCycle::Cycle08 => 8,
            IvtcCycle::Cycle05 => 5,
        }
    }

    /// Number of pattern phases.
    pub fn phases(&self) -> usize {
        self.table().len()
    }

    /// Offsets kept for `pattern`.
    pub fn offsets(&self, pattern: usize) -> ClipResult<&'static [usize]> {
        self.table().get(pattern).map(|o| o.as_slice()).ok_or_else(|| {
            ClipError::invalid_parameter(format!(
                "pattern {} out of range, expected 0..{}",
                pattern,
                self.phases()
            ))
        })
    }

    /// Source indices a `SelectEvery` with this cycle keeps from
    /// `num_frames` frames.
    pub fn select_indices(&self, num_frames: usize, pattern: usize) -> ClipResult<Vec<usize>> {
        let offsets = self.offsets(pattern)?;
        Ok((0..num_frames)
            .step_by(self.pattern_length())
            .flat_map(|base| offsets.iter().map(move |&o| base + o))
            .filter(|&n| n < num_frames)
            .collect())
    }
}

/// VFM matching strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum VfmMode {
    /// p/c
    TwoWay = 0,
    /// p/c + n
    #[default]
    TwoWayThirdCombed = 1,
    /// p/c + u
    TwoWayThirdSameOrder = 2,
    /// p/c + n + u/b
    TwoWayThirdFourthFifth = 3,
    /// p/c/n
    ThreeWay = 4,
    /// p/c/n + u/b
    ThreeWayFourthFifth = 5,
}

impl VfmMode {
    pub fn from_index(mode: i64) -> Option<Self> {
        match mode {
            0 => Some(VfmMode::TwoWay),
            1 => Some(VfmMode::TwoWayThirdCombed),
            2 => Some(VfmMode::TwoWayThirdSameOrder),
            3 => Some(VfmMode::TwoWayThirdFourthFifth),
            4 => Some(VfmMode::ThreeWay),
            5 => Some(VfmMode::ThreeWayFourthFifth),
            _ => None,
        }
    }

    pub fn index(&self) -> i64 {
        *self as i64
    }

    /// Matches tried, in VFM's notation.
    pub fn describe(&self) -> &'static str {
        match self {
            VfmMode::TwoWay => "p/c",
            VfmMode::TwoWayThirdCombed => "p/c + n",
            VfmMode::TwoWayThirdSameOrder => "p/c + u",
            VfmMode::TwoWayThirdFourthFifth => "p/c + n + u/b",
            VfmMode::ThreeWay => "p/c/n",
            VfmMode::ThreeWayFourthFifth => "p/c/n + u/b",
        }
    }
}

impl TryFrom<i64> for VfmMode {
    type Error = String;

    fn try_from(mode: i64) -> Result<Self, Self::Error> {
        Self::from_index(mode).ok_or_else(|| format!("VFM mode must be 0-5, got {}", mode))
    }
}

impl From<VfmMode> for i64 {
    fn from(mode: VfmMode) -> Self {
        mode.index()
    }
}

impl FromStr for VfmMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode: i64 = s
            .trim()
            .parse()
            .map_err(|_| format!("VFM mode must be 0-5, got '{}'", s))?;
        Self::try_from(mode)
    }
}

impl fmt::Display for VfmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.index(), self.describe())
    }
}

/// Field-level operations needed by [`sivtc`].
pub trait FieldOps: Clip {
    /// Weave each field with the next one, doubling the frame count.
    fn double_weave(&self, order: FieldOrder) -> ClipResult<Self>;

    /// Keep `offsets` out of every group of `cycle` frames.
    fn select_every(&self, cycle: usize, offsets: &[usize]) -> ClipResult<Self>;
}

impl FieldOps for MemoryClip {
    fn double_weave(&self, order: FieldOrder) -> ClipResult<Self> {
        MemoryClip::double_weave(self, order)
    }

    fn select_every(&self, cycle: usize, offsets: &[usize]) -> ClipResult<Self> {
        MemoryClip::select_every(self, cycle, offsets)
    }
}

impl FieldOps for ScriptClip {
    fn double_weave(&self, order: FieldOrder) -> ClipResult<Self> {
        ScriptClip::double_weave(self, order)
    }

    fn select_every(&self, cycle: usize, offsets: &[usize]) -> ClipResult<Self> {
        ScriptClip::select_every(self, cycle, offsets)
    }
}

/// Inverse telecine with a fixed pattern.
///
/// `pattern` is the phase of the first clean-combed-combed-clean-clean
/// sequence. The result is marked progressive.
pub fn sivtc<C: FieldOps>(clip: &C, pattern: usize, order: FieldOrder, cycle: IvtcCycle) -> ClipResult<C> {
    let offsets = cycle.offsets(pattern)?;
    let woven = clip.double_weave(order)?;
    let selected = woven.select_every(cycle.pattern_length(), offsets)?;
    tracing::debug!(
        "IVTC pattern {} ({:?}): {} -> {} frames",
        pattern,
        cycle,
        clip.num_frames(),
        selected.num_frames()
    );
    Ok(selected.with_field_order(FieldOrder::Progressive))
}
