//! In-memory clip.
//!
//! Frames live in a `Vec` and every operation is evaluated immediately.
//! Used for tests, small previews and anywhere frames were decoded elsewhere.

use std::collections::BTreeSet;

use num_rational::Rational64;

use super::{check_frames, check_freezes, Clip, ClipError, ClipResult, MetricsSource};
use crate::filters::{self, FadeFix, VinverseParams};
use crate::models::{FieldOrder, Frame, FrameProps, FramePropsPlan, Match, PropValue};
use crate::wobbly::FreezeFrame;

/// A clip whose frames are held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryClip {
    frames: Vec<Frame>,
    field_order: FieldOrder,
    frame_rate: Rational64,
}

impl MemoryClip {
    /// Create a clip from frames. The field order starts out progressive.
    pub fn new(frames: Vec<Frame>, frame_rate: Rational64) -> Self {
        Self {
            frames,
            field_order: FieldOrder::Progressive,
            frame_rate,
        }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    pub fn get_frame(&self, n: usize) -> ClipResult<&Frame> {
        self.frames
            .get(n)
            .ok_or_else(|| ClipError::out_of_range(n, self.frames.len()))
    }

    pub fn with_frame_rate(&self, frame_rate: Rational64) -> Self {
        Self {
            frame_rate,
            ..self.clone()
        }
    }

    /// Keep `offsets` out of every group of `cycle` frames.
    pub fn select_every(&self, cycle: usize, offsets: &[usize]) -> ClipResult<Self> {
        if cycle == 0 || offsets.iter().any(|&o| o >= cycle) {
            return Err(ClipError::invalid_parameter(format!(
                "offsets {:?} do not fit a cycle of {}",
                offsets, cycle
            )));
        }
        let frames = (0..self.frames.len())
            .step_by(cycle)
            .flat_map(|base| offsets.iter().map(move |&o| base + o))
            .filter_map(|n| self.frames.get(n).cloned())
            .collect();
        Ok(Self {
            frames,
            frame_rate: self.frame_rate * Rational64::new(offsets.len() as i64, cycle as i64),
            ..self.clone()
        })
    }

    /// Separate fields in `order` and weave every pair of neighbouring
    /// fields back into a frame, doubling the frame count and rate.
    pub fn double_weave(&self, order: FieldOrder) -> ClipResult<Self> {
        let first_parity = if order.is_tff() { 0 } else { 1 };
        let fields: Vec<(usize, &Frame)> = self
            .frames
            .iter()
            .flat_map(|f| [(first_parity, f), (1 - first_parity, f)])
            .collect();

        let mut frames = Vec::with_capacity(fields.len());
        for (k, &(parity, frame)) in fields.iter().enumerate() {
            let (_, next) = fields[(k + 1).min(fields.len() - 1)];
            let (top, bottom) = if k + 1 == fields.len() {
                (frame, frame)
            } else if parity == 0 {
                (frame, next)
            } else {
                (next, frame)
            };
            let woven = Frame::from_fields(top, bottom).ok_or_else(|| {
                ClipError::GeometryMismatch(format!("cannot weave fields around frame {}", k / 2))
            })?;
            frames.push(woven);
        }
        Ok(Self {
            frames,
            frame_rate: self.frame_rate * 2,
            ..self.clone()
        })
    }

    /// Rebuild blended frames of an `AABBA` pattern starting at `start`.
    ///
    /// With `decimate`, the leftover duplicates are dropped and the rate set
    /// to 24000/1001.
    pub fn deblend(&self, start: usize, decimate: bool) -> ClipResult<Self> {
        let clip = Self {
            frames: filters::deblend_frames(&self.frames, start)?,
            ..self.clone()
        };
        if !decimate {
            return Ok(clip);
        }
        let dropped = filters::duplicate_frames(start, self.frames.len());
        Ok(clip
            .delete_frames(&dropped)?
            .with_frame_rate(Rational64::new(24000, 1001)))
    }

    /// Residual comb removal on every frame.
    pub fn vinverse(&self, params: &VinverseParams) -> ClipResult<Self> {
        params.validate()?;
        Ok(self.map_frames(|f| filters::vinverse_frame(f, params)))
    }

    fn map_frames(&self, f: impl Fn(&Frame) -> Frame) -> Self {
        Self {
            frames: self.frames.iter().map(f).collect(),
            ..self.clone()
        }
    }
}

impl Clip for MemoryClip {
    fn num_frames(&self) -> usize {
        self.frames.len()
    }

    fn field_order(&self) -> FieldOrder {
        self.field_order
    }

    fn frame_rate(&self) -> Rational64 {
        self.frame_rate
    }

    fn with_field_order(&self, order: FieldOrder) -> Self {
        let mut clip = self.map_frames(|f| {
            let mut frame = f.clone();
            frame
                .props
                .insert("_FieldBased".into(), PropValue::Int(order.field_based()));
            frame
        });
        clip.field_order = order;
        clip
    }

    fn with_frame_props(&self, plan: &FramePropsPlan) -> ClipResult<Self> {
        check_frames(plan.frames.keys(), self.frames.len())?;
        let mut clip = self.clone();
        for (n, frame) in clip.frames.iter_mut().enumerate() {
            plan.apply_to(n, &mut frame.props);
        }
        Ok(clip)
    }

    fn replace_frames(&self, replacement: &Self, frames: &BTreeSet<usize>) -> ClipResult<Self> {
        if replacement.frames.len() != self.frames.len() {
            return Err(ClipError::length_mismatch(
                self.frames.len(),
                replacement.frames.len(),
            ));
        }
        check_frames(frames, self.frames.len())?;
        let mut clip = self.clone();
        for &n in frames {
            clip.frames[n] = replacement.frames[n].clone();
        }
        Ok(clip)
    }

    fn delete_frames(&self, frames: &BTreeSet<usize>) -> ClipResult<Self> {
        check_frames(frames, self.frames.len())?;
        let kept = self
            .frames
            .iter()
            .enumerate()
            .filter(|(n, _)| !frames.contains(n))
            .map(|(_, f)| f.clone())
            .collect();
        Ok(Self {
            frames: kept,
            ..self.clone()
        })
    }

    fn field_hint(&self, matches: &[Match], order: FieldOrder) -> ClipResult<Self> {
        Ok(Self {
            frames: filters::field_hint(&self.frames, matches, order)?,
            ..self.clone()
        })
    }

    fn freeze_frames(&self, freezes: &[FreezeFrame]) -> ClipResult<Self> {
        check_freezes(freezes, self.frames.len())?;
        let mut clip = self.clone();
        for freeze in freezes {
            let source = &self.frames[freeze.replacement];
            for frame in &mut clip.frames[freeze.start..=freeze.end] {
                *frame = source.clone();
            }
        }
        Ok(clip)
    }

    fn fix_interlaced_fades(&self, params: &FadeFix) -> ClipResult<Self> {
        Ok(self.map_frames(|f| filters::fix_frame(f, params)))
    }

    fn bob(&self, order: FieldOrder) -> ClipResult<Self> {
        Ok(self.map_frames(|f| filters::bob_frame(f, order)))
    }
}

impl MetricsSource for MemoryClip {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn frame_props(&self, n: usize) -> ClipResult<FrameProps> {
        self.get_frame(n).map(|f| f.props.clone())
    }
}
