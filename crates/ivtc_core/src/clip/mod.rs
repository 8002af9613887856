//! Clip capability interface.
//!
//! The replay pipeline never touches pixels directly. It drives a [`Clip`],
//! which either evaluates operations eagerly on frames in memory
//! ([`MemoryClip`]) or records them as host calls in a VapourSynth script
//! ([`ScriptClip`]).
//!
//! # Usage
//!
//! ```ignore
//! use ivtc_core::clip::{Clip, MemoryClip};
//!
//! let clip = MemoryClip::new(frames, Rational64::new(30000, 1001));
//! let matched = clip.field_hint(&matches, FieldOrder::Tff)?;
//! let output = matched.delete_frames(&decimated)?;
//! ```

mod error;
mod memory;
mod script;
#[cfg(feature = "vapoursynth")]
pub mod vapoursynth;

use std::collections::BTreeSet;

use num_rational::Rational64;

pub use error::{ClipError, ClipResult};
pub use memory::MemoryClip;
pub use script::{python_literal, ScriptClip};

use crate::filters::FadeFix;
use crate::models::{FieldOrder, FrameProps, FramePropsPlan, Match};
use crate::wobbly::FreezeFrame;

/// Operations the replay pipeline needs from a host clip.
///
/// Every operation returns a new clip and leaves `self` untouched.
pub trait Clip: Sized {
    /// Number of frames.
    fn num_frames(&self) -> usize;

    /// Current field order.
    fn field_order(&self) -> FieldOrder;

    /// Base frame rate of the clip.
    fn frame_rate(&self) -> Rational64;

    /// Set the field order.
    fn with_field_order(&self, order: FieldOrder) -> Self;

    /// Stamp frame properties.
    fn with_frame_props(&self, plan: &FramePropsPlan) -> ClipResult<Self>;

    /// Replace the listed frames with the frames of `replacement` at the
    /// same positions. Both clips must have the same length.
    fn replace_frames(&self, replacement: &Self, frames: &BTreeSet<usize>) -> ClipResult<Self>;

    /// Delete the listed frames in one operation.
    fn delete_frames(&self, frames: &BTreeSet<usize>) -> ClipResult<Self>;

    /// Rebuild every frame from its match tag.
    fn field_hint(&self, matches: &[Match], order: FieldOrder) -> ClipResult<Self>;

    /// Copy each freeze's replacement frame over its range.
    fn freeze_frames(&self, freezes: &[FreezeFrame]) -> ClipResult<Self>;

    /// Level the field brightness of every frame.
    fn fix_interlaced_fades(&self, params: &FadeFix) -> ClipResult<Self>;

    /// Single-rate bob keeping the first field of `order`.
    fn bob(&self, order: FieldOrder) -> ClipResult<Self>;
}

/// Per-frame property access for metric gathering.
pub trait MetricsSource {
    fn frame_count(&self) -> usize;

    fn frame_props(&self, n: usize) -> ClipResult<FrameProps>;
}

/// Ensure every index is inside a clip of `num_frames` frames.
pub(crate) fn check_frames<'a>(
    frames: impl IntoIterator<Item = &'a usize>,
    num_frames: usize,
) -> ClipResult<()> {
    match frames.into_iter().find(|&&n| n >= num_frames) {
        Some(&n) => Err(ClipError::out_of_range(n, num_frames)),
        None => Ok(()),
    }
}

/// Validate freeze ranges against a clip length.
pub(crate) fn check_freezes(freezes: &[FreezeFrame], num_frames: usize) -> ClipResult<()> {
    for freeze in freezes {
        if freeze.start > freeze.end {
            return Err(ClipError::InvalidRange {
                start: freeze.start,
                end: freeze.end,
            });
        }
        check_frames([&freeze.end, &freeze.replacement], num_frames)?;
    }
    Ok(())
}
