//! Field matching from precomputed match tags.
//!
//! Rebuilds every frame from the two fields its tag names. Neighbours past
//! the clip edges are clamped to the current frame.

use crate::clip::{ClipError, ClipResult};
use crate::models::{FieldOrder, Frame, Match};

/// Build a single output frame for `n` from its match tag.
///
/// Props always come from the current frame.
pub fn match_frame(frames: &[Frame], n: usize, tag: Match, order: FieldOrder) -> ClipResult<Frame> {
    let last = frames
        .len()
        .checked_sub(1)
        .ok_or_else(|| ClipError::out_of_range(n, 0))?;
    if n > last {
        return Err(ClipError::out_of_range(n, frames.len()));
    }

    let cur = &frames[n];
    let prev = &frames[n.saturating_sub(1)];
    let next = &frames[(n + 1).min(last)];

    // (top source, bottom source)
    let (top, bottom) = match (order.is_tff(), tag) {
        (_, Match::C) => return Ok(cur.clone()),
        (true, Match::P) => (cur, prev),
        (true, Match::N) => (cur, next),
        (true, Match::B) => (prev, cur),
        (true, Match::U) => (next, cur),
        (false, Match::P) => (prev, cur),
        (false, Match::N) => (next, cur),
        (false, Match::B) => (cur, prev),
        (false, Match::U) => (cur, next),
    };

    let mut out = Frame::from_fields(top, bottom).ok_or_else(|| {
        ClipError::GeometryMismatch(format!("frame {} cannot be woven with its neighbour", n))
    })?;
    out.props = cur.props.clone();
    Ok(out)
}

/// Field-match a whole frame sequence.
pub fn field_hint(frames: &[Frame], matches: &[Match], order: FieldOrder) -> ClipResult<Vec<Frame>> {
    if matches.len() != frames.len() {
        return Err(ClipError::length_mismatch(frames.len(), matches.len()));
    }
    matches
        .iter()
        .enumerate()
        .map(|(n, &tag)| match_frame(frames, n, tag, order))
        .collect()
}
