//! Deblending of `AABBA`-style blended telecine.
//!
//! Within every five-frame group starting at `start`, frame `start + 2`
//! holds `(C + D) / 2` and `start + 3` holds `(D + A) / 2`. The clean `D` is
//! recovered from both blends and their clean neighbours; the second blend
//! becomes a duplicate and can be dropped.

use std::collections::BTreeSet;

use crate::clip::{ClipError, ClipResult};
use crate::models::Frame;

/// Frames rebuilt by [`deblend_frames`]: `start + 2`, `start + 7`, ...
pub fn blended_frames(start: usize, num_frames: usize) -> BTreeSet<usize> {
    (start + 2..num_frames.saturating_sub(1)).step_by(5).collect()
}

/// Duplicates left after deblending: `start + 3`, `start + 8`, ...
pub fn duplicate_frames(start: usize, num_frames: usize) -> BTreeSet<usize> {
    (start + 3..num_frames.saturating_sub(1)).step_by(5).collect()
}

/// `D = (DA - A/2) + (CD - C/2)`, clamped to the valid range.
fn unblend(c: &Frame, cd: &Frame, da: &Frame, a: &Frame) -> Frame {
    let mut out = cd.clone();
    for (i, plane) in out.planes.iter_mut().enumerate() {
        let (c, da, a) = (&c.planes[i], &da.planes[i], &a.planes[i]);
        for y in 0..plane.height() {
            for x in 0..plane.width() {
                let v = (da.get(x, y) - a.get(x, y) / 2.0) + (plane.get(x, y) - c.get(x, y) / 2.0);
                plane.set(x, y, v.clamp(0.0, 1.0));
            }
        }
    }
    out
}

pub fn deblend_frames(frames: &[Frame], start: usize) -> ClipResult<Vec<Frame>> {
    let last = frames.len().saturating_sub(1);
    let mut out = frames.to_vec();
    for n in blended_frames(start, frames.len()) {
        let (c, cd, da, a) = (
            &frames[n - 1],
            &frames[n],
            &frames[n + 1],
            &frames[(n + 2).min(last)],
        );
        if ![c, da, a].iter().all(|f| f.same_geometry(cd)) {
            return Err(ClipError::GeometryMismatch(format!(
                "frames around {} differ in size",
                n
            )));
        }
        out[n] = unblend(c, cd, da, a);
    }
    Ok(out)
}
