//! Single-rate bob deinterlacing.
//!
//! Keeps one field and rebuilds the other by linear interpolation of the
//! lines above and below.

use crate::models::{FieldOrder, Frame, Plane};

fn bob_plane(plane: &Plane, keep_parity: usize) -> Plane {
    let height = plane.height();
    let mut out = plane.clone();
    for y in ((1 - keep_parity)..height).step_by(2) {
        let above = y.checked_sub(1);
        let below = (y + 1 < height).then_some(y + 1);
        match (above, below) {
            (Some(a), Some(b)) => {
                let (ra, rb) = (plane.row(a), plane.row(b));
                for (x, sample) in out.row_mut(y).iter_mut().enumerate() {
                    *sample = (ra[x] + rb[x]) / 2.0;
                }
            }
            (Some(edge), None) | (None, Some(edge)) => {
                out.row_mut(y).copy_from_slice(plane.row(edge));
            }
            (None, None) => {}
        }
    }
    out
}

/// Deinterlace a frame keeping the first field of `order`.
///
/// Top field first (and progressive) keeps the even lines, bottom field first
/// keeps the odd lines.
pub fn bob_frame(frame: &Frame, order: FieldOrder) -> Frame {
    let keep_parity = if order.is_tff() { 0 } else { 1 };
    Frame {
        planes: frame
            .planes
            .iter()
            .map(|p| bob_plane(p, keep_parity))
            .collect(),
        props: frame.props.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(height: usize) -> Frame {
        let data = (0..height).map(|y| y as f32 / 10.0).collect();
        Frame::new(vec![Plane::from_data(1, height, data).unwrap()])
    }

    #[test]
    fn tff_keeps_even_lines() {
        let mut frame = ramp(5);
        frame.planes[0].set(0, 1, 0.9);
        let out = bob_frame(&frame, FieldOrder::Tff);
        let plane = &out.planes[0];
        assert_eq!(plane.get(0, 0), 0.0);
        assert_eq!(plane.get(0, 2), 0.2);
        assert!((plane.get(0, 1) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn bff_keeps_odd_lines_and_copies_edges() {
        let frame = ramp(4);
        let out = bob_frame(&frame, FieldOrder::Bff);
        let plane = &out.planes[0];
        assert_eq!(plane.get(0, 1), 0.1);
        assert_eq!(plane.get(0, 3), 0.3);
        // Top edge has no line above
        assert_eq!(plane.get(0, 0), 0.1);
        assert!((plane.get(0, 2) - 0.2).abs() < 1e-6);
    }
}
