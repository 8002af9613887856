//! Residual combing removal (Vinverse).
//!
//! The frame is blurred vertically twice: once with a comb blur and once
//! more with a wider contra blur. The difference between the two blurs
//! (scaled by the contra-sharpening strength) bounds how far the comb-blurred
//! image may be pushed back towards the source.

use serde::{Deserialize, Serialize};

use crate::clip::{ClipError, ClipResult};
use crate::models::{Frame, Plane};

const COMB_BLUR: [f32; 3] = [1.0, 2.0, 1.0];
const CONTRA_BLUR: [f32; 5] = [1.0, 4.0, 6.0, 4.0, 1.0];

/// Vinverse parameters. `thr` and `amnt` are expressed on the 8-bit scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VinverseParams {
    /// Contra-sharpening strength.
    pub sstr: f64,
    /// Scale applied where the comb and contra differences disagree in sign.
    pub scl: f64,
    /// Differences below this are left untouched.
    pub thr: f64,
    /// Maximum change per sample. `None` or 255 disables clamping.
    pub amnt: Option<f64>,
}

impl Default for VinverseParams {
    fn default() -> Self {
        Self {
            sstr: 2.7,
            scl: 0.25,
            thr: 0.0,
            amnt: None,
        }
    }
}

impl VinverseParams {
    pub fn validate(&self) -> ClipResult<()> {
        if !(0.0..=255.0).contains(&self.thr) {
            return Err(ClipError::invalid_parameter(format!(
                "vinverse thr must be within 0..=255, got {}",
                self.thr
            )));
        }
        if let Some(amnt) = self.amnt {
            if !(0.0..=255.0).contains(&amnt) {
                return Err(ClipError::invalid_parameter(format!(
                    "vinverse amnt must be within 0..=255, got {}",
                    amnt
                )));
            }
        }
        Ok(())
    }

    /// Clamp amount normalised to `[0, 1]`, if clamping is enabled.
    fn clamp_amount(&self) -> Option<f32> {
        self.amnt
            .filter(|&a| a < 255.0)
            .map(|a| (a / 255.0) as f32)
    }
}

/// Vertical convolution with edge clamping.
fn vertical_blur(plane: &Plane, kernel: &[f32]) -> Plane {
    let radius = kernel.len() / 2;
    let norm: f32 = kernel.iter().sum();
    let (width, height) = (plane.width(), plane.height());
    let mut out = plane.clone();
    if height == 0 {
        return out;
    }
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y + k).saturating_sub(radius).min(height - 1);
                acc += weight * plane.get(x, sy);
            }
            out.set(x, y, acc / norm);
        }
    }
    out
}

fn vinverse_plane(plane: &Plane, params: &VinverseParams) -> Plane {
    let blurred = vertical_blur(plane, &COMB_BLUR);
    let blurred2 = vertical_blur(&blurred, &CONTRA_BLUR);
    let thr = (params.thr / 255.0) as f32;
    let sstr = params.sstr as f32;
    let scl = params.scl as f32;
    let amount = params.clamp_amount();

    let mut out = plane.clone();
    for y in 0..plane.height() {
        for x in 0..plane.width() {
            let src = plane.get(x, y);
            let b1 = blurred.get(x, y);
            let d1 = src - b1;
            if d1.abs() < thr {
                continue;
            }
            let d2 = (b1 - blurred2.get(x, y)) * sstr;
            let d3 = if d1.abs() < d2.abs() { d1 } else { d2 };
            let d3 = if (d1 > 0.0) != (d2 > 0.0) { d3 * scl } else { d3 };
            let mut value = b1 + d3;
            if let Some(a) = amount {
                value = value.clamp(src - a, src + a);
            }
            out.set(x, y, value);
        }
    }
    out
}

/// Apply Vinverse to every plane of a frame.
pub fn vinverse_frame(frame: &Frame, params: &VinverseParams) -> Frame {
    Frame {
        planes: frame
            .planes
            .iter()
            .map(|p| vinverse_plane(p, params))
            .collect(),
        props: frame.props.clone(),
    }
}

/// Expression over `x` (source), `y` (comb blur) and `z` (contra blur).
pub fn vinverse_expr(params: &VinverseParams) -> String {
    let thr = params.thr / 255.0;
    let mut expr = format!(
        "x y - D1! D1@ abs D1A! D1A@ {thr} < x y z - {sstr} * D2! D1A@ D2@ abs < D1@ D2@ ? D3! \
         D1@ 0 > D2@ 0 > xor D3@ {scl} * D3@ ? y +",
        thr = thr,
        sstr = params.sstr,
        scl = params.scl
    );
    if let Some(amnt) = params.clamp_amount() {
        expr.push_str(&format!(" x {a} - x {a} + clamp", a = amnt));
    }
    expr.push_str(" ?");
    expr
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combed(width: usize, height: usize) -> Frame {
        let mut plane = Plane::filled(width, height, 0.2);
        for y in (1..height).step_by(2) {
            plane.row_mut(y).fill(0.8);
        }
        Frame::new(vec![plane])
    }

    fn comb_amplitude(frame: &Frame) -> f32 {
        let plane = &frame.planes[0];
        (plane.get(0, 3) - plane.get(0, 4)).abs()
    }

    #[test]
    fn flat_frame_is_unchanged() {
        let frame = Frame::gray(4, 8, 0.5);
        let out = vinverse_frame(&frame, &VinverseParams::default());
        for (a, b) in out.planes[0].data().iter().zip(frame.planes[0].data()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn reduces_combing() {
        let frame = combed(4, 12);
        let out = vinverse_frame(&frame, &VinverseParams::default());
        assert!(comb_amplitude(&out) < comb_amplitude(&frame));
    }

    #[test]
    fn amount_limits_change() {
        let frame = combed(4, 12);
        let params = VinverseParams {
            amnt: Some(10.0),
            ..Default::default()
        };
        let out = vinverse_frame(&frame, &params);
        let limit = 10.0 / 255.0 + 1e-6;
        for (a, b) in out.planes[0].data().iter().zip(frame.planes[0].data()) {
            assert!((a - b).abs() <= limit);
        }
    }

    #[test]
    fn threshold_skips_small_differences() {
        let frame = combed(4, 12);
        let params = VinverseParams {
            thr: 255.0,
            ..Default::default()
        };
        assert_eq!(vinverse_frame(&frame, &params), frame);
    }

    #[test]
    fn expression_clamps_only_when_amount_set() {
        assert!(!vinverse_expr(&VinverseParams::default()).contains("clamp"));
        let params = VinverseParams {
            amnt: Some(255.0),
            ..Default::default()
        };
        assert!(!vinverse_expr(&params).contains("clamp"));
        let params = VinverseParams {
            amnt: Some(4.0),
            ..Default::default()
        };
        assert!(vinverse_expr(&params).contains("clamp"));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let params = VinverseParams {
            thr: 300.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
