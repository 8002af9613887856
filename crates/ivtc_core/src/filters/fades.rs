//! Interlaced fade correction.
//!
//! A fade applied to interlaced material before telecine leaves the two
//! fields of a frame at different brightness. Each plane is rescaled so
//! both fields land on a common average: the mean of the two field averages,
//! the darker one, or the brighter one.
//!
//! Field averages are measured relative to a per-plane baseline colour
//! (black for luma). Rows whose own field average equals the baseline are
//! passed through untouched. Only the selected planes are touched; by
//! default that is luma alone.

use serde::{Deserialize, Serialize};

use crate::models::{FadeMode, Frame};

/// Parameters for [`fix_frame`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FadeFix {
    /// How the two field averages are combined.
    #[serde(default)]
    pub mode: FadeMode,
    /// Baseline per plane, normalised to `[0, 1]`. The last entry repeats
    /// for planes past the end.
    #[serde(default = "default_colors")]
    pub colors: Vec<f64>,
    /// Plane indices to correct.
    #[serde(default = "default_planes")]
    pub planes: Vec<usize>,
}

fn default_colors() -> Vec<f64> {
    vec![0.0]
}

fn default_planes() -> Vec<usize> {
    vec![0]
}

impl Default for FadeFix {
    fn default() -> Self {
        Self {
            mode: FadeMode::Average,
            colors: default_colors(),
            planes: default_planes(),
        }
    }
}

impl FadeFix {
    pub fn new(mode: FadeMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_colors(mut self, colors: Vec<f64>) -> Self {
        self.colors = colors;
        self
    }

    pub fn with_planes(mut self, planes: Vec<usize>) -> Self {
        self.planes = planes;
        self
    }

    pub fn processes(&self, plane: usize) -> bool {
        self.planes.contains(&plane)
    }

    /// Baseline colour for a plane.
    pub fn color(&self, plane: usize) -> f64 {
        self.colors
            .get(plane)
            .or_else(|| self.colors.last())
            .copied()
            .unwrap_or(0.0)
    }

    /// Target average for a plane given both field averages.
    ///
    /// Chroma planes in darken/brighten mode pick the field whose offset
    /// from the baseline is smaller/larger in magnitude, so negative chroma
    /// offsets are handled symmetrically.
    pub fn target(&self, plane: usize, top: f64, bottom: f64) -> f64 {
        match (self.mode, plane) {
            (FadeMode::Average, _) => (top + bottom) / 2.0,
            (FadeMode::Darken, 0) => top.min(bottom),
            (FadeMode::Brighten, 0) => top.max(bottom),
            (FadeMode::Darken, _) => {
                if top.abs() < bottom.abs() {
                    top
                } else {
                    bottom
                }
            }
            (FadeMode::Brighten, _) => {
                if top.abs() > bottom.abs() {
                    top
                } else {
                    bottom
                }
            }
        }
    }
}

/// Correct a single fade frame.
pub fn fix_frame(frame: &Frame, params: &FadeFix) -> Frame {
    let mut out = frame.clone();
    for (index, plane) in out.planes.iter_mut().enumerate() {
        if !params.processes(index) {
            continue;
        }
        let color = params.color(index);
        let top = plane.field_average(0) - color;
        let bottom = plane.field_average(1) - color;
        let target = params.target(index, top, bottom);

        for y in 0..plane.height() {
            let own = if y % 2 == 1 { bottom } else { top };
            if own == 0.0 {
                continue;
            }
            let scale = target / own;
            for sample in plane.row_mut(y) {
                *sample = ((*sample as f64 - color) * scale + color) as f32;
            }
        }
    }
    out
}

/// Absolute difference between the two field averages of the first plane.
///
/// This is the quantity stored as the field difference of an interlaced fade.
pub fn field_difference(frame: &Frame) -> f64 {
    frame
        .planes
        .first()
        .map(|p| (p.field_average(0) - p.field_average(1)).abs())
        .unwrap_or(0.0)
}

/// Expression computing the corrected value of one plane, on 32-bit float
/// samples. Planes that are not processed get an empty expression (copy).
///
/// Expects the frame to carry `ftAvg{plane}` and `fbAvg{plane}` props holding
/// the baseline-relative field averages.
pub fn plane_expr(plane: usize, params: &FadeFix) -> String {
    if !params.processes(plane) {
        return String::new();
    }
    let color = params.color(plane);
    let (t, b) = (format!("x.ftAvg{}", plane), format!("x.fbAvg{}", plane));
    let target = match (params.mode, plane) {
        (FadeMode::Average, _) => format!("{t} {b} + 2 /"),
        (FadeMode::Darken, 0) => format!("{t} {b} min"),
        (FadeMode::Brighten, 0) => format!("{t} {b} max"),
        (FadeMode::Darken, _) => format!("{t} abs {b} abs < {t} {b} ?"),
        (FadeMode::Brighten, _) => format!("{t} abs {b} abs > {t} {b} ?"),
    };
    format!(
        "Y 2 % {b} {t} ? AVG! AVG@ 0 = x x {color} - {target} AVG@ / * {color} + ?",
        b = b,
        t = t,
        color = color,
        target = target
    )
}

/// Prop expressions for `ftAvg{i}`/`fbAvg{i}`, reading plane stats from the
/// top (`y`) and bottom (`z`) field clips.
pub fn field_average_props(num_planes: usize, params: &FadeFix) -> Vec<(String, String)> {
    (0..num_planes)
        .filter(|&i| params.processes(i))
        .flat_map(|i| {
            let color = params.color(i);
            [
                (
                    format!("ftAvg{}", i),
                    format!("y.P{}Average {} -", i, color),
                ),
                (
                    format!("fbAvg{}", i),
                    format!("z.P{}Average {} -", i, color),
                ),
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Plane;

    fn fade_frame(top: f32, bottom: f32) -> Frame {
        let mut plane = Plane::filled(4, 4, top);
        for y in (1..4).step_by(2) {
            plane.row_mut(y).fill(bottom);
        }
        Frame::new(vec![plane])
    }

    fn field_values(frame: &Frame) -> (f32, f32) {
        let plane = &frame.planes[0];
        (plane.get(0, 0), plane.get(0, 1))
    }

    #[test]
    fn average_mode_levels_both_fields() {
        let fixed = fix_frame(&fade_frame(0.2, 0.4), &FadeFix::default());
        let (top, bottom) = field_values(&fixed);
        assert!((top - 0.3).abs() < 1e-6);
        assert!((bottom - 0.3).abs() < 1e-6);
    }

    #[test]
    fn darken_and_brighten_pick_extremes() {
        let dark = fix_frame(&fade_frame(0.2, 0.4), &FadeFix::new(FadeMode::Darken));
        let (top, bottom) = field_values(&dark);
        assert!((top - 0.2).abs() < 1e-6 && (bottom - 0.2).abs() < 1e-6);

        let bright = fix_frame(&fade_frame(0.2, 0.4), &FadeFix::new(FadeMode::Brighten));
        let (top, bottom) = field_values(&bright);
        assert!((top - 0.4).abs() < 1e-6 && (bottom - 0.4).abs() < 1e-6);
    }

    #[test]
    fn zero_average_passes_through() {
        let frame = fade_frame(0.0, 0.0);
        assert_eq!(fix_frame(&frame, &FadeFix::default()), frame);

        // Only the zero-average field is left alone
        let frame = fade_frame(0.0, 0.5);
        let fixed = fix_frame(&frame, &FadeFix::default());
        let (top, bottom) = field_values(&fixed);
        assert_eq!(top, 0.0);
        assert!((bottom - 0.25).abs() < 1e-6);
    }

    #[test]
    fn chroma_darken_compares_magnitude() {
        let params = FadeFix::new(FadeMode::Darken).with_colors(vec![0.0, 0.5]);
        // offsets -0.3 and +0.1: the smaller magnitude wins
        assert_eq!(params.target(1, -0.3, 0.1), 0.1);
        assert_eq!(params.target(0, -0.3, 0.1), -0.3);
        assert_eq!(params.color(2), 0.5);
    }

    #[test]
    fn chroma_is_left_alone_by_default() {
        let mut frame = fade_frame(0.2, 0.4);
        frame.planes.push(frame.planes[0].clone());
        let fixed = fix_frame(&frame, &FadeFix::default());
        assert!((fixed.planes[0].get(0, 1) - 0.3).abs() < 1e-6);
        assert_eq!(fixed.planes[1], frame.planes[1]);

        let all = FadeFix::default().with_planes(vec![0, 1]);
        let fixed = fix_frame(&frame, &all);
        assert!((fixed.planes[1].get(0, 1) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn unprocessed_planes_copy_in_expressions() {
        let params = FadeFix::default();
        assert!(plane_expr(1, &params).is_empty());
        let props = field_average_props(3, &params);
        assert_eq!(props.len(), 2);
        assert_eq!(props[0], ("ftAvg0".to_string(), "y.P0Average 0 -".to_string()));
    }

    #[test]
    fn field_difference_is_absolute() {
        let frame = fade_frame(0.6, 0.2);
        assert!((field_difference(&frame) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn expression_switches_on_row_parity() {
        let expr = plane_expr(0, &FadeFix::default());
        assert!(expr.starts_with("Y 2 % x.fbAvg0 x.ftAvg0 ?"));
        assert!(expr.contains("x.ftAvg0 x.fbAvg0 + 2 /"));

        let expr = plane_expr(1, &FadeFix::new(FadeMode::Brighten).with_planes(vec![0, 1, 2]));
        assert!(expr.contains("x.ftAvg1 abs x.fbAvg1 abs >"));
    }
}
