//! In-memory frame representation.
//!
//! Samples are stored as `f32` normalised to `[0, 1]` so every filter works
//! in float, regardless of the bit depth the source was decoded at.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single frame property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Int(i64),
    Float(f64),
    Data(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
}

impl PropValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(v) => Some(*v),
            PropValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropValue::Int(v) => Some(*v as f64),
            PropValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&str> {
        match self {
            PropValue::Data(s) => Some(s),
            _ => None,
        }
    }

    /// Integer array view; a scalar int is treated as a one-element array.
    pub fn as_int_array(&self) -> Option<Vec<i64>> {
        match self {
            PropValue::IntArray(v) => Some(v.clone()),
            PropValue::Int(v) => Some(vec![*v]),
            _ => None,
        }
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        PropValue::Int(v)
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Int(i64::from(v))
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        PropValue::Float(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Data(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::Data(v)
    }
}

/// Frame property map, keyed by property name.
pub type FrameProps = BTreeMap<String, PropValue>;

/// Metadata to stamp on a clip: shared props plus per-frame overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FramePropsPlan {
    /// Props set on every frame.
    pub all: FrameProps,
    /// Props set on individual frames, applied after `all`.
    pub frames: BTreeMap<usize, FrameProps>,
}

impl FramePropsPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_all(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.all.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, frame: usize, key: impl Into<String>, value: impl Into<PropValue>) {
        self.frames
            .entry(frame)
            .or_default()
            .insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty() && self.frames.is_empty()
    }

    /// Highest frame index with an override.
    pub fn last_frame(&self) -> Option<usize> {
        self.frames.keys().next_back().copied()
    }

    /// Apply the plan to one frame's props.
    pub fn apply_to(&self, n: usize, props: &mut FrameProps) {
        props.extend(self.all.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(own) = self.frames.get(&n) {
            props.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }
}

/// One plane of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Plane {
    /// Create a plane filled with a constant value.
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Create a plane from row-major samples. Returns `None` on size mismatch.
    pub fn from_data(width: usize, height: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == width * height).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    pub fn row(&self, y: usize) -> &[f32] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        &mut self.data[y * self.width..(y + 1) * self.width]
    }

    /// Mean of all samples.
    pub fn average(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&v| v as f64).sum::<f64>() / self.data.len() as f64
    }

    /// Mean of the rows of one field (`parity` 0 = even rows = top field).
    pub fn field_average(&self, parity: usize) -> f64 {
        let rows: Vec<usize> = (parity..self.height).step_by(2).collect();
        if rows.is_empty() || self.width == 0 {
            return 0.0;
        }
        let sum: f64 = rows
            .iter()
            .flat_map(|&y| self.row(y).iter())
            .map(|&v| v as f64)
            .sum();
        sum / (rows.len() * self.width) as f64
    }

    /// Rows of one field as a half-height plane.
    pub fn field(&self, parity: usize) -> Plane {
        let mut data = Vec::with_capacity(self.width * self.height.div_ceil(2));
        for y in (parity..self.height).step_by(2) {
            data.extend_from_slice(self.row(y));
        }
        let height = data.len() / self.width.max(1);
        Plane {
            width: self.width,
            height,
            data,
        }
    }

    /// Interleave two fields back into a full plane.
    pub fn weave(top: &Plane, bottom: &Plane) -> Option<Plane> {
        if top.width != bottom.width || top.height < bottom.height {
            return None;
        }
        let width = top.width;
        let height = top.height + bottom.height;
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            let source = if y % 2 == 0 { top } else { bottom };
            data.extend_from_slice(source.row(y / 2));
        }
        Some(Plane {
            width,
            height,
            data,
        })
    }
}

/// A frame: planes plus properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub planes: Vec<Plane>,
    pub props: FrameProps,
}

impl Frame {
    pub fn new(planes: Vec<Plane>) -> Self {
        Self {
            planes,
            props: FrameProps::new(),
        }
    }

    /// Single-plane frame filled with `value`.
    pub fn gray(width: usize, height: usize, value: f32) -> Self {
        Self::new(vec![Plane::filled(width, height, value)])
    }

    pub fn width(&self) -> usize {
        self.planes.first().map(Plane::width).unwrap_or(0)
    }

    pub fn height(&self) -> usize {
        self.planes.first().map(Plane::height).unwrap_or(0)
    }

    /// Planes of both fields, `(top, bottom)`.
    pub fn separate_fields(&self) -> (Vec<Plane>, Vec<Plane>) {
        let top = self.planes.iter().map(|p| p.field(0)).collect();
        let bottom = self.planes.iter().map(|p| p.field(1)).collect();
        (top, bottom)
    }

    /// Build a frame from the top field of `top` and the bottom field of `bottom`.
    ///
    /// Props are taken from `top`.
    pub fn from_fields(top: &Frame, bottom: &Frame) -> Option<Frame> {
        if top.planes.len() != bottom.planes.len() {
            return None;
        }
        let mut planes = Vec::with_capacity(top.planes.len());
        for (t, b) in top.planes.iter().zip(&bottom.planes) {
            if t.width != b.width || t.height != b.height {
                return None;
            }
            let mut plane = t.clone();
            for y in (1..plane.height).step_by(2) {
                plane.row_mut(y).copy_from_slice(b.row(y));
            }
            planes.push(plane);
        }
        Some(Frame {
            planes,
            props: top.props.clone(),
        })
    }

    pub fn same_geometry(&self, other: &Frame) -> bool {
        self.planes.len() == other.planes.len()
            && self
                .planes
                .iter()
                .zip(&other.planes)
                .all(|(a, b)| a.width == b.width && a.height == b.height)
    }
}
