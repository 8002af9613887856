//! Core data models shared across the crate.

pub mod enums;
pub mod frame;

pub use enums::{FadeMode, FieldOrder, Match, OrphanMatch, SceneChangeMode};
pub use frame::{Frame, FrameProps, FramePropsPlan, Plane, PropValue};
