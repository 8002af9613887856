//! Pixel-level filters used by the in-memory clip.
//!
//! Each filter also exposes the expression text the script backend emits for
//! the same operation, so both backends share one definition of the math.

pub mod bob;
pub mod deblend;
pub mod fades;
pub mod fieldmatch;
pub mod vinverse;

pub use bob::bob_frame;
pub use deblend::{blended_frames, deblend_frames, duplicate_frames};
pub use fades::{field_difference, fix_frame, FadeFix};
pub use fieldmatch::{field_hint, match_frame};
pub use vinverse::{vinverse_expr, vinverse_frame, VinverseParams};
