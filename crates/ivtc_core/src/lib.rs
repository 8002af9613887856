//! ivtc core - Wobbly project replay, inverse telecine and VFR timecodes.
//!
//! This crate holds all of the logic behind the `ivtc` command line tool.
//! Frame operations go through the [`clip::Clip`] trait, so the same replay
//! pipeline can run on frames in memory or emit a VapourSynth script.

pub mod aspect;
pub mod clip;
pub mod config;
pub mod filters;
pub mod ivtc;
pub mod logging;
pub mod models;
pub mod timecodes;
pub mod wobbly;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
