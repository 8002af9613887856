//! VIVTC field matching and decimation.

use super::VfmMode;
use crate::clip::{Clip, ClipError, ClipResult, ScriptClip};
use crate::models::FieldOrder;
use crate::wobbly::{VDecParams, VfmParams};

/// Replacement for frames VFM still flags as combed.
#[derive(Debug, Clone, Default)]
pub enum PostProcess {
    /// Keep the combed match.
    #[default]
    None,
    /// Single-rate bob of the input in the matching field order.
    Bob,
    /// Frames of a clip derived from the same input.
    Clip(ScriptClip),
}

impl PostProcess {
    pub fn name(&self) -> &'static str {
        match self {
            PostProcess::None => "none",
            PostProcess::Bob => "bob",
            PostProcess::Clip(_) => "clip",
        }
    }
}

/// Field-match `clip` with VFM.
///
/// `order` falls back to the clip's own field order, which must be TFF or
/// BFF. Frames VFM marks `_Combed` are taken from `postprocess`. The result
/// is progressive and keeps the input length.
pub fn vfm(
    clip: &ScriptClip,
    order: Option<FieldOrder>,
    mode: VfmMode,
    postprocess: &PostProcess,
) -> ClipResult<ScriptClip> {
    let order = order.unwrap_or_else(|| clip.field_order());
    if !order.is_interlaced() {
        return Err(ClipError::invalid_parameter(
            "VFM needs a top or bottom field first clip",
        ));
    }

    let tff = i64::from(order.is_tff());
    let params = VfmParams {
        order: tff,
        field: tff,
        mode: mode.index(),
        ..VfmParams::default()
    };
    let matched = clip.vfm(&params);
    let out = match postprocess {
        PostProcess::None => matched,
        PostProcess::Bob => {
            let bobbed = clip.bob(order)?;
            matched.replace_where(&bobbed, &matched, "_Combed", 1)?
        }
        PostProcess::Clip(replacement) => {
            matched.replace_where(replacement, &matched, "_Combed", 1)?
        }
    };
    tracing::debug!(
        "[IVTC] VFM {} mode {}, postprocess {}",
        order.name(),
        mode,
        postprocess.name()
    );
    Ok(out.with_field_order(FieldOrder::Progressive))
}

/// Drop one frame per cycle with VDecimate.
///
/// With `weight > 0`, a dry run first finds the frames to drop and those are
/// swapped for `(1 - weight)·current + weight·next` blends before the real
/// pass, which then decides on the unblended input. A dry run in `params`
/// returns the metrics clip unchanged in length.
pub fn vdecimate(clip: &ScriptClip, params: &VDecParams, weight: f64) -> ClipResult<ScriptClip> {
    if !(0.0..1.0).contains(&weight) {
        return Err(ClipError::invalid_parameter(format!(
            "blend weight must be in [0, 1), got {}",
            weight
        )));
    }
    if params.cycle < 2 {
        return Err(ClipError::invalid_parameter(format!(
            "decimation cycle must be at least 2, got {}",
            params.cycle
        )));
    }
    if params.dryrun || weight == 0.0 {
        return Ok(clip.vdecimate(params));
    }

    let stats = clip.vdecimate(&VDecParams {
        dryrun: true,
        ..params.clone()
    });
    let blended = clip.average_frames([0.0, 1.0 - weight, weight]);
    let spliced = clip.replace_where(&blended, &stats, "VDecimateDrop", 1)?;
    clip.vdecimate_onto(params, &spliced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_rational::Rational64;

    fn telecined(frames: usize) -> ScriptClip {
        ScriptClip::blank(720, 480, frames, Rational64::new(30000, 1001))
            .with_field_order(FieldOrder::Tff)
    }

    #[test]
    fn vfm_uses_clip_order_and_mode() {
        let out = vfm(&telecined(20), None, VfmMode::ThreeWay, &PostProcess::None).unwrap();
        let script = out.to_script();
        assert!(script.contains("core.vivtc.VFM("));
        assert!(script.contains("order=1, field=1, mode=4,"));
        assert_eq!(out.field_order(), FieldOrder::Progressive);
        assert_eq!(out.num_frames(), 20);
    }

    #[test]
    fn vfm_rejects_progressive_input() {
        let progressive = ScriptClip::blank(720, 480, 20, Rational64::new(30000, 1001));
        assert!(matches!(
            vfm(&progressive, None, VfmMode::default(), &PostProcess::None),
            Err(ClipError::InvalidParameter(_))
        ));
        assert!(vfm(&progressive, Some(FieldOrder::Bff), VfmMode::default(), &PostProcess::None).is_ok());
    }

    #[test]
    fn vfm_bobs_combed_leftovers() {
        let out = vfm(&telecined(20), None, VfmMode::default(), &PostProcess::Bob).unwrap();
        let script = out.to_script();
        assert!(script.contains("core.resize.Bob("));
        assert!(script.contains("f.props.get(\"_Combed\") == 1"));
    }

    #[test]
    fn vfm_postprocess_clip_must_match_length() {
        let source = telecined(20);
        let short = PostProcess::Clip(telecined(19));
        assert!(matches!(
            vfm(&source, None, VfmMode::default(), &short),
            Err(ClipError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn weighted_decimation_blends_before_dropping() {
        let out = vdecimate(&telecined(20), &VDecParams::default(), 0.5).unwrap();
        assert_eq!(out.num_frames(), 16);
        let script = out.to_script();
        assert!(script.contains("core.std.AverageFrames("));
        assert!(script.contains("weights=[0.0, 0.5, 0.5]"));
        assert!(script.contains("f.props.get(\"VDecimateDrop\") == 1"));
        assert!(script.contains("dryrun=True)"));
        assert!(script.contains("dryrun=False, clip2="));
    }

    #[test]
    fn plain_decimation_and_bad_weights() {
        let out = vdecimate(&telecined(20), &VDecParams::default(), 0.0).unwrap();
        assert_eq!(out.num_frames(), 16);
        assert!(!out.to_script().contains("AverageFrames"));

        assert!(vdecimate(&telecined(20), &VDecParams::default(), 1.0).is_err());
        let no_cycle = VDecParams {
            cycle: 1,
            ..VDecParams::default()
        };
        assert!(vdecimate(&telecined(20), &no_cycle, 0.0).is_err());
    }
}
