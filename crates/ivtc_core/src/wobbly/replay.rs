//! Replaying a project's edit decisions onto a clip.
//!
//! The stage order is fixed: every stage after field matching assumes the
//! frames it sees are already matched, and decimation must come last so the
//! per-frame metadata lines up with the original frame numbers.

use std::collections::BTreeSet;
use std::str::FromStr;

use num_rational::Rational64;
use serde_json::Value;

use super::error::{WobblyError, WobblyResult};
use super::info::OrphanField;
use super::project::{WobblyProject, DECIMATION_CYCLE};
use crate::clip::{Clip, ClipError, ScriptClip};
use crate::filters::FadeFix;
use crate::models::{FieldOrder, FramePropsPlan, Match, OrphanMatch};

/// Which orphan fields get deinterlaced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OrphanHandling {
    /// Leave orphans as matched.
    #[default]
    None,
    /// Deinterlace every orphan.
    All,
    /// Deinterlace orphans with one of these matches.
    Only(BTreeSet<OrphanMatch>),
}

impl OrphanHandling {
    pub fn includes(&self, matched: OrphanMatch) -> bool {
        match self {
            OrphanHandling::None => false,
            OrphanHandling::All => true,
            OrphanHandling::Only(set) => set.contains(&matched),
        }
    }

    /// Interpret a JSON value: a bool, `null`, a match string or a list of
    /// match strings.
    pub fn from_value(value: &Value) -> WobblyResult<Self> {
        match value {
            Value::Null | Value::Bool(false) => Ok(OrphanHandling::None),
            Value::Bool(true) => Ok(OrphanHandling::All),
            Value::String(s) => s.parse(),
            Value::Array(items) => {
                let mut set = BTreeSet::new();
                for item in items {
                    let tag = item
                        .as_str()
                        .filter(|s| s.chars().count() == 1)
                        .and_then(|s| s.chars().next())
                        .and_then(OrphanMatch::from_char)
                        .ok_or_else(|| {
                            WobblyError::type_mismatch(format!(
                                "orphan handling list entries must be one of b, n, p, u; got {}",
                                item
                            ))
                        })?;
                    set.insert(tag);
                }
                Ok(Self::from_set(set))
            }
            other => Err(WobblyError::type_mismatch(format!(
                "orphan handling must be a bool, match or list of matches; got {}",
                other
            ))),
        }
    }

    fn from_set(set: BTreeSet<OrphanMatch>) -> Self {
        if set.is_empty() {
            OrphanHandling::None
        } else {
            OrphanHandling::Only(set)
        }
    }
}

impl FromStr for OrphanHandling {
    type Err = WobblyError;

    /// Accepts `all`/`true`, `none`/`false`, or match letters such as `bn`
    /// or `b,n`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "false" => Ok(OrphanHandling::None),
            "all" | "true" => Ok(OrphanHandling::All),
            letters => {
                let mut set = BTreeSet::new();
                for c in letters.chars().filter(|c| !matches!(c, ',' | ' ')) {
                    let tag = OrphanMatch::from_char(c).ok_or_else(|| {
                        WobblyError::type_mismatch(format!(
                            "'{}' is not an orphan match (expected b, n, p or u)",
                            c
                        ))
                    })?;
                    set.insert(tag);
                }
                Ok(Self::from_set(set))
            }
        }
    }
}

impl std::fmt::Display for OrphanHandling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrphanHandling::None => write!(f, "none"),
            OrphanHandling::All => write!(f, "all"),
            OrphanHandling::Only(set) => {
                for m in set {
                    write!(f, "{}", m)?;
                }
                Ok(())
            }
        }
    }
}

/// Options for [`WobblyProject::apply`].
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Overrides the project's field order.
    pub field_order: Option<FieldOrder>,
    pub orphan_handling: OrphanHandling,
    pub fade: FadeFix,
}

impl WobblyProject {
    /// Orphans selected by `handling`.
    pub fn orphans_to_process(&self, handling: &OrphanHandling) -> Vec<OrphanField> {
        self.orphan_frames
            .iter()
            .filter(|o| handling.includes(o.matched))
            .copied()
            .collect()
    }

    /// Matches with the selected orphan frames forced to `c`.
    pub fn matches_for_replay(&self, orphans: &[OrphanField]) -> Vec<Match> {
        let mut matches = self.matches.clone();
        for orphan in orphans {
            matches[orphan.frame] = Match::C;
        }
        matches
    }

    /// Apply every edit decision to `clip`.
    ///
    /// The clip must have exactly one frame per match. The result has
    /// `num_frames() - decimations.len()` frames and is marked progressive.
    pub fn apply<C: Clip>(&self, clip: C, options: &ReplayOptions) -> WobblyResult<C> {
        let num_frames = self.num_frames();
        if clip.num_frames() != num_frames {
            return Err(ClipError::length_mismatch(num_frames, clip.num_frames()).into());
        }

        let order = options.field_order.unwrap_or(self.field_order);
        if !order.is_interlaced() {
            return Err(WobblyError::UnsupportedFieldOrder(order.field_based() - 1));
        }
        tracing::debug!(
            "[Wobbly] Replaying {} frames ({}, orphans: {})",
            num_frames,
            order,
            options.orphan_handling
        );

        let clip = clip.with_field_order(order);

        let orphans = self.orphans_to_process(&options.orphan_handling);
        let matches = self.matches_for_replay(&orphans);

        let mut clip = clip.field_hint(&matches, order)?;
        let mut match_props = FramePropsPlan::new();
        for (n, m) in matches.iter().enumerate() {
            match_props.set(n, "wobbly_match", m.as_char().to_string());
        }
        clip = clip.with_frame_props(&match_props)?;

        if !self.freeze_frames.is_empty() {
            clip = clip.freeze_frames(&self.freeze_frames)?;
            let mut freeze_props = FramePropsPlan::new();
            for freeze in &self.freeze_frames {
                freeze_props.set(freeze.start, "wobbly_freeze_start", freeze.start as i64);
                freeze_props.set(freeze.start, "wobbly_freeze_end", freeze.end as i64);
                freeze_props.set(freeze.start, "wobbly_freeze_replacement", freeze.replacement as i64);
            }
            clip = clip.with_frame_props(&freeze_props)?;
        }

        if !self.decimations.is_empty() {
            clip = clip.with_frame_props(&self.framerate_props(clip.frame_rate()))?;
        }

        if !self.interlaced_fades.is_empty() {
            let fade_frames: BTreeSet<usize> = self.interlaced_fades.keys().copied().collect();
            let fixed = clip.fix_interlaced_fades(&options.fade)?;
            clip = clip.replace_frames(&fixed, &fade_frames)?;
            let mut fif = FramePropsPlan::new().with_all("wobbly_fif", false);
            for &n in &fade_frames {
                fif.set(n, "wobbly_fif", true);
            }
            clip = clip.with_frame_props(&fif)?;
        }

        if !orphans.is_empty() {
            clip = deinterlace_orphans(clip, &orphans)?;
        }

        let mut combed = FramePropsPlan::new().with_all("wobbly_combed", false);
        for &n in &self.combed_frames {
            combed.set(n, "wobbly_combed", true);
        }
        clip = clip.with_frame_props(&combed)?;

        if !self.decimations.is_empty() {
            clip = clip.delete_frames(&self.decimations)?;
        }

        Ok(clip.with_field_order(FieldOrder::Progressive))
    }

    /// Re-index the input video and apply the project to it.
    pub fn apply_from_source(&self, options: &ReplayOptions) -> WobblyResult<ScriptClip> {
        let source = self.video.source(self.num_frames())?;
        self.apply(source, options)
    }

    /// Per-frame rate metadata derived from the decimation pattern.
    ///
    /// Frames in cycle `n / 5` get `rate * (5 - drops) / 5`; `wobbly_cycle_fps`
    /// holds that rate rounded to a whole number.
    fn framerate_props(&self, base: Rational64) -> FramePropsPlan {
        let cycle = DECIMATION_CYCLE as i64;
        let drops = self.drops_per_cycle();
        let mut plan = FramePropsPlan::new();
        for n in 0..self.num_frames() {
            let kept = cycle - drops[n / DECIMATION_CYCLE] as i64;
            let fps = base * Rational64::new(kept, cycle);
            plan.set(n, "wobbly_cycle_fps", fps.round().to_integer());
            // Duration is the reciprocal of the rate
            plan.set(n, "_DurationNum", *fps.denom());
            plan.set(n, "_DurationDen", *fps.numer());
        }
        plan
    }
}

/// Replace each orphan frame with a single-rate bob of its surviving field.
///
/// `n`/`p` orphans keep the top field, `b`/`u` orphans the bottom one.
pub fn deinterlace_orphans<C: Clip>(clip: C, orphans: &[OrphanField]) -> WobblyResult<C> {
    let mut out = clip;
    for order in [FieldOrder::Tff, FieldOrder::Bff] {
        let frames: BTreeSet<usize> = orphans
            .iter()
            .filter(|o| o.deinterlace_order() == order)
            .map(|o| o.frame)
            .collect();
        if frames.is_empty() {
            continue;
        }
        let deinterlaced = out.bob(order)?;
        out = out.replace_frames(&deinterlaced, &frames)?;
    }

    let mut props = FramePropsPlan::new();
    for orphan in orphans {
        props.set(orphan.frame, "wobbly_orphan_deinterlace", true);
        props.set(orphan.frame, "wobbly_orphan_match", orphan.matched.to_string());
    }
    Ok(out.with_frame_props(&props)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::MemoryClip;
    use crate::models::{Frame, PropValue};
    use crate::wobbly::project::tests::{build, project_json};
    use serde_json::json;

    fn source_clip(count: usize) -> MemoryClip {
        let frames = (0..count)
            .map(|n| {
                let mut frame = Frame::gray(4, 4, (n as f32 + 1.0) / 100.0);
                frame.props.insert("source_frame".into(), PropValue::Int(n as i64));
                frame
            })
            .collect();
        MemoryClip::new(frames, Rational64::new(30000, 1001))
    }

    fn prop(clip: &MemoryClip, n: usize, key: &str) -> PropValue {
        clip.frames()[n].props[key].clone()
    }

    #[test]
    fn output_length_drops_decimated_frames() {
        let mut value = project_json("cccccccccc");
        value["decimated frames"] = json!([2, 7]);
        let project = build(value).unwrap();

        let out = project.apply(source_clip(10), &ReplayOptions::default()).unwrap();
        assert_eq!(out.num_frames(), 8);
        assert_eq!(out.field_order(), FieldOrder::Progressive);
        assert_eq!(prop(&out, 2, "source_frame"), PropValue::Int(3));
    }

    #[test]
    fn cycle_rates_are_stamped() {
        let mut value = project_json("cccccccccc");
        value["decimated frames"] = json!([2]);
        let project = build(value).unwrap();

        let out = project.apply(source_clip(10), &ReplayOptions::default()).unwrap();
        assert_eq!(prop(&out, 0, "wobbly_cycle_fps"), PropValue::Int(24));
        assert_eq!(prop(&out, 0, "_DurationNum"), PropValue::Int(1001));
        assert_eq!(prop(&out, 0, "_DurationDen"), PropValue::Int(24000));
        assert_eq!(prop(&out, 5, "_DurationDen"), PropValue::Int(30000));
    }

    #[test]
    fn matches_and_markers_are_stamped() {
        let mut value = project_json("ccnccc");
        value["combed frames"] = json!([4]);
        value["interlaced fades"] = json!([{"frame": 1, "field difference": 0.1}]);
        let project = build(value).unwrap();

        let out = project.apply(source_clip(6), &ReplayOptions::default()).unwrap();
        assert_eq!(prop(&out, 2, "wobbly_match"), PropValue::Data("n".into()));
        assert_eq!(prop(&out, 4, "wobbly_combed"), PropValue::Int(1));
        assert_eq!(prop(&out, 3, "wobbly_combed"), PropValue::Int(0));
        assert_eq!(prop(&out, 1, "wobbly_fif"), PropValue::Int(1));
        assert_eq!(prop(&out, 0, "wobbly_fif"), PropValue::Int(0));
    }

    #[test]
    fn fade_fix_corrects_luma_only_by_default() {
        use crate::models::Plane;

        let mut luma = Plane::filled(4, 4, 0.2);
        for y in (1..4).step_by(2) {
            luma.row_mut(y).fill(0.4);
        }
        let frames = (0..3)
            .map(|_| Frame::new(vec![luma.clone(), luma.clone()]))
            .collect();
        let source = MemoryClip::new(frames, Rational64::new(30000, 1001));

        let mut value = project_json("ccc");
        value["interlaced fades"] = json!([{"frame": 1, "field difference": 0.2}]);
        let project = build(value).unwrap();

        let out = project.apply(source, &ReplayOptions::default()).unwrap();
        let fixed = &out.frames()[1];
        assert!((fixed.planes[0].get(0, 0) - 0.3).abs() < 1e-6);
        assert!((fixed.planes[0].get(0, 1) - 0.3).abs() < 1e-6);
        assert_eq!(fixed.planes[1], luma);
        assert_eq!(out.frames()[0].planes[0], luma);
    }

    #[test]
    fn freeze_metadata_lands_on_start_frame() {
        let mut value = project_json("cccccc");
        value["frozen frames"] = json!([[1, 3, 0]]);
        let project = build(value).unwrap();

        let out = project.apply(source_clip(6), &ReplayOptions::default()).unwrap();
        assert_eq!(prop(&out, 1, "wobbly_freeze_start"), PropValue::Int(1));
        assert_eq!(prop(&out, 1, "wobbly_freeze_end"), PropValue::Int(3));
        assert_eq!(prop(&out, 1, "wobbly_freeze_replacement"), PropValue::Int(0));
        assert_eq!(prop(&out, 2, "source_frame"), PropValue::Int(0));
        assert_eq!(prop(&out, 4, "source_frame"), PropValue::Int(4));
    }

    #[test]
    fn selected_orphans_are_forced_to_c_and_deinterlaced() {
        let mut value = project_json("ccnccbcc");
        value["sections"] = json!([{"start": 0}, {"start": 2}, {"start": 6}]);
        let project = build(value).unwrap();

        let options = ReplayOptions {
            orphan_handling: "n".parse().unwrap(),
            ..Default::default()
        };
        let orphans = project.orphans_to_process(&options.orphan_handling);
        assert_eq!(orphans, vec![OrphanField::new(2, OrphanMatch::N)]);
        assert_eq!(project.matches_for_replay(&orphans)[2], Match::C);

        let out = project.apply(source_clip(8), &options).unwrap();
        assert_eq!(prop(&out, 2, "wobbly_match"), PropValue::Data("c".into()));
        assert_eq!(prop(&out, 2, "wobbly_orphan_deinterlace"), PropValue::Int(1));
        assert_eq!(prop(&out, 5, "wobbly_match"), PropValue::Data("b".into()));
        assert!(!out.frames()[5].props.contains_key("wobbly_orphan_deinterlace"));
        // The project itself is untouched
        assert_eq!(project.matches[2], Match::N);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let project = build(project_json("cccc")).unwrap();
        assert!(matches!(
            project.apply(source_clip(3), &ReplayOptions::default()),
            Err(WobblyError::Clip(ClipError::LengthMismatch { .. }))
        ));
    }

    #[test]
    fn orphan_handling_parsing() {
        assert_eq!("all".parse::<OrphanHandling>().unwrap(), OrphanHandling::All);
        assert_eq!("false".parse::<OrphanHandling>().unwrap(), OrphanHandling::None);
        assert_eq!(
            "b,u".parse::<OrphanHandling>().unwrap(),
            OrphanHandling::Only(BTreeSet::from([OrphanMatch::B, OrphanMatch::U]))
        );
        assert!(matches!(
            "c".parse::<OrphanHandling>(),
            Err(WobblyError::TypeMismatch(_))
        ));

        assert_eq!(
            OrphanHandling::from_value(&json!(true)).unwrap(),
            OrphanHandling::All
        );
        assert_eq!(
            OrphanHandling::from_value(&json!(["p"])).unwrap(),
            OrphanHandling::Only(BTreeSet::from([OrphanMatch::P]))
        );
        assert!(matches!(
            OrphanHandling::from_value(&json!(3)),
            Err(WobblyError::TypeMismatch(_))
        ));
        assert!(matches!(
            OrphanHandling::from_value(&json!(["pp"])),
            Err(WobblyError::TypeMismatch(_))
        ));
    }
}
