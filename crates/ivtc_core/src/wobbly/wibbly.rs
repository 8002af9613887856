//! Wibbly: gather field-matching metrics and write a fresh Wobbly project.
//!
//! The analysis chain is expressed as a [`ScriptClip`]; evaluating it is up
//! to a host (see the `vapoursynth` feature). Metrics are then read frame by
//! frame through [`MetricsSource`] and turned into a `.wob` file.

use std::path::{Path, PathBuf};

use num_rational::Rational64;
use serde::{Deserialize, Serialize};

use super::error::{WobblyError, WobblyResult};
use super::file::{FadeEntry, SectionEntry, WobFile};
use super::info::{VDecParams, VfmParams};
use crate::ivtc::VfmMode;
use crate::clip::{MetricsSource, ScriptClip};
use crate::models::{FrameProps, Match, SceneChangeMode};

/// Project format written by [`Wibbly::to_wob_file`].
const WOBBLY_VERSION: i64 = 6;
const PROJECT_FORMAT_VERSION: i64 = 2;

/// Pixels removed before analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    pub left: usize,
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DMetricsConfig {
    pub enabled: bool,
    /// Noise threshold.
    pub nt: i64,
}

impl Default for DMetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            nt: 10,
        }
    }
}

/// Analysis settings, stored as the `[wibbly]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WibblyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropConfig>,
    pub dmetrics: DMetricsConfig,
    pub vfm: VfmParams,
    pub vdecimate: VDecParams,
    pub detect_fades: bool,
    /// Minimum field difference (0-1 scale) for a frame to count as a fade.
    pub fade_threshold: f64,
    pub detect_scene_changes: bool,
    pub scene_change_mode: SceneChangeMode,
}

impl Default for WibblyConfig {
    fn default() -> Self {
        Self {
            crop: None,
            dmetrics: DMetricsConfig::default(),
            vfm: VfmParams {
                micmatch: true,
                ..VfmParams::default()
            },
            vdecimate: VDecParams::default(),
            detect_fades: true,
            fade_threshold: 0.4 / 255.0,
            detect_scene_changes: true,
            scene_change_mode: SceneChangeMode::Wwxd,
        }
    }
}

/// Metrics of one analysed frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameMetric {
    pub is_combed: bool,
    pub is_keyframe: bool,
    pub matched: Option<Match>,
    pub mics: Option<Vec<i64>>,
    pub mmetrics: Option<Vec<i64>>,
    pub vmetrics: Option<Vec<i64>>,
    pub decimate_metric: Option<i64>,
    pub decimate_drop: bool,
    pub field_difference: f64,
}

impl FrameMetric {
    pub fn from_props(props: &FrameProps) -> Self {
        let int = |key: &str| props.get(key).and_then(|v| v.as_int());
        let flag = |key: &str| int(key).map(|v| v != 0).unwrap_or(false);
        let array = |key: &str| props.get(key).and_then(|v| v.as_int_array());

        Self {
            is_combed: flag("_Combed"),
            is_keyframe: flag("WobblySceneChange"),
            matched: int("VFMMatch").and_then(Match::from_vfm_index),
            mics: array("VFMMics"),
            mmetrics: array("MMetrics"),
            vmetrics: array("VMetrics"),
            decimate_metric: int("VDecimateMaxBlockDiff"),
            decimate_drop: flag("VDecimateDrop"),
            field_difference: props
                .get("WibblyFieldDiff")
                .and_then(|v| v.as_float())
                .unwrap_or(0.0),
        }
    }
}

/// Source filter Wobbly should use for `path`, picked by extension.
pub fn guess_source_filter(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "dgi" => "dgdecodenv.DGSource",
        "d2v" => "d2v.Source",
        "mp4" | "m4v" | "mov" => "lsmas.LibavSMASHSource",
        _ => "lsmas.LWLibavSource",
    }
}

/// One section per scene change. Frame 0 always starts a section.
pub fn to_sections(scene_changes: &[usize]) -> Vec<SectionEntry> {
    let mut starts: Vec<usize> = std::iter::once(0).chain(scene_changes.iter().copied()).collect();
    starts.sort_unstable();
    starts.dedup();
    starts
        .into_iter()
        .map(|start| SectionEntry {
            start,
            presets: Vec::new(),
        })
        .collect()
}

/// Metric gathering for one input video.
#[derive(Debug, Clone)]
pub struct Wibbly {
    pub input: PathBuf,
    pub frame_rate: Rational64,
    pub config: WibblyConfig,
    /// Inclusive ranges kept from the input.
    pub trims: Vec<(usize, usize)>,
    /// Input resolution before cropping, when known.
    pub resolution: Option<(usize, usize)>,
    metrics: Vec<FrameMetric>,
}

impl Wibbly {
    pub fn new(input: impl Into<PathBuf>, frame_rate: Rational64) -> Self {
        Self {
            input: input.into(),
            frame_rate,
            config: WibblyConfig::default(),
            trims: Vec::new(),
            resolution: None,
            metrics: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: WibblyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_trims(mut self, trims: Vec<(usize, usize)>) -> Self {
        self.trims = trims;
        self
    }

    pub fn with_resolution(mut self, width: usize, height: usize) -> Self {
        self.resolution = Some((width, height));
        self
    }

    pub fn source_filter(&self) -> &'static str {
        guess_source_filter(&self.input)
    }

    pub fn metrics(&self) -> &[FrameMetric] {
        &self.metrics
    }

    /// Plugin chain producing every metric prop.
    pub fn analysis_script(&self) -> ScriptClip {
        let config = &self.config;
        let mut clip = ScriptClip::source(&self.input, self.source_filter(), self.frame_rate);
        if !self.trims.is_empty() {
            clip = clip.splice_trims(&self.trims);
        }
        if let Some(crop) = config.crop {
            clip = clip.crop(crop.left, crop.top, crop.right, crop.bottom);
        }

        let vfm = VfmParams {
            field: i64::from(config.vfm.order == 0),
            mode: VfmMode::TwoWay.index(),
            micout: true,
            ..config.vfm.clone()
        };
        if config.dmetrics.enabled {
            clip = clip.dmetrics(vfm.order == 1, vfm.chroma, config.dmetrics.nt, vfm.y0, vfm.y1);
        }
        clip = clip.vfm(&vfm);

        if config.detect_fades {
            clip = clip.field_difference();
        }

        let vdec = VDecParams {
            cycle: 5,
            dryrun: true,
            ..config.vdecimate.clone()
        };
        clip = clip.vdecimate(&vdec);

        if config.detect_scene_changes {
            clip = clip.scene_change(config.scene_change_mode);
        }
        clip
    }

    /// Read every frame's metrics in order.
    ///
    /// `progress` is called after each frame with `(done, total)`.
    pub fn calculate_metrics(
        &mut self,
        source: &dyn MetricsSource,
        mut progress: impl FnMut(usize, usize),
    ) -> WobblyResult<&[FrameMetric]> {
        let total = source.frame_count();
        tracing::info!("[Wibbly] Analysing {} frames of {}", total, self.input.display());

        let mut metrics = Vec::with_capacity(total);
        for n in 0..total {
            let props = source.frame_props(n)?;
            metrics.push(FrameMetric::from_props(&props));
            progress(n + 1, total);
        }

        let combed = metrics.iter().filter(|m| m.is_combed).count();
        let keyframes = metrics.iter().filter(|m| m.is_keyframe).count();
        tracing::info!(
            "[Wibbly] Done: {} combed frames, {} scene changes",
            combed,
            keyframes
        );
        self.metrics = metrics;
        Ok(&self.metrics)
    }

    /// Build a project from the gathered metrics.
    pub fn to_wob_file(&self) -> WobblyResult<WobFile> {
        if self.metrics.is_empty() {
            return Err(WobblyError::NoMetrics);
        }
        let config = &self.config;

        let missing_matches = self.metrics.iter().filter(|m| m.matched.is_none()).count();
        if missing_matches > 0 {
            tracing::warn!(
                "[Wibbly] {} frames without a VFM match, using 'c'",
                missing_matches
            );
        }
        let matches: String = self
            .metrics
            .iter()
            .map(|m| m.matched.unwrap_or(Match::C).as_char())
            .collect();

        let flagged = |pred: fn(&FrameMetric) -> bool| -> Vec<usize> {
            self.metrics
                .iter()
                .enumerate()
                .filter(|(_, m)| pred(m))
                .map(|(i, _)| i)
                .collect()
        };
        let scene_changes = flagged(|m| m.is_keyframe);

        let fades: Vec<FadeEntry> = if config.detect_fades {
            self.metrics
                .iter()
                .enumerate()
                .filter(|(_, m)| m.field_difference >= config.fade_threshold)
                .map(|(frame, m)| FadeEntry {
                    frame,
                    field_difference: m.field_difference,
                })
                .collect()
        } else {
            Vec::new()
        };

        let resolution = self.resolution.map(|(w, h)| {
            let crop = config.crop.unwrap_or_default();
            [
                w.saturating_sub(crop.left + crop.right) as i64,
                h.saturating_sub(crop.top + crop.bottom) as i64,
            ]
        });

        Ok(WobFile {
            wobbly_version: Some(WOBBLY_VERSION),
            project_format_version: Some(PROJECT_FORMAT_VERSION),
            generated_with: Some(format!("ivtc v{}", crate::version())),
            input_file: Some(self.input.to_string_lossy().replace('\\', "/")),
            input_frame_rate: Some([*self.frame_rate.numer(), *self.frame_rate.denom()]),
            input_resolution: resolution,
            trim: Some(self.trims.iter().map(|&(s, e)| [s, e]).collect()),
            vfm_parameters: Some(config.vfm.clone()),
            vdecimate_parameters: Some(config.vdecimate.clone()),
            mics: Some(self.metrics.iter().map(|m| m.mics.clone()).collect()),
            mmetrics: Some(self.metrics.iter().map(|m| m.mmetrics.clone()).collect()),
            vmetrics: Some(self.metrics.iter().map(|m| m.vmetrics.clone()).collect()),
            original_matches: Some(matches.clone()),
            matches: Some(matches),
            combed_frames: Some(flagged(|m| m.is_combed)),
            decimated_frames: Some(flagged(|m| m.decimate_drop)),
            decimate_metrics: Some(self.metrics.iter().map(|m| m.decimate_metric).collect()),
            sections: Some(to_sections(&scene_changes)),
            source_filter: Some(self.source_filter().to_string()),
            interlaced_fades: Some(fades),
            ..WobFile::default()
        })
    }

    /// Write the project to `out`, or next to the input when `None`.
    pub fn write_project(&self, out: Option<&Path>) -> WobblyResult<PathBuf> {
        let out = match out {
            Some(path) => path.to_path_buf(),
            None => self.input.with_extension("wob"),
        };
        let written = self.to_wob_file()?.write(&out)?;
        tracing::info!("[Wibbly] Wrote project {}", written.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{Clip, MemoryClip};
    use crate::models::{Frame, FramePropsPlan, PropValue};
    use crate::wobbly::WobblyProject;
    use tempfile::tempdir;

    fn analysed_clip() -> MemoryClip {
        let mut plan = FramePropsPlan::new()
            .with_all("VFMMatch", 1i64)
            .with_all("_Combed", 0i64)
            .with_all("VDecimateDrop", 0i64)
            .with_all("VDecimateMaxBlockDiff", 120i64)
            .with_all("VFMMics", PropValue::IntArray(vec![10, 2, 30, 40, 50]))
            .with_all("WibblyFieldDiff", 0.0);
        plan.set(2, "VFMMatch", 2i64);
        plan.set(3, "_Combed", 1i64);
        plan.set(4, "VDecimateDrop", 1i64);
        plan.set(5, "WobblySceneChange", 1i64);
        plan.set(7, "WibblyFieldDiff", 0.01);
        MemoryClip::new(vec![Frame::gray(4, 4, 0.5); 10], Rational64::new(30000, 1001))
            .with_frame_props(&plan)
            .unwrap()
    }

    #[test]
    fn guesses_source_filter() {
        assert_eq!(guess_source_filter(Path::new("a.d2v")), "d2v.Source");
        assert_eq!(guess_source_filter(Path::new("a.MOV")), "lsmas.LibavSMASHSource");
        assert_eq!(guess_source_filter(Path::new("a.dgi")), "dgdecodenv.DGSource");
        assert_eq!(guess_source_filter(Path::new("a.mkv")), "lsmas.LWLibavSource");
    }

    #[test]
    fn sections_always_start_at_zero() {
        let starts: Vec<usize> = to_sections(&[]).iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0]);
        let starts: Vec<usize> = to_sections(&[0, 12, 5]).iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0, 5, 12]);
    }

    #[test]
    fn metric_from_props() {
        let clip = analysed_clip();
        let metric = FrameMetric::from_props(&clip.frame_props(2).unwrap());
        assert_eq!(metric.matched, Some(Match::N));
        assert_eq!(metric.mics, Some(vec![10, 2, 30, 40, 50]));
        assert_eq!(metric.decimate_metric, Some(120));
        assert!(metric.mmetrics.is_none());
    }

    #[test]
    fn analysis_script_plugins() {
        let wibbly = Wibbly::new("/video/ep01.mkv", Rational64::new(30000, 1001))
            .with_trims(vec![(0, 99)]);
        let script = wibbly.analysis_script();
        let plugins: Vec<&str> = script.required_plugins().iter().map(String::as_str).collect();
        assert_eq!(plugins, vec!["akarin", "dmetrics", "lsmas", "vivtc", "wwxd"]);
        let text = script.to_script();
        assert!(text.contains("field=0, mode=0"));
        assert!(text.contains("dryrun=True"));
    }

    #[test]
    fn writing_requires_metrics() {
        let wibbly = Wibbly::new("a.mkv", Rational64::new(30000, 1001));
        assert!(matches!(wibbly.to_wob_file(), Err(WobblyError::NoMetrics)));
    }

    #[test]
    fn written_project_loads() {
        let dir = tempdir().unwrap();
        let mut wibbly = Wibbly::new(dir.path().join("ep01.mkv"), Rational64::new(30000, 1001))
            .with_resolution(720, 480)
            .with_config(WibblyConfig {
                crop: Some(CropConfig {
                    left: 8,
                    right: 8,
                    ..CropConfig::default()
                }),
                ..WibblyConfig::default()
            });

        let mut calls = 0;
        wibbly.calculate_metrics(&analysed_clip(), |_, _| calls += 1).unwrap();
        assert_eq!(calls, 10);

        let file = wibbly.to_wob_file().unwrap();
        assert_eq!(file.input_resolution, Some([704, 480]));
        assert_eq!(file.matches.as_deref(), Some("ccnccccccc"));
        assert_eq!(file.interlaced_fades.as_ref().map(Vec::len), Some(1));

        let out = dir.path().join("out").join("ep01.wob");
        let written = wibbly.write_project(Some(&out)).unwrap();
        let project = WobblyProject::open(&written).unwrap();
        assert_eq!(project.num_frames(), 10);
        assert_eq!(project.decimations.iter().copied().collect::<Vec<_>>(), vec![4]);
        assert_eq!(project.section_keyframes(), vec![0, 5]);
        assert!(project.combed_frames.contains(&3));
        assert!(project.interlaced_fades.contains_key(&7));
    }
}
