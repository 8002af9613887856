//! VapourSynth script builder.
//!
//! A [`ScriptClip`] records host calls instead of evaluating them. Each
//! operation appends assignments to a fresh variable, so clips derived from
//! a common parent can be merged back together (as `replace_frames` does)
//! by concatenating their lines. The script can be written to a `.vpy` file
//! or, with the `vapoursynth` feature, evaluated in-process.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use num_rational::Rational64;

use super::{check_frames, check_freezes, Clip, ClipError, ClipResult};
use crate::filters::{fades, FadeFix, VinverseParams};
use crate::models::{FieldOrder, FramePropsPlan, Match, PropValue, SceneChangeMode};
use crate::wobbly::{FreezeFrame, VDecParams, VfmParams};

/// Python literal for a frame property value.
pub fn python_literal(value: &PropValue) -> String {
    match value {
        PropValue::Int(v) => v.to_string(),
        PropValue::Float(v) => format!("{:?}", v),
        PropValue::Data(s) => quote(s),
        PropValue::IntArray(v) => format!(
            "[{}]",
            v.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
        ),
        PropValue::FloatArray(v) => format!(
            "[{}]",
            v.iter().map(|f| format!("{:?}", f)).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn py_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn int_list<'a>(values: impl IntoIterator<Item = &'a usize>) -> String {
    format!(
        "[{}]",
        values
            .into_iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )
}

fn props_kwargs(props: &crate::models::FrameProps) -> String {
    props
        .iter()
        .map(|(k, v)| format!("{}={}", k, python_literal(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A clip expressed as a VapourSynth script.
#[derive(Debug, Clone)]
pub struct ScriptClip {
    lines: Vec<String>,
    var: String,
    counter: Arc<AtomicUsize>,
    num_frames: usize,
    field_order: FieldOrder,
    frame_rate: Rational64,
    num_planes: usize,
    plugins: BTreeSet<String>,
}

impl ScriptClip {
    fn empty(frame_rate: Rational64) -> Self {
        Self {
            lines: Vec::new(),
            var: String::new(),
            counter: Arc::new(AtomicUsize::new(0)),
            num_frames: 0,
            field_order: FieldOrder::Progressive,
            frame_rate,
            num_planes: 3,
            plugins: BTreeSet::new(),
        }
    }

    /// Index `path` with `source_filter` (e.g. `lsmas.LWLibavSource`) and
    /// force the base frame rate.
    ///
    /// The frame count is unknown until [`Self::assume_length`] is called.
    pub fn source(path: &Path, source_filter: &str, frame_rate: Rational64) -> Self {
        let path_str = path.to_string_lossy().replace('\\', "/");
        let mut clip = Self::empty(frame_rate);
        if let Some((namespace, _)) = source_filter.split_once('.') {
            clip.plugins.insert(namespace.to_string());
        }
        let clip = clip.emit(|_| format!("core.{}({})", source_filter, quote(&path_str)));
        clip.emit(|v| {
            format!(
                "core.std.AssumeFPS({}, fpsnum={}, fpsden={})",
                v,
                frame_rate.numer(),
                frame_rate.denom()
            )
        })
    }

    /// Blank 8-bit YUV clip.
    pub fn blank(width: usize, height: usize, num_frames: usize, frame_rate: Rational64) -> Self {
        let clip = Self::empty(frame_rate).emit(|_| {
            format!(
                "core.std.BlankClip(width={}, height={}, length={}, fpsnum={}, fpsden={}, format=vs.YUV420P8)",
                width,
                height,
                num_frames,
                frame_rate.numer(),
                frame_rate.denom()
            )
        });
        clip.assume_length(num_frames)
    }

    /// Set the frame count the script is known to produce.
    pub fn assume_length(mut self, num_frames: usize) -> Self {
        self.num_frames = num_frames;
        self
    }

    pub fn with_planes(mut self, num_planes: usize) -> Self {
        self.num_planes = num_planes;
        self
    }

    /// Variable holding the current clip.
    pub fn var(&self) -> &str {
        &self.var
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Plugin namespaces the script calls into.
    pub fn required_plugins(&self) -> &BTreeSet<String> {
        &self.plugins
    }

    /// Fail with every missing plugin at once.
    pub fn check_plugins(&self, is_available: impl Fn(&str) -> bool) -> ClipResult<()> {
        let missing: Vec<String> = self
            .plugins
            .iter()
            .filter(|ns| !is_available(ns))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ClipError::DependencyMissing { plugins: missing })
        }
    }

    /// Render the full script, outputting the current clip.
    pub fn to_script(&self) -> String {
        let mut script = String::from("import vapoursynth as vs\ncore = vs.core\n\n");
        for line in &self.lines {
            script.push_str(line);
            script.push('\n');
        }
        script.push_str(&format!("\n{}.set_output()\n", self.var));
        script
    }

    /// Keep the inclusive `ranges` and splice them together.
    pub fn splice_trims(&self, ranges: &[(usize, usize)]) -> Self {
        let total = ranges.iter().map(|&(s, e)| e.saturating_sub(s) + 1).sum();
        let parts: Vec<String> = ranges
            .iter()
            .map(|&(s, e)| format!("core.std.Trim({{v}}, first={}, last={})", s, e))
            .collect();
        self.emit(|v| {
            let parts: Vec<String> = parts.iter().map(|p| p.replace("{v}", v)).collect();
            format!("core.std.Splice([{}])", parts.join(", "))
        })
        .assume_length(total)
    }

    pub fn crop(&self, left: usize, top: usize, right: usize, bottom: usize) -> Self {
        self.emit(|v| {
            format!(
                "core.std.Crop({}, left={}, right={}, top={}, bottom={})",
                v, left, right, top, bottom
            )
        })
    }

    /// Motion metrics (`MMetrics`/`VMetrics` props).
    pub fn dmetrics(&self, tff: bool, chroma: bool, nt: i64, y0: f64, y1: f64) -> Self {
        self.with_plugin("dmetrics").emit(|v| {
            format!(
                "core.dmetrics.DMetrics({}, tff={}, chroma={}, nt={}, y0={}, y1={})",
                v,
                py_bool(tff),
                py_bool(chroma),
                nt,
                y0 as i64,
                y1 as i64
            )
        })
    }

    /// Field matching with VFM; writes `VFMMatch`, `VFMMics` and `_Combed`.
    pub fn vfm(&self, params: &VfmParams) -> Self {
        self.with_plugin("vivtc").emit(|v| {
            format!(
                "core.vivtc.VFM({}, order={}, field={}, mode={}, mchroma={}, cthresh={}, mi={}, \
                 chroma={}, blockx={}, blocky={}, y0={}, y1={}, scthresh={:?}, micmatch={}, micout={})",
                v,
                params.order,
                params.field,
                params.mode,
                py_bool(params.mchroma),
                params.cthresh as i64,
                params.mi as i64,
                py_bool(params.chroma),
                params.blockx as i64,
                params.blocky as i64,
                params.y0 as i64,
                params.y1 as i64,
                params.scthresh,
                params.micmatch as i64,
                py_bool(params.micout)
            )
        })
    }

    /// Decimation with VDecimate; writes `VDecimateDrop` and
    /// `VDecimateMaxBlockDiff`. A dry run keeps every frame.
    pub fn vdecimate(&self, params: &VDecParams) -> Self {
        self.vdecimate_call(params, None)
    }

    /// VDecimate deciding on `self` but returning frames of `output`.
    pub fn vdecimate_onto(&self, params: &VDecParams, output: &Self) -> ClipResult<Self> {
        if output.num_frames != self.num_frames {
            return Err(ClipError::length_mismatch(self.num_frames, output.num_frames));
        }
        Ok(self.merge(output).vdecimate_call(params, Some(&output.var)))
    }

    fn vdecimate_call(&self, params: &VDecParams, clip2: Option<&str>) -> Self {
        let clip2 = clip2.map(|c| format!(", clip2={}", c)).unwrap_or_default();
        let mut clip = self.with_plugin("vivtc").emit(|v| {
            format!(
                "core.vivtc.VDecimate({}, cycle={}, chroma={}, dupthresh={:?}, scthresh={:?}, \
                 blockx={}, blocky={}, dryrun={}{})",
                v,
                params.cycle,
                py_bool(params.chroma),
                params.dupthresh,
                params.scthresh,
                params.blockx as i64,
                params.blocky as i64,
                py_bool(params.dryrun),
                clip2
            )
        });
        if !params.dryrun && params.cycle > 1 {
            // One frame goes from every full cycle
            let cycle = params.cycle as usize;
            clip.num_frames = self.num_frames / cycle * (cycle - 1) + self.num_frames % cycle;
            clip.frame_rate = self.frame_rate * Rational64::new(params.cycle - 1, params.cycle);
        }
        clip
    }

    /// Blend each frame with its neighbours by `weights` (previous, current, next).
    pub fn average_frames(&self, weights: [f64; 3]) -> Self {
        self.emit(|v| {
            format!(
                "core.std.AverageFrames({}, weights=[{:?}, {:?}, {:?}])",
                v, weights[0], weights[1], weights[2]
            )
        })
    }

    /// Take frames from `replacement` wherever `props_from` has integer prop
    /// `prop` equal to `value`. All three clips must have the same length.
    pub fn replace_where(&self, replacement: &Self, props_from: &Self, prop: &str, value: i64) -> ClipResult<Self> {
        for other in [replacement, props_from] {
            if other.num_frames != self.num_frames {
                return Err(ClipError::length_mismatch(self.num_frames, other.num_frames));
            }
        }
        let (a, b, p) = (self.var.clone(), replacement.var.clone(), props_from.var.clone());
        Ok(self.merge(replacement).merge(props_from).emit(|_| {
            format!(
                "core.std.FrameEval({a}, lambda n, f, a={a}, b={b}: b if f.props.get({k}) == {value} else a, prop_src={p})",
                a = a,
                b = b,
                p = p,
                k = quote(prop),
                value = value
            )
        }))
    }

    /// Store the luma field-average difference as `WibblyFieldDiff`.
    pub fn field_difference(&self) -> Self {
        let fields = self.emit(|v| {
            format!(
                "core.std.SeparateFields(core.std.ShufflePlanes({}, planes=0, colorfamily=vs.GRAY), tff=True)",
                v
            )
        });
        let even = fields.emit(|f| format!("core.std.PlaneStats({}[::2])", f));
        let odd = fields.emit(|f| format!("core.std.PlaneStats({}[1::2])", f));
        let merged = self.merge(&even).merge(&odd).with_plugin("akarin");
        let (base, e, o) = (self.var.clone(), even.var.clone(), odd.var.clone());
        merged.emit(|_| {
            format!(
                "core.akarin.PropExpr([{}, {}, {}], lambda: dict(WibblyFieldDiff={}))",
                base,
                e,
                o,
                quote("y.PlaneStatsAverage z.PlaneStatsAverage - abs")
            )
        })
    }

    /// Flag scene changes as `WobblySceneChange`.
    pub fn scene_change(&self, mode: SceneChangeMode) -> Self {
        let (call, prop) = match mode {
            SceneChangeMode::Wwxd => ("core.wwxd.WWXD", "Scenechange"),
            SceneChangeMode::Scxvid => ("core.scxvid.Scxvid", "_SceneChangePrev"),
        };
        self.with_plugin(mode.namespace())
            .emit(|v| format!("{}({})", call, v))
            .with_plugin("akarin")
            .emit(|v| {
                format!(
                    "core.akarin.PropExpr({}, lambda: dict(WobblySceneChange={}))",
                    v,
                    quote(&format!("x.{}", prop))
                )
            })
    }

    /// Separate fields and weave each with the next one.
    pub fn double_weave(&self, order: FieldOrder) -> ClipResult<Self> {
        let tff = py_bool(order.is_tff());
        let mut clip = self.emit(|v| {
            format!(
                "core.std.DoubleWeave(core.std.SeparateFields({}, tff={}), tff={})",
                v, tff, tff
            )
        });
        clip.num_frames = self.num_frames * 2;
        clip.frame_rate = self.frame_rate * 2;
        Ok(clip)
    }

    /// Keep `offsets` out of every group of `cycle` frames.
    pub fn select_every(&self, cycle: usize, offsets: &[usize]) -> ClipResult<Self> {
        if cycle == 0 || offsets.iter().any(|&o| o >= cycle) {
            return Err(ClipError::invalid_parameter(format!(
                "offsets {:?} do not fit a cycle of {}",
                offsets, cycle
            )));
        }
        let mut clip = self.emit(|v| {
            format!(
                "core.std.SelectEvery({}, cycle={}, offsets={})",
                v,
                cycle,
                int_list(offsets)
            )
        });
        let full = self.num_frames / cycle * offsets.len();
        let partial = offsets.iter().filter(|&&o| o < self.num_frames % cycle).count();
        clip.num_frames = full + partial;
        clip.frame_rate = self.frame_rate * Rational64::new(offsets.len() as i64, cycle as i64);
        Ok(clip)
    }

    /// Residual comb removal.
    pub fn vinverse(&self, params: &VinverseParams) -> ClipResult<Self> {
        params.validate()?;
        let blur = self.emit(|v| {
            format!("core.std.Convolution({}, matrix=[1, 2, 1], mode=\"v\")", v)
        });
        let blur2 = blur.emit(|v| {
            format!("core.std.Convolution({}, matrix=[1, 4, 6, 4, 1], mode=\"v\")", v)
        });
        let merged = self.merge(&blur).merge(&blur2).with_plugin("akarin");
        let (x, y, z) = (self.var.clone(), blur.var.clone(), blur2.var.clone());
        let expr = quote(&crate::filters::vinverse_expr(params));
        Ok(merged.emit(|_| format!("core.akarin.Expr([{}, {}, {}], {})", x, y, z, expr)))
    }

    fn with_plugin(&self, namespace: &str) -> Self {
        let mut clip = self.clone();
        clip.plugins.insert(namespace.to_string());
        clip
    }

    fn next_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.counter.fetch_add(1, Ordering::Relaxed))
    }

    /// Append `name = rhs(current)` with a raw line prefix.
    fn emit_named(&self, prefix: &str, rhs: impl FnOnce(&str) -> String) -> Self {
        let name = self.next_name(prefix);
        let mut clip = self.clone();
        clip.lines.push(format!("{} = {}", name, rhs(&self.var)));
        clip.var = name;
        clip
    }

    fn emit(&self, rhs: impl FnOnce(&str) -> String) -> Self {
        self.emit_named("clip", rhs)
    }

    /// Append a helper assignment that is not itself a clip.
    fn emit_value(&self, prefix: &str, value: String) -> (Self, String) {
        let name = self.next_name(prefix);
        let mut clip = self.clone();
        clip.lines.push(format!("{} = {}", name, value));
        (clip, name)
    }

    /// Bring in the lines `other` has that `self` lacks.
    fn merge(&self, other: &Self) -> Self {
        let mut clip = self.clone();
        for line in &other.lines {
            if !clip.lines.contains(line) {
                clip.lines.push(line.clone());
            }
        }
        clip.plugins.extend(other.plugins.iter().cloned());
        clip
    }
}

impl Clip for ScriptClip {
    fn num_frames(&self) -> usize {
        self.num_frames
    }

    fn field_order(&self) -> FieldOrder {
        self.field_order
    }

    fn frame_rate(&self) -> Rational64 {
        self.frame_rate
    }

    fn with_field_order(&self, order: FieldOrder) -> Self {
        let mut clip =
            self.emit(|v| format!("core.std.SetFieldBased({}, value={})", v, order.field_based()));
        clip.field_order = order;
        clip
    }

    fn with_frame_props(&self, plan: &FramePropsPlan) -> ClipResult<Self> {
        check_frames(plan.frames.keys(), self.num_frames)?;
        let mut clip = self.clone();
        if !plan.all.is_empty() {
            clip = clip.emit(|v| format!("core.std.SetFrameProps({}, {})", v, props_kwargs(&plan.all)));
        }
        if !plan.frames.is_empty() {
            let table = plan
                .frames
                .iter()
                .map(|(n, props)| format!("{}: dict({})", n, props_kwargs(props)))
                .collect::<Vec<_>>()
                .join(", ");
            let (with_table, name) = clip.emit_value("_props", format!("{{{}}}", table));
            clip = with_table.emit(|v| {
                format!(
                    "core.std.FrameEval({v}, lambda n, c={v}: c.std.SetFrameProps(**{t}[n]) if n in {t} else c)",
                    v = v,
                    t = name
                )
            });
        }
        Ok(clip)
    }

    fn replace_frames(&self, replacement: &Self, frames: &BTreeSet<usize>) -> ClipResult<Self> {
        if replacement.num_frames != self.num_frames {
            return Err(ClipError::length_mismatch(self.num_frames, replacement.num_frames));
        }
        check_frames(frames, self.num_frames)?;
        if frames.is_empty() {
            return Ok(self.clone());
        }
        let merged = self.merge(replacement);
        let (merged, set) = merged.emit_value("_frames", format!("{{{}}}", int_list(frames).trim_matches(['[', ']'])));
        let (a, b) = (self.var.clone(), replacement.var.clone());
        Ok(merged.emit(|_| {
            format!(
                "core.std.FrameEval({a}, lambda n, a={a}, b={b}: b if n in {s} else a)",
                a = a,
                b = b,
                s = set
            )
        }))
    }

    fn delete_frames(&self, frames: &BTreeSet<usize>) -> ClipResult<Self> {
        check_frames(frames, self.num_frames)?;
        if frames.is_empty() {
            return Ok(self.clone());
        }
        let clip = self.emit(|v| format!("core.std.DeleteFrames({}, frames={})", v, int_list(frames)));
        Ok(clip.assume_length(self.num_frames - frames.len()))
    }

    fn field_hint(&self, matches: &[Match], order: FieldOrder) -> ClipResult<Self> {
        if matches.len() != self.num_frames {
            return Err(ClipError::length_mismatch(self.num_frames, matches.len()));
        }
        let tags: String = matches.iter().map(Match::as_char).collect();
        Ok(self.with_plugin("fh").emit(|v| {
            format!(
                "core.fh.FieldHint({}, tff={}, matches={})",
                v,
                i64::from(order.is_tff()),
                quote(&tags)
            )
        }))
    }

    fn freeze_frames(&self, freezes: &[FreezeFrame]) -> ClipResult<Self> {
        check_freezes(freezes, self.num_frames)?;
        if freezes.is_empty() {
            return Ok(self.clone());
        }
        let first: Vec<usize> = freezes.iter().map(|f| f.start).collect();
        let last: Vec<usize> = freezes.iter().map(|f| f.end).collect();
        let replacement: Vec<usize> = freezes.iter().map(|f| f.replacement).collect();
        Ok(self.emit(|v| {
            format!(
                "core.std.FreezeFrames({}, first={}, last={}, replacement={})",
                v,
                int_list(&first),
                int_list(&last),
                int_list(&replacement)
            )
        }))
    }

    fn fix_interlaced_fades(&self, params: &FadeFix) -> ClipResult<Self> {
        // Baselines and plane stats are in float sample units
        let float = self.emit_named("_float", |v| {
            format!(
                "core.resize.Point({v}, format={v}.format.replace(sample_type=vs.FLOAT, bits_per_sample=32))",
                v = v
            )
        });
        let fields = float.emit_named("_fields", |v| format!("core.std.SeparateFields({}, tff=True)", v));
        let mut top = fields.emit_named("_top", |f| format!("{}[::2]", f));
        let mut bottom = fields.emit_named("_bottom", |f| format!("{}[1::2]", f));
        for plane in (0..self.num_planes).filter(|&p| params.processes(p)) {
            top = top.emit_named("_top", |t| {
                format!("core.std.PlaneStats({}, plane={}, prop=\"P{}\")", t, plane, plane)
            });
            bottom = bottom.emit_named("_bottom", |b| {
                format!("core.std.PlaneStats({}, plane={}, prop=\"P{}\")", b, plane, plane)
            });
        }

        let props = fades::field_average_props(self.num_planes, params)
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, quote(&v)))
            .collect::<Vec<_>>()
            .join(", ");
        let exprs = (0..self.num_planes)
            .map(|i| quote(&fades::plane_expr(i, params)))
            .collect::<Vec<_>>()
            .join(", ");

        let (original, base, t, b) = (
            self.var.clone(),
            float.var.clone(),
            top.var.clone(),
            bottom.var.clone(),
        );
        let with_props = float
            .merge(&top)
            .merge(&bottom)
            .with_plugin("akarin")
            .emit(|_| {
                format!(
                    "core.akarin.PropExpr([{}, {}, {}], lambda: dict({}))",
                    base, t, b, props
                )
            });
        let fixed = with_props.emit(|v| format!("core.akarin.Expr({}, [{}])", v, exprs));
        Ok(fixed.emit(|v| format!("core.resize.Point({}, format={}.format)", v, original)))
    }

    fn bob(&self, order: FieldOrder) -> ClipResult<Self> {
        Ok(self.emit(|v| {
            format!(
                "core.std.SelectEvery(core.resize.Bob({}, tff={}), cycle=2, offsets=0)",
                v,
                py_bool(order.is_tff())
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FadeMode;

    fn blank(frames: usize) -> ScriptClip {
        ScriptClip::blank(720, 480, frames, Rational64::new(30000, 1001))
    }

    #[test]
    fn source_script_sets_framerate() {
        let clip = ScriptClip::source(
            Path::new("C:\\video\\ep01.mkv"),
            "lsmas.LWLibavSource",
            Rational64::new(30000, 1001),
        )
        .assume_length(100);
        let script = clip.to_script();
        assert!(script.contains("core.lsmas.LWLibavSource(\"C:/video/ep01.mkv\")"));
        assert!(script.contains("fpsnum=30000, fpsden=1001"));
        assert!(script.ends_with(&format!("{}.set_output()\n", clip.var())));
        assert!(clip.required_plugins().contains("lsmas"));
    }

    #[test]
    fn source_path_with_quote_is_escaped() {
        let clip = ScriptClip::source(
            Path::new("/media/the \"pilot\".mkv"),
            "ffms2.Source",
            Rational64::new(30000, 1001),
        );
        assert!(clip
            .to_script()
            .contains(r#"core.ffms2.Source("/media/the \"pilot\".mkv")"#));
    }

    #[test]
    fn fade_fix_runs_on_float_luma() {
        let clip = blank(10);
        let fixed = clip.fix_interlaced_fades(&FadeFix::default()).unwrap();
        let script = fixed.to_script();
        assert!(script.contains("sample_type=vs.FLOAT, bits_per_sample=32"));
        assert!(script.contains("plane=0, prop=\"P0\""));
        assert!(!script.contains("plane=1,"));
        assert!(script.contains(r#", "", ""])"#));
        assert!(script.contains(&format!("format={}.format)", clip.var())));
        assert_eq!(fixed.num_frames(), 10);
    }

    #[test]
    fn combed_frames_pick_replacement() {
        let base = blank(10);
        let matched = base.with_field_order(FieldOrder::Progressive);
        let bobbed = base.bob(FieldOrder::Tff).unwrap();
        let out = matched.replace_where(&bobbed, &matched, "_Combed", 1).unwrap();
        let script = out.to_script();
        assert!(script.contains("core.resize.Bob("));
        assert!(script.contains(&format!(
            "b if f.props.get(\"_Combed\") == 1 else a, prop_src={})",
            matched.var()
        )));
        assert!(matched.replace_where(&blank(9), &matched, "_Combed", 1).is_err());
    }

    #[test]
    fn vdecimate_drops_one_per_cycle() {
        let params = VDecParams::default();
        let out = blank(23).vdecimate(&params);
        assert_eq!(out.num_frames(), 4 * 4 + 3);
        assert_eq!(out.frame_rate(), Rational64::new(24000, 1001));

        let dry = blank(23).vdecimate(&VDecParams {
            dryrun: true,
            ..VDecParams::default()
        });
        assert_eq!(dry.num_frames(), 23);
        assert!(dry.to_script().contains("dryrun=True)"));
    }

    #[test]
    fn trims_set_length() {
        let clip = blank(100).splice_trims(&[(0, 9), (20, 29)]);
        assert_eq!(clip.num_frames(), 20);
        assert!(clip.to_script().contains("core.std.Trim(clip0, first=20, last=29)"));
    }

    #[test]
    fn delete_frames_updates_length() {
        let clip = blank(10).delete_frames(&BTreeSet::from([1, 6])).unwrap();
        assert_eq!(clip.num_frames(), 8);
        assert!(clip.to_script().contains("frames=[1, 6]"));
        assert!(blank(3).delete_frames(&BTreeSet::from([3])).is_err());
    }

    #[test]
    fn replace_frames_merges_branches() {
        let base = blank(4);
        let fixed = base.fix_interlaced_fades(&FadeFix::new(FadeMode::Darken)).unwrap();
        let out = base.replace_frames(&fixed, &BTreeSet::from([2])).unwrap();
        let script = out.to_script();
        assert!(script.contains("core.akarin.Expr("));
        assert!(script.contains("_frames"));
        assert!(script.contains(&format!("b={}", fixed.var())));
        // No line is emitted twice
        let mut seen = BTreeSet::new();
        assert!(out.lines().iter().all(|l| seen.insert(l.clone())));
        assert!(out.required_plugins().contains("akarin"));
    }

    #[test]
    fn frame_props_become_lookup_table() {
        let mut plan = FramePropsPlan::new().with_all("wobbly_combed", 0i64);
        plan.set(1, "wobbly_match", "n");
        let clip = blank(3).with_frame_props(&plan).unwrap();
        let script = clip.to_script();
        assert!(script.contains("core.std.SetFrameProps(clip0, wobbly_combed=0)"));
        assert!(script.contains("{1: dict(wobbly_match=\"n\")}"));
    }

    #[test]
    fn field_hint_requires_fh() {
        let clip = blank(3)
            .field_hint(&[Match::C, Match::N, Match::C], FieldOrder::Tff)
            .unwrap();
        assert!(clip.to_script().contains("matches=\"cnc\""));
        let err = clip.check_plugins(|_| false).unwrap_err();
        match err {
            ClipError::DependencyMissing { plugins } => assert_eq!(plugins, vec!["fh"]),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(clip.check_plugins(|ns| ns == "fh").is_ok());
    }

    #[test]
    fn analysis_chain_collects_every_plugin() {
        let clip = blank(10)
            .vfm(&VfmParams::default())
            .field_difference()
            .vdecimate(&VDecParams::default())
            .scene_change(SceneChangeMode::Wwxd);
        let plugins: Vec<&str> = clip.required_plugins().iter().map(String::as_str).collect();
        assert_eq!(plugins, vec!["akarin", "vivtc", "wwxd"]);
        assert!(clip.to_script().contains("WibblyFieldDiff"));
    }

    #[test]
    fn literals() {
        assert_eq!(python_literal(&PropValue::Float(1.0)), "1.0");
        assert_eq!(python_literal(&PropValue::Data("a\"b".into())), "\"a\\\"b\"");
        assert_eq!(python_literal(&PropValue::IntArray(vec![1, 2])), "[1, 2]");
    }
}
