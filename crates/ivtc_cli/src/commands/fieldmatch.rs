//! Inverse telecine script without a Wobbly project.

use std::fs;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, ValueEnum};
use console::style;
use ivtc_core::clip::{Clip, ScriptClip};
use ivtc_core::ivtc::{self, IvtcCycle, PostProcess, VfmMode};
use ivtc_core::models::FieldOrder;
use ivtc_core::timecodes::{Timecodes, DEFAULT_DENOMINATOR};
use ivtc_core::wobbly::guess_source_filter;

use super::script::OrderArg;
use super::{parse_rational, Context};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    /// VFM field matching, then VDecimate
    Vfm,
    /// Fixed 3:2 pattern
    Sivtc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PostProcessArg {
    None,
    Bob,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CycleArg {
    #[value(name = "10")]
    Cycle10,
    #[value(name = "8")]
    Cycle08,
    #[value(name = "5")]
    Cycle05,
}

impl From<CycleArg> for IvtcCycle {
    fn from(cycle: CycleArg) -> Self {
        match cycle {
            CycleArg::Cycle10 => IvtcCycle::Cycle10,
            CycleArg::Cycle08 => IvtcCycle::Cycle08,
            CycleArg::Cycle05 => IvtcCycle::Cycle05,
        }
    }
}

#[derive(Args, Debug)]
pub struct CmdFieldMatch {
    /// Input video
    pub video: PathBuf,

    /// Output script. Defaults to `<video>.ivtc.vpy` in the output folder.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Input frame rate
    #[arg(long, default_value = "30000/1001")]
    pub fps: String,

    /// Input frame count
    #[arg(long)]
    pub frames: Option<usize>,

    #[arg(long, value_enum, default_value = "tff")]
    pub field_order: OrderArg,

    #[arg(long, value_enum, default_value = "vfm")]
    pub method: MethodArg,

    /// VFM matching mode (0-5)
    #[arg(long, default_value = "1")]
    pub mode: VfmMode,

    /// Replacement for frames VFM leaves combed
    #[arg(long, value_enum, default_value = "none")]
    pub postprocess: PostProcessArg,

    /// Blend weight for frames next to a decimated duplicate
    #[arg(long, default_value_t = 0.0)]
    pub weight: f64,

    /// Field match only
    #[arg(long)]
    pub no_decimate: bool,

    /// First frame of the clean-combed-combed-clean-clean sequence
    #[arg(long, default_value_t = 0)]
    pub pattern: usize,

    #[arg(long, value_enum, default_value = "10")]
    pub cycle: CycleArg,

    /// v1/v2 timecodes for the output frames
    #[arg(long, requires = "frames")]
    pub timecodes: Option<PathBuf>,
}

impl CmdFieldMatch {
    pub fn build(&self, ctx: &Context) -> anyhow::Result<ScriptClip> {
        let order: FieldOrder = self.field_order.into();
        let mut source = ScriptClip::source(
            &self.video,
            guess_source_filter(&self.video),
            parse_rational(&self.fps)?,
        );
        if let Some(frames) = self.frames {
            source = source.assume_length(frames);
        }
        let source = source.with_field_order(order);

        let clip = match self.method {
            MethodArg::Sivtc => ivtc::sivtc(&source, self.pattern, order, self.cycle.into())?,
            MethodArg::Vfm => {
                let postprocess = match self.postprocess {
                    PostProcessArg::None => PostProcess::None,
                    PostProcessArg::Bob => PostProcess::Bob,
                };
                let matched = ivtc::vfm(&source, Some(order), self.mode, &postprocess)?;
                if self.no_decimate {
                    matched
                } else {
                    ivtc::vdecimate(&matched, &ctx.settings().wibbly.vdecimate, self.weight)?
                }
            }
        };

        match &self.timecodes {
            Some(path) => {
                let timecodes = Timecodes::read(path, clip.num_frames(), DEFAULT_DENOMINATOR)?;
                Ok(timecodes.assume_vfr(&clip)?)
            }
            None => Ok(clip),
        }
    }

    pub fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        if !self.video.exists() {
            anyhow::bail!("File not found: {}", self.video.display());
        }
        let clip = self.build(ctx)?;

        let output = self.output.clone().unwrap_or_else(|| {
            let stem = self
                .video
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "video".to_string());
            ctx.output_path(&format!("{}.ivtc.vpy", stem))
        });
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&output, clip.to_script())
            .with_context(|| format!("writing {}", output.display()))?;
        tracing::info!("[IVTC] Wrote {}", output.display());

        println!("{} {}", style("Wrote").green().bold(), output.display());
        let plugins: Vec<&str> = clip.required_plugins().iter().map(String::as_str).collect();
        if !plugins.is_empty() {
            println!("  {:<10} {}", style("Plugins:").white(), plugins.join(", "));
        }
        Ok(())
    }
}
