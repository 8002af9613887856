//! Metric gathering command.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Args;
use console::style;
use ivtc_core::wobbly::{CropConfig, Wibbly};

use super::{parse_rational, parse_resolution, parse_trim, Context};

#[derive(Args, Debug)]
pub struct CmdWibbly {
    /// Input video
    pub video: PathBuf,

    /// Output project. Defaults to the video path with a `.wob` extension.
    /// With `--script-only`, the analysis script path.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Input frame rate
    #[arg(long, default_value = "30000/1001")]
    pub fps: String,

    /// Inclusive frame range to keep, e.g. `100-3000`; repeatable
    #[arg(long = "trim")]
    pub trims: Vec<String>,

    /// Crop before analysis as `left,top,right,bottom`
    #[arg(long)]
    pub crop: Option<String>,

    /// Input resolution, recorded in the project
    #[arg(long)]
    pub resolution: Option<String>,

    /// Write the analysis script instead of running it
    #[arg(long)]
    pub script_only: bool,
}

impl CmdWibbly {
    pub fn build(&self, ctx: &Context) -> anyhow::Result<Wibbly> {
        let mut config = ctx.settings().wibbly.clone();
        if let Some(crop) = &self.crop {
            config.crop = Some(parse_crop(crop)?);
        }
        let trims = self
            .trims
            .iter()
            .map(|t| parse_trim(t))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut wibbly = Wibbly::new(&self.video, parse_rational(&self.fps)?)
            .with_config(config)
            .with_trims(trims);
        if let Some(resolution) = &self.resolution {
            let (width, height) = parse_resolution(resolution)?;
            wibbly = wibbly.with_resolution(width, height);
        }
        Ok(wibbly)
    }

    pub fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        if !self.video.exists() {
            anyhow::bail!("File not found: {}", self.video.display());
        }
        let wibbly = self.build(ctx)?;
        let script = wibbly.analysis_script();

        if self.script_only {
            let output = self
                .output
                .clone()
                .unwrap_or_else(|| self.video.with_extension("wibbly.vpy"));
            write_file(&output, &script.to_script())?;
            println!(
                "{} analysis script -> {}",
                style("Wrote").green().bold(),
                output.display()
            );
            println!(
                "  {:<10} {}",
                style("Plugins:").white(),
                script
                    .required_plugins()
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            return Ok(());
        }

        self.analyse(ctx, wibbly)
    }

    #[cfg(feature = "vapoursynth")]
    fn analyse(&self, ctx: &Context, mut wibbly: Wibbly) -> anyhow::Result<()> {
        use ivtc_core::clip::vapoursynth::VapourSynthMetrics;
        use ivtc_core::clip::MetricsSource;

        let name = self
            .video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let logger = ctx.run_logger(&format!("wibbly_{}", name))?;
        logger.phase("Wibbly");
        logger.json("config", &wibbly.config);

        let script = wibbly.analysis_script();
        for line in script.lines() {
            logger.output_line(line);
        }
        let source = match VapourSynthMetrics::evaluate(&script) {
            Ok(source) => source,
            Err(e) => {
                logger.error(&e.to_string());
                logger.show_tail("analysis script");
                return Err(e.into());
            }
        };

        let pb = super::progress_bar(source.frame_count(), "Analysing");
        wibbly.calculate_metrics(&source, |done, total| {
            pb.set_position(done as u64);
            logger.progress(done, total);
        })?;
        pb.finish_and_clear();

        let written = wibbly.write_project(self.output.as_deref())?;
        logger.success(&format!("Wrote {}", written.display()));
        println!(
            "{} {} ({} frames)",
            style("Wrote").green().bold(),
            written.display(),
            wibbly.metrics().len()
        );
        Ok(())
    }

    #[cfg(not(feature = "vapoursynth"))]
    fn analyse(&self, _ctx: &Context, _wibbly: Wibbly) -> anyhow::Result<()> {
        anyhow::bail!(
            "this build cannot run VapourSynth; rebuild with `--features vapoursynth` \
             or pass --script-only to write the analysis script"
        )
    }
}

fn parse_crop(s: &str) -> anyhow::Result<CropConfig> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid crop '{}'", s))?;
    match values.as_slice() {
        &[left, top, right, bottom] => Ok(CropConfig {
            left,
            top,
            right,
            bottom,
        }),
        _ => anyhow::bail!("crop needs four values (left,top,right,bottom), got '{}'", s),
    }
}

fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use ivtc_core::config::ConfigManager;
    use num_rational::Rational64;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        cmd: CmdWibbly,
    }

    #[test]
    fn parses_crop() {
        let crop = parse_crop("8, 0, 8, 2").unwrap();
        assert_eq!((crop.left, crop.top, crop.right, crop.bottom), (8, 0, 8, 2));
        assert!(parse_crop("8,0").is_err());
    }

    #[test]
    fn builds_from_flags() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(ConfigManager::new(dir.path().join("ivtc.toml")));
        let cmd = Wrapper::parse_from([
            "wibbly",
            "ep01.d2v",
            "--trim",
            "0-99",
            "--trim",
            "200:299",
            "--fps",
            "25",
            "--crop",
            "4,0,4,0",
        ])
        .cmd;
        let wibbly = cmd.build(&ctx).unwrap();
        assert_eq!(wibbly.trims, vec![(0, 99), (200, 299)]);
        assert_eq!(wibbly.frame_rate, Rational64::from_integer(25));
        assert_eq!(wibbly.source_filter(), "d2v.Source");
        assert!(wibbly.config.crop.is_some());
    }

    #[test]
    fn script_only_writes_analysis_chain() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("ep01.mkv");
        fs::write(&video, b"").unwrap();
        let out = dir.path().join("analysis.vpy");
        let ctx = Context::new(ConfigManager::new(dir.path().join("ivtc.toml")));
        let cmd = Wrapper::parse_from([
            "wibbly",
            video.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--script-only",
        ])
        .cmd;
        cmd.run(&ctx).unwrap();

        let script = fs::read_to_string(&out).unwrap();
        assert!(script.contains("core.vivtc.VFM("));
        assert!(script.contains(".set_output()"));
    }
}
