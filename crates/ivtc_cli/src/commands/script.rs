//! Replay script command.

use std::fs;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, ValueEnum};
use console::style;
use ivtc_core::clip::Clip;
use ivtc_core::models::{FadeMode, FieldOrder};
use ivtc_core::wobbly::{OrphanHandling, ReplayOptions, WobblyProject};

use super::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderArg {
    Tff,
    Bff,
}

impl From<OrderArg> for FieldOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Tff => FieldOrder::Tff,
            OrderArg::Bff => FieldOrder::Bff,
        }
    }
}

#[derive(Args, Debug)]
pub struct CmdScript {
    /// Wobbly project
    pub project: PathBuf,

    /// Output script. Defaults to `<project>.vpy` in the output folder.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Orphan fields to deinterlace: `all`, `none` or letters such as `bn`
    #[arg(long)]
    pub orphans: Option<String>,

    /// Replace the project's input video
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Override the project's field order
    #[arg(long, value_enum)]
    pub field_order: Option<OrderArg>,

    /// Fade fix mode: average, darken or brighten
    #[arg(long)]
    pub fade_mode: Option<FadeMode>,

    /// Write the script even if the input video does not exist here
    #[arg(long)]
    pub allow_missing_input: bool,
}

impl CmdScript {
    pub fn options(&self, ctx: &Context) -> anyhow::Result<ReplayOptions> {
        let mut options = ctx.settings().replay.to_replay_options()?;
        if let Some(orphans) = &self.orphans {
            options.orphan_handling = orphans.parse::<OrphanHandling>()?;
        }
        if let Some(order) = self.field_order {
            options.field_order = Some(order.into());
        }
        if let Some(mode) = self.fade_mode {
            options.fade.mode = mode;
        }
        Ok(options)
    }

    pub fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let mut project = WobblyProject::open(&self.project)?;
        if let Some(input) = &self.input {
            project.video.file_path = input.clone();
        }
        let options = self.options(ctx)?;

        let name = self
            .project
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());
        let logger = ctx.run_logger(&format!("script_{}", name))?;
        logger.phase("Replay");
        logger.info(&format!("Project: {}", self.project.display()));
        logger.info(&format!(
            "Orphans: {}, fades: {}",
            options.orphan_handling, options.fade.mode
        ));

        let result = if self.allow_missing_input {
            let source = project.video.source_unchecked(project.num_frames());
            project.apply(source, &options)
        } else {
            project.apply_from_source(&options)
        };
        let clip = match result {
            Ok(clip) => clip,
            Err(e) => {
                logger.error(&e.to_string());
                logger.show_tail("replay");
                return Err(e.into());
            }
        };

        let script = clip.to_script();
        for line in script.lines() {
            logger.output_line(line);
        }

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| ctx.output_path(&format!("{}.vpy", name)));
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&output, &script).with_context(|| format!("writing {}", output.display()))?;
        logger.success(&format!("Wrote {}", output.display()));

        println!(
            "{} {} ({} -> {} frames)",
            style("Wrote").green().bold(),
            output.display(),
            project.num_frames(),
            clip.num_frames()
        );
        let plugins: Vec<&str> = clip.required_plugins().iter().map(String::as_str).collect();
        if !plugins.is_empty() {
            println!("  {:<10} {}", style("Plugins:").white(), plugins.join(", "));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        cmd: CmdScript,
    }

    #[test]
    fn flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new(ivtc_core::config::ConfigManager::new(dir.path().join("ivtc.toml")));
        let wrapper = Wrapper::parse_from([
            "script",
            "ep.wob",
            "--orphans",
            "all",
            "--field-order",
            "bff",
            "--fade-mode",
            "darken",
        ]);
        let options = wrapper.cmd.options(&ctx).unwrap();
        assert_eq!(options.orphan_handling, OrphanHandling::All);
        assert_eq!(options.field_order, Some(FieldOrder::Bff));
        assert_eq!(options.fade.mode, FadeMode::Darken);

        let defaults = Wrapper::parse_from(["script", "ep.wob"]).cmd.options(&ctx).unwrap();
        assert_eq!(defaults.orphan_handling, OrphanHandling::None);
        assert_eq!(defaults.field_order, None);
    }
}
