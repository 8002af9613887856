//! Timecode export command.

use std::path::PathBuf;

use clap::Args;
use console::style;
use ivtc_core::timecodes::TimecodeFormat;
use ivtc_core::wobbly::WobblyProject;

use super::Context;

#[derive(Args, Debug)]
pub struct CmdTimecodes {
    /// Wobbly project
    pub project: PathBuf,

    /// Output file. Defaults to `<project>.tc.txt` in the output folder.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Timecode format version (1 or 2). Defaults to `replay.timecode_format`.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub format: Option<u8>,
}

impl CmdTimecodes {
    pub fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let format = match self.format {
            Some(version) => TimecodeFormat::try_from(version)?,
            None => ctx.settings().replay.timecode_format,
        };

        let project = WobblyProject::open(&self.project)?;
        let timecodes = project.timecodes();
        let output = self.output.clone().unwrap_or_else(|| {
            let stem = self
                .project
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "timecodes".to_string());
            ctx.output_path(&format!("{}.tc.txt", stem))
        });
        timecodes.write(&output, format)?;

        let ranges = timecodes.normalize().len();
        println!(
            "{} {} timecodes for {} frames ({} rate range{}) -> {}",
            style("Wrote").green().bold(),
            format,
            timecodes.len(),
            ranges,
            if ranges == 1 { "" } else { "s" },
            output.display()
        );
        Ok(())
    }
}
