//! ivtc - replay Wobbly projects, gather Wibbly metrics and write timecodes.

mod commands;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use console::style;

use commands::{CmdFieldMatch, CmdInfo, CmdSar, CmdScript, CmdTimecodes, CmdWibbly, Context};
use ivtc_core::config::{ConfigManager, DEFAULT_CONFIG_FILE};
use ivtc_core::logging::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "ivtc")]
#[command(version)]
#[command(about = "Wobbly project replay, Wibbly analysis and VFR timecodes")]
#[command(long_about = "Replays the decisions of a Wobbly project as a VapourSynth script, \
    gathers field-matching metrics for new projects and writes timecode files.\n\n\
    EXAMPLES:\n    \
    ivtc info episode01.wob\n    \
    ivtc script episode01.wob -o episode01.vpy --orphans bn\n    \
    ivtc timecodes episode01.wob -o episode01.tc.txt --format 1\n    \
    ivtc wibbly episode01.mkv -o episode01.wob\n    \
    ivtc fieldmatch episode01.mkv --frames 34000 --postprocess bob")]
struct Cli {
    /// Settings file. Created with defaults when missing.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More output; repeat for trace level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarise a Wobbly project
    Info(CmdInfo),
    /// Write timecodes for the decimated output of a project
    Timecodes(CmdTimecodes),
    /// Write a VapourSynth script that replays a project
    Script(CmdScript),
    /// Gather metrics from a video and write a new project
    Wibbly(CmdWibbly),
    /// Write an inverse telecine script for a video without a project
    Fieldmatch(CmdFieldMatch),
    /// Sample aspect ratio for an analog capture
    Sar(CmdSar),
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<ConfigManager> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut config = ConfigManager::new(&path);
    // Only an explicit --config creates a file; otherwise defaults apply
    if explicit.is_some() || path.exists() {
        config
            .load_or_create()
            .with_context(|| format!("loading {}", path.display()))?;
    }
    Ok(config)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    let logging = &config.settings().logging;
    let level = logging.level.raised_by(cli.verbose);
    let log_dir = logging.log_to_file.then(|| config.logs_folder());
    let _guard = init_tracing(level, log_dir.as_deref());
    tracing::debug!("ivtc {} using {}", ivtc_core::version(), config.path().display());

    let ctx = Context::new(config);
    match cli.command {
        Command::Info(cmd) => cmd.run(&ctx),
        Command::Timecodes(cmd) => cmd.run(&ctx),
        Command::Script(cmd) => cmd.run(&ctx),
        Command::Wibbly(cmd) => cmd.run(&ctx),
        Command::Fieldmatch(cmd) => cmd.run(&ctx),
        Command::Sar(cmd) => cmd.run(),
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
