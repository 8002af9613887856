//! Project inspection command.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use console::style;
use ivtc_core::wobbly::WobblyProject;
use serde::Serialize;

use super::Context;

/// Frame range sharing one output rate.
#[derive(Debug, Clone, Serialize)]
pub struct RateRange {
    pub start: usize,
    pub end: usize,
    pub fps: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub input: String,
    pub source_filter: String,
    pub frame_rate: String,
    pub field_order: String,
    pub trims: Vec<(usize, usize)>,
    pub frames: usize,
    pub output_frames: usize,
    pub decimated: usize,
    pub sections: usize,
    pub combed: usize,
    pub interlaced_fades: usize,
    pub freezes: usize,
    /// Orphan fields by match letter.
    pub orphans: BTreeMap<String, usize>,
    pub presets: Vec<String>,
    /// Dominant output rate, `None` for an empty project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major_fps: Option<String>,
    /// Ranges that differ from the dominant rate.
    pub vfr_ranges: Vec<RateRange>,
}

impl ProjectSummary {
    pub fn from_project(project: &WobblyProject) -> Self {
        let mut orphans = BTreeMap::new();
        for orphan in &project.orphan_frames {
            *orphans.entry(orphan.matched.to_string()).or_insert(0) += 1;
        }

        let (major_fps, vfr_ranges) = match project.timecodes().separate() {
            Some((major, minor)) => (
                Some(major.to_string()),
                minor
                    .into_iter()
                    .map(|r| RateRange {
                        start: r.start,
                        end: r.end,
                        fps: r.rate.to_string(),
                    })
                    .collect(),
            ),
            None => (None, Vec::new()),
        };

        Self {
            input: project.video.file_path.display().to_string(),
            source_filter: project.video.source_filter.clone(),
            frame_rate: project.video.framerate.to_string(),
            field_order: project.field_order.to_string(),
            trims: project.video.trims.clone(),
            frames: project.num_frames(),
            output_frames: project.output_frames(),
            decimated: project.decimations.len(),
            sections: project.sections.len(),
            combed: project.combed_frames.len(),
            interlaced_fades: project.interlaced_fades.len(),
            freezes: project.freeze_frames.len(),
            orphans,
            presets: project.presets.iter().map(|p| p.name.clone()).collect(),
            major_fps,
            vfr_ranges,
        }
    }
}

#[derive(Args, Debug)]
pub struct CmdInfo {
    /// Wobbly project (`.wob` is appended when missing)
    pub project: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

impl CmdInfo {
    pub fn run(&self, _ctx: &Context) -> anyhow::Result<()> {
        let project = WobblyProject::open(&self.project)?;
        let summary = ProjectSummary::from_project(&project);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary(&summary);
        }
        Ok(())
    }
}

fn print_summary(info: &ProjectSummary) {
    println!();
    println!("{}", style("Wobbly Project").cyan().bold());
    println!();
    println!("  {:<16} {}", style("Input:").white(), info.input);
    println!("  {:<16} {}", style("Source filter:").white(), info.source_filter);
    println!("  {:<16} {} fps", style("Frame rate:").white(), info.frame_rate);
    println!("  {:<16} {}", style("Field order:").white(), info.field_order);
    if !info.trims.is_empty() {
        let trims: Vec<String> = info.trims.iter().map(|(s, e)| format!("{}-{}", s, e)).collect();
        println!("  {:<16} {}", style("Trims:").white(), trims.join(", "));
    }
    println!(
        "  {:<16} {} -> {} ({} decimated)",
        style("Frames:").white(),
        info.frames,
        info.output_frames,
        info.decimated
    );
    println!("  {:<16} {}", style("Sections:").white(), info.sections);
    println!("  {:<16} {}", style("Combed:").white(), info.combed);
    println!("  {:<16} {}", style("Fades:").white(), info.interlaced_fades);
    println!("  {:<16} {}", style("Freezes:").white(), info.freezes);
    if !info.orphans.is_empty() {
        let orphans: Vec<String> = info.orphans.iter().map(|(m, n)| format!("{}={}", m, n)).collect();
        println!("  {:<16} {}", style("Orphans:").white(), orphans.join(" "));
    }
    if !info.presets.is_empty() {
        println!("  {:<16} {}", style("Presets:").white(), info.presets.join(", "));
    }

    if let Some(major) = &info.major_fps {
        println!();
        println!("{}", style("Output timing:").cyan().bold());
        println!("  {:<16} {}", style("Major rate:").white(), major);
        for range in &info.vfr_ranges {
            println!(
                "  {:<16} {}",
                style(format!("{}-{}", range.start, range.end)).dim(),
                range.fps
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarises_a_project() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ep01.mkv");
        let wob = format!(
            r#"{{
                "input file": {input:?},
                "source filter": "lsmas.LWLibavSource",
                "input frame rate": [30000, 1001],
                "trim": [[0, 9]],
                "vfm parameters": {{"order": 1}},
                "matches": "ccnnbcccnc",
                "decimated frames": [2, 7],
                "sections": [{{"start": 0, "presets": []}}, {{"start": 5, "presets": []}}]
            }}"#,
            input = input.display().to_string()
        );
        let path = dir.path().join("ep01.wob");
        std::fs::write(&path, wob).unwrap();

        let project = WobblyProject::open(&path).unwrap();
        let summary = ProjectSummary::from_project(&project);
        assert_eq!(summary.frames, 10);
        assert_eq!(summary.output_frames, 8);
        assert_eq!(summary.field_order, "tff");
        assert_eq!(summary.orphans.get("b"), Some(&1));
        assert_eq!(summary.major_fps.as_deref(), Some("24000/1001"));
        assert!(summary.vfr_ranges.is_empty());
    }
}
