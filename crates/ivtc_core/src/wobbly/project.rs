//! Parsed Wobbly project.
//!
//! Building a [`WobblyProject`] runs in phases: read the raw file, resolve
//! required keys, validate parameters, validate per-frame data, then derive
//! sections, orphans and the combed set. The result is never mutated.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use num_rational::Rational64;

use super::error::{WobblyError, WobblyResult};
use super::file::{FadeEntry, SectionEntry, WobFile};
use super::info::{
    FreezeFrame, InterlacedFade, OrphanField, Preset, Section, VDecParams, VfmParams, WobblyMeta,
    WobblyVideo,
};
use crate::models::{FieldOrder, Match};
use crate::timecodes::Timecodes;

/// Only decimation cycle Wobbly supports.
pub const DECIMATION_CYCLE: usize = 5;

const DEFAULT_FRAME_RATE: [i64; 2] = [30000, 1001];

/// Immutable model of a Wobbly project.
#[derive(Debug, Clone)]
pub struct WobblyProject {
    pub video: WobblyVideo,
    pub meta: WobblyMeta,
    pub vfm_params: VfmParams,
    pub vdecimate_params: VDecParams,
    pub field_order: FieldOrder,
    pub matches: Vec<Match>,
    /// Combed frames, excluding interlaced fades.
    pub combed_frames: BTreeSet<usize>,
    pub orphan_frames: BTreeSet<OrphanField>,
    pub decimations: BTreeSet<usize>,
    pub sections: Vec<Section>,
    /// Keyed by frame.
    pub interlaced_fades: BTreeMap<usize, InterlacedFade>,
    pub freeze_frames: Vec<FreezeFrame>,
    pub presets: Vec<Preset>,
    source: WobFile,
}

impl WobblyProject {
    /// Parse a project file. `.wob` is appended to the path when missing.
    pub fn open(path: impl AsRef<Path>) -> WobblyResult<Self> {
        let file = WobFile::read(path.as_ref())?;
        let project = Self::from_wob_file(file)?;
        tracing::info!(
            "[Wobbly] Loaded {}: {} frames, {} sections, {} decimated, {} orphans",
            path.as_ref().display(),
            project.num_frames(),
            project.sections.len(),
            project.decimations.len(),
            project.orphan_frames.len()
        );
        Ok(project)
    }

    /// Build a project from an already parsed file.
    pub fn from_wob_file(file: WobFile) -> WobblyResult<Self> {
        let video = WobblyVideo {
            file_path: PathBuf::from(
                file.input_file
                    .clone()
                    .ok_or_else(|| WobblyError::missing("input file"))?,
            ),
            source_filter: file
                .source_filter
                .clone()
                .ok_or_else(|| WobblyError::missing("source filter"))?,
            trims: file
                .trim
                .iter()
                .flatten()
                .map(|[s, e]| (*s, *e))
                .collect(),
            framerate: parse_frame_rate(file.input_frame_rate.unwrap_or(DEFAULT_FRAME_RATE))?,
        };
        for &(start, end) in &video.trims {
            if start > end {
                return Err(WobblyError::InvalidRange { start, end });
            }
        }

        let meta = WobblyMeta {
            wobbly_version: file.wobbly_version.unwrap_or(-1),
            project_format_version: file.project_format_version.unwrap_or(-1),
            generated_with: file.generated_with.clone(),
        };

        let vfm_params = file.vfm_parameters.clone().unwrap_or_default();
        let vdecimate_params = file.vdecimate_parameters.clone().unwrap_or_default();
        if vdecimate_params.cycle != DECIMATION_CYCLE as i64 {
            return Err(WobblyError::InvalidCycle(vdecimate_params.cycle));
        }
        let field_order = vfm_params.field_order()?;

        let matches = parse_matches(
            file.matches
                .as_deref()
                .ok_or_else(|| WobblyError::missing("matches"))?,
        )?;
        let num_frames = matches.len();
        let check = |frame: usize, context: &str| -> WobblyResult<usize> {
            if frame < num_frames {
                Ok(frame)
            } else {
                Err(WobblyError::frame_index(frame, num_frames, context))
            }
        };

        let decimations = file
            .decimated_frames
            .iter()
            .flatten()
            .map(|&n| check(n, "decimated frames"))
            .collect::<WobblyResult<BTreeSet<_>>>()?;

        let interlaced_fades = file
            .interlaced_fades
            .iter()
            .flatten()
            .map(|FadeEntry { frame, field_difference }| {
                check(*frame, "interlaced fades")
                    .map(|n| (n, InterlacedFade::new(n, *field_difference)))
            })
            .collect::<WobblyResult<BTreeMap<_, _>>>()?;

        let combed_frames = file
            .combed_frames
            .iter()
            .flatten()
            .map(|&n| check(n, "combed frames"))
            .collect::<WobblyResult<BTreeSet<_>>>()?
            .into_iter()
            .filter(|n| !interlaced_fades.contains_key(n))
            .collect();

        let mut freeze_frames = Vec::new();
        for &[start, end, replacement] in file.frozen_frames.iter().flatten() {
            let freeze = FreezeFrame::new(start, end, replacement)?;
            check(end, "frozen frames")?;
            check(replacement, "frozen frames")?;
            freeze_frames.push(freeze);
        }
        freeze_frames.sort();

        let sections = build_sections(file.sections.clone().unwrap_or_default(), num_frames)?;
        let orphan_frames = find_orphans(&sections, &matches)?;

        Ok(Self {
            video,
            meta,
            vfm_params,
            vdecimate_params,
            field_order,
            matches,
            combed_frames,
            orphan_frames,
            decimations,
            sections,
            interlaced_fades,
            freeze_frames,
            presets: file.presets.clone().unwrap_or_default(),
            source: file,
        })
    }

    /// Frame count before decimation.
    pub fn num_frames(&self) -> usize {
        self.matches.len()
    }

    /// Frame count after decimation.
    pub fn output_frames(&self) -> usize {
        self.num_frames() - self.decimations.len()
    }

    /// Section containing `frame`.
    pub fn section_of(&self, frame: usize) -> Option<&Section> {
        let idx = self.sections.partition_point(|s| s.start <= frame);
        idx.checked_sub(1)
            .map(|i| &self.sections[i])
            .filter(|s| s.contains(frame))
    }

    /// Start frame of every section.
    pub fn section_keyframes(&self) -> Vec<usize> {
        self.sections.iter().map(|s| s.start).collect()
    }

    /// Section starts mapped onto the decimated timeline.
    pub fn decimated_keyframes(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .sections
            .iter()
            .map(|s| s.start - self.decimations.range(..s.start).count())
            .filter(|&n| n < self.output_frames())
            .collect();
        out.dedup();
        out
    }

    /// Decimated frames in each cycle of [`DECIMATION_CYCLE`] frames.
    pub fn drops_per_cycle(&self) -> Vec<usize> {
        let cycles = self.num_frames().div_ceil(DECIMATION_CYCLE);
        let mut drops = vec![0; cycles];
        for &n in &self.decimations {
            drops[n / DECIMATION_CYCLE] += 1;
        }
        drops
    }

    /// Frame rate of every pre-decimation frame, given the drops in its cycle.
    pub fn cycle_frame_rates(&self) -> Vec<Rational64> {
        let cycle = DECIMATION_CYCLE as i64;
        let drops = self.drops_per_cycle();
        (0..self.num_frames())
            .map(|n| {
                let kept = cycle - drops[n / DECIMATION_CYCLE] as i64;
                self.video.framerate * Rational64::new(kept, cycle)
            })
            .collect()
    }

    /// Variable frame rate timecodes of the decimated output.
    pub fn timecodes(&self) -> Timecodes {
        let rates = self.cycle_frame_rates();
        Timecodes::new(
            rates
                .into_iter()
                .enumerate()
                .filter(|(n, _)| !self.decimations.contains(n))
                .map(|(_, rate)| rate)
                .collect(),
        )
    }

    /// Re-serialise the project, keeping keys this crate does not model.
    pub fn to_wob_file(&self) -> WobFile {
        let mut file = self.source.clone();
        file.input_file = Some(self.video.file_path.to_string_lossy().into_owned());
        file.source_filter = Some(self.video.source_filter.clone());
        file.input_frame_rate = Some([*self.video.framerate.numer(), *self.video.framerate.denom()]);
        file.trim = Some(self.video.trims.iter().map(|&(s, e)| [s, e]).collect());
        file.vfm_parameters = Some(self.vfm_params.clone());
        file.vdecimate_parameters = Some(self.vdecimate_params.clone());
        file.matches = Some(self.matches.iter().map(Match::as_char).collect());
        // Fade frames are only dropped from the combed set for replay
        file.combed_frames = Some(
            self.source
                .combed_frames
                .iter()
                .flatten()
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        );
        file.decimated_frames = Some(self.decimations.iter().copied().collect());
        file.sections = Some(
            self.sections
                .iter()
                .map(|s| SectionEntry {
                    start: s.start,
                    presets: s.presets.clone(),
                })
                .collect(),
        );
        file.interlaced_fades = Some(
            self.interlaced_fades
                .values()
                .map(|f| FadeEntry {
                    frame: f.frame,
                    field_difference: f.field_difference,
                })
                .collect(),
        );
        file.frozen_frames = Some(
            self.freeze_frames
                .iter()
                .map(|f| [f.start, f.end, f.replacement])
                .collect(),
        );
        file
    }

    /// Write the project back to disk.
    pub fn save(&self, path: impl AsRef<Path>) -> WobblyResult<PathBuf> {
        self.to_wob_file().write(path)
    }
}

fn parse_frame_rate([num, den]: [i64; 2]) -> WobblyResult<Rational64> {
    if num <= 0 || den <= 0 {
        return Err(WobblyError::invalid_value(
            "input frame rate",
            format!("{}/{} is not a positive rate", num, den),
        ));
    }
    Ok(Rational64::new(num, den))
}

/// Decode a match string, reporting every illegal character.
pub fn parse_matches(raw: &str) -> WobblyResult<Vec<Match>> {
    let mut illegal = BTreeSet::new();
    let matches: Vec<Match> = raw
        .chars()
        .filter_map(|c| {
            let m = Match::from_char(c);
            if m.is_none() {
                illegal.insert(c.to_string());
            }
            m
        })
        .collect();
    if !illegal.is_empty() {
        return Err(WobblyError::InvalidMatch {
            chars: illegal.into_iter().collect(),
        });
    }
    Ok(matches)
}

/// Turn section start markers into contiguous sections covering the clip.
///
/// A section at frame 0 is implied when no marker starts there.
fn build_sections(mut entries: Vec<SectionEntry>, num_frames: usize) -> WobblyResult<Vec<Section>> {
    entries.sort_by_key(|e| e.start);
    if num_frames > 0 && entries.first().map_or(true, |e| e.start > 0) {
        entries.insert(
            0,
            SectionEntry {
                start: 0,
                presets: vec![],
            },
        );
    }
    let mut sections = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        if entry.start >= num_frames {
            return Err(WobblyError::frame_index(entry.start, num_frames, "sections"));
        }
        let end = match entries.get(i + 1) {
            Some(next) => next
                .start
                .checked_sub(1)
                .ok_or(WobblyError::InvalidRange { start: entry.start, end: 0 })?,
            None => num_frames - 1,
        };
        sections.push(Section::new(entry.start, end, entry.presets.clone())?);
    }
    Ok(sections)
}

/// Orphans sit on section edges: `n`/`p` at a start, `b`/`u` at an end.
fn find_orphans(sections: &[Section], matches: &[Match]) -> WobblyResult<BTreeSet<OrphanField>> {
    let tag = |frame: usize| {
        matches
            .get(frame)
            .copied()
            .ok_or_else(|| WobblyError::frame_index(frame, matches.len(), "orphan detection"))
    };

    let mut orphans = BTreeSet::new();
    for section in sections {
        let first = tag(section.start)?;
        if matches!(first, Match::N | Match::P) {
            if let Some(orphan) = first.as_orphan() {
                orphans.insert(OrphanField::new(section.start, orphan));
            }
        }
        let last = tag(section.end)?;
        if matches!(last, Match::B | Match::U) {
            if let Some(orphan) = last.as_orphan() {
                orphans.insert(OrphanField::new(section.end, orphan));
            }
        }
    }
    Ok(orphans)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::OrphanMatch;
    use serde_json::json;
    use tempfile::tempdir;

    pub(crate) fn project_json(matches: &str) -> serde_json::Value {
        json!({
            "wobbly version": 6,
            "project format version": 2,
            "input file": "/videos/episode.mkv",
            "source filter": "lsmas.LWLibavSource",
            "input frame rate": [30000, 1001],
            "vfm parameters": {"order": 1},
            "vdecimate parameters": {"cycle": 5},
            "matches": matches,
            "sections": [{"start": 0, "presets": []}],
        })
    }

    pub(crate) fn build(value: serde_json::Value) -> WobblyResult<WobblyProject> {
        WobblyProject::from_wob_file(serde_json::from_value(value)?)
    }

    #[test]
    fn minimal_project_parses() {
        let project = build(project_json("cccnn")).unwrap();
        assert_eq!(project.num_frames(), 5);
        assert_eq!(project.field_order, FieldOrder::Tff);
        assert_eq!(project.sections, vec![Section::new(0, 4, vec![]).unwrap()]);
        assert_eq!(project.video.framerate, Rational64::new(30000, 1001));
    }

    #[test]
    fn sections_and_orphans() {
        let mut value = project_json("ccnccbcc");
        value["sections"] = json!([{"start": 0}, {"start": 3}, {"start": 5}]);
        value["interlaced fades"] = json!([{"frame": 2, "field difference": 0.5}]);
        value["combed frames"] = json!([2, 7]);

        let project = build(value).unwrap();
        let ranges: Vec<(usize, usize)> = project.sections.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(ranges, vec![(0, 2), (3, 4), (5, 7)]);

        assert!(project.orphan_frames.is_empty());
        assert_eq!(project.combed_frames, BTreeSet::from([7]));
    }

    #[test]
    fn section_ends_follow_next_start() {
        let mut value = project_json(&"c".repeat(30));
        value["sections"] = json!([{"start": 25}, {"start": 0}, {"start": 10}]);
        let project = build(value).unwrap();

        let ranges: Vec<(usize, usize)> = project.sections.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(ranges, vec![(0, 9), (10, 24), (25, 29)]);
        assert_eq!(project.sections.last().map(|s| s.end), Some(project.num_frames() - 1));
    }

    #[test]
    fn leading_frames_get_an_implicit_section() {
        let mut value = project_json(&"c".repeat(12));
        value["sections"] = json!([{"start": 4, "presets": ["deblock"]}]);
        let project = build(value).unwrap();
        let ranges: Vec<(usize, usize)> = project.sections.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(ranges, vec![(0, 3), (4, 11)]);
        assert!(project.sections[0].presets.is_empty());

        let mut value = project_json(&"c".repeat(12));
        value["sections"] = json!([]);
        let project = build(value).unwrap();
        assert_eq!(project.sections, vec![Section::new(0, 11, vec![]).unwrap()]);
        assert_eq!(project.section_of(0).map(|s| s.start), Some(0));
    }

    #[test]
    fn orphan_scenario_from_section_edges() {
        let mut value = project_json("ccnccbcc");
        value["sections"] = json!([{"start": 0}, {"start": 2}, {"start": 6}]);
        let project = build(value).unwrap();

        // Section 2..=5 starts with 'n' and ends with 'b'
        assert_eq!(
            project.orphan_frames,
            BTreeSet::from([
                OrphanField::new(2, OrphanMatch::N),
                OrphanField::new(5, OrphanMatch::B),
            ])
        );
        assert_eq!(project.section_keyframes(), vec![0, 2, 6]);
    }

    #[test]
    fn missing_input_file_is_named() {
        let mut value = project_json("ccc");
        value.as_object_mut().unwrap().remove("input file");
        match build(value) {
            Err(WobblyError::MissingValue(key)) => assert_eq!(key, "input file"),
            other => panic!("expected MissingValue, got {:?}", other),
        }
    }

    #[test]
    fn cycle_other_than_five_is_rejected() {
        let mut value = project_json("ccc");
        value["vdecimate parameters"] = json!({"cycle": 4});
        assert!(matches!(build(value), Err(WobblyError::InvalidCycle(4))));
    }

    #[test]
    fn illegal_match_characters_are_listed() {
        match build(project_json("ccxcyx")) {
            Err(WobblyError::InvalidMatch { chars }) => assert_eq!(chars, vec!["x", "y"]),
            other => panic!("expected InvalidMatch, got {:?}", other),
        }
    }

    #[test]
    fn progressive_source_is_rejected() {
        let mut value = project_json("ccc");
        value["vfm parameters"] = json!({"order": -1});
        assert!(matches!(
            build(value),
            Err(WobblyError::UnsupportedFieldOrder(-1))
        ));
    }

    #[test]
    fn out_of_range_frames_carry_frame_number() {
        let mut value = project_json("ccc");
        value["decimated frames"] = json!([1, 9]);
        match build(value) {
            Err(WobblyError::FrameIndex { frame, .. }) => assert_eq!(frame, 9),
            other => panic!("expected FrameIndex, got {:?}", other),
        }
    }

    #[test]
    fn frame_rates_follow_cycle_drops() {
        let mut value = project_json("cccccccccc");
        value["decimated frames"] = json!([3]);
        let project = build(value).unwrap();

        let rates = project.cycle_frame_rates();
        assert_eq!(rates[0], Rational64::new(24000, 1001));
        assert_eq!(rates[4], Rational64::new(24000, 1001));
        assert_eq!(rates[5], Rational64::new(30000, 1001));
        assert_eq!(project.output_frames(), 9);
        assert_eq!(project.timecodes().len(), 9);
    }

    #[test]
    fn decimated_keyframes_shift_with_drops() {
        let mut value = project_json("cccccccccc");
        value["sections"] = json!([{"start": 0}, {"start": 6}]);
        value["decimated frames"] = json!([1, 6]);
        let project = build(value).unwrap();
        assert_eq!(project.decimated_keyframes(), vec![0, 5]);
    }

    #[test]
    fn round_trip_preserves_project_data() {
        let dir = tempdir().unwrap();
        let mut value = project_json("ccnccbcc");
        value["sections"] = json!([{"start": 0}, {"start": 2, "presets": ["deblock"]}]);
        value["combed frames"] = json!([4, 1]);
        value["decimated frames"] = json!([3]);
        value["frozen frames"] = json!([[5, 6, 4]]);
        value["custom lists"] = json!([]);

        let project = build(value).unwrap();
        let path = project.save(dir.path().join("episode")).unwrap();
        assert!(path.to_string_lossy().ends_with("episode.wob"));

        let reloaded = WobblyProject::open(&path).unwrap();
        assert_eq!(reloaded.matches, project.matches);
        assert_eq!(reloaded.combed_frames, project.combed_frames);
        assert_eq!(reloaded.decimations, project.decimations);
        assert_eq!(reloaded.sections, project.sections);
        assert_eq!(reloaded.freeze_frames, project.freeze_frames);
        assert!(reloaded.to_wob_file().extra.contains_key("custom lists"));
    }

    #[test]
    fn section_lookup() {
        let mut value = project_json("cccccc");
        value["sections"] = json!([{"start": 0}, {"start": 4}]);
        let project = build(value).unwrap();
        assert_eq!(project.section_of(3).map(|s| s.start), Some(0));
        assert_eq!(project.section_of(5).map(|s| s.start), Some(4));
        assert!(project.section_of(6).is_none());
    }
}
