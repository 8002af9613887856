//! On-disk `.wob` project format.
//!
//! Every key is optional at this level so that missing keys can be reported
//! by name when the project is built. Keys this crate does not use are kept
//! in `extra` and written back unchanged.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

use super::error::{WobblyError, WobblyResult};
use super::info::{Preset, VDecParams, VfmParams};

/// Entry of the `sections` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionEntry {
    pub start: usize,
    #[serde(default)]
    pub presets: Vec<String>,
}

/// Entry of the `interlaced fades` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FadeEntry {
    pub frame: usize,
    #[serde(rename = "field difference", alias = "field_difference", default)]
    pub field_difference: f64,
}

/// Raw contents of a project file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WobFile {
    #[serde(rename = "wobbly version", default, skip_serializing_if = "Option::is_none")]
    pub wobbly_version: Option<i64>,
    #[serde(rename = "project format version", default, skip_serializing_if = "Option::is_none")]
    pub project_format_version: Option<i64>,
    #[serde(rename = "generated with", default, skip_serializing_if = "Option::is_none")]
    pub generated_with: Option<String>,
    #[serde(rename = "input file", default, skip_serializing_if = "Option::is_none")]
    pub input_file: Option<String>,
    #[serde(rename = "input frame rate", default, skip_serializing_if = "Option::is_none")]
    pub input_frame_rate: Option<[i64; 2]>,
    #[serde(rename = "input resolution", default, skip_serializing_if = "Option::is_none")]
    pub input_resolution: Option<[i64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<Vec<[usize; 2]>>,
    #[serde(rename = "vfm parameters", default, skip_serializing_if = "Option::is_none")]
    pub vfm_parameters: Option<VfmParams>,
    #[serde(rename = "vdecimate parameters", default, skip_serializing_if = "Option::is_none")]
    pub vdecimate_parameters: Option<VDecParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mics: Option<Vec<Option<Vec<i64>>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mmetrics: Option<Vec<Option<Vec<i64>>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vmetrics: Option<Vec<Option<Vec<i64>>>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::match_string")]
    pub matches: Option<String>,
    #[serde(
        rename = "original matches",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::match_string"
    )]
    pub original_matches: Option<String>,
    #[serde(rename = "combed frames", default, skip_serializing_if = "Option::is_none")]
    pub combed_frames: Option<Vec<usize>>,
    #[serde(rename = "decimated frames", default, skip_serializing_if = "Option::is_none")]
    pub decimated_frames: Option<Vec<usize>>,
    #[serde(rename = "decimate metrics", default, skip_serializing_if = "Option::is_none")]
    pub decimate_metrics: Option<Vec<Option<i64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<SectionEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presets: Option<Vec<Preset>>,
    #[serde(rename = "source filter", default, skip_serializing_if = "Option::is_none")]
    pub source_filter: Option<String>,
    #[serde(rename = "interlaced fades", default, skip_serializing_if = "Option::is_none")]
    pub interlaced_fades: Option<Vec<FadeEntry>>,
    #[serde(rename = "frozen frames", default, skip_serializing_if = "Option::is_none")]
    pub frozen_frames: Option<Vec<[usize; 3]>>,
    /// Keys without a dedicated field.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Append `.wob` unless the path already ends with it.
pub fn with_wob_extension(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    match path.extension() {
        Some(ext) if ext == "wob" => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_owned();
            name.push(".wob");
            PathBuf::from(name)
        }
    }
}

impl WobFile {
    /// Read a project file. The `.wob` suffix is added when missing.
    pub fn read(path: impl AsRef<Path>) -> WobblyResult<Self> {
        let path = with_wob_extension(path);
        if !path.exists() {
            return Err(WobblyError::FileNotFound(path));
        }
        let content = fs::read_to_string(&path).map_err(|source| WobblyError::ReadError {
            path: path.clone(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> WobblyResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Serialise with four-space indentation.
    pub fn to_json(&self) -> WobblyResult<String> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Write the project, creating parent directories and clearing a
    /// zero-byte leftover at the destination first.
    pub fn write(&self, path: impl AsRef<Path>) -> WobblyResult<PathBuf> {
        let path = with_wob_extension(path);
        let write_err = |source| WobblyError::WriteError {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        if let Ok(meta) = fs::metadata(&path) {
            if meta.is_file() && meta.len() == 0 {
                tracing::debug!("[Wobbly] Removing empty stale file {}", path.display());
                fs::remove_file(&path).map_err(write_err)?;
            }
        }

        let content = self.to_json()?;
        let mut file = fs::File::create(&path).map_err(write_err)?;
        file.write_all(content.as_bytes()).map_err(write_err)?;
        file.write_all(b"\n").map_err(write_err)?;
        Ok(path)
    }
}

/// Deserialisers for values Wobbly writes with loose types.
pub(crate) mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    /// Integer stored as int, whole float or bool.
    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        match Value::deserialize(d)? {
            Value::Bool(b) => Ok(i64::from(b)),
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .ok_or_else(|| D::Error::custom(format!("expected an integer, got {}", n))),
            other => Err(D::Error::custom(format!("expected an integer, got {}", other))),
        }
    }

    /// Boolean stored as bool or number (non-zero is true).
    pub fn boolean<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        match Value::deserialize(d)? {
            Value::Bool(b) => Ok(b),
            Value::Number(n) => Ok(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            other => Err(D::Error::custom(format!("expected a boolean, got {}", other))),
        }
    }

    pub fn bool_as_float<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(if *value { 1.0 } else { 0.0 })
    }

    /// Match tags stored as a string or as a list of one-character strings.
    ///
    /// Non-string list entries become `?` so they are reported as illegal.
    pub fn match_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Array(items)) => Ok(Some(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        _ => "?".to_string(),
                    })
                    .collect(),
            )),
            Some(other) => Err(D::Error::custom(format!(
                "expected matches as a string or list, got {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn appends_wob_extension() {
        assert_eq!(with_wob_extension("a/b"), PathBuf::from("a/b.wob"));
        assert_eq!(with_wob_extension("a/b.wob"), PathBuf::from("a/b.wob"));
        assert_eq!(with_wob_extension("a/b.mkv"), PathBuf::from("a/b.mkv.wob"));
    }

    #[test]
    fn matches_accept_list_form() {
        let file = WobFile::from_json(r#"{"matches": ["c", "c", "n", null]}"#).unwrap();
        assert_eq!(file.matches.as_deref(), Some("ccn?"));
    }

    #[test]
    fn fades_accept_both_key_spellings() {
        let file = WobFile::from_json(
            r#"{"interlaced fades": [{"frame": 1, "field difference": 0.5},
                                     {"frame": 2, "field_difference": 0.25}]}"#,
        )
        .unwrap();
        let fades = file.interlaced_fades.unwrap();
        assert_eq!(fades[0].field_difference, 0.5);
        assert_eq!(fades[1].field_difference, 0.25);
    }

    #[test]
    fn unknown_keys_survive_round_trip() {
        let json = r#"{"input file": "a.mkv", "ui": {"zoom": 2}}"#;
        let file = WobFile::from_json(json).unwrap();
        assert_eq!(file.extra["ui"]["zoom"], 2);
        let back = WobFile::from_json(&file.to_json().unwrap()).unwrap();
        assert_eq!(back, file);
    }

    #[test]
    fn write_replaces_empty_stale_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("nested").join("project.wob");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "").unwrap();

        let file = WobFile {
            input_file: Some("video.mkv".into()),
            ..Default::default()
        };
        let written = file.write(&target).unwrap();
        assert_eq!(written, target);
        let content = fs::read_to_string(&target).unwrap();
        assert!(content.contains("\"input file\": \"video.mkv\""));
        assert!(content.contains("\n    \"input file\""));
    }

    #[test]
    fn read_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            WobFile::read(dir.path().join("absent")),
            Err(WobblyError::FileNotFound(_))
        ));
    }
}
