//! Core enums used throughout the crate.

use serde::{Deserialize, Serialize};

/// Field-match tag for a single frame.
///
/// The tag names which fields the output frame is built from, using the
/// TIVTC convention relative to the clip's field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Match {
    /// First field from the current frame, second field from the previous.
    #[serde(rename = "p")]
    P,
    /// Both fields from the current frame.
    #[serde(rename = "c")]
    C,
    /// First field from the current frame, second field from the next.
    #[serde(rename = "n")]
    N,
    /// Second field from the current frame, first field from the previous.
    #[serde(rename = "b")]
    B,
    /// Second field from the current frame, first field from the next.
    #[serde(rename = "u")]
    U,
}

impl Match {
    /// All tags in VFM's integer order (`VFMMatch` = index).
    pub const VFM_ORDER: [Match; 5] = [Match::P, Match::C, Match::N, Match::B, Match::U];

    /// Parse a single tag character.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'p' => Some(Match::P),
            'c' => Some(Match::C),
            'n' => Some(Match::N),
            'b' => Some(Match::B),
            'u' => Some(Match::U),
            _ => None,
        }
    }

    /// The tag character.
    pub fn as_char(&self) -> char {
        match self {
            Match::P => 'p',
            Match::C => 'c',
            Match::N => 'n',
            Match::B => 'b',
            Match::U => 'u',
        }
    }

    /// Decode the integer match written by VFM.
    pub fn from_vfm_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::VFM_ORDER.get(i).copied())
    }

    /// Returns the orphan variant of this tag, if it has one.
    pub fn as_orphan(&self) -> Option<OrphanMatch> {
        match self {
            Match::B => Some(OrphanMatch::B),
            Match::N => Some(OrphanMatch::N),
            Match::P => Some(OrphanMatch::P),
            Match::U => Some(OrphanMatch::U),
            Match::C => None,
        }
    }
}

impl std::fmt::Display for Match {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Match tag of an orphan field (a field whose partner was cut at a section edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrphanMatch {
    #[serde(rename = "b")]
    B,
    #[serde(rename = "n")]
    N,
    #[serde(rename = "p")]
    P,
    #[serde(rename = "u")]
    U,
}

impl OrphanMatch {
    pub const ALL: [OrphanMatch; 4] = [
        OrphanMatch::B,
        OrphanMatch::N,
        OrphanMatch::P,
        OrphanMatch::U,
    ];

    pub fn from_char(c: char) -> Option<Self> {
        Match::from_char(c).and_then(|m| m.as_orphan())
    }

    pub fn as_match(&self) -> Match {
        match self {
            OrphanMatch::B => Match::B,
            OrphanMatch::N => Match::N,
            OrphanMatch::P => Match::P,
            OrphanMatch::U => Match::U,
        }
    }

    /// Field order to deinterlace this orphan with.
    ///
    /// `n` and `p` orphans keep the top field, `b` and `u` keep the bottom.
    pub fn deinterlace_order(&self) -> FieldOrder {
        match self {
            OrphanMatch::N | OrphanMatch::P => FieldOrder::Tff,
            OrphanMatch::B | OrphanMatch::U => FieldOrder::Bff,
        }
    }
}

impl std::fmt::Display for OrphanMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_match().as_char())
    }
}

/// Field order of a clip, using the host's `_FieldBased` codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldOrder {
    /// Progressive (`_FieldBased` = 0).
    #[default]
    Progressive,
    /// Bottom field first (`_FieldBased` = 1).
    Bff,
    /// Top field first (`_FieldBased` = 2).
    Tff,
}

impl FieldOrder {
    /// Map VFM's `order` parameter (1 = TFF, 0 = BFF).
    pub fn from_vfm_order(order: i64) -> Option<Self> {
        match order + 1 {
            1 => Some(FieldOrder::Bff),
            2 => Some(FieldOrder::Tff),
            _ => None,
        }
    }

    pub fn from_field_based(value: i64) -> Option<Self> {
        match value {
            0 => Some(FieldOrder::Progressive),
            1 => Some(FieldOrder::Bff),
            2 => Some(FieldOrder::Tff),
            _ => None,
        }
    }

    pub fn field_based(&self) -> i64 {
        match self {
            FieldOrder::Progressive => 0,
            FieldOrder::Bff => 1,
            FieldOrder::Tff => 2,
        }
    }

    pub fn is_interlaced(&self) -> bool {
        !matches!(self, FieldOrder::Progressive)
    }

    /// Progressive content is treated as top field first.
    pub fn is_tff(&self) -> bool {
        !matches!(self, FieldOrder::Bff)
    }

    /// Get human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            FieldOrder::Progressive => "progressive",
            FieldOrder::Bff => "bff",
            FieldOrder::Tff => "tff",
        }
    }
}

impl std::fmt::Display for FieldOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How the two field averages of a fade frame are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FadeMode {
    /// Mean of both fields.
    #[default]
    Average,
    /// Darker of both fields.
    Darken,
    /// Brighter of both fields.
    Brighten,
}

impl std::fmt::Display for FadeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FadeMode::Average => write!(f, "average"),
            FadeMode::Darken => write!(f, "darken"),
            FadeMode::Brighten => write!(f, "brighten"),
        }
    }
}

impl std::str::FromStr for FadeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "average" => Ok(FadeMode::Average),
            "darken" => Ok(FadeMode::Darken),
            "brighten" => Ok(FadeMode::Brighten),
            other => Err(format!("unknown fade mode '{}'", other)),
        }
    }
}

/// Scene change detection plugin used during metric gathering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneChangeMode {
    #[default]
    Wwxd,
    Scxvid,
}

impl SceneChangeMode {
    /// Plugin namespace providing this detector.
    pub fn namespace(&self) -> &'static str {
        match self {
            SceneChangeMode::Wwxd => "wwxd",
            SceneChangeMode::Scxvid => "scxvid",
        }
    }
}
