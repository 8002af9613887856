//! Sample aspect ratio for analog-sourced video.
//!
//! Given the active picture width (the width left after discarding dirty
//! edges) and the intended display aspect ratio, compute the SAR to encode
//! with and the resolution the picture would have if stretched.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};

/// Display aspect ratio of the analog picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dar {
    /// 16:9
    Wide,
    /// 4:3
    Full,
    /// 1:1, no stretching
    Square,
    Custom(i64, i64),
}

impl Dar {
    pub fn ratio(&self) -> (i64, i64) {
        match *self {
            Dar::Wide => (16, 9),
            Dar::Full => (4, 3),
            Dar::Square => (1, 1),
            Dar::Custom(n, d) => (n, d),
        }
    }

    /// Guess the DAR from a source's SAR.
    pub fn from_sar(sar_num: i64, sar_den: i64) -> Option<Self> {
        match (sar_num, sar_den) {
            (10, 11) | (8, 9) => Some(Dar::Full),
            (40, 33) | (32, 27) => Some(Dar::Wide),
            _ => None,
        }
    }
}

impl std::str::FromStr for Dar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wide" | "16:9" => Ok(Dar::Wide),
            "full" | "4:3" => Ok(Dar::Full),
            "square" | "1:1" => Ok(Dar::Square),
            other => {
                let (n, d) = other
                    .split_once(':')
                    .or_else(|| other.split_once('/'))
                    .ok_or_else(|| format!("invalid DAR '{}'", s))?;
                let n: i64 = n.trim().parse().map_err(|_| format!("invalid DAR '{}'", s))?;
                let d: i64 = d.trim().parse().map_err(|_| format!("invalid DAR '{}'", s))?;
                if n <= 0 || d <= 0 {
                    return Err(format!("invalid DAR '{}'", s));
                }
                Ok(Dar::Custom(n, d))
            }
        }
    }
}

/// Analog television standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Region {
    #[default]
    Ntsc,
    Pal,
}

impl Region {
    /// Active lines.
    pub fn height(&self) -> i64 {
        match self {
            Region::Ntsc => 480,
            Region::Pal => 576,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SarResult {
    pub sar_num: i64,
    pub sar_den: i64,
    /// Width after stretching to the DAR (widescreen and custom DARs).
    pub anamorphic_width: Option<f64>,
    /// Height after squeezing to the DAR (fullscreen and custom DARs).
    pub anamorphic_height: Option<f64>,
}

/// SAR for `active_area` pixels of width displayed at `dar`.
///
/// `height` defaults to the region's active lines. `frame` is the stored
/// `(width, height)` used for the anamorphic resolution.
pub fn compute_sar(
    active_area: i64,
    dar: Dar,
    height: Option<i64>,
    region: Region,
    frame: (i64, i64),
) -> Option<SarResult> {
    if active_area <= 0 {
        return None;
    }
    if dar == Dar::Square {
        return Some(SarResult {
            sar_num: 1,
            sar_den: 1,
            anamorphic_width: None,
            anamorphic_height: None,
        });
    }
    let (dar_num, dar_den) = dar.ratio();
    let height = height.unwrap_or_else(|| region.height());
    let reduced = Rational64::new(dar_num * height, dar_den * active_area);
    let (sar_num, sar_den) = (*reduced.numer(), *reduced.denom());
    let sar = sar_num as f64 / sar_den as f64;

    let (width, frame_height) = (frame.0 as f64, frame.1 as f64);
    let (anamorphic_width, anamorphic_height) = match dar {
        Dar::Wide => (Some(width * sar), None),
        Dar::Full => (None, Some(frame_height / sar)),
        _ => (Some(width * sar), Some(frame_height / sar)),
    };
    Some(SarResult {
        sar_num,
        sar_den,
        anamorphic_width,
        anamorphic_height,
    })
}
