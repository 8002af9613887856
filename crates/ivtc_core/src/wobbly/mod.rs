//! Wobbly project support.
//!
//! - [`WobFile`]: raw `.wob` JSON, read and written losslessly
//! - [`WobblyProject`]: validated, immutable view of a project
//! - [`WobblyProject::apply`]: replay the project's decisions onto a clip
//! - [`Wibbly`]: gather metrics from a video and write a new project
//!
//! # Usage
//!
//! ```ignore
//! use ivtc_core::wobbly::{ReplayOptions, WobblyProject};
//!
//! let project = WobblyProject::open("episode01.wob")?;
//! let script = project.apply_from_source(&ReplayOptions::default())?;
//! std::fs::write("episode01.vpy", script.to_script())?;
//! ```

mod error;
mod file;
mod info;
mod project;
mod replay;
mod wibbly;

pub use error::{WobblyError, WobblyResult};
pub use file::{with_wob_extension, FadeEntry, SectionEntry, WobFile};
pub use info::{
    FreezeFrame, InterlacedFade, OrphanField, Preset, Section, VDecParams, VfmParams, WobblyMeta,
    WobblyVideo,
};
pub use project::{parse_matches, WobblyProject, DECIMATION_CYCLE};
pub use replay::{deinterlace_orphans, OrphanHandling, ReplayOptions};
pub use wibbly::{
    guess_source_filter, to_sections, CropConfig, DMetricsConfig, FrameMetric, Wibbly,
    WibblyConfig,
};
