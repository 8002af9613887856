//! Sample aspect ratio calculator.

use clap::{Args, ValueEnum};
use console::style;
use ivtc_core::aspect::{compute_sar, Dar, Region};

use super::parse_resolution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RegionArg {
    Ntsc,
    Pal,
}

impl From<RegionArg> for Region {
    fn from(region: RegionArg) -> Self {
        match region {
            RegionArg::Ntsc => Region::Ntsc,
            RegionArg::Pal => Region::Pal,
        }
    }
}

#[derive(Args, Debug)]
pub struct CmdSar {
    /// Width of the active picture in pixels
    pub active_width: i64,

    /// Display aspect ratio: full, wide, square, or `N:D`
    #[arg(long, default_value = "full")]
    pub dar: Dar,

    #[arg(long, value_enum, default_value = "ntsc")]
    pub region: RegionArg,

    /// Active lines, if not the region's default
    #[arg(long)]
    pub height: Option<i64>,

    /// Stored frame size
    #[arg(long, default_value = "720x480")]
    pub frame: String,
}

impl CmdSar {
    pub fn run(&self) -> anyhow::Result<()> {
        let (width, height) = parse_resolution(&self.frame)?;
        let result = compute_sar(
            self.active_width,
            self.dar,
            self.height,
            self.region.into(),
            (width as i64, height as i64),
        )
        .ok_or_else(|| anyhow::anyhow!("active width must be positive"))?;

        println!(
            "  {:<12} {}:{}",
            style("SAR:").white(),
            result.sar_num,
            result.sar_den
        );
        if let Some(w) = result.anamorphic_width {
            println!("  {:<12} {:.2}x{}", style("Display:").white(), w, height);
        }
        if let Some(h) = result.anamorphic_height {
            println!("  {:<12} {}x{:.2}", style("Display:").white(), width, h);
        }
        Ok(())
    }
}
