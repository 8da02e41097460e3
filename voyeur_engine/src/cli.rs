use std::path::PathBuf;

use clap::Parser;
use voyeur_formats::ArchiveKind;

#[derive(Parser, Debug)]
#[command(
    about = "Loads BOLT groups and drives palette fades and cycles for a number of ticks",
    version
)]
pub struct Args {
    /// BOLT archive to load resources from
    #[arg(long)]
    pub archive: PathBuf,

    /// Init-method table to apply (bvoy or stamp)
    #[arg(long)]
    pub kind: Option<ArchiveKind>,

    /// JSON file with loader settings
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Group to load, by group index or member id (may repeat; loaded in order)
    #[arg(long = "group", value_name = "ID", value_parser = parse_id)]
    pub groups: Vec<u16>,

    /// Viewport list whose palette becomes the fade target table
    #[arg(long, value_name = "ID", value_parser = parse_id)]
    pub view_port_list: Option<u16>,

    /// Colour map to fade to
    #[arg(long, value_name = "ID", value_parser = parse_id)]
    pub fade: Option<u16>,

    /// Cycle list to start
    #[arg(long, value_name = "ID", value_parser = parse_id)]
    pub cycle: Option<u16>,

    /// Number of timer ticks to run
    #[arg(long, default_value_t = 0)]
    pub ticks: u32,

    /// Tick at which a fade held by its colour map's skip bit is released
    #[arg(long, value_name = "TICK")]
    pub resume_fade_at: Option<u32>,

    /// Path to write the run report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Accepts decimal or `0x`-prefixed hexadecimal ids.
pub fn parse_id(value: &str) -> Result<u16, String> {
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse::<u16>(),
    }
    .map_err(|err| format!("invalid id {value:?}: {err}"))
}
