use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use voyeur_formats::{BoltConfig, BoltFile, IoStats, MemberId};

mod cli;
mod events;
mod graphics;

use cli::Args;
use events::{EventsManager, IntData, IntNode};
use graphics::{GraphicsManager, PaletteUpload};

#[derive(Serialize)]
struct RunReport {
    archive: PathBuf,
    groups_loaded: Vec<u8>,
    ticks: u64,
    int_data: IntData,
    nodes: Vec<IntNode>,
    fading: bool,
    fade_count: u32,
    cycling: bool,
    pal_index: u16,
    video_mode: u16,
    palette_uploads: Vec<PaletteUpload>,
    /// Final VGA colour table, 768 bytes.
    palette: Vec<u8>,
    io: IoStats,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match args.config.as_ref() {
        Some(path) => BoltConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => BoltConfig::default(),
    };
    if let Some(kind) = args.kind {
        config.kind = kind;
    }

    let mut archive = BoltFile::open(&args.archive, config)
        .with_context(|| format!("opening BOLT archive {}", args.archive.display()))?;
    for &group in &args.groups {
        let id = group_member(group);
        archive
            .get_bolt_group(id)
            .with_context(|| format!("loading group {:#04x}", id.group()))?;
    }

    let mut gfx = GraphicsManager::new();
    let mut events = EventsManager::new();

    if let Some(list) = args.view_port_list {
        let palette = archive
            .view_port_list_palette(MemberId(list))
            .with_context(|| format!("reading viewport list {list:#06x}"))?;
        gfx.set_view_port_list(&palette);
    }

    if let Some(fade) = args.fade {
        let cmap = archive
            .resource_at(MemberId(fade))
            .and_then(|res| res.as_cmap())
            .with_context(|| format!("member {fade:#06x} is not a loaded colour map"))?;
        events.start_fade(cmap, &mut gfx);
    }

    if let Some(cycle) = args.cycle {
        let cycle_res = archive
            .resource_at(MemberId(cycle))
            .and_then(|res| res.as_cycle())
            .with_context(|| format!("member {cycle:#06x} is not a loaded cycle list"))?;
        events.start_cycle(cycle_res, &archive);
    }

    events.flush_palette(&mut gfx);
    for tick in 0..args.ticks {
        if args.resume_fade_at == Some(tick) {
            events.resume_fading();
        }
        events.voyeur_timer(&mut gfx);
        events.flush_palette(&mut gfx);
    }

    let report = RunReport {
        archive: args.archive.clone(),
        groups_loaded: archive
            .groups()
            .iter()
            .filter(|group| group.is_loaded())
            .map(|group| group.index())
            .collect(),
        ticks: events.ticks(),
        int_data: events.int_data.clone(),
        nodes: events.nodes().to_vec(),
        fading: events.is_fading(),
        fade_count: events.fade_count(),
        cycling: events.is_cycling(),
        pal_index: archive.display().pal_index,
        video_mode: archive.display().video_mode,
        palette_uploads: gfx.uploads().to_vec(),
        palette: gfx.vga_colors.to_vec(),
        io: archive.io_stats(),
    };

    println!(
        "ran {} ticks over {} loaded groups: {} palette uploads, fading={}, cycling={}",
        report.ticks,
        report.groups_loaded.len(),
        report.palette_uploads.len(),
        report.fading,
        report.cycling
    );

    if let Some(path) = args.report.as_ref() {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
    }

    archive.close();
    Ok(())
}

/// Group ids up to 0xFF name a group; larger values are member ids.
fn group_member(value: u16) -> MemberId {
    if value > 0xFF {
        MemberId(value)
    } else {
        MemberId::new(value as u8, 0)
    }
}
