use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use voyeur_formats::{
    ArchiveKind, BoltConfig, BoltFile, EntryHeader, GroupHeader, IoStats, MemberId,
};

#[derive(Parser, Debug)]
#[command(about = "List the groups and entries of a BOLT archive", version)]
struct Args {
    /// BOLT archive to inspect
    file: PathBuf,

    /// Init-method table to apply (bvoy or stamp)
    #[arg(long)]
    kind: Option<ArchiveKind>,

    /// JSON file with loader settings
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Group to load and materialize (decimal or 0x-prefixed, may repeat)
    #[arg(long = "group", value_name = "ID", value_parser = parse_group)]
    groups: Vec<u8>,

    /// Print a JSON document instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct DumpReport {
    path: PathBuf,
    kind: ArchiveKind,
    groups: Vec<GroupReport>,
    io: IoStats,
}

#[derive(Serialize)]
struct GroupReport {
    index: u8,
    header: GroupHeader,
    loaded: bool,
    entries: Vec<EntryReport>,
}

#[derive(Serialize)]
struct EntryReport {
    #[serde(flatten)]
    header: EntryHeader,
    resource: Option<&'static str>,
    unresolved_links: usize,
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

    let mut archive = BoltFile::open(&args.file, config)?;
    for &group in &args.groups {
        archive
            .get_bolt_group(MemberId::new(group, 0))
            .with_context(|| format!("loading group {group:#04x}"))?;
    }

    let report = build_report(&args.file, &archive);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(&report);
    }
    Ok(())
}

fn build_report<R>(path: &std::path::Path, archive: &BoltFile<R>) -> DumpReport
where
    R: std::io::Read + std::io::Seek,
{
    let groups = archive
        .groups()
        .iter()
        .map(|group| GroupReport {
            index: group.index(),
            header: *group.header(),
            loaded: group.is_loaded(),
            entries: group
                .entries()
                .iter()
                .map(|entry| EntryReport {
                    header: *entry.header(),
                    resource: entry.resource().map(|res| res.kind()),
                    unresolved_links: entry
                        .resource()
                        .map(|res| res.links().iter().filter(|l| !l.is_resolved()).count())
                        .unwrap_or(0),
                })
                .collect(),
        })
        .collect();

    DumpReport {
        path: path.to_path_buf(),
        kind: archive.config().kind,
        groups,
        io: archive.io_stats(),
    }
}

fn print_table(report: &DumpReport) {
    println!(
        "{} groups in {} ({:?})",
        report.groups.len(),
        report.path.display(),
        report.kind
    );
    for group in &report.groups {
        println!(
            "group {index:#04x} {count:>4} entries at {offset:>10}{processed}",
            index = group.index,
            count = group.header.count,
            offset = group.header.file_offset,
            processed = if group.header.processed {
                " processed"
            } else {
                ""
            }
        );
        for entry in &group.entries {
            println!(
                "  {id} mode {mode:#04x} init {init:>3} {size:>8} bytes at {offset:>10} {kind}",
                id = entry.header.id,
                mode = entry.header.mode,
                init = entry.header.init_method,
                size = entry.header.size,
                offset = entry.header.file_offset,
                kind = entry.resource.unwrap_or("-"),
            );
        }
    }
}

fn parse_group(value: &str) -> Result<u8, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse::<u16>(),
    }
    .map_err(|err| format!("invalid group id {value:?}: {err}"))?;
    // Accept a full member id and keep its group byte.
    Ok(if parsed > 0xFF { (parsed >> 8) as u8 } else { parsed as u8 })
}
