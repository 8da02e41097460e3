use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use voyeur_formats::{ArchiveKind, BoltConfig, BoltFile, MemberId};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(about = "Extract decompressed entries from Voyeur BOLT archives", version)]
struct Args {
    /// BOLT archive to extract (may be passed multiple times)
    #[arg(long = "archive", value_name = "PATH", conflicts_with = "root")]
    archives: Vec<PathBuf>,

    /// Directory containing .blt archives (recursively scanned when --archive is not used)
    #[arg(long = "root", value_name = "DIR", conflicts_with = "archives")]
    root: Option<PathBuf>,

    /// Destination directory for the extracted entries
    #[arg(long, value_name = "DIR", default_value = "extracted")]
    dest: PathBuf,

    /// Groups to extract (decimal or 0x-prefixed, may repeat); all when omitted
    #[arg(long = "group", value_name = "ID", value_parser = parse_group)]
    groups: Vec<u8>,

    /// Init-method table to apply (bvoy or stamp)
    #[arg(long)]
    kind: Option<ArchiveKind>,

    /// JSON file with loader settings
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Overwrite existing files instead of skipping them
    #[arg(long)]
    overwrite: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let archives = resolve_archive_paths(&args);
    if archives.is_empty() {
        bail!("no BOLT archives to extract");
    }

    let mut config = match args.config.as_ref() {
        Some(path) => BoltConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => BoltConfig::default(),
    };
    if let Some(kind) = args.kind {
        config.kind = kind;
    }

    let filter: Option<HashSet<u8>> = if args.groups.is_empty() {
        None
    } else {
        Some(args.groups.iter().copied().collect())
    };

    fs::create_dir_all(&args.dest)
        .with_context(|| format!("creating destination {}", args.dest.display()))?;

    for path in archives {
        let archive = BoltFile::open(&path, config.clone())
            .with_context(|| format!("opening BOLT archive {}", path.display()))?;
        extract_archive(archive, &path, &args.dest, filter.as_ref(), args.overwrite)?;
    }

    Ok(())
}

fn resolve_archive_paths(args: &Args) -> Vec<PathBuf> {
    let mut archives = Vec::new();

    if !args.archives.is_empty() {
        archives.extend(args.archives.iter().cloned());
    } else if let Some(root) = args.root.as_ref() {
        for entry in WalkDir::new(root).into_iter().filter_map(|res| res.ok()) {
            let is_bolt = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("blt"))
                .unwrap_or(false);
            if entry.file_type().is_file() && is_bolt {
                archives.push(entry.into_path());
            }
        }
    }

    archives.sort();
    archives.dedup();
    archives
}

fn extract_archive(
    mut archive: BoltFile<fs::File>,
    path: &Path,
    dest_root: &Path,
    filter: Option<&HashSet<u8>>,
    overwrite: bool,
) -> Result<()> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_ascii_uppercase())
        .unwrap_or_else(|| "BOLT".to_string());
    let archive_dest = dest_root.join(name);

    let group_count = archive.groups().len();
    let mut extracted = 0usize;
    let mut skipped = 0usize;
    for index in 0..group_count {
        let group = index as u8;
        if filter.is_some_and(|filter| !filter.contains(&group)) {
            continue;
        }

        let entry_count = match archive.get_bolt_group(MemberId::new(group, 0)) {
            Ok(loaded) => loaded.entries().len(),
            Err(err) => {
                log::warn!("skipping group {group:#04x} of {}: {err}", path.display());
                archive.free_bolt_group(MemberId::new(group, 0));
                skipped += 1;
                continue;
            }
        };

        let group_dest = archive_dest.join(format!("{group:02x}"));
        fs::create_dir_all(&group_dest)
            .with_context(|| format!("creating {}", group_dest.display()))?;

        for entry in 0..entry_count {
            let id = MemberId::new(group, entry as u8);
            let dest_path = group_dest.join(format!("{:04x}.bin", id.0));
            if dest_path.exists() && !overwrite {
                continue;
            }
            let mut bytes = archive
                .get_bolt_member(id)
                .with_context(|| format!("reading member {id}"))?
                .to_vec();
            // Picture members keep only their header; append the pixels.
            if let Some(pixels) = archive
                .resource_at(id)
                .and_then(|res| res.as_picture())
                .and_then(|pic| pic.image())
            {
                bytes.extend_from_slice(pixels);
            }
            fs::write(&dest_path, &bytes)
                .with_context(|| format!("writing {}", dest_path.display()))?;
            extracted += 1;
        }

        archive.free_bolt_group(MemberId::new(group, 0));
    }

    println!(
        "Extracted {} entries from {} into {}",
        extracted,
        path.display(),
        archive_dest.display()
    );
    if skipped > 0 {
        println!("Skipped {skipped} groups that failed to load");
    }
    archive.close();
    Ok(())
}

fn parse_group(value: &str) -> Result<u8, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse::<u16>(),
    }
    .map_err(|err| format!("invalid group id {value:?}: {err}"))?;
    Ok(if parsed > 0xFF { (parsed >> 8) as u8 } else { parsed as u8 })
}
