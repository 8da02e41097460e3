use std::fs;
use std::process::Command;

use anyhow::{Context, Result};
use tempfile::tempdir;
use voyeur_formats::MemberId;
use voyeur_formats::pack::ArchiveBuilder;

const PICTURE: u8 = 10;

fn picture(flags: u16, width: u16, height: u16, source: u32, pixels: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    for word in [flags, 0, 0x0800, 0, 0, width, height] {
        data.extend(word.to_le_bytes());
    }
    data.extend(0u32.to_le_bytes());
    data.extend(source.to_le_bytes());
    data.extend(0u16.to_le_bytes());
    data.extend_from_slice(pixels);
    data
}

#[test]
fn extraction_skips_groups_with_unloaded_picture_sources() -> Result<()> {
    let dir = tempdir()?;
    let archive = dir.path().join("scene.blt");
    let dest = dir.path().join("out");

    let mut builder = ArchiveBuilder::new();
    let pictures = builder.add_group();
    let aliases = builder.add_group();
    let raw = builder.add_group();
    let pixels = [1u8, 2, 3, 4, 5, 6, 7, 8];
    let source = builder.add_entry(pictures, PICTURE, &picture(0, 4, 2, 0, &pixels));
    builder.add_entry(aliases, PICTURE, &picture(0x20, 4, 2, source.to_long().0, &[]));
    builder.add_entry(raw, 0, b"after the alias");
    builder
        .write_to(&archive)
        .with_context(|| format!("writing {}", archive.display()))?;

    let output = Command::new(env!("CARGO_BIN_EXE_bolt_extract"))
        .arg("--archive")
        .arg(&archive)
        .arg("--dest")
        .arg(&dest)
        .output()
        .context("executing bolt_extract")?;
    assert!(
        output.status.success(),
        "bolt_extract exited with {:?}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Skipped 1 groups"), "stdout: {stdout}");

    let root = dest.join("SCENE");
    let picture_bytes = fs::read(root.join("00").join(format!("{:04x}.bin", source.0)))?;
    assert_eq!(&picture_bytes[24..], &pixels);
    assert!(!root.join("01").exists());
    let tail = fs::read(root.join("02").join(format!("{:04x}.bin", MemberId::new(raw, 0).0)))?;
    assert_eq!(tail, b"after the alias");
    Ok(())
}
