use std::io::Cursor;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use tempfile::{TempDir, tempdir};
use voyeur_formats::pack::{ArchiveBuilder, compress};
use voyeur_formats::resource::{Link, PictureSource, Rect};
use voyeur_formats::{
    ArchiveKind, BlockReader, BoltConfig, BoltFile, Decompressor, MODE_RAW, MemberId,
};

const RECT: u8 = 8;
const PICTURE: u8 = 10;
const CMAP: u8 = 11;
const VIEWPORT: u8 = 15;
const VIEWPORT_LIST: u8 = 16;
const FONT: u8 = 17;
const FONT_INFO: u8 = 18;

fn write_archive(builder: &ArchiveBuilder) -> Result<(TempDir, PathBuf)> {
    let dir = tempdir().context("creating temporary directory")?;
    let path = dir.path().join("test.blt");
    builder
        .write_to(&path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok((dir, path))
}

fn words(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn long(id: MemberId) -> u32 {
    id.to_long().0
}

fn picture(flags: u16, width: u16, height: u16, source: u32, pixels: &[u8]) -> Vec<u8> {
    let mut data = words(&[flags]);
    data.extend([0, 0, 0, 8]);
    data.extend(words(&[0, 0, width, height]));
    data.extend(0u32.to_le_bytes());
    data.extend(source.to_le_bytes());
    data.extend(words(&[0]));
    data.extend_from_slice(pixels);
    data
}

#[test]
fn decodes_literal_and_back_reference_entries() -> Result<()> {
    let mut builder = ArchiveBuilder::new();
    let group = builder.add_group();
    builder.add_stream(group, 0, 0, 4, vec![31 - 4, 10, 20, 30, 40]);
    builder.add_stream(
        group,
        0,
        0,
        8,
        vec![31 - 4, 10, 20, 30, 40, 0x40 | (35 - 4), 4],
    );
    let (_dir, path) = write_archive(&builder)?;

    let mut archive = BoltFile::open(&path, BoltConfig::default())?;
    archive.get_bolt_group(MemberId::new(0, 0))?;
    assert_eq!(
        archive.member_addr(MemberId::new(0, 0)),
        Some(&[10u8, 20, 30, 40][..])
    );
    assert_eq!(
        archive.member_addr(MemberId::new(0, 1)),
        Some(&[10u8, 20, 30, 40, 10, 20, 30, 40][..])
    );
    Ok(())
}

#[test]
fn second_group_load_reads_nothing() -> Result<()> {
    let pixels: Vec<u8> = (0..64u8).collect();
    let mut builder = ArchiveBuilder::new();
    let group = builder.add_group();
    let pic = builder.add_entry(group, PICTURE, &picture(0, 8, 8, 0, &pixels));
    let raw = builder.add_entry(group, 0, b"payload");
    let (_dir, path) = write_archive(&builder)?;

    let mut archive = BoltFile::open(&path, BoltConfig::default())?;
    archive.get_bolt_group(pic)?;
    let stats = archive.io_stats();
    let first_image = archive
        .get_picture_resource(long(pic))
        .and_then(|p| p.image_handle())
        .context("picture has pixels")?;
    let first_bytes = archive.member_addr(raw).context("raw member")?.as_ptr();

    archive.get_bolt_group(pic)?;
    assert_eq!(archive.io_stats(), stats);
    let second_image = archive
        .get_picture_resource(long(pic))
        .and_then(|p| p.image_handle())
        .context("picture has pixels")?;
    assert!(Rc::ptr_eq(&first_image, &second_image));
    assert_eq!(archive.member_addr(raw).context("raw member")?.as_ptr(), first_bytes);
    assert_eq!(&second_image[..], &pixels[..]);
    Ok(())
}

#[test]
fn freed_groups_reload_independently() -> Result<()> {
    let pixels = vec![5u8; 16];
    let mut builder = ArchiveBuilder::new();
    let group = builder.add_group();
    let pic = builder.add_entry(group, PICTURE, &picture(0, 4, 4, 0, &pixels));
    let (_dir, path) = write_archive(&builder)?;

    let mut archive = BoltFile::open(&path, BoltConfig::default())?;
    archive.get_bolt_group(pic)?;
    let before = archive.io_stats();
    let old = archive
        .get_picture_resource(long(pic))
        .and_then(|p| p.image_handle())
        .context("picture has pixels")?;

    archive.free_bolt_group(pic);
    assert!(!archive.group(0).context("group 0")?.is_loaded());
    assert!(archive.get_picture_resource(long(pic)).is_none());

    archive.get_bolt_group(pic)?;
    assert_eq!(archive.io_stats().directory_reads, before.directory_reads + 1);
    let new = archive
        .get_picture_resource(long(pic))
        .and_then(|p| p.image_handle())
        .context("picture has pixels")?;
    assert!(!Rc::ptr_eq(&old, &new));
    assert_eq!(old, new);
    Ok(())
}

#[test]
fn links_to_later_entries_resolve_after_group_load() -> Result<()> {
    let mut builder = ArchiveBuilder::new();
    let group = builder.add_group();
    let font = MemberId::new(group, 1);

    let mut info = vec![0u8; 30];
    info[0..4].copy_from_slice(&long(font).to_le_bytes());
    info[9] = 1;
    info[24..26].copy_from_slice(&15u16.to_le_bytes());
    let info_id = builder.add_entry(group, FONT_INFO, &info);

    let mut font_data = vec![b'a', b'b', 1, 0, 0, 7, 0, 0];
    font_data.extend(words(&[3, 4, 0, 2]));
    font_data.extend([1, 2, 3, 4, 5]);
    assert_eq!(builder.add_entry(group, FONT, &font_data), font);
    let (_dir, path) = write_archive(&builder)?;

    let mut archive = BoltFile::open(&path, BoltConfig::default())?;
    archive.get_bolt_group(info_id)?;
    assert!(archive.pending_resolves().is_empty());

    let info = archive
        .bolt_entry(info_id)?
        .resource()
        .and_then(|res| res.as_font_info())
        .context("font info")?;
    assert_eq!(info.font, Link::Resolved(font.to_long()));
    assert_eq!(info.fore_color, 15);

    let font = archive
        .resource(info.font)
        .and_then(|res| res.as_font())
        .context("linked font")?;
    assert_eq!(font.char_width(b'b'), Some(4));
    assert_eq!(font.glyph(b'a'), Some(&[1u8, 2][..]));
    assert_eq!(font.glyph(b'b'), Some(&[3u8, 4, 5][..]));
    Ok(())
}

#[test]
fn viewport_may_be_its_own_parent() -> Result<()> {
    let mut builder = ArchiveBuilder::new();
    let group = builder.add_group();
    builder.add_entry(group, 0, &[0; 4]);
    let vp_id = MemberId::new(group, 1);
    let rects_id = MemberId::new(group, 2);
    let pic_id = MemberId::new(group, 3);

    let mut vp = vec![0xFFu8; 0x4A];
    vp[0..2].copy_from_slice(&words(&[0x40]));
    vp[2..6].copy_from_slice(&long(vp_id).to_le_bytes());
    vp[6..0x14].copy_from_slice(&words(&[1, 0, 0, 10, 20, 320, 200]));
    vp[0x20..0x24].copy_from_slice(&(pic_id.0 as u32).to_le_bytes());
    vp[0x30..0x34].copy_from_slice(&long(rects_id).to_le_bytes());
    vp[0x3C..0x42].copy_from_slice(&words(&[2, 0xFFFF, 0xFFFF]));
    vp[0x42..0x4A].copy_from_slice(&words(&[0, 0, 319, 199]));
    assert_eq!(builder.add_entry(group, VIEWPORT, &vp), vp_id);
    assert_eq!(
        builder.add_entry(group, 0, &words(&[1, 2, 3, 4, 5, 6, 7, 8])),
        rects_id
    );
    assert_eq!(
        builder.add_entry(group, PICTURE, &picture(0, 2, 2, 0, &[1, 2, 3, 4])),
        pic_id
    );
    let (_dir, path) = write_archive(&builder)?;

    let mut archive = BoltFile::open(&path, BoltConfig::default())?;
    archive.get_bolt_group(vp_id)?;

    let vp = archive
        .bolt_entry(vp_id)?
        .resource()
        .and_then(|res| res.as_view_port())
        .context("viewport")?;
    assert_eq!(vp.parent, Link::Resolved(vp_id.to_long()));
    assert!(
        archive
            .resource(vp.parent)
            .and_then(|res| res.as_view_port())
            .is_some()
    );
    assert_eq!(vp.bounds, Rect::new(10, 20, 330, 220));
    assert_eq!(vp.clip_rect, Rect::new(0, 0, 319, 199));
    assert_eq!(vp.current_pic, Link::Resolved(pic_id.to_long()));
    assert_eq!(vp.rect_lists[1], Link::Null);

    let rects = archive.view_port_rects(vp_id, 0).context("rect list")?;
    assert_eq!(rects, vec![Rect::new(1, 2, 3, 4), Rect::new(5, 6, 7, 8)]);
    Ok(())
}

#[test]
fn shared_pictures_alias_or_mirror_their_source() -> Result<()> {
    let mut builder = ArchiveBuilder::new();
    let group = builder.add_group();
    let base = builder.add_entry(group, PICTURE, &picture(0, 3, 2, 0, &[1, 2, 3, 4, 5, 6]));
    let alias = builder.add_entry(group, PICTURE, &picture(0x20, 3, 2, long(base), &[]));
    let mirror = builder.add_entry(group, PICTURE, &picture(0x60, 3, 2, long(base), &[]));
    let flipped = builder.add_entry(group, PICTURE, &picture(0xA0, 3, 2, long(base), &[]));
    let blank = builder.add_entry(group, PICTURE, &picture(0x10, 3, 2, 0, &[]));
    let (_dir, path) = write_archive(&builder)?;

    let mut archive = BoltFile::open(&path, BoltConfig::default())?;
    archive.get_bolt_group(base)?;
    let pic = |id: MemberId| archive.get_picture_resource(long(id)).context("picture");

    assert!(pic(alias)?.shares_image_with(pic(base)?));
    assert_eq!(pic(alias)?.source, PictureSource::Alias(base));
    assert!(!pic(alias)?.owns_image());

    assert_eq!(pic(mirror)?.source, PictureSource::Flipped(base));
    assert_eq!(pic(mirror)?.image(), Some(&[3u8, 2, 1, 6, 5, 4][..]));
    assert!(!pic(mirror)?.shares_image_with(pic(base)?));
    assert_eq!(pic(flipped)?.image(), Some(&[4u8, 5, 6, 1, 2, 3][..]));

    assert_eq!(pic(blank)?.source, PictureSource::Blank);
    assert_eq!(pic(blank)?.image(), Some(&[0u8; 6][..]));
    Ok(())
}

#[test]
fn screen_pictures_write_the_display_surface() -> Result<()> {
    let pixels: Vec<u8> = (0..320 * 200).map(|i| (i % 320 / 8) as u8).collect();
    let mut builder = ArchiveBuilder::new();
    let group = builder.add_group();
    let screen = builder.add_entry(group, PICTURE, &picture(0x08, 320, 200, 0, &pixels));
    let (_dir, path) = write_archive(&builder)?;

    let mut archive = BoltFile::open(&path, BoltConfig::default())?;
    archive.get_bolt_group(screen)?;
    let pic = archive.get_picture_resource(long(screen)).context("picture")?;
    assert_eq!(pic.source, PictureSource::Screen);
    assert!(pic.image().is_none());
    assert_eq!(archive.display().screen, pixels);
    assert_eq!(archive.display().video_mode, 0x93);
    assert_eq!(archive.display().palette_clears, 1);
    Ok(())
}

#[test]
fn page_frame_pictures_fill_the_installed_frame() -> Result<()> {
    let pixels: Vec<u8> = (0..100u8).collect();
    let mut builder = ArchiveBuilder::new();
    let group = builder.add_group();
    let pic = builder.add_entry(group, PICTURE, &picture(0x1000, 10, 10, 0, &pixels));
    let (_dir, path) = write_archive(&builder)?;

    let mut archive = BoltFile::open(&path, BoltConfig::default())?;
    archive.display_mut().page_frame = Some(Vec::new());
    archive.get_bolt_group(pic)?;

    let resource = archive.get_picture_resource(long(pic)).context("picture")?;
    assert_eq!(resource.source, PictureSource::PageFrame);
    assert!(resource.image().is_none());
    assert_eq!(resource.mask_data, 1);
    assert_eq!(archive.display().page_frame.as_deref(), Some(&pixels[..]));
    Ok(())
}

#[test]
fn colour_maps_are_clamped_to_the_active_list() -> Result<()> {
    let mut builder = ArchiveBuilder::new();
    let group = builder.add_group();

    let mut records = Vec::new();
    for index in 0..4u16 {
        records.extend(words(&[index << 8, 0, 0, 0, 0, 0, index, 0]));
    }
    let palette = builder.add_entry(group, 0, &records);

    let mut list = words(&[0, 127]);
    list.extend((palette.0 as u32).to_le_bytes());
    let list_id = builder.add_entry(group, VIEWPORT_LIST, &list);

    let mut cmap = vec![4, 0];
    cmap.extend(words(&[100, 200]));
    cmap.extend(vec![9u8; 101 * 3]);
    let cmap_id = builder.add_entry(group, CMAP, &cmap);
    let (_dir, path) = write_archive(&builder)?;

    let mut archive = BoltFile::open(&path, BoltConfig::default())?;
    archive.get_bolt_group(list_id)?;
    assert_eq!(archive.display().pal_index, 127);
    assert_eq!(archive.display().active_view_port_list, Some(list_id));

    let cmap = archive.get_cmap_resource(cmap_id.0 as u32).context("cmap")?;
    assert_eq!((cmap.start, cmap.end), (100, 127));
    assert_eq!(cmap.steps, 4);

    let table = archive.view_port_list_palette(list_id)?;
    assert_eq!(table.len(), 4);
    assert_eq!(table[3].r_entry, 0x300);
    assert_eq!(table[3].pal_index, 3);
    Ok(())
}

#[test]
fn rect_lists_follow_the_configured_record_size() -> Result<()> {
    let mut builder = ArchiveBuilder::new();
    let plain_group = builder.add_group();
    let wide_group = builder.add_group();
    let plain = builder.add_entry(plain_group, RECT, &words(&[1, 2, 3, 4]));
    let wide = builder.add_entry(wide_group, RECT, &words(&[7, 9, 1, 2, 3, 4]));
    let (_dir, path) = write_archive(&builder)?;

    let config = BoltConfig {
        extended_rect_groups: vec![(wide_group as u16) << 8],
        ..BoltConfig::default()
    };
    let mut archive = BoltFile::open(&path, config)?;
    archive.get_bolt_group(plain)?;
    archive.get_bolt_group(wide)?;

    let plain = archive.bolt_entry(plain)?.resource().and_then(|r| r.as_rect()).context("rect")?;
    assert_eq!(plain.bounds, Rect::new(1, 2, 3, 4));
    let wide = archive.bolt_entry(wide)?.resource().and_then(|r| r.as_rect()).context("rect")?;
    assert_eq!((wide.entries[0].arr_index, wide.entries[0].count), (7, 9));
    Ok(())
}

#[test]
fn processed_and_raw_entries_are_copied_verbatim() -> Result<()> {
    let noise: Vec<u8> = (0..200u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect();
    let mut builder = ArchiveBuilder::new();
    let processed = builder.add_processed_group();
    let packed = builder.add_group();
    let stored = builder.add_entry(processed, 0, &noise);
    let raw = builder.add_stream(packed, 0, MODE_RAW, noise.len() as u32, noise.clone());
    let (_dir, path) = write_archive(&builder)?;

    let mut archive = BoltFile::open(&path, BoltConfig::default())?;
    assert!(archive.group(processed).context("group")?.header().processed);
    assert_eq!(archive.get_bolt_member(stored)?, &noise[..]);
    assert_eq!(archive.get_bolt_member(raw)?, &noise[..]);
    Ok(())
}

#[test]
fn decompression_survives_small_requests() -> Result<()> {
    let mut data = Vec::new();
    for round in 0..40u32 {
        data.extend(format!("entry {round:03} of the stream ").bytes());
        data.extend(vec![(round % 7) as u8; (round as usize % 5) * 6]);
    }
    let stream = compress(&data);

    for piece in [1usize, 2, 3, 5, 13, 64] {
        let mut reader = BlockReader::with_block_size(Cursor::new(stream.clone()), 17);
        reader.seek_to(0);
        let mut decoder = Decompressor::new();
        let mut out = Vec::with_capacity(data.len());
        while out.len() < data.len() {
            let take = piece.min(data.len() - out.len());
            out.extend(decoder.decompress_to_vec(&mut reader, take, 0)?);
        }
        assert_eq!(out, data, "piece size {piece}");
    }
    Ok(())
}

#[test]
fn stamp_archives_link_controls_states_and_threads() -> Result<()> {
    let mut builder = ArchiveBuilder::new();
    let group = builder.add_group();
    let control_id = MemberId::new(group, 0);
    let state_id = MemberId::new(group, 1);
    let ptrs_id = MemberId::new(group, 2);
    let thread_id = MemberId::new(group, 3);

    let mut control = words(&[1, 2, 3, 4, 5, 6, 7, 8]);
    control.extend(long(thread_id).to_le_bytes());
    for _ in 1..8 {
        control.extend(u32::MAX.to_le_bytes());
    }
    control.extend(words(&[state_id.0]));
    control.extend(long(ptrs_id).to_le_bytes());
    assert_eq!(builder.add_entry(group, 24, &control), control_id);

    let mut state = Vec::new();
    for value in [0u32, 3, 5, 9] {
        state.extend(value.to_le_bytes());
    }
    builder.add_entry(group, 4, &state);

    let mut ptrs = long(thread_id).to_le_bytes().to_vec();
    ptrs.extend(u32::MAX.to_le_bytes());
    builder.add_entry(group, 6, &ptrs);
    builder.add_entry(group, 0, &[1, 0, 2, 0, 0xAA, 0xBB]);
    let (_dir, path) = write_archive(&builder)?;

    let mut archive = BoltFile::open(&path, BoltConfig::for_kind(ArchiveKind::Stamp))?;
    archive.get_bolt_group(control_id)?;

    let control = archive
        .bolt_entry(control_id)?
        .resource()
        .and_then(|res| res.as_control())
        .context("control")?;
    assert_eq!(control.member_ids[7], 8);
    assert_eq!(control.state, Some(state_id));
    assert_eq!(control.entries[0], Link::Resolved(thread_id.to_long()));
    assert_eq!(control.entries[1], Link::Null);

    let ptrs = archive
        .resource(control.ptr)
        .and_then(|res| res.as_ptr_list())
        .context("pointer list")?;
    assert_eq!(ptrs.entries, vec![Link::Resolved(thread_id.to_long()), Link::Null]);

    let state = archive
        .resource_at(state_id)
        .and_then(|res| res.as_state())
        .context("state")?;
    assert_eq!(state.victim_index(), 3);
    assert_eq!(state.victim_murder_index(), 9);

    let thread = archive
        .resource(control.entries[0])
        .and_then(|res| res.as_thread())
        .context("thread")?;
    assert_eq!((thread.state_id, thread.stack_id), (1, 2));
    assert_eq!(thread.script, vec![0xAA, 0xBB]);
    Ok(())
}
