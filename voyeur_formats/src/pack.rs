//! Reference encoder and archive writer.
//!
//! Produces streams the decompressor accepts and BOLT files the archive
//! reader opens. The encoder is greedy and makes no attempt to match the
//! retail compressor byte for byte.

use std::fs;
use std::io;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::archive::BOLT_MAGIC;
use crate::decompress::HISTORY_SIZE;
use crate::id::MemberId;

const MAX_LITERAL: usize = 31;
const MIN_MATCH: usize = 4;
const MAX_SHORT_MATCH: usize = 35;
const MAX_LONG_MATCH: usize = 130;
const MAX_OFFSET: usize = HISTORY_SIZE - 1;
const MIN_FILL: usize = 8;
const MAX_FILL: usize = 0x2000 * 4;

/// Compresses `data` into a token stream.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    let mut literals = 0usize;
    let mut pos = 0usize;

    while pos < data.len() {
        let fill = fill_length(data, pos);
        let (offset, matched) = best_match(data, pos);

        if fill >= MIN_FILL && fill >= matched {
            flush_literals(&mut out, &data[pos - literals..pos]);
            literals = 0;
            push_fill(&mut out, fill, data[pos]);
            pos += fill;
        } else if matched >= MIN_MATCH {
            flush_literals(&mut out, &data[pos - literals..pos]);
            literals = 0;
            push_reference(&mut out, offset, matched);
            pos += matched;
        } else {
            literals += 1;
            pos += 1;
        }
    }
    flush_literals(&mut out, &data[pos - literals..pos]);
    out
}

fn fill_length(data: &[u8], pos: usize) -> usize {
    let value = data[pos];
    let run = data[pos..]
        .iter()
        .take(MAX_FILL)
        .take_while(|&&b| b == value)
        .count();
    run & !3
}

/// Longest usable back-reference at `pos`, already trimmed to a length the
/// token grammar can express.
fn best_match(data: &[u8], pos: usize) -> (usize, usize) {
    let mut best = (0, 0);
    for offset in 1..=MAX_OFFSET.min(pos) {
        let limit = if offset % 2 == 0 {
            MAX_LONG_MATCH
        } else {
            MAX_SHORT_MATCH
        };
        let len = data[pos..]
            .iter()
            .take(limit)
            .enumerate()
            .take_while(|&(i, &b)| data[pos + i - offset] == b)
            .count();
        let len = encodable_length(offset, len);
        if len > best.1 {
            best = (offset, len);
        }
    }
    best
}

fn encodable_length(offset: usize, len: usize) -> usize {
    if len <= MAX_SHORT_MATCH || offset % 2 != 0 {
        return len.min(MAX_SHORT_MATCH);
    }
    // Long references cover 4k and 4k + 2 bytes.
    len & !1
}

fn flush_literals(out: &mut Vec<u8>, bytes: &[u8]) {
    for chunk in bytes.chunks(MAX_LITERAL) {
        out.push((MAX_LITERAL - chunk.len()) as u8);
        out.extend_from_slice(chunk);
    }
}

fn push_reference(out: &mut Vec<u8>, offset: usize, len: usize) {
    if len <= MAX_SHORT_MATCH {
        let high = if offset > 0xFF { 0x20 } else { 0 };
        out.push(0x40 | high | (MAX_SHORT_MATCH - len) as u8);
        out.push(offset as u8);
    } else {
        let quads = len >> 2;
        let extra = if len & 2 != 0 { 0x20 } else { 0 };
        out.push(0x80 | extra | (32 - quads) as u8);
        out.push((offset >> 1) as u8);
    }
}

fn push_fill(out: &mut Vec<u8>, len: usize, value: u8) {
    let quads = len >> 2;
    let high = (quads - 1) >> 5;
    let low = 32 - (quads - (high << 5));
    out.extend([0xC0 | low as u8, high as u8, 0, value]);
}

#[derive(Debug, Clone)]
struct PackedEntry {
    mode: u8,
    init_method: u8,
    size: u32,
    payload: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
struct PackedGroup {
    processed: bool,
    call_init_gro: bool,
    term_gro_index: u8,
    entries: Vec<PackedEntry>,
}

/// Writes BOLT archives: header, group directory, per-group entry
/// directories, then payloads.
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    groups: Vec<PackedGroup>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a group whose entries are compressed.
    pub fn add_group(&mut self) -> u8 {
        self.push_group(PackedGroup::default())
    }

    /// Appends a group whose entries are stored uncompressed.
    pub fn add_processed_group(&mut self) -> u8 {
        self.push_group(PackedGroup {
            processed: true,
            ..PackedGroup::default()
        })
    }

    pub fn set_group_init(&mut self, group: u8, call_init_gro: bool, term_gro_index: u8) {
        let group = &mut self.groups[group as usize];
        group.call_init_gro = call_init_gro;
        group.term_gro_index = term_gro_index;
    }

    /// Adds `data` under `init_method`, compressed unless the group is
    /// processed.
    pub fn add_entry(&mut self, group: u8, init_method: u8, data: &[u8]) -> MemberId {
        let payload = if self.groups[group as usize].processed {
            data.to_vec()
        } else {
            compress(data)
        };
        self.add_stream(group, init_method, 0, data.len() as u32, payload)
    }

    /// Adds a pre-encoded payload that decompresses to `size` bytes.
    pub fn add_stream(
        &mut self,
        group: u8,
        init_method: u8,
        mode: u8,
        size: u32,
        payload: Vec<u8>,
    ) -> MemberId {
        let entries = &mut self.groups[group as usize].entries;
        let id = MemberId::new(group, entries.len() as u8);
        entries.push(PackedEntry {
            mode,
            init_method,
            size: size & 0x00FF_FFFF,
            payload,
        });
        id
    }

    pub fn finish(&self) -> Vec<u8> {
        let group_count = self.groups.len();
        let mut out = vec![0u8; 16 + group_count * 16];
        out[0..4].copy_from_slice(BOLT_MAGIC);
        out[11] = group_count as u8;

        for (index, group) in self.groups.iter().enumerate() {
            let dir_offset = out.len();
            let record = &mut out[16 + index * 16..32 + index * 16];
            record[0] = group.processed as u8;
            record[1] = group.call_init_gro as u8;
            record[2] = group.term_gro_index;
            record[3] = group.entries.len() as u8;
            LittleEndian::write_u32(&mut record[8..12], dir_offset as u32);

            out.resize(dir_offset + group.entries.len() * 16, 0);
            for (slot, entry) in group.entries.iter().enumerate() {
                let payload_offset = out.len();
                let record = &mut out[dir_offset + slot * 16..dir_offset + slot * 16 + 16];
                record[0] = entry.mode;
                record[3] = entry.init_method;
                LittleEndian::write_u24(&mut record[4..7], entry.size);
                LittleEndian::write_u32(&mut record[8..12], payload_offset as u32);
                out.extend_from_slice(&entry.payload);
            }
        }
        out
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.finish())
    }

    fn push_group(&mut self, group: PackedGroup) -> u8 {
        let index = self.groups.len() as u8;
        self.groups.push(group);
        index
    }
}
