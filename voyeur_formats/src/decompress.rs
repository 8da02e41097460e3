// SPDX-License-Identifier: GPL-2.0-or-later
//
// BOLT payload decompressor.
//
// A byte-oriented LZ77 variant with a 512-byte history ring holding the
// decompressed output. Every token starts with a control byte whose top two
// bits select the run kind:
//
//   00  literal run, `31 - (b & 0x1f)` bytes copied from the stream
//   01  short back-reference, `35 - (b & 0x1f)` bytes, 9-bit offset
//   10  long back-reference, `(32 - (b & 0x1f)) << 2` (+2) bytes, even offset
//   11  fill run of one byte value, length spread over the next byte
//
// The constants below are bit-exact with the retail data files.

use std::io::{Read, Seek};

use crate::error::Result;
use crate::reader::BlockReader;

pub const HISTORY_SIZE: usize = 0x200;
const HISTORY_MASK: usize = HISTORY_SIZE - 1;

/// Mode bit requesting an uncompressed literal copy.
pub const MODE_RAW: u8 = 0x08;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunType {
    Literal,
    History,
    Fill,
}

/// Decoder state. Persists across calls so one entry can be decompressed in
/// several buffer-limited pieces; `reset` must run before each new entry.
#[derive(Debug, Clone)]
pub struct Decompressor {
    history: [u8; HISTORY_SIZE],
    history_index: usize,
    run_type: RunType,
    run_length: usize,
    /// Ring position the current back-reference copies from.
    run_offset: usize,
    run_value: u8,
    /// A run is partially emitted and the next call continues it.
    in_run: bool,
}

impl Default for Decompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor {
    pub fn new() -> Self {
        Decompressor {
            history: [0; HISTORY_SIZE],
            history_index: 0,
            run_type: RunType::Literal,
            run_length: 0,
            run_offset: 0,
            run_value: 0,
            in_run: false,
        }
    }

    /// Starts a new entry with an empty history.
    pub fn reset(&mut self) {
        self.history.fill(0);
        self.history_index = 0;
        self.in_run = false;
    }

    pub fn in_run(&self) -> bool {
        self.in_run
    }

    /// Bytes still owed by the suspended run, if any.
    pub fn pending_run(&self) -> usize {
        if self.in_run { self.run_length } else { 0 }
    }

    /// Allocates a zeroed buffer of `size` bytes and fills it.
    pub fn decompress_to_vec<R: Read + Seek>(
        &mut self,
        reader: &mut BlockReader<R>,
        size: usize,
        mode: u8,
    ) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; size];
        self.decompress(reader, &mut buf, mode)?;
        Ok(buf)
    }

    /// Fills `out` with the next `out.len()` decompressed bytes.
    pub fn decompress<R: Read + Seek>(
        &mut self,
        reader: &mut BlockReader<R>,
        out: &mut [u8],
        mode: u8,
    ) -> Result<()> {
        let mut size = out.len();
        let mut dest = 0usize;

        if mode & MODE_RAW != 0 {
            self.in_run = true;
            self.run_type = RunType::Literal;
            self.run_length = size;
        }

        while size > 0 {
            if !self.in_run {
                self.read_token(reader)?;
            }

            let mut source = self.run_offset & HISTORY_MASK;
            let len = if self.run_length <= size {
                self.in_run = false;
                self.run_length
            } else {
                self.in_run = true;
                self.run_length -= size;
                if self.run_type == RunType::History {
                    self.run_offset = (self.run_offset + size) & HISTORY_MASK;
                }
                size
            };
            size -= len;

            let target = &mut out[dest..dest + len];
            dest += len;
            match self.run_type {
                RunType::Literal => {
                    for slot in target.iter_mut() {
                        let value = reader.next_byte()?;
                        self.push_history(value);
                        *slot = value;
                    }
                }
                RunType::History => {
                    for slot in target.iter_mut() {
                        let value = self.history[source];
                        self.push_history(value);
                        *slot = value;
                        source = (source + 1) & HISTORY_MASK;
                    }
                }
                RunType::Fill => {
                    let value = self.run_value;
                    for slot in target.iter_mut() {
                        self.push_history(value);
                        *slot = value;
                    }
                }
            }
        }

        Ok(())
    }

    fn read_token<R: Read + Seek>(&mut self, reader: &mut BlockReader<R>) -> Result<()> {
        let control = reader.next_byte()?;
        let low = (control & 0x1F) as usize;
        let mut offset = 0usize;

        match control & 0xC0 {
            0x00 => {
                self.run_type = RunType::Literal;
                self.run_length = 31 - low;
            }
            0x40 => {
                self.run_type = RunType::History;
                self.run_length = 35 - low;
                let next = reader.next_byte()? as usize;
                offset = next + (((control & 0x20) as usize) << 3);
            }
            0x80 => {
                self.run_type = RunType::History;
                self.run_length = (32 - low) << 2;
                if control & 0x20 != 0 {
                    self.run_length += 2;
                }
                offset = (reader.next_byte()? as usize) << 1;
            }
            _ => {
                self.run_type = RunType::Fill;
                if control & 0x20 != 0 {
                    self.run_length = 0;
                } else {
                    let high = reader.next_byte()? as usize;
                    self.run_length = ((32 - low) + (high << 5)) << 2;
                    reader.next_byte()?;
                    self.run_value = reader.next_byte()?;
                }
            }
        }

        self.run_offset = (self.history_index + HISTORY_SIZE - offset) & HISTORY_MASK;
        Ok(())
    }

    #[inline]
    fn push_history(&mut self, value: u8) {
        self.history[self.history_index] = value;
        self.history_index = (self.history_index + 1) & HISTORY_MASK;
    }
}
