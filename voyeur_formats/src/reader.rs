// SPDX-License-Identifier: GPL-2.0-or-later

use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::ops::Range;

use serde::Serialize;

use crate::error::{BoltError, Result};

/// Default size of the block buffer that feeds the decompressor.
pub const DECOMPRESS_SIZE: usize = 0x7000;

/// Counters for the I/O the archive has issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IoStats {
    pub directory_reads: u64,
    pub blocks_read: u64,
}

/// Block-buffered view over a seekable stream.
///
/// Holds one block of the file, `[begin, end)`, so that the decompressor's
/// per-byte loop never issues a system call. A miss re-seeks and refills.
#[derive(Debug)]
pub struct BlockReader<R> {
    inner: R,
    buf: Box<[u8]>,
    /// File offset of `buf[0]`; `None` when nothing valid is buffered.
    buffer_begin: Option<u64>,
    /// File offset just past the buffered bytes, and where the next refill
    /// starts reading.
    buffer_end: u64,
    pos: usize,
    len: usize,
    stats: IoStats,
}

impl<R: Read + Seek> BlockReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_block_size(inner, DECOMPRESS_SIZE)
    }

    pub fn with_block_size(inner: R, block_size: usize) -> Self {
        BlockReader {
            inner,
            buf: vec![0u8; block_size.max(1)].into_boxed_slice(),
            buffer_begin: None,
            buffer_end: 0,
            pos: 0,
            len: 0,
            stats: IoStats::default(),
        }
    }

    /// Positions the reader at `offset` for a new entry.
    ///
    /// When the offset lies inside the buffered block the cursor moves within
    /// it; otherwise the buffer is marked invalid and the first byte request
    /// reads a fresh block starting at `offset`.
    pub fn seek_to(&mut self, offset: u64) {
        match self.buffer_begin {
            Some(begin) if offset >= begin && offset < self.buffer_end => {
                self.pos = (offset - begin) as usize;
            }
            _ => {
                self.buffer_begin = None;
                self.buffer_end = offset;
                self.pos = 0;
                self.len = 0;
            }
        }
    }

    fn next_block(&mut self) -> Result<()> {
        if self.inner.stream_position()? != self.buffer_end {
            self.inner.seek(SeekFrom::Start(self.buffer_end))?;
        }

        let read = fill_buffer(&mut self.inner, &mut self.buf)?;
        self.stats.blocks_read += 1;
        log::trace!(
            "buffered {read} bytes at offset {:#x}",
            self.buffer_end
        );

        self.pos = 0;
        self.len = read;
        if read == 0 {
            self.buffer_begin = None;
            return Err(BoltError::UnexpectedEof(self.buffer_end));
        }
        self.buffer_begin = Some(self.buffer_end);
        self.buffer_end += read as u64;
        Ok(())
    }

    #[inline]
    pub fn next_byte(&mut self) -> Result<u8> {
        if self.pos >= self.len {
            self.next_block()?;
        }
        let byte = self.buf[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Reads `out.len()` bytes directly from the stream, bypassing the block
    /// buffer. Used for directory records.
    pub fn read_at(&mut self, offset: u64, out: &mut [u8], what: &'static str) -> Result<()> {
        self.stats.directory_reads += 1;
        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner.read_exact(out).map_err(|err| match err.kind() {
            ErrorKind::UnexpectedEof => BoltError::Truncated(what),
            _ => BoltError::Io(err),
        })
    }

    /// File range currently held in the buffer.
    pub fn buffered_range(&self) -> Option<Range<u64>> {
        self.buffer_begin.map(|begin| begin..self.buffer_end)
    }

    /// File offset of the next byte `next_byte` will return.
    pub fn position(&self) -> u64 {
        match self.buffer_begin {
            Some(begin) => begin + self.pos as u64,
            None => self.buffer_end,
        }
    }

    pub fn stats(&self) -> IoStats {
        self.stats
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn fill_buffer<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(filled)
}
