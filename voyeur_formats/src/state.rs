use std::io::{Read, Seek};

use crate::decompress::Decompressor;
use crate::error::Result;
use crate::id::{LongId, MemberId};
use crate::reader::BlockReader;

pub const SCREEN_WIDTH: usize = 320;
pub const SCREEN_HEIGHT: usize = 200;

/// Palette index limit used until a viewport list installs its own.
pub const DEFAULT_PAL_INDEX: u16 = 0xFF;

/// Display-side state touched while materializing pictures and colour maps.
#[derive(Debug, Clone)]
pub struct DisplayState {
    pub screen: Vec<u8>,
    /// Off-screen page frame; page-frame pictures decompress into it when set.
    pub page_frame: Option<Vec<u8>>,
    pub video_mode: u16,
    /// Bumped whenever a video mode change requires the palette to be cleared.
    pub palette_clears: u32,
    /// Highest usable palette index of the active viewport list.
    pub pal_index: u16,
    pub active_view_port_list: Option<MemberId>,
}

impl Default for DisplayState {
    fn default() -> Self {
        DisplayState {
            screen: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            page_frame: None,
            video_mode: 0,
            palette_clears: 0,
            pal_index: DEFAULT_PAL_INDEX,
            active_view_port_list: None,
        }
    }
}

impl DisplayState {
    pub fn set_video_mode(&mut self, mode: u16) {
        if mode != self.video_mode {
            self.video_mode = mode;
            self.palette_clears += 1;
        }
    }

    pub fn clear_screen(&mut self) {
        self.screen.fill(0);
    }
}

/// A link that could not be resolved yet: `slot` of the resource owned by
/// `owner` should point at `target` once its bytes are resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingResolve {
    pub target: LongId,
    pub owner: MemberId,
    pub slot: usize,
}

/// Per-archive loading context: the buffered reader over the archive file,
/// the decompressor, the pending-link list and the display state.
///
/// One exists per open archive; nothing in it is shared between archives.
#[derive(Debug)]
pub struct BoltFilesState<R> {
    pub(crate) reader: BlockReader<R>,
    pub(crate) decompressor: Decompressor,
    pub(crate) resolves: Vec<PendingResolve>,
    pub(crate) display: DisplayState,
}

impl<R: Read + Seek> BoltFilesState<R> {
    pub fn new(reader: BlockReader<R>) -> Self {
        BoltFilesState {
            reader,
            decompressor: Decompressor::new(),
            resolves: Vec::new(),
            display: DisplayState::default(),
        }
    }

    /// Positions the reader on an entry's payload and resets the decoder.
    pub(crate) fn begin_entry(&mut self, file_offset: u64) {
        self.reader.seek_to(file_offset);
        self.decompressor.reset();
    }

    pub(crate) fn decompress(&mut self, out: &mut [u8], mode: u8) -> Result<()> {
        self.decompressor.decompress(&mut self.reader, out, mode)
    }

    pub(crate) fn decompress_to_vec(&mut self, size: usize, mode: u8) -> Result<Vec<u8>> {
        self.decompressor
            .decompress_to_vec(&mut self.reader, size, mode)
    }

    pub fn pending_resolves(&self) -> &[PendingResolve] {
        &self.resolves
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn reader(&self) -> &BlockReader<R> {
        &self.reader
    }
}
