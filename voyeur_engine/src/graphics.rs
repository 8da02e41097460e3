use std::ops::RangeInclusive;

use serde::Serialize;
use voyeur_formats::resource::ViewPortPalEntry;

pub const PALETTE_COUNT: usize = 256;
pub const PALETTE_SIZE: usize = PALETTE_COUNT * 3;

/// Palette side of the display: the VGA colour table the hardware would
/// show, plus the fade accumulators of the active viewport list.
#[derive(Debug, Clone)]
pub struct GraphicsManager {
    pub vga_colors: [u8; PALETTE_SIZE],
    /// Always `PALETTE_COUNT` long.
    pub palette: Vec<ViewPortPalEntry>,
    uploads: Vec<PaletteUpload>,
}

/// One transfer of a palette range to the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaletteUpload {
    pub start: usize,
    pub end: usize,
}

impl Default for GraphicsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsManager {
    pub fn new() -> Self {
        GraphicsManager {
            vga_colors: [0; PALETTE_SIZE],
            palette: vec![ViewPortPalEntry::default(); PALETTE_COUNT],
            uploads: Vec::new(),
        }
    }

    /// Installs the palette records of a viewport list. Indices the list
    /// does not cover keep zeroed accumulators.
    pub fn set_view_port_list(&mut self, entries: &[ViewPortPalEntry]) {
        self.palette = entries.iter().take(PALETTE_COUNT).copied().collect();
        self.palette
            .resize(PALETTE_COUNT, ViewPortPalEntry::default());
        log::debug!("installed {} viewport palette entries", entries.len().min(PALETTE_COUNT));
    }

    pub fn color(&self, index: usize) -> [u8; 3] {
        let at = (index % PALETTE_COUNT) * 3;
        [self.vga_colors[at], self.vga_colors[at + 1], self.vga_colors[at + 2]]
    }

    pub fn set_color(&mut self, index: usize, rgb: [u8; 3]) {
        let at = (index % PALETTE_COUNT) * 3;
        self.vga_colors[at..at + 3].copy_from_slice(&rgb);
    }

    /// Rotates the colours of `range` by one slot. `towards_end` moves the
    /// first colour to the end; otherwise the last colour moves to the front.
    pub fn rotate_colors(&mut self, range: RangeInclusive<usize>, towards_end: bool) {
        let (start, end) = (*range.start(), *range.end());
        if start >= end || end >= PALETTE_COUNT {
            return;
        }
        let slice = &mut self.vga_colors[start * 3..end * 3 + 3];
        if towards_end {
            slice.rotate_left(3);
        } else {
            slice.rotate_right(3);
        }
    }

    /// Records that `start..=end` was sent to the display.
    pub fn upload_palette(&mut self, start: usize, end: usize) {
        log::trace!("palette upload {start}..={end}");
        self.uploads.push(PaletteUpload { start, end });
    }

    pub fn uploads(&self) -> &[PaletteUpload] {
        &self.uploads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_ranges_both_ways() {
        let mut gfx = GraphicsManager::new();
        for index in 0..4 {
            gfx.set_color(index, [index as u8; 3]);
        }
        gfx.rotate_colors(1..=3, true);
        assert_eq!(
            (0..4).map(|i| gfx.color(i)[0]).collect::<Vec<_>>(),
            vec![0, 2, 3, 1]
        );
        gfx.rotate_colors(1..=3, false);
        assert_eq!(
            (0..4).map(|i| gfx.color(i)[0]).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn view_port_list_palette_is_padded() {
        let mut gfx = GraphicsManager::new();
        let entry = ViewPortPalEntry {
            r_entry: 0x100,
            pal_index: 4,
            ..ViewPortPalEntry::default()
        };
        gfx.set_view_port_list(&[entry; 3]);
        assert_eq!(gfx.palette.len(), PALETTE_COUNT);
        assert_eq!(gfx.palette[2], entry);
        assert_eq!(gfx.palette[3], ViewPortPalEntry::default());
    }
}
