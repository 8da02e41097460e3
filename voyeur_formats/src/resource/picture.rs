use std::io::{Read, Seek};
use std::rc::Rc;

use super::rect::Rect;
use super::{InitContext, le_u16, le_u32};
use crate::error::Result;
use crate::id::{LongId, MemberId};

pub(crate) const HEADER_SIZE: usize = 24;

/// Pixels go straight to the display surface.
pub const PICFLAG_SCREEN: u16 = 0x0008;
pub const PICFLAG_CLEAR_SCREEN: u16 = 0x0010;
/// Pixels come from another picture.
pub const PICFLAG_SHARED: u16 = 0x0020;
pub const PICFLAG_HFLIP: u16 = 0x0040;
pub const PICFLAG_VFLIP: u16 = 0x0080;
pub const PICFLAG_PAGE_FRAME: u16 = 0x1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureSource {
    /// Pixels decompressed from the entry's own stream.
    Owned,
    /// Zero-filled pixel buffer.
    Blank,
    /// Pixel buffer shared with another picture.
    Alias(MemberId),
    /// Mirrored copy of another picture's pixels.
    Flipped(MemberId),
    /// Written into the display surface; no buffer of its own.
    Screen,
    /// Written into the installed page frame; no buffer of its own.
    PageFrame,
}

#[derive(Debug, Clone)]
pub struct PictureResource {
    pub flags: u16,
    pub select: u8,
    pub pick: u8,
    pub on_off: u8,
    pub depth: u8,
    pub bounds: Rect,
    pub mask_data: u32,
    pub plane_size: u16,
    pub key_color: u8,
    pub source: PictureSource,
    image: Option<Rc<[u8]>>,
}

impl PictureResource {
    pub(crate) fn load<R: Read + Seek>(
        ctx: &mut InitContext<'_, R>,
        header: &[u8],
    ) -> Result<Self> {
        ctx.require(header, HEADER_SIZE, "picture header")?;

        let flags = le_u16(header, 0);
        let x = le_u16(header, 6) as i32;
        let y = le_u16(header, 8) as i32;
        let bounds = Rect::from_origin(x, y, le_u16(header, 10) as i32, le_u16(header, 12) as i32);
        let source_field = le_u32(header, 18);

        let mut picture = PictureResource {
            flags,
            select: header[2],
            pick: header[3],
            on_off: header[4],
            depth: header[5],
            bounds,
            mask_data: le_u32(header, 14),
            plane_size: le_u16(header, 22),
            key_color: 0,
            source: PictureSource::Owned,
            image: None,
        };

        let width = bounds.width().max(0) as usize;
        let height = bounds.height().max(0) as usize;
        let mut nbytes = width * height;

        if flags & PICFLAG_SHARED != 0 {
            let source_id = LongId(source_field).member();
            let source = ctx
                .dir
                .resource(source_id)
                .and_then(|res| res.as_picture())
                .ok_or_else(|| ctx.invalid(format!("source picture {source_id} is not loaded")))?;
            let pixels = source
                .image
                .clone()
                .ok_or_else(|| ctx.invalid(format!("source picture {source_id} has no pixels")))?;

            if flags & (PICFLAG_HFLIP | PICFLAG_VFLIP) != 0 {
                ctx.require(&pixels, nbytes, "flipped picture source")?;
                let flipped = if flags & PICFLAG_HFLIP != 0 {
                    flip_horizontal(&pixels, width, height)
                } else {
                    flip_vertical(&pixels, width, height)
                };
                picture.image = Some(Rc::from(flipped));
                picture.source = PictureSource::Flipped(source_id);
            } else {
                picture.image = Some(pixels);
                picture.source = PictureSource::Alias(source_id);
            }
        } else if flags & PICFLAG_SCREEN != 0 {
            ctx.state
                .display
                .set_video_mode(video_mode_for(bounds.width(), bounds.height()));

            if source_field & 0xFFFF != 0 {
                return Err(ctx.invalid(format!(
                    "screen picture with non-zero screen offset {:#x}",
                    source_field & 0xFFFF
                )));
            }

            if flags & PICFLAG_CLEAR_SCREEN != 0 {
                ctx.state.display.clear_screen();
            } else {
                let mut screen = std::mem::take(&mut ctx.state.display.screen);
                let result = ctx.decompress_into(&mut screen);
                ctx.state.display.screen = screen;
                result?;
            }
            picture.source = PictureSource::Screen;
        } else {
            if flags & PICFLAG_PAGE_FRAME != 0 {
                if flags & PICFLAG_CLEAR_SCREEN == 0 {
                    nbytes = ctx.size.saturating_sub(HEADER_SIZE);
                }

                if let Some(mut frame) = ctx.state.display.page_frame.take() {
                    if frame.len() < nbytes {
                        frame.resize(nbytes, 0);
                    }
                    let result = ctx.decompress_into(&mut frame[..nbytes]);
                    ctx.state.display.page_frame = Some(frame);
                    result?;

                    picture.mask_data = ((nbytes + 0x3FFF) >> 14) as u32;
                    picture.source = PictureSource::PageFrame;
                    return Ok(picture);
                }
            }

            if flags & PICFLAG_CLEAR_SCREEN != 0 {
                picture.image = Some(Rc::from(vec![0u8; nbytes]));
                picture.source = PictureSource::Blank;
            } else {
                picture.image = Some(Rc::from(ctx.decompress(nbytes)?));
            }
        }

        Ok(picture)
    }

    pub fn width(&self) -> usize {
        self.bounds.width().max(0) as usize
    }

    pub fn height(&self) -> usize {
        self.bounds.height().max(0) as usize
    }

    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    /// Shared handle to the pixel buffer, for callers that outlive the group.
    pub fn image_handle(&self) -> Option<Rc<[u8]>> {
        self.image.clone()
    }

    /// Whether the pixel buffer belongs to this picture rather than another.
    pub fn owns_image(&self) -> bool {
        matches!(
            self.source,
            PictureSource::Owned | PictureSource::Blank | PictureSource::Flipped(_)
        )
    }

    pub fn shares_image_with(&self, other: &PictureResource) -> bool {
        match (&self.image, &other.image) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn video_mode_for(width: i32, height: i32) -> u16 {
    match (width, height) {
        (320, _) => 0x93,
        (640, 350) => 0x10,
        (640, 400) => 0x18,
        (640, _) => 0x12,
        (800, _) => 0x103,
        (1024, _) => 0x105,
        _ => 0,
    }
}

fn flip_horizontal(src: &[u8], width: usize, height: usize) -> Vec<u8> {
    if width == 0 {
        return Vec::new();
    }
    src[..width * height]
        .chunks_exact(width)
        .flat_map(|row| row.iter().rev().copied())
        .collect()
}

fn flip_vertical(src: &[u8], width: usize, height: usize) -> Vec<u8> {
    if width == 0 {
        return Vec::new();
    }
    src[..width * height]
        .chunks_exact(width)
        .rev()
        .flatten()
        .copied()
        .collect()
}
