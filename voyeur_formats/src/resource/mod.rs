//! Typed resources materialized from BOLT entries.
//!
//! An entry's `init method` tag selects one of the constructors below. A
//! resource refers to other members through [`Link`]s, which are resolved by
//! the archive once the owning group has been fully materialized.

use std::io::{Read, Seek};

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::archive::Directory;
use crate::config::BoltConfig;
use crate::error::{BoltError, Result};
use crate::id::{LongId, MemberId};
use crate::state::BoltFilesState;

pub mod font;
pub mod palette;
pub mod picture;
pub mod rect;
pub mod stamp;
pub mod viewport;

pub use font::{FontInfoResource, FontJustify, FontResource};
pub use palette::{CMapResource, CycleResource, ViewPortPalEntry};
pub use picture::{PictureResource, PictureSource};
pub use rect::{Rect, RectEntry, RectResource};
pub use stamp::{ControlResource, PtrResource, StateResource, ThreadResource};
pub use viewport::{ViewPortListResource, ViewPortResource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InitMethod {
    Default,
    Rect,
    Picture,
    ViewPort,
    ViewPortList,
    Font,
    FontInfo,
    ColorMap,
    Cycle,
    PtrList,
    Control,
    State,
    Thread,
}

/// Reference from one resource to bytes of another member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Link {
    /// The field held `0xFFFFFFFF`.
    Null,
    /// Target bytes were not resident yet; queued for `resolve_all`.
    Pending(LongId),
    Resolved(LongId),
}

impl Link {
    pub fn target(self) -> Option<LongId> {
        match self {
            Link::Null => None,
            Link::Pending(id) | Link::Resolved(id) => Some(id),
        }
    }

    pub fn is_resolved(self) -> bool {
        matches!(self, Link::Resolved(_))
    }
}

#[derive(Debug, Clone)]
pub enum Resource {
    Rect(RectResource),
    Picture(PictureResource),
    ViewPort(ViewPortResource),
    ViewPortList(ViewPortListResource),
    Font(FontResource),
    FontInfo(FontInfoResource),
    ColorMap(CMapResource),
    Cycle(CycleResource),
    PtrList(PtrResource),
    Control(ControlResource),
    State(StateResource),
    Thread(ThreadResource),
}

macro_rules! accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self) -> Option<&$ty> {
            match self {
                Resource::$variant(res) => Some(res),
                _ => None,
            }
        }
    };
}

impl Resource {
    accessor!(as_rect, Rect, RectResource);
    accessor!(as_picture, Picture, PictureResource);
    accessor!(as_view_port, ViewPort, ViewPortResource);
    accessor!(as_view_port_list, ViewPortList, ViewPortListResource);
    accessor!(as_font, Font, FontResource);
    accessor!(as_font_info, FontInfo, FontInfoResource);
    accessor!(as_cmap, ColorMap, CMapResource);
    accessor!(as_cycle, Cycle, CycleResource);
    accessor!(as_ptr_list, PtrList, PtrResource);
    accessor!(as_control, Control, ControlResource);
    accessor!(as_state, State, StateResource);
    accessor!(as_thread, Thread, ThreadResource);

    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Rect(_) => "rect",
            Resource::Picture(_) => "picture",
            Resource::ViewPort(_) => "viewport",
            Resource::ViewPortList(_) => "viewport-list",
            Resource::Font(_) => "font",
            Resource::FontInfo(_) => "font-info",
            Resource::ColorMap(_) => "cmap",
            Resource::Cycle(_) => "cycle",
            Resource::PtrList(_) => "ptr-list",
            Resource::Control(_) => "control",
            Resource::State(_) => "state",
            Resource::Thread(_) => "thread",
        }
    }

    /// Link stored in `slot`, numbered per resource type.
    pub fn link_mut(&mut self, slot: usize) -> Option<&mut Link> {
        match self {
            Resource::ViewPort(res) => res.link_mut(slot),
            Resource::ViewPortList(res) => res.view_ports.get_mut(slot),
            Resource::FontInfo(res) => (slot == 0).then_some(&mut res.font),
            Resource::Cycle(res) => res.ptrs.get_mut(slot),
            Resource::PtrList(res) => res.entries.get_mut(slot),
            Resource::Control(res) => res.link_mut(slot),
            _ => None,
        }
    }

    pub fn links(&self) -> Vec<Link> {
        match self {
            Resource::ViewPort(res) => res.links().to_vec(),
            Resource::ViewPortList(res) => res.view_ports.clone(),
            Resource::FontInfo(res) => vec![res.font],
            Resource::Cycle(res) => res.ptrs.to_vec(),
            Resource::PtrList(res) => res.entries.clone(),
            Resource::Control(res) => res.links(),
            _ => Vec::new(),
        }
    }
}

/// What a constructor left behind for the entry.
#[derive(Debug)]
pub(crate) struct Materialized {
    pub data: Vec<u8>,
    pub resource: Option<Resource>,
    /// `(slot, target)` links that must wait for `resolve_all`.
    pub deferred: Vec<(usize, LongId)>,
}

/// Borrowed view handed to the resource constructors while one entry is
/// being materialized.
pub(crate) struct InitContext<'a, R> {
    pub dir: &'a Directory,
    pub state: &'a mut BoltFilesState<R>,
    pub config: &'a BoltConfig,
    pub id: MemberId,
    pub mode: u8,
    pub size: usize,
    deferred: Vec<(usize, LongId)>,
}

impl<'a, R: Read + Seek> InitContext<'a, R> {
    pub fn new(
        dir: &'a Directory,
        state: &'a mut BoltFilesState<R>,
        config: &'a BoltConfig,
        id: MemberId,
        mode: u8,
        size: usize,
    ) -> Self {
        InitContext {
            dir,
            state,
            config,
            id,
            mode,
            size,
            deferred: Vec::new(),
        }
    }

    pub fn decompress(&mut self, size: usize) -> Result<Vec<u8>> {
        self.state.decompress_to_vec(size, self.mode)
    }

    pub fn decompress_into(&mut self, out: &mut [u8]) -> Result<()> {
        let mode = self.mode;
        self.state.decompress(out, mode)
    }

    /// Resolves a 32-bit id field now if the target is resident, otherwise
    /// defers it to `resolve_all`.
    pub fn resolve_it(&mut self, raw: u32, slot: usize) -> Link {
        self.resolve_long(LongId::from_field(raw), slot)
    }

    pub fn resolve_long(&mut self, target: Option<LongId>, slot: usize) -> Link {
        match target {
            None => Link::Null,
            Some(target) if self.dir.is_resident(target) => Link::Resolved(target),
            Some(target) => {
                self.deferred.push((slot, target));
                Link::Pending(target)
            }
        }
    }

    pub fn invalid(&self, reason: impl Into<String>) -> BoltError {
        BoltError::invalid(self.id, reason)
    }

    /// Fails unless `data` holds at least `len` bytes.
    pub fn require(&self, data: &[u8], len: usize, what: &str) -> Result<()> {
        if data.len() < len {
            return Err(self.invalid(format!(
                "{what} needs {len} bytes, entry has {}",
                data.len()
            )));
        }
        Ok(())
    }

    fn finish(self, data: Vec<u8>, resource: Option<Resource>) -> Materialized {
        Materialized {
            data,
            resource,
            deferred: self.deferred,
        }
    }
}

/// Runs the constructor selected by `method` for the entry the reader is
/// positioned on.
pub(crate) fn materialize<R: Read + Seek>(
    method: InitMethod,
    mut ctx: InitContext<'_, R>,
) -> Result<Materialized> {
    if method == InitMethod::Picture {
        let header = ctx.decompress(picture::HEADER_SIZE)?;
        let resource = PictureResource::load(&mut ctx, &header)?;
        return Ok(ctx.finish(header, Some(Resource::Picture(resource))));
    }

    let data = ctx.decompress(ctx.size)?;
    let resource = match method {
        InitMethod::Default | InitMethod::Picture => None,
        InitMethod::Rect => {
            let extended = ctx.config.uses_extended_rects(ctx.id.group());
            RectResource::parse(&data, extended).map(Resource::Rect)
        }
        InitMethod::ViewPort => Some(Resource::ViewPort(ViewPortResource::parse(
            &mut ctx, &data,
        )?)),
        InitMethod::ViewPortList => {
            let list = ViewPortListResource::parse(&mut ctx, &data)?;
            ctx.state.display.pal_index = list.pal_index;
            ctx.state.display.active_view_port_list = Some(ctx.id);
            Some(Resource::ViewPortList(list))
        }
        InitMethod::Font => Some(Resource::Font(FontResource::parse(&ctx, &data)?)),
        InitMethod::FontInfo => Some(Resource::FontInfo(FontInfoResource::parse(
            &mut ctx, &data,
        )?)),
        InitMethod::ColorMap => {
            let pal_index = ctx.state.display.pal_index;
            Some(Resource::ColorMap(CMapResource::parse(
                &ctx, &data, pal_index,
            )?))
        }
        InitMethod::Cycle => Some(Resource::Cycle(CycleResource::parse(&mut ctx, &data)?)),
        InitMethod::PtrList => Some(Resource::PtrList(PtrResource::parse(&mut ctx, &data))),
        InitMethod::Control => Some(Resource::Control(ControlResource::parse(
            &mut ctx, &data,
        )?)),
        InitMethod::State => Some(Resource::State(StateResource::parse(&ctx, &data)?)),
        InitMethod::Thread => Some(Resource::Thread(ThreadResource::parse(&ctx, &data)?)),
    };

    Ok(ctx.finish(data, resource))
}

pub(crate) fn le_u16(data: &[u8], offset: usize) -> u16 {
    LittleEndian::read_u16(&data[offset..offset + 2])
}

pub(crate) fn le_i16(data: &[u8], offset: usize) -> i16 {
    LittleEndian::read_i16(&data[offset..offset + 2])
}

pub(crate) fn le_u32(data: &[u8], offset: usize) -> u32 {
    LittleEndian::read_u32(&data[offset..offset + 4])
}
