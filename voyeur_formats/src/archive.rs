use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::BoltConfig;
use crate::decompress::MODE_RAW;
use crate::error::{BoltError, Result};
use crate::id::{LongId, MemberId};
use crate::reader::{BlockReader, IoStats};
use crate::resource::{
    self, CMapResource, InitContext, Link, PictureResource, Rect, Resource, ViewPortPalEntry,
};
use crate::state::{BoltFilesState, DisplayState, PendingResolve};

pub const BOLT_MAGIC: &[u8; 4] = b"BOLT";
const HEADER_SIZE: usize = 16;
const GROUP_RECORD_SIZE: usize = 16;
const ENTRY_RECORD_SIZE: usize = 16;

/// Group directory record as stored in the archive header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupHeader {
    /// Entries are stored uncompressed.
    pub processed: bool,
    pub call_init_gro: bool,
    pub term_gro_index: u8,
    pub count: usize,
    pub file_offset: u32,
}

impl GroupHeader {
    fn parse(record: &[u8]) -> Self {
        GroupHeader {
            processed: record[0] != 0,
            call_init_gro: record[1] != 0,
            term_gro_index: record[2],
            count: if record[3] == 0 { 256 } else { record[3] as usize },
            file_offset: u32::from_le_bytes([record[8], record[9], record[10], record[11]]),
        }
    }
}

/// Entry directory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntryHeader {
    pub id: MemberId,
    pub mode: u8,
    pub init_method: u8,
    /// Decompressed size, 24 bits on disk.
    pub size: u32,
    pub file_offset: u32,
}

impl EntryHeader {
    fn parse(id: MemberId, record: &[u8]) -> Self {
        EntryHeader {
            id,
            mode: record[0],
            init_method: record[3],
            size: u32::from_le_bytes([record[4], record[5], record[6], 0]),
            file_offset: u32::from_le_bytes([record[8], record[9], record[10], record[11]]),
        }
    }
}

#[derive(Debug)]
pub struct BoltEntry {
    header: EntryHeader,
    data: Option<Vec<u8>>,
    resource: Option<Resource>,
}

impl BoltEntry {
    fn new(header: EntryHeader) -> Self {
        BoltEntry {
            header,
            data: None,
            resource: None,
        }
    }

    pub fn header(&self) -> &EntryHeader {
        &self.header
    }

    pub fn id(&self) -> MemberId {
        self.header.id
    }

    /// Decompressed bytes; for pictures only the 24-byte header.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    pub fn resource(&self) -> Option<&Resource> {
        self.resource.as_ref()
    }

    pub fn has_resource(&self) -> bool {
        self.resource.is_some()
    }

    pub fn is_materialized(&self) -> bool {
        self.data.is_some()
    }
}

#[derive(Debug)]
pub struct BoltGroup {
    index: u8,
    header: GroupHeader,
    loaded: bool,
    entries: Vec<BoltEntry>,
}

impl BoltGroup {
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Id of the group's first member.
    pub fn id(&self) -> MemberId {
        MemberId::new(self.index, 0)
    }

    pub fn header(&self) -> &GroupHeader {
        &self.header
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Empty until the group is loaded.
    pub fn entries(&self) -> &[BoltEntry] {
        &self.entries
    }

    fn unload(&mut self) {
        self.entries = Vec::new();
        self.loaded = false;
    }
}

/// All groups of an archive, with lookups that only see loaded groups.
#[derive(Debug)]
pub(crate) struct Directory {
    groups: Vec<BoltGroup>,
}

impl Directory {
    pub(crate) fn entry(&self, id: MemberId) -> Option<&BoltEntry> {
        self.groups
            .get(id.group() as usize)?
            .entries
            .get(id.entry() as usize)
    }

    fn entry_mut(&mut self, id: MemberId) -> Option<&mut BoltEntry> {
        self.groups
            .get_mut(id.group() as usize)?
            .entries
            .get_mut(id.entry() as usize)
    }

    pub(crate) fn resource(&self, id: MemberId) -> Option<&Resource> {
        self.entry(id)?.resource.as_ref()
    }

    pub(crate) fn member_addr_offset(&self, id: LongId) -> Option<&[u8]> {
        self.entry(id.member())?.data.as_deref()?.get(id.offset()..)
    }

    pub(crate) fn is_resident(&self, id: LongId) -> bool {
        self.member_addr_offset(id).is_some()
    }

    fn link_mut(&mut self, owner: MemberId, slot: usize) -> Option<&mut Link> {
        self.entry_mut(owner)?.resource.as_mut()?.link_mut(slot)
    }
}

/// An open BOLT archive: the group directory plus the loading context that
/// reads, decompresses and materializes its members.
#[derive(Debug)]
pub struct BoltFile<R> {
    path: Option<PathBuf>,
    config: BoltConfig,
    dir: Directory,
    state: BoltFilesState<R>,
}

impl BoltFile<File> {
    pub fn open<P: AsRef<Path>>(path: P, config: BoltConfig) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let file = File::open(&path_buf).map_err(|source| BoltError::Open {
            path: path_buf.clone(),
            source,
        })?;
        let mut archive = Self::from_reader(file, config)?;
        archive.path = Some(path_buf);
        Ok(archive)
    }
}

impl<R: Read + Seek> BoltFile<R> {
    pub fn from_reader(inner: R, config: BoltConfig) -> Result<Self> {
        let mut reader = BlockReader::with_block_size(inner, config.block_size);

        let mut header = [0u8; HEADER_SIZE];
        reader.read_at(0, &mut header, "archive header")?;
        if &header[0..4] != BOLT_MAGIC {
            return Err(BoltError::BadMagic([
                header[0], header[1], header[2], header[3],
            ]));
        }

        let count = if header[11] == 0 {
            256
        } else {
            header[11] as usize
        };
        let mut table = vec![0u8; count * GROUP_RECORD_SIZE];
        reader.read_at(HEADER_SIZE as u64, &mut table, "group directory")?;

        let groups = table
            .chunks_exact(GROUP_RECORD_SIZE)
            .enumerate()
            .map(|(index, record)| BoltGroup {
                index: index as u8,
                header: GroupHeader::parse(record),
                loaded: false,
                entries: Vec::new(),
            })
            .collect();
        log::debug!("opened {:?} BOLT archive with {count} groups", config.kind);

        Ok(BoltFile {
            path: None,
            config,
            dir: Directory { groups },
            state: BoltFilesState::new(reader),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn config(&self) -> &BoltConfig {
        &self.config
    }

    pub fn groups(&self) -> &[BoltGroup] {
        &self.dir.groups
    }

    pub fn group(&self, index: u8) -> Option<&BoltGroup> {
        self.dir.groups.get(index as usize)
    }

    pub fn display(&self) -> &DisplayState {
        &self.state.display
    }

    pub fn display_mut(&mut self) -> &mut DisplayState {
        &mut self.state.display
    }

    pub fn io_stats(&self) -> IoStats {
        self.state.reader.stats()
    }

    pub fn pending_resolves(&self) -> &[PendingResolve] {
        &self.state.resolves
    }

    /// Loads the group containing `id`, materializes every one of its
    /// members, then resolves queued links.
    ///
    /// Calling it again for a loaded group reads nothing and returns the
    /// cached resources.
    pub fn get_bolt_group(&mut self, id: MemberId) -> Result<&BoltGroup> {
        let index = id.group();
        let slot = self.group_slot(index)?;
        if !self.dir.groups[slot].loaded {
            self.load_group(slot)?;
        }

        for entry in 0..self.dir.groups[slot].entries.len() {
            self.materialize_member(MemberId::new(index, entry as u8))?;
        }

        self.resolve_all();
        Ok(&self.dir.groups[slot])
    }

    /// Drops every entry of the group containing `id`, along with the links
    /// its members were still waiting on. Links elsewhere that point into it
    /// stop resolving.
    pub fn free_bolt_group(&mut self, id: MemberId) {
        let index = id.group();
        if let Some(group) = self.dir.groups.get_mut(index as usize) {
            if group.loaded {
                log::debug!("freeing group {:#04x}", group.index);
            }
            group.unload();
        }
        self.state.resolves.retain(|item| item.owner.group() != index);
    }

    /// Returns the member's bytes, loading its group directory and
    /// materializing it first if needed.
    pub fn get_bolt_member(&mut self, id: MemberId) -> Result<&[u8]> {
        self.materialize_member(id)?;
        self.dir
            .entry(id)
            .and_then(BoltEntry::data)
            .ok_or(BoltError::NotMaterialized(id))
    }

    /// A loaded entry carrying a typed resource.
    pub fn bolt_entry(&self, id: MemberId) -> Result<&BoltEntry> {
        let group = self.loaded_group(id.group())?;
        let entry = group
            .entries
            .get(id.entry() as usize)
            .ok_or(BoltError::EntryOutOfRange(id))?;
        if !entry.has_resource() {
            return Err(BoltError::NotMaterialized(id));
        }
        Ok(entry)
    }

    /// Entry addressed by the upper half of a long id.
    pub fn entry_from_long(&self, id: LongId) -> Result<&BoltEntry> {
        let member = id.member();
        self.loaded_group(member.group())?
            .entries
            .get(member.entry() as usize)
            .ok_or(BoltError::EntryOutOfRange(member))
    }

    /// Raw bytes of a member; `None` when its group is not loaded.
    pub fn member_addr(&self, id: MemberId) -> Option<&[u8]> {
        self.dir.entry(id)?.data()
    }

    /// Raw bytes starting `offset` bytes into a member.
    pub fn member_addr_offset(&self, id: LongId) -> Option<&[u8]> {
        self.dir.member_addr_offset(id)
    }

    pub fn resource_at(&self, id: MemberId) -> Option<&Resource> {
        self.dir.resource(id)
    }

    /// Follows a resolved link. Pending and null links, and links into
    /// freed groups, yield `None`.
    pub fn resource(&self, link: Link) -> Option<&Resource> {
        match link {
            Link::Resolved(id) => self.dir.resource(id.member()),
            Link::Null | Link::Pending(_) => None,
        }
    }

    /// Bytes behind a resolved link.
    pub fn link_bytes(&self, link: Link) -> Option<&[u8]> {
        match link {
            Link::Resolved(id) => self.dir.member_addr_offset(id),
            Link::Null | Link::Pending(_) => None,
        }
    }

    pub fn get_picture_resource(&self, raw: u32) -> Option<&PictureResource> {
        let id = LongId::from_resource_field(raw)?;
        self.dir.resource(id.member())?.as_picture()
    }

    pub fn get_cmap_resource(&self, raw: u32) -> Option<&CMapResource> {
        let id = LongId::from_resource_field(raw)?;
        self.dir.resource(id.member())?.as_cmap()
    }

    /// Rect list `page` of a viewport, read through its link.
    pub fn view_port_rects(&self, id: MemberId, page: usize) -> Option<Vec<Rect>> {
        let view_port = self.dir.resource(id)?.as_view_port()?;
        let bytes = self.link_bytes(*view_port.rect_lists.get(page)?)?;
        Some(view_port.decode_rect_list(page, bytes))
    }

    /// Palette records of a loaded viewport list.
    pub fn view_port_list_palette(&self, id: MemberId) -> Result<Vec<ViewPortPalEntry>> {
        let list = self
            .bolt_entry(id)?
            .resource()
            .and_then(Resource::as_view_port_list)
            .ok_or(BoltError::WrongResourceKind {
                id,
                expected: "viewport list",
            })?;
        let palette = list
            .palette
            .ok_or_else(|| BoltError::invalid(id, "viewport list has no palette member"))?;
        let bytes = self
            .member_addr(palette)
            .ok_or(BoltError::Unresolved(palette.to_long()))?;
        Ok(ViewPortPalEntry::parse_table(bytes))
    }

    /// Points `slot` of `owner`'s resource at the 32-bit id `raw`, now if the
    /// target is resident, otherwise once `resolve_all` finds it.
    pub fn resolve_it(&mut self, raw: u32, owner: MemberId, slot: usize) -> Result<Link> {
        let link = match LongId::from_field(raw) {
            None => Link::Null,
            Some(target) if self.dir.is_resident(target) => Link::Resolved(target),
            Some(target) => {
                self.push_resolve(PendingResolve {
                    target,
                    owner,
                    slot,
                })?;
                Link::Pending(target)
            }
        };
        if let Some(dest) = self.dir.link_mut(owner, slot) {
            *dest = link;
        }
        Ok(link)
    }

    /// Retries every queued link. Links whose target is still absent stay
    /// queued; links whose owner has been freed are dropped.
    pub fn resolve_all(&mut self) {
        let pending = std::mem::take(&mut self.state.resolves);
        for item in pending {
            if self.dir.link_mut(item.owner, item.slot).is_none() {
                log::warn!(
                    "dropping link {} of freed member {}",
                    item.target,
                    item.owner
                );
                continue;
            }

            if self.dir.is_resident(item.target) {
                if let Some(link) = self.dir.link_mut(item.owner, item.slot) {
                    *link = Link::Resolved(item.target);
                }
            } else {
                self.state.resolves.push(item);
            }
        }
    }

    /// Frees every group and drops the file handle.
    pub fn close(mut self) {
        for group in &mut self.dir.groups {
            group.unload();
        }
        self.state.resolves.clear();
        log::debug!("closed BOLT archive {:?}", self.path);
    }

    fn group_slot(&self, index: u8) -> Result<usize> {
        let slot = index as usize;
        if slot >= self.dir.groups.len() {
            return Err(BoltError::GroupOutOfRange {
                group: index,
                count: self.dir.groups.len(),
            });
        }
        Ok(slot)
    }

    fn loaded_group(&self, index: u8) -> Result<&BoltGroup> {
        let group = &self.dir.groups[self.group_slot(index)?];
        if !group.loaded {
            return Err(BoltError::GroupNotLoaded(index));
        }
        Ok(group)
    }

    fn load_group(&mut self, slot: usize) -> Result<()> {
        let header = self.dir.groups[slot].header;
        let index = slot as u8;

        let mut table = vec![0u8; header.count * ENTRY_RECORD_SIZE];
        self.state
            .reader
            .read_at(header.file_offset as u64, &mut table, "entry directory")?;

        let entries = table
            .chunks_exact(ENTRY_RECORD_SIZE)
            .enumerate()
            .map(|(entry, record)| {
                BoltEntry::new(EntryHeader::parse(MemberId::new(index, entry as u8), record))
            })
            .collect();

        let group = &mut self.dir.groups[slot];
        group.entries = entries;
        group.loaded = true;
        log::debug!("loaded group {index:#04x} with {} entries", header.count);
        Ok(())
    }

    fn materialize_member(&mut self, id: MemberId) -> Result<()> {
        let slot = self.group_slot(id.group())?;
        if !self.dir.groups[slot].loaded {
            self.load_group(slot)?;
        }

        let group = &self.dir.groups[slot];
        let processed = group.header.processed;
        let entry = group
            .entries
            .get(id.entry() as usize)
            .ok_or(BoltError::EntryOutOfRange(id))?;
        if entry.data.is_some() {
            return Ok(());
        }

        let header = entry.header;
        let method = self.config.kind.init_method(header.init_method)?;
        let mode = if processed {
            header.mode | MODE_RAW
        } else {
            header.mode
        };

        self.state.begin_entry(header.file_offset as u64);
        let ctx = InitContext::new(
            &self.dir,
            &mut self.state,
            &self.config,
            id,
            mode,
            header.size as usize,
        );
        let materialized = resource::materialize(method, ctx)?;
        log::debug!(
            "materialized {id} as {:?} ({} bytes, {} deferred links)",
            method,
            materialized.data.len(),
            materialized.deferred.len()
        );

        if let Some(entry) = self.dir.entry_mut(id) {
            entry.data = Some(materialized.data);
            entry.resource = materialized.resource;
        }
        for (slot, target) in materialized.deferred {
            self.push_resolve(PendingResolve {
                target,
                owner: id,
                slot,
            })?;
        }
        Ok(())
    }

    fn push_resolve(&mut self, item: PendingResolve) -> Result<()> {
        if self.state.resolves.len() >= self.config.max_pending_resolves {
            return Err(BoltError::TooManyResolves(self.config.max_pending_resolves));
        }
        self.state.resolves.push(item);
        Ok(())
    }
}
