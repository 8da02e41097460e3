//! Tick-driven palette effects.
//!
//! The display timer calls [`EventsManager::voyeur_timer`] once per tick.
//! Every enabled interrupt node either fires on each tick or counts down and
//! fires when it reaches zero. Fades and palette cycles write into the VGA
//! colour table and flag the touched range; the main loop pushes it to the
//! display with [`EventsManager::flush_palette`].

use std::io::{Read, Seek};

use serde::Serialize;
use voyeur_formats::resource::palette::{FADE_SINGLE_COLOR, FADE_SKIP};
use voyeur_formats::resource::{CMapResource, CycleResource};
use voyeur_formats::BoltFile;

use crate::graphics::{GraphicsManager, PALETTE_COUNT};

/// Node is not polled.
pub const NODE_DISABLED: u8 = 0x01;
/// Node fires on every tick instead of counting down.
pub const NODE_EVERY_TICK: u8 = 0x02;

const CYCLE_SLOTS: usize = 4;
const CYCLE_RECORD_SIZE: usize = 6;
const CYCLE_ROTATE: u16 = 1;

/// State shared between the timer handlers and the main loop.
#[derive(Debug, Clone, Serialize)]
pub struct IntData {
    pub flash_timer: u32,
    pub flash_step: u32,
    /// Fades hold while set.
    pub skip_fading: bool,
    /// A palette range is waiting to be uploaded.
    pub has_palette: bool,
    pub pal_start_index: usize,
    pub pal_end_index: usize,
}

impl Default for IntData {
    fn default() -> Self {
        IntData {
            flash_timer: 0,
            flash_step: 1,
            skip_fading: false,
            has_palette: false,
            pal_start_index: PALETTE_COUNT,
            pal_end_index: 0,
        }
    }
}

impl IntData {
    fn mark_palette(&mut self, start: usize, end: usize) {
        self.pal_start_index = self.pal_start_index.min(start);
        self.pal_end_index = self.pal_end_index.max(end);
        self.has_palette = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IntHandler {
    Fade,
    Cycle,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntNode {
    pub handler: IntHandler,
    pub cur_time: u16,
    pub time_reset: u16,
    pub flags: u8,
}

impl IntNode {
    pub fn new(handler: IntHandler, time: u16, flags: u8) -> Self {
        IntNode {
            handler,
            cur_time: time,
            time_reset: time,
            flags,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.flags & NODE_DISABLED == 0
    }

    fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.flags &= !NODE_DISABLED;
        } else {
            self.flags |= NODE_DISABLED;
        }
    }

    /// Advances the countdown; true when the handler should run.
    fn tick(&mut self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        if self.flags & NODE_EVERY_TICK != 0 {
            return true;
        }
        self.cur_time = self.cur_time.saturating_sub(1);
        if self.cur_time != 0 {
            return false;
        }
        self.cur_time = self.time_reset;
        true
    }
}

#[derive(Debug, Clone, Default)]
struct CycleSlot {
    kind: u16,
    data: Vec<u8>,
    /// Offset of the next record for stepping cycles.
    next: usize,
    time: i32,
}

#[derive(Debug, Clone)]
pub struct EventsManager {
    pub int_data: IntData,
    nodes: Vec<IntNode>,
    fade_first_col: usize,
    fade_last_col: usize,
    fade_count: u32,
    fade_status: u8,
    cycle_status: u8,
    cycles: [CycleSlot; CYCLE_SLOTS],
    ticks: u64,
}

impl Default for EventsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EventsManager {
    pub fn new() -> Self {
        EventsManager {
            int_data: IntData::default(),
            nodes: vec![
                IntNode::new(IntHandler::Fade, 0, NODE_DISABLED | NODE_EVERY_TICK),
                IntNode::new(IntHandler::Cycle, 0, NODE_DISABLED | NODE_EVERY_TICK),
            ],
            fade_first_col: 0,
            fade_last_col: 0,
            fade_count: 0,
            fade_status: 0,
            cycle_status: 0,
            cycles: Default::default(),
            ticks: 0,
        }
    }

    pub fn nodes(&self) -> &[IntNode] {
        &self.nodes
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_fading(&self) -> bool {
        self.fade_status & 1 != 0
    }

    /// Steps left before the running fade completes.
    pub fn fade_count(&self) -> u32 {
        self.fade_count
    }

    pub fn is_cycling(&self) -> bool {
        self.cycle_status & 1 != 0
    }

    /// One timer tick.
    pub fn voyeur_timer(&mut self, gfx: &mut GraphicsManager) {
        self.ticks += 1;
        self.int_data.flash_timer = self
            .int_data
            .flash_timer
            .wrapping_add(self.int_data.flash_step);

        for index in 0..self.nodes.len() {
            if !self.nodes[index].tick() {
                continue;
            }
            match self.nodes[index].handler {
                IntHandler::Fade => self.do_fade(gfx),
                IntHandler::Cycle => self.do_cycle(gfx),
            }
        }
    }

    /// Uploads the palette range the handlers touched since the last flush.
    pub fn flush_palette(&mut self, gfx: &mut GraphicsManager) -> bool {
        if !self.int_data.has_palette {
            return false;
        }
        let end = self.int_data.pal_end_index.min(PALETTE_COUNT - 1);
        gfx.upload_palette(self.int_data.pal_start_index, end);
        self.int_data.has_palette = false;
        self.int_data.pal_start_index = PALETTE_COUNT;
        self.int_data.pal_end_index = 0;
        true
    }

    /// Starts fading the colour map's range towards its colours, or loads
    /// them at once when the map has no steps.
    pub fn start_fade(&mut self, cmap: &CMapResource, gfx: &mut GraphicsManager) {
        self.set_node_enabled(IntHandler::Fade, false);
        let cycling = self.is_cycling();
        if cycling {
            self.set_node_enabled(IntHandler::Cycle, false);
        }

        let first = (cmap.start as usize).min(PALETTE_COUNT - 1);
        let last = (cmap.end as usize).min(PALETTE_COUNT - 1);
        self.fade_first_col = first;
        self.fade_last_col = last;
        self.fade_count = cmap.steps as u32 + 1;

        if cmap.steps > 0 {
            self.fade_status = cmap.fade_status | 1;
            let steps = cmap.steps as i32;
            for (offset, index) in (first..=last).enumerate() {
                let current = gfx.color(index);
                let target = cmap.color(offset);
                let entry = &mut gfx.palette[index];
                entry.r_entry = (current[0] as i32) << 8;
                entry.g_entry = (current[1] as i32) << 8;
                entry.b_entry = (current[2] as i32) << 8;
                entry.r_change = (((target[0] as i32) << 8) - entry.r_entry) / steps;
                entry.g_change = (((target[1] as i32) << 8) - entry.g_entry) / steps;
                entry.b_change = (((target[2] as i32) << 8) - entry.b_entry) / steps;
                entry.pal_index = index as u16;
            }

            if cmap.fade_status & FADE_SKIP != 0 {
                self.int_data.skip_fading = true;
            }
            self.set_node_enabled(IntHandler::Fade, true);
            log::debug!("fading colours {first}..={last} over {steps} steps");
        } else {
            for (offset, index) in (first..=last).enumerate() {
                gfx.set_color(index, cmap.color(offset));
            }
            self.int_data.mark_palette(first, last);
        }

        if cycling {
            self.set_node_enabled(IntHandler::Cycle, true);
        }
    }

    /// Lets a fade started with the skip bit run.
    pub fn resume_fading(&mut self) {
        self.int_data.skip_fading = false;
    }

    fn do_fade(&mut self, gfx: &mut GraphicsManager) {
        if self.int_data.skip_fading {
            return;
        }

        self.fade_count = self.fade_count.saturating_sub(1);
        if self.fade_count == 0 {
            self.set_node_enabled(IntHandler::Fade, false);
            self.fade_status &= !1;
            return;
        }

        for index in self.fade_first_col..=self.fade_last_col {
            let entry = &mut gfx.palette[index];
            entry.r_entry += entry.r_change;
            entry.g_entry += entry.g_change;
            entry.b_entry += entry.b_change;
            let rgb = [
                (entry.r_entry >> 8) as u8,
                (entry.g_entry >> 8) as u8,
                (entry.b_entry >> 8) as u8,
            ];
            let target = entry.pal_index as usize;
            gfx.set_color(target, rgb);
        }
        self.int_data
            .mark_palette(self.fade_first_col, self.fade_last_col);
    }

    /// Starts the palette cycles of `cycle`, copying each slot's data from
    /// the member its link points at.
    pub fn start_cycle<R: Read + Seek>(&mut self, cycle: &CycleResource, archive: &BoltFile<R>) {
        for (slot, state) in self.cycles.iter_mut().enumerate() {
            let kind = cycle.types[slot];
            let data = archive
                .link_bytes(cycle.ptrs[slot])
                .map(<[u8]>::to_vec)
                .unwrap_or_default();
            if kind != 0 && data.is_empty() {
                log::warn!("cycle slot {slot} has no data; disabling it");
            }
            *state = CycleSlot {
                kind: if data.is_empty() { 0 } else { kind },
                data,
                next: 0,
                time: 0,
            };
        }
        self.cycle_status = 1;
        self.set_node_enabled(IntHandler::Cycle, true);
    }

    pub fn stop_cycle(&mut self) {
        self.set_node_enabled(IntHandler::Cycle, false);
        self.cycle_status &= !1;
    }

    fn do_cycle(&mut self, gfx: &mut GraphicsManager) {
        for slot in (0..CYCLE_SLOTS).rev() {
            let state = &mut self.cycles[slot];
            if state.kind == 0 {
                continue;
            }
            state.time -= 1;
            if state.time > 0 {
                continue;
            }

            if state.kind == CYCLE_ROTATE {
                if state.data.len() < 6 {
                    continue;
                }
                let start = u16::from_le_bytes([state.data[0], state.data[1]]) as usize;
                let end = u16::from_le_bytes([state.data[2], state.data[3]]) as usize;
                state.time = state.data[4] as i32;
                gfx.rotate_colors(start..=end, state.data[5] == 1);
            } else {
                step_cycle(state, gfx);
            }

            self.int_data.mark_palette(0, PALETTE_COUNT - 1);
        }
    }

    fn set_node_enabled(&mut self, handler: IntHandler, enabled: bool) {
        for node in self.nodes.iter_mut().filter(|n| n.handler == handler) {
            node.set_enabled(enabled);
        }
    }
}

/// Applies `[index u16, delay, r, g, b]` records from the cursor until one
/// with a non-zero delay has been applied. A negative index restarts the
/// list.
fn step_cycle(state: &mut CycleSlot, gfx: &mut GraphicsManager) {
    let record_at = |data: &[u8], at: usize| data.get(at..at + CYCLE_RECORD_SIZE).map(<[u8]>::to_vec);

    for _ in 0..state.data.len() / CYCLE_RECORD_SIZE {
        let Some(record) = record_at(&state.data, state.next) else {
            state.next = 0;
            break;
        };
        let index = i16::from_le_bytes([record[0], record[1]]);
        if index < 0 {
            state.next = 0;
            continue;
        }

        gfx.set_color(index as usize, [record[3], record[4], record[5]]);
        state.next += CYCLE_RECORD_SIZE;
        state.time = record[2] as i32;
        if state.time != 0 {
            break;
        }
    }

    if state.time <= 0 {
        state.time = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmap(steps: u8, fade_status: u8, start: u16, entries: Vec<u8>) -> CMapResource {
        let end = start + (entries.len() / 3) as u16 - 1;
        CMapResource {
            steps,
            fade_status,
            start,
            end,
            entries,
        }
    }

    #[test]
    fn countdown_nodes_fire_and_reload() {
        let mut node = IntNode::new(IntHandler::Cycle, 3, 0);
        let fired: Vec<bool> = (0..7).map(|_| node.tick()).collect();
        assert_eq!(fired, vec![false, false, true, false, false, true, false]);

        node.set_enabled(false);
        assert!(!node.tick());
    }

    #[test]
    fn timer_advances_flash_clock() {
        let mut events = EventsManager::new();
        let mut gfx = GraphicsManager::new();
        events.int_data.flash_step = 3;
        for _ in 0..4 {
            events.voyeur_timer(&mut gfx);
        }
        assert_eq!(events.int_data.flash_timer, 12);
        assert_eq!(events.ticks(), 4);
    }

    #[test]
    fn zero_step_colour_map_loads_immediately() {
        let mut events = EventsManager::new();
        let mut gfx = GraphicsManager::new();
        events.start_fade(&cmap(0, 0, 10, vec![1, 2, 3, 4, 5, 6]), &mut gfx);

        assert_eq!(gfx.color(10), [1, 2, 3]);
        assert_eq!(gfx.color(11), [4, 5, 6]);
        assert!(!events.is_fading());
        assert!(events.flush_palette(&mut gfx));
        assert_eq!(gfx.uploads()[0], crate::graphics::PaletteUpload { start: 10, end: 11 });
        assert!(!events.flush_palette(&mut gfx));
    }

    #[test]
    fn fade_reaches_target_after_steps() {
        let mut events = EventsManager::new();
        let mut gfx = GraphicsManager::new();
        gfx.set_color(5, [0, 100, 40]);
        events.start_fade(&cmap(4, 0, 5, vec![40, 0, 40]), &mut gfx);
        assert!(events.is_fading());
        assert_eq!(events.fade_count(), 5);

        events.voyeur_timer(&mut gfx);
        assert_eq!(gfx.color(5), [10, 75, 40]);

        for _ in 0..3 {
            events.voyeur_timer(&mut gfx);
        }
        assert_eq!(gfx.color(5), [40, 0, 40]);
        assert!(events.is_fading());

        events.voyeur_timer(&mut gfx);
        assert!(!events.is_fading());
        assert!(!events.nodes()[0].is_enabled());
        assert_eq!(gfx.color(5), [40, 0, 40]);
    }

    #[test]
    fn single_colour_fade_with_skip_waits_for_resume() {
        let mut events = EventsManager::new();
        let mut gfx = GraphicsManager::new();
        let map = cmap(2, FADE_SINGLE_COLOR | FADE_SKIP, 0, vec![20, 20, 20, 99, 99, 99]);
        events.start_fade(&map, &mut gfx);

        events.voyeur_timer(&mut gfx);
        assert_eq!(gfx.color(0), [0, 0, 0]);
        assert_eq!(events.fade_count(), 3);

        events.resume_fading();
        events.voyeur_timer(&mut gfx);
        events.voyeur_timer(&mut gfx);
        assert_eq!(gfx.color(0), [20, 20, 20]);
        assert_eq!(gfx.color(1), [20, 20, 20]);
    }

    #[test]
    fn stepping_cycle_applies_records_and_wraps() {
        let mut gfx = GraphicsManager::new();
        let mut slot = CycleSlot {
            kind: 2,
            data: vec![
                1, 0, 0, 9, 9, 9, // delay 0: chained with the next record
                2, 0, 3, 7, 7, 7, //
                0xFF, 0xFF, 0, 0, 0, 0,
            ],
            next: 0,
            time: 0,
        };
        step_cycle(&mut slot, &mut gfx);
        assert_eq!(gfx.color(1), [9, 9, 9]);
        assert_eq!(gfx.color(2), [7, 7, 7]);
        assert_eq!((slot.next, slot.time), (12, 3));

        gfx.set_color(1, [0; 3]);
        step_cycle(&mut slot, &mut gfx);
        assert_eq!(gfx.color(1), [9, 9, 9]);
        assert_eq!((slot.next, slot.time), (12, 3));
    }

    #[test]
    fn stopped_cycles_leave_the_palette_alone() {
        let mut events = EventsManager::new();
        let mut gfx = GraphicsManager::new();
        events.cycles[0] = CycleSlot {
            kind: CYCLE_ROTATE,
            data: vec![0, 0, 2, 0, 2, 1],
            next: 0,
            time: 0,
        };
        events.cycle_status = 1;
        events.set_node_enabled(IntHandler::Cycle, true);
        for index in 0..3 {
            gfx.set_color(index, [index as u8; 3]);
        }

        events.voyeur_timer(&mut gfx);
        assert_eq!(gfx.color(0), [1, 1, 1]);
        events.voyeur_timer(&mut gfx);
        assert_eq!(gfx.color(0), [1, 1, 1]);
        events.voyeur_timer(&mut gfx);
        assert_eq!(gfx.color(0), [2, 2, 2]);

        events.stop_cycle();
        events.voyeur_timer(&mut gfx);
        events.voyeur_timer(&mut gfx);
        assert_eq!(gfx.color(0), [2, 2, 2]);
        assert!(!events.is_cycling());
    }
}
