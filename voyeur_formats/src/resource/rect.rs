use serde::Serialize;

use super::{le_u16, le_i16};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Rect {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rect given by origin and size.
    pub fn from_origin(x: i32, y: i32, width: i32, height: i32) -> Self {
        Rect::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Reads four little-endian i16 edges.
    pub(crate) fn read_edges(data: &[u8], offset: usize) -> Self {
        Rect::new(
            le_i16(data, offset) as i32,
            le_i16(data, offset + 2) as i32,
            le_i16(data, offset + 4) as i32,
            le_i16(data, offset + 6) as i32,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RectEntry {
    pub rect: Rect,
    pub arr_index: u16,
    pub count: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RectResource {
    pub bounds: Rect,
    pub entries: Vec<RectEntry>,
}

impl RectResource {
    pub const RECORD_SIZE: usize = 8;
    pub const EXTENDED_RECORD_SIZE: usize = 12;

    /// Returns `None` when the entry size does not fit the record layout; the
    /// entry then stays a plain data member.
    pub fn parse(data: &[u8], extended: bool) -> Option<Self> {
        let record = if extended {
            Self::EXTENDED_RECORD_SIZE
        } else {
            Self::RECORD_SIZE
        };

        let (count, mut offset) = match data.len() % record {
            0 => (data.len() / record, 0),
            2 => (le_u16(data, 0) as usize, 2),
            _ => return None,
        };
        let available = (data.len() - offset) / record;
        let count = count.min(available);

        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let (arr_index, entry_count) = if extended {
                let pair = (le_u16(data, offset), le_u16(data, offset + 2));
                offset += 4;
                pair
            } else {
                (0, 0)
            };

            let rect = Rect::new(
                le_u16(data, offset) as i32,
                le_u16(data, offset + 2) as i32,
                le_u16(data, offset + 4) as i32,
                le_u16(data, offset + 6) as i32,
            );
            offset += 8;

            entries.push(RectEntry {
                rect,
                arr_index,
                count: entry_count,
            });
        }

        let bounds = entries.first().map(|entry| entry.rect).unwrap_or_default();
        Some(RectResource { bounds, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn parses_plain_records() {
        let data = words(&[1, 2, 11, 12, 5, 6, 7, 8]);
        let res = RectResource::parse(&data, false).unwrap();
        assert_eq!(res.entries.len(), 2);
        assert_eq!(res.bounds, Rect::new(1, 2, 11, 12));
        assert_eq!(res.entries[1].rect, Rect::new(5, 6, 7, 8));
    }

    #[test]
    fn honours_leading_count_and_extended_records() {
        let data = words(&[1, 3, 4, 10, 20, 30, 40]);
        let res = RectResource::parse(&data, true).unwrap();
        assert_eq!(res.entries.len(), 1);
        assert_eq!(res.entries[0].arr_index, 3);
        assert_eq!(res.entries[0].count, 4);
        assert_eq!(res.bounds, Rect::new(10, 20, 30, 40));
    }

    #[test]
    fn rejects_odd_sizes() {
        assert!(RectResource::parse(&[0u8; 5], false).is_none());
    }
}
