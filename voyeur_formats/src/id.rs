use std::fmt;

use serde::Serialize;

/// Short member id: `(group << 8) | entry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MemberId(pub u16);

impl MemberId {
    pub const fn new(group: u8, entry: u8) -> Self {
        MemberId(((group as u16) << 8) | entry as u16)
    }

    pub const fn group(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn entry(self) -> u8 {
        self.0 as u8
    }

    pub const fn to_long(self) -> LongId {
        LongId((self.0 as u32) << 16)
    }

    /// Reads a short id that was stored in a 32-bit field.
    pub fn from_field(raw: u32) -> Option<Self> {
        if raw == LongId::NONE_RAW {
            None
        } else {
            Some(MemberId(raw as u16))
        }
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Long id addressing bytes inside a member:
/// `(group << 24) | (entry << 16) | offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LongId(pub u32);

impl LongId {
    /// Field value meaning "no reference".
    pub const NONE_RAW: u32 = 0xFFFF_FFFF;

    pub fn from_field(raw: u32) -> Option<Self> {
        (raw != Self::NONE_RAW).then_some(LongId(raw))
    }

    /// Picture and colour-map fields carry either form; a non-zero low word
    /// is a short id.
    pub fn from_resource_field(raw: u32) -> Option<Self> {
        if raw == Self::NONE_RAW {
            None
        } else if raw & 0xFFFF != 0 {
            Some(LongId(raw << 16))
        } else {
            Some(LongId(raw))
        }
    }

    pub const fn group(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn entry(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn offset(self) -> usize {
        (self.0 & 0xFFFF) as usize
    }

    pub const fn member(self) -> MemberId {
        MemberId((self.0 >> 16) as u16)
    }
}

impl From<MemberId> for LongId {
    fn from(id: MemberId) -> Self {
        id.to_long()
    }
}

impl fmt::Display for LongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
