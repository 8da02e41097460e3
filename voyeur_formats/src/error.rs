//! Error type shared by the BOLT reader, decompressor and materializers.

use std::path::PathBuf;

use thiserror::Error;

use crate::id::{LongId, MemberId};

/// Structural problems in a BOLT file or misuse of the loader.
///
/// Every variant describes a data file the engine cannot continue with; there
/// is no partial-recovery path once one of these is returned.
#[derive(Debug, Error)]
pub enum BoltError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("opening BOLT archive {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not a BOLT archive (magic {0:02x?})")]
    BadMagic([u8; 4]),
    #[error("archive truncated while reading {0}")]
    Truncated(&'static str),
    #[error("group {group:#04x} does not exist (archive has {count} groups)")]
    GroupOutOfRange { group: u8, count: usize },
    #[error("member {0} is outside its group")]
    EntryOutOfRange(MemberId),
    #[error("group {0:#04x} is not loaded")]
    GroupNotLoaded(u8),
    #[error("compressed stream ended at file offset {0}")]
    UnexpectedEof(u64),
    #[error("init method {0} is not supported")]
    UnsupportedInitMethod(u8),
    #[error("member {id}: {reason}")]
    InvalidResource { id: MemberId, reason: String },
    #[error("member {0} has not been materialized")]
    NotMaterialized(MemberId),
    #[error("member {id} is not a {expected} resource")]
    WrongResourceKind { id: MemberId, expected: &'static str },
    #[error("reference {0} points at bytes that are not resident")]
    Unresolved(LongId),
    #[error("more than {0} references are waiting to be resolved")]
    TooManyResolves(usize),
}

impl BoltError {
    pub(crate) fn invalid(id: MemberId, reason: impl Into<String>) -> Self {
        BoltError::InvalidResource {
            id,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BoltError>;
