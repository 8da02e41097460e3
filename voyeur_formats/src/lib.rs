pub mod archive;
pub mod config;
pub mod decompress;
pub mod error;
pub mod id;
pub mod pack;
pub mod reader;
pub mod resource;
pub mod state;

pub use archive::{BoltEntry, BoltFile, BoltGroup, EntryHeader, GroupHeader};
pub use config::{ArchiveKind, BoltConfig};
pub use decompress::{Decompressor, HISTORY_SIZE, MODE_RAW};
pub use error::{BoltError, Result};
pub use id::{LongId, MemberId};
pub use reader::{BlockReader, DECOMPRESS_SIZE, IoStats};
pub use resource::{InitMethod, Link, Resource};
pub use state::{BoltFilesState, DisplayState, SCREEN_HEIGHT, SCREEN_WIDTH};
