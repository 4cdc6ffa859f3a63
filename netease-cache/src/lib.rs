//! Disk cache for decrypted media and lyrics.
//!
//! One [`DiskCache`] per cache kind, each rooted at its own directory.
//! Entries are addressed by string keys (see [`key`]) and only ever become
//! visible through an atomic rename, so concurrent readers never observe a
//! torn write.

mod bulk;
pub mod error;
pub mod key;
mod store;

pub use bulk::{CacheUsage, ClearReport};
pub use error::{CacheError, Result};
pub use store::{DiskCache, StagedFile};
