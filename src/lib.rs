//! Buffer-management building blocks: an extendible hash index that maps page
//! ids to frames, and an LRU-K replacer that picks which frame to reclaim.

pub mod error;
pub mod shared;
pub mod storage;
pub mod sync;

pub use error::{BufError, Result};
pub use shared::{Config, FrameId, PageId};
pub use storage::buffer::lruk::{LRUKReplacer, Replacer};
pub use sync::hashtable::{ExtendibleHashTable, HashTableApi};
pub use sync::{Latch, Synchronized};
