//! LRU-K frame replacer.
//!
//! Every tracked frame keeps the timestamps of its last `k` accesses. The
//! victim is the evictable frame with the largest backward k-distance: frames
//! with fewer than `k` recorded accesses count as infinitely distant and go
//! first, oldest first; after them, frames whose k-th most recent access is
//! oldest.

use std::collections::{HashMap, VecDeque};

use log::{debug, trace, warn};

use crate::error::{BufError, Result};
use crate::shared::{Config, FrameId, CONFIG};
use crate::sync::{Latch as _, Synchronized};

struct FrameEntry {
    history: VecDeque<u64>,
    evictable: bool,
}

pub struct LRUKReplacerInternal {
    frames: HashMap<FrameId, FrameEntry>,
    current_timestamp: u64,
    curr_size: usize,
    num_frames: usize,
    k: usize,
}

pub type LRUKReplacer = Synchronized<LRUKReplacerInternal>;

/// Frame replacement policy used by a buffer pool.
pub trait Replacer {
    /// Records an access to `frame_id` at the current logical time. A frame
    /// seen for the first time starts out non-evictable.
    fn record_access(&self, frame_id: FrameId) -> Result<()>;
    /// Marks a tracked frame (un)pinned. Untracked frames are ignored.
    fn set_evictable(&self, frame_id: FrameId, evictable: bool);
    /// Picks a victim among evictable frames and stops tracking it.
    fn evict(&self) -> Option<FrameId>;
    /// Stops tracking an evictable frame. Untracked frames are ignored.
    fn remove(&self, frame_id: FrameId) -> Result<()>;
    /// Number of evictable frames.
    fn size(&self) -> usize;
}

impl LRUKReplacer {
    /// Panics if `k` is zero.
    pub fn new(num_frames: usize, k: usize) -> Self {
        match Self::try_new(num_frames, k) {
            Ok(replacer) => replacer,
            Err(err) => panic!("{}", err),
        }
    }

    pub fn try_new(num_frames: usize, k: usize) -> Result<Self> {
        if k == 0 {
            return Err(BufError::InvalidConfig("replacer k must be positive".into()));
        }
        Ok(Synchronized::init(LRUKReplacerInternal {
            frames: HashMap::with_capacity(num_frames),
            current_timestamp: 0,
            curr_size: 0,
            num_frames,
            k,
        }))
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::try_new(config.pool_size, config.replacer_k)
    }

    pub fn capacity(&self) -> usize {
        self.lock().num_frames
    }

    pub fn k(&self) -> usize {
        self.lock().k
    }
}

impl Default for LRUKReplacer {
    /// Sized by the process-wide [`CONFIG`].
    fn default() -> Self {
        Self::new(CONFIG.pool_size, CONFIG.replacer_k)
    }
}

impl Replacer for LRUKReplacer {
    fn record_access(&self, frame_id: FrameId) -> Result<()> {
        self.lock().record_access(frame_id)
    }

    fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        self.lock().set_evictable(frame_id, evictable)
    }

    fn evict(&self) -> Option<FrameId> {
        self.lock().evict()
    }

    fn remove(&self, frame_id: FrameId) -> Result<()> {
        self.lock().remove(frame_id)
    }

    #[inline]
    fn size(&self) -> usize {
        self.lock().curr_size
    }
}

// Callers hold the replacer latch.
impl LRUKReplacerInternal {
    fn record_access(&mut self, frame_id: FrameId) -> Result<()> {
        if frame_id < 0 || frame_id as usize >= self.num_frames {
            warn!("access recorded for out-of-range frame {}", frame_id);
            return Err(BufError::InvalidFrame {
                frame_id,
                capacity: self.num_frames,
            });
        }

        let k = self.k;
        let timestamp = self.current_timestamp;
        self.current_timestamp += 1;

        let entry = self.frames.entry(frame_id).or_insert_with(|| FrameEntry {
            history: VecDeque::with_capacity(k),
            evictable: false,
        });
        if entry.history.len() == k {
            entry.history.pop_front();
        }
        entry.history.push_back(timestamp);
        trace!("frame {} accessed at {}", frame_id, timestamp);
        Ok(())
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        let entry = match self.frames.get_mut(&frame_id) {
            Some(entry) => entry,
            None => return,
        };
        if entry.evictable == evictable {
            return;
        }
        entry.evictable = evictable;
        if evictable {
            self.curr_size += 1;
        } else {
            self.curr_size -= 1;
        }
    }

    fn evict(&mut self) -> Option<FrameId> {
        let k = self.k;
        // full windows rank after partial ones; then oldest retained access,
        // then frame id so ties are deterministic
        let victim = self
            .frames
            .iter()
            .filter(|(_, entry)| entry.evictable)
            .min_by_key(|&(&frame_id, entry)| {
                (entry.history.len() >= k, entry.history.front().copied(), frame_id)
            })
            .map(|(&frame_id, _)| frame_id)?;

        self.frames.remove(&victim);
        self.curr_size -= 1;
        debug!("evicted frame {} ({} evictable left)", victim, self.curr_size);
        Some(victim)
    }

    fn remove(&mut self, frame_id: FrameId) -> Result<()> {
        match self.frames.get(&frame_id) {
            None => Ok(()),
            Some(entry) if !entry.evictable => {
                warn!("refusing to remove pinned frame {}", frame_id);
                Err(BufError::RemoveNonEvictable { frame_id })
            }
            Some(_) => {
                self.frames.remove(&frame_id);
                self.curr_size -= 1;
                Ok(())
            }
        }
    }
}
