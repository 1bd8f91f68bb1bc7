//! Extendible hash table.
//!
//! The directory holds `2^global_depth` slots, each naming a bucket by its
//! position in an arena. Several slots may name the same bucket; a bucket with
//! local depth `d` is named by every slot whose low `d` bits match its routing
//! pattern. A full bucket is split in two at depth `d + 1`, doubling the
//! directory first when `d` already equals the global depth. Buckets are never
//! merged, so every bucket in the arena stays reachable.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use log::{debug, trace};

use crate::error::{BufError, Result};
use crate::shared::{Config, CONFIG};
use crate::sync::{Latch as _, Synchronized};

struct Bucket<K, V> {
    items: Vec<(K, V)>,
    depth: usize,
}

impl<K, V> Bucket<K, V> {
    fn new(capacity: usize, depth: usize) -> Self {
        Bucket {
            items: Vec::with_capacity(capacity),
            depth,
        }
    }
}

impl<K: Eq, V> Bucket<K, V> {
    fn find(&self, key: &K) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn remove(&mut self, key: &K) -> bool {
        match self.items.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                self.items.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    /// Returns `Ok(true)` for a new entry, `Ok(false)` for an overwrite, and
    /// hands the pair back when the bucket is full.
    fn insert(&mut self, key: K, value: V, capacity: usize) -> std::result::Result<bool, (K, V)> {
        if let Some((_, v)) = self.items.iter_mut().find(|(k, _)| *k == key) {
            *v = value;
            return Ok(false);
        }
        if self.items.len() >= capacity {
            return Err((key, value));
        }
        self.items.push((key, value));
        Ok(true)
    }
}

pub struct ExtendibleHashTableInternal<K, V, S = RandomState> {
    global_depth: usize,
    bucket_size: usize,
    dir: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
    len: usize,
    hash_builder: S,
}

/// Thread-safe extendible hash table (one latch per table)
pub type ExtendibleHashTable<K, V, S = RandomState> =
    Synchronized<ExtendibleHashTableInternal<K, V, S>>;

pub trait HashTableApi<K, V> {
    /// Returns a copy of the value stored under `key`.
    fn find(&self, key: &K) -> Option<V>;
    /// Inserts or overwrites. Always succeeds, splitting buckets and doubling
    /// the directory as needed.
    fn insert(&self, key: K, value: V);
    /// Returns whether an entry was removed.
    fn remove(&self, key: &K) -> bool;
    fn global_depth(&self) -> usize;
    /// Local depth of the bucket named by directory slot `slot`.
    ///
    /// Panics if `slot >= 2^global_depth`.
    fn local_depth(&self, slot: usize) -> usize;
    fn num_buckets(&self) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool;
    /// Verifies the directory/bucket structure, reporting the first broken
    /// invariant.
    fn check_invariants(&self) -> Result<()>;
}

impl<K, V> ExtendibleHashTable<K, V> {
    /// Panics if `bucket_size` is zero.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::new())
    }

    pub fn try_new(bucket_size: usize) -> Result<Self> {
        Self::try_with_hasher(bucket_size, RandomState::new())
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::try_new(config.bucket_size)
    }
}

impl<K, V> Default for ExtendibleHashTable<K, V> {
    /// Buckets sized by the process-wide [`CONFIG`].
    fn default() -> Self {
        Self::new(CONFIG.bucket_size)
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S> {
    /// Panics if `bucket_size` is zero.
    pub fn with_hasher(bucket_size: usize, hash_builder: S) -> Self {
        match Self::try_with_hasher(bucket_size, hash_builder) {
            Ok(table) => table,
            Err(err) => panic!("{}", err),
        }
    }

    pub fn try_with_hasher(bucket_size: usize, hash_builder: S) -> Result<Self> {
        if bucket_size == 0 {
            return Err(BufError::InvalidConfig(
                "hash table bucket_size must be positive".into(),
            ));
        }
        Ok(Synchronized::init(ExtendibleHashTableInternal {
            global_depth: 0,
            bucket_size,
            dir: vec![0],
            buckets: vec![Bucket::new(bucket_size, 0)],
            len: 0,
            hash_builder,
        }))
    }
}

impl<K, V, S> HashTableApi<K, V> for ExtendibleHashTable<K, V, S>
where
    K: Hash + Eq,
    V: Clone,
    S: BuildHasher,
{
    fn find(&self, key: &K) -> Option<V> {
        self.lock().find(key).cloned()
    }

    fn insert(&self, key: K, value: V) {
        self.lock().insert(key, value)
    }

    fn remove(&self, key: &K) -> bool {
        self.lock().remove(key)
    }

    fn global_depth(&self) -> usize {
        self.lock().global_depth
    }

    fn local_depth(&self, slot: usize) -> usize {
        let inner = self.lock();
        inner.buckets[inner.dir[slot]].depth
    }

    fn num_buckets(&self) -> usize {
        self.lock().buckets.len()
    }

    #[inline]
    fn len(&self) -> usize {
        self.lock().len
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.lock().len == 0
    }

    fn check_invariants(&self) -> Result<()> {
        self.lock().check_invariants()
    }
}

#[inline]
fn mask(depth: usize) -> usize {
    (1usize << depth) - 1
}

fn invariant(msg: String) -> BufError {
    BufError::Invariant(msg)
}

// Everything below runs with the table latch already held.
impl<K, V, S> ExtendibleHashTableInternal<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn hash(&self, key: &K) -> usize {
        self.hash_builder.hash_one(key) as usize
    }

    #[inline]
    fn index_of(&self, key: &K) -> usize {
        self.hash(key) & mask(self.global_depth)
    }

    fn find(&self, key: &K) -> Option<&V> {
        let bucket_id = self.dir[self.index_of(key)];
        self.buckets[bucket_id].find(key)
    }

    fn remove(&mut self, key: &K) -> bool {
        let bucket_id = self.dir[self.index_of(key)];
        let removed = self.buckets[bucket_id].remove(key);
        if removed {
            self.len -= 1;
        }
        removed
    }

    fn insert(&mut self, key: K, value: V) {
        let mut pending = (key, value);
        loop {
            let bucket_id = self.dir[self.index_of(&pending.0)];
            let bucket_size = self.bucket_size;
            match self.buckets[bucket_id].insert(pending.0, pending.1, bucket_size) {
                Ok(added) => {
                    if added {
                        self.len += 1;
                    }
                    return;
                }
                Err(rejected) => pending = rejected,
            }

            if self.buckets[bucket_id].depth == self.global_depth {
                self.grow_directory();
            }
            self.split_bucket(bucket_id);
        }
    }

    /// Slot `i + old_len` aliases slot `i`; no entries move.
    fn grow_directory(&mut self) {
        self.dir.extend_from_within(..);
        self.global_depth += 1;
        debug!(
            "directory doubled to {} slots (global depth {})",
            self.dir.len(),
            self.global_depth
        );
    }

    /// Splits `bucket_id` into itself and a new sibling one level deeper.
    ///
    /// The sibling owns the half of the old routing range with the new depth
    /// bit set. Entries and directory slots are both sorted by that fixed bit,
    /// so the outcome does not depend on bucket order.
    fn split_bucket(&mut self, bucket_id: usize) {
        let bucket = &mut self.buckets[bucket_id];
        bucket.depth += 1;
        let depth = bucket.depth;
        let split_bit = 1usize << (depth - 1);
        let items = std::mem::take(&mut bucket.items);

        let hash_builder = &self.hash_builder;
        let (moved, kept): (Vec<_>, Vec<_>) = items
            .into_iter()
            .partition(|(k, _)| (hash_builder.hash_one(k) as usize) & split_bit != 0);
        self.buckets[bucket_id].items = kept;

        let sibling_id = self.buckets.len();
        let mut sibling = Bucket::new(self.bucket_size, depth);
        let num_moved = moved.len();
        sibling.items.extend(moved);
        self.buckets.push(sibling);

        let mut repointed = 0;
        for (slot, target) in self.dir.iter_mut().enumerate() {
            if *target == bucket_id && slot & split_bit != 0 {
                *target = sibling_id;
                repointed += 1;
            }
        }

        debug!(
            "split bucket {} at depth {}: {} entries moved to bucket {} ({} slots)",
            bucket_id, depth, num_moved, sibling_id, repointed
        );
        trace!("{} buckets, global depth {}", self.buckets.len(), self.global_depth);
    }

    fn check_invariants(&self) -> Result<()> {
        let expected = 1usize << self.global_depth;
        if self.dir.len() != expected {
            return Err(invariant(format!(
                "directory has {} slots, global depth {} needs {}",
                self.dir.len(),
                self.global_depth,
                expected
            )));
        }

        let mut refs = vec![0usize; self.buckets.len()];
        for (slot, &bucket_id) in self.dir.iter().enumerate() {
            let bucket = self.buckets.get(bucket_id).ok_or_else(|| {
                invariant(format!("slot {} names missing bucket {}", slot, bucket_id))
            })?;
            refs[bucket_id] += 1;

            if bucket.depth > self.global_depth {
                return Err(invariant(format!(
                    "bucket {} has local depth {} above global depth {}",
                    bucket_id, bucket.depth, self.global_depth
                )));
            }
            let m = mask(bucket.depth);
            if bucket.items.iter().any(|(k, _)| self.hash(k) & m != slot & m) {
                return Err(invariant(format!(
                    "slot {} routes to bucket {} holding a key outside its range",
                    slot, bucket_id
                )));
            }
        }

        let mut total = 0;
        for (bucket_id, bucket) in self.buckets.iter().enumerate() {
            if refs[bucket_id] == 0 {
                return Err(invariant(format!("bucket {} is unreachable", bucket_id)));
            }
            let want = 1usize << (self.global_depth - bucket.depth);
            if refs[bucket_id] != want {
                return Err(invariant(format!(
                    "bucket {} at depth {} is named by {} slots, expected {}",
                    bucket_id, bucket.depth, refs[bucket_id], want
                )));
            }
            if bucket.items.len() > self.bucket_size {
                return Err(invariant(format!(
                    "bucket {} holds {} entries, capacity {}",
                    bucket_id,
                    bucket.items.len(),
                    self.bucket_size
                )));
            }
            total += bucket.items.len();
        }

        if total != self.len {
            return Err(invariant(format!(
                "buckets hold {} entries, table counts {}",
                total, self.len
            )));
        }
        Ok(())
    }
}
