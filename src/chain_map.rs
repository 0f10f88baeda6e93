//! ChainMap: string-keyed map with seeded hashing and separate chaining.

use crate::config::{Context, Growth, MapConfig, DEFAULT_BUCKETS};
use crate::epoch::{DebugEpoch, EpochStamp};
use crate::error::{Error, Result};
use crate::overflow;
use crate::pool::{Link, NodeKey, NodePool};
use crate::raw::{BucketArray, KeyBytes};
use crate::security::fnv1a_seeded;
use core::fmt;
use core::iter::FusedIterator;

/// Stable reference to an entry. Resolves to `None` once the entry is
/// removed, even if its pool slot is reused by a later insertion.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(NodeKey);

impl Handle {
    pub fn key<'a, V>(&self, map: &'a ChainMap<V>) -> Option<&'a str> {
        map.nodes.get(self.0).map(|e| e.key.as_str())
    }

    pub fn value<'a, V>(&self, map: &'a ChainMap<V>) -> Option<&'a V> {
        map.nodes.get(self.0).map(|e| &e.value)
    }

    pub fn value_mut<'a, V>(&self, map: &'a mut ChainMap<V>) -> Option<&'a mut V> {
        map.nodes.get_mut(self.0).map(|e| &mut e.value)
    }
}

struct Entry<V> {
    key: KeyBytes,
    value: V,
    hash: u32,
    next: Link,
}

/// Separately chained hash map from string keys to `V`.
///
/// Keys, entry nodes and the bucket array all come from the map's
/// allocator. Values are moved in and out and never copied. Store `&T` to
/// keep value lifetimes with the caller.
pub struct ChainMap<V> {
    buckets: BucketArray,
    nodes: NodePool<Entry<V>>, // chain links are pool keys
    ctx: Context,
    secure: bool,
    growth: Growth,
    epoch: DebugEpoch,
}

// SAFETY: the raw blocks are owned exclusively by the map and only touched
// through `&mut self` (writes) or `&self` (reads); the allocator is Send + Sync.
unsafe impl<V: Send> Send for ChainMap<V> {}
unsafe impl<V: Sync> Sync for ChainMap<V> {}

impl<V> ChainMap<V> {
    /// Empty map on the process-wide allocator and seed; buckets are
    /// allocated on first insertion.
    pub fn new() -> Self {
        Self::lazy(Context::global(), false, Growth::default())
    }

    /// Like [`ChainMap::new`], zeroing keys, nodes and buckets before release.
    pub fn new_secure() -> Self {
        Self::lazy(Context::global(), true, Growth::default())
    }

    pub fn with_context(ctx: Context, secure: bool) -> Self {
        Self::lazy(ctx, secure, Growth::default())
    }

    /// Map with `buckets` heads allocated up front (0 means 16).
    pub fn with_capacity(buckets: usize) -> Result<Self> {
        Self::with_config(MapConfig::new().buckets(buckets))
    }

    pub fn with_capacity_secure(buckets: usize) -> Result<Self> {
        Self::with_config(MapConfig::new().buckets(buckets).secure(true))
    }

    pub fn with_config(mut config: MapConfig) -> Result<Self> {
        let ctx = config.resolve_context();
        let mut map = Self::lazy(ctx, config.secure, config.growth);
        if let Some(requested) = config.buckets {
            let count = if requested == 0 {
                DEFAULT_BUCKETS
            } else {
                requested
            };
            map.buckets = BucketArray::allocate(&*map.ctx.allocator, count)?;
            tracing::debug!(buckets = count, secure = map.secure, "bucket array allocated");
        }
        Ok(map)
    }

    fn lazy(ctx: Context, secure: bool, growth: Growth) -> Self {
        Self {
            buckets: BucketArray::empty(),
            nodes: NodePool::new(),
            ctx,
            secure,
            growth,
            epoch: DebugEpoch::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 0
    }
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
    pub fn seed(&self) -> u32 {
        self.ctx.seed
    }
    pub fn is_secure(&self) -> bool {
        self.secure
    }
    pub fn growth(&self) -> Growth {
        self.growth
    }
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Entries per bucket; 0.0 before buckets exist.
    pub fn load_factor(&self) -> f64 {
        if self.buckets.len() == 0 {
            0.0
        } else {
            self.nodes.len() as f64 / self.buckets.len() as f64
        }
    }

    #[inline]
    fn hash(&self, key: &str) -> u32 {
        fnv1a_seeded(key.as_bytes(), self.ctx.seed)
    }

    #[inline]
    fn index_for(&self, hash: u32) -> usize {
        hash as usize % self.buckets.len()
    }

    /// Bucket `key` maps to under this map's seed and current bucket count.
    pub fn bucket_of(&self, key: &str) -> Option<usize> {
        if self.buckets.len() == 0 {
            return None;
        }
        Some(self.index_for(self.hash(key)))
    }

    fn find_node(&self, key: &str) -> Option<NodeKey> {
        if self.buckets.len() == 0 {
            return None;
        }
        let hash = self.hash(key);
        let mut link = self.buckets.as_slice()[self.index_for(hash)];
        while let Some(k) = link {
            let e = self.nodes.get(k)?;
            if e.hash == hash && e.key.as_bytes() == key.as_bytes() {
                return Some(k);
            }
            link = e.next;
        }
        None
    }

    pub fn find(&self, key: &str) -> Option<Handle> {
        self.find_node(key).map(Handle)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        let k = self.find_node(key)?;
        self.nodes.get(k).map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        let k = self.find_node(key)?;
        self.nodes.get_mut(k).map(|e| &mut e.value)
    }

    pub fn has(&self, key: &str) -> bool {
        self.find_node(key).is_some()
    }

    /// Insert or overwrite. Returns the previous value for an existing key,
    /// which is replaced in place without allocating.
    ///
    /// A new key is copied first, then a node slot is reserved, then room
    /// is made in the bucket array (lazy allocation or growth), then the
    /// entry becomes the head of its chain. On error the map is unchanged;
    /// a reserved but unused node slot is only spare capacity.
    pub fn set(&mut self, key: &str, value: V) -> Result<Option<V>> {
        if let Some(k) = self.find_node(key) {
            if let Some(e) = self.nodes.get_mut(k) {
                return Ok(Some(core::mem::replace(&mut e.value, value)));
            }
        }

        let hash = self.hash(key);
        let key = KeyBytes::copy_from(&*self.ctx.allocator, key)?;
        // SAFETY: the node pool only ever allocates from ctx.allocator.
        let reserved = unsafe { self.nodes.reserve_one(&*self.ctx.allocator, self.secure) };
        if let Err(err) = reserved.and_then(|()| self.make_room()) {
            // SAFETY: copied with this map's allocator just above.
            unsafe { key.release(&*self.ctx.allocator, self.secure) };
            return Err(err);
        }

        let idx = self.index_for(hash);
        let next = self.buckets.as_slice()[idx];
        let k = self.nodes.insert(Entry {
            key,
            value,
            hash,
            next,
        });
        self.buckets.as_mut_slice()[idx] = Some(k);
        self.epoch.bump();
        Ok(None)
    }

    // Make sure one more entry fits in the buckets under the growth policy.
    fn make_room(&mut self) -> Result<()> {
        let buckets = self.buckets.len();
        if buckets == 0 {
            return self.rehash_to(DEFAULT_BUCKETS);
        }
        if self.growth.exceeded(self.nodes.len() + 1, buckets) {
            let (doubled, wrapped) = overflow::checked_multiply(buckets, 2);
            if wrapped {
                return Err(Error::Overflow);
            }
            self.rehash_to(doubled)?;
        }
        Ok(())
    }

    /// Grow to at least `bucket_count` buckets and relink every entry.
    /// Requests at or below the current count are no-ops; buckets never
    /// shrink.
    pub fn rehash(&mut self, bucket_count: usize) -> Result<()> {
        if bucket_count <= self.buckets.len() {
            return Ok(());
        }
        self.rehash_to(bucket_count)
    }

    fn rehash_to(&mut self, count: usize) -> Result<()> {
        let from = self.buckets.len();
        // SAFETY: the bucket array only ever comes from ctx.allocator.
        unsafe {
            self.buckets
                .regrow(&*self.ctx.allocator, count, self.secure)?
        };
        let heads = self.buckets.as_mut_slice();
        for (k, e) in self.nodes.iter_mut() {
            let idx = e.hash as usize % count;
            e.next = heads[idx];
            heads[idx] = Some(k);
        }
        self.epoch.bump();
        tracing::debug!(
            from,
            to = count,
            entries = self.nodes.len(),
            secure = self.secure,
            "bucket array resized"
        );
        Ok(())
    }

    /// Unlink and return the value for `key`. `Error::NotFound` when absent.
    pub fn remove(&mut self, key: &str) -> Result<V> {
        if self.buckets.len() == 0 {
            return Err(Error::NotFound);
        }
        let hash = self.hash(key);
        let idx = self.index_for(hash);

        // The predecessor's link (or the bucket head) is rewritten in place.
        let mut prev: Link = None;
        let mut link = self.buckets.as_slice()[idx];
        while let Some(k) = link {
            let e = self.nodes.get(k).ok_or(Error::NotFound)?;
            if e.hash == hash && e.key.as_bytes() == key.as_bytes() {
                let next = e.next;
                match prev {
                    None => self.buckets.as_mut_slice()[idx] = next,
                    Some(p) => {
                        if let Some(pe) = self.nodes.get_mut(p) {
                            pe.next = next;
                        }
                    }
                }
                return self.release_entry(k).ok_or(Error::NotFound);
            }
            prev = link;
            link = e.next;
        }
        Err(Error::NotFound)
    }

    // Take an already unlinked entry out of the pool and release its key.
    // A secure pool zeroes the vacated node.
    fn release_entry(&mut self, k: NodeKey) -> Option<V> {
        let Entry { key, value, .. } = self.nodes.remove(k, self.secure)?;
        // SAFETY: every key in the pool was copied with ctx.allocator.
        unsafe { key.release(&*self.ctx.allocator, self.secure) };
        self.epoch.bump();
        Some(value)
    }

    /// Release every entry but keep the bucket array for reuse.
    pub fn clear(&mut self) {
        self.clear_with(self.secure);
    }

    fn clear_with(&mut self, secure: bool) {
        let released = self.nodes.len();
        let alloc = &*self.ctx.allocator;
        self.nodes.clear_with(secure, |e| {
            // SAFETY: every key in the pool was copied with ctx.allocator.
            unsafe { e.key.release(alloc, secure) };
        });
        for head in self.buckets.as_mut_slice() {
            *head = None;
        }
        self.epoch.bump();
        tracing::trace!(released, secure, "map cleared");
    }

    /// Release every entry, the node pool and the bucket array. The map
    /// returns to its lazy initial state and can be reused.
    pub fn free(&mut self) {
        self.free_with(self.secure);
    }

    /// [`ChainMap::free`] with secure wiping regardless of the map's flag.
    pub fn secure_free(&mut self) {
        self.free_with(true);
    }

    fn free_with(&mut self, secure: bool) {
        self.clear_with(secure);
        let alloc = &*self.ctx.allocator;
        // SAFETY: the bucket array and the node pool only ever come from
        // ctx.allocator.
        unsafe {
            self.buckets.release(alloc, secure);
            self.nodes.release(alloc, secure);
        }
        tracing::trace!(secure, "map freed");
    }

    /// Detached cursor at the first entry in bucket order.
    pub fn cursor(&self) -> Cursor {
        let mut c = Cursor {
            bucket: 0,
            current: None,
            stamp: self.epoch.stamp(),
        };
        self.seek(&mut c, 0);
        c
    }

    // Position `c` at the head of the first non-empty bucket at or after `start`.
    fn seek(&self, c: &mut Cursor, start: usize) {
        let heads = self.buckets.as_slice();
        match heads
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, h)| h.is_some())
        {
            Some((i, &head)) => {
                c.bucket = i;
                c.current = head;
            }
            None => {
                c.bucket = heads.len();
                c.current = None;
            }
        }
    }

    /// Yield the entry under `cursor` and move it forward: next in the
    /// chain, else the head of the next non-empty bucket.
    ///
    /// The cursor must not outlive a structural mutation (new key, remove,
    /// clear, free, rehash). Debug builds panic if it does; release builds
    /// stay memory-safe but the traversal is unspecified.
    pub fn advance<'a>(&'a self, cursor: &mut Cursor) -> Option<(&'a str, &'a V)> {
        let k = cursor.current?;
        self.epoch.check(&cursor.stamp);
        let Some(e) = self.nodes.get(k) else {
            cursor.current = None;
            return None;
        };
        match e.next {
            Some(next) => cursor.current = Some(next),
            None => {
                let start = cursor.bucket + 1;
                self.seek(cursor, start);
            }
        }
        Some((e.key.as_str(), &e.value))
    }

    /// Entries in bucket order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            map: self,
            cursor: self.cursor(),
            remaining: self.nodes.len(),
        }
    }

    pub fn keys(&self) -> Keys<'_, V> {
        Keys { it: self.iter() }
    }

    pub fn values(&self) -> Values<'_, V> {
        Values { it: self.iter() }
    }

    /// Every value, mutably, in node pool order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.nodes.iter_mut().map(|(_, e)| &mut e.value)
    }
}

impl<V> Default for ChainMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Drop for ChainMap<V> {
    fn drop(&mut self) {
        self.free();
    }
}

impl<V: fmt::Debug> fmt::Debug for ChainMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Position inside a [`ChainMap`] that does not borrow it.
#[derive(Clone, Debug)]
pub struct Cursor {
    bucket: usize,
    current: Link,
    stamp: EpochStamp,
}

impl Cursor {
    pub fn is_finished(&self) -> bool {
        self.current.is_none()
    }

    /// Bucket the cursor is positioned in; equals the bucket count once
    /// finished.
    pub fn bucket(&self) -> usize {
        self.bucket
    }
}

/// Iterator over `(key, value)` in bucket order.
pub struct Iter<'a, V> {
    map: &'a ChainMap<V>,
    cursor: Cursor,
    remaining: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let item = self.map.advance(&mut self.cursor)?;
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}
impl<V> FusedIterator for Iter<'_, V> {}

pub struct Keys<'a, V> {
    it: Iter<'a, V>,
}

impl<'a, V> Iterator for Keys<'a, V> {
    type Item = &'a str;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(k, _)| k)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

pub struct Values<'a, V> {
    it: Iter<'a, V>,
}

impl<'a, V> Iterator for Values<'a, V> {
    type Item = &'a V;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, v)| v)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<'a, V> IntoIterator for &'a ChainMap<V> {
    type Item = (&'a str, &'a V);
    type IntoIter = Iter<'a, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
