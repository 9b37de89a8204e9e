use alloc::collections::BTreeMap;

use crate::{
    clock::Timestamp,
    hash::{Hasher, Sha256Digest},
    name::{Name, NameComponentType},
    packet::Data,
};

// The forwarder only asks "is this cached?" and "keep this", admission and
//  eviction are entirely up to the store.
pub trait ContentStore {
    fn find(&mut self, name: &Name, now: Timestamp) -> Option<Data>;

    fn insert(&mut self, data: Data, now: Timestamp);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A store that never keeps anything.
#[derive(Default)]
pub struct NullContentStore;

impl ContentStore for NullContentStore {
    fn find(&mut self, _name: &Name, _now: Timestamp) -> Option<Data> {
        None
    }

    fn insert(&mut self, _data: Data, _now: Timestamp) {}

    fn len(&self) -> usize {
        0
    }
}

struct CachedData {
    data: Data,
    digest: [u8; 32],
    inserted_at: Timestamp,
    last_used: u64,
}

/// Bounded least-recently-used store.
///
/// Data is found by its exact name, or by its full name (the name followed
/// by the implicit SHA-256 digest component).
pub struct ReferenceContentStore<H>
where
    H: Hasher<Digest = Sha256Digest>,
{
    entries: BTreeMap<Name, CachedData>,
    by_digest: BTreeMap<[u8; 32], Name>,
    // Keyed by the tick of last use, so the first key is the eviction candidate
    by_use: BTreeMap<u64, Name>,
    tick: u64,
    capacity: usize,
    cache_duration_ms: Option<u64>,
    hasher: H,
}

impl<H> ReferenceContentStore<H>
where
    H: Hasher<Digest = Sha256Digest>,
{
    pub fn new(capacity: usize, cache_duration_ms: Option<u64>, hasher: H) -> Self {
        Self {
            entries: BTreeMap::new(),
            by_digest: BTreeMap::new(),
            by_use: BTreeMap::new(),
            tick: 0,
            capacity,
            cache_duration_ms,
            hasher,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.entries.contains_key(name)
    }

    fn resolve(&self, name: &Name) -> Option<Name> {
        if self.entries.contains_key(name) {
            return Some(name.clone());
        }
        let last = name.last_component()?;
        if last.component_type() != NameComponentType::ImplicitSha256Digest {
            return None;
        }
        let digest = <[u8; 32]>::try_from(&last.bytes[..]).ok()?;
        let stored = self.by_digest.get(&digest)?;
        match name.dropping_last_component() {
            Some(prefix) if &prefix == stored => Some(prefix),
            _ => None,
        }
    }

    fn is_stale(&self, cached: &CachedData, now: Timestamp) -> bool {
        match self.cache_duration_ms {
            Some(duration) => now >= cached.inserted_at.adding(duration),
            None => false,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, name: &Name) -> Option<CachedData> {
        let cached = self.entries.remove(name)?;
        self.by_digest.remove(&cached.digest);
        self.by_use.remove(&cached.last_used);
        Some(cached)
    }

    fn evict_least_recently_used(&mut self) {
        let oldest = match self.by_use.first_key_value() {
            Some((_, name)) => name.clone(),
            None => return,
        };
        tracing::trace!(name = %oldest, "evicting from content store");
        self.remove(&oldest);
    }
}

impl<H> ContentStore for ReferenceContentStore<H>
where
    H: Hasher<Digest = Sha256Digest>,
{
    fn find(&mut self, name: &Name, now: Timestamp) -> Option<Data> {
        let key = self.resolve(name)?;
        let stale = match self.entries.get(&key) {
            Some(cached) => self.is_stale(cached, now),
            None => return None,
        };
        if stale {
            self.remove(&key);
            return None;
        }

        let tick = self.next_tick();
        let cached = self.entries.get_mut(&key)?;
        self.by_use.remove(&cached.last_used);
        cached.last_used = tick;
        self.by_use.insert(tick, key);
        Some(cached.data.clone())
    }

    fn insert(&mut self, data: Data, now: Timestamp) {
        if self.capacity == 0 {
            return;
        }
        self.remove(&data.name);
        while self.entries.len() >= self.capacity {
            self.evict_least_recently_used();
        }

        let digest = data.implicit_digest(&mut self.hasher);
        let tick = self.next_tick();
        let name = data.name.clone();
        self.by_digest.insert(digest, name.clone());
        self.by_use.insert(tick, name.clone());
        self.entries.insert(
            name,
            CachedData {
                data,
                digest,
                inserted_at: now,
                last_used: tick,
            },
        );
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use alloc::vec;

    use super::*;
    use crate::name::NameComponent;

    // Good enough to tell test packets apart
    #[derive(Default)]
    pub(crate) struct FoldingHasher {
        state: [u8; 32],
        position: usize,
    }

    impl Hasher for FoldingHasher {
        type Digest = Sha256Digest;

        fn reset(&mut self) {
            self.state = [0; 32];
            self.position = 0;
        }

        fn update(&mut self, input: &[u8]) {
            for byte in input {
                let i = self.position % 32;
                self.state[i] = self.state[i].rotate_left(3) ^ byte;
                self.position += 1;
            }
        }

        fn finalize_reset(&mut self) -> Self::Digest {
            let digest = Sha256Digest(self.state);
            self.reset();
            digest
        }
    }

    fn data(s: &str, content: u8) -> Data {
        Data::new(s.parse().unwrap(), vec![content])
    }

    const T0: Timestamp = Timestamp { ms_since_1970: 1000 };

    #[test]
    fn test_exact_and_full_name_lookup() {
        let mut store = ReferenceContentStore::new(4, None, FoldingHasher::default());
        let packet = data("/a/b", 1);
        let digest = packet.implicit_digest(&mut FoldingHasher::default());
        store.insert(packet.clone(), T0);

        assert_eq!(store.find(&"/a/b".parse().unwrap(), T0), Some(packet.clone()));
        assert_eq!(store.find(&"/a".parse().unwrap(), T0), None);

        let full_name = packet
            .name
            .adding_component(NameComponent::implicit_digest(&digest));
        assert_eq!(store.find(&full_name, T0), Some(packet.clone()));

        let wrong = packet
            .name
            .adding_component(NameComponent::implicit_digest(&[0xAB; 32]));
        assert_eq!(store.find(&wrong, T0), None);
    }

    #[test]
    fn test_lru_eviction() {
        let mut store = ReferenceContentStore::new(2, None, FoldingHasher::default());
        store.insert(data("/a", 1), T0);
        store.insert(data("/b", 2), T0);

        // Touching /a makes /b the least recently used
        assert!(store.find(&"/a".parse().unwrap(), T0).is_some());
        store.insert(data("/c", 3), T0);
        assert_eq!(store.len(), 2);
        assert!(store.contains(&"/a".parse().unwrap()));
        assert!(!store.contains(&"/b".parse().unwrap()));

        // Replacing an existing name does not evict anything
        store.insert(data("/c", 4), T0);
        assert_eq!(store.len(), 2);
        assert_eq!(store.find(&"/c".parse().unwrap(), T0).unwrap().content, [4]);
    }

    #[test]
    fn test_stale_data_is_not_served() {
        let mut store = ReferenceContentStore::new(2, Some(100), FoldingHasher::default());
        store.insert(data("/a", 1), T0);
        assert!(store.find(&"/a".parse().unwrap(), T0.adding(99)).is_some());
        assert!(store.find(&"/a".parse().unwrap(), T0.adding(100)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_null_store() {
        let mut store = NullContentStore;
        store.insert(data("/a", 1), T0);
        assert!(store.find(&"/a".parse().unwrap(), T0).is_none());
        assert!(store.is_empty());
    }
}
