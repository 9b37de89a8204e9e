use alloc::collections::BTreeMap;

use crate::{clock::Timestamp, name::Name, packet::Nonce};

// Remembers (name, nonce) pairs of recently erased PIT entries so that an
//  Interest which loops back after its entry is gone is still recognised.
//  Only a hash is kept, so false positives are possible; the requester then
//  simply retransmits with a new nonce.
pub struct DeadNonceList {
    elements: BTreeMap<u64, Timestamp>,
    duration_to_keep_ms: u64,
}

impl DeadNonceList {
    pub fn new(duration_to_keep_ms: u64) -> Self {
        Self {
            elements: Default::default(),
            duration_to_keep_ms,
        }
    }

    pub fn contains(&self, name: &Name, nonce: Nonce, now: Timestamp) -> bool {
        let name_hash = Self::hash_name_and_nonce(name, nonce);
        match self.elements.get(&name_hash) {
            Some(expiry) => now < *expiry,
            None => false,
        }
    }

    pub fn insert(&mut self, name: &Name, nonce: Nonce, now: Timestamp) {
        let name_hash = Self::hash_name_and_nonce(name, nonce);
        self.elements
            .insert(name_hash, now.adding(self.duration_to_keep_ms));
    }

    pub fn prune(&mut self, now: Timestamp) {
        self.elements.retain(|_, expiry| now < *expiry);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn hash_name_and_nonce(name: &Name, nonce: Nonce) -> u64 {
        let mut hash = 0u64;
        let mut arr = [0u8; 8];

        for cc in name.components() {
            Self::add_to_hash(&mut hash, cc.typ.get() as u64);
            let mut chunks = cc.bytes.chunks_exact(8);
            for chunk in chunks.by_ref() {
                arr.copy_from_slice(chunk);
                Self::add_to_hash(&mut hash, u64::from_be_bytes(arr));
            }
            let rest = chunks.remainder();
            if !rest.is_empty() {
                arr = [0u8; 8];
                arr[..rest.len()].copy_from_slice(rest);
                Self::add_to_hash(&mut hash, u64::from_be_bytes(arr));
            }
            Self::add_to_hash(&mut hash, cc.bytes.len() as u64);
        }
        Self::add_to_hash(&mut hash, u32::from_be_bytes(nonce) as u64);
        hash
    }

    #[inline]
    fn add_to_hash(hash: &mut u64, i: u64) {
        use core::ops::BitXor;
        *hash = hash
            .rotate_left(5)
            .bitxor(i)
            .wrapping_mul(0x517cc1b727220a95);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_nonces_expire() {
        let mut dnl = DeadNonceList::new(100);
        let name: Name = "/a/some-longer-component".parse().unwrap();
        let t0 = Timestamp::from_ms(1000);

        dnl.insert(&name, [1, 2, 3, 4], t0);
        assert!(dnl.contains(&name, [1, 2, 3, 4], t0.adding(99)));
        assert!(!dnl.contains(&name, [1, 2, 3, 5], t0));
        assert!(!dnl.contains(&"/a".parse().unwrap(), [1, 2, 3, 4], t0));
        assert!(!dnl.contains(&name, [1, 2, 3, 4], t0.adding(100)));

        dnl.prune(t0.adding(50));
        assert_eq!(dnl.len(), 1);
        dnl.prune(t0.adding(100));
        assert!(dnl.is_empty());
    }
}
