use alloc::vec::Vec;

use crate::{
    hash::{Hasher, Sha256Digest},
    name::Name,
};

pub type Nonce = [u8; 4];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interest {
    pub name: Name,
    pub nonce: Nonce,
    // Milliseconds, the forwarder falls back to its configured default
    pub lifetime_ms: Option<u64>,
    pub hop_limit: Option<u8>,
    // Asks the forwarders along the way not to cache the matching Data
    pub no_cache: bool,
}

impl Interest {
    pub fn new(name: Name, nonce: Nonce) -> Self {
        Self {
            name,
            nonce,
            lifetime_ms: None,
            hop_limit: None,
            no_cache: false,
        }
    }

    pub fn with_lifetime(mut self, lifetime_ms: u64) -> Self {
        self.lifetime_ms = Some(lifetime_ms);
        self
    }

    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = Some(hop_limit);
        self
    }

    pub fn with_no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Data {
    pub name: Name,
    pub content: Vec<u8>,
    // The forwarder never looks inside the signature, it is only carried along
    pub signature: Vec<u8>,
    pub no_cache: bool,
}

impl Data {
    pub fn new(name: Name, content: Vec<u8>) -> Self {
        Self {
            name,
            content,
            signature: Vec::new(),
            no_cache: false,
        }
    }

    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    /// Digest over everything that identifies this exact Data packet.
    ///
    /// Each field is length-prefixed so that moving bytes between adjacent
    /// fields always changes the digest.
    pub fn implicit_digest<H>(&self, hasher: &mut H) -> [u8; 32]
    where
        H: Hasher<Digest = Sha256Digest>,
    {
        hasher.reset();
        for component in self.name.components() {
            hasher.update(&component.typ.get().to_be_bytes());
            hasher.update(&(component.bytes.len() as u64).to_be_bytes());
            hasher.update(&component.bytes);
        }
        hasher.update(&(self.content.len() as u64).to_be_bytes());
        hasher.update(&self.content);
        hasher.update(&(self.signature.len() as u64).to_be_bytes());
        hasher.update(&self.signature);
        hasher.finalize_reset().into_inner()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    Interest(Interest),
    Data(Data),
}

impl Packet {
    pub fn name(&self) -> &Name {
        match self {
            Packet::Interest(interest) => &interest.name,
            Packet::Data(data) => &data.name,
        }
    }
}

/// Deterministic nonce source.
///
/// Runs with the same seed produce the same nonces, which keeps simulations
/// reproducible.
pub struct NonceGenerator {
    state: u32,
    counter: u32,
}

impl NonceGenerator {
    pub fn new(seed: u32) -> Self {
        Self {
            state: 5381 ^ seed,
            counter: 0,
        }
    }

    pub fn next_nonce(&mut self) -> Nonce {
        // djb2 step keyed by a running counter
        self.counter = self.counter.wrapping_add(1);
        let key = self.counter.wrapping_mul(7).wrapping_add(0x9e37_79b9);
        self.state = self.state.wrapping_mul(33) ^ key;
        self.state.to_be_bytes()
    }
}

impl Default for NonceGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use alloc::collections::BTreeSet;

    use super::*;

    #[test]
    fn test_nonce_generator_is_deterministic() {
        let mut a = NonceGenerator::new(17);
        let mut b = NonceGenerator::new(17);
        let mut c = NonceGenerator::new(18);

        let first: Vec<Nonce> = (0..100).map(|_| a.next_nonce()).collect();
        let second: Vec<Nonce> = (0..100).map(|_| b.next_nonce()).collect();
        let other: Vec<Nonce> = (0..100).map(|_| c.next_nonce()).collect();
        assert_eq!(first, second);
        assert_ne!(first, other);

        let distinct: BTreeSet<Nonce> = first.iter().copied().collect();
        assert_eq!(distinct.len(), first.len());
    }

    #[test]
    fn test_interest_builders() {
        let name: Name = "/a/b".parse().unwrap();
        let interest = Interest::new(name.clone(), [1, 2, 3, 4])
            .with_lifetime(100)
            .with_hop_limit(3)
            .with_no_cache();
        assert_eq!(interest.lifetime_ms, Some(100));
        assert_eq!(interest.hop_limit, Some(3));
        assert!(interest.no_cache);
        assert_eq!(Packet::Interest(interest).name(), &name);
    }
}
