use alloc::{
    collections::{btree_map, BTreeMap, BTreeSet},
    vec::Vec,
};

use crate::{
    clock::Timestamp, error::PitError, face::FaceToken, name::Name, packet::Nonce,
    scheduler::TimerId,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InRecord {
    pub face: FaceToken,
    pub nonce: Nonce,
    pub arrival: Timestamp,
    pub expiry: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutRecord {
    pub face: FaceToken,
    pub nonce: Nonce,
    pub sent_at: Timestamp,
    pub expiry: Timestamp,
    // How many times this face was tried again after the first send
    pub retransmissions: u32,
}

/// State of one outstanding Interest name.
///
/// An entry always has at least one in-record: the table removes an entry in
/// the same step that removes its last in-record.
#[derive(Debug)]
pub struct PitEntry {
    name: Name,
    generation: u64,
    in_records: Vec<InRecord>,
    out_records: Vec<OutRecord>,
    // Every nonce ever seen for this entry, including replaced ones
    seen_nonces: BTreeSet<Nonce>,
    fib_prefix: Option<Name>,
    expiry: Timestamp,
    timer: Option<TimerId>,
    no_cache: bool,
}

impl PitEntry {
    pub fn name(&self) -> &Name {
        &self.name
    }

    // Distinguishes this entry from earlier entries for the same name
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn in_records(&self) -> &[InRecord] {
        &self.in_records
    }

    pub fn out_records(&self) -> &[OutRecord] {
        &self.out_records
    }

    pub fn in_record(&self, face: FaceToken) -> Option<&InRecord> {
        self.in_records.iter().find(|r| r.face == face)
    }

    pub fn out_record(&self, face: FaceToken) -> Option<&OutRecord> {
        self.out_records.iter().find(|r| r.face == face)
    }

    /// Prefix of the FIB entry matched when the entry was created.
    pub fn fib_prefix(&self) -> Option<&Name> {
        self.fib_prefix.as_ref()
    }

    pub fn expiry(&self) -> Timestamp {
        self.expiry
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    pub fn no_cache(&self) -> bool {
        self.no_cache
    }

    pub fn seen_nonces(&self) -> impl Iterator<Item = &Nonce> + '_ {
        self.seen_nonces.iter()
    }

    pub fn has_seen_nonce(&self, nonce: Nonce) -> bool {
        self.seen_nonces.contains(&nonce)
    }

    /// A requester that already has an in-record asking again with a new nonce.
    pub fn is_retransmission(&self, face: FaceToken, nonce: Nonce) -> bool {
        match self.in_record(face) {
            Some(record) => record.nonce != nonce,
            None => false,
        }
    }

    pub fn has_unexpired_out_record(&self, now: Timestamp) -> bool {
        self.out_records.iter().any(|r| now < r.expiry)
    }

    // Returns true if the entry expiry moved, in which case the timer must be re-armed
    pub fn insert_or_update_in_record(
        &mut self,
        face: FaceToken,
        nonce: Nonce,
        now: Timestamp,
        lifetime_ms: u64,
    ) -> bool {
        let expiry = now.adding(lifetime_ms);
        self.seen_nonces.insert(nonce);
        match self.in_records.iter_mut().find(|r| r.face == face) {
            Some(record) => {
                record.nonce = nonce;
                record.arrival = now;
                record.expiry = expiry;
            }
            None => self.in_records.push(InRecord {
                face,
                nonce,
                arrival: now,
                expiry,
            }),
        }
        self.extend_expiry(expiry)
    }

    // Returns true if this face had no out-record before
    pub fn insert_or_update_out_record(
        &mut self,
        face: FaceToken,
        nonce: Nonce,
        now: Timestamp,
        lifetime_ms: u64,
    ) -> bool {
        let expiry = now.adding(lifetime_ms);
        self.seen_nonces.insert(nonce);
        match self.out_records.iter_mut().find(|r| r.face == face) {
            Some(record) => {
                record.nonce = nonce;
                record.sent_at = now;
                record.expiry = expiry;
                record.retransmissions += 1;
                false
            }
            None => {
                self.out_records.push(OutRecord {
                    face,
                    nonce,
                    sent_at: now,
                    expiry,
                    retransmissions: 0,
                });
                true
            }
        }
    }

    pub(crate) fn set_no_cache(&mut self) {
        self.no_cache = true;
    }

    pub(crate) fn replace_timer(&mut self, timer: Option<TimerId>) -> Option<TimerId> {
        core::mem::replace(&mut self.timer, timer)
    }

    pub(crate) fn take_timer(&mut self) -> Option<TimerId> {
        self.timer.take()
    }

    fn extend_expiry(&mut self, expiry: Timestamp) -> bool {
        if expiry > self.expiry {
            self.expiry = expiry;
            true
        } else {
            false
        }
    }

    // Drops every record of the face, returns true if the face had an out-record
    fn remove_face(&mut self, face: FaceToken) -> bool {
        self.in_records.retain(|r| r.face != face);
        let before = self.out_records.len();
        self.out_records.retain(|r| r.face != face);
        before != self.out_records.len()
    }
}

/// The Pending Interest Table, keyed by exact Interest name.
pub struct Pit {
    entries: BTreeMap<Name, PitEntry>,
    capacity: Option<usize>,
    next_generation: u64,
}

impl Pit {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity,
            next_generation: 1,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, name: &Name) -> Option<&PitEntry> {
        self.entries.get(name)
    }

    pub fn find_mut(&mut self, name: &Name) -> Option<&mut PitEntry> {
        self.entries.get_mut(name)
    }

    /// The entry with the longest name that is a prefix of `name`.
    pub fn longest_prefix_match(&self, name: &Name) -> Option<&PitEntry> {
        (0..=name.component_count())
            .rev()
            .find_map(|len| self.entries.get(&name.prefix(len)))
    }

    /// Creates the entry together with its first in-record.
    ///
    /// Creating a name that already has an entry only refreshes the
    /// in-record of `in_face` on the existing one.
    pub fn create(
        &mut self,
        name: &Name,
        in_face: FaceToken,
        nonce: Nonce,
        now: Timestamp,
        lifetime_ms: u64,
        fib_prefix: Option<Name>,
    ) -> Result<&mut PitEntry, PitError> {
        let len = self.entries.len();
        match self.entries.entry(name.clone()) {
            btree_map::Entry::Occupied(occupied) => {
                let entry = occupied.into_mut();
                entry.insert_or_update_in_record(in_face, nonce, now, lifetime_ms);
                Ok(entry)
            }
            btree_map::Entry::Vacant(vacant) => {
                if let Some(capacity) = self.capacity {
                    if len >= capacity {
                        return Err(PitError::CapacityExceeded { capacity });
                    }
                }
                let generation = self.next_generation;
                self.next_generation += 1;
                let entry = vacant.insert(PitEntry {
                    name: name.clone(),
                    generation,
                    in_records: Vec::new(),
                    out_records: Vec::new(),
                    seen_nonces: BTreeSet::new(),
                    fib_prefix,
                    expiry: now,
                    timer: None,
                    no_cache: false,
                });
                entry.insert_or_update_in_record(in_face, nonce, now, lifetime_ms);
                Ok(entry)
            }
        }
    }

    pub fn erase(&mut self, name: &Name) -> Option<PitEntry> {
        self.entries.remove(name)
    }

    /// Purges the face from all records.
    ///
    /// Entries left without in-records are removed and returned, together
    /// with the entries that kept living but lost an out-record on the face.
    pub fn remove_face(&mut self, face: FaceToken) -> (Vec<PitEntry>, usize) {
        let mut emptied = Vec::new();
        let mut lost_out_records = 0;
        for (name, entry) in self.entries.iter_mut() {
            if entry.remove_face(face) {
                lost_out_records += 1;
            }
            if entry.in_records.is_empty() {
                emptied.push(name.clone());
            }
        }
        let erased = emptied
            .iter()
            .filter_map(|name| self.entries.remove(name))
            .collect();
        (erased, lost_out_records)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PitEntry> + '_ {
        self.entries.values()
    }
}
