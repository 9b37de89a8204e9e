use alloc::vec::Vec;

use crate::{face::FaceToken, name::Name, tables::tree::NameTree};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct NextHop {
    // Field order matters: next hops sort by cost first
    pub cost: u32,
    pub face: FaceToken,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FibEntry {
    pub prefix: Name,
    // Ordered by cost, cheapest first
    pub next_hops: Vec<NextHop>,
}

/// The forwarding table, longest-prefix matched on Interest names.
///
/// The forwarder only reads it while processing packets; routes are
/// installed by whoever runs the routing protocol.
#[derive(Default)]
pub struct Fib {
    tree: NameTree<FibEntry>,
}

impl Fib {
    pub fn new() -> Self {
        Self {
            tree: NameTree::new(),
        }
    }

    // Interests under "prefix" will be forwarded to "face", with "cost"
    //  used for prioritisation. Call this again to update the cost.
    pub fn register_prefix(&mut self, prefix: &Name, face: FaceToken, cost: u32) {
        let entry = self.tree.get_or_insert_with(prefix, || FibEntry {
            prefix: prefix.clone(),
            next_hops: Vec::new(),
        });
        if let Some(index) = entry.next_hops.iter().position(|y| y.face == face) {
            entry.next_hops[index].cost = cost
        } else {
            entry.next_hops.push(NextHop { cost, face });
        }
        entry.next_hops.sort();
    }

    pub fn unregister_prefix(&mut self, prefix: &Name, face: FaceToken) -> bool {
        let (removed, now_empty) = match self.tree.get_mut(prefix) {
            Some(entry) => {
                let before = entry.next_hops.len();
                entry.next_hops.retain(|x| x.face != face);
                (entry.next_hops.len() != before, entry.next_hops.is_empty())
            }
            None => return false,
        };
        if now_empty {
            self.tree.remove(prefix);
        }
        removed
    }

    /// Longest-prefix match.
    pub fn lookup(&self, name: &Name) -> Option<&FibEntry> {
        self.tree.longest_prefix_match(name).map(|(_, entry)| entry)
    }

    /// Exact match on a registered prefix.
    pub fn get(&self, prefix: &Name) -> Option<&FibEntry> {
        self.tree.get(prefix)
    }

    // Removes the face from every entry, dropping entries left without next hops
    pub fn remove_face(&mut self, face: FaceToken) {
        self.tree.retain_mut(&mut |entry: &mut FibEntry| {
            entry.next_hops.retain(|x| x.face != face);
            !entry.next_hops.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
