use alloc::{collections::BTreeMap, vec::Vec};

use crate::{error::ForwardingError, face::FaceToken};

// Counters only observe, they never influence forwarding decisions.
pub trait ForwarderMetrics {
    fn interest_received(&mut self, _face: FaceToken) {}
    fn interest_sent(&mut self, _face: FaceToken) {}
    fn interest_dropped(&mut self, _face: FaceToken, _reason: &ForwardingError) {}
    fn data_received(&mut self, _face: FaceToken) {}
    fn data_sent(&mut self, _face: FaceToken, _from_cache: bool) {}
    fn data_dropped(&mut self, _face: FaceToken, _reason: &ForwardingError) {}
    // A face turned down a single transmission, another may still take it
    fn face_refused(&mut self, _face: FaceToken, _reason: &ForwardingError) {}
}

pub struct InertMetrics {}

impl ForwarderMetrics for InertMetrics {}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FaceCounters {
    pub in_interests: u64,
    pub out_interests: u64,
    pub dropped_interests: u64,
    // Single transmissions turned down, the Interest may still have gone elsewhere
    pub refused_interests: u64,
    pub in_data: u64,
    // Includes the ones served from the content store
    pub out_data: u64,
    pub out_data_from_cache: u64,
    pub dropped_data: u64,
}

#[derive(Default)]
pub struct CountingMetrics {
    totals: FaceCounters,
    faces: BTreeMap<FaceToken, FaceCounters>,
    drop_reasons: Vec<(ForwardingError, u64)>,
    refusals: u64,
}

impl CountingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn totals(&self) -> FaceCounters {
        self.totals
    }

    pub fn face(&self, face: FaceToken) -> FaceCounters {
        self.faces.get(&face).copied().unwrap_or_default()
    }

    // Interests and Data dropped (or transmissions refused) for this reason, over all faces
    pub fn drops(&self, reason: ForwardingError) -> u64 {
        self.drop_reasons
            .iter()
            .find(|(r, _)| *r == reason)
            .map_or(0, |(_, count)| *count)
    }

    pub fn refusals(&self) -> u64 {
        self.refusals
    }

    fn update<F>(&mut self, face: FaceToken, f: F)
    where
        F: Fn(&mut FaceCounters),
    {
        f(&mut self.totals);
        f(self.faces.entry(face).or_default());
    }

    fn count_drop(&mut self, reason: &ForwardingError) {
        match self.drop_reasons.iter_mut().find(|(r, _)| r == reason) {
            Some((_, count)) => *count += 1,
            None => self.drop_reasons.push((*reason, 1)),
        }
    }
}

impl ForwarderMetrics for CountingMetrics {
    fn interest_received(&mut self, face: FaceToken) {
        self.update(face, |c| c.in_interests += 1);
    }

    fn interest_sent(&mut self, face: FaceToken) {
        self.update(face, |c| c.out_interests += 1);
    }

    fn interest_dropped(&mut self, face: FaceToken, reason: &ForwardingError) {
        self.update(face, |c| c.dropped_interests += 1);
        self.count_drop(reason);
    }

    fn data_received(&mut self, face: FaceToken) {
        self.update(face, |c| c.in_data += 1);
    }

    fn data_sent(&mut self, face: FaceToken, from_cache: bool) {
        self.update(face, |c| {
            c.out_data += 1;
            if from_cache {
                c.out_data_from_cache += 1;
            }
        });
    }

    fn data_dropped(&mut self, face: FaceToken, reason: &ForwardingError) {
        self.update(face, |c| c.dropped_data += 1);
        self.count_drop(reason);
    }

    fn face_refused(&mut self, face: FaceToken, reason: &ForwardingError) {
        self.update(face, |c| c.refused_interests += 1);
        self.refusals += 1;
        self.count_drop(reason);
    }
}
