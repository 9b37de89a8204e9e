pub mod choice;

use alloc::boxed::Box;

use crate::{
    clock::Timestamp,
    config::ForwarderConfig,
    error::ForwardingError,
    face::{FaceError, FaceToken, Faces},
    forwarder::{
        events::{ForwardingEvent, Observers},
        metrics::ForwarderMetrics,
    },
    packet::{Interest, NonceGenerator, Packet},
    tables::{fib::NextHop, pit::PitEntry},
};

pub const BEST_ROUTE: &str = "/localhost/nfd/strategy/best-route";
pub const BROADCAST: &str = "/localhost/nfd/strategy/broadcast";
pub const MULTICAST: &str = "/localhost/nfd/strategy/multicast";
pub const DROP: &str = "/localhost/nfd/strategy/drop";
pub const FANOUT: &str = "/localhost/nfd/strategy/fanout";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Propagated {
    // At least one upstream took the Interest
    Sent,
    Exhausted,
}

/// Decides where an Interest goes once the forwarder has decided that it
/// should go somewhere.
///
/// Strategies see the Interest, its PIT entry and the next hops of the
/// matching FIB entry through [`Propagation`], and transmit with
/// [`Propagation::try_send`]. They never touch the tables directly.
pub trait Strategy {
    fn name(&self) -> &str;

    fn after_receive_interest(&mut self, ctx: &mut Propagation<'_>) -> Propagated;

    // For strategies that keep per-face state
    fn on_face_removed(&mut self, _face: FaceToken) {}
}

/// Everything a strategy may look at or do while propagating one Interest.
pub struct Propagation<'a> {
    pub(crate) in_face: FaceToken,
    pub(crate) interest: &'a Interest,
    pub(crate) entry: &'a mut PitEntry,
    pub(crate) next_hops: &'a [NextHop],
    pub(crate) is_retransmission: bool,
    pub(crate) now: Timestamp,
    pub(crate) lifetime_ms: u64,
    pub(crate) faces: &'a mut Faces,
    pub(crate) metrics: &'a mut dyn ForwarderMetrics,
    pub(crate) observers: &'a mut Observers,
    pub(crate) nonces: &'a mut NonceGenerator,
    pub(crate) config: &'a ForwarderConfig,
    pub(crate) sent: usize,
}

impl<'a> Propagation<'a> {
    pub fn in_face(&self) -> FaceToken {
        self.in_face
    }

    pub fn interest(&self) -> &Interest {
        self.interest
    }

    pub fn entry(&self) -> &PitEntry {
        self.entry
    }

    // Cheapest first
    pub fn next_hops(&self) -> &[NextHop] {
        self.next_hops
    }

    pub fn is_retransmission(&self) -> bool {
        self.is_retransmission
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn is_face_up(&self, face: FaceToken) -> bool {
        self.faces.is_up(face)
    }

    // Never back where it came from, never to a face that is down
    pub fn can_forward_to(&self, face: FaceToken) -> bool {
        face != self.in_face && self.faces.is_up(face)
    }

    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Transmits the Interest on `face` and records the out-record.
    ///
    /// Returns false if the face turned the Interest down: it is gone or
    /// down, it already has as many pending Interests as it may have, or
    /// the send itself failed. Refusal is not an error, the strategy is
    /// expected to try the next candidate.
    pub fn try_send(&mut self, face: FaceToken) -> bool {
        if !self.faces.is_up(face) {
            return self.refuse(face, "face is down");
        }
        if let Some(limit) = self.config.max_pending_per_face {
            // A face that already has our out-record is already counted
            if self.entry.out_record(face).is_none() && self.faces.pending_interests(face) >= limit
            {
                return self.refuse(face, "too many pending interests");
            }
        }

        let nonce = if self.config.refresh_outgoing_nonce {
            self.nonces.next_nonce()
        } else {
            self.interest.nonce
        };
        let mut outgoing = self.interest.clone();
        outgoing.nonce = nonce;
        outgoing.hop_limit = self.interest.hop_limit.map(|hop| hop.saturating_sub(1));

        if let Err(err) = self.faces.send(face, &Packet::Interest(outgoing)) {
            tracing::warn!(face = %face, name = %self.interest.name, error = ?err, "failed to send interest");
            if err == FaceError::Disconnected {
                self.faces.mark_disconnected(face);
            }
            return self.refuse(face, "send failed");
        }

        let is_new = self
            .entry
            .insert_or_update_out_record(face, nonce, self.now, self.lifetime_ms);
        if is_new {
            self.faces.add_pending_interest(face);
        }
        self.metrics.interest_sent(face);
        self.observers.fire(ForwardingEvent::DidSendOutInterest {
            out_face: face,
            name: &self.interest.name,
            nonce,
        });
        self.sent += 1;
        true
    }

    fn refuse(&mut self, face: FaceToken, reason: &'static str) -> bool {
        let err = ForwardingError::FaceRefusal;
        tracing::debug!(face = %face, name = %self.interest.name, reason, error = %err, "face refused interest");
        self.metrics.face_refused(face, &err);
        false
    }
}

/// Sends to the cheapest next hop that accepts the Interest.
///
/// A retransmission first tries the next hops not used yet for this entry,
/// so that an impatient requester gets a chance at another path.
#[derive(Default)]
pub struct BestRoute;

impl Strategy for BestRoute {
    fn name(&self) -> &str {
        BEST_ROUTE
    }

    fn after_receive_interest(&mut self, ctx: &mut Propagation<'_>) -> Propagated {
        if ctx.is_retransmission() {
            for i in 0..ctx.next_hops().len() {
                let face = ctx.next_hops()[i].face;
                if ctx.entry().out_record(face).is_none()
                    && ctx.can_forward_to(face)
                    && ctx.try_send(face)
                {
                    return Propagated::Sent;
                }
            }
        }

        for i in 0..ctx.next_hops().len() {
            let face = ctx.next_hops()[i].face;
            if ctx.can_forward_to(face) && ctx.try_send(face) {
                return Propagated::Sent;
            }
        }
        Propagated::Exhausted
    }
}

/// Sends to every next hop except the one the Interest came from.
#[derive(Default)]
pub struct Broadcast;

impl Strategy for Broadcast {
    fn name(&self) -> &str {
        BROADCAST
    }

    fn after_receive_interest(&mut self, ctx: &mut Propagation<'_>) -> Propagated {
        for i in 0..ctx.next_hops().len() {
            let face = ctx.next_hops()[i].face;
            if ctx.can_forward_to(face) {
                ctx.try_send(face);
            }
        }
        if ctx.sent() > 0 {
            Propagated::Sent
        } else {
            Propagated::Exhausted
        }
    }
}

/// Sends to at most `max_faces` of the cheapest next hops that accept it.
pub struct Fanout {
    max_faces: usize,
}

impl Fanout {
    pub fn new(max_faces: usize) -> Self {
        Self { max_faces }
    }

    pub fn max_faces(&self) -> usize {
        self.max_faces
    }
}

impl Strategy for Fanout {
    fn name(&self) -> &str {
        FANOUT
    }

    fn after_receive_interest(&mut self, ctx: &mut Propagation<'_>) -> Propagated {
        for i in 0..ctx.next_hops().len() {
            if ctx.sent() >= self.max_faces {
                break;
            }
            let face = ctx.next_hops()[i].face;
            if ctx.can_forward_to(face) {
                ctx.try_send(face);
            }
        }
        if ctx.sent() > 0 {
            Propagated::Sent
        } else {
            Propagated::Exhausted
        }
    }
}

/// Never forwards anything.
#[derive(Default)]
pub struct DropAll;

impl Strategy for DropAll {
    fn name(&self) -> &str {
        DROP
    }

    fn after_receive_interest(&mut self, _ctx: &mut Propagation<'_>) -> Propagated {
        Propagated::Exhausted
    }
}

/// A fresh instance of a built-in strategy, by its well-known name.
pub fn by_name(name: &str) -> Option<Box<dyn Strategy>> {
    let name = name.strip_prefix("ndn:").unwrap_or(name);
    let name = name.strip_suffix('/').unwrap_or(name);
    match name {
        BEST_ROUTE => Some(Box::new(BestRoute)),
        BROADCAST | MULTICAST => Some(Box::new(Broadcast)),
        DROP => Some(Box::new(DropAll)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::{
        face::local::{local_face, LocalReceiver},
        forwarder::metrics::CountingMetrics,
        name::Name,
        tables::pit::Pit,
    };

    struct Harness {
        faces: Faces,
        receivers: Vec<LocalReceiver>,
        tokens: Vec<FaceToken>,
        pit: Pit,
        metrics: CountingMetrics,
        observers: Observers,
        nonces: NonceGenerator,
        config: ForwarderConfig,
        interest: Interest,
    }

    impl Harness {
        fn new(face_count: usize) -> Self {
            let mut faces = Faces::new();
            let mut receivers = Vec::new();
            let mut tokens = Vec::new();
            for _ in 0..face_count {
                let (sender, receiver) = local_face();
                tokens.push(faces.add_face(sender).unwrap());
                receivers.push(receiver);
            }
            let interest = Interest::new("/a/b".parse::<Name>().unwrap(), [7; 4]);
            let mut pit = Pit::new(None);
            pit.create(
                &interest.name,
                tokens[0],
                interest.nonce,
                Timestamp::ZERO,
                1000,
                None,
            )
            .unwrap();
            Self {
                faces,
                receivers,
                tokens,
                pit,
                metrics: CountingMetrics::new(),
                observers: Observers::default(),
                nonces: NonceGenerator::default(),
                config: ForwarderConfig::default(),
                interest,
            }
        }

        fn hops(&self, costs: &[(usize, u32)]) -> Vec<NextHop> {
            let mut hops: Vec<NextHop> = costs
                .iter()
                .map(|(i, cost)| NextHop {
                    cost: *cost,
                    face: self.tokens[*i],
                })
                .collect();
            hops.sort();
            hops
        }

        fn run(&mut self, strategy: &mut dyn Strategy, hops: &[NextHop], retx: bool) -> Propagated {
            let entry = self.pit.find_mut(&self.interest.name).unwrap();
            let mut ctx = Propagation {
                in_face: self.tokens[0],
                interest: &self.interest,
                entry,
                next_hops: hops,
                is_retransmission: retx,
                now: Timestamp::ZERO,
                lifetime_ms: 1000,
                faces: &mut self.faces,
                metrics: &mut self.metrics,
                observers: &mut self.observers,
                nonces: &mut self.nonces,
                config: &self.config,
                sent: 0,
            };
            strategy.after_receive_interest(&mut ctx)
        }

        fn sent_on(&self, i: usize) -> usize {
            self.receivers[i].pending()
        }
    }

    #[test]
    fn test_best_route_picks_cheapest_accepting_face() {
        let mut h = Harness::new(4);
        let hops = h.hops(&[(0, 1), (1, 300), (2, 100), (3, 200)]);

        assert_eq!(h.run(&mut BestRoute, &hops, false), Propagated::Sent);
        // Face 0 is cheapest but is where the Interest came from
        assert_eq!(h.sent_on(0), 0);
        assert_eq!(h.sent_on(2), 1);
        assert_eq!(h.sent_on(3), 0);

        // Face 2 going down makes the next cheapest one take over
        h.receivers[2].set_up(false);
        assert_eq!(h.run(&mut BestRoute, &hops, false), Propagated::Sent);
        assert_eq!(h.sent_on(3), 1);
        assert_eq!(h.metrics.refusals(), 0);
    }

    #[test]
    fn test_best_route_retransmission_prefers_unused_face() {
        let mut h = Harness::new(3);
        let hops = h.hops(&[(1, 100), (2, 200)]);

        h.run(&mut BestRoute, &hops, false);
        h.run(&mut BestRoute, &hops, true);
        assert_eq!(h.sent_on(1), 1);
        assert_eq!(h.sent_on(2), 1);

        // All used, falls back to the cheapest again
        h.run(&mut BestRoute, &hops, true);
        assert_eq!(h.sent_on(1), 2);
        let entry = h.pit.find(&h.interest.name).unwrap();
        assert_eq!(entry.out_record(h.tokens[1]).unwrap().retransmissions, 1);
    }

    #[test]
    fn test_broadcast_and_fanout() {
        let mut h = Harness::new(4);
        let hops = h.hops(&[(0, 10), (1, 30), (2, 20), (3, 40)]);

        assert_eq!(h.run(&mut Broadcast, &hops, false), Propagated::Sent);
        assert_eq!((h.sent_on(0), h.sent_on(1), h.sent_on(2), h.sent_on(3)), (0, 1, 1, 1));

        assert_eq!(h.run(&mut Fanout::new(2), &hops, false), Propagated::Sent);
        assert_eq!((h.sent_on(1), h.sent_on(2), h.sent_on(3)), (2, 2, 1));
        assert_eq!(h.metrics.totals().out_interests, 5);
    }

    #[test]
    fn test_exhaustion_and_refusals() {
        let mut h = Harness::new(3);
        let hops = h.hops(&[(1, 10), (2, 20)]);

        assert_eq!(h.run(&mut DropAll, &hops, false), Propagated::Exhausted);
        assert_eq!(h.run(&mut BestRoute, &[], false), Propagated::Exhausted);

        // A pending limit of 1 lets each face carry one entry
        h.config.max_pending_per_face = Some(1);
        h.faces.add_pending_interest(h.tokens[1]);
        h.faces.add_pending_interest(h.tokens[2]);
        assert_eq!(h.run(&mut Broadcast, &hops, false), Propagated::Exhausted);
        assert_eq!(h.metrics.refusals(), 2);
        assert!(h.pit.find(&h.interest.name).unwrap().out_records().is_empty());
    }

    #[test]
    fn test_forwarded_copy_is_rewritten() {
        let mut h = Harness::new(2);
        h.interest = h.interest.clone().with_hop_limit(5);
        h.config.refresh_outgoing_nonce = true;
        let hops = h.hops(&[(1, 10)]);

        h.run(&mut BestRoute, &hops, false);
        match h.receivers[1].try_recv() {
            Ok(Some(Packet::Interest(sent))) => {
                assert_eq!(sent.hop_limit, Some(4));
                assert_ne!(sent.nonce, [7; 4]);
                let entry = h.pit.find(&sent.name).unwrap();
                assert_eq!(entry.out_record(h.tokens[1]).unwrap().nonce, sent.nonce);
                assert!(entry.has_seen_nonce(sent.nonce));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_by_name() {
        assert_eq!(by_name(BEST_ROUTE).unwrap().name(), BEST_ROUTE);
        assert_eq!(by_name("ndn:/localhost/nfd/strategy/multicast").unwrap().name(), BROADCAST);
        assert_eq!(by_name("/localhost/nfd/strategy/drop/").unwrap().name(), DROP);
        assert!(by_name("/localhost/nfd/strategy/unknown").is_none());
    }
}
