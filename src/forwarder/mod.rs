pub mod events;
pub mod metrics;

use alloc::{boxed::Box, vec::Vec};

use crate::{
    clock::{Clock, Timestamp},
    config::ForwarderConfig,
    error::ForwardingError,
    face::{Face, FaceError, FaceToken, Faces},
    forwarder::{
        events::{ForwardingEvent, ForwardingObserver, Observers},
        metrics::ForwarderMetrics,
    },
    name::Name,
    packet::{Data, Interest, NonceGenerator, Packet},
    scheduler::{PitTimer, Scheduler, TimerQueue},
    store::ContentStore,
    strategy::{choice::StrategyChoice, Propagated, Propagation},
    tables::{dead_nonce::DeadNonceList, fib::Fib, pit::Pit, pit::PitEntry},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InterestDisposition {
    Forwarded,
    // Aggregated into an entry that is already waiting on an upstream
    Suppressed,
    SatisfiedFromCache,
    // Recorded in the PIT but not sent anywhere
    Pending,
}

/// The forwarding engine of one node.
///
/// Owns the tables and the faces. The host feeds it packets with
/// [`Self::on_interest`] and [`Self::on_data`] and expired timers with
/// [`Self::on_timer`], one at a time. Nothing here blocks or spawns.
pub struct Forwarder<C, CS, M, S>
where
    C: Clock,
    CS: ContentStore,
    M: ForwarderMetrics,
    S: Scheduler,
{
    faces: Faces,
    fib: Fib,
    pit: Pit,
    dead_nonces: Option<DeadNonceList>,
    content_store: CS,
    strategies: StrategyChoice,
    clock: C,
    metrics: M,
    scheduler: S,
    observers: Observers,
    nonces: NonceGenerator,
    config: ForwarderConfig,
}

impl<C, CS, M, S> Forwarder<C, CS, M, S>
where
    C: Clock,
    CS: ContentStore,
    M: ForwarderMetrics,
    S: Scheduler,
{
    pub fn new(clock: C, content_store: CS, metrics: M, scheduler: S, config: ForwarderConfig) -> Self {
        Self {
            faces: Faces::new(),
            fib: Fib::new(),
            pit: Pit::new(config.pit_capacity),
            dead_nonces: config.dead_nonce_lifetime_ms.map(DeadNonceList::new),
            content_store,
            strategies: StrategyChoice::default(),
            clock,
            metrics,
            scheduler,
            observers: Observers::default(),
            nonces: NonceGenerator::default(),
            config,
        }
    }

    pub fn with_nonce_seed(mut self, seed: u32) -> Self {
        self.nonces = NonceGenerator::new(seed);
        self
    }

    pub fn add_face<F>(&mut self, face: F) -> Option<FaceToken>
    where
        F: Face + 'static,
    {
        let token = self.faces.add_face(face)?;
        tracing::debug!(face = %token, "face added");
        Some(token)
    }

    /// Forgets the face and every trace of it in the tables.
    ///
    /// PIT entries left with no requester are erased, routes through the face
    /// are withdrawn and the strategies are told so they can drop any state
    /// they keep for it.
    pub fn remove_face(&mut self, token: FaceToken) -> bool {
        if !self.faces.remove_face(token) {
            return false;
        }
        let now = self.clock.now();
        self.fib.remove_face(token);
        let (erased, lost_out_records) = self.pit.remove_face(token);
        let erased_count = erased.len();
        for mut entry in erased {
            self.retire(&mut entry, now);
        }
        self.strategies.face_removed(token);
        tracing::debug!(face = %token, erased = erased_count, lost_out_records, "face removed");
        true
    }

    pub fn has_face(&self, token: FaceToken) -> bool {
        self.faces.contains(token)
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn face_tokens(&self) -> Vec<FaceToken> {
        self.faces.tokens().collect()
    }

    pub fn is_face_up(&self, token: FaceToken) -> bool {
        self.faces.is_up(token)
    }

    // Number of PIT entries with an out-record on this face
    pub fn pending_interests(&self, token: FaceToken) -> usize {
        self.faces.pending_interests(token)
    }

    // Faces that reported a disconnect while sending, for the host to remove
    pub fn take_disconnected_faces(&mut self) -> Vec<FaceToken> {
        self.faces.take_disconnected()
    }

    // Interests under "prefix" will be forwarded to "forward_to", with "cost"
    //  used for prioritisation. Call this again to update the cost.
    pub fn register_name_prefix_for_forwarding(
        &mut self,
        prefix: &Name,
        forward_to: FaceToken,
        cost: u32,
    ) {
        self.fib.register_prefix(prefix, forward_to, cost)
    }

    pub fn unregister_name_prefix_for_forwarding(
        &mut self,
        prefix: &Name,
        forward_to: FaceToken,
    ) -> bool {
        self.fib.unregister_prefix(prefix, forward_to)
    }

    pub fn add_observer<O>(&mut self, observer: O)
    where
        O: ForwardingObserver + 'static,
    {
        self.observers.add(Box::new(observer));
    }

    pub fn fib(&self) -> &Fib {
        &self.fib
    }

    pub fn pit(&self) -> &Pit {
        &self.pit
    }

    pub fn dead_nonces(&self) -> Option<&DeadNonceList> {
        self.dead_nonces.as_ref()
    }

    pub fn content_store(&self) -> &CS {
        &self.content_store
    }

    pub fn content_store_mut(&mut self) -> &mut CS {
        &mut self.content_store
    }

    pub fn strategy_choice(&self) -> &StrategyChoice {
        &self.strategies
    }

    pub fn strategy_choice_mut(&mut self) -> &mut StrategyChoice {
        &mut self.strategies
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut M {
        &mut self.metrics
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    pub fn on_interest(
        &mut self,
        in_face: FaceToken,
        interest: Interest,
    ) -> Result<InterestDisposition, ForwardingError> {
        let now = self.clock.now();
        self.metrics.interest_received(in_face);

        let result = self.process_interest(in_face, &interest, now);
        match &result {
            Ok(disposition) => {
                tracing::trace!(face = %in_face, name = %interest.name, ?disposition, "interest processed")
            }
            Err(err) => {
                tracing::debug!(face = %in_face, name = %interest.name, error = %err, "interest dropped");
                self.metrics.interest_dropped(in_face, err);
            }
        }
        result
    }

    /// Handles Data that arrived from the network on `in_face`.
    ///
    /// Returns the number of faces the Data was delivered to. Data served
    /// from the content store never comes through here: a cache hit is
    /// satisfied inside [`Self::on_interest`] through the same delivery
    /// path, with no arrival face.
    pub fn on_data(&mut self, in_face: FaceToken, data: Data) -> Result<usize, ForwardingError> {
        let now = self.clock.now();
        self.metrics.data_received(in_face);

        if self.pit.find(&data.name).is_none() {
            let err = ForwardingError::UnsolicitedData;
            self.observers
                .fire(ForwardingEvent::DidReceiveUnsolicitedData {
                    in_face,
                    name: &data.name,
                });
            tracing::debug!(face = %in_face, name = %data.name, "unsolicited data");
            self.metrics.data_dropped(in_face, &err);
            // For security we usually drop these, but a host may trust its faces
            if self.config.cache_unsolicited_data && !data.no_cache {
                self.content_store.insert(data, now);
            }
            return Err(err);
        }

        let (delivered, entry_no_cache) = self.satisfy(&data.name, Some(in_face), &data, now);

        if self.config.cache_data && !data.no_cache && !entry_no_cache {
            self.content_store.insert(data, now);
        }
        Ok(delivered)
    }

    /// Handles an expired PIT timer, returns true if an entry timed out.
    ///
    /// Timers of entries that were satisfied or replaced since are ignored.
    pub fn on_timer(&mut self, timer: PitTimer) -> bool {
        let now = self.clock.now();
        let entry = match self.pit.find_mut(&timer.name) {
            Some(entry) if entry.generation() == timer.generation => entry,
            _ => return false,
        };
        if entry.expiry() > now {
            // The entry was extended and this firing is stale
            self.arm_timer(&timer.name);
            return false;
        }
        entry.take_timer();

        self.observers
            .fire(ForwardingEvent::WillEraseTimedOutPendingInterest { name: &timer.name });
        if let Some(mut entry) = self.pit.erase(&timer.name) {
            self.retire(&mut entry, now);
        }
        true
    }

    fn process_interest(
        &mut self,
        in_face: FaceToken,
        interest: &Interest,
        now: Timestamp,
    ) -> Result<InterestDisposition, ForwardingError> {
        // Interest must have a non-empty name
        if interest.name.is_empty() {
            return Err(ForwardingError::InvalidName);
        }

        // We drop packets with a hop limit of 0. With a hop limit of 1 we will
        //  only try to satisfy the interest from the content store, but not forward.
        // If no hop limit is present we always accept the interest.
        let is_last_hop = match interest.hop_limit {
            Some(0) => return Err(ForwardingError::HopLimitExceeded),
            Some(hop) => hop == 1,
            None => false,
        };

        let lifetime_ms = interest
            .lifetime_ms
            .unwrap_or(self.config.default_interest_lifetime_ms);

        if self.pit.find(&interest.name).is_none() {
            self.process_new_interest(in_face, interest, now, lifetime_ms, is_last_hop)
        } else {
            self.process_similar_interest(in_face, interest, now, lifetime_ms, is_last_hop)
        }
    }

    fn process_new_interest(
        &mut self,
        in_face: FaceToken,
        interest: &Interest,
        now: Timestamp,
        lifetime_ms: u64,
        is_last_hop: bool,
    ) -> Result<InterestDisposition, ForwardingError> {
        // The entry may be gone, but the interest could still be looping
        if let Some(dead_nonces) = &self.dead_nonces {
            if dead_nonces.contains(&interest.name, interest.nonce, now) {
                self.observers
                    .fire(ForwardingEvent::DidReceiveDuplicateInterest {
                        in_face,
                        name: &interest.name,
                        nonce: interest.nonce,
                    });
                return Err(ForwardingError::DuplicateInterest);
            }
        }

        let fib_prefix = self.fib.lookup(&interest.name).map(|e| e.prefix.clone());
        match self.pit.create(
            &interest.name,
            in_face,
            interest.nonce,
            now,
            lifetime_ms,
            fib_prefix,
        ) {
            Ok(entry) => {
                if interest.no_cache {
                    entry.set_no_cache();
                }
            }
            Err(err) => {
                self.observers
                    .fire(ForwardingEvent::FailedToCreatePitEntry {
                        in_face,
                        name: &interest.name,
                    });
                return Err(err.into());
            }
        }
        self.observers.fire(ForwardingEvent::DidCreatePitEntry {
            in_face,
            name: &interest.name,
        });
        self.arm_timer(&interest.name);

        if let Some(data) = self.content_store.find(&interest.name, now) {
            // Served through the same path as network Data, just with no arrival face
            self.satisfy(&interest.name, None, &data, now);
            return Ok(InterestDisposition::SatisfiedFromCache);
        }

        if is_last_hop {
            return Ok(InterestDisposition::Pending);
        }
        self.propagate(in_face, interest, now, lifetime_ms, false)
    }

    fn process_similar_interest(
        &mut self,
        in_face: FaceToken,
        interest: &Interest,
        now: Timestamp,
        lifetime_ms: u64,
        is_last_hop: bool,
    ) -> Result<InterestDisposition, ForwardingError> {
        let entry = match self.pit.find_mut(&interest.name) {
            Some(entry) => entry,
            None => return Ok(InterestDisposition::Pending),
        };

        // A nonce we have already seen for this name means the interest
        //  looped or was duplicated on the way, either way we have handled it.
        if entry.has_seen_nonce(interest.nonce) {
            self.observers
                .fire(ForwardingEvent::DidReceiveDuplicateInterest {
                    in_face,
                    name: &interest.name,
                    nonce: interest.nonce,
                });
            return Err(ForwardingError::DuplicateInterest);
        }

        let is_retransmission = self.config.detect_retransmissions
            && entry.is_retransmission(in_face, interest.nonce);
        // An upstream is already working on it, unless the requester is impatient
        let suppress = !is_retransmission && entry.has_unexpired_out_record(now);

        if interest.no_cache {
            entry.set_no_cache();
        }
        if entry.insert_or_update_in_record(in_face, interest.nonce, now, lifetime_ms) {
            self.arm_timer(&interest.name);
        }

        if suppress {
            self.observers
                .fire(ForwardingEvent::DidSuppressSimilarInterest {
                    in_face,
                    name: &interest.name,
                });
            return Ok(InterestDisposition::Suppressed);
        }
        if is_last_hop {
            return Ok(InterestDisposition::Pending);
        }

        self.observers
            .fire(ForwardingEvent::DidForwardSimilarInterest {
                in_face,
                name: &interest.name,
            });
        self.propagate(in_face, interest, now, lifetime_ms, is_retransmission)
    }

    fn propagate(
        &mut self,
        in_face: FaceToken,
        interest: &Interest,
        now: Timestamp,
        lifetime_ms: u64,
        is_retransmission: bool,
    ) -> Result<InterestDisposition, ForwardingError> {
        let entry = match self.pit.find_mut(&interest.name) {
            Some(entry) => entry,
            None => return Ok(InterestDisposition::Pending),
        };

        // Prefer the FIB entry matched at creation, a route may have appeared since
        let fib = &self.fib;
        let next_hops = match entry
            .fib_prefix()
            .and_then(|prefix| fib.get(prefix))
            .or_else(|| fib.lookup(&interest.name))
        {
            Some(fib_entry) => fib_entry.next_hops.as_slice(),
            None => &[],
        };

        let outcome = match self.strategies.find_effective_mut(&interest.name) {
            Some(strategy) => {
                let mut ctx = Propagation {
                    in_face,
                    interest,
                    entry,
                    next_hops,
                    is_retransmission,
                    now,
                    lifetime_ms,
                    faces: &mut self.faces,
                    metrics: &mut self.metrics,
                    observers: &mut self.observers,
                    nonces: &mut self.nonces,
                    config: &self.config,
                    sent: 0,
                };
                let outcome = strategy.after_receive_interest(&mut ctx);
                tracing::trace!(
                    strategy = strategy.name(),
                    name = %interest.name,
                    sent = ctx.sent,
                    ?outcome,
                    "strategy done"
                );
                outcome
            }
            None => Propagated::Exhausted,
        };

        match outcome {
            Propagated::Sent => Ok(InterestDisposition::Forwarded),
            // Repeated failure is expected for retransmissions, so we stay quiet
            Propagated::Exhausted
                if is_retransmission && !self.config.report_exhausted_retransmissions =>
            {
                Ok(InterestDisposition::Pending)
            }
            Propagated::Exhausted => {
                self.observers
                    .fire(ForwardingEvent::DidExhaustForwardingOptions {
                        in_face,
                        name: &interest.name,
                    });
                Err(ForwardingError::ForwardingExhausted)
            }
        }
    }

    // Delivers the Data to every requester of the entry except the face it came
    //  from, then erases the entry. Returns the number of deliveries and whether
    //  a requester asked for the Data not to be cached.
    fn satisfy(
        &mut self,
        entry_name: &Name,
        in_face: Option<FaceToken>,
        data: &Data,
        now: Timestamp,
    ) -> (usize, bool) {
        self.observers
            .fire(ForwardingEvent::WillSatisfyPendingInterest {
                in_face,
                name: entry_name,
            });
        let mut entry = match self.pit.erase(entry_name) {
            Some(entry) => entry,
            None => return (0, false),
        };
        self.retire(&mut entry, now);

        let from_cache = in_face.is_none();
        let packet = Packet::Data(data.clone());
        let mut delivered = 0;
        for record in entry.in_records() {
            // Never send back to the same face
            if Some(record.face) == in_face {
                continue;
            }
            match self.faces.send(record.face, &packet) {
                Ok(()) => {
                    delivered += 1;
                    self.metrics.data_sent(record.face, from_cache);
                    self.observers.fire(ForwardingEvent::DidSendOutData {
                        out_face: record.face,
                        name: &data.name,
                        from_cache,
                    });
                }
                Err(err) => {
                    tracing::warn!(face = %record.face, name = %data.name, error = ?err, "failed to send data");
                    if err == FaceError::Disconnected {
                        self.faces.mark_disconnected(record.face);
                    }
                }
            }
        }
        (delivered, entry.no_cache())
    }

    // (Re)arms the expiry timer of the entry, cancelling the previous one
    fn arm_timer(&mut self, name: &Name) {
        let entry = match self.pit.find_mut(name) {
            Some(entry) => entry,
            None => return,
        };
        if let Some(previous) = entry.take_timer() {
            self.scheduler.cancel(previous);
        }
        let timer = PitTimer {
            name: name.clone(),
            generation: entry.generation(),
        };
        let id = self.scheduler.schedule_at(entry.expiry(), timer);
        entry.replace_timer(Some(id));
    }

    // Releases everything an entry held once it is out of the PIT
    fn retire(&mut self, entry: &mut PitEntry, now: Timestamp) {
        if let Some(timer) = entry.take_timer() {
            self.scheduler.cancel(timer);
        }
        for record in entry.out_records() {
            self.faces.release_pending_interest(record.face);
        }
        if let Some(dead_nonces) = self.dead_nonces.as_mut() {
            // Every erasure passes through here, so expired nonces go as new ones arrive
            dead_nonces.prune(now);
            for nonce in entry.seen_nonces() {
                dead_nonces.insert(entry.name(), *nonce, now);
            }
        }
    }
}

impl<C, CS, M> Forwarder<C, CS, M, TimerQueue>
where
    C: Clock,
    CS: ContentStore,
    M: ForwarderMetrics,
{
    // Runs every timer that is due, returns how many entries timed out
    pub fn process_timers(&mut self) -> usize {
        let now = self.clock.now();
        let mut expired = 0;
        while let Some(timer) = self.scheduler.pop_due(now) {
            if self.on_timer(timer) {
                expired += 1;
            }
        }
        expired
    }

    pub fn next_deadline(&mut self) -> Option<Timestamp> {
        self.scheduler.next_deadline()
    }
}
