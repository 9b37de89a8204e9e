//! A discrete-event network of forwarders.
//!
//! Every node is a [`Forwarder`] driven by one shared manual clock. Links
//! and applications are local faces; packets they emit are turned into
//! timed deliveries on a single event queue, so a run is deterministic.

mod apps;

pub use apps::{ConsumerCbr, Producer};

use std::{cell::RefCell, collections::BTreeSet, rc::Rc};

use crate::{
    clock::{ManualClock, Timestamp},
    config::ForwarderConfig,
    face::{local::local_face, local::LocalReceiver, FaceToken},
    forwarder::{metrics::CountingMetrics, Forwarder},
    name::Name,
    packet::Packet,
    platform::sha::Sha256Hasher,
    scheduler::{EventQueue, PitTimer, Scheduler, TimerId},
    store::ReferenceContentStore,
    strategy::{self, Strategy},
};

use apps::App;

pub type SimForwarder =
    Forwarder<ManualClock, ReferenceContentStore<Sha256Hasher>, CountingMetrics, SimScheduler>;

const CONTENT_STORE_CAPACITY: usize = 1024;
const PAYLOAD_SIZE: usize = 1024;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppId(usize);

enum SimEvent {
    Deliver {
        node: NodeId,
        face: FaceToken,
        packet: Packet,
    },
    Timer {
        node: NodeId,
        timer: PitTimer,
    },
    AppTick {
        app: AppId,
    },
}

#[derive(Default)]
struct SimQueue {
    events: EventQueue<SimEvent>,
    // Sequence numbers of timers that were not cancelled
    live_timers: BTreeSet<u64>,
}

/// Puts PIT timers of one node on the shared event queue.
pub struct SimScheduler {
    node: NodeId,
    queue: Rc<RefCell<SimQueue>>,
}

impl Scheduler for SimScheduler {
    fn schedule_at(&mut self, at: Timestamp, timer: PitTimer) -> TimerId {
        let mut queue = self.queue.borrow_mut();
        let seq = queue.events.push(
            at,
            SimEvent::Timer {
                node: self.node,
                timer,
            },
        );
        queue.live_timers.insert(seq);
        TimerId(seq)
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        self.queue.borrow_mut().live_timers.remove(&id.id())
    }
}

#[derive(Copy, Clone)]
enum PortKind {
    Link {
        peer: NodeId,
        peer_face: FaceToken,
        delay_ms: u64,
    },
    App(AppId),
}

// The receiving end of a face the forwarder sends on
struct Port {
    face: FaceToken,
    receiver: LocalReceiver,
    kind: PortKind,
}

struct Node {
    name: String,
    forwarder: SimForwarder,
    ports: Vec<Port>,
}

struct AppSlot {
    node: NodeId,
    face: FaceToken,
    app: App,
}

pub struct Network {
    clock: ManualClock,
    queue: Rc<RefCell<SimQueue>>,
    nodes: Vec<Node>,
    apps: Vec<AppSlot>,
    config: ForwarderConfig,
}

impl Default for Network {
    fn default() -> Self {
        Self::new(ForwarderConfig::default())
    }
}

impl Network {
    // Every node gets the same forwarder configuration
    pub fn new(config: ForwarderConfig) -> Self {
        Self {
            clock: ManualClock::new(Timestamp::ZERO),
            queue: Rc::new(RefCell::new(SimQueue::default())),
            nodes: Vec::new(),
            apps: Vec::new(),
            config,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.get()
    }

    pub fn add_node(&mut self, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        let scheduler = SimScheduler {
            node: id,
            queue: Rc::clone(&self.queue),
        };
        let store = ReferenceContentStore::new(CONTENT_STORE_CAPACITY, None, Sha256Hasher::new());
        let forwarder = Forwarder::new(
            self.clock.clone(),
            store,
            CountingMetrics::new(),
            scheduler,
            self.config.clone(),
        )
        .with_nonce_seed(id.0 as u32 + 1);

        self.nodes.push(Node {
            name: name.to_string(),
            forwarder,
            ports: Vec::new(),
        });
        id
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(NodeId)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        (0..self.nodes.len()).map(NodeId).collect()
    }

    pub fn node_name(&self, node: NodeId) -> &str {
        &self.nodes[node.0].name
    }

    /// Connects two nodes with a point-to-point link of the given one-way delay.
    ///
    /// Returns the face on `a` and the face on `b`.
    pub fn add_link(&mut self, a: NodeId, b: NodeId, delay_ms: u64) -> Option<(FaceToken, FaceToken)> {
        let (a_sender, a_receiver) = local_face();
        let (b_sender, b_receiver) = local_face();
        let a_face = self.nodes[a.0].forwarder.add_face(a_sender)?;
        let b_face = match self.nodes[b.0].forwarder.add_face(b_sender) {
            Some(face) => face,
            None => {
                self.nodes[a.0].forwarder.remove_face(a_face);
                return None;
            }
        };

        self.nodes[a.0].ports.push(Port {
            face: a_face,
            receiver: a_receiver,
            kind: PortKind::Link {
                peer: b,
                peer_face: b_face,
                delay_ms,
            },
        });
        self.nodes[b.0].ports.push(Port {
            face: b_face,
            receiver: b_receiver,
            kind: PortKind::Link {
                peer: a,
                peer_face: a_face,
                delay_ms,
            },
        });
        tracing::debug!(a = %self.nodes[a.0].name, b = %self.nodes[b.0].name, delay_ms, "link added");
        Some((a_face, b_face))
    }

    // The face on `node` that leads to `peer`
    pub fn face_between(&self, node: NodeId, peer: NodeId) -> Option<FaceToken> {
        self.nodes[node.0].ports.iter().find_map(|port| match port.kind {
            PortKind::Link { peer: p, .. } if p == peer => Some(port.face),
            _ => None,
        })
    }

    pub fn add_route(&mut self, node: NodeId, peer: NodeId, prefix: &Name, cost: u32) -> bool {
        match self.face_between(node, peer) {
            Some(face) => {
                self.nodes[node.0]
                    .forwarder
                    .register_name_prefix_for_forwarding(prefix, face, cost);
                true
            }
            None => false,
        }
    }

    /// Adds a consumer sending `frequency_hz` Interests per second under
    /// `prefix` from `start_ms` until `stop_ms`.
    pub fn add_consumer(
        &mut self,
        node: NodeId,
        prefix: &Name,
        frequency_hz: f64,
        start_ms: u64,
        stop_ms: u64,
    ) -> Option<AppId> {
        let seed = self.apps.len() as u32 + 1;
        let consumer = ConsumerCbr::new(prefix.clone(), frequency_hz, Timestamp::from_ms(stop_ms), seed);
        let app = self.add_app(node, App::Consumer(consumer))?;
        if start_ms < stop_ms {
            self.queue
                .borrow_mut()
                .events
                .push(Timestamp::from_ms(start_ms), SimEvent::AppTick { app });
        }
        Some(app)
    }

    // Sets the lifetime of the Interests the consumer sends from now on
    pub fn set_consumer_lifetime(&mut self, app: AppId, lifetime_ms: u64) {
        if let App::Consumer(consumer) = &mut self.apps[app.0].app {
            consumer.set_lifetime(lifetime_ms);
        }
    }

    // The producer is reachable through a zero-cost route on its node
    pub fn add_producer(&mut self, node: NodeId, prefix: &Name) -> Option<AppId> {
        let app = self.add_app(node, App::Producer(Producer::new(prefix.clone(), PAYLOAD_SIZE)))?;
        let face = self.apps[app.0].face;
        self.nodes[node.0]
            .forwarder
            .register_name_prefix_for_forwarding(prefix, face, 0);
        Some(app)
    }

    pub fn consumer(&self, app: AppId) -> Option<&ConsumerCbr> {
        match &self.apps[app.0].app {
            App::Consumer(consumer) => Some(consumer),
            App::Producer(_) => None,
        }
    }

    pub fn producer(&self, app: AppId) -> Option<&Producer> {
        match &self.apps[app.0].app {
            App::Producer(producer) => Some(producer),
            App::Consumer(_) => None,
        }
    }

    pub fn consumer_received(&self, app: AppId) -> u64 {
        self.consumer(app).map_or(0, |consumer| consumer.received())
    }

    pub fn app_face(&self, app: AppId) -> FaceToken {
        self.apps[app.0].face
    }

    pub fn forwarder(&self, node: NodeId) -> &SimForwarder {
        &self.nodes[node.0].forwarder
    }

    pub fn forwarder_mut(&mut self, node: NodeId) -> &mut SimForwarder {
        &mut self.nodes[node.0].forwarder
    }

    pub fn node_metrics(&self, node: NodeId) -> &CountingMetrics {
        self.nodes[node.0].forwarder.metrics()
    }

    // Interests sent from `node` on its link to `peer`
    pub fn out_interests(&self, node: NodeId, peer: NodeId) -> u64 {
        self.face_between(node, peer)
            .map_or(0, |face| self.node_metrics(node).face(face).out_interests)
    }

    /// Binds a strategy known by its name under `prefix` on one node.
    ///
    /// Returns false if no strategy goes by that name.
    pub fn install_strategy(&mut self, node: NodeId, prefix: &Name, strategy_name: &str) -> bool {
        self.install_strategy_on(&[node], prefix, strategy_name)
    }

    pub fn install_strategy_on(&mut self, nodes: &[NodeId], prefix: &Name, strategy_name: &str) -> bool {
        if strategy::by_name(strategy_name).is_none() {
            return false;
        }
        self.install_strategy_with(nodes, prefix, || {
            strategy::by_name(strategy_name).unwrap_or_else(|| Box::new(strategy::DropAll))
        });
        true
    }

    pub fn install_strategy_all(&mut self, prefix: &Name, strategy_name: &str) -> bool {
        let nodes = self.node_ids();
        self.install_strategy_on(&nodes, prefix, strategy_name)
    }

    // Each node gets its own instance from `factory`
    pub fn install_strategy_with<F>(&mut self, nodes: &[NodeId], prefix: &Name, factory: F)
    where
        F: Fn() -> Box<dyn Strategy>,
    {
        for node in nodes {
            self.nodes[node.0]
                .forwarder
                .strategy_choice_mut()
                .bind(prefix, factory());
        }
    }

    /// Processes every event due before `stop_ms` and leaves the clock there.
    ///
    /// Returns the number of events processed.
    pub fn run_until(&mut self, stop_ms: u64) -> usize {
        let stop = Timestamp::from_ms(stop_ms);
        let mut processed = 0;
        loop {
            // The queue borrow must end before a forwarder gets to schedule timers
            let next = {
                let mut queue = self.queue.borrow_mut();
                match queue.events.peek_time() {
                    Some(at) if at < stop => queue.events.pop(),
                    _ => None,
                }
            };
            let (at, seq, event) = match next {
                Some(next) => next,
                None => break,
            };
            if at > self.clock.get() {
                self.clock.set(at);
            }
            self.dispatch(seq, event);
            processed += 1;
        }
        if stop > self.clock.get() {
            self.clock.set(stop);
        }
        processed
    }

    fn add_app(&mut self, node: NodeId, app: App) -> Option<AppId> {
        let id = AppId(self.apps.len());
        let (sender, receiver) = local_face();
        let face = self.nodes[node.0].forwarder.add_face(sender)?;
        self.nodes[node.0].ports.push(Port {
            face,
            receiver,
            kind: PortKind::App(id),
        });
        self.apps.push(AppSlot { node, face, app });
        Some(id)
    }

    fn dispatch(&mut self, seq: u64, event: SimEvent) {
        let now = self.clock.get();
        match event {
            SimEvent::Deliver { node, face, packet } => {
                let forwarder = &mut self.nodes[node.0].forwarder;
                let name = packet.name().clone();
                let result = match packet {
                    Packet::Interest(interest) => forwarder.on_interest(face, interest).map(|_| ()),
                    Packet::Data(data) => forwarder.on_data(face, data).map(|_| ()),
                };
                if let Err(err) = result {
                    tracing::trace!(node = %self.nodes[node.0].name, face = %face, name = %name, error = %err, "packet not forwarded");
                }
                self.drain(node, now);
            }
            SimEvent::Timer { node, timer } => {
                let live = self.queue.borrow_mut().live_timers.remove(&seq);
                if live {
                    self.nodes[node.0].forwarder.on_timer(timer);
                    self.drain(node, now);
                }
            }
            SimEvent::AppTick { app } => {
                let slot = &mut self.apps[app.0];
                let (node, face) = (slot.node, slot.face);
                let (interest, next) = match &mut slot.app {
                    App::Consumer(consumer) => consumer.tick(now),
                    App::Producer(_) => (None, None),
                };
                if let Some(next) = next {
                    self.queue
                        .borrow_mut()
                        .events
                        .push(next, SimEvent::AppTick { app });
                }
                if let Some(interest) = interest {
                    let name = interest.name.clone();
                    if let Err(err) = self.nodes[node.0].forwarder.on_interest(face, interest) {
                        tracing::trace!(node = %self.nodes[node.0].name, face = %face, name = %name, error = %err, "packet not forwarded");
                    }
                    self.drain(node, now);
                }
            }
        }
    }

    // Turns whatever the forwarder of `node` sent into future events
    fn drain(&mut self, node: NodeId, now: Timestamp) {
        let Self {
            nodes, apps, queue, ..
        } = self;
        for port in nodes[node.0].ports.iter_mut() {
            while let Ok(Some(packet)) = port.receiver.try_recv() {
                match port.kind {
                    PortKind::Link {
                        peer,
                        peer_face,
                        delay_ms,
                    } => {
                        queue.borrow_mut().events.push(
                            now.adding(delay_ms),
                            SimEvent::Deliver {
                                node: peer,
                                face: peer_face,
                                packet,
                            },
                        );
                    }
                    PortKind::App(app) => {
                        if let Some(reply) = apps[app.0].app.on_packet(&packet) {
                            queue.borrow_mut().events.push(
                                now,
                                SimEvent::Deliver {
                                    node,
                                    face: port.face,
                                    packet: reply,
                                },
                            );
                        }
                    }
                }
            }
        }
    }
}
