use reto_strategy::{
    platform::sim::{Network, NodeId},
    strategy::{DropAll, BROADCAST},
    Name, Propagated, Propagation, Strategy,
};

// Two consumers, each with a cheap and an expensive way out:
//
//        B1          B2
//  200 /          100 /
//    A1            A2
//  100 \          200 \
//        C1          C2
struct Topology {
    net: Network,
    a1: NodeId,
    a2: NodeId,
    b1: NodeId,
    b2: NodeId,
    c1: NodeId,
    c2: NodeId,
}

impl Topology {
    fn new() -> Self {
        let mut net = Network::default();
        let a1 = net.add_node("A1");
        let a2 = net.add_node("A2");
        let b1 = net.add_node("B1");
        let b2 = net.add_node("B2");
        let c1 = net.add_node("C1");
        let c2 = net.add_node("C2");

        for (a, b) in [(a1, b1), (a1, c1), (a2, b2), (a2, c2)] {
            net.add_link(a, b, 1).unwrap();
        }

        let prefix = prefix();
        assert!(net.add_route(a1, b1, &prefix, 200));
        assert!(net.add_route(a1, c1, &prefix, 100));
        assert!(net.add_route(a2, b2, &prefix, 100));
        assert!(net.add_route(a2, c2, &prefix, 200));

        net.add_consumer(a1, &prefix, 1.0, 0, 100_000).unwrap();
        net.add_consumer(a2, &prefix, 1.0, 0, 100_000).unwrap();

        Self {
            net,
            a1,
            a2,
            b1,
            b2,
            c1,
            c2,
        }
    }

    fn run(&mut self) {
        self.net.run_until(5000);
    }

    // Interests sent on A1-B1, A1-C1, A2-B2 and A2-C2
    fn out_interests(&self) -> [u64; 4] {
        [
            self.net.out_interests(self.a1, self.b1),
            self.net.out_interests(self.a1, self.c1),
            self.net.out_interests(self.a2, self.b2),
            self.net.out_interests(self.a2, self.c2),
        ]
    }
}

fn prefix() -> Name {
    "/prefix".parse().unwrap()
}

fn root() -> Name {
    Name::new()
}

// Accepts everything and sends nothing
struct NullStrategy;

impl Strategy for NullStrategy {
    fn name(&self) -> &str {
        "/localhost/test/null"
    }

    fn after_receive_interest(&mut self, _ctx: &mut Propagation<'_>) -> Propagated {
        Propagated::Exhausted
    }
}

#[test]
fn test_default_strategy_uses_cheapest_route() {
    let mut t = Topology::new();
    t.run();
    assert_eq!(t.out_interests(), [0, 5, 5, 0]);
}

#[test]
fn test_broadcast_on_one_node() {
    let mut t = Topology::new();
    assert!(t.net.install_strategy(t.a2, &root(), BROADCAST));
    t.run();
    assert_eq!(t.out_interests(), [0, 5, 5, 5]);
}

#[test]
fn test_broadcast_on_both_consumer_nodes() {
    let mut t = Topology::new();
    let nodes = [t.a1, t.a2];
    assert!(t.net.install_strategy_on(&nodes, &root(), BROADCAST));
    t.run();
    assert_eq!(t.out_interests(), [5, 5, 5, 5]);
}

#[test]
fn test_broadcast_everywhere() {
    let mut t = Topology::new();
    assert!(t.net.install_strategy_all(&root(), BROADCAST));
    t.run();
    assert_eq!(t.out_interests(), [5, 5, 5, 5]);
}

#[test]
fn test_custom_strategy_on_one_node() {
    let mut t = Topology::new();
    let nodes = [t.a2];
    t.net
        .install_strategy_with(&nodes, &root(), || Box::new(NullStrategy));
    t.run();
    assert_eq!(t.out_interests(), [0, 5, 0, 0]);
}

#[test]
fn test_custom_strategy_on_both_consumer_nodes() {
    let mut t = Topology::new();
    let nodes = [t.a1, t.a2];
    t.net
        .install_strategy_with(&nodes, &root(), || Box::new(NullStrategy));
    t.run();
    assert_eq!(t.out_interests(), [0, 0, 0, 0]);
}

#[test]
fn test_custom_strategy_everywhere() {
    let mut t = Topology::new();
    let nodes = t.net.node_ids();
    t.net
        .install_strategy_with(&nodes, &root(), || Box::new(NullStrategy));
    t.run();
    assert_eq!(t.out_interests(), [0, 0, 0, 0]);
}

#[test]
fn test_strategy_bound_to_prefix_only_covers_it() {
    let mut t = Topology::new();
    let other: Name = "/other".parse().unwrap();
    t.net
        .install_strategy_with(&[t.a1, t.a2], &other, || Box::new(DropAll));
    t.run();
    assert_eq!(t.out_interests(), [0, 5, 5, 0]);
}

#[test]
fn test_producers_answer_over_the_chosen_route() {
    let mut t = Topology::new();
    let prefix = prefix();
    let c1_producer = t.net.add_producer(t.c1, &prefix).unwrap();
    let b2_producer = t.net.add_producer(t.b2, &prefix).unwrap();
    t.run();

    assert_eq!(t.net.producer(c1_producer).unwrap().served(), 5);
    assert_eq!(t.net.producer(b2_producer).unwrap().served(), 5);
    assert!(t.net.forwarder(t.a1).pit().is_empty());
    assert!(t.net.forwarder(t.a2).pit().is_empty());
}
