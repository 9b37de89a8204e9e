use crate::{
    clock::Timestamp,
    name::Name,
    packet::{Data, Interest, NonceGenerator, Packet},
};

/// Sends Interests for `/prefix/<seq>` at a constant rate.
pub struct ConsumerCbr {
    prefix: Name,
    period_ms: u64,
    stop: Timestamp,
    lifetime_ms: Option<u64>,
    next_seq: u64,
    nonces: NonceGenerator,
    sent: u64,
    received: u64,
}

impl ConsumerCbr {
    pub(crate) fn new(prefix: Name, frequency_hz: f64, stop: Timestamp, seed: u32) -> Self {
        // Anything faster than once per tick is sent once per tick
        let period_ms = if frequency_hz > 0.0 {
            (1000.0 / frequency_hz).round().max(1.0) as u64
        } else {
            u64::MAX
        };
        Self {
            prefix,
            period_ms,
            stop,
            lifetime_ms: None,
            next_seq: 0,
            nonces: NonceGenerator::new(seed),
            sent: 0,
            received: 0,
        }
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub(crate) fn set_lifetime(&mut self, lifetime_ms: u64) {
        self.lifetime_ms = Some(lifetime_ms);
    }

    // The Interest due now and when the next one is due, if any
    pub(crate) fn tick(&mut self, now: Timestamp) -> (Option<Interest>, Option<Timestamp>) {
        if now >= self.stop {
            return (None, None);
        }
        let name = self.prefix.adding_generic(self.next_seq.to_string().as_bytes());
        self.next_seq += 1;
        self.sent += 1;

        let mut interest = Interest::new(name, self.nonces.next_nonce());
        if let Some(lifetime_ms) = self.lifetime_ms {
            interest = interest.with_lifetime(lifetime_ms);
        }
        let next = now.adding(self.period_ms);
        (Some(interest), (next < self.stop).then_some(next))
    }
}

/// Answers every Interest it receives with a Data of the same name.
pub struct Producer {
    prefix: Name,
    payload_size: usize,
    served: u64,
}

impl Producer {
    pub(crate) fn new(prefix: Name, payload_size: usize) -> Self {
        Self {
            prefix,
            payload_size,
            served: 0,
        }
    }

    pub fn served(&self) -> u64 {
        self.served
    }

    fn on_interest(&mut self, interest: &Interest) -> Option<Data> {
        if !self.prefix.is_prefix_of(&interest.name) {
            return None;
        }
        self.served += 1;
        Some(Data::new(interest.name.clone(), vec![0u8; self.payload_size]))
    }
}

pub(crate) enum App {
    Consumer(ConsumerCbr),
    Producer(Producer),
}

impl App {
    // Returns the reply to hand back to the forwarder, if any
    pub(crate) fn on_packet(&mut self, packet: &Packet) -> Option<Packet> {
        match (self, packet) {
            (App::Consumer(consumer), Packet::Data(_)) => {
                consumer.received += 1;
                None
            }
            (App::Producer(producer), Packet::Interest(interest)) => {
                producer.on_interest(interest).map(Packet::Data)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn test_consumer_paces_and_stops() {
        let stop = Timestamp::from_ms(2500);
        let mut consumer = ConsumerCbr::new(name("/p"), 1.0, stop, 1);
        assert_eq!(consumer.period_ms(), 1000);

        let (interest, next) = consumer.tick(Timestamp::ZERO);
        assert_eq!(interest.unwrap().name, name("/p").adding_generic(b"0"));
        assert_eq!(next, Some(Timestamp::from_ms(1000)));

        let (_, next) = consumer.tick(Timestamp::from_ms(1000));
        assert_eq!(next, Some(Timestamp::from_ms(2000)));
        let (interest, next) = consumer.tick(Timestamp::from_ms(2000));
        assert_eq!(interest.unwrap().name, name("/p").adding_generic(b"2"));
        assert_eq!(next, None);

        assert_eq!(consumer.tick(stop), (None, None));
        assert_eq!(consumer.sent(), 3);
    }

    #[test]
    fn test_producer_only_serves_its_prefix() {
        let mut app = App::Producer(Producer::new(name("/p"), 8));
        let reply = app.on_packet(&Packet::Interest(Interest::new(name("/p/1"), [1; 4])));
        match reply {
            Some(Packet::Data(data)) => {
                assert_eq!(data.name, name("/p/1"));
                assert_eq!(data.content.len(), 8);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(app
            .on_packet(&Packet::Interest(Interest::new(name("/q"), [2; 4])))
            .is_none());
        match app {
            App::Producer(producer) => assert_eq!(producer.served(), 1),
            App::Consumer(_) => unreachable!(),
        }
    }
}
