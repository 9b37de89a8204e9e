use alloc::collections::{BTreeSet, BinaryHeap};
use core::cmp::Ordering;

use crate::{clock::Timestamp, name::Name};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub(crate) u64);

impl TimerId {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Expiry of one PIT entry.
///
/// The generation lets a late firing for an entry that was since erased and
/// recreated under the same name be told apart from the current one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PitTimer {
    pub name: Name,
    pub generation: u64,
}

// The only thing the forwarder needs from whoever drives time: run this
//  timer at that time, unless it is cancelled first.
pub trait Scheduler {
    fn schedule_at(&mut self, at: Timestamp, timer: PitTimer) -> TimerId;

    // Returns false if the timer already fired or was cancelled
    fn cancel(&mut self, id: TimerId) -> bool;
}

struct Queued<E> {
    at: Timestamp,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Queued<E> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<E> Eq for Queued<E> {}

impl<E> Ord for Queued<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the heap pops the earliest first, and among equal
        //  times the one pushed first
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<E> PartialOrd for Queued<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A time-ordered queue that is FIFO among events at the same time.
pub struct EventQueue<E> {
    heap: BinaryHeap<Queued<E>>,
    next_seq: u64,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    // Returns the insertion sequence number, unique within this queue
    pub fn push(&mut self, at: Timestamp, event: E) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Queued { at, seq, event });
        seq
    }

    pub fn pop(&mut self) -> Option<(Timestamp, u64, E)> {
        self.heap.pop().map(|q| (q.at, q.seq, q.event))
    }

    pub fn pop_due(&mut self, now: Timestamp) -> Option<(Timestamp, u64, E)> {
        match self.heap.peek() {
            Some(q) if q.at <= now => self.pop(),
            _ => None,
        }
    }

    pub fn peek_time(&self) -> Option<Timestamp> {
        self.heap.peek().map(|q| q.at)
    }

    fn peek_seq(&self) -> Option<u64> {
        self.heap.peek().map(|q| q.seq)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// A standalone scheduler for hosts that poll the forwarder for due timers.
#[derive(Default)]
pub struct TimerQueue {
    queue: EventQueue<PitTimer>,
    // Sequence numbers of timers that have neither fired nor been cancelled
    pending: BTreeSet<u64>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop_due(&mut self, now: Timestamp) -> Option<PitTimer> {
        while let Some((_, seq, timer)) = self.queue.pop_due(now) {
            if self.pending.remove(&seq) {
                return Some(timer);
            }
        }
        None
    }

    pub fn next_deadline(&mut self) -> Option<Timestamp> {
        self.discard_cancelled_head();
        self.queue.peek_time()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn discard_cancelled_head(&mut self) {
        while let Some(seq) = self.queue.peek_seq() {
            if self.pending.contains(&seq) {
                return;
            }
            self.queue.pop();
        }
    }
}

impl Scheduler for TimerQueue {
    fn schedule_at(&mut self, at: Timestamp, timer: PitTimer) -> TimerId {
        let seq = self.queue.push(at, timer);
        self.pending.insert(seq);
        TimerId(seq)
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        self.pending.remove(&id.0)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    fn timer(s: &str, generation: u64) -> PitTimer {
        PitTimer {
            name: s.parse().unwrap(),
            generation,
        }
    }

    #[test]
    fn test_event_queue_is_fifo_within_a_tick() {
        let mut queue = EventQueue::new();
        let t = Timestamp::from_ms(10);
        queue.push(t, 'b');
        queue.push(Timestamp::from_ms(5), 'a');
        queue.push(t, 'c');
        queue.push(t, 'd');

        assert_eq!(queue.peek_time(), Some(Timestamp::from_ms(5)));
        assert!(queue.pop_due(Timestamp::from_ms(4)).is_none());

        let order: Vec<char> = core::iter::from_fn(|| queue.pop_due(t))
            .map(|(_, _, e)| e)
            .collect();
        assert_eq!(order, ['a', 'b', 'c', 'd']);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_timer_queue_cancel() {
        let mut timers = TimerQueue::new();
        let first = timers.schedule_at(Timestamp::from_ms(100), timer("/a", 1));
        let second = timers.schedule_at(Timestamp::from_ms(200), timer("/b", 2));
        assert_eq!(timers.len(), 2);

        assert!(timers.cancel(first));
        assert!(!timers.cancel(first));
        assert_eq!(timers.next_deadline(), Some(Timestamp::from_ms(200)));

        assert_eq!(timers.pop_due(Timestamp::from_ms(150)), None);
        assert_eq!(timers.pop_due(Timestamp::from_ms(200)), Some(timer("/b", 2)));
        assert!(!timers.cancel(second));
        assert!(timers.is_empty());
        assert_eq!(timers.next_deadline(), None);
    }
}
