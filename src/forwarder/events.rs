use alloc::{boxed::Box, rc::Rc, vec::Vec};
use core::cell::RefCell;

use crate::{face::FaceToken, name::Name, packet::Nonce};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    DidCreatePitEntry,
    FailedToCreatePitEntry,
    DidReceiveDuplicateInterest,
    DidSuppressSimilarInterest,
    DidForwardSimilarInterest,
    DidExhaustForwardingOptions,
    DidSendOutInterest,
    WillSatisfyPendingInterest,
    DidSendOutData,
    DidReceiveUnsolicitedData,
    WillEraseTimedOutPendingInterest,
}

/// Points in the forwarding pipelines that observers are told about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForwardingEvent<'a> {
    DidCreatePitEntry {
        in_face: FaceToken,
        name: &'a Name,
    },
    FailedToCreatePitEntry {
        in_face: FaceToken,
        name: &'a Name,
    },
    DidReceiveDuplicateInterest {
        in_face: FaceToken,
        name: &'a Name,
        nonce: Nonce,
    },
    DidSuppressSimilarInterest {
        in_face: FaceToken,
        name: &'a Name,
    },
    DidForwardSimilarInterest {
        in_face: FaceToken,
        name: &'a Name,
    },
    DidExhaustForwardingOptions {
        in_face: FaceToken,
        name: &'a Name,
    },
    DidSendOutInterest {
        out_face: FaceToken,
        name: &'a Name,
        nonce: Nonce,
    },
    // None when the Data was found in the content store
    WillSatisfyPendingInterest {
        in_face: Option<FaceToken>,
        name: &'a Name,
    },
    DidSendOutData {
        out_face: FaceToken,
        name: &'a Name,
        from_cache: bool,
    },
    DidReceiveUnsolicitedData {
        in_face: FaceToken,
        name: &'a Name,
    },
    WillEraseTimedOutPendingInterest {
        name: &'a Name,
    },
}

impl<'a> ForwardingEvent<'a> {
    pub fn kind(&self) -> EventKind {
        match self {
            ForwardingEvent::DidCreatePitEntry { .. } => EventKind::DidCreatePitEntry,
            ForwardingEvent::FailedToCreatePitEntry { .. } => EventKind::FailedToCreatePitEntry,
            ForwardingEvent::DidReceiveDuplicateInterest { .. } => {
                EventKind::DidReceiveDuplicateInterest
            }
            ForwardingEvent::DidSuppressSimilarInterest { .. } => {
                EventKind::DidSuppressSimilarInterest
            }
            ForwardingEvent::DidForwardSimilarInterest { .. } => {
                EventKind::DidForwardSimilarInterest
            }
            ForwardingEvent::DidExhaustForwardingOptions { .. } => {
                EventKind::DidExhaustForwardingOptions
            }
            ForwardingEvent::DidSendOutInterest { .. } => EventKind::DidSendOutInterest,
            ForwardingEvent::WillSatisfyPendingInterest { .. } => {
                EventKind::WillSatisfyPendingInterest
            }
            ForwardingEvent::DidSendOutData { .. } => EventKind::DidSendOutData,
            ForwardingEvent::DidReceiveUnsolicitedData { .. } => {
                EventKind::DidReceiveUnsolicitedData
            }
            ForwardingEvent::WillEraseTimedOutPendingInterest { .. } => {
                EventKind::WillEraseTimedOutPendingInterest
            }
        }
    }

    pub fn name(&self) -> &'a Name {
        match self {
            ForwardingEvent::DidCreatePitEntry { name, .. }
            | ForwardingEvent::FailedToCreatePitEntry { name, .. }
            | ForwardingEvent::DidReceiveDuplicateInterest { name, .. }
            | ForwardingEvent::DidSuppressSimilarInterest { name, .. }
            | ForwardingEvent::DidForwardSimilarInterest { name, .. }
            | ForwardingEvent::DidExhaustForwardingOptions { name, .. }
            | ForwardingEvent::DidSendOutInterest { name, .. }
            | ForwardingEvent::WillSatisfyPendingInterest { name, .. }
            | ForwardingEvent::DidSendOutData { name, .. }
            | ForwardingEvent::DidReceiveUnsolicitedData { name, .. }
            | ForwardingEvent::WillEraseTimedOutPendingInterest { name } => *name,
        }
    }
}

// Observers only get to look: they hold no reference to the forwarder, so
//  they cannot feed packets back into the pipeline that is notifying them.
pub trait ForwardingObserver {
    fn on_event(&mut self, event: &ForwardingEvent<'_>);
}

#[derive(Default)]
pub(crate) struct Observers {
    observers: Vec<Box<dyn ForwardingObserver>>,
}

impl Observers {
    pub fn add(&mut self, observer: Box<dyn ForwardingObserver>) {
        self.observers.push(observer);
    }

    pub fn fire(&mut self, event: ForwardingEvent<'_>) {
        tracing::debug!(event = ?event.kind(), name = %event.name(), "forwarding event");
        for observer in self.observers.iter_mut() {
            observer.on_event(&event);
        }
    }
}

/// Records the kind and name of every event.
///
/// Clones share the same log, so one handle can be given to the forwarder
/// and the other kept for inspection.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<(EventKind, Name)>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(EventKind, Name)> {
        self.events.borrow().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.borrow().iter().map(|(kind, _)| *kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub fn count_for(&self, kind: EventKind, name: &Name) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|(k, n)| *k == kind && n == name)
            .count()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear()
    }
}

impl ForwardingObserver for EventLog {
    fn on_event(&mut self, event: &ForwardingEvent<'_>) {
        self.events
            .borrow_mut()
            .push((event.kind(), event.name().clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_log_is_shared() {
        let log = EventLog::new();
        let mut observers = Observers::default();
        observers.add(Box::new(log.clone()));

        let name: Name = "/a".parse().unwrap();
        observers.fire(ForwardingEvent::DidCreatePitEntry {
            in_face: FaceToken(1),
            name: &name,
        });
        observers.fire(ForwardingEvent::WillEraseTimedOutPendingInterest { name: &name });

        assert_eq!(
            log.kinds(),
            [
                EventKind::DidCreatePitEntry,
                EventKind::WillEraseTimedOutPendingInterest
            ]
        );
        assert_eq!(log.count_for(EventKind::DidCreatePitEntry, &name), 1);
        log.clear();
        assert!(log.events().is_empty());
    }
}
