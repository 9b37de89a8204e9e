//#![warn(missing_docs)]

#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub mod clock;

pub mod config;

pub mod error;

pub mod hash;

pub mod name;

pub mod packet;

pub mod face;

pub mod scheduler;

pub mod store;

pub mod tables;

pub mod strategy;

pub mod forwarder;

pub mod platform;

pub use clock::{Clock, ManualClock, Timestamp};
pub use config::ForwarderConfig;
pub use error::ForwardingError;
pub use face::{Face, FaceError, FaceToken};
pub use forwarder::{
    events::{EventKind, EventLog, ForwardingEvent, ForwardingObserver},
    metrics::{CountingMetrics, ForwarderMetrics, InertMetrics},
    Forwarder, InterestDisposition,
};
pub use name::{Name, NameComponent};
pub use packet::{Data, Interest, Packet};
pub use scheduler::{Scheduler, TimerQueue};
pub use store::{ContentStore, NullContentStore, ReferenceContentStore};
pub use strategy::{choice::StrategyChoice, Propagated, Propagation, Strategy};
