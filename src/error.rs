use thiserror::Error;

/// Why the forwarder stopped processing a packet.
///
/// None of these are fatal: they are returned to the caller, reported to the
/// metrics and logged, and the forwarder carries on with the next packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ForwardingError {
    #[error("the PIT is full, the Interest could not be admitted")]
    PitCapacityExceeded,
    #[error("no upstream face accepted the Interest")]
    ForwardingExhausted,
    #[error("Data did not match any pending Interest")]
    UnsolicitedData,
    #[error("a face refused to send the Interest")]
    FaceRefusal,
    #[error("the Interest nonce was already seen for this name")]
    DuplicateInterest,
    #[error("the Interest arrived with a hop limit of zero")]
    HopLimitExceeded,
    #[error("the Interest name is empty")]
    InvalidName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PitError {
    #[error("the PIT already holds {capacity} entries")]
    CapacityExceeded { capacity: usize },
}

impl From<PitError> for ForwardingError {
    fn from(value: PitError) -> Self {
        match value {
            PitError::CapacityExceeded { .. } => ForwardingError::PitCapacityExceeded,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseNameError {
    #[error("names must start with '/'")]
    MissingLeadingSlash,
    #[error("malformed percent escape")]
    InvalidEscape,
}
