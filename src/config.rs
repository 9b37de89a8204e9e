pub const DEFAULT_INTEREST_LIFETIME_MS: u64 = 4000; // 4 sec

/// Knobs of the forwarding pipelines.
///
/// The defaults give the usual forwarder behavior: unbounded PIT,
/// retransmissions detected, solicited Data cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwarderConfig {
    // None for an unbounded PIT
    pub pit_capacity: Option<usize>,
    // Used for Interests that carry no lifetime of their own
    pub default_interest_lifetime_ms: u64,
    pub detect_retransmissions: bool,
    // Whether a retransmission that found no upstream is reported as exhaustion
    pub report_exhausted_retransmissions: bool,
    pub cache_data: bool,
    pub cache_unsolicited_data: bool,
    // Upstream faces with this many entries awaiting Data are skipped
    pub max_pending_per_face: Option<usize>,
    // Give every transmission its own nonce instead of reusing the Interest's
    pub refresh_outgoing_nonce: bool,
    // How long nonces of erased PIT entries are remembered, None disables
    pub dead_nonce_lifetime_ms: Option<u64>,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            pit_capacity: None,
            default_interest_lifetime_ms: DEFAULT_INTEREST_LIFETIME_MS,
            detect_retransmissions: true,
            report_exhausted_retransmissions: false,
            cache_data: true,
            cache_unsolicited_data: false,
            max_pending_per_face: None,
            refresh_outgoing_nonce: false,
            dead_nonce_lifetime_ms: None,
        }
    }
}
