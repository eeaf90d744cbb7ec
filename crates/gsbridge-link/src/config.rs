use std::time::Duration;

use gsbridge_frame::{TxEncoding, MAX_ENVELOPE_LEN};

/// Idle wake-up interval of the bridge loop.
pub const DEFAULT_TICK: Duration = Duration::from_millis(20);

/// Command words held while a handshake has the radio in command mode.
pub const DEFAULT_PENDING_CAPACITY: usize = 256;

/// Envelopes waiting for a slow host before the oldest are dropped.
pub const DEFAULT_HOST_QUEUE_CAPACITY: usize = 256;

/// Radio link handshake settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Run the handshake at all. Off when the radio is paired out of band.
    pub enabled: bool,
    /// Remote radio address for the connect directive. `None` reconnects to
    /// the stored remote.
    pub remote_addr: Option<String>,
    /// Settle time after `$$$`.
    pub enter_settle: Duration,
    /// Settle time after the connect directive.
    pub connect_settle: Duration,
    /// Settle time after the disband directive.
    pub disband_settle: Duration,
    /// Settle time after `---`.
    pub exit_settle: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            remote_addr: None,
            enter_settle: Duration::from_millis(500),
            connect_settle: Duration::from_millis(1500),
            disband_settle: Duration::from_millis(400),
            exit_settle: Duration::from_millis(250),
        }
    }
}

/// Bridge loop settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Upper bound on how long the loop sleeps when nothing is readable.
    pub tick: Duration,
    /// Largest IPC envelope body accepted from the host.
    pub max_envelope_len: usize,
    /// How command words are written to the serial line.
    pub tx_encoding: TxEncoding,
    /// Words queued during a handshake before the oldest are dropped.
    pub pending_capacity: usize,
    /// Envelopes queued for a host that is not reading before the oldest
    /// are dropped.
    pub host_queue_capacity: usize,
    pub link: LinkConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            max_envelope_len: MAX_ENVELOPE_LEN,
            tx_encoding: TxEncoding::default(),
            pending_capacity: DEFAULT_PENDING_CAPACITY,
            host_queue_capacity: DEFAULT_HOST_QUEUE_CAPACITY,
            link: LinkConfig::default(),
        }
    }
}
