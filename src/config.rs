use std::time::Duration;

/// Tuning knobs for an MRT endpoint.
///
/// Everything the original protocol hard-coded as a module-level constant
/// lives here instead, so an endpoint can be built with shrunk timeouts in
/// tests without touching the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    /// Timeout for SYN-ACK, ACK-of-data, and FIN-ACK waits.
    pub handshake_timeout: Duration,
    /// Retry budget for SYN and FIN handshake steps.
    pub max_retries: u32,
    /// Upper bound on the sliding-window size.
    pub window_max: u32,
    /// Minimal pacing gap between back-to-back segment sends.
    pub pacing_delay: Duration,
    /// Delay imposed after a retransmission timeout before resuming sends.
    pub backoff_delay: Duration,
    /// Read timeout used by the server demultiplexer; a liveness mechanism
    /// only, not a protocol timeout.
    pub demux_poll_timeout: Duration,
    /// Poll interval for the legacy busy-wait path (condvars are used by
    /// default; kept as a fallback knob, see `conn::Connection`).
    pub blocking_poll_interval: Duration,
    /// Width, in ASCII digits, of the wire `payload_len` field. Fixed at 4
    /// on both client and server; see SPEC_FULL.md §4.1.
    pub len_width: usize,
    /// Receive buffer size for any UDP socket in this crate, client,
    /// server, or link emulator.
    pub recv_buf_size: usize,
}

impl Params {
    pub const LEN_WIDTH: usize = 4;
    pub const MAX_PAYLOAD: usize = 10usize.pow(Self::LEN_WIDTH as u32) - 1;
    pub const RECV_BUF_SIZE: usize = 64 * 1024;

    /// Largest payload a single DATA segment may carry given `mtu`,
    /// respecting both the MTU and the fixed-width length field.
    pub fn max_payload_for_mtu(&self, mtu: usize, header_len: usize) -> usize {
        mtu.saturating_sub(header_len).min(Self::MAX_PAYLOAD)
    }
}

impl Default for Params {
    fn default() -> Self {
        Params {
            handshake_timeout: Duration::from_millis(500),
            max_retries: 10,
            window_max: 5,
            pacing_delay: Duration::from_millis(10),
            backoff_delay: Duration::from_millis(50),
            demux_poll_timeout: Duration::from_millis(100),
            blocking_poll_interval: Duration::from_millis(100),
            len_width: Self::LEN_WIDTH,
            recv_buf_size: Self::RECV_BUF_SIZE,
        }
    }
}
