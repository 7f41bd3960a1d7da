//! A constant- or time-varying-rate lossy/corrupting relay sitting between
//! two UDP sockets.
//!
//! Factored out of the `network` binary's original relay loop (spec.md §1
//! treats the link emulator as "an opaque lossy bidirectional datagram
//! pipe", `original_source/network.py`) so the same forwarding logic backs
//! both the standalone binary and in-crate tests exercising spec.md §8's
//! S3/S5 scenarios in-process, without spawning a separate process or
//! depending on a wall-clock loss schedule (SPEC_FULL.md §8).

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::Params;

/// Flips each bit of `datagram` independently with probability `bit_err`,
/// mirroring `network.py`'s per-bit XOR corruption.
pub fn corrupt(datagram: &mut [u8], bit_err: f64) {
    if bit_err <= 0.0 {
        return;
    }
    for byte in datagram.iter_mut() {
        for bit in 0..8u8 {
            if rand::random::<f64>() < bit_err {
                *byte ^= 1 << bit;
            }
        }
    }
}

/// A loss-rate provider: called once per datagram to decide the current
/// `(loss, bit_err)` pair. The `network` binary closes over a time-varying
/// schedule; tests close over a fixed pair.
pub type LossAt = Arc<dyn Fn() -> (f64, f64) + Send + Sync>;

/// A [`LossAt`] that always reports the same `(loss, bit_err)` pair, for
/// callers that don't need a time-varying schedule.
pub fn constant_rate(loss: f64, bit_err: f64) -> LossAt {
    Arc::new(move || (loss, bit_err))
}

/// Reads datagrams from `inbound` and, for each one not dropped by the
/// current loss rate, forwards a (possibly bit-corrupted) copy via
/// `outbound`. The side with no `fixed_target` learns its destination from
/// the first datagram seen in the opposite direction, via `peer_addr`
/// (mirrors the client-address learning `network.py` does for its reverse
/// leg).
///
/// Polls with `poll_timeout` so `running` is checked periodically and the
/// relay loop returns promptly once the caller clears it — tests rely on
/// this to join the relay thread without leaking it past the test.
#[allow(clippy::too_many_arguments)]
pub fn relay(
    inbound: Arc<UdpSocket>,
    outbound: Arc<UdpSocket>,
    peer_addr: Arc<Mutex<Option<SocketAddr>>>,
    fixed_target: Option<SocketAddr>,
    loss_at: LossAt,
    running: Arc<AtomicBool>,
    poll_timeout: Duration,
    label: &'static str,
) {
    let _ = inbound.set_read_timeout(Some(poll_timeout));
    let mut buf = vec![0u8; Params::RECV_BUF_SIZE];

    while running.load(Ordering::SeqCst) {
        let (n, from) = match inbound.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(e) if is_timeout(&e) => continue,
            Err(e) => {
                log::warn!("{label} recv error: {e}");
                continue;
            }
        };

        if fixed_target.is_some() {
            *peer_addr.lock().unwrap() = Some(from);
        }

        let (loss, bit_err) = loss_at();
        if rand::random::<f64>() < loss {
            log::debug!("{label} dropped a {n}-byte datagram from {from}");
            continue;
        }

        let target = match fixed_target {
            Some(addr) => Some(addr),
            None => *peer_addr.lock().unwrap(),
        };
        let Some(target) = target else { continue };

        let mut datagram = buf[..n].to_vec();
        corrupt(&mut datagram, bit_err);

        if let Err(e) = outbound.send_to(&datagram, target) {
            log::warn!("{label} forward error: {e}");
        }
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}
