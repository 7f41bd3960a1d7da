//! A single unreliable-datagram endpoint: bind, send, and a timeout-bounded
//! receive that classifies what came back without ever panicking on garbage
//! input. Ordering and retransmission are the caller's job (spec.md §4.2).

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::codec::Segment;
use crate::config::Params;
use crate::err::Error;

/// Outcome of a single bounded receive.
pub enum Recv {
    /// A well-formed, checksum-valid segment arrived from `SocketAddr`.
    Segment(Segment, SocketAddr),
    /// Something arrived but failed to parse (corrupted or truncated).
    /// Spec.md §3 requires this to cause no state change; it is surfaced
    /// so a caller can log it, not so it can be acted on.
    Invalid(SocketAddr),
    /// No datagram arrived before the deadline.
    TimedOut,
}

/// One bound UDP socket, used by both the client and every server-side
/// connection write path (writes are datagram-atomic, spec.md §5, so no
/// write lock is needed even when shared).
pub struct LinkAdapter {
    socket: UdpSocket,
    len_width: usize,
    recv_buf_size: usize,
}

impl LinkAdapter {
    pub fn bind(local: SocketAddr, params: &Params) -> Result<Self, Error> {
        let socket = UdpSocket::bind(local)?;
        Ok(LinkAdapter {
            socket,
            len_width: params.len_width,
            recv_buf_size: params.recv_buf_size,
        })
    }

    /// Bind to an ephemeral port on `0.0.0.0` / `[::]`, chosen by picking a
    /// fixed local port via the caller (client binds to a known src_port;
    /// the server binds to its listen_port). This helper exists for tests.
    pub fn bind_any(params: &Params) -> Result<Self, Error> {
        Self::bind("0.0.0.0:0".parse().unwrap(), params)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }

    pub fn send(&self, peer: SocketAddr, segment: &Segment) -> Result<(), Error> {
        let bytes = segment.encode(self.len_width);
        self.socket.send_to(&bytes, peer)?;
        Ok(())
    }

    /// Block for at most `timeout` waiting for a datagram.
    pub fn recv(&self, timeout: Duration) -> Result<Recv, Error> {
        self.socket.set_read_timeout(Some(timeout))?;

        let mut buf = vec![0u8; self.recv_buf_size];
        match self.socket.recv_from(&mut buf) {
            Ok((n, from)) => match Segment::decode(&buf[..n], self.len_width) {
                Ok(segment) => Ok(Recv::Segment(segment, from)),
                Err(_) => Ok(Recv::Invalid(from)),
            },
            Err(e) if is_timeout(&e) => Ok(Recv::TimedOut),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}
