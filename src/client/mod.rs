//! Client half of the public surface (spec.md §4.5): `init`, `connect`,
//! `send`, `close`.
//!
//! The three-way handshake and graceful close follow a bounded
//! retry/backoff loop around a `recv`-with-timeout call; the sliding
//! window keeps the "timeout halves the window and rewinds
//! `next_to_send`" behavior described in spec.md §4.5.

use std::net::SocketAddr;

use crate::audit::{AuditLog, Direction};
use crate::codec::{Kind, Segment};
use crate::config::Params;
use crate::conn::{Connection, State};
use crate::err::Error;
use crate::link::{LinkAdapter, Recv};

/// A single outbound connection to one MRT server.
pub struct Client {
    link: LinkAdapter,
    peer: SocketAddr,
    params: Params,
    log: AuditLog,
    conn: Connection,
    local_seq: u32,
    segment_size: usize,
}

impl Client {
    /// Binds `src_port` and prepares to talk to `dst_addr:dst_port`. Does
    /// not perform the handshake; call [`Client::connect`] for that.
    ///
    /// `segment_size` is the MTU budget for one on-wire segment, header
    /// included (SPEC_FULL.md §4.1: `max_payload_size = min(mtu -
    /// header_len, 9_999)`); the header is subtracted before it is used
    /// as a chunk size.
    pub fn init(
        src_port: u16,
        dst_addr: std::net::IpAddr,
        dst_port: u16,
        segment_size: usize,
    ) -> Result<Client, Error> {
        Self::init_with_params(src_port, dst_addr, dst_port, segment_size, Params::default())
    }

    pub fn init_with_params(
        src_port: u16,
        dst_addr: std::net::IpAddr,
        dst_port: u16,
        segment_size: usize,
        params: Params,
    ) -> Result<Client, Error> {
        let link = LinkAdapter::bind(SocketAddr::from(([0, 0, 0, 0], src_port)), &params)?;
        let log = AuditLog::for_client(src_port)?;
        let peer = SocketAddr::new(dst_addr, dst_port);
        let segment_size = params
            .max_payload_for_mtu(segment_size, crate::codec::HEADER_LEN)
            .max(1);

        Ok(Client {
            link,
            peer,
            params,
            log,
            conn: Connection::new(State::Listen, 0),
            local_seq: 0,
            segment_size,
        })
    }

    fn src_port(&self) -> u16 {
        self.link.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    fn send_segment(&self, segment: &Segment) -> Result<(), Error> {
        self.link.send(self.peer, segment)?;
        self.log
            .log_segment(self.src_port(), self.peer.port(), segment, Direction::Send);
        Ok(())
    }

    fn record_recv(&self, segment: &Segment) {
        self.log
            .log_segment(self.src_port(), self.peer.port(), segment, Direction::Recv);
    }

    /// Three-way handshake: send SYN, wait up to `handshake_timeout` for a
    /// SYN-ACK, retrying up to `max_retries` times before giving up
    /// (spec.md §4.5). The trailing ACK is sent once and not itself
    /// retried; the server reaches `Established` on the SYN-ACK alone.
    pub fn connect(&mut self) -> Result<(), Error> {
        self.conn.set_state(State::SynSent);
        self.local_seq = rand::random::<u32>() % 1000;

        let syn = Segment::control(Kind::Syn, self.local_seq, 0);

        for _ in 0..self.params.max_retries {
            self.send_segment(&syn)?;

            match self.link.recv(self.params.handshake_timeout)? {
                Recv::Segment(seg, from) if from == self.peer && seg.kind == Kind::SynAck => {
                    self.record_recv(&seg);
                    let ack = Segment::control(Kind::Ack, self.local_seq.wrapping_add(1), seg.seq.wrapping_add(1));
                    self.send_segment(&ack)?;
                    self.local_seq = self.local_seq.wrapping_add(1);
                    self.conn = Connection::new(State::Established, seg.seq.wrapping_add(1));
                    return Ok(());
                }
                _ => continue,
            }
        }

        self.conn.set_state(State::Closed);
        Err(Error::ConnectionRefused)
    }

    /// Sends `data` reliably, chunked into segments of at most
    /// `segment_size` bytes, via the sliding window described in
    /// spec.md §4.5: a window of unacknowledged segments grows by one on
    /// every cumulative ACK (capped at `window_max`) and halves (floor 1)
    /// on a retransmission timeout, which also rewinds `next_to_send` back
    /// to `base` so every outstanding segment is resent.
    pub fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.conn.state() != State::Established {
            return Err(Error::WrongState {
                expected: State::Established,
                actual: self.conn.state(),
            });
        }

        if self.segment_size > Params::MAX_PAYLOAD {
            return Err(Error::PayloadTooLarge {
                len: self.segment_size,
                max: Params::MAX_PAYLOAD,
            });
        }

        let chunks: Vec<&[u8]> = data.chunks(self.segment_size).collect();
        if chunks.is_empty() {
            return Ok(());
        }

        let base_seq = self.local_seq;
        let peer_ack = self.conn.expected_peer_seq();
        let mut base = 0usize; // index into chunks of the oldest unacked segment
        let mut next_to_send = 0usize;
        let mut window = 1u32;

        while base < chunks.len() {
            while next_to_send < chunks.len() && next_to_send < base + window as usize {
                let seq = base_seq.wrapping_add(next_to_send as u32);
                let segment = Segment::data(seq, peer_ack, chunks[next_to_send].to_vec());
                self.send_segment(&segment)?;
                next_to_send += 1;
                std::thread::sleep(self.params.pacing_delay);
            }

            match self.link.recv(self.params.handshake_timeout)? {
                Recv::Segment(seg, from) if from == self.peer && seg.kind == Kind::Ack => {
                    self.record_recv(&seg);
                    let acked_through = seg.ack.wrapping_sub(base_seq) as usize;
                    if acked_through > base {
                        base = acked_through.min(chunks.len());
                        window = (window + 1).min(self.params.window_max);
                    }
                }
                Recv::TimedOut => {
                    window = (window / 2).max(1);
                    next_to_send = base;
                    std::thread::sleep(self.params.backoff_delay);
                }
                _ => {}
            }
        }

        self.local_seq = base_seq.wrapping_add(chunks.len() as u32);
        Ok(())
    }

    /// Graceful teardown: send FIN, wait for FIN-ACK, retrying up to
    /// `max_retries` times. Resources are released regardless of whether a
    /// FIN-ACK was ever seen (spec.md §4.5) — a timed-out close still
    /// leaves the connection `Closed` locally and reports
    /// [`Error::CloseExhausted`] rather than hanging forever.
    pub fn close(mut self) -> Result<(), Error> {
        let fin = Segment::control(Kind::Fin, self.local_seq, self.conn.expected_peer_seq());
        let mut got_fin_ack = false;

        for _ in 0..self.params.max_retries {
            if self.send_segment(&fin).is_err() {
                break;
            }

            match self.link.recv(self.params.handshake_timeout) {
                Ok(Recv::Segment(seg, from)) if from == self.peer && seg.kind == Kind::FinAck => {
                    self.record_recv(&seg);
                    got_fin_ack = true;
                    break;
                }
                _ => continue,
            }
        }

        self.conn.set_state(State::Closed);

        if got_fin_ack {
            Ok(())
        } else {
            Err(Error::CloseExhausted)
        }
    }
}
