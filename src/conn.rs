//! The per-peer connection record (spec.md §3): sequence numbers, the
//! reassembly map, the delivered-byte queue, lifecycle state, and the
//! mutex/condvar pair that guards them.

use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex};

/// Connection lifecycle, shared by both client and server records
/// (spec.md §3's "Lifecycle" uses the same five states for either role,
/// even though each role only exercises a subset of the transitions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Listen,
    SynSent,
    Established,
    FinSent,
    Closed,
}

/// Observability counters, kept separate from the data fields the mutex
/// scope is about so adding one never risks forgetting the lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counters {
    pub segments_received: u64,
    pub out_of_order: u64,
    pub duplicate: u64,
    pub bytes_delivered: u64,
}

struct Inner {
    state: State,
    expected_peer_seq: u32,
    delivered: VecDeque<u8>,
    reassembly: HashMap<u32, Vec<u8>>,
    counters: Counters,
}

/// Everything spec.md §9 requires a single lock to cover: every read or
/// mutation of `expected_peer_seq`, `reassembly`, and `delivered` goes
/// through `inner`. `local_seq` is only ever touched by the thread that
/// owns the connection (the demultiplexer, for server records) so it lives
/// outside the mutex, matching spec.md's narrower invariant list for it.
pub struct Connection {
    inner: Mutex<Inner>,
    /// Signalled whenever `delivered` grows or `state` changes, for
    /// `receive`'s blocking wait (spec.md §9, replacing poll-based waits).
    data_ready: Condvar,
}

impl Connection {
    pub fn new(state: State, expected_peer_seq: u32) -> Self {
        Connection {
            inner: Mutex::new(Inner {
                state,
                expected_peer_seq,
                delivered: VecDeque::new(),
                reassembly: HashMap::new(),
                counters: Counters::default(),
            }),
            data_ready: Condvar::new(),
        }
    }

    pub fn state(&self) -> State {
        self.inner.lock().unwrap().state
    }

    pub fn set_state(&self, state: State) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = state;
        self.data_ready.notify_all();
    }

    pub fn expected_peer_seq(&self) -> u32 {
        self.inner.lock().unwrap().expected_peer_seq
    }

    pub fn counters(&self) -> Counters {
        self.inner.lock().unwrap().counters
    }

    pub fn delivered_len(&self) -> usize {
        self.inner.lock().unwrap().delivered.len()
    }

    /// Applies one valid DATA segment's payload per the receiver algorithm
    /// in spec.md §4.5, returning the `ack` value to emit.
    ///
    /// - `seq == expected`: appended in order; the reassembly map is then
    ///   drained of any now-contiguous entries.
    /// - `seq > expected`: buffered for later; counted as out-of-order.
    /// - `seq < expected`: discarded; counted as duplicate.
    ///
    /// Every call returns the `ack` to send — every DATA segment, in order
    /// or not, triggers an ACK (spec.md §4.5).
    pub fn on_data(&self, seq: u32, payload: Vec<u8>) -> u32 {
        let mut inner = self.inner.lock().unwrap();
        inner.counters.segments_received += 1;

        if seq == inner.expected_peer_seq {
            let len = payload.len() as u64;
            inner.delivered.extend(payload);
            inner.expected_peer_seq = inner.expected_peer_seq.wrapping_add(1);
            inner.counters.bytes_delivered += len;

            while let Some(buffered) = inner.reassembly.remove(&inner.expected_peer_seq) {
                let len = buffered.len() as u64;
                inner.delivered.extend(buffered);
                inner.expected_peer_seq = inner.expected_peer_seq.wrapping_add(1);
                inner.counters.bytes_delivered += len;
            }
        } else if seq > inner.expected_peer_seq {
            inner.reassembly.insert(seq, payload);
            inner.counters.out_of_order += 1;
        } else {
            inner.counters.duplicate += 1;
        }

        let ack = inner.expected_peer_seq;
        drop(inner);
        self.data_ready.notify_all();
        ack
    }

    /// Blocks until at least `n` bytes are available in `delivered` or the
    /// connection is no longer `Established`, returning whatever is
    /// available in the latter case (spec.md §4.7).
    pub fn receive(&self, n: usize) -> Vec<u8> {
        let mut inner = self.inner.lock().unwrap();
        while inner.delivered.len() < n && inner.state == State::Established {
            inner = self.data_ready.wait(inner).unwrap();
        }

        let take = n.min(inner.delivered.len());
        let data: Vec<u8> = inner.delivered.drain(..take).collect();
        data
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn in_order_data_is_delivered_immediately() {
        let conn = Connection::new(State::Established, 0);
        let ack = conn.on_data(0, b"abc".to_vec());
        assert_eq!(ack, 1);
        assert_eq!(conn.receive(3), b"abc");
    }

    #[test]
    fn out_of_order_segment_is_buffered_until_the_gap_fills() {
        let conn = Connection::new(State::Established, 0);

        let ack = conn.on_data(1, b"world".to_vec());
        assert_eq!(ack, 0, "seq 1 arrived before seq 0, nothing advances yet");
        assert_eq!(conn.counters().out_of_order, 1);

        let ack = conn.on_data(0, b"hello".to_vec());
        assert_eq!(ack, 2, "filling the gap drains the buffered seq 1 too");
        assert_eq!(conn.receive(10), b"helloworld");
    }

    #[test]
    fn duplicate_segment_is_discarded_but_still_acked() {
        let conn = Connection::new(State::Established, 0);
        conn.on_data(0, b"hi".to_vec());

        let ack = conn.on_data(0, b"hi".to_vec());
        assert_eq!(ack, 1);
        assert_eq!(conn.counters().duplicate, 1);
        assert_eq!(conn.receive(2), b"hi", "the duplicate's bytes are not re-delivered");
    }

    #[test]
    fn receive_blocks_until_enough_bytes_arrive() {
        let conn = Arc::new(Connection::new(State::Established, 0));

        let reader = {
            let conn = Arc::clone(&conn);
            std::thread::spawn(move || conn.receive(5))
        };

        std::thread::sleep(std::time::Duration::from_millis(20));
        conn.on_data(0, b"he".to_vec());
        std::thread::sleep(std::time::Duration::from_millis(20));
        conn.on_data(1, b"llo".to_vec());

        assert_eq!(reader.join().unwrap(), b"hello");
    }

    #[test]
    fn receive_zero_bytes_returns_immediately() {
        let conn = Connection::new(State::Established, 0);
        assert_eq!(conn.receive(0), Vec::<u8>::new());
    }

    #[test]
    fn receive_returns_a_short_read_once_the_connection_closes() {
        let conn = Arc::new(Connection::new(State::Established, 0));

        let reader = {
            let conn = Arc::clone(&conn);
            std::thread::spawn(move || conn.receive(100))
        };

        std::thread::sleep(std::time::Duration::from_millis(20));
        conn.on_data(0, b"partial".to_vec());
        conn.set_state(State::Closed);

        assert_eq!(reader.join().unwrap(), b"partial");
    }
}
