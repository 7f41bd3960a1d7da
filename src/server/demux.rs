//! The background thread that owns the listening socket: reads every
//! inbound datagram, classifies it by source address, and dispatches to
//! the per-segment-kind handlers (spec.md §4.4).
//!
//! Segments are classified by source `SocketAddr` rather than a four-tuple,
//! since MRT has no notion of a local address/port pair per connection
//! beyond the one listening socket.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use rand::Rng;

use crate::audit::Direction;
use crate::codec::{Kind, Segment};
use crate::conn::{Connection, State};
use crate::link::Recv;

use super::{PeerRecord, Shared};

pub(super) fn run(shared: Arc<Shared>) {
    while shared.running.load(Ordering::SeqCst) {
        match shared.link.recv(shared.params.demux_poll_timeout) {
            Ok(Recv::TimedOut) => continue,
            Ok(Recv::Invalid(from)) => {
                log::debug!("dropped unparseable segment from {from}");
            }
            Ok(Recv::Segment(segment, from)) => dispatch(&shared, segment, from),
            Err(e) => {
                log::warn!("demultiplexer receive error: {e}");
            }
        }
    }
}

fn dispatch(shared: &Arc<Shared>, segment: Segment, from: std::net::SocketAddr) {
    if segment.kind == Kind::Syn {
        shared
            .log
            .log_segment(shared.listen_port, from.port(), &segment, Direction::Recv);
        handle_syn(shared, from, segment.seq);
        return;
    }

    let record = {
        let connections = shared.connections.lock().unwrap();
        connections.get(&from).cloned()
    };

    let record = match record {
        Some(record) => record,
        // A non-SYN segment from an unknown peer has no connection to
        // apply to; the original server silently ignores it the same way.
        None => return,
    };

    shared
        .log
        .log_segment(shared.listen_port, from.port(), &segment, Direction::Recv);

    match segment.kind {
        Kind::Data => handle_data(shared, &record, segment.seq, segment.payload),
        Kind::Fin => handle_fin(shared, &record, segment.seq),
        // Bare ACKs acknowledge a SYN-ACK or an eventual FIN-ACK; the
        // server has nothing further to do on receipt of one.
        Kind::Ack => {}
        // SYN-ACK/FIN-ACK are server-originated; a server never expects to
        // receive one.
        Kind::SynAck | Kind::FinAck | Kind::Syn => {}
    }
}

fn handle_syn(shared: &Arc<Shared>, from: std::net::SocketAddr, client_seq: u32) {
    let mut connections = shared.connections.lock().unwrap();

    let record = connections.entry(from).or_insert_with(|| {
        let local_seq = rand::thread_rng().gen_range(0..=1000);
        let ack = client_seq.wrapping_add(1);
        let record = Arc::new(PeerRecord {
            addr: from,
            local_seq,
            syn_ack_ack: ack,
            conn: Connection::new(State::Established, ack),
        });

        shared.established.lock().unwrap().push_back(from);
        shared.accept_ready.notify_all();

        record
    });

    let syn_ack = Segment::control(Kind::SynAck, record.local_seq, record.syn_ack_ack);
    let _ = shared.link.send(from, &syn_ack);
    shared
        .log
        .log_segment(shared.listen_port, from.port(), &syn_ack, Direction::Send);
}

fn handle_data(shared: &Arc<Shared>, record: &Arc<PeerRecord>, seq: u32, payload: Vec<u8>) {
    let ack = record.conn.on_data(seq, payload);
    let reply = Segment::control(Kind::Ack, record.local_seq, ack);
    let _ = shared.link.send(record.addr, &reply);
    shared
        .log
        .log_segment(shared.listen_port, record.addr.port(), &reply, Direction::Send);
}

fn handle_fin(shared: &Arc<Shared>, record: &Arc<PeerRecord>, seq: u32) {
    let ack = seq.wrapping_add(1);
    let reply = Segment::control(Kind::FinAck, record.local_seq, ack);
    let _ = shared.link.send(record.addr, &reply);
    shared
        .log
        .log_segment(shared.listen_port, record.addr.port(), &reply, Direction::Send);
    record.conn.set_state(State::Closed);
}
