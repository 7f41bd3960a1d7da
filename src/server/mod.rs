//! Server half of the public surface (spec.md §4.4): `init`, `accept`,
//! `receive`, `close`, backed by a single background demultiplexer thread
//! that owns the listening socket.
//!
//! One background thread owns the socket and drives a poll-read-dispatch
//! demultiplexer feeding per-peer records behind a shared map; newly
//! established connections hand off to `accept` through a `Condvar`.

mod demux;

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::audit::AuditLog;
use crate::conn::{Connection, State};
use crate::config::Params;
use crate::err::Error;
use crate::link::LinkAdapter;

/// Per-peer bookkeeping the demultiplexer thread owns outright.
///
/// `local_seq` and `syn_ack_ack` are fixed at handshake time and never
/// touched again except by the demultiplexer thread itself, so neither
/// needs the `Connection` mutex (spec.md §9's narrower invariant for
/// `local_seq`).
pub(crate) struct PeerRecord {
    pub addr: SocketAddr,
    pub local_seq: u32,
    pub syn_ack_ack: u32,
    pub conn: Connection,
}

struct Shared {
    link: LinkAdapter,
    listen_port: u16,
    params: Params,
    log: AuditLog,
    connections: Mutex<HashMap<SocketAddr, Arc<PeerRecord>>>,
    established: Mutex<VecDeque<SocketAddr>>,
    accept_ready: Condvar,
    running: AtomicBool,
}

/// A handle to one accepted peer, returned by [`Server::accept`].
pub struct ServerConnection {
    addr: SocketAddr,
    record: Arc<PeerRecord>,
}

impl ServerConnection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

pub struct Server {
    shared: Arc<Shared>,
    demux_handle: Option<JoinHandle<()>>,
}

impl Server {
    /// Binds `listen_port` and starts the demultiplexer thread.
    ///
    /// `receive_buffer_size` mirrors the original `Server.init`'s second
    /// argument; it is clamped the same way the link emulator's buffer is
    /// (spec.md's Open Question resolution), since nothing downstream of
    /// parsing needs a buffer anywhere near the original's nonsensical
    /// two-billion-byte default.
    pub fn init(listen_port: u16, receive_buffer_size: usize) -> Result<Server, Error> {
        Self::init_with_params(listen_port, receive_buffer_size, Params::default())
    }

    pub fn init_with_params(
        listen_port: u16,
        receive_buffer_size: usize,
        mut params: Params,
    ) -> Result<Server, Error> {
        params.recv_buf_size = receive_buffer_size.min(Params::RECV_BUF_SIZE);

        let link = LinkAdapter::bind(
            SocketAddr::from(([0, 0, 0, 0], listen_port)),
            &params,
        )?;
        let log = AuditLog::for_server(listen_port)?;

        let shared = Arc::new(Shared {
            link,
            listen_port,
            params,
            log,
            connections: Mutex::new(HashMap::new()),
            established: Mutex::new(VecDeque::new()),
            accept_ready: Condvar::new(),
            running: AtomicBool::new(true),
        });

        let demux_shared = Arc::clone(&shared);
        let demux_handle = std::thread::spawn(move || demux::run(demux_shared));

        Ok(Server {
            shared,
            demux_handle: Some(demux_handle),
        })
    }

    /// The address this server is actually bound to — useful when
    /// `listen_port` was `0` and the OS chose an ephemeral port (tests).
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        self.shared.link.local_addr()
    }

    /// Blocks until a peer completes the handshake, then hands back a
    /// handle to it. Established peers queue in arrival order (spec.md
    /// §4.4's "implementation-defined order" resolved as FIFO).
    pub fn accept(&self) -> Result<ServerConnection, Error> {
        let mut queue = self.shared.established.lock().unwrap();
        loop {
            if let Some(addr) = queue.pop_front() {
                let record = self
                    .shared
                    .connections
                    .lock()
                    .unwrap()
                    .get(&addr)
                    .cloned()
                    .expect("established peer always has a connection record");
                return Ok(ServerConnection { addr, record });
            }
            if !self.shared.running.load(Ordering::SeqCst) {
                return Err(Error::ServerClosed);
            }
            queue = self.shared.accept_ready.wait(queue).unwrap();
        }
    }

    /// Blocks until `n` bytes have been delivered from `conn`, or the
    /// connection leaves `Established` (spec.md §4.7).
    pub fn receive(&self, conn: &ServerConnection, n: usize) -> Vec<u8> {
        conn.record.conn.receive(n)
    }

    /// Stops the demultiplexer, sends a best-effort FIN-ACK to every peer
    /// still `Established`, and releases the socket.
    pub fn close(mut self) -> Result<(), Error> {
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.accept_ready.notify_all();

        if let Some(handle) = self.demux_handle.take() {
            let _ = handle.join();
        }

        let connections = self.shared.connections.lock().unwrap();
        for record in connections.values() {
            if record.conn.state() == State::Established {
                let ack = record.conn.expected_peer_seq();
                let fin_ack = crate::codec::Segment::control(
                    crate::codec::Kind::FinAck,
                    record.local_seq,
                    ack,
                );
                let _ = self.shared.link.send(record.addr, &fin_ack);
                self.shared
                    .log
                    .log_segment(self.shared.listen_port, record.addr.port(), &fin_ack, crate::audit::Direction::Send);
                record.conn.set_state(State::Closed);
            }
        }

        Ok(())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.accept_ready.notify_all();
        if let Some(handle) = self.demux_handle.take() {
            let _ = handle.join();
        }
    }
}
