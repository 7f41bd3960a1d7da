use std::net::SocketAddr;

use crate::conn::State;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for a response")]
    Timeout,

    #[error("segment failed checksum verification")]
    Corrupt,

    #[error("segment shorter than its declared payload length")]
    Truncated,

    #[error("operation requires state {expected:?}, connection is in {actual:?}")]
    WrongState { expected: State, actual: State },

    #[error("connection refused: no SYN-ACK after maximum retries")]
    ConnectionRefused,

    #[error("close handshake exhausted its retry budget, connection forcibly closed")]
    CloseExhausted,

    #[error("payload of {len} bytes exceeds the codec's maximum of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("no peer at {0} has an established connection")]
    UnknownPeer(SocketAddr),

    #[error("server is shutting down")]
    ServerClosed,
}

pub type MrtResult<T> = Result<T, Error>;
