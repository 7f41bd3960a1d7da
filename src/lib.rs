//! Mini Reliable Transport: a reliable, ordered, connection-oriented
//! byte-stream service layered over a UDP datagram socket.
//!
//! The public surface is [`client::Client`] and [`server::Server`]; both
//! are configured via [`config::Params`] and report failures through
//! [`err::Error`]. See `SPEC_FULL.md` for the full design.

pub mod audit;
pub mod client;
pub mod codec;
pub mod config;
pub mod conn;
pub mod err;
pub mod link;
pub mod link_fault;
pub mod logging;
pub mod server;

pub use client::Client;
pub use config::Params;
pub use err::Error;
pub use server::Server;
