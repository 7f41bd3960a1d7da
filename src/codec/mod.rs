//! Segment framing: the fixed-layout frame, its checksum, and encode/decode.
//!
//! Layout (network byte order for binary fields):
//!
//! ```text
//! offset  size  field
//!  0      1     kind
//!  1      4     seq
//!  5      4     ack
//!  9      8     checksum (ASCII hex)
//! 17      4     payload_len (zero-padded decimal ASCII)
//! 21      P     payload
//! ```
//!
//! Both peers use a four-digit `payload_len` field (`LEN_WIDTH`). The
//! original protocol this one is descended from let the client emit three
//! digits and the server parse four; that asymmetry would silently corrupt
//! any transfer and is not reproduced here (SPEC_FULL.md §4.1, §9).

mod segment;

pub use segment::{Kind, Segment, HEADER_LEN};
