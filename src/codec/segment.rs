use md5::{Digest, Md5};

use crate::config::Params;
use crate::err::Error;

/// One octet on the wire, tagging the kind of segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Syn,
    SynAck,
    Ack,
    Data,
    Fin,
    FinAck,
}

impl Kind {
    fn to_u8(self) -> u8 {
        match self {
            Kind::Syn => 0,
            Kind::SynAck => 1,
            Kind::Ack => 2,
            Kind::Data => 3,
            Kind::Fin => 4,
            Kind::FinAck => 5,
        }
    }

    fn from_u8(b: u8) -> Option<Kind> {
        match b {
            0 => Some(Kind::Syn),
            1 => Some(Kind::SynAck),
            2 => Some(Kind::Ack),
            3 => Some(Kind::Data),
            4 => Some(Kind::Fin),
            5 => Some(Kind::FinAck),
            _ => None,
        }
    }

    /// The textual name used in the audit log (spec.md §6).
    pub fn as_log_str(self) -> &'static str {
        match self {
            Kind::Syn => "SYN",
            Kind::SynAck => "SYN-ACK",
            Kind::Ack => "ACK",
            Kind::Data => "DATA",
            Kind::Fin => "FIN",
            Kind::FinAck => "FIN-ACK",
        }
    }
}

const KIND_LEN: usize = 1;
const SEQ_LEN: usize = 4;
const ACK_LEN: usize = 4;
const CHECKSUM_LEN: usize = 8;

/// Fixed header length with the default four-digit length field.
pub const HEADER_LEN: usize = KIND_LEN + SEQ_LEN + ACK_LEN + CHECKSUM_LEN + Params::LEN_WIDTH;

/// One protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: Kind,
    pub seq: u32,
    pub ack: u32,
    pub payload: Vec<u8>,
}

impl Segment {
    pub fn control(kind: Kind, seq: u32, ack: u32) -> Self {
        Segment {
            kind,
            seq,
            ack,
            payload: Vec::new(),
        }
    }

    pub fn data(seq: u32, ack: u32, payload: Vec<u8>) -> Self {
        Segment {
            kind: Kind::Data,
            seq,
            ack,
            payload,
        }
    }

    /// Serialize this segment with a `len_width`-digit length field.
    ///
    /// Builds the frame without a checksum, computes the checksum over the
    /// excised frame, then splices it into its fixed slot, mirroring the
    /// original protocol's two-pass construction.
    pub fn encode(&self, len_width: usize) -> Vec<u8> {
        let payload_len = self.payload.len();

        let mut without_checksum = Vec::with_capacity(
            KIND_LEN + SEQ_LEN + ACK_LEN + len_width + payload_len,
        );
        without_checksum.push(self.kind.to_u8());
        without_checksum.extend_from_slice(&self.seq.to_be_bytes());
        without_checksum.extend_from_slice(&self.ack.to_be_bytes());
        without_checksum.extend_from_slice(
            format!("{:0width$}", payload_len, width = len_width).as_bytes(),
        );
        without_checksum.extend_from_slice(&self.payload);

        let checksum = checksum_hex(&without_checksum);

        let mut frame = Vec::with_capacity(without_checksum.len() + CHECKSUM_LEN);
        frame.extend_from_slice(&without_checksum[..KIND_LEN + SEQ_LEN + ACK_LEN]);
        frame.extend_from_slice(checksum.as_bytes());
        frame.extend_from_slice(&without_checksum[KIND_LEN + SEQ_LEN + ACK_LEN..]);
        frame
    }

    /// Parse a received frame, verifying its checksum.
    ///
    /// Every failure mode here leaves the caller free to treat the frame as
    /// indistinguishable from packet loss (spec.md §8, property 3): no
    /// partial `Segment` is ever handed back.
    pub fn decode(bytes: &[u8], len_width: usize) -> Result<Segment, Error> {
        let fixed_len = KIND_LEN + SEQ_LEN + ACK_LEN + CHECKSUM_LEN + len_width;
        if bytes.len() < fixed_len {
            return Err(Error::Truncated);
        }

        let kind_byte = bytes[0];
        let seq = u32::from_be_bytes(bytes[1..5].try_into().unwrap());
        let ack = u32::from_be_bytes(bytes[5..9].try_into().unwrap());

        let checksum_slot = &bytes[9..17];
        if !checksum_slot.iter().all(u8::is_ascii_hexdigit) {
            return Err(Error::Corrupt);
        }
        let received_checksum = std::str::from_utf8(checksum_slot).unwrap();

        let mut excised = Vec::with_capacity(bytes.len() - CHECKSUM_LEN);
        excised.extend_from_slice(&bytes[..9]);
        excised.extend_from_slice(&bytes[17..]);
        let computed_checksum = checksum_hex(&excised);

        if computed_checksum != received_checksum {
            return Err(Error::Corrupt);
        }

        let len_slot = &bytes[17..17 + len_width];
        let len_str = std::str::from_utf8(len_slot).map_err(|_| Error::Corrupt)?;
        let payload_len: usize = len_str.parse().map_err(|_| Error::Corrupt)?;

        let payload_start = fixed_len;
        if bytes.len() < payload_start + payload_len {
            return Err(Error::Truncated);
        }

        let kind = Kind::from_u8(kind_byte).ok_or(Error::Corrupt)?;
        let payload = bytes[payload_start..payload_start + payload_len].to_vec();

        Ok(Segment {
            kind,
            seq,
            ack,
            payload,
        })
    }
}

/// First eight hex characters of the MD5 digest, matching the original
/// protocol's checksum (spec.md §4.1 design rationale: MD5 is used purely
/// as a convenient, collision-resistant-enough integrity hash for random
/// bit flips, not as a cryptographic defense).
fn checksum_hex(data: &[u8]) -> String {
    let digest = Md5::digest(data);
    digest[..4]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_a_data_segment() {
        let original = Segment::data(7, 3, b"hello world".to_vec());
        let bytes = original.encode(Params::LEN_WIDTH);
        let decoded = Segment::decode(&bytes, Params::LEN_WIDTH).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn round_trips_every_control_kind() {
        for kind in [
            Kind::Syn,
            Kind::SynAck,
            Kind::Ack,
            Kind::Fin,
            Kind::FinAck,
        ] {
            let original = Segment::control(kind, 42, 99);
            let bytes = original.encode(Params::LEN_WIDTH);
            let decoded = Segment::decode(&bytes, Params::LEN_WIDTH).unwrap();
            assert_eq!(original, decoded);
        }
    }

    #[test]
    fn round_trips_zero_length_payload() {
        let original = Segment::data(1, 0, Vec::new());
        let bytes = original.encode(Params::LEN_WIDTH);
        let decoded = Segment::decode(&bytes, Params::LEN_WIDTH).unwrap();
        assert_eq!(original, decoded);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn rejects_truncated_header() {
        let bytes = vec![0u8; HEADER_LEN - 1];
        assert!(matches!(
            Segment::decode(&bytes, Params::LEN_WIDTH),
            Err(Error::Truncated)
        ));
    }

    #[test]
    fn rejects_a_frame_one_byte_short_of_its_declared_payload() {
        let segment = Segment::data(1, 0, vec![1, 2, 3, 4]);
        let mut bytes = segment.encode(Params::LEN_WIDTH);
        bytes.pop();
        assert!(matches!(
            Segment::decode(&bytes, Params::LEN_WIDTH),
            Err(Error::Truncated)
        ));
    }

    #[test]
    fn rejects_checksum_mismatch() {
        let segment = Segment::data(1, 0, b"payload".to_vec());
        let mut bytes = segment.encode(Params::LEN_WIDTH);
        // Flip a payload byte without touching the checksum.
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(matches!(
            Segment::decode(&bytes, Params::LEN_WIDTH),
            Err(Error::Corrupt)
        ));
    }

    #[test]
    fn rejects_non_hex_checksum_slot() {
        let segment = Segment::data(1, 0, b"payload".to_vec());
        let mut bytes = segment.encode(Params::LEN_WIDTH);
        bytes[9] = b'z';
        assert!(matches!(
            Segment::decode(&bytes, Params::LEN_WIDTH),
            Err(Error::Corrupt)
        ));
    }

    #[test]
    fn rejects_non_decimal_length_field() {
        let segment = Segment::data(1, 0, b"payload".to_vec());
        let mut bytes = segment.encode(Params::LEN_WIDTH);
        // Corrupting the length digits also moves the checksum out of
        // agreement, so this is caught by the checksum check first, same
        // as the original implementation's ordering.
        let len_field_start = 17;
        bytes[len_field_start] = b'?';
        assert!(matches!(
            Segment::decode(&bytes, Params::LEN_WIDTH),
            Err(Error::Corrupt)
        ));
    }
}
