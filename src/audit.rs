//! The per-endpoint plain-text audit log (spec.md §6).
//!
//! One line per segment event, in both directions, flushed immediately.
//! This is a wire-format artifact the spec pins down exactly, not a place
//! for a general logging framework to reformat — see `logging` for the
//! ambient operational tracing this is deliberately kept separate from.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::SystemTime;

use crate::codec::{Kind, Segment};
use crate::err::Error;

pub enum Direction {
    Send,
    Recv,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::Send => "SEND",
            Direction::Recv => "RECV",
        }
    }
}

pub struct AuditLog {
    file: Mutex<File>,
}

impl AuditLog {
    pub fn create(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(AuditLog {
            file: Mutex::new(file),
        })
    }

    /// `client_log_<port>.txt` / `log_<port>.txt`, matching the original
    /// protocol's per-endpoint naming.
    pub fn for_client(src_port: u16) -> Result<Self, Error> {
        Self::create(format!("client_log_{src_port}.txt"))
    }

    pub fn for_server(listen_port: u16) -> Result<Self, Error> {
        Self::create(format!("log_{listen_port}.txt"))
    }

    pub fn log_segment(
        &self,
        src_port: u16,
        dst_port: u16,
        segment: &Segment,
        direction: Direction,
    ) {
        self.log(
            src_port,
            dst_port,
            segment.seq,
            segment.ack,
            segment.kind,
            segment.payload.len(),
            direction,
        )
    }

    pub fn log(
        &self,
        src_port: u16,
        dst_port: u16,
        seq: u32,
        ack: u32,
        kind: Kind,
        payload_len: usize,
        direction: Direction,
    ) {
        let line = format!(
            "{} {} {} {} {} {} {} {}\n",
            timestamp(),
            src_port,
            dst_port,
            seq,
            ack,
            kind.as_log_str(),
            payload_len,
            direction.as_str(),
        );

        let mut file = self.file.lock().unwrap();
        // A failed audit write is not a protocol error; the log is a
        // write-only event sink, not persisted state (spec.md §6).
        let _ = file.write_all(line.as_bytes());
        let _ = file.flush();
    }
}

fn timestamp() -> String {
    format_timestamp(SystemTime::now())
}

/// Renders `time` as `YYYY-MM-DD HH:MM:SS.mmm` (spec.md §6), built on
/// `humantime`'s RFC 3339 millisecond formatter rather than a hand-rolled
/// calendar conversion — the same crate `dspeyrer-net`'s `runtime::logger`
/// reaches for to timestamp its own log lines. `humantime` emits
/// `YYYY-MM-DDTHH:MM:SS.mmmZ`; the audit log's fixed format only needs the
/// `T`/`Z` separators swapped for a space and dropped.
fn format_timestamp(time: SystemTime) -> String {
    let rfc3339 = humantime::format_rfc3339_millis(time).to_string();
    rfc3339.trim_end_matches('Z').replace('T', " ")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn epoch_formats_as_new_years_1970() {
        assert_eq!(format_timestamp(SystemTime::UNIX_EPOCH), "1970-01-01 00:00:00.000");
    }

    #[test]
    fn known_timestamp_formats_with_millisecond_precision() {
        // 2021-01-02 03:04:05.250 UTC
        let time = SystemTime::UNIX_EPOCH + std::time::Duration::from_millis(1_609_556_645_250);
        assert_eq!(format_timestamp(time), "2021-01-02 03:04:05.250");
    }

    #[test]
    fn log_file_is_written_and_flushed() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("mrt_audit_test_{}.txt", std::process::id()));
        let log = AuditLog::create(&path).unwrap();

        let segment = Segment::data(1, 2, b"hi".to_vec());
        log.log_segment(4000, 5000, &segment, Direction::Send);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("4000 5000 1 2 DATA 2 SEND"));

        std::fs::remove_file(&path).ok();
    }
}
