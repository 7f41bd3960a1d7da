//! The lossy-link emulator, mirroring `network.py` from the original
//! implementation: a UDP relay sitting between a client and a server,
//! applying a time-varying packet-loss probability and a per-bit
//! corruption probability read from a schedule file.
//!
//! Entirely outside the protocol core (spec.md §1 treats the link as "an
//! opaque lossy bidirectional datagram pipe") — this binary never parses
//! a [`mrt::codec::Segment`]; it only ever touches raw bytes. The actual
//! forwarding loop lives in [`mrt::link_fault`], shared with the crate's
//! own in-process tests for spec.md §8's S3/S5 scenarios.

use std::env;
use std::fs;
use std::net::{SocketAddr, UdpSocket};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use mrt::link_fault;
use mrt::logging;

/// One entry of the loss schedule: from `at_unix_secs` onward, until the
/// next entry's timestamp, drop datagrams with probability `loss` and
/// flip each bit of a surviving datagram with probability `bit_err`.
struct LossEntry {
    at_unix_secs: i64,
    loss: f64,
    bit_err: f64,
}

fn load_schedule(path: &str) -> Vec<LossEntry> {
    let contents = fs::read_to_string(path).unwrap_or_default();
    let mut schedule: Vec<LossEntry> = contents
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let at_unix_secs = fields.next()?.parse().ok()?;
            let loss = fields.next()?.parse().ok()?;
            let bit_err = fields.next()?.parse().ok()?;
            Some(LossEntry {
                at_unix_secs,
                loss,
                bit_err,
            })
        })
        .collect();
    schedule.sort_by_key(|e| e.at_unix_secs);
    schedule
}

/// The most recent schedule entry whose timestamp has already passed, or
/// a zero-loss default if the schedule is empty or hasn't started yet.
fn current_loss(schedule: &[LossEntry]) -> (f64, f64) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    schedule
        .iter()
        .rev()
        .find(|e| e.at_unix_secs <= now)
        .map(|e| (e.loss, e.bit_err))
        .unwrap_or((0.0, 0.0))
}

fn main() -> ExitCode {
    logging::init(log::LevelFilter::Info);

    let args: Vec<String> = env::args().collect();
    if args.len() < 5 {
        eprintln!(
            "usage: {} <client_facing_port> <server_addr> <server_port> <loss_schedule_file>",
            args[0]
        );
        return ExitCode::FAILURE;
    }

    let client_facing_port: u16 = match args[1].parse() {
        Ok(p) => p,
        Err(_) => {
            eprintln!("invalid client_facing_port: {}", args[1]);
            return ExitCode::FAILURE;
        }
    };
    let server_addr = &args[2];
    let server_port: u16 = match args[3].parse() {
        Ok(p) => p,
        Err(_) => {
            eprintln!("invalid server_port: {}", args[3]);
            return ExitCode::FAILURE;
        }
    };
    let server: SocketAddr = match format!("{server_addr}:{server_port}").parse() {
        Ok(a) => a,
        Err(_) => {
            eprintln!("invalid server address: {server_addr}:{server_port}");
            return ExitCode::FAILURE;
        }
    };
    let schedule = Arc::new(load_schedule(&args[4]));

    let client_facing = match UdpSocket::bind(("0.0.0.0", client_facing_port)) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("failed to bind client-facing socket: {e}");
            return ExitCode::FAILURE;
        }
    };
    let server_facing = match UdpSocket::bind("0.0.0.0:0") {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("failed to bind server-facing socket: {e}");
            return ExitCode::FAILURE;
        }
    };

    let last_client: Arc<Mutex<Option<SocketAddr>>> = Arc::new(Mutex::new(None));
    let running = Arc::new(AtomicBool::new(true));
    let loss_at: link_fault::LossAt = {
        let schedule = Arc::clone(&schedule);
        Arc::new(move || current_loss(&schedule))
    };

    log::info!("relaying datagrams on port {client_facing_port} to {server}");

    let forward = std::thread::spawn({
        let client_facing = Arc::clone(&client_facing);
        let server_facing = Arc::clone(&server_facing);
        let last_client = Arc::clone(&last_client);
        let loss_at = Arc::clone(&loss_at);
        let running = Arc::clone(&running);
        move || {
            link_fault::relay(
                client_facing,
                server_facing,
                last_client,
                Some(server),
                loss_at,
                running,
                Duration::from_millis(100),
                "client->server",
            )
        }
    });

    link_fault::relay(
        server_facing,
        client_facing,
        last_client,
        None,
        loss_at,
        running,
        Duration::from_millis(100),
        "server->client",
    );

    let _ = forward.join();
    ExitCode::SUCCESS
}
