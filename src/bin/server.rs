//! Thin CLI driver over [`mrt::Server`], mirroring the original
//! `app_server_large.py`: bind a listening port, accept one peer, read a
//! fixed-size payload from it, report the byte count, and shut down.

use std::env;
use std::process::ExitCode;

use mrt::logging;
use mrt::Server;

fn main() -> ExitCode {
    logging::init(log::LevelFilter::Info);

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: {} <port> <buffer_size> [read_len]", args[0]);
        return ExitCode::FAILURE;
    }

    let port: u16 = match args[1].parse() {
        Ok(p) => p,
        Err(_) => {
            eprintln!("invalid port: {}", args[1]);
            return ExitCode::FAILURE;
        }
    };
    let buffer_size: usize = match args[2].parse() {
        Ok(b) => b,
        Err(_) => {
            eprintln!("invalid buffer size: {}", args[2]);
            return ExitCode::FAILURE;
        }
    };
    let read_len: usize = args
        .get(3)
        .and_then(|s| s.parse().ok())
        .unwrap_or(532_655);

    let server = match Server::init(port, buffer_size) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to start server: {e}");
            return ExitCode::FAILURE;
        }
    };

    log::info!("listening on port {port}, waiting for a peer");
    let conn = match server.accept() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("accept failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    log::info!("accepted connection from {}", conn.peer_addr());

    let data = server.receive(&conn, read_len);
    println!("received {} bytes", data.len());

    if let Err(e) = server.close() {
        eprintln!("close reported: {e}");
    }

    ExitCode::SUCCESS
}
