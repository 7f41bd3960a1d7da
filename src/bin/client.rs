//! Thin demo CLI driver over [`mrt::Client`]. Not part of the specified
//! core surface (spec.md §6: the client binary's CLI is not part of the
//! core) — it exists so the crate is runnable end-to-end.

use std::env;
use std::net::IpAddr;
use std::process::ExitCode;
use std::str::FromStr;

use mrt::logging;
use mrt::Client;

fn main() -> ExitCode {
    logging::init(log::LevelFilter::Info);

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!(
            "usage: {} <src_port> <dst_host> <dst_port> [message]",
            args[0]
        );
        return ExitCode::FAILURE;
    }

    let src_port: u16 = match args[1].parse() {
        Ok(p) => p,
        Err(_) => {
            eprintln!("invalid src_port: {}", args[1]);
            return ExitCode::FAILURE;
        }
    };
    let dst_addr = match IpAddr::from_str(&args[2]) {
        Ok(a) => a,
        Err(_) => {
            eprintln!("invalid dst_host: {}", args[2]);
            return ExitCode::FAILURE;
        }
    };
    let dst_port: u16 = match args[3].parse() {
        Ok(p) => p,
        Err(_) => {
            eprintln!("invalid dst_port: {}", args[3]);
            return ExitCode::FAILURE;
        }
    };
    let message = args
        .get(4)
        .cloned()
        .unwrap_or_else(|| "hello from the mrt demo client".to_string());

    let mut client = match Client::init(src_port, dst_addr, dst_port, 1024) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to bind client: {e}");
            return ExitCode::FAILURE;
        }
    };

    log::info!("connecting to {dst_addr}:{dst_port}");
    if let Err(e) = client.connect() {
        eprintln!("connect failed: {e}");
        return ExitCode::FAILURE;
    }
    log::info!("connected");

    if let Err(e) = client.send(message.as_bytes()) {
        eprintln!("send failed: {e}");
        return ExitCode::FAILURE;
    }
    println!("sent {} bytes", message.len());

    if let Err(e) = client.close() {
        eprintln!("close reported: {e}");
    }

    ExitCode::SUCCESS
}
