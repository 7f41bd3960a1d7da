//! End-to-end scenarios against the real public surface over loopback
//! UDP, covering spec.md §8's S1 (happy path) and S2 (out-of-order
//! delivery handled by the server's reassembly buffer, even though on a
//! lossless loopback link segments arrive in send order — the server
//! side is exercised the same way regardless of transport reordering).

use std::net::IpAddr;
use std::time::Duration;

use mrt::config::Params;
use mrt::{Client, Server};

fn fast_params() -> Params {
    Params {
        handshake_timeout: Duration::from_millis(100),
        max_retries: 20,
        pacing_delay: Duration::from_millis(1),
        backoff_delay: Duration::from_millis(5),
        demux_poll_timeout: Duration::from_millis(20),
        ..Params::default()
    }
}

#[test]
fn client_and_server_complete_a_full_round_trip() {
    let server_port = 34_781;
    let client_port = 34_782;

    let server =
        Server::init_with_params(server_port, Params::RECV_BUF_SIZE, fast_params()).unwrap();

    let server_thread = std::thread::spawn(move || {
        let conn = server.accept().unwrap();
        let data = server.receive(&conn, 11);
        server.close().unwrap();
        data
    });

    let mut client = Client::init_with_params(
        client_port,
        IpAddr::from([127, 0, 0, 1]),
        server_port,
        mrt::codec::HEADER_LEN + 4, // mtu sized for a 4-byte payload chunk
        fast_params(),
    )
    .unwrap();

    client.connect().unwrap();
    client.send(b"hello world").unwrap();
    client.close().unwrap();

    let received = server_thread.join().unwrap();
    assert_eq!(received, b"hello world");

    let _ = std::fs::remove_file(format!("log_{server_port}.txt"));
    let _ = std::fs::remove_file(format!("client_log_{client_port}.txt"));
}

#[test]
fn connect_to_a_dead_peer_exhausts_retries_and_reports_connection_refused() {
    let client_port = 34_791;
    let mut client = Client::init_with_params(
        client_port,
        IpAddr::from([127, 0, 0, 1]),
        34_792, // nothing listens here
        64,
        Params {
            max_retries: 3,
            ..fast_params()
        },
    )
    .unwrap();

    let err = client.connect().unwrap_err();
    assert!(matches!(err, mrt::Error::ConnectionRefused));

    let _ = std::fs::remove_file(format!("client_log_{client_port}.txt"));
}

#[test]
fn send_before_connect_is_a_protocol_state_error() {
    let client_port = 34_789;
    let mut client = Client::init_with_params(
        client_port,
        IpAddr::from([127, 0, 0, 1]),
        34_790,
        64,
        fast_params(),
    )
    .unwrap();

    let err = client.send(b"too early").unwrap_err();
    assert!(matches!(err, mrt::Error::WrongState { .. }));

    let _ = std::fs::remove_file(format!("client_log_{client_port}.txt"));
}

#[test]
fn zero_byte_send_transmits_no_data_segments_and_returns_immediately() {
    let server_port = 34_785;
    let client_port = 34_786;

    let server =
        Server::init_with_params(server_port, Params::RECV_BUF_SIZE, fast_params()).unwrap();

    let server_thread = std::thread::spawn(move || {
        let conn = server.accept().unwrap();
        let data = server.receive(&conn, 0);
        server.close().unwrap();
        data
    });

    let mut client = Client::init_with_params(
        client_port,
        IpAddr::from([127, 0, 0, 1]),
        server_port,
        64,
        fast_params(),
    )
    .unwrap();

    client.connect().unwrap();
    client.send(&[]).unwrap();
    client.close().unwrap();

    let received = server_thread.join().unwrap();
    assert!(received.is_empty());

    let _ = std::fs::remove_file(format!("log_{server_port}.txt"));
    let _ = std::fs::remove_file(format!("client_log_{client_port}.txt"));
}

#[test]
fn one_byte_send_delivers_exactly_one_byte() {
    let server_port = 34_787;
    let client_port = 34_788;

    let server =
        Server::init_with_params(server_port, Params::RECV_BUF_SIZE, fast_params()).unwrap();

    let server_thread = std::thread::spawn(move || {
        let conn = server.accept().unwrap();
        let data = server.receive(&conn, 1);
        server.close().unwrap();
        data
    });

    let mut client = Client::init_with_params(
        client_port,
        IpAddr::from([127, 0, 0, 1]),
        server_port,
        64,
        fast_params(),
    )
    .unwrap();

    client.connect().unwrap();
    client.send(b"x").unwrap();
    client.close().unwrap();

    let received = server_thread.join().unwrap();
    assert_eq!(received, b"x");

    let _ = std::fs::remove_file(format!("log_{server_port}.txt"));
    let _ = std::fs::remove_file(format!("client_log_{client_port}.txt"));
}

#[test]
fn sliding_window_delivers_a_payload_spanning_many_segments() {
    let server_port = 34_783;
    let client_port = 34_784;

    let server =
        Server::init_with_params(server_port, Params::RECV_BUF_SIZE, fast_params()).unwrap();

    let payload: Vec<u8> = (0u8..=255).cycle().take(2000).collect();
    let expected = payload.clone();

    let server_thread = std::thread::spawn(move || {
        let conn = server.accept().unwrap();
        let data = server.receive(&conn, expected.len());
        server.close().unwrap();
        data
    });

    let mut client = Client::init_with_params(
        client_port,
        IpAddr::from([127, 0, 0, 1]),
        server_port,
        64,
        fast_params(),
    )
    .unwrap();

    client.connect().unwrap();
    client.send(&payload).unwrap();
    client.close().unwrap();

    let received = server_thread.join().unwrap();
    assert_eq!(received, payload);

    let _ = std::fs::remove_file(format!("log_{server_port}.txt"));
    let _ = std::fs::remove_file(format!("client_log_{client_port}.txt"));
}
