//! End-to-end tests driving the wire protocol over real TCP sockets.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use mdb_lookup::config::Config;
use mdb_lookup::server::{Server, ServerError};
use mdb_lookup::store::{NAME_WIDTH, RECORD_WIDTH};

use tempfile::NamedTempFile;

/// Write a database file of fixed-width records.
fn write_db(entries: &[(&str, &str)]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for (name, message) in entries {
        let mut rec = vec![0u8; RECORD_WIDTH];
        rec[..name.len()].copy_from_slice(name.as_bytes());
        rec[NAME_WIDTH..NAME_WIDTH + message.len()].copy_from_slice(message.as_bytes());
        file.write_all(&rec).unwrap();
    }
    file.flush().unwrap();
    file
}

/// Bind on an ephemeral port and run the accept loop on a background
/// thread. The loop's exit result is observable through the channel.
fn start_server(db_path: &Path) -> (SocketAddr, mpsc::Receiver<Result<(), ServerError>>) {
    let config = Config {
        database: db_path.to_path_buf(),
        port: 0,
        host: "127.0.0.1".to_string(),
        log_level: "warn".to_string(),
    };

    let server = Server::bind(&config).unwrap();
    let addr = server.local_addr().unwrap();

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(server.run());
    });

    (addr, rx)
}

/// Read one result block: lines up to and excluding the blank terminator.
fn read_block(reader: &mut impl BufRead) -> Vec<String> {
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).unwrap();
        assert_ne!(n, 0, "connection closed before end of result block");
        if line == "\n" {
            return lines;
        }
        lines.push(line.trim_end_matches('\n').to_string());
    }
}

#[test]
fn test_query_and_result_blocks() {
    let db = write_db(&[("alice", "hello world"), ("bob", "foo"), ("alice2", "bar")]);
    let (addr, _rx) = start_server(db.path());

    let stream = TcpStream::connect(addr).unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = stream;

    // Substring match in name: store positions, not match ranks.
    writer.write_all(b"alice\n").unwrap();
    assert_eq!(
        read_block(&mut reader),
        [
            "   1: {alice} said {hello world}",
            "   3: {alice2} said {bar}"
        ]
    );

    // Empty query returns the whole store in load order.
    writer.write_all(b"\n").unwrap();
    assert_eq!(
        read_block(&mut reader),
        [
            "   1: {alice} said {hello world}",
            "   2: {bob} said {foo}",
            "   3: {alice2} said {bar}"
        ]
    );

    // No match: the block is just the blank line.
    writer.write_all(b"zzz\n").unwrap();
    assert!(read_block(&mut reader).is_empty());

    // Keys longer than the maximum are truncated, not rejected.
    writer.write_all(b"alicemuchtoolong\n").unwrap();
    assert_eq!(
        read_block(&mut reader),
        [
            "   1: {alice} said {hello world}",
            "   3: {alice2} said {bar}"
        ]
    );
}

#[test]
fn test_sequential_sessions_reload_the_store() {
    let db = write_db(&[("bob", "foo")]);
    let (addr, _rx) = start_server(db.path());

    for _ in 0..2 {
        let stream = TcpStream::connect(addr).unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;

        writer.write_all(b"bob\n").unwrap();
        assert_eq!(read_block(&mut reader), ["   1: {bob} said {foo}"]);
        // Stream drops here, ending the session.
    }
}

#[test]
fn test_session_with_no_queries_closes_cleanly() {
    let db = write_db(&[("bob", "foo")]);
    let (addr, _rx) = start_server(db.path());

    // Connect and immediately close without sending anything.
    drop(TcpStream::connect(addr).unwrap());

    // The server must still accept and serve the next session.
    let stream = TcpStream::connect(addr).unwrap();
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut writer = stream;

    writer.write_all(b"foo\n").unwrap();
    assert_eq!(read_block(&mut reader), ["   1: {bob} said {foo}"]);
}

#[test]
fn test_truncated_database_is_fatal() {
    let mut db = NamedTempFile::new().unwrap();
    db.write_all(&vec![0u8; RECORD_WIDTH + 3]).unwrap();
    db.flush().unwrap();

    let (addr, rx) = start_server(db.path());

    // The load happens at session start, so the failure surfaces on the
    // first connection and takes down the whole accept loop.
    let mut stream = TcpStream::connect(addr).unwrap();
    let mut leftover = Vec::new();
    let _ = stream.read_to_end(&mut leftover);
    assert!(leftover.is_empty(), "no error text is sent to the client");

    match rx.recv().unwrap() {
        Err(ServerError::Load(_)) => {}
        other => panic!("unexpected accept-loop result: {other:?}"),
    }
}
