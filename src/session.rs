//! Per-connection session handling.
//!
//! A session runs the full lifecycle of one accepted connection: load a
//! fresh record store, answer query lines until the client disconnects,
//! then release the store. Results are streamed incrementally; a block
//! is always closed with a single blank line, even with zero matches.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::path::Path;
use tracing::{debug, trace, warn};

use crate::query;
use crate::store::{LoadError, Record, RecordStore};

/// Run one complete session over `stream`.
///
/// The record store is loaded fresh for this session and dropped when
/// the session ends. A load failure propagates to the caller and is
/// fatal to the whole process by contract; client-side EOF and I/O
/// errors end the session cleanly and are only logged server-side.
pub fn run(stream: TcpStream, db_path: &Path) -> Result<(), LoadError> {
    let store = RecordStore::load(db_path)?;

    let mut reader = BufReader::new(&stream);
    let mut writer = &stream;
    serve_queries(&mut reader, &mut writer, &store);

    // Store and connection are released here.
    Ok(())
}

/// Upper bound on one line read. A longer run without a newline is
/// consumed in chunks, each handled as its own query; anything past the
/// key length is discarded by normalization anyway.
const MAX_LINE_LENGTH: u64 = 1000;

/// The query loop: read a line, stream its result block, repeat until
/// end-of-stream or a read error.
fn serve_queries<R: BufRead, W: Write>(reader: &mut R, writer: &mut W, store: &RecordStore) {
    let mut line = Vec::with_capacity(1024);

    loop {
        line.clear();
        match (&mut *reader).take(MAX_LINE_LENGTH).read_until(b'\n', &mut line) {
            Ok(0) => {
                trace!("Client closed connection");
                return;
            }
            Ok(_) => {
                let key = query::normalize(&line);
                process_query(writer, store, key);
            }
            Err(e) => {
                warn!(error = %e, "Read from client failed, ending session");
                return;
            }
        }
    }
}

/// Scan the store for `key`, streaming one formatted line per match in
/// store order, then terminate the block with a blank line.
///
/// A failed write aborts only the remainder of this query's scan; the
/// session continues with the next query.
fn process_query<W: Write>(writer: &mut W, store: &RecordStore, key: &[u8]) {
    let mut hits = 0usize;

    for (position, record) in store.iter().enumerate() {
        if query::matches(record, key) {
            let result = format_match(position + 1, record);
            if let Err(e) = writer.write_all(result.as_bytes()) {
                warn!(error = %e, "Write to client failed, dropping remaining results");
                break;
            }
            hits += 1;
        }
    }

    // Blank line marks the end of the result block, matched or not.
    if let Err(e) = writer.write_all(b"\n").and_then(|()| writer.flush()) {
        warn!(error = %e, "Failed to terminate result block");
    }

    debug!(
        key = %String::from_utf8_lossy(key),
        hits,
        records = store.len(),
        "Query processed"
    );
}

/// Format one result line: a 4-character right-justified 1-based store
/// index, then the name and message fields.
fn format_match(index: usize, record: &Record) -> String {
    format!(
        "{:4}: {{{}}} said {{{}}}\n",
        index,
        String::from_utf8_lossy(record.name()),
        String::from_utf8_lossy(record.message())
    )
}
