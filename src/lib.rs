//! Line-oriented record-lookup service over TCP.
//!
//! The server loads a fixed-record binary message database fresh for
//! each accepted connection and answers one substring-search query per
//! client line with a block of matching records terminated by a blank
//! line. Sessions are served strictly one at a time.

pub mod config;
pub mod query;
pub mod server;
pub mod session;
pub mod store;
