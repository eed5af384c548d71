//! mdb-lookup: a line-oriented TCP lookup server.
//!
//! A client connects, the server loads the fixed-record message
//! database fresh for that session, and the client sends one search
//! key per line. Each key is answered with the matching records in
//! database order, terminated by a blank line. Connections are served
//! strictly one at a time.

use mdb_lookup::config::Config;
use mdb_lookup::server::Server;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        database = %config.database.display(),
        host = %config.host,
        port = config.port,
        "Starting mdb-lookup server"
    );

    let server = Server::bind(&config)?;
    info!(address = %server.local_addr()?, "Server listening");

    // The accept loop only returns on a fatal error: listener failure
    // or a database-load failure, both of which terminate the process.
    if let Err(e) = server.run() {
        error!(error = %e, "Server terminated");
        return Err(e.into());
    }

    Ok(())
}
