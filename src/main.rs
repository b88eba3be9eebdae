// Nebula - command-line host for the action log

use std::process::exit;

use clap::Parser;
use tracing::error;

use nebula_log::cli::{dispatch, Cli};
use nebula_log::config::NebulaConfig;
use nebula_log::event_store::EventStore;
use nebula_log::log_sink::init_logging;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = NebulaConfig::load(cli.config.clone())?;
    init_logging(&config)?;

    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let store = match EventStore::open(&config.db_path) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "cannot open the event store");
            eprintln!("Failed to open the action log: {e}");
            exit(1);
        }
    };

    let result = dispatch(cli.command, &store, &config);

    // Fire-and-forget appends from this run must land before the process exits.
    store.flush()?;
    if store.write_failures() > 0 {
        eprintln!("{} log entries could not be saved", store.write_failures());
    }

    result.map_err(Into::into)
}
