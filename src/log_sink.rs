// Diagnostic logging for the binary: a tracing fmt subscriber on stderr

use crate::config::NebulaConfig;
use crate::errors::NebulaResult;

/// Install the global subscriber at the configured level.
///
/// Writes to stderr so command output and text exports on stdout stay clean.
/// Calling it twice keeps the first subscriber.
pub fn init_logging(config: &NebulaConfig) -> NebulaResult<()> {
    let level = config.tracing_level()?;
    let installed = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(%level, "logging initialized");
    }
    Ok(())
}
