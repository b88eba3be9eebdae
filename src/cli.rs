use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::actions::{self, HostInfo, NetworkCommand, Page, SpeedTestResult};
use crate::config::NebulaConfig;
use crate::errors::NebulaResult;
use crate::event_store::EventStore;
use crate::export_text::TextExporter;
use crate::exporter::{self, ExportFormat};
use crate::report::{ReportBuilder, SnapshotSource};

/// Top-level CLI interface for Nebula
#[derive(Parser, Debug)]
#[command(name = "nebula", version, about = "Local network toolbox with an action log")]
pub struct Cli {
    /// Config file (defaults to nebula.toml, or $NEBULA_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Append one event to the log and wait until it is stored
    Record { category: String, detail: String },

    /// Print the log, most recent first
    Logs,

    /// Export the log as txt, xlsx or pdf
    Export {
        #[arg(short, long, default_value = "txt")]
        format: ExportFormat,
        /// Destination file (defaults to <export_dir>/nebula_logs.<ext>)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Run one of the built-in network commands and log it
    Run {
        /// flush-dns, register-dns, release-ip, renew-ip, ping-google or ping-cloudflare
        command: NetworkCommand,
    },

    /// Show host information
    Info,

    /// Log the figures of a speed test measured elsewhere
    Speed {
        #[arg(long)]
        download: f64,
        #[arg(long)]
        upload: f64,
        #[arg(long)]
        ping: f64,
    },
}

/// Execute one subcommand against an already opened store.
pub fn dispatch(command: Commands, store: &EventStore, config: &NebulaConfig) -> NebulaResult<()> {
    match command {
        Commands::Record { category, detail } => {
            let record = store.append(category, detail).wait()?;
            println!("{record}");
        }
        Commands::Logs => {
            actions::record_navigation(store, Page::Logs);
            let snapshot = ReportBuilder::new(store.clone()).snapshot()?;
            print!("{}", TextExporter.render_string(&snapshot));
        }
        Commands::Export { format, out } => {
            let destination = out.unwrap_or_else(|| {
                config
                    .export_dir
                    .join(format!("nebula_logs.{}", format.extension()))
            });
            let snapshot = ReportBuilder::new(store.clone()).snapshot()?;
            let summary = exporter::export(format, &snapshot, &destination)?;
            println!(
                "Exported {} records to {}",
                summary.rows,
                summary.destination.display()
            );
        }
        Commands::Run { command } => {
            actions::record_navigation(store, Page::Tools);
            println!("> {}", command.display_name());
            let output = actions::run_command(store, command, config.ping_count)?;
            print!("{}", output.output);
            if !output.success {
                eprintln!("{} exited with a failure status", command.display_name());
            }
        }
        Commands::Info => {
            actions::record_navigation(store, Page::Dashboard);
            println!("{}", HostInfo::probe());
        }
        Commands::Speed {
            download,
            upload,
            ping,
        } => {
            actions::record_navigation(store, Page::Speed);
            let result = SpeedTestResult {
                download_mbps: download,
                upload_mbps: upload,
                ping_ms: ping,
            };
            actions::record_speed_test(store, &result);
            println!("{}", result.detail());
        }
    }
    Ok(())
}
