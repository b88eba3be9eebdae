// Export surface: turns a snapshot into a file at a caller-chosen destination
//
// Exporters only render bytes; the file is produced here, through a temporary
// sibling that is renamed over the destination once fully written.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::info;

use crate::errors::{NebulaError, NebulaResult};
use crate::export_text::TextExporter;
use crate::report::Snapshot;

#[cfg(feature = "document")]
use crate::export_pdf::DocumentExporter;
#[cfg(feature = "spreadsheet")]
use crate::export_xlsx::SpreadsheetExporter;

/// Output formats offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Text,
    Spreadsheet,
    Document,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [
        ExportFormat::Text,
        ExportFormat::Spreadsheet,
        ExportFormat::Document,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Spreadsheet => "xlsx",
            ExportFormat::Document => "pdf",
        }
    }

    /// Name of the cargo feature providing this format, if any.
    pub fn capability(self) -> Option<&'static str> {
        match self {
            ExportFormat::Text => None,
            ExportFormat::Spreadsheet => Some("spreadsheet"),
            ExportFormat::Document => Some("document"),
        }
    }

    /// Resolve the exporter for this format.
    ///
    /// Formats compiled out of this build report
    /// [`NebulaError::CapabilityUnavailable`] rather than writing nothing.
    pub fn exporter(self) -> NebulaResult<Box<dyn Exporter>> {
        match self {
            ExportFormat::Text => Ok(Box::new(TextExporter)),
            ExportFormat::Spreadsheet => spreadsheet_exporter(),
            ExportFormat::Document => document_exporter(),
        }
    }

    pub fn is_available(self) -> bool {
        self.exporter().is_ok()
    }
}

#[cfg(feature = "spreadsheet")]
fn spreadsheet_exporter() -> NebulaResult<Box<dyn Exporter>> {
    Ok(Box::new(SpreadsheetExporter))
}

#[cfg(not(feature = "spreadsheet"))]
fn spreadsheet_exporter() -> NebulaResult<Box<dyn Exporter>> {
    Err(NebulaError::capability_unavailable("spreadsheet"))
}

#[cfg(feature = "document")]
fn document_exporter() -> NebulaResult<Box<dyn Exporter>> {
    Ok(Box::new(DocumentExporter))
}

#[cfg(not(feature = "document"))]
fn document_exporter() -> NebulaResult<Box<dyn Exporter>> {
    Err(NebulaError::capability_unavailable("document"))
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ExportFormat::Text),
            "xlsx" | "excel" | "spreadsheet" => Ok(ExportFormat::Spreadsheet),
            "pdf" | "document" => Ok(ExportFormat::Document),
            other => Err(format!("unknown export format '{other}' (expected txt, xlsx or pdf)")),
        }
    }
}

/// Renders a snapshot into the bytes of one file format.
///
/// Implementations are pure: same snapshot, same bytes. They never touch the
/// event store.
pub trait Exporter: Send + Sync {
    fn format(&self) -> ExportFormat;

    fn render(&self, snapshot: &Snapshot) -> std::io::Result<Vec<u8>>;
}

/// Outcome of a finished export
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub format: ExportFormat,
    pub destination: PathBuf,
    pub rows: usize,
    pub bytes: usize,
}

/// Render `snapshot` with `exporter` and place it at `destination`.
pub fn export_with(
    exporter: &dyn Exporter,
    snapshot: &Snapshot,
    destination: &Path,
) -> NebulaResult<ExportSummary> {
    let bytes = exporter
        .render(snapshot)
        .map_err(|e| NebulaError::export_io(destination, e))?;
    write_atomically(destination, &bytes)?;

    let summary = ExportSummary {
        format: exporter.format(),
        destination: destination.to_path_buf(),
        rows: snapshot.len(),
        bytes: bytes.len(),
    };
    info!(
        format = %summary.format,
        destination = %summary.destination.display(),
        rows = summary.rows,
        "export written"
    );
    Ok(summary)
}

pub fn export(
    format: ExportFormat,
    snapshot: &Snapshot,
    destination: &Path,
) -> NebulaResult<ExportSummary> {
    let exporter = format.exporter()?;
    export_with(exporter.as_ref(), snapshot, destination)
}

/// Plain-text table export
pub fn export_text(snapshot: &Snapshot, destination: &Path) -> NebulaResult<ExportSummary> {
    export(ExportFormat::Text, snapshot, destination)
}

/// Spreadsheet (xlsx) export
pub fn export_tabular(snapshot: &Snapshot, destination: &Path) -> NebulaResult<ExportSummary> {
    export(ExportFormat::Spreadsheet, snapshot, destination)
}

/// Paginated PDF export
pub fn export_document(snapshot: &Snapshot, destination: &Path) -> NebulaResult<ExportSummary> {
    export(ExportFormat::Document, snapshot, destination)
}

fn write_atomically(destination: &Path, bytes: &[u8]) -> NebulaResult<()> {
    let io_err = |e: std::io::Error| NebulaError::export_io(destination, e);

    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = tempfile::Builder::new()
        .prefix(".nebula-export-")
        .tempfile_in(dir)
        .map_err(io_err)?;
    staged.write_all(bytes).map_err(io_err)?;
    staged.as_file().sync_all().map_err(io_err)?;
    staged.persist(destination).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_parse_case_insensitively() {
        assert_eq!("TXT".parse::<ExportFormat>(), Ok(ExportFormat::Text));
        assert_eq!("Excel".parse::<ExportFormat>(), Ok(ExportFormat::Spreadsheet));
        assert_eq!("pdf".parse::<ExportFormat>(), Ok(ExportFormat::Document));
        assert!("docx".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn text_export_is_always_available() {
        assert!(ExportFormat::Text.is_available());
        assert_eq!(ExportFormat::Text.capability(), None);
    }

    #[cfg(not(feature = "document"))]
    #[test]
    fn missing_document_support_is_reported() {
        let err = ExportFormat::Document.exporter().err().unwrap();
        assert!(matches!(err, NebulaError::CapabilityUnavailable { .. }));
    }

    #[test]
    fn failed_export_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("missing").join("logs.txt");
        let snapshot = Snapshot::new(Vec::new());

        let err = export_text(&snapshot, &destination).unwrap_err();
        assert!(matches!(err, NebulaError::ExportIo { .. }));
        assert!(!destination.exists());
    }
}
