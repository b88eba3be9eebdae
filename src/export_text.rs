// Fixed-width plain-text rendering of a snapshot

use crate::exporter::{ExportFormat, Exporter};
use crate::report::Snapshot;

const COLUMN_GAP: &str = "  ";
const EMPTY_MARKER: &str = "(no records)";

#[derive(Debug, Clone, Copy, Default)]
pub struct TextExporter;

impl TextExporter {
    /// Render the table as a UTF-8 string.
    pub fn render_string(&self, snapshot: &Snapshot) -> String {
        let header = snapshot.columns().map(str::to_string);
        let rows: Vec<[String; 4]> = snapshot
            .rows()
            .map(|row| row.map(|cell| flatten(&cell)))
            .collect();

        let mut widths = header.clone().map(|h| h.chars().count());
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        push_line(&mut out, &header, &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(rule.join(COLUMN_GAP).as_str());
        out.push('\n');

        if rows.is_empty() {
            out.push_str(EMPTY_MARKER);
            out.push('\n');
        }
        for row in &rows {
            push_line(&mut out, row, &widths);
        }
        out
    }
}

impl Exporter for TextExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Text
    }

    fn render(&self, snapshot: &Snapshot) -> std::io::Result<Vec<u8>> {
        Ok(self.render_string(snapshot).into_bytes())
    }
}

fn push_line(out: &mut String, cells: &[String; 4], widths: &[usize; 4]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect();
    out.push_str(padded.join(COLUMN_GAP).trim_end());
    out.push('\n');
}

// One record per line: control characters become spaces.
fn flatten(cell: &str) -> String {
    cell.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventRecord;
    use chrono::{TimeZone, Utc};

    #[test]
    fn columns_are_aligned() {
        let ts = Utc.with_ymd_and_hms(2024, 2, 29, 8, 30, 0).unwrap();
        let snapshot = Snapshot::new(vec![
            EventRecord::new(10, "CMD".into(), "Ping Google".into(), ts),
            EventRecord::new(9, "NAV".into(), "Dashboard visitado".into(), ts),
        ]);

        let text = TextExporter.render_string(&snapshot);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "id  category  detail              timestamp"
        );
        assert_eq!(
            lines[2],
            "10  CMD       Ping Google         2024-02-29 08:30:00"
        );
        assert!(lines[3].starts_with("9   NAV       Dashboard visitado"));
    }

    #[test]
    fn empty_snapshot_renders_header_and_marker() {
        let text = TextExporter.render_string(&Snapshot::new(Vec::new()));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "id  category  detail  timestamp");
        assert_eq!(lines[2], "(no records)");
    }

    #[test]
    fn multiline_detail_stays_on_one_row() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let snapshot = Snapshot::new(vec![EventRecord::new(
            1,
            "CMD".into(),
            "line one\nline two".into(),
            ts,
        )]);

        let text = TextExporter.render_string(&snapshot);
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("line one line two"));
    }
}
