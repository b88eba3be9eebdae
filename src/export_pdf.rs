//! Paginated PDF report.
//!
//! Produces a PDF 1.4 file on A4 paper holding one table: a dark header row
//! with white bold text, repeated on every page, followed by the records on a
//! light fill with a grey grid. Only the two standard Helvetica faces are
//! used, so nothing needs embedding. Text is WinAnsi encoded; characters
//! outside Latin-1 print as `?`.

use std::fmt::Write as _;

use crate::exporter::{ExportFormat, Exporter};
use crate::report::Snapshot;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 40.0;

const TITLE: &str = "Nebula activity log";
const TITLE_SIZE: f32 = 14.0;
const TITLE_BLOCK: f32 = 30.0;

const FONT_SIZE: f32 = 9.0;
const HEADER_HEIGHT: f32 = 20.0;
const ROW_HEIGHT: f32 = 16.0;
const CELL_PADDING: f32 = 4.0;
const ELLIPSIS: &str = "...";

/// Column widths in points, in snapshot column order; they sum to the text width.
const COLUMN_WIDTHS: [f32; 4] = [50.0, 90.0, 245.0, 130.0];

const HEADER_FILL: &str = "0.071 0.071 0.082 rg";
const ROW_FILL: &str = "0.945 0.961 0.976 rg";
const GRID_STROKE: &str = "0.5 0.5 0.5 RG";

const EMPTY_MARKER: &str = "No records";

// Advance widths in 1/1000 em from the Adobe core font metrics, for printable
// ASCII (0x20..=0x7E) and the upper half of Latin-1 (0xA0..=0xFF).
#[rustfmt::skip]
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];
#[rustfmt::skip]
const HELVETICA_LATIN1: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
];
#[rustfmt::skip]
const HELVETICA_BOLD_ASCII: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];
#[rustfmt::skip]
const HELVETICA_BOLD_LATIN1: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 280, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 611, 556, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    722, 722, 722, 722, 722, 722, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 556, 556, 556, 556, 556, 278, 278, 278, 278,
    611, 611, 611, 611, 611, 611, 611, 584, 611, 611, 611, 611, 611, 556, 611, 556,
];

/// The two standard faces the report uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Face {
    Regular,
    Bold,
}

impl Face {
    /// Font resource name in the page dictionary
    fn resource(self) -> &'static str {
        match self {
            Face::Regular => "F1",
            Face::Bold => "F2",
        }
    }

    /// Width in points of `value` once encoded, at `size`.
    fn text_width(self, value: &str, size: f32) -> f32 {
        let (ascii, latin1) = match self {
            Face::Regular => (&HELVETICA_ASCII, &HELVETICA_LATIN1),
            Face::Bold => (&HELVETICA_BOLD_ASCII, &HELVETICA_BOLD_LATIN1),
        };
        let units: u32 = value
            .chars()
            .map(|c| match c as u32 {
                code @ 0x20..=0x7E => u32::from(ascii[(code - 0x20) as usize]),
                code @ 0xA0..=0xFF => u32::from(latin1[(code - 0xA0) as usize]),
                // Anything else is written as '?'.
                _ => u32::from(ascii[usize::from(b'?' - 0x20)]),
            })
            .sum();
        units as f32 * size / 1000.0
    }
}

/// Data rows that fit on one page below the title and header.
pub const ROWS_PER_PAGE: usize =
    ((PAGE_HEIGHT - 2.0 * MARGIN - TITLE_BLOCK - HEADER_HEIGHT) / ROW_HEIGHT) as usize;

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentExporter;

impl Exporter for DocumentExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Document
    }

    fn render(&self, snapshot: &Snapshot) -> std::io::Result<Vec<u8>> {
        let header = snapshot.columns().map(str::to_string);
        let rows: Vec<[String; 4]> = snapshot.rows().collect();
        let subtitle = format!(
            "{} records, generated {}",
            rows.len(),
            snapshot.taken_at().format("%Y-%m-%d %H:%M:%S UTC")
        );

        let pages: Vec<&[[String; 4]]> = if rows.is_empty() {
            vec![&rows[..]]
        } else {
            rows.chunks(ROWS_PER_PAGE).collect()
        };
        let page_count = pages.len();

        let mut doc = PdfWriter::new();
        // Objects 1-4 are fixed; page i uses objects 5 + 2i (page) and 6 + 2i (content).
        let kids: Vec<String> = (0..page_count)
            .map(|i| format!("{} 0 R", page_object(i)))
            .collect();
        doc.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
        doc.object(
            2,
            &format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                page_count
            ),
        );
        doc.object(
            3,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
        );
        doc.object(
            4,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>",
        );

        for (index, page_rows) in pages.iter().enumerate() {
            let content = page_content(&header, page_rows, &subtitle, index + 1, page_count);
            doc.object(
                page_object(index),
                &format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                     /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                    page_object(index) + 1
                ),
            );
            doc.stream(page_object(index) + 1, &content);
        }

        Ok(doc.finish(1))
    }
}

fn page_object(index: usize) -> usize {
    5 + 2 * index
}

fn page_content(
    header: &[String; 4],
    rows: &[[String; 4]],
    subtitle: &str,
    page: usize,
    page_count: usize,
) -> String {
    let mut ops = String::new();
    let table_width: f32 = COLUMN_WIDTHS.iter().sum();
    let top = PAGE_HEIGHT - MARGIN;

    // Title and subtitle
    text(&mut ops, Face::Bold, TITLE_SIZE, MARGIN, top - TITLE_SIZE, TITLE);
    text(&mut ops, Face::Regular, FONT_SIZE, MARGIN, top - TITLE_SIZE - 12.0, subtitle);

    let header_top = top - TITLE_BLOCK;
    let header_bottom = header_top - HEADER_HEIGHT;
    let body_rows = rows.len().max(1);
    let table_bottom = header_bottom - ROW_HEIGHT * body_rows as f32;

    // Fills
    let _ = writeln!(
        ops,
        "{HEADER_FILL} {MARGIN:.2} {header_bottom:.2} {table_width:.2} {HEADER_HEIGHT:.2} re f"
    );
    let _ = writeln!(
        ops,
        "{ROW_FILL} {MARGIN:.2} {table_bottom:.2} {table_width:.2} {:.2} re f",
        header_bottom - table_bottom
    );

    // Header text, baseline raised to leave a deeper bottom padding
    ops.push_str("1 1 1 rg\n");
    let mut x = MARGIN;
    for (cell, width) in header.iter().zip(COLUMN_WIDTHS) {
        let cell = fit(cell, width, Face::Bold);
        text(&mut ops, Face::Bold, FONT_SIZE, x + CELL_PADDING, header_bottom + 8.0, &cell);
        x += width;
    }

    // Body text
    ops.push_str("0 0 0 rg\n");
    if rows.is_empty() {
        text(
            &mut ops,
            Face::Regular,
            FONT_SIZE,
            MARGIN + CELL_PADDING,
            header_bottom - ROW_HEIGHT + 5.0,
            EMPTY_MARKER,
        );
    }
    for (r, row) in rows.iter().enumerate() {
        let baseline = header_bottom - ROW_HEIGHT * (r as f32 + 1.0) + 5.0;
        let mut x = MARGIN;
        for (cell, width) in row.iter().zip(COLUMN_WIDTHS) {
            let cell = fit(cell, width, Face::Regular);
            text(&mut ops, Face::Regular, FONT_SIZE, x + CELL_PADDING, baseline, &cell);
            x += width;
        }
    }

    // Grid
    let _ = writeln!(ops, "{GRID_STROKE} 1 w");
    let mut y = header_top;
    let _ = writeln!(ops, "{MARGIN:.2} {y:.2} m {:.2} {y:.2} l S", MARGIN + table_width);
    y = header_bottom;
    for _ in 0..=body_rows {
        let _ = writeln!(ops, "{MARGIN:.2} {y:.2} m {:.2} {y:.2} l S", MARGIN + table_width);
        y -= ROW_HEIGHT;
    }
    let mut x = MARGIN;
    for width in COLUMN_WIDTHS.iter().chain(std::iter::once(&0.0)) {
        let _ = writeln!(ops, "{x:.2} {header_top:.2} m {x:.2} {table_bottom:.2} l S");
        x += width;
    }

    // Footer
    text(
        &mut ops,
        Face::Regular,
        FONT_SIZE,
        MARGIN,
        MARGIN / 2.0,
        &format!("Page {page} of {page_count}"),
    );

    ops
}

fn text(ops: &mut String, face: Face, size: f32, x: f32, y: f32, value: &str) {
    let _ = writeln!(
        ops,
        "BT /{} {size:.1} Tf {x:.2} {y:.2} Td ({}) Tj ET",
        face.resource(),
        pdf_string(value)
    );
}

/// Truncate `cell` so it fits, padding included, in a column of `width` points.
fn fit(cell: &str, width: f32, face: Face) -> String {
    let available = width - 2.0 * CELL_PADDING;
    let flat: String = cell
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    if face.text_width(&flat, FONT_SIZE) <= available {
        return flat;
    }

    let mut used = face.text_width(ELLIPSIS, FONT_SIZE);
    let mut kept = String::new();
    for c in flat.chars() {
        let advance = face.text_width(c.encode_utf8(&mut [0; 4]), FONT_SIZE);
        if used + advance > available {
            break;
        }
        used += advance;
        kept.push(c);
    }
    kept.push_str(ELLIPSIS);
    kept
}

/// Encode text as the body of a PDF literal string in WinAnsi.
fn pdf_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            '\u{a0}'..='\u{ff}' => {
                let _ = write!(out, "\\{:03o}", c as u32);
            }
            _ => out.push('?'),
        }
    }
    out
}

/// Minimal object writer tracking byte offsets for the xref table.
struct PdfWriter {
    buf: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"%PDF-1.4\n");
        Self {
            buf,
            offsets: Vec::new(),
        }
    }

    // Objects must be written in ascending id order starting at 1.
    fn begin(&mut self, id: usize) {
        debug_assert_eq!(id, self.offsets.len() + 1);
        self.offsets.push(self.buf.len());
        self.buf
            .extend_from_slice(format!("{id} 0 obj\n").as_bytes());
    }

    fn object(&mut self, id: usize, body: &str) {
        self.begin(id);
        self.buf.extend_from_slice(body.as_bytes());
        self.buf.extend_from_slice(b"\nendobj\n");
    }

    fn stream(&mut self, id: usize, content: &str) {
        self.begin(id);
        self.buf
            .extend_from_slice(format!("<< /Length {} >>\nstream\n", content.len()).as_bytes());
        self.buf.extend_from_slice(content.as_bytes());
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
    }

    fn finish(mut self, root: usize) -> Vec<u8> {
        let xref_offset = self.buf.len();
        let size = self.offsets.len() + 1;

        let mut xref = format!("xref\n0 {size}\n0000000000 65535 f \n");
        for offset in &self.offsets {
            let _ = writeln!(xref, "{offset:010} 00000 n ");
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {size} /Root {root} 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n"
        );
        self.buf.extend_from_slice(xref.as_bytes());
        self.buf
    }
}
