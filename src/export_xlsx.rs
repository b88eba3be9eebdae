// Workbook export: one sheet, header row, one row per record
//
// The workbook is assembled directly as an Office Open XML package inside a
// zip archive; cells are inline strings except the numeric id column.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::exporter::{ExportFormat, Exporter};
use crate::report::Snapshot;

/// Sheet name shown in spreadsheet applications
pub const SHEET_NAME: &str = "Logs";
/// Archive path of the only worksheet
pub const SHEET_PATH: &str = "xl/worksheets/sheet1.xml";

const COLUMN_LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

// Style 1 is the bold header cell.
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/></cellXfs></styleSheet>"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadsheetExporter;

impl Exporter for SpreadsheetExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Spreadsheet
    }

    fn render(&self, snapshot: &Snapshot) -> std::io::Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let parts: [(&str, String); 6] = [
            ("[Content_Types].xml", CONTENT_TYPES.to_string()),
            ("_rels/.rels", ROOT_RELS.to_string()),
            ("xl/workbook.xml", workbook_xml()),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
            ("xl/styles.xml", STYLES.to_string()),
            (SHEET_PATH, sheet_xml(snapshot)),
        ];

        for (name, body) in parts {
            zip.start_file(name, options)?;
            zip.write_all(body.as_bytes())?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

fn workbook_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{SHEET_NAME}" sheetId="1" r:id="rId1"/></sheets></workbook>"#
    )
}

fn sheet_xml(snapshot: &Snapshot) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    xml.push_str(r#"<row r="1">"#);
    for (col, name) in COLUMN_LETTERS.iter().zip(snapshot.columns()) {
        push_string_cell(&mut xml, *col, 1, name, Some(1));
    }
    xml.push_str("</row>");

    for (index, record) in snapshot.records().iter().enumerate() {
        let row = index + 2;
        xml.push_str(&format!(r#"<row r="{row}">"#));
        xml.push_str(&format!(r#"<c r="A{row}"><v>{}</v></c>"#, record.id));
        push_string_cell(&mut xml, 'B', row, &record.category, None);
        push_string_cell(&mut xml, 'C', row, &record.detail, None);
        push_string_cell(&mut xml, 'D', row, &record.timestamp_text(), None);
        xml.push_str("</row>");
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn push_string_cell(xml: &mut String, col: char, row: usize, text: &str, style: Option<u8>) {
    let style = style.map(|s| format!(r#" s="{s}""#)).unwrap_or_default();
    xml.push_str(&format!(
        r#"<c r="{col}{row}" t="inlineStr"{style}><is><t xml:space="preserve">{}</t></is></c>"#,
        escape_xml(text)
    ));
}

/// Escape markup characters and drop code points XML 1.0 cannot carry.
fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_and_strips_control_characters() {
        assert_eq!(escape_xml("D:<1> & \"U\""), "D:&lt;1&gt; &amp; &quot;U&quot;");
        assert_eq!(escape_xml("a\u{1}b\tc"), "ab\tc");
    }

    #[test]
    fn empty_snapshot_has_header_row_only() {
        let xml = sheet_xml(&Snapshot::new(Vec::new()));
        assert_eq!(xml.matches("<row ").count(), 1);
        assert!(xml.contains(r#"<c r="D1" t="inlineStr" s="1"><is><t xml:space="preserve">timestamp</t></is></c>"#));
    }
}
