//! Tabular formats rendered as text: CSV and spreadsheet workbooks.
//!
//! Rows are joined with ` | `; a workbook gets a `# Sheet: <name>` header per
//! sheet. Cell values are copied as text, nothing is computed.

use super::{decode, DocFormat, EngineOutput, ExtractionEngine};

/// Maximum sheets rendered from one workbook.
pub(crate) const MAX_SHEETS: usize = 100;
/// Maximum cells rendered per sheet.
pub(crate) const MAX_CELLS_PER_SHEET: usize = 100_000;

const CELL_SEPARATOR: &str = " | ";

pub struct CsvEngine;

impl ExtractionEngine for CsvEngine {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn formats(&self) -> &'static [DocFormat] {
        &[DocFormat::Csv]
    }

    fn extract(&self, bytes: &[u8]) -> EngineOutput {
        let decoded = decode::decode_bytes(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(decoded.text.as_bytes());

        let mut lines = Vec::new();
        let mut skipped = 0usize;
        for record in reader.records() {
            match record {
                Ok(record) => {
                    let line = record
                        .iter()
                        .map(str::trim)
                        .collect::<Vec<_>>()
                        .join(CELL_SEPARATOR);
                    if !line.replace('|', "").trim().is_empty() {
                        lines.push(line);
                    }
                }
                Err(e) => {
                    skipped += 1;
                    tracing::debug!(error = %e, "skipping malformed csv record");
                }
            }
        }

        EngineOutput {
            text: lines.join("\n"),
            encoding: Some(decoded.encoding.to_string()),
            note: (skipped > 0).then(|| format!("{} malformed csv rows skipped", skipped)),
            ..EngineOutput::default()
        }
    }
}

#[cfg(feature = "spreadsheet")]
pub use spreadsheet::SpreadsheetEngine;

#[cfg(feature = "spreadsheet")]
mod spreadsheet {
    use std::io::Cursor;

    use calamine::{Data, Reader};

    use super::{CELL_SEPARATOR, MAX_CELLS_PER_SHEET, MAX_SHEETS};
    use crate::extract::{DocFormat, EngineOutput, ExtractionEngine};

    pub struct SpreadsheetEngine;

    impl ExtractionEngine for SpreadsheetEngine {
        fn name(&self) -> &'static str {
            "calamine"
        }

        fn formats(&self) -> &'static [DocFormat] {
            &[DocFormat::Spreadsheet]
        }

        fn extract(&self, bytes: &[u8]) -> EngineOutput {
            match workbook_text(bytes, MAX_SHEETS, MAX_CELLS_PER_SHEET) {
                Ok(workbook) => EngineOutput {
                    note: workbook.truncation_note(),
                    text: workbook.text,
                    ..EngineOutput::default()
                },
                Err(e) => {
                    tracing::warn!(error = %e, "spreadsheet extraction failed");
                    EngineOutput {
                        note: Some(format!("spreadsheet unreadable: {}", e)),
                        ..EngineOutput::default()
                    }
                }
            }
        }
    }

    pub(super) struct WorkbookText {
        pub text: String,
        pub sheets_total: usize,
        pub sheets_rendered: usize,
        /// Sheets that stopped at the cell cap.
        pub sheets_truncated: usize,
    }

    impl WorkbookText {
        fn truncation_note(&self) -> Option<String> {
            let mut parts = Vec::new();
            if self.sheets_rendered < self.sheets_total {
                parts.push(format!(
                    "only the first {} of {} sheets rendered",
                    self.sheets_rendered, self.sheets_total
                ));
            }
            if self.sheets_truncated > 0 {
                parts.push(format!("{} sheets cut at the cell limit", self.sheets_truncated));
            }
            (!parts.is_empty()).then(|| parts.join("; "))
        }
    }

    pub(super) fn workbook_text(
        bytes: &[u8],
        max_sheets: usize,
        max_cells: usize,
    ) -> Result<WorkbookText, String> {
        let mut workbook =
            calamine::open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| e.to_string())?;

        let mut sections = Vec::new();
        let names = workbook.sheet_names().to_vec();
        let sheets_total = names.len();
        if sheets_total > max_sheets {
            tracing::warn!(sheets = sheets_total, limit = max_sheets, "sheet limit reached");
        }

        let mut sheets_truncated = 0usize;
        for name in names.into_iter().take(max_sheets) {
            let range = match workbook.worksheet_range(&name) {
                Ok(range) => range,
                Err(e) => {
                    tracing::debug!(sheet = %name, error = %e, "skipping unreadable sheet");
                    continue;
                }
            };

            let mut section = format!("# Sheet: {}", name);
            let mut cells = 0usize;
            'rows: for row in range.rows() {
                let mut values = Vec::with_capacity(row.len());
                let mut full = false;
                for cell in row {
                    if cells >= max_cells {
                        full = true;
                        break;
                    }
                    cells += 1;
                    values.push(cell_text(cell));
                }
                if values.iter().any(|v| !v.is_empty()) {
                    section.push('\n');
                    section.push_str(&values.join(CELL_SEPARATOR));
                }
                if full {
                    sheets_truncated += 1;
                    tracing::warn!(sheet = %name, limit = max_cells, "cell limit reached");
                    break 'rows;
                }
            }
            sections.push(section);
        }

        Ok(WorkbookText {
            text: sections.join("\n\n"),
            sheets_total,
            sheets_rendered: sheets_total.min(max_sheets),
            sheets_truncated,
        })
    }

    fn cell_text(cell: &Data) -> String {
        match cell {
            Data::Empty => String::new(),
            Data::String(s) => s.trim().to_string(),
            Data::Float(f) => f.to_string(),
            Data::Int(i) => i.to_string(),
            Data::Bool(b) => b.to_string(),
            Data::DateTime(dt) => dt.to_string(),
            Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
            _ => String::new(),
        }
    }
}
