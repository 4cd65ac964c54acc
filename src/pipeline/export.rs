//! Spreadsheet export: [`ExtractionResult`] → `.xlsx` bytes.
//!
//! One sheet, a bold frozen header row, then one row per order item in
//! table order. Cells keep their JSON type: numbers become numeric cells
//! (so the quantity column sums in Excel), text stays text even when it
//! looks numeric, and absent or `null` fields are left blank.

use crate::error::Order2XlsxError;
use crate::order::{value_text, ExtractionResult};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

/// Column width bounds, in Excel character units.
const MIN_COLUMN_WIDTH: f64 = 8.0;
const MAX_COLUMN_WIDTH: f64 = 60.0;

/// Build the workbook in memory.
pub fn export_xlsx(result: &ExtractionResult, sheet_name: &str) -> Result<Vec<u8>, Order2XlsxError> {
    let columns = result.columns();

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    let header_format = Format::new().set_bold();
    for (col, name) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, sanitize_cell(name), &header_format)?;
    }

    for (row_idx, item) in result.items().iter().enumerate() {
        let row = (row_idx + 1) as u32;
        for (col, name) in columns.iter().enumerate() {
            if let Some(value) = item.get(name) {
                write_value(worksheet, row, col as u16, value)?;
            }
        }
    }

    for (col, width) in column_widths(result, &columns).into_iter().enumerate() {
        worksheet.set_column_width(col as u16, width)?;
    }
    if !columns.is_empty() {
        worksheet.set_freeze_panes(1, 0)?;
    }

    let bytes = workbook.save_to_buffer()?;
    debug!(
        "Exported {} rows × {} columns → {} bytes",
        result.len(),
        columns.len(),
        bytes.len()
    );
    Ok(bytes)
}

/// Export and write to `path`.
///
/// Uses atomic write (temp file + rename) so a crash never leaves a
/// half-written workbook behind.
pub async fn write_xlsx(
    result: &ExtractionResult,
    path: impl AsRef<Path>,
    sheet_name: &str,
) -> Result<(), Order2XlsxError> {
    let path = path.as_ref();
    let bytes = export_xlsx(result, sheet_name)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Order2XlsxError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("xlsx.tmp");
    tokio::fs::write(&tmp_path, &bytes)
        .await
        .map_err(|e| Order2XlsxError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Order2XlsxError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn write_value(ws: &mut Worksheet, row: u32, col: u16, value: &Value) -> Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            ws.write_boolean(row, col, *b)?;
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) => {
                ws.write_number(row, col, f)?;
            }
            None => {
                ws.write_string(row, col, n.to_string())?;
            }
        },
        Value::String(s) => {
            ws.write_string(row, col, sanitize_cell(s))?;
        }
        nested => {
            ws.write_string(row, col, sanitize_cell(&value_text(nested)))?;
        }
    }
    Ok(())
}

/// Drop characters that are illegal in sheet XML. Everything else,
/// including leading/trailing spaces, is kept as the model wrote it.
fn sanitize_cell(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            let u = c as u32;
            c == '\t' || c == '\n' || c == '\r' || !(u < 0x20 || u == 0xFFFE || u == 0xFFFF)
        })
        .collect()
}

/// Widest cell per column, CJK counted double, clamped to sane bounds.
fn column_widths(result: &ExtractionResult, columns: &[String]) -> Vec<f64> {
    let rows = result.rows();
    columns
        .iter()
        .enumerate()
        .map(|(col, name)| {
            let widest = rows
                .iter()
                .map(|r| cell_width(&r[col]))
                .chain(std::iter::once(cell_width(name)))
                .max()
                .unwrap_or(0);
            (widest as f64 + 2.0).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect()
}

fn cell_width(s: &str) -> usize {
    s.chars().map(|c| if c.is_ascii() { 1 } else { 2 }).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::OrderItem;
    use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
    use std::io::Cursor;

    fn read_back(bytes: Vec<u8>, sheet: &str) -> Vec<Vec<Data>> {
        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range(sheet).unwrap();
        range.rows().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn header_then_one_row_per_item() {
        let result = ExtractionResult::new(vec![
            OrderItem::new().with("产品名称", "螺栓").with("数量", 500),
            OrderItem::new().with("产品名称", "螺母").with("数量", "两箱"),
        ]);
        let rows = read_back(export_xlsx(&result, "报货清单").unwrap(), "报货清单");

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec![Data::String("产品名称".into()), Data::String("数量".into())]);
        assert_eq!(rows[1][1], Data::Float(500.0));
        assert_eq!(rows[2][1], Data::String("两箱".into()));
    }

    #[test]
    fn numeric_looking_text_stays_text() {
        let result = ExtractionResult::new(vec![OrderItem::new().with("数量", "0500")]);
        let rows = read_back(export_xlsx(&result, "s").unwrap(), "s");
        assert_eq!(rows[1][0], Data::String("0500".into()));
    }

    #[test]
    fn ragged_rows_leave_blank_cells() {
        let result = ExtractionResult::new(vec![
            OrderItem::new().with("a", "x").with("b", "y"),
            OrderItem::new().with("b", "z"),
        ]);
        let rows = read_back(export_xlsx(&result, "s").unwrap(), "s");
        assert_eq!(rows[2][0], Data::Empty);
        assert_eq!(rows[2][1], Data::String("z".into()));
    }

    #[test]
    fn bad_sheet_name_is_export_failure() {
        let result = ExtractionResult::new(vec![OrderItem::new().with("a", 1)]);
        let err = export_xlsx(&result, "a/b").unwrap_err();
        assert!(matches!(err, Order2XlsxError::ExportFailed(_)));
    }

    #[test]
    fn empty_result_still_builds_a_workbook() {
        let bytes = export_xlsx(&ExtractionResult::default(), "报货清单").unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn sanitize_drops_control_chars_only() {
        assert_eq!(sanitize_cell(" M12\u{0}\u{7}x\n"), " M12x\n");
    }

    #[test]
    fn widths_are_clamped() {
        let result = ExtractionResult::new(vec![OrderItem::new().with("a", "x".repeat(200))]);
        let widths = column_widths(&result, &result.columns());
        assert_eq!(widths, vec![MAX_COLUMN_WIDTH]);
    }

    #[tokio::test]
    async fn write_xlsx_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/orders.xlsx");
        let result = ExtractionResult::new(vec![OrderItem::new().with("a", 1)]);
        write_xlsx(&result, &path, "报货清单").await.unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("xlsx.tmp").exists());
    }
}
