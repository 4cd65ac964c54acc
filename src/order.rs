//! Order data model: [`OrderItem`] rows collected into an [`ExtractionResult`].
//!
//! Rows keep the model's JSON values verbatim. A quantity can arrive as
//! `500` or as `"500"` or as `"约500"`, and the user is the one who decides
//! what it should be, so nothing is coerced here. Rows are also allowed to
//! disagree about which fields they carry; [`ExtractionResult::columns`]
//! takes the union and [`ExtractionResult::rows`] pads the gaps.

use crate::error::Order2XlsxError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field name for the product name column.
pub const FIELD_PRODUCT_NAME: &str = "产品名称";
/// Field name for the specification / model column.
pub const FIELD_SPECIFICATION: &str = "规格";
/// Field name for the quantity column.
pub const FIELD_QUANTITY: &str = "数量";
/// Field name for the unit column.
pub const FIELD_UNIT: &str = "单位";
/// Field name for the notes (colour, material, …) column.
pub const FIELD_NOTES: &str = "备注";

/// The five fields the extraction prompt asks for, in prompt order.
pub const EXPECTED_FIELDS: [&str; 5] = [
    FIELD_PRODUCT_NAME,
    FIELD_SPECIFICATION,
    FIELD_QUANTITY,
    FIELD_UNIT,
    FIELD_NOTES,
];

/// One extracted line item.
///
/// Field order is the order the model wrote them in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderItem {
    fields: Map<String, Value>,
}

impl OrderItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON object as a row without touching its values.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Builder-style field setter, mostly for tests and the demo data.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Set a field, returning the previous value if there was one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn product_name(&self) -> Option<&Value> {
        self.get(FIELD_PRODUCT_NAME)
    }

    pub fn specification(&self) -> Option<&Value> {
        self.get(FIELD_SPECIFICATION)
    }

    /// Quantity exactly as the model returned it (number or text).
    pub fn quantity(&self) -> Option<&Value> {
        self.get(FIELD_QUANTITY)
    }

    pub fn unit(&self) -> Option<&Value> {
        self.get(FIELD_UNIT)
    }

    pub fn notes(&self) -> Option<&Value> {
        self.get(FIELD_NOTES)
    }

    /// Display text for one cell. Absent and `null` both render as "".
    pub fn cell_text(&self, name: &str) -> String {
        self.get(name).map(value_text).unwrap_or_default()
    }
}

/// Render a JSON value the way a grid cell shows it.
///
/// Strings are shown without quotes, numbers and booleans in their JSON
/// spelling, `null` as empty, and nested arrays/objects as compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// The rows produced by one recognition action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionResult {
    items: Vec<OrderItem>,
}

impl ExtractionResult {
    pub fn new(items: Vec<OrderItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<OrderItem> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Union of all field names, in the order they are first seen.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for item in &self.items {
            for name in item.field_names() {
                if !columns.iter().any(|c| c == name) {
                    columns.push(name.to_string());
                }
            }
        }
        columns
    }

    /// The table body: one `Vec<String>` per item, aligned with [`columns`].
    ///
    /// [`columns`]: ExtractionResult::columns
    pub fn rows(&self) -> Vec<Vec<String>> {
        let columns = self.columns();
        self.items
            .iter()
            .map(|item| columns.iter().map(|c| item.cell_text(c)).collect())
            .collect()
    }

    // ── Editing ──────────────────────────────────────────────────────────

    /// Overwrite one cell. `row` is 0-based. A column the row lacks is added.
    pub fn set_cell(
        &mut self,
        row: usize,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<(), Order2XlsxError> {
        let len = self.items.len();
        let item = self
            .items
            .get_mut(row)
            .ok_or(Order2XlsxError::RowOutOfRange { row, len })?;
        item.set(column, value);
        Ok(())
    }

    pub fn push_row(&mut self, item: OrderItem) {
        self.items.push(item);
    }

    /// Remove and return the row at `row` (0-based).
    pub fn remove_row(&mut self, row: usize) -> Result<OrderItem, Order2XlsxError> {
        if row >= self.items.len() {
            return Err(Order2XlsxError::RowOutOfRange {
                row,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(row))
    }

    /// Plain-text rendering for terminals: a header line then one line per row.
    pub fn to_text_table(&self) -> String {
        let columns = self.columns();
        if columns.is_empty() {
            return String::new();
        }
        let rows = self.rows();

        let mut widths: Vec<usize> = columns.iter().map(|c| display_width(c)).collect();
        for row in &rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(display_width(cell));
            }
        }

        let mut out = String::new();
        push_line(&mut out, "#", &columns, &widths);
        for (i, row) in rows.iter().enumerate() {
            push_line(&mut out, &(i + 1).to_string(), row, &widths);
        }
        out
    }
}

fn push_line(out: &mut String, index: &str, cells: &[String], widths: &[usize]) {
    out.push_str(&format!("{index:>3}"));
    for (cell, &width) in cells.iter().zip(widths) {
        out.push_str("  ");
        out.push_str(cell);
        let pad = width.saturating_sub(display_width(cell));
        out.push_str(&" ".repeat(pad));
    }
    let trimmed = out.trim_end_matches(' ').len();
    out.truncate(trimmed);
    out.push('\n');
}

/// Terminal column count: CJK ideographs and full-width forms take two cells.
fn display_width(s: &str) -> usize {
    s.chars()
        .map(|c| match c as u32 {
            0x1100..=0x115F | 0x2E80..=0xA4CF | 0xAC00..=0xD7A3 | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F | 0xFF00..=0xFF60 | 0xFFE0..=0xFFE6 => 2,
            _ => 1,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bolt() -> OrderItem {
        OrderItem::new()
            .with(FIELD_PRODUCT_NAME, "螺栓")
            .with(FIELD_SPECIFICATION, "M12")
            .with(FIELD_QUANTITY, 500)
            .with(FIELD_UNIT, "个")
            .with(FIELD_NOTES, "")
    }

    #[test]
    fn typed_accessors_return_verbatim_values() {
        let item = bolt();
        assert_eq!(item.product_name(), Some(&json!("螺栓")));
        assert_eq!(item.quantity(), Some(&json!(500)));
        assert_eq!(item.notes(), Some(&json!("")));
    }

    #[test]
    fn cell_text_renders_absent_and_null_as_empty() {
        let item = OrderItem::new().with("a", Value::Null);
        assert_eq!(item.cell_text("a"), "");
        assert_eq!(item.cell_text("missing"), "");
    }

    #[test]
    fn value_text_does_not_quote_strings() {
        assert_eq!(value_text(&json!("M4x10")), "M4x10");
        assert_eq!(value_text(&json!(1000)), "1000");
        assert_eq!(value_text(&json!(2.5)), "2.5");
        assert_eq!(value_text(&json!(true)), "true");
        assert_eq!(value_text(&json!(["a", 1])), r#"["a",1]"#);
    }

    #[test]
    fn columns_are_union_in_first_seen_order() {
        let result = ExtractionResult::new(vec![
            OrderItem::new().with("b", 1).with("a", 2),
            OrderItem::new().with("c", 3).with("a", 4),
        ]);
        assert_eq!(result.columns(), vec!["b", "a", "c"]);
    }

    #[test]
    fn ragged_rows_are_padded() {
        let result = ExtractionResult::new(vec![
            OrderItem::new().with("a", 1).with("b", "x"),
            OrderItem::new().with("b", "y"),
        ]);
        assert_eq!(
            result.rows(),
            vec![
                vec!["1".to_string(), "x".to_string()],
                vec![String::new(), "y".to_string()],
            ]
        );
    }

    #[test]
    fn set_cell_overwrites_and_adds() {
        let mut result = ExtractionResult::new(vec![bolt()]);
        result.set_cell(0, FIELD_QUANTITY, 600).unwrap();
        result.set_cell(0, "颜色", "黑").unwrap();
        assert_eq!(result.items()[0].quantity(), Some(&json!(600)));
        assert_eq!(result.columns().last().map(String::as_str), Some("颜色"));
    }

    #[test]
    fn set_cell_out_of_range() {
        let mut result = ExtractionResult::new(vec![bolt()]);
        let err = result.set_cell(1, FIELD_UNIT, "箱").unwrap_err();
        assert!(matches!(err, Order2XlsxError::RowOutOfRange { row: 1, len: 1 }));
    }

    #[test]
    fn remove_row_shifts_following_rows() {
        let mut result = ExtractionResult::new(vec![
            OrderItem::new().with("n", 1),
            OrderItem::new().with("n", 2),
            OrderItem::new().with("n", 3),
        ]);
        let removed = result.remove_row(1).unwrap();
        assert_eq!(removed.get("n"), Some(&json!(2)));
        assert_eq!(result.len(), 2);
        assert_eq!(result.items()[1].get("n"), Some(&json!(3)));
        assert!(result.remove_row(2).is_err());
    }

    #[test]
    fn serialises_as_plain_json_rows() {
        let result = ExtractionResult::new(vec![bolt()]);
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"[{"产品名称":"螺栓","规格":"M12","数量":500,"单位":"个","备注":""}]"#
        );
    }

    #[test]
    fn text_table_has_header_and_one_line_per_row() {
        let result = ExtractionResult::new(vec![bolt(), bolt()]);
        let table = result.to_text_table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains(FIELD_PRODUCT_NAME));
        assert!(lines[1].trim_start().starts_with('1'));
        assert!(lines[2].contains("M12"));
    }

    #[test]
    fn empty_result_renders_nothing() {
        assert_eq!(ExtractionResult::default().to_text_table(), "");
        assert!(ExtractionResult::default().columns().is_empty());
    }

    #[test]
    fn cjk_is_double_width() {
        assert_eq!(display_width("螺栓"), 4);
        assert_eq!(display_width("M12"), 3);
    }
}
