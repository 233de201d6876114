//! Excel tools built on the in-crate xlsx engine.
//!
//! All tools funnel through [`Workbook`] load-modify-save, so edits to
//! files produced elsewhere keep their other sheets intact. Paths are
//! resolved against the configured output directory and forced to a
//! `.xlsx` suffix.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::workbook::{column_letter, parse_cell_ref, parse_range, CellStyle, CellValue, Workbook};
use super::{resolve_path, Tool, ToolRunner};
use crate::error::Error;
use crate::Result;

/// Rows shown per sheet when reading a workbook back.
const READ_ROW_CAP: u32 = 100;

fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Tool(format!("Missing '{}' parameter", key)))
}

fn xlsx_path(params: &Value, output_dir: &Path) -> Result<PathBuf> {
    let mut path = resolve_path(require_str(params, "path")?, output_dir);
    if path.extension().map(|e| e != "xlsx").unwrap_or(true) {
        path = PathBuf::from(format!("{}.xlsx", path.display()));
    }
    Ok(path)
}

fn json_cell(value: &Value) -> CellValue {
    match value {
        Value::Number(n) => CellValue::Number(n.as_f64().unwrap_or(0.0)),
        Value::Bool(b) => CellValue::Text(b.to_string()),
        Value::String(s) => CellValue::from_input(s),
        Value::Null => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}

/// Create a new workbook from structured sheet data
pub struct CreateExcelTool {
    output_dir: PathBuf,
}

#[async_trait]
impl Tool for CreateExcelTool {
    fn name(&self) -> &str {
        "create_excel"
    }
    fn description(&self) -> &str {
        "Create an Excel file. sheets is a list of {name, headers, rows}"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "sheets": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": {"type": "string"},
                            "headers": {"type": "array", "items": {"type": "string"}},
                            "rows": {"type": "array", "items": {"type": "array"}}
                        },
                        "required": ["name"]
                    }
                }
            },
            "required": ["path", "sheets"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let path = xlsx_path(&params, &self.output_dir)?;
        let sheets = params
            .get("sheets")
            .and_then(|v| v.as_array())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Tool("'sheets' must be a non-empty array".to_string()))?;

        let mut workbook = Workbook::new();
        let mut cell_count = 0usize;
        for (i, entry) in sheets.iter().enumerate() {
            let name = entry["name"]
                .as_str()
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Sheet{}", i + 1));
            let sheet = workbook.add_sheet(name);

            if let Some(headers) = entry["headers"].as_array() {
                for (c, h) in headers.iter().enumerate() {
                    sheet.set(1, c as u32 + 1, json_cell(h));
                    cell_count += 1;
                }
            }
            if let Some(rows) = entry["rows"].as_array() {
                for (r, row) in rows.iter().enumerate() {
                    let cells = row.as_array().cloned().unwrap_or_default();
                    for (c, cell) in cells.iter().enumerate() {
                        sheet.set(r as u32 + 2, c as u32 + 1, json_cell(cell));
                        cell_count += 1;
                    }
                }
            }
        }

        workbook.save(&path)?;
        Ok(format!(
            "Created: {} ({} sheets, {} cells)",
            path.display(),
            sheets.len(),
            cell_count
        ))
    }
}

/// Read a workbook back as text
pub struct ReadExcelTool {
    output_dir: PathBuf,
}

#[async_trait]
impl Tool for ReadExcelTool {
    fn name(&self) -> &str {
        "read_excel"
    }
    fn description(&self) -> &str {
        "Read an Excel file and return its contents as text"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let path = xlsx_path(&params, &self.output_dir)?;
        let workbook = Workbook::load(&path)?;

        let mut out = String::new();
        for sheet in workbook.sheets() {
            let (rows, cols) = sheet.dims();
            out.push_str(&format!(
                "=== Sheet: {} ({} rows x {} cols) ===\n",
                sheet.name, rows, cols
            ));
            for row in 1..=rows.min(READ_ROW_CAP) {
                let line: Vec<String> = (1..=cols).map(|col| sheet.get(row, col).display()).collect();
                out.push_str(&line.join(" | "));
                out.push('\n');
            }
            if rows > READ_ROW_CAP {
                out.push_str(&format!("[... {} more rows]\n", rows - READ_ROW_CAP));
            }
        }
        Ok(out)
    }
}

/// Change one cell in an existing workbook
pub struct EditExcelCellTool {
    output_dir: PathBuf,
}

#[async_trait]
impl Tool for EditExcelCellTool {
    fn name(&self) -> &str {
        "edit_excel_cell"
    }
    fn description(&self) -> &str {
        "Set one cell in an existing Excel file, e.g. cell B3 on a named sheet"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "sheet": {"type": "string"},
                "cell": {"type": "string", "description": "Cell reference like B3"},
                "value": {"type": "string"}
            },
            "required": ["path", "sheet", "cell", "value"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let path = xlsx_path(&params, &self.output_dir)?;
        let sheet_name = require_str(&params, "sheet")?;
        let (row, col) = parse_cell_ref(require_str(&params, "cell")?)?;
        let value = require_str(&params, "value")?;

        let mut workbook = Workbook::load(&path)?;
        let sheet = workbook
            .sheet_mut(sheet_name)
            .ok_or_else(|| Error::Tool(format!("No sheet named '{}'", sheet_name)))?;
        sheet.set(row, col, CellValue::from_input(value));
        workbook.save(&path)?;

        Ok(format!(
            "Set {}{} = {} on sheet '{}'",
            column_letter(col),
            row,
            value,
            sheet_name
        ))
    }
}

/// Write a formula into a cell
pub struct AddExcelFormulaTool {
    output_dir: PathBuf,
}

#[async_trait]
impl Tool for AddExcelFormulaTool {
    fn name(&self) -> &str {
        "add_excel_formula"
    }
    fn description(&self) -> &str {
        "Put a formula like =SUM(B2:B10) into a cell of an existing Excel file"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "sheet": {"type": "string"},
                "cell": {"type": "string"},
                "formula": {"type": "string"}
            },
            "required": ["path", "sheet", "cell", "formula"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let path = xlsx_path(&params, &self.output_dir)?;
        let sheet_name = require_str(&params, "sheet")?;
        let (row, col) = parse_cell_ref(require_str(&params, "cell")?)?;
        let formula = require_str(&params, "formula")?;
        let formula = formula.strip_prefix('=').unwrap_or(formula);

        let mut workbook = Workbook::load(&path)?;
        let sheet = workbook
            .sheet_mut(sheet_name)
            .ok_or_else(|| Error::Tool(format!("No sheet named '{}'", sheet_name)))?;
        sheet.set(row, col, CellValue::Formula(formula.to_string()));
        workbook.save(&path)?;

        Ok(format!(
            "Formula ={} placed at {}{} on sheet '{}'",
            formula,
            column_letter(col),
            row,
            sheet_name
        ))
    }
}

/// Add a sheet to an existing workbook
pub struct AddExcelSheetTool {
    output_dir: PathBuf,
}

#[async_trait]
impl Tool for AddExcelSheetTool {
    fn name(&self) -> &str {
        "add_excel_sheet"
    }
    fn description(&self) -> &str {
        "Add a new sheet (with optional headers and rows) to an existing Excel file"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "name": {"type": "string"},
                "headers": {"type": "array", "items": {"type": "string"}},
                "rows": {"type": "array", "items": {"type": "array"}}
            },
            "required": ["path", "name"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let path = xlsx_path(&params, &self.output_dir)?;
        let name = require_str(&params, "name")?;

        let mut workbook = Workbook::load(&path)?;
        if workbook.sheet(name).is_some() {
            return Err(Error::Tool(format!("Sheet '{}' already exists", name)));
        }
        let sheet = workbook.add_sheet(name);

        if let Some(headers) = params["headers"].as_array() {
            for (c, h) in headers.iter().enumerate() {
                sheet.set(1, c as u32 + 1, json_cell(h));
            }
        }
        if let Some(rows) = params["rows"].as_array() {
            let start = if params["headers"].as_array().map(|h| !h.is_empty()).unwrap_or(false) {
                2
            } else {
                1
            };
            for (r, row) in rows.iter().enumerate() {
                let cells = row.as_array().cloned().unwrap_or_default();
                for (c, cell) in cells.iter().enumerate() {
                    sheet.set(r as u32 + start, c as u32 + 1, json_cell(cell));
                }
            }
        }

        workbook.save(&path)?;
        Ok(format!("Added sheet '{}' to {}", name, path.display()))
    }
}

/// Append data rows below the existing content of a sheet
pub struct ExcelAddRowsTool {
    output_dir: PathBuf,
}

#[async_trait]
impl Tool for ExcelAddRowsTool {
    fn name(&self) -> &str {
        "excel_add_rows"
    }
    fn description(&self) -> &str {
        "Append rows of data to the bottom of a sheet in an existing Excel file"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "sheet": {"type": "string"},
                "rows": {"type": "array", "items": {"type": "array"}}
            },
            "required": ["path", "sheet", "rows"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let path = xlsx_path(&params, &self.output_dir)?;
        let sheet_name = require_str(&params, "sheet")?;
        let rows = params
            .get("rows")
            .and_then(|v| v.as_array())
            .filter(|r| !r.is_empty())
            .ok_or_else(|| Error::Tool("'rows' must be a non-empty array".to_string()))?;

        let mut workbook = Workbook::load(&path)?;
        let sheet = workbook
            .sheet_mut(sheet_name)
            .ok_or_else(|| Error::Tool(format!("No sheet named '{}'", sheet_name)))?;

        let converted: Vec<Vec<CellValue>> = rows
            .iter()
            .map(|row| {
                row.as_array()
                    .map(|cells| cells.iter().map(json_cell).collect())
                    .unwrap_or_default()
            })
            .collect();
        sheet.append_rows(&converted);
        workbook.save(&path)?;

        Ok(format!("Added {} rows to sheet '{}'", rows.len(), sheet_name))
    }
}

/// Apply formatting to a cell range
pub struct ExcelStyleRangeTool {
    output_dir: PathBuf,
}

#[async_trait]
impl Tool for ExcelStyleRangeTool {
    fn name(&self) -> &str {
        "excel_style_range"
    }
    fn description(&self) -> &str {
        "Style a cell range (e.g. A1:C1) in an existing Excel file: bold, background color, font size"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "sheet": {"type": "string"},
                "range": {"type": "string", "description": "Range like A1:C1 or a single cell"},
                "bold": {"type": "boolean"},
                "bg_color": {"type": "string", "description": "RGB hex like FFFF00"},
                "font_size": {"type": "integer"}
            },
            "required": ["path", "sheet", "range"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let path = xlsx_path(&params, &self.output_dir)?;
        let sheet_name = require_str(&params, "sheet")?;
        let range = require_str(&params, "range")?;
        let ((top, left), (bottom, right)) = parse_range(range)?;

        let style = CellStyle {
            bold: params["bold"].as_bool().unwrap_or(false),
            bg_color: params["bg_color"]
                .as_str()
                .map(|c| c.trim_start_matches('#').to_uppercase())
                .filter(|c| !c.is_empty()),
            font_size: params["font_size"].as_u64().map(|n| n as u32),
        };
        if style == CellStyle::default() {
            return Err(Error::Tool(
                "Nothing to apply: set bold, bg_color, or font_size".to_string(),
            ));
        }

        let mut workbook = Workbook::load(&path)?;
        let style_id = workbook.add_style(style);
        let sheet = workbook
            .sheet_mut(sheet_name)
            .ok_or_else(|| Error::Tool(format!("No sheet named '{}'", sheet_name)))?;
        for row in top..=bottom {
            for col in left..=right {
                sheet.set_style_id(row, col, style_id);
            }
        }
        workbook.save(&path)?;

        Ok(format!("Style applied to {} on sheet '{}'", range, sheet_name))
    }
}

/// Register the spreadsheet tool set.
pub fn register_tools(runner: &mut ToolRunner, output_dir: PathBuf) {
    runner.register(CreateExcelTool { output_dir: output_dir.clone() });
    runner.register(ReadExcelTool { output_dir: output_dir.clone() });
    runner.register(EditExcelCellTool { output_dir: output_dir.clone() });
    runner.register(AddExcelFormulaTool { output_dir: output_dir.clone() });
    runner.register(AddExcelSheetTool { output_dir: output_dir.clone() });
    runner.register(ExcelAddRowsTool { output_dir: output_dir.clone() });
    runner.register(ExcelStyleRangeTool { output_dir });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_sample(dir: &TempDir) -> PathBuf {
        let tool = CreateExcelTool {
            output_dir: dir.path().to_path_buf(),
        };
        let result = tool
            .execute(json!({
                "path": "budget",
                "sheets": [{
                    "name": "Expenses",
                    "headers": ["Item", "Cost"],
                    "rows": [["Rent", 1200], ["Food", 350.5]]
                }]
            }))
            .await
            .unwrap();
        assert!(result.contains("Created:"));
        assert!(result.contains(".xlsx"));
        dir.path().join("budget.xlsx")
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let dir = TempDir::new().unwrap();
        let path = create_sample(&dir).await;
        assert!(path.exists());

        let reader = ReadExcelTool {
            output_dir: dir.path().to_path_buf(),
        };
        let text = reader.execute(json!({"path": "budget.xlsx"})).await.unwrap();
        assert!(text.contains("=== Sheet: Expenses (3 rows x 2 cols) ==="));
        assert!(text.contains("Item | Cost"));
        assert!(text.contains("Rent | 1200"));
        assert!(text.contains("Food | 350.5"));
    }

    #[tokio::test]
    async fn test_edit_cell_coerces_numbers() {
        let dir = TempDir::new().unwrap();
        create_sample(&dir).await;

        let editor = EditExcelCellTool {
            output_dir: dir.path().to_path_buf(),
        };
        let result = editor
            .execute(json!({
                "path": "budget", "sheet": "Expenses", "cell": "B2", "value": "1300"
            }))
            .await
            .unwrap();
        assert_eq!(result, "Set B2 = 1300 on sheet 'Expenses'");

        let workbook = Workbook::load(&dir.path().join("budget.xlsx")).unwrap();
        assert_eq!(
            workbook.sheet("Expenses").unwrap().get(2, 2),
            CellValue::Number(1300.0)
        );
    }

    #[tokio::test]
    async fn test_formula_and_rows_round_trip() {
        let dir = TempDir::new().unwrap();
        create_sample(&dir).await;
        let out = dir.path().to_path_buf();

        let adder = ExcelAddRowsTool { output_dir: out.clone() };
        adder
            .execute(json!({
                "path": "budget", "sheet": "Expenses", "rows": [["Transport", 90]]
            }))
            .await
            .unwrap();

        let formula = AddExcelFormulaTool { output_dir: out.clone() };
        formula
            .execute(json!({
                "path": "budget", "sheet": "Expenses", "cell": "B5", "formula": "=SUM(B2:B4)"
            }))
            .await
            .unwrap();

        let workbook = Workbook::load(&dir.path().join("budget.xlsx")).unwrap();
        let sheet = workbook.sheet("Expenses").unwrap();
        assert_eq!(sheet.get(4, 1), CellValue::Text("Transport".to_string()));
        assert_eq!(sheet.get(5, 2), CellValue::Formula("SUM(B2:B4)".to_string()));
    }

    #[tokio::test]
    async fn test_add_sheet_rejects_duplicate() {
        let dir = TempDir::new().unwrap();
        create_sample(&dir).await;

        let tool = AddExcelSheetTool {
            output_dir: dir.path().to_path_buf(),
        };
        tool.execute(json!({"path": "budget", "name": "Summary", "headers": ["Total"]}))
            .await
            .unwrap();
        let err = tool
            .execute(json!({"path": "budget", "name": "Summary"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_style_range_preserves_data() {
        let dir = TempDir::new().unwrap();
        create_sample(&dir).await;

        let styler = ExcelStyleRangeTool {
            output_dir: dir.path().to_path_buf(),
        };
        let result = styler
            .execute(json!({
                "path": "budget", "sheet": "Expenses", "range": "A1:B1",
                "bold": true, "bg_color": "#FFFF00", "font_size": 12
            }))
            .await
            .unwrap();
        assert_eq!(result, "Style applied to A1:B1 on sheet 'Expenses'");

        // Styling must not disturb cell contents.
        let workbook = Workbook::load(&dir.path().join("budget.xlsx")).unwrap();
        let sheet = workbook.sheet("Expenses").unwrap();
        assert_eq!(sheet.get(1, 1), CellValue::Text("Item".to_string()));
        assert_eq!(sheet.get(2, 2), CellValue::Number(1200.0));
    }

    #[tokio::test]
    async fn test_style_range_rejects_no_op() {
        let dir = TempDir::new().unwrap();
        create_sample(&dir).await;

        let styler = ExcelStyleRangeTool {
            output_dir: dir.path().to_path_buf(),
        };
        let err = styler
            .execute(json!({"path": "budget", "sheet": "Expenses", "range": "A1"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Nothing to apply"));
    }

    #[tokio::test]
    async fn test_missing_sheet_error() {
        let dir = TempDir::new().unwrap();
        create_sample(&dir).await;

        let editor = EditExcelCellTool {
            output_dir: dir.path().to_path_buf(),
        };
        let err = editor
            .execute(json!({"path": "budget", "sheet": "Nope", "cell": "A1", "value": "x"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No sheet named 'Nope'"));
    }
}
