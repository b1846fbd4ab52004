use crate::error::{AgentError, Result};
use crate::models::DataTable;
use calamine::{open_workbook_auto, DataType, Reader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File-name markers that classify a data file (case-sensitive substring).
const HEADER_MARKER: &str = "Cabecalho";
const ITEM_MARKER: &str = "Itens";

/// The two semantic tables of one upload session.
pub struct LoadedTables {
    pub headers: DataTable,
    pub items: DataTable,
}

/// Resolves raw file paths into the header and item tables.
///
/// Classification is by file-name convention; unreadable files are skipped
/// with a warning and loading continues. When several files match the same
/// marker the last readable one wins. An unresolved table is an error — the
/// caller must never mistake "file missing" for "zero rows".
pub fn load_tables(files: &[PathBuf]) -> Result<LoadedTables> {
    let mut headers: Option<DataTable> = None;
    let mut items: Option<DataTable> = None;

    for path in files {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let slot = if name.contains(HEADER_MARKER) {
            &mut headers
        } else if name.contains(ITEM_MARKER) {
            &mut items
        } else {
            continue;
        };

        match read_table(path) {
            Ok(table) => {
                info!(
                    "Loaded {} ({} rows, {} columns)",
                    name,
                    table.len(),
                    table.columns().len()
                );
                *slot = Some(table);
            }
            Err(e) => warn!("Skipping unreadable file {}: {}", name, e),
        }
    }

    let headers = headers.ok_or(AgentError::MissingDataset(HEADER_MARKER))?;
    let items = items.ok_or(AgentError::MissingDataset(ITEM_MARKER))?;
    Ok(LoadedTables { headers, items })
}

fn read_table(path: &Path) -> Result<DataTable> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "xlsx" | "xls" => read_excel(path),
        _ => read_csv(path),
    }
}

fn read_csv(path: &Path) -> Result<DataTable> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut table = DataTable::new(columns);
    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(str::to_string).collect());
    }
    Ok(table)
}

fn read_excel(path: &Path) -> Result<DataTable> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AgentError::InvalidWorkbook(format!("{} has no sheets", path.display())))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .ok_or_else(|| AgentError::InvalidWorkbook(format!("missing sheet '{sheet_name}'")))??;

    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(first) => first.iter().map(|cell| cell_to_string(Some(cell))).collect(),
        None => {
            return Err(AgentError::InvalidWorkbook(format!(
                "sheet '{sheet_name}' is empty"
            )))
        }
    };

    let mut table = DataTable::new(columns);
    for row in rows {
        table.push_row(row.iter().map(|cell| cell_to_string(Some(cell))).collect());
    }
    Ok(table)
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        // Serial date cells render ISO so the temporal tools can parse them
        Some(cell @ DataType::DateTime(_)) => cell
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| cell.to_string()),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
