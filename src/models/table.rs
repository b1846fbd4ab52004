use bigdecimal::{BigDecimal, Zero};
use std::collections::HashMap;
use std::str::FromStr;

/// Schema-dynamic table: ordered column names over rows of raw text cells.
///
/// Column presence is deliberately not validated here — each analytic
/// function checks the subset it needs and reports what is missing. Rows are
/// normalized to the header width on insertion, so any index obtained from
/// [`DataTable::column_index`] is valid for every row.
#[derive(Debug, Clone, Default)]
pub struct DataTable {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl DataTable {
    pub fn new(columns: Vec<String>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(pos, name)| (name.clone(), pos))
            .collect();
        Self {
            columns,
            index,
            rows: Vec::new(),
        }
    }

    /// Appends a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut cells: Vec<String>) {
        cells.resize(self.columns.len(), String::new());
        self.rows.push(cells);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Which of `required` are absent, in the requested order.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|name| !self.index.contains_key(**name))
            .map(|name| (*name).to_string())
            .collect()
    }

    pub fn text(&self, row: usize, col: usize) -> &str {
        self.rows[row][col].as_str()
    }

    /// Coerces one column to decimals; unparseable cells become zero.
    ///
    /// Builds a fresh vector so the table itself stays read-only and
    /// shareable across queries.
    pub fn decimal_column(&self, col: usize) -> Vec<BigDecimal> {
        self.rows
            .iter()
            .map(|row| parse_decimal(&row[col]).unwrap_or_else(BigDecimal::zero))
            .collect()
    }

    /// Strict variant: unparseable cells become `None` instead of zero, for
    /// queries where zero is itself an anomaly value (unit-value ranking).
    pub fn decimal_column_strict(&self, col: usize) -> Vec<Option<BigDecimal>> {
        self.rows.iter().map(|row| parse_decimal(&row[col])).collect()
    }
}

/// Parses a raw cell into a decimal. Empty and non-numeric text yield `None`.
pub fn parse_decimal(raw: &str) -> Option<BigDecimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    BigDecimal::from_str(trimmed).ok()
}

/// Divergence threshold below which decimal differences are noise, not a
/// real inconsistency.
pub fn value_tolerance() -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(100)
}

/// Rescales to exactly two decimal places for display.
pub fn two_places(value: &BigDecimal) -> BigDecimal {
    value.round(2).with_scale(2)
}

pub fn format_brl(value: &BigDecimal) -> String {
    format!("R$ {}", two_places(value))
}
