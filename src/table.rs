use crate::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell of a loaded table
///
/// Uploaded files mix categorical text with quantities and percentage rates,
/// so every cell is either empty, a number, or free text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Empty,
    Number(f64),
    Text(String),
}

impl Value {
    /// Parse a raw field the way a spreadsheet would
    ///
    /// Leading and trailing whitespace is ignored. Empty fields become
    /// `Value::Empty`, anything `f64` accepts becomes `Value::Number`,
    /// everything else stays text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Value::Number(n),
            _ => Value::Text(trimmed.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Render the value for display, filters and group keys
    ///
    /// Integral numbers are shown without a fractional part so that a
    /// warehouse id of `12` matches the text `"12"`.
    pub fn display(&self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Text(s) => s.clone(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// An in-memory rectangular table
///
/// One row per SKU/PO line item, one named column per field. Rows are always
/// exactly `columns.len()` wide.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create a table, padding short rows with `Value::Empty` and dropping
    /// fields beyond the header width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Empty);
                row
            })
            .collect();
        Table { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Iterate over the cells of a column, or nothing if it is absent
    pub fn column<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Value> + 'a {
        let idx = self.column_index(name);
        self.rows
            .iter()
            .filter_map(move |row| idx.and_then(|i| row.get(i)))
    }

    /// Numeric cells of a column; empty and text cells are skipped
    pub fn numeric_values<'a>(&'a self, name: &str) -> impl Iterator<Item = f64> + 'a {
        self.column(name).filter_map(Value::as_number)
    }

    /// Guard clause for expected columns
    ///
    /// # Errors
    /// * `DashboardError::MissingColumns` listing every absent column, in the
    ///   order they were requested
    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let missing: Vec<String> = names
            .iter()
            .map(|n| n.as_ref())
            .filter(|n| !self.has_column(n))
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DashboardError::MissingColumns(missing))
        }
    }

    /// Convert percentage text such as `"87.5%"` to numbers in place
    ///
    /// Cells that are already numeric are left alone and absent columns are
    /// ignored.
    ///
    /// # Errors
    /// * `DashboardError::InvalidNumber` for text that is not a percentage;
    ///   `row` is 1-based and excludes the header
    pub fn coerce_percent_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        for name in names {
            let name = name.as_ref();
            let Some(idx) = self.column_index(name) else {
                continue;
            };
            for (r, row) in self.rows.iter_mut().enumerate() {
                let Value::Text(text) = &row[idx] else {
                    continue;
                };
                let parsed = match parse_percent(text) {
                    Ok(Some(n)) => Value::Number(n),
                    Ok(None) => Value::Empty,
                    Err(()) => {
                        return Err(DashboardError::InvalidNumber {
                            column: name.to_string(),
                            row: r + 1,
                            value: text.clone(),
                        });
                    }
                };
                row[idx] = parsed;
            }
        }
        Ok(())
    }

    /// Keep only the rows matching `predicate`
    pub fn filter_rows<F>(&self, mut predicate: F) -> Table
    where
        F: FnMut(&[Value]) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| predicate(row))
                .cloned()
                .collect(),
        }
    }
}

/// Parse a percentage string, stripping one trailing `%`
///
/// # Returns
/// * `Ok(Some(value))` for `"85.5%"`, `"85.5"` or `" 85.5 % "`
/// * `Ok(None)` for blank text and for `NaN`/`inf`, which count as missing
/// * `Err(())` for anything else
pub fn parse_percent(text: &str) -> std::result::Result<Option<f64>, ()> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Some(n)),
        Ok(_) => Ok(None),
        Err(_) => Err(()),
    }
}
