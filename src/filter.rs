use crate::table::{Table, Value};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;

/// Label of the "no filter" entry shown at the top of every dropdown
pub const ALL: &str = "All";

/// What the user picked in one dropdown or multiselect
///
/// Serialised as `"All"`, a single string, or a list of strings so that the
/// browser can post exactly what its widgets hold. `null` and `"All"` both
/// read back as `All` once normalised.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Selection {
    #[default]
    All,
    One(String),
    AnyOf(Vec<String>),
}

impl Selection {
    /// Normalise a selection: `"All"` and an empty list mean no filter
    pub fn normalized(self) -> Self {
        match self {
            Selection::One(v) if v == ALL => Selection::All,
            Selection::AnyOf(v) if v.is_empty() => Selection::All,
            Selection::AnyOf(v) if v.iter().any(|s| s == ALL) => Selection::All,
            other => other,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self.clone().normalized(), Selection::All)
    }

    /// Does a cell pass this selection
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Selection::All => true,
            Selection::One(wanted) => !value.is_empty() && value.display() == *wanted,
            Selection::AnyOf(wanted) => {
                wanted.is_empty()
                    || (!value.is_empty() && wanted.iter().any(|w| *w == value.display()))
            }
        }
    }

    /// True if every selected value is still one of `options`
    pub fn is_valid_for(&self, options: &[String]) -> bool {
        match self {
            Selection::All => true,
            Selection::One(v) => options.contains(v),
            Selection::AnyOf(vs) => vs.iter().all(|v| options.contains(v)),
        }
    }

    /// Human readable form used in logs and the PDF report
    pub fn describe(&self) -> String {
        match self {
            Selection::All => ALL.to_string(),
            Selection::One(v) => v.clone(),
            Selection::AnyOf(vs) if vs.is_empty() => ALL.to_string(),
            Selection::AnyOf(vs) => vs.join(", "),
        }
    }
}

impl Serialize for Selection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Selection::All => serializer.serialize_str(ALL),
            Selection::One(v) => serializer.serialize_str(v),
            Selection::AnyOf(vs) => vs.serialize(serializer),
        }
    }
}

/// An ordered list of column filters
///
/// Filters are applied in insertion order; later entries for the same column
/// replace earlier ones in place.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    pub filters: Vec<(String, Selection)>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: impl Into<String>, selection: Selection) {
        let column = column.into();
        let selection = selection.normalized();
        match self.filters.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = selection,
            None => self.filters.push((column, selection)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, selection: Selection) -> Self {
        self.set(column, selection);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Selection> {
        self.filters
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, s)| s)
    }

    /// Parse `column=value` or `column=a|b|c` as given on the command line
    pub fn parse_arg(arg: &str) -> Option<(String, Selection)> {
        let (column, values) = arg.split_once('=')?;
        let column = column.trim();
        if column.is_empty() {
            return None;
        }
        let mut parts: Vec<String> = values
            .split('|')
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        let selection = match parts.len() {
            0 => Selection::All,
            1 => Selection::One(parts.remove(0)),
            _ => Selection::AnyOf(parts),
        };
        Some((column.to_string(), selection.normalized()))
    }
}

/// Distinct values of a column in first-appearance order
///
/// Empty cells are dropped. An absent column yields no options.
pub fn options(table: &Table, column: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    table
        .column(column)
        .filter(|v| !v.is_empty())
        .map(Value::display)
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// Apply every filter in order and return the surviving rows
///
/// Filters on columns the table does not have are skipped, matching the
/// dashboards that only show a dropdown when its column exists.
pub fn apply(table: &Table, filters: &FilterSet) -> Table {
    let mut current = table.clone();
    for (column, selection) in &filters.filters {
        if selection.is_all() {
            continue;
        }
        let Some(idx) = current.column_index(column) else {
            continue;
        };
        current = current.filter_rows(|row| selection.matches(&row[idx]));
    }
    current
}
