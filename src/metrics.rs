use crate::profile::{Aggregation, DashboardProfile, RateSource};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// A column sum (quantities, amounts, line counts)
    Total,
    /// A percentage
    Rate,
}

/// One headline number on the dashboard
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub label: String,
    pub value: f64,
    pub kind: MetricKind,
}

impl Metric {
    /// Text shown on the dashboard cards: `1,234` for totals, `87.50%` for rates
    pub fn display(&self) -> String {
        match self.kind {
            MetricKind::Total => format_thousands(self.value, 0),
            MetricKind::Rate => format!("{:.2}%", self.value),
        }
    }

    /// Text used in the PDF summary
    ///
    /// Integral totals print without decimals; everything else gets two.
    pub fn report_value(&self) -> String {
        match self.kind {
            MetricKind::Total if self.value.fract() == 0.0 => format_thousands(self.value, 0),
            _ => format_thousands(self.value, 2),
        }
    }
}

/// One bar (or slice) of an aggregated chart
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupRow {
    pub key: String,
    pub value: f64,
    /// Number of rows that fed this group
    pub count: usize,
}

/// Sum every KPI column present in the table
pub fn kpi_totals(table: &Table, profile: &DashboardProfile) -> Vec<Metric> {
    profile
        .kpis
        .iter()
        .filter(|k| table.has_column(&k.column))
        .map(|k| Metric {
            label: k.label.clone(),
            value: table.numeric_values(&k.column).sum(),
            kind: MetricKind::Total,
        })
        .collect()
}

/// Compute the fill rate KPIs
///
/// Each rate uses its first source whose columns exist. A rate whose source
/// has no numeric values, or a ratio with a zero denominator, is omitted
/// rather than reported as NaN.
pub fn fill_rates(table: &Table, profile: &DashboardProfile) -> Vec<Metric> {
    profile
        .fill_rates
        .iter()
        .filter_map(|spec| {
            let source = spec.sources.iter().find(|s| match s {
                RateSource::Column(c) => table.has_column(c),
                RateSource::Ratio {
                    numerator,
                    denominator,
                } => table.has_column(numerator) && table.has_column(denominator),
            })?;

            let value = match source {
                RateSource::Column(c) => mean(table.numeric_values(c))?,
                RateSource::Ratio {
                    numerator,
                    denominator,
                } => {
                    let num: f64 = table.numeric_values(numerator).sum();
                    let den: f64 = table.numeric_values(denominator).sum();
                    if den == 0.0 {
                        return None;
                    }
                    num / den * 100.0
                }
            };

            Some(Metric {
                label: spec.label.clone(),
                value,
                kind: MetricKind::Rate,
            })
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Group a table by one categorical column and aggregate one numeric column
///
/// Groups are ordered by key. Rows with an empty key are dropped. For
/// `Aggregation::Mean`, empty values are ignored and a group with no numeric
/// values at all is left out. Absent columns produce no groups.
///
/// # Arguments
/// * `table` - Rows to aggregate
/// * `key` - Categorical column to group by
/// * `value` - Numeric column to aggregate
/// * `aggregation` - Sum or mean
///
/// # Examples
/// ```
/// use fillrate::loader::from_csv_reader;
/// use fillrate::metrics::group_by;
/// use fillrate::profile::Aggregation;
///
/// let table = from_csv_reader("cat,qty\nA,1\nB,2\nA,3\n".as_bytes()).unwrap();
/// let groups = group_by(&table, "cat", "qty", Aggregation::Sum);
/// assert_eq!(groups[0].key, "A");
/// assert_eq!(groups[0].value, 4.0);
/// ```
pub fn group_by(table: &Table, key: &str, value: &str, aggregation: Aggregation) -> Vec<GroupRow> {
    let (Some(k), Some(v)) = (table.column_index(key), table.column_index(value)) else {
        return Vec::new();
    };

    // key -> (sum, numeric count, row count)
    let mut groups: BTreeMap<String, (f64, usize, usize)> = BTreeMap::new();
    for row in &table.rows {
        if row[k].is_empty() {
            continue;
        }
        let entry = groups.entry(row[k].display()).or_insert((0.0, 0, 0));
        entry.2 += 1;
        if let Some(n) = row[v].as_number() {
            entry.0 += n;
            entry.1 += 1;
        }
    }

    groups
        .into_iter()
        .filter_map(|(key, (sum, numeric, rows))| {
            let value = match aggregation {
                Aggregation::Sum => sum,
                Aggregation::Mean if numeric == 0 => return None,
                Aggregation::Mean => sum / numeric as f64,
            };
            Some(GroupRow {
                key,
                value,
                count: rows,
            })
        })
        .collect()
}

/// Format a number with thousands separators
///
/// # Examples
/// ```
/// use fillrate::metrics::format_thousands;
///
/// assert_eq!(format_thousands(1234567.891, 2), "1,234,567.89");
/// assert_eq!(format_thousands(-1000.0, 0), "-1,000");
/// ```
pub fn format_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let negative = value < 0.0 && formatted.chars().any(|c| c != '0' && c != '.');
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(f) = frac_part {
        out.push('.');
        out.push_str(f);
    }
    out
}
