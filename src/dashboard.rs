use crate::error::{DashboardError, Result};
use crate::filter::{self, FilterSet, Selection};
use crate::metrics::{self, GroupRow, Metric};
use crate::profile::{Aggregation, ChartKind, ChartSpec, DashboardProfile, FilterMode};
use crate::table::{Table, Value};
use log::warn;
use serde::{Deserialize, Serialize};

/// A filter widget as it should be drawn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterWidget {
    pub label: String,
    pub column: String,
    pub mode: FilterMode,
    pub options: Vec<String>,
    pub selection: Selection,
}

/// An aggregated series ready to be charted or exported
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub name: String,
    pub title: String,
    pub kind: ChartKind,
    pub x_label: String,
    pub y_label: String,
    pub aggregation: Aggregation,
    pub series: Vec<GroupRow>,
}

/// Everything one rendering of the dashboard shows
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub title: String,
    pub row_count: usize,
    pub filtered_row_count: usize,
    pub kpis: Vec<Metric>,
    pub fill_rates: Vec<Metric>,
    pub filters: Vec<FilterWidget>,
    pub charts: Vec<ChartData>,
}

impl DashboardView {
    /// KPIs followed by fill rates, in display order
    pub fn metrics(&self) -> impl Iterator<Item = &Metric> {
        self.kpis.iter().chain(self.fill_rates.iter())
    }

    pub fn chart(&self, name: &str) -> Result<&ChartData> {
        self.charts
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| DashboardError::UnknownChart(name.to_string()))
    }
}

/// A loaded table bound to the profile that interprets it
pub struct Dashboard<'a> {
    pub table: &'a Table,
    pub profile: &'a DashboardProfile,
}

impl<'a> Dashboard<'a> {
    /// Bind a table to a profile
    ///
    /// # Errors
    /// * `DashboardError::MissingColumns` when the profile's required columns
    ///   are not all present; nothing is rendered in that case
    pub fn new(table: &'a Table, profile: &'a DashboardProfile) -> Result<Self> {
        table.require_columns(&profile.required)?;
        Ok(Dashboard { table, profile })
    }

    /// Filter widgets for the profile's filter columns that exist in the table
    ///
    /// Options always come from the unfiltered table.
    pub fn widgets(&self, filters: &FilterSet) -> Vec<FilterWidget> {
        self.profile
            .filters
            .iter()
            .filter(|f| self.table.has_column(&f.column))
            .map(|f| FilterWidget {
                label: f.label.clone(),
                column: f.column.clone(),
                mode: f.mode,
                options: filter::options(self.table, &f.column),
                selection: filters.get(&f.column).cloned().unwrap_or_default(),
            })
            .collect()
    }

    /// Apply the filters, then aggregate
    pub fn build(&self, filters: &FilterSet) -> DashboardView {
        let filtered = filter::apply(self.table, filters);

        let charts = self
            .profile
            .charts
            .iter()
            .filter_map(|spec| {
                if !self.table.has_column(&spec.group_by) || !self.table.has_column(&spec.value) {
                    warn!(
                        "Skipping chart {}: needs columns {:?} and {:?}",
                        spec.name, spec.group_by, spec.value
                    );
                    return None;
                }
                Some(chart_data(&filtered, spec))
            })
            .collect();

        DashboardView {
            title: self.profile.title.clone(),
            row_count: self.table.len(),
            filtered_row_count: filtered.len(),
            kpis: metrics::kpi_totals(&filtered, self.profile),
            fill_rates: metrics::fill_rates(&filtered, self.profile),
            filters: self.widgets(filters),
            charts,
        }
    }

    /// The rows that survive the filters, for CSV/Excel download
    pub fn filtered(&self, filters: &FilterSet) -> Table {
        filter::apply(self.table, filters)
    }
}

fn chart_data(table: &Table, spec: &ChartSpec) -> ChartData {
    ChartData {
        name: spec.name.clone(),
        title: spec.title.clone(),
        kind: spec.kind,
        x_label: spec.group_by.clone(),
        y_label: spec.value.clone(),
        aggregation: spec.aggregation,
        series: metrics::group_by(table, &spec.group_by, &spec.value, spec.aggregation),
    }
}

/// Make a freshly loaded table usable by a profile
///
/// Percentage text is converted to numbers and the required columns are
/// checked.
///
/// # Errors
/// * `DashboardError::InvalidNumber` for malformed percentages
/// * `DashboardError::MissingColumns` when required columns are absent
pub fn prepare_table(mut table: Table, profile: &DashboardProfile) -> Result<Table> {
    table.coerce_percent_columns(&profile.percent_columns)?;
    table.require_columns(&profile.required)?;
    Ok(table)
}

/// The aggregated series of a chart as a table: key, value, row count
///
/// The value column is named after the aggregation, e.g.
/// `mean of sku_level_fill_rate`.
pub fn summary_table(chart: &ChartData) -> Table {
    let agg = match chart.aggregation {
        Aggregation::Sum => "sum",
        Aggregation::Mean => "mean",
    };
    Table::new(
        vec![
            chart.x_label.clone(),
            format!("{} of {}", agg, chart.y_label),
            "rows".to_string(),
        ],
        chart
            .series
            .iter()
            .map(|g| {
                vec![
                    Value::Text(g.key.clone()),
                    Value::Number(g.value),
                    Value::Number(g.count as f64),
                ]
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::from_csv_reader;

    const DATA: &str = "\
manufacturer_name,category_name,subcategory_name,wh_name,sku_po_qty,sku_grn_qty,sku_level_fill_rate,overall_po_fill_rate
Acme,Snacks,Chips,WH1,100,90,90%,95%
Acme,Drinks,Soda,WH2,50,25,50%,60%
Bolt,Snacks,Nuts,WH1,200,200,100%,100%
";

    fn table() -> Table {
        let t = from_csv_reader(DATA.as_bytes()).unwrap();
        prepare_table(t, &DashboardProfile::po_fill_rate()).unwrap()
    }

    #[test]
    fn filters_narrow_kpis_but_not_options() {
        let t = table();
        let profile = DashboardProfile::po_fill_rate();
        let dash = Dashboard::new(&t, &profile).unwrap();
        let filters = FilterSet::new().with("manufacturer_name", Selection::One("Acme".into()));
        let view = dash.build(&filters);

        assert_eq!(view.row_count, 3);
        assert_eq!(view.filtered_row_count, 2);
        assert_eq!(view.kpis[0].value, 150.0);
        assert_eq!(view.fill_rates[0].value, 70.0);
        assert_eq!(view.filters[0].options, vec!["Acme", "Bolt"]);
        assert_eq!(view.filters[0].selection, Selection::One("Acme".into()));
        assert_eq!(view.charts.len(), 3);
        assert_eq!(view.chart("manufacturer").unwrap().series.len(), 1);
    }

    #[test]
    fn required_columns_halt_rendering() {
        let t = table();
        let profile = DashboardProfile::qfr_pivot();
        assert!(matches!(
            Dashboard::new(&t, &profile),
            Err(DashboardError::MissingColumns(cols)) if cols == vec!["Manufacturer", "Category"]
        ));
    }

    #[test]
    fn charts_with_absent_columns_are_skipped() {
        let t = table();
        let mut profile = DashboardProfile::po_fill_rate();
        profile.charts[0].value = "missing".into();
        let view = Dashboard::new(&t, &profile).unwrap().build(&FilterSet::new());
        assert_eq!(view.charts.len(), 2);
        assert!(matches!(view.chart("category"), Err(DashboardError::UnknownChart(_))));
    }

    #[test]
    fn summary_table_mirrors_the_series() {
        let t = table();
        let profile = DashboardProfile::po_fill_rate();
        let view = Dashboard::new(&t, &profile).unwrap().build(&FilterSet::new());
        let summary = summary_table(view.chart("category").unwrap());
        assert_eq!(
            summary.columns,
            vec!["category_name", "mean of sku_level_fill_rate", "rows"]
        );
        assert_eq!(summary.rows[1][0], Value::Text("Snacks".into()));
        assert_eq!(summary.rows[1][1], Value::Number(95.0));
        assert_eq!(summary.rows[1][2], Value::Number(2.0));
    }
}
