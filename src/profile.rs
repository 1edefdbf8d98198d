use crate::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A column summed into a headline KPI
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KpiSpec {
    pub column: String,
    pub label: String,
}

/// Where a fill rate comes from
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// Mean of a percentage column
    Column(String),

    /// Σnumerator / Σdenominator × 100, e.g. GRN qty over PO qty
    Ratio {
        numerator: String,
        denominator: String,
    },
}

/// A fill rate KPI such as QFR or LFR
///
/// `sources` are tried in order; the first one whose columns exist in the
/// table wins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FillRateSpec {
    pub label: String,
    pub sources: Vec<RateSource>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Dropdown: "All" or exactly one value
    #[default]
    Single,

    /// Multiselect: any subset of values
    Multi,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub label: String,
    pub column: String,
    #[serde(default)]
    pub mode: FilterMode,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    #[default]
    Mean,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    #[default]
    Bar,
    Pie,
}

/// One aggregate-and-chart widget
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Short identifier used in URLs and export file names
    pub name: String,
    pub title: String,
    pub group_by: String,
    pub value: String,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub kind: ChartKind,
}

/// Everything that distinguishes one dashboard variant from another
///
/// The variants only differ in column naming, which KPIs they show and which
/// filters and charts they offer, so a variant is data rather than code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardProfile {
    pub name: String,
    pub title: String,

    /// Columns that must be present; anything else is optional
    #[serde(default)]
    pub required: Vec<String>,

    /// Columns holding percentage strings such as `"87.5%"`
    #[serde(default)]
    pub percent_columns: Vec<String>,

    #[serde(default)]
    pub kpis: Vec<KpiSpec>,

    #[serde(default)]
    pub fill_rates: Vec<FillRateSpec>,

    #[serde(default)]
    pub filters: Vec<FilterSpec>,

    #[serde(default)]
    pub charts: Vec<ChartSpec>,
}

/// Names accepted by `DashboardProfile::builtin`
pub const BUILTIN_PROFILES: [&str; 2] = ["po_fill_rate", "qfr_pivot"];

fn kpi(column: &str, label: &str) -> KpiSpec {
    KpiSpec {
        column: column.to_string(),
        label: label.to_string(),
    }
}

fn filter(label: &str, column: &str, mode: FilterMode) -> FilterSpec {
    FilterSpec {
        label: label.to_string(),
        column: column.to_string(),
        mode,
    }
}

fn chart(
    name: &str,
    title: &str,
    group_by: &str,
    value: &str,
    aggregation: Aggregation,
    kind: ChartKind,
) -> ChartSpec {
    ChartSpec {
        name: name.to_string(),
        title: title.to_string(),
        group_by: group_by.to_string(),
        value: value.to_string(),
        aggregation,
        kind,
    }
}

impl DashboardProfile {
    /// Look up a built-in profile by name
    ///
    /// # Errors
    /// * `DashboardError::UnknownProfile` if `name` is not one of
    ///   `BUILTIN_PROFILES`
    pub fn builtin(name: &str) -> Result<Self> {
        match name {
            "po_fill_rate" => Ok(Self::po_fill_rate()),
            "qfr_pivot" => Ok(Self::qfr_pivot()),
            other => Err(DashboardError::UnknownProfile(other.to_string())),
        }
    }

    /// The line-item export with `sku_level_fill_rate` / `overall_po_fill_rate`
    pub fn po_fill_rate() -> Self {
        DashboardProfile {
            name: "po_fill_rate".to_string(),
            title: "Fill Rate Dashboard".to_string(),
            required: Vec::new(),
            percent_columns: vec![
                "sku_level_fill_rate".to_string(),
                "overall_po_fill_rate".to_string(),
            ],
            kpis: vec![
                kpi("sku_po_qty", "Total SKU PO Qty"),
                kpi("sku_grn_qty", "Total SKU GRN Qty"),
                kpi("sku_po_line", "Total PO Lines"),
                kpi("sku_grn_line", "Total GRN Lines"),
                kpi("po_amount", "PO Amount"),
                kpi("grn_amount", "GRN Amount"),
                kpi("Vendor loss A/c", "Vendor Loss A/c"),
            ],
            fill_rates: vec![
                FillRateSpec {
                    label: "QFR (%)".to_string(),
                    sources: vec![RateSource::Column("sku_level_fill_rate".to_string())],
                },
                FillRateSpec {
                    label: "LFR (%)".to_string(),
                    sources: vec![RateSource::Column("overall_po_fill_rate".to_string())],
                },
            ],
            filters: vec![
                filter("Manufacturer", "manufacturer_name", FilterMode::Single),
                filter("Category", "category_name", FilterMode::Single),
                filter("Subcategory", "subcategory_name", FilterMode::Single),
                filter("Location", "wh_name", FilterMode::Single),
            ],
            charts: vec![
                chart(
                    "category",
                    "QFR by Category",
                    "category_name",
                    "sku_level_fill_rate",
                    Aggregation::Mean,
                    ChartKind::Bar,
                ),
                chart(
                    "subcategory",
                    "QFR by Subcategory",
                    "subcategory_name",
                    "sku_level_fill_rate",
                    Aggregation::Mean,
                    ChartKind::Bar,
                ),
                chart(
                    "manufacturer",
                    "LFR by Manufacturer",
                    "manufacturer_name",
                    "overall_po_fill_rate",
                    Aggregation::Mean,
                    ChartKind::Bar,
                ),
            ],
        }
    }

    /// The pivot-table export with `Sum of ...` columns
    pub fn qfr_pivot() -> Self {
        DashboardProfile {
            name: "qfr_pivot".to_string(),
            title: "QFR / LFR Summary".to_string(),
            required: vec!["Manufacturer".to_string(), "Category".to_string()],
            percent_columns: vec!["Sum of QFR".to_string(), "Sum of LFR".to_string()],
            kpis: vec![
                kpi("Sum of PO Qty", "Total PO Qty"),
                kpi("Sum of GRN Qty", "Total GRN Qty"),
                kpi("Sum of PO Amount", "PO Amount"),
                kpi("Sum of GRN Amount", "GRN Amount"),
            ],
            fill_rates: vec![
                FillRateSpec {
                    label: "QFR (%)".to_string(),
                    sources: vec![
                        RateSource::Column("Sum of QFR".to_string()),
                        RateSource::Ratio {
                            numerator: "Sum of GRN Qty".to_string(),
                            denominator: "Sum of PO Qty".to_string(),
                        },
                    ],
                },
                FillRateSpec {
                    label: "LFR (%)".to_string(),
                    sources: vec![RateSource::Column("Sum of LFR".to_string())],
                },
            ],
            filters: vec![
                filter("Manufacturer", "Manufacturer", FilterMode::Multi),
                filter("Category", "Category", FilterMode::Multi),
                filter("Subcategory", "Subcategory", FilterMode::Multi),
                filter("Warehouse", "Warehouse", FilterMode::Multi),
            ],
            charts: vec![
                chart(
                    "category",
                    "QFR by Category",
                    "Category",
                    "Sum of QFR",
                    Aggregation::Mean,
                    ChartKind::Bar,
                ),
                chart(
                    "manufacturer",
                    "LFR by Manufacturer",
                    "Manufacturer",
                    "Sum of LFR",
                    Aggregation::Mean,
                    ChartKind::Bar,
                ),
                chart(
                    "warehouse",
                    "GRN Qty by Warehouse",
                    "Warehouse",
                    "Sum of GRN Qty",
                    Aggregation::Sum,
                    ChartKind::Pie,
                ),
            ],
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let profile: DashboardProfile = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn chart(&self, name: &str) -> Result<&ChartSpec> {
        self.charts
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| DashboardError::UnknownChart(name.to_string()))
    }

    /// Reject profiles that could never render
    ///
    /// Chart names must be unique and non-empty since they address charts in
    /// URLs and file names, and a fill rate needs at least one source.
    pub fn validate(&self) -> Result<()> {
        for (i, c) in self.charts.iter().enumerate() {
            let url_safe = c
                .name
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
            if c.name.is_empty() || !url_safe {
                return Err(DashboardError::Config(format!(
                    "chart name {:?} must be non-empty and URL safe",
                    c.name
                )));
            }
            if self.charts[..i].iter().any(|other| other.name == c.name) {
                return Err(DashboardError::Config(format!(
                    "duplicate chart name {:?}",
                    c.name
                )));
            }
        }
        if let Some(rate) = self.fill_rates.iter().find(|r| r.sources.is_empty()) {
            return Err(DashboardError::Config(format!(
                "fill rate {:?} has no sources",
                rate.label
            )));
        }
        Ok(())
    }
}

impl Default for DashboardProfile {
    fn default() -> Self {
        Self::po_fill_rate()
    }
}
