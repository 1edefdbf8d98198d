use fillrate::dashboard::{self, Dashboard};
use fillrate::downloader;
use fillrate::error::DashboardError;
use fillrate::filter::{FilterSet, Selection};
use fillrate::loader;
use fillrate::profile::DashboardProfile;
use fillrate::table::Value;
use std::fs;
use tempfile::TempDir;

const PO_LINES: &str = "\
manufacturer_name,category_name,subcategory_name,wh_name,sku_po_qty,sku_grn_qty,sku_po_line,sku_grn_line,po_amount,grn_amount,sku_level_fill_rate,overall_po_fill_rate
Acme,Snacks,Chips,WH1,100,90,1,1,1000,900,90%,95%
Acme,Drinks,Soda,WH2,50,25,1,1,500,250,50%,60%
Bolt,Snacks,Nuts,WH1,200,200,1,1,4000,4000,100%,100%
Bolt,Drinks,Juice,WH3,80,60,1,0,800,600,75%,80%
";

const PIVOT: &str = "\
Manufacturer,Category,Subcategory,Warehouse,Sum of PO Qty,Sum of GRN Qty,Sum of QFR,Sum of LFR
Acme,Snacks,Chips,North,100,80,80%,90%
Acme,Drinks,Soda,South,100,50,50%,70%
Bolt,Snacks,Nuts,North,200,200,100%,100%
";

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn po_lines_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "po.csv", PO_LINES);
    let profile = DashboardProfile::po_fill_rate();

    let loaded = loader::load_table(&path).unwrap();
    assert!(loaded.sheet_names.is_empty());
    let table = dashboard::prepare_table(loaded.table, &profile).unwrap();
    let dash = Dashboard::new(&table, &profile).unwrap();

    let all = dash.build(&FilterSet::new());
    assert_eq!(all.row_count, 4);
    assert_eq!(all.kpis[0].display(), "430");
    assert_eq!(all.fill_rates[0].display(), "78.75%");

    let filters = FilterSet::new()
        .with("manufacturer_name", Selection::One("Bolt".into()))
        .with("wh_name", Selection::One("WH1".into()));
    let view = dash.build(&filters);
    assert_eq!(view.filtered_row_count, 1);
    assert_eq!(view.kpis[0].value, 200.0);
    assert_eq!(view.fill_rates[0].value, 100.0);
    assert_eq!(view.fill_rates[1].value, 100.0);
    assert_eq!(view.filters[3].options, vec!["WH1", "WH2", "WH3"]);

    let csv = downloader::to_csv(&dash.filtered(&filters)).unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("manufacturer_name,category_name"));
    assert!(lines.next().unwrap().starts_with("Bolt,Snacks,Nuts,WH1,200,200"));
    assert_eq!(lines.next(), None);
}

#[test]
fn pivot_profile_uses_multiselect_filters() {
    let profile = DashboardProfile::qfr_pivot();
    let table = loader::from_csv_reader(PIVOT.as_bytes()).unwrap();
    let table = dashboard::prepare_table(table, &profile).unwrap();
    let dash = Dashboard::new(&table, &profile).unwrap();

    let filters = FilterSet::new().with(
        "Category",
        Selection::AnyOf(vec!["Snacks".into(), "Drinks".into()]),
    );
    let view = dash.build(&filters);
    assert_eq!(view.filtered_row_count, 3);

    let warehouse = view.chart("warehouse").unwrap();
    assert_eq!(warehouse.series[0].key, "North");
    assert_eq!(warehouse.series[0].value, 280.0);
    assert_eq!(warehouse.series[1].key, "South");
    assert_eq!(warehouse.series[1].value, 50.0);

    let filters = FilterSet::new().with("Manufacturer", Selection::AnyOf(vec!["Acme".into()]));
    let view = dash.build(&filters);
    assert_eq!(view.fill_rates[0].value, 65.0);
    assert_eq!(view.fill_rates[1].value, 80.0);
}

#[test]
fn pivot_without_qfr_column_derives_it() {
    let profile = DashboardProfile::qfr_pivot();
    let data = "Manufacturer,Category,Sum of PO Qty,Sum of GRN Qty\nAcme,Snacks,200,150\n";
    let table = loader::from_csv_reader(data.as_bytes()).unwrap();
    let table = dashboard::prepare_table(table, &profile).unwrap();
    let view = Dashboard::new(&table, &profile)
        .unwrap()
        .build(&FilterSet::new());
    assert_eq!(view.fill_rates.len(), 1);
    assert_eq!(view.fill_rates[0].value, 75.0);
    assert!(view.charts.is_empty());
}

#[test]
fn missing_pivot_columns_are_reported() {
    let profile = DashboardProfile::qfr_pivot();
    let table = loader::from_csv_reader("Category,Sum of QFR\nSnacks,80%\n".as_bytes()).unwrap();
    match dashboard::prepare_table(table, &profile) {
        Err(DashboardError::MissingColumns(cols)) => assert_eq!(cols, vec!["Manufacturer"]),
        other => panic!("expected missing columns, got {:?}", other.map(|t| t.columns)),
    }
}

#[test]
fn malformed_percentage_names_the_row() {
    let profile = DashboardProfile::po_fill_rate();
    let data = "sku_level_fill_rate\n90%\nabout half\n";
    let table = loader::from_csv_reader(data.as_bytes()).unwrap();
    match dashboard::prepare_table(table, &profile) {
        Err(DashboardError::InvalidNumber { column, row, value }) => {
            assert_eq!(column, "sku_level_fill_rate");
            assert_eq!(row, 2);
            assert_eq!(value, "about half");
        }
        other => panic!("expected invalid number, got {:?}", other.map(|t| t.len())),
    }
}

#[test]
fn filtered_excel_export_reloads() {
    let dir = TempDir::new().unwrap();
    let profile = DashboardProfile::po_fill_rate();
    let table = loader::from_csv_reader(PO_LINES.as_bytes()).unwrap();
    let table = dashboard::prepare_table(table, &profile).unwrap();
    let dash = Dashboard::new(&table, &profile).unwrap();
    let drinks = FilterSet::new().with("category_name", Selection::One("Drinks".into()));
    let filtered = dash.filtered(&drinks);

    let path = dir.path().join(downloader::XLSX_FILENAME);
    fs::write(&path, downloader::to_xlsx(&filtered, "Filtered").unwrap()).unwrap();

    let reloaded = loader::from_excel(&path).unwrap();
    assert_eq!(reloaded.sheet_names, vec!["Filtered"]);
    assert_eq!(reloaded.table.columns, filtered.columns);
    assert_eq!(reloaded.table.len(), 2);
    assert_eq!(reloaded.table.rows[0][0], Value::Text("Acme".into()));
    assert_eq!(reloaded.table.rows[1][4], Value::Number(80.0));
}

#[test]
fn unsupported_upload_is_rejected() {
    assert!(matches!(
        loader::load_upload("notes.txt", b"hello".to_vec()),
        Err(DashboardError::UnsupportedFormat(ext)) if ext == "txt"
    ));
}

#[test]
fn nan_percentages_are_skipped_like_blanks() {
    let profile = DashboardProfile::po_fill_rate();
    let data = "category_name,sku_level_fill_rate\nSnacks,80%\nSnacks,NaN%\n";
    let table = loader::from_csv_reader(data.as_bytes()).unwrap();
    let table = dashboard::prepare_table(table, &profile).unwrap();
    let view = Dashboard::new(&table, &profile)
        .unwrap()
        .build(&FilterSet::new());

    assert_eq!(view.fill_rates[0].value, 80.0);
    let category = view.chart("category").unwrap();
    assert_eq!(category.series[0].key, "Snacks");
    assert_eq!(category.series[0].value, 80.0);
    let json = serde_json::to_string(&view.fill_rates).unwrap();
    assert!(!json.contains("null"));
}
