use crate::error::Result;
use crate::table::{Table, Value};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

/// Download name for the filtered rows as CSV
pub const CSV_FILENAME: &str = "filtered_data.csv";

/// Download name for the filtered rows as Excel
pub const XLSX_FILENAME: &str = "filtered_data.xlsx";

/// Convert a table to CSV format
///
/// This function exports a table to CSV (Comma-Separated Values) format.
/// It creates a string where:
/// - The first row holds the column names
/// - Numbers are written the way they are displayed, empty cells as nothing
/// - Special characters (commas, quotes, newlines) are properly escaped
///
/// # Arguments
/// * `table` - Reference to the table to convert
///
/// # Returns
/// * `Result<String>` - CSV content as a string or an error
///
/// # Examples
/// ```
/// use fillrate::downloader::to_csv;
/// use fillrate::table::{Table, Value};
///
/// let table = Table::new(vec!["name".into()], vec![vec![Value::Text("a, b".into())]]);
/// assert_eq!(to_csv(&table).unwrap(), "name\n\"a, b\"\n");
/// ```
pub fn to_csv(table: &Table) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(Value::display))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Convert a table to XLSX format
///
/// This function exports a table to XLSX (Excel) format using the
/// rust_xlsxwriter library. The header row is bold, numbers are stored as
/// numbers and text as text, so the file opens with working formulas and
/// sorting in any spreadsheet application.
///
/// # Arguments
/// * `table` - Reference to the table to convert
/// * `sheet_name` - Name of the single worksheet
///
/// # Returns
/// * `Result<Vec<u8>>` - XLSX file content as bytes or an error
pub fn to_xlsx(table: &Table, sheet_name: &str) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(sheet_name)?;

    let header = Format::new().set_bold();
    for (c, name) in table.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, c as u16, name, &header)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, value) in row.iter().enumerate() {
            let c = c as u16;
            match value {
                Value::Number(n) => {
                    worksheet.write_number(r, c, *n)?;
                }
                Value::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                Value::Empty => {}
            }
        }
    }

    workbook.push_worksheet(worksheet);

    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

/// File name for a chart's aggregated table
pub fn summary_filename(chart_name: &str) -> String {
    format!("summary_{}.xlsx", chart_name)
}
