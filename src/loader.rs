use crate::error::{DashboardError, Result};
use crate::table::{Table, Value};
use calamine::{Data, DataType, Reader, Sheets, open_workbook_auto, open_workbook_auto_from_rs};
use chrono::Timelike;
use log::info;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

/// A table together with the workbook it came from
#[derive(Clone, Debug)]
pub struct LoadedTable {
    pub table: Table,

    /// Worksheet names of the source workbook (empty for CSV)
    pub sheet_names: Vec<String>,
}

/// Load a table from CSV data
///
/// The first record is the header. Fields are parsed with `Value::parse`, so
/// numbers become numbers and percentage strings stay text until the profile
/// coerces them. Rows may be ragged.
///
/// # Arguments
/// * `reader` - Any source of CSV bytes
///
/// # Returns
/// * `Result<Table>` - The parsed table, or `DashboardError::EmptyFile` when
///   there is no header
///
/// # Examples
/// ```
/// use fillrate::loader::from_csv_reader;
///
/// let table = from_csv_reader("sku,qty\nA,3\n".as_bytes()).unwrap();
/// assert_eq!(table.columns, vec!["sku", "qty"]);
/// ```
pub fn from_csv_reader<R: Read>(reader: R) -> Result<Table> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let columns: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if columns.iter().all(|c| c.is_empty()) {
        return Err(DashboardError::EmptyFile);
    }

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        rows.push(record.iter().map(Value::parse).collect());
    }

    Ok(Table::new(columns, rows))
}

/// Load a table from a CSV file on disk
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<Table> {
    let file = File::open(filepath)?;
    from_csv_reader(file)
}

/// Load the first worksheet of an Excel workbook held in memory
///
/// The first row of the sheet is the header. Integers and floats become
/// numbers, strings go through `Value::parse`, and every other cell type is
/// kept as its display text.
pub fn from_excel_bytes(bytes: Vec<u8>) -> Result<LoadedTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    read_first_sheet(&mut workbook)
}

/// Load the first worksheet of an Excel workbook on disk
pub fn from_excel(filepath: impl AsRef<Path>) -> Result<LoadedTable> {
    let mut workbook = open_workbook_auto(filepath)?;
    read_first_sheet(&mut workbook)
}

fn read_first_sheet<RS: Read + Seek>(workbook: &mut Sheets<RS>) -> Result<LoadedTable> {
    let sheet_names = workbook.sheet_names();
    let first = sheet_names.first().ok_or(DashboardError::EmptyFile)?.clone();
    let range = workbook.worksheet_range(&first)?;

    let mut rows = range.rows();
    let header = rows.next().ok_or(DashboardError::EmptyFile)?;
    let columns: Vec<String> = header
        .iter()
        .map(|cell| cell_to_value(cell).display())
        .collect();

    let rows = rows.map(|row| row.iter().map(cell_to_value).collect()).collect();

    Ok(LoadedTable {
        table: Table::new(columns, rows),
        sheet_names,
    })
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Empty,
        Data::Int(i) => Value::Number(*i as f64),
        Data::Float(f) => Value::Number(*f),
        Data::String(s) => Value::parse(s),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(dt) if dt.num_seconds_from_midnight() == 0 => {
                Value::Text(dt.format("%Y-%m-%d").to_string())
            }
            Some(dt) => Value::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Value::Text(cell.to_string()),
        },
        other => Value::parse(&other.to_string()),
    }
}

/// Detect the file type from its name and load the matching format
///
/// # Arguments
/// * `filename` - Original file name; only the extension is inspected
/// * `bytes` - File contents
///
/// # Errors
/// * `DashboardError::UnsupportedFormat` for unknown or missing extensions
pub fn load_upload(filename: &str, bytes: Vec<u8>) -> Result<LoadedTable> {
    let loaded = match extension_of(Path::new(filename)).as_deref() {
        Some("csv") => LoadedTable {
            table: from_csv_reader(bytes.as_slice())?,
            sheet_names: Vec::new(),
        },
        Some("xlsx") | Some("xls") | Some("xlsm") | Some("xlsb") | Some("ods") => {
            from_excel_bytes(bytes)?
        }
        Some(ext) => return Err(DashboardError::UnsupportedFormat(ext.to_string())),
        None => return Err(DashboardError::UnsupportedFormat(filename.to_string())),
    };

    info!(
        "Loaded {} ({} rows, {} columns)",
        filename,
        loaded.table.len(),
        loaded.table.columns.len()
    );
    Ok(loaded)
}

/// Load a file from disk, dispatching on its extension
///
/// # Examples
/// ```no_run
/// use fillrate::loader::load_table;
///
/// match load_table("fill_rate.xlsx") {
///     Ok(loaded) => println!("Loaded {} rows", loaded.table.len()),
///     Err(e) => eprintln!("Error loading file: {}", e),
/// }
/// ```
pub fn load_table(filepath: impl AsRef<Path>) -> Result<LoadedTable> {
    let path = filepath.as_ref();
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    load_upload(&name, bytes)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}
