//! Workbook I/O
//!
//! Reads every sheet of a workbook into plain cell values (calamine) and
//! rewrites the whole file from those values (rust_xlsxwriter). There is no
//! row-level persistence: each write replaces the file in full.
//!
//! Formatting and formulas are not carried across a rewrite; cells keep the
//! values the workbook last computed.

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use gamelog_common::{Error, Result};
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook as XlsxWorkbook, XlsxError};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Creation date stamped into every written file's document properties
///
/// The writer defaults to the current time, which would make two writes of
/// identical cells differ byte-wise.
const DOCUMENT_CREATED: (u16, u8, u8) = (2000, 1, 1);

/// One cell value, independent of the workbook format
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Trimmed display text, `None` for empty cells
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            CellValue::Empty => return None,
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::DateTime(dt) if dt.time() == chrono::NaiveTime::MIN => {
                dt.date().format("%Y-%m-%d").to_string()
            }
            CellValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(value) if !dt.is_duration() => CellValue::DateTime(value),
                _ => CellValue::Number(dt.as_f64()),
            },
            Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .map(CellValue::DateTime)
                .or_else(|_| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .map(|d| CellValue::DateTime(d.and_time(chrono::NaiveTime::MIN)))
                })
                .unwrap_or_else(|_| CellValue::Text(s.clone())),
            Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(_) | Data::Empty => CellValue::Empty,
        }
    }
}

/// One sheet: a header row followed by data rows
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub name: String,
    /// Zero-based (row, column) of the header row's first cell
    pub origin: (u32, u32),
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            origin: (0, 0),
            headers,
            rows,
        }
    }

    /// Cell at (row, column), `Empty` for ragged rows
    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&CellValue::Empty)
    }

    /// Overwrite a cell, padding the row when it is shorter than `column`
    pub fn set_cell(&mut self, row: usize, column: usize, value: CellValue) {
        if let Some(cells) = self.rows.get_mut(row) {
            if cells.len() <= column {
                cells.resize(column + 1, CellValue::Empty);
            }
            cells[column] = value;
        }
    }

    /// Append a header and return its column index
    pub fn push_column(&mut self, header: impl Into<String>) -> usize {
        self.headers.push(header.into());
        self.headers.len() - 1
    }
}

/// All sheets of a workbook, in workbook order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    pub sheets: Vec<SheetTable>,
}

impl Workbook {
    /// Index of `preferred` when present, else the first sheet
    pub fn select_index(&self, preferred: Option<&str>) -> Result<usize> {
        if self.sheets.is_empty() {
            return Err(Error::Spreadsheet("Workbook contains no sheets".to_string()));
        }
        let index = preferred
            .and_then(|name| self.sheets.iter().position(|s| s.name == name))
            .unwrap_or(0);
        if let Some(name) = preferred {
            if self.sheets[index].name != name {
                debug!(preferred = %name, using = %self.sheets[index].name, "Preferred sheet missing, using first sheet");
            }
        }
        Ok(index)
    }

    /// Sheet named `preferred` when present, else the first sheet
    pub fn select(&self, preferred: Option<&str>) -> Result<&SheetTable> {
        let index = self.select_index(preferred)?;
        Ok(&self.sheets[index])
    }
}

/// Read every sheet of the workbook at `path`
pub fn read_workbook(path: &Path) -> Result<Workbook> {
    if !path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Spreadsheet not found at {}", path.display()),
        )));
    }

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| Error::Spreadsheet(format!("Open {} failed: {}", path.display(), e)))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| Error::Spreadsheet(format!("Read sheet '{}' failed: {}", name, e)))?;

        let origin = range.start().unwrap_or((0, 0));
        let mut rows = range.rows();
        let headers = rows
            .next()
            .map(|header_row| {
                header_row
                    .iter()
                    .map(|cell| CellValue::from(cell).as_text().unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default();
        let rows = rows
            .map(|row| row.iter().map(CellValue::from).collect())
            .collect::<Vec<Vec<CellValue>>>();

        debug!(sheet = %name, rows = rows.len(), "Loaded sheet");
        sheets.push(SheetTable {
            name,
            origin,
            headers,
            rows,
        });
    }

    Ok(Workbook { sheets })
}

/// Serialize every sheet and replace the file at `path`
///
/// Output depends only on the cell values, so rewriting unchanged values
/// produces the same bytes. Not crash-safe: the file is written in place,
/// without a staging copy.
pub fn write_workbook(path: &Path, workbook: &Workbook) -> Result<()> {
    let mut xlsx = XlsxWorkbook::new();
    let (year, month, day) = DOCUMENT_CREATED;
    let created = ExcelDateTime::from_ymd(year, month, day).map_err(xlsx_error)?;
    xlsx.set_properties(&DocProperties::new().set_creation_datetime(&created));

    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for sheet in &workbook.sheets {
        let worksheet = xlsx.add_worksheet();
        worksheet.set_name(&sheet.name).map_err(xlsx_error)?;

        let (row0, col0) = sheet.origin;
        let header_cells = sheet.headers.iter().map(|h| CellValue::Text(h.clone()));
        let all_rows = std::iter::once(header_cells.collect::<Vec<_>>())
            .chain(sheet.rows.iter().cloned());

        for (r, cells) in all_rows.enumerate() {
            let row = row0 + r as u32;
            for (c, cell) in cells.iter().enumerate() {
                let col = u16::try_from(col0 as usize + c).map_err(|_| {
                    Error::Spreadsheet(format!("Sheet '{}' has too many columns", sheet.name))
                })?;
                match cell {
                    CellValue::Empty => {}
                    CellValue::Text(s) => {
                        worksheet.write_string(row, col, s).map_err(xlsx_error)?;
                    }
                    CellValue::Number(n) => {
                        worksheet.write_number(row, col, *n).map_err(xlsx_error)?;
                    }
                    CellValue::Bool(b) => {
                        worksheet.write_boolean(row, col, *b).map_err(xlsx_error)?;
                    }
                    CellValue::DateTime(dt) => {
                        let format = if dt.time() == chrono::NaiveTime::MIN {
                            &date_format
                        } else {
                            &datetime_format
                        };
                        worksheet
                            .write_number_with_format(row, col, to_excel_serial(dt), format)
                            .map_err(xlsx_error)?;
                    }
                }
            }
        }
    }

    xlsx.save(path)
        .map_err(|e| Error::Spreadsheet(format!("Write {} failed: {}", path.display(), e)))?;
    debug!(path = %path.display(), sheets = workbook.sheets.len(), "Workbook written");
    Ok(())
}

fn xlsx_error(e: XlsxError) -> Error {
    Error::Spreadsheet(e.to_string())
}

fn excel_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap_or_default()
        .and_time(chrono::NaiveTime::MIN)
}

/// Excel serial day number (1900 date system) for a timestamp
pub fn to_excel_serial(dt: &NaiveDateTime) -> f64 {
    (*dt - excel_epoch()).num_seconds() as f64 / SECONDS_PER_DAY
}

/// Timestamp for an Excel serial day number; `None` outside chrono's range
pub fn from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let seconds = (serial * SECONDS_PER_DAY).round() as i64;
    excel_epoch().checked_add_signed(chrono::Duration::try_seconds(seconds)?)
}

/// Change marker for the spreadsheet: `"{mtime}-{size}"`
///
/// Clients poll this to learn when the file was edited or rewritten.
pub fn file_version(path: &Path) -> String {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);
            format!("{}-{}", mtime, meta.len())
        }
        Err(_) => {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            format!("missing-{}", now)
        }
    }
}
