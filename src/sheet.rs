//! Spreadsheet loading.
//!
//! A sheet is read by an ordered list of [`SheetStrategy`] implementations;
//! the first one that yields data rows under a header carrying all four
//! canonical fields wins, and its name is reported for observability.
//!
//! | Strategy | Reader | Header |
//! |----------|--------|--------|
//! | `fixed-header` | calamine, OOXML engine only | configured row (default: 3rd) |
//! | `detected-header` | calamine, engine picked from the extension | first row mapping all fields |
//! | `raw-cells` | zip + quick-xml over the worksheet XML | first non-empty row |
//!
//! The raw reader skips styles, themes and defined names entirely, which
//! keeps files loadable when their styling metadata trips up calamine.

use std::collections::BTreeMap;
use std::io::{BufReader, Read};
use std::path::Path;

use calamine::{open_workbook, open_workbook_auto, Data, Reader, Xlsx};
use chrono::NaiveDateTime;

use crate::columns::ColumnMap;
use crate::error::LoadError;

/// Maximum decompressed bytes read from a single ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 64 * 1024 * 1024;
/// Last column a worksheet can address (`XFD`), zero-based.
const MAX_COLUMN: usize = 16_383;
/// Rows inspected when looking for a header.
const HEADER_SCAN_ROWS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Error(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// 1-based row number as shown by spreadsheet software.
    pub number: usize,
    pub cells: Vec<CellValue>,
}

impl Row {
    pub fn cell(&self, col: usize) -> &CellValue {
        self.cells.get(col).unwrap_or(&CellValue::Empty)
    }

    fn is_blank(&self) -> bool {
        self.cells.iter().all(CellValue::is_empty)
    }
}

/// Header texts plus the non-blank rows below them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    fn from_rows(header: &Row, data: impl IntoIterator<Item = Row>) -> Self {
        Table {
            headers: header.cells.iter().map(crate::sanitize::safe_string).collect(),
            rows: data.into_iter().filter(|r| !r.is_blank()).collect(),
        }
    }
}

pub trait SheetStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn read(&self, path: &Path) -> Result<Table, LoadError>;
}

/// The three strategies in the order they are tried.
pub fn default_strategies(header_row: usize) -> Vec<Box<dyn SheetStrategy>> {
    vec![
        Box::new(FixedHeaderRow { header_row }),
        Box::new(DetectedHeaderRow {
            scan_rows: HEADER_SCAN_ROWS.max(header_row + 1),
        }),
        Box::new(RawCells),
    ]
}

#[derive(Debug, Clone)]
pub struct StrategyAttempt {
    pub strategy: &'static str,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct LoadedSheet {
    pub table: Table,
    pub columns: ColumnMap,
    pub strategy: &'static str,
    /// Strategies that were tried and rejected before `strategy` succeeded.
    pub attempts: Vec<StrategyAttempt>,
}

/// Reads `path` with each strategy in turn.
///
/// A strategy is rejected when it errors, yields no data rows, or yields a
/// header missing a canonical field. When every strategy fails and at least
/// one of them did read rows, the error is [`LoadError::MissingColumns`] for
/// the first such read, since that is the actionable problem.
pub fn load_sheet(
    path: &Path,
    strategies: &[Box<dyn SheetStrategy>],
) -> Result<LoadedSheet, LoadError> {
    let mut attempts = Vec::new();
    let mut first_missing: Option<LoadError> = None;

    for strategy in strategies {
        let outcome = strategy.read(path).and_then(|table| {
            if table.rows.is_empty() {
                return Err(LoadError::NoRows);
            }
            let columns = ColumnMap::from_headers(&table.headers);
            if !columns.is_complete() {
                return Err(LoadError::MissingColumns {
                    missing: columns.missing(),
                });
            }
            Ok((table, columns))
        });

        match outcome {
            Ok((table, columns)) => {
                return Ok(LoadedSheet {
                    table,
                    columns,
                    strategy: strategy.name(),
                    attempts,
                });
            }
            Err(err) => {
                tracing::debug!(
                    file = %path.display(),
                    strategy = strategy.name(),
                    error = %err,
                    "loader strategy rejected"
                );
                attempts.push(StrategyAttempt {
                    strategy: strategy.name(),
                    error: err.to_string(),
                });
                if first_missing.is_none() && matches!(err, LoadError::MissingColumns { .. }) {
                    first_missing = Some(err);
                }
            }
        }
    }

    Err(first_missing.unwrap_or_else(|| LoadError::AllStrategiesFailed {
        attempts: attempts
            .iter()
            .map(|a| format!("{}: {}", a.strategy, a.error))
            .collect(),
    }))
}

// ============ calamine strategies ============

/// OOXML reader with the header at a fixed zero-based row.
pub struct FixedHeaderRow {
    pub header_row: usize,
}

impl SheetStrategy for FixedHeaderRow {
    fn name(&self) -> &'static str {
        "fixed-header"
    }

    fn read(&self, path: &Path) -> Result<Table, LoadError> {
        let mut workbook: Xlsx<BufReader<std::fs::File>> =
            open_workbook(path).map_err(LoadError::unreadable)?;
        let rows = first_sheet_rows(&mut workbook)?;

        let header_pos = rows
            .iter()
            .position(|r| r.number == self.header_row + 1)
            .ok_or_else(|| {
                LoadError::Unsupported(format!(
                    "header row {} is outside the used range",
                    self.header_row + 1
                ))
            })?;
        let mut rows = rows;
        let data = rows.split_off(header_pos + 1);
        Ok(Table::from_rows(&rows[header_pos], data))
    }
}

/// Any calamine-supported format; the header is the first row that maps
/// every canonical field.
pub struct DetectedHeaderRow {
    pub scan_rows: usize,
}

impl SheetStrategy for DetectedHeaderRow {
    fn name(&self) -> &'static str {
        "detected-header"
    }

    fn read(&self, path: &Path) -> Result<Table, LoadError> {
        let mut workbook = open_workbook_auto(path).map_err(LoadError::unreadable)?;
        let mut rows = first_sheet_rows(&mut workbook)?;

        let header_pos = rows
            .iter()
            .take(self.scan_rows)
            .position(|r| {
                let texts: Vec<String> =
                    r.cells.iter().map(crate::sanitize::safe_string).collect();
                ColumnMap::from_headers(&texts).is_complete()
            })
            .ok_or(LoadError::HeaderNotFound(self.scan_rows))?;

        let data = rows.split_off(header_pos + 1);
        Ok(Table::from_rows(&rows[header_pos], data))
    }
}

fn first_sheet_rows<R: Reader<RS>, RS: std::io::Read + std::io::Seek>(
    workbook: &mut R,
) -> Result<Vec<Row>, LoadError>
where
    R::Error: std::fmt::Display,
{
    let name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| LoadError::Unsupported("workbook has no worksheets".to_string()))?;
    let range = workbook
        .worksheet_range(&name)
        .map_err(LoadError::unreadable)?;

    // Ranges start at the first used cell, not at A1.
    let (first_row, first_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    Ok(range
        .rows()
        .enumerate()
        .map(|(i, cells)| {
            let mut out = vec![CellValue::Empty; first_col];
            out.extend(cells.iter().map(from_calamine));
            Row {
                number: first_row + i + 1,
                cells: out,
            }
        })
        .collect())
}

fn from_calamine(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => CellValue::DateTime(naive),
            None => CellValue::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
    }
}

// ============ raw OOXML strategy ============

/// Reads the first worksheet's XML directly; the first non-empty row is
/// the header.
pub struct RawCells;

impl SheetStrategy for RawCells {
    fn name(&self) -> &'static str {
        "raw-cells"
    }

    fn read(&self, path: &Path) -> Result<Table, LoadError> {
        let bytes = std::fs::read(path).map_err(LoadError::unreadable)?;
        let mut rows = read_raw_rows(&bytes)?;
        let header_pos = rows
            .iter()
            .position(|r| !r.is_blank())
            .ok_or(LoadError::NoRows)?;
        let data = rows.split_off(header_pos + 1);
        Ok(Table::from_rows(&rows[header_pos], data))
    }
}

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

pub(crate) fn read_raw_rows(bytes: &[u8]) -> Result<Vec<Row>, LoadError> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(LoadError::unreadable)?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheet_name = first_worksheet_name(&archive)
        .ok_or_else(|| LoadError::Unsupported("no worksheet XML in archive".to_string()))?;
    let xml = read_zip_entry_bounded(&mut archive, &sheet_name, MAX_XML_ENTRY_BYTES)?;
    parse_sheet_xml(&xml, &shared_strings)
}

fn read_zip_entry_bounded(
    archive: &mut Archive<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, LoadError> {
    let entry = archive.by_name(name).map_err(LoadError::unreadable)?;
    let mut out = Vec::new();
    entry
        .take(max_bytes + 1)
        .read_to_end(&mut out)
        .map_err(LoadError::unreadable)?;
    if out.len() as u64 > max_bytes {
        return Err(LoadError::Unsupported(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn first_worksheet_name(archive: &Archive<'_>) -> Option<String> {
    archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .min_by_key(|name| {
            name.trim_start_matches("xl/worksheets/sheet")
                .trim_end_matches(".xml")
                .parse::<u32>()
                .unwrap_or(u32::MAX)
        })
        .map(|s| s.to_string())
}

/// Shared strings, one entry per `<si>` with rich-text runs concatenated.
/// Workbooks using only inline strings have no table at all.
fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, LoadError> {
    if archive.index_for_name("xl/sharedStrings.xml").is_none() {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;

    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = current.is_some(),
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(te.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => strings.push(current.take().unwrap_or_default()),
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(LoadError::unreadable(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

#[derive(Default)]
struct PendingCell {
    col: usize,
    kind: Vec<u8>,
    text: String,
    has_text: bool,
}

fn parse_sheet_xml(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Row>, LoadError> {
    let mut rows: BTreeMap<usize, Vec<CellValue>> = BTreeMap::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut row_number = 0usize;
    let mut next_col = 0usize;
    let mut cells: Vec<CellValue> = Vec::new();
    let mut cell: Option<PendingCell> = None;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    row_number = attr(&e, b"r")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(row_number + 1);
                    next_col = 0;
                    cells = Vec::new();
                }
                b"c" => {
                    let col = cell_column(&e, next_col)?;
                    cell = Some(PendingCell {
                        col,
                        kind: attr(&e, b"t").map(String::into_bytes).unwrap_or_default(),
                        ..Default::default()
                    });
                }
                b"v" | b"t" => in_text = cell.is_some(),
                _ => {}
            },
            Ok(quick_xml::events::Event::Empty(e)) => match e.local_name().as_ref() {
                b"c" => next_col = cell_column(&e, next_col)? + 1,
                b"row" => {
                    row_number = attr(&e, b"r")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(row_number + 1);
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_text => {
                if let Some(c) = cell.as_mut() {
                    c.text.push_str(te.unescape().unwrap_or_default().as_ref());
                    c.has_text = true;
                }
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_text = false,
                b"c" => {
                    if let Some(c) = cell.take() {
                        next_col = c.col + 1;
                        if c.has_text {
                            if cells.len() <= c.col {
                                cells.resize(c.col + 1, CellValue::Empty);
                            }
                            cells[c.col] = decode_cell(&c, shared_strings);
                        }
                    }
                }
                b"row" => {
                    rows.insert(row_number, std::mem::take(&mut cells));
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(LoadError::unreadable(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rows
        .into_iter()
        .map(|(number, cells)| Row { number, cells })
        .collect())
}

fn decode_cell(cell: &PendingCell, shared_strings: &[String]) -> CellValue {
    let text = cell.text.as_str();
    match cell.kind.as_slice() {
        b"s" => text
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared_strings.get(i))
            .map(|s| CellValue::Text(s.clone()))
            .unwrap_or(CellValue::Empty),
        b"inlineStr" | b"str" => CellValue::Text(text.to_string()),
        b"b" => CellValue::Bool(text.trim() == "1"),
        b"e" => CellValue::Error(text.to_string()),
        _ => {
            let t = text.trim();
            if let Ok(i) = t.parse::<i64>() {
                CellValue::Int(i)
            } else if let Ok(f) = t.parse::<f64>() {
                CellValue::Float(f)
            } else {
                CellValue::Text(text.to_string())
            }
        }
    }
}

fn attr(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Zero-based column of an A1-style reference: `"C7"` → `2`. `None` when
/// there are no letters or the column lies past `XFD`.
fn column_index(reference: &str) -> Option<usize> {
    let letters = reference.bytes().take_while(u8::is_ascii_alphabetic);
    let mut idx = 0usize;
    let mut seen = false;
    for b in letters {
        seen = true;
        idx = idx
            .checked_mul(26)?
            .checked_add((b.to_ascii_uppercase() - b'A' + 1) as usize)?;
        if idx > MAX_COLUMN + 1 {
            return None;
        }
    }
    if seen {
        Some(idx - 1)
    } else {
        None
    }
}

/// Column of a `<c>` element: its `r` reference when present, else the
/// position after the previous cell. A reference that cannot address a
/// worksheet column fails the file.
fn cell_column(
    e: &quick_xml::events::BytesStart<'_>,
    next_col: usize,
) -> Result<usize, LoadError> {
    let col = match attr(e, b"r") {
        Some(r) => column_index(&r).ok_or_else(|| {
            LoadError::Unsupported(format!("cell reference {} is out of range", r))
        })?,
        None => next_col,
    };
    if col > MAX_COLUMN {
        return Err(LoadError::Unsupported(format!(
            "cell column {} is past the last worksheet column",
            col + 1
        )));
    }
    Ok(col)
}
