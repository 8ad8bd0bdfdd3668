//! Disclosure file parsing.
//!
//! Turns the bytes of a published disclosure file (delimited text or an
//! XLSX workbook) into [`DisclosureRecord`]s. Headers are resolved through
//! [`ColumnMap`]; rows missing an employer or job title are skipped.

use crate::dataset::columns::{ColumnMap, Field};
use crate::error::LcaError;
use crate::models::{CaseStatus, DisclosureRecord, Period, WageUnit};
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;
use std::io::Read;
use tracing::{debug, warn};

/// Default cap on decompressed bytes read from a single workbook entry.
pub const MAX_XML_ENTRY_BYTES: u64 = 512 * 1024 * 1024;

/// Options controlling how much of a file is kept.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Stop after this many records.
    pub max_rows: Option<usize>,
    /// Workbook entries larger than this are rejected, never truncated.
    pub max_entry_bytes: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_rows: None,
            max_entry_bytes: MAX_XML_ENTRY_BYTES,
        }
    }
}

/// Source file layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Xlsx,
    Delimited(u8),
}

impl SourceFormat {
    /// Detect the format from file content.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"PK\x03\x04") {
            return SourceFormat::Xlsx;
        }
        let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or(&[]);
        let tabs = first_line.iter().filter(|b| **b == b'\t').count();
        let commas = first_line.iter().filter(|b| **b == b',').count();
        if tabs > commas {
            SourceFormat::Delimited(b'\t')
        } else {
            SourceFormat::Delimited(b',')
        }
    }

    /// File extension used when caching a file of this format.
    pub fn extension(&self) -> &'static str {
        match self {
            SourceFormat::Xlsx => "xlsx",
            SourceFormat::Delimited(b'\t') => "tsv",
            SourceFormat::Delimited(_) => "csv",
        }
    }
}

/// Output of a parse run.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    pub records: Vec<DisclosureRecord>,
    /// Canonical fields found in the file.
    pub mapped_fields: Vec<String>,
    /// Source headers that were dropped.
    pub dropped_columns: Vec<String>,
    /// Rows skipped as malformed.
    pub skipped_rows: usize,
}

/// Parse a disclosure file of any supported format.
pub fn parse_bytes(
    bytes: &[u8],
    period: Period,
    options: &ParseOptions,
) -> Result<ParsedTable, LcaError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(LcaError::parse("file is empty"));
    }

    let format = SourceFormat::detect(bytes);
    debug!("Parsing {} bytes as {:?}", bytes.len(), format);

    match format {
        SourceFormat::Xlsx => parse_xlsx(bytes, period, options),
        SourceFormat::Delimited(delimiter) => parse_delimited(bytes, delimiter, period, options),
    }
}

/// Read access to the cells of one source row.
trait Row {
    fn cell(&self, idx: usize) -> Option<Cow<'_, str>>;
}

impl Row for csv::ByteRecord {
    fn cell(&self, idx: usize) -> Option<Cow<'_, str>> {
        self.get(idx).map(String::from_utf8_lossy)
    }
}

impl Row for Vec<String> {
    fn cell(&self, idx: usize) -> Option<Cow<'_, str>> {
        self.get(idx).map(|s| Cow::Borrowed(s.as_str()))
    }
}

/// Accumulates records while enforcing the row limit.
struct TableBuilder<'a> {
    map: ColumnMap,
    period: Period,
    options: &'a ParseOptions,
    records: Vec<DisclosureRecord>,
    skipped: usize,
}

impl<'a> TableBuilder<'a> {
    fn new<S: AsRef<str>>(
        headers: &[S],
        period: Period,
        options: &'a ParseOptions,
    ) -> Result<Self, LcaError> {
        let map = ColumnMap::resolve(headers);

        let missing = map.missing_required();
        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(|f| f.to_string()).collect();
            return Err(LcaError::parse(format!(
                "unrecognized header row: no column for {}",
                names.join(", ")
            )));
        }

        if !map.dropped.is_empty() {
            debug!(
                "Dropping {} unmapped columns: {}",
                map.dropped.len(),
                map.dropped.join(", ")
            );
        }

        Ok(Self {
            map,
            period,
            options,
            records: Vec::new(),
            skipped: 0,
        })
    }

    fn is_full(&self) -> bool {
        self.options
            .max_rows
            .is_some_and(|max| self.records.len() >= max)
    }

    fn push<R: Row>(&mut self, row: &R) {
        match record_from_row(&self.map, row, self.period) {
            Some(record) => self.records.push(record),
            None => self.skipped += 1,
        }
    }

    fn skip(&mut self) {
        self.skipped += 1;
    }

    fn finish(self) -> ParsedTable {
        if self.skipped > 0 {
            warn!("Skipped {} malformed rows", self.skipped);
        }
        ParsedTable {
            mapped_fields: self.map.mapped_fields(),
            dropped_columns: self.map.dropped,
            records: self.records,
            skipped_rows: self.skipped,
        }
    }
}

fn text<R: Row>(map: &ColumnMap, row: &R, field: Field) -> String {
    map.index(field)
        .and_then(|idx| row.cell(idx))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn record_from_row<R: Row>(map: &ColumnMap, row: &R, period: Period) -> Option<DisclosureRecord> {
    let employer = text(map, row, Field::Employer);
    let job_title = text(map, row, Field::JobTitle);
    if employer.is_empty() || job_title.is_empty() {
        return None;
    }

    let contact = text(map, row, Field::Contact);

    Some(DisclosureRecord {
        employer,
        job_title,
        city: text(map, row, Field::City),
        state: text(map, row, Field::State),
        wage: parse_wage(&text(map, row, Field::Wage)),
        wage_unit: WageUnit::from(text(map, row, Field::WageUnit).as_str()),
        case_status: CaseStatus::from(text(map, row, Field::CaseStatus).as_str()),
        fiscal_year: period.year,
        fiscal_quarter: period.quarter,
        contact: if contact.is_empty() {
            None
        } else {
            Some(contact)
        },
    })
}

/// Coerce a published wage string to a number.
///
/// Currency symbols and thousands separators are ignored; for a range such
/// as `"95000 - 120000"` the lower bound is kept.
pub fn parse_wage(raw: &str) -> Option<f64> {
    let lower_bound = raw.split('-').next().unwrap_or("");
    let cleaned: String = lower_bound
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|w| w.is_finite() && *w >= 0.0)
}

fn parse_delimited(
    bytes: &[u8],
    delimiter: u8,
    period: Period,
    options: &ParseOptions,
) -> Result<ParsedTable, LcaError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .byte_headers()
        .map_err(|e| LcaError::parse(format!("unreadable header row: {}", e)))?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();

    let mut builder = TableBuilder::new(&headers, period, options)?;

    for result in reader.byte_records() {
        if builder.is_full() {
            break;
        }
        match result {
            Ok(record) => builder.push(&record),
            Err(e) => {
                debug!("Skipping malformed row: {}", e);
                builder.skip();
            }
        }
    }

    Ok(builder.finish())
}

fn parse_xlsx(
    bytes: &[u8],
    period: Period,
    options: &ParseOptions,
) -> Result<ParsedTable, LcaError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| LcaError::parse(format!("invalid workbook: {}", e)))?;

    let shared_strings = read_shared_strings(&mut archive, options.max_entry_bytes)?;
    let sheet = first_worksheet_name(&archive)
        .ok_or_else(|| LcaError::parse("workbook has no worksheets"))?;
    let sheet_xml = read_zip_entry_bounded(&mut archive, &sheet, options.max_entry_bytes)?;

    // One extra row for the header.
    let row_limit = options.max_rows.map(|max| max.saturating_add(1));
    let mut rows = read_sheet_rows(&sheet_xml, &shared_strings, row_limit)?.into_iter();

    let headers = rows
        .next()
        .ok_or_else(|| LcaError::parse("worksheet is empty"))?;

    let mut builder = TableBuilder::new(&headers, period, options)?;
    for row in rows {
        if builder.is_full() {
            break;
        }
        builder.push(&row);
    }

    Ok(builder.finish())
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, LcaError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| LcaError::parse(format!("{}: {}", name, e)))?;
    let mut buf = Vec::new();
    entry
        .take(max_bytes.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|e| LcaError::parse(format!("{}: {}", name, e)))?;
    if buf.len() as u64 > max_bytes {
        return Err(LcaError::parse(format!(
            "{} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(buf)
}

fn first_worksheet_name(archive: &zip::ZipArchive<std::io::Cursor<&[u8]>>) -> Option<String> {
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

fn read_shared_strings(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    max_bytes: u64,
) -> Result<Vec<String>, LcaError> {
    if archive.index_for_name("xl/sharedStrings.xml").is_none() {
        return Ok(Vec::new());
    }

    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", max_bytes)?;
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_t = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                let value = te
                    .unescape()
                    .map_err(|e| LcaError::parse(format!("sharedStrings.xml: {}", e)))?;
                current.push_str(&value);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => strings.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(LcaError::parse(format!("sharedStrings.xml: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// How a cell's `<v>` content is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    SharedString,
    Literal,
}

/// Zero-based column index from a cell reference such as `AB12`.
fn column_index(reference: &[u8]) -> Option<usize> {
    let letters: Vec<u8> = reference
        .iter()
        .take_while(|b| b.is_ascii_alphabetic())
        .map(|b| b.to_ascii_uppercase())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let one_based = letters
        .iter()
        .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize);
    Some(one_based - 1)
}

fn cell_attributes(e: &BytesStart<'_>) -> (Option<usize>, CellKind) {
    let mut column = None;
    let mut kind = CellKind::Literal;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"r" => column = column_index(&attr.value),
            b"t" if attr.value.as_ref() == b"s" => kind = CellKind::SharedString,
            _ => {}
        }
    }
    (column, kind)
}

fn read_sheet_rows(
    xml: &[u8],
    shared_strings: &[String],
    max_rows: Option<usize>,
) -> Result<Vec<Vec<String>>, LcaError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut next_column = 0usize;
    let mut column = 0usize;
    let mut kind = CellKind::Literal;
    let mut value = String::new();
    let mut in_value = false;
    // Set once the sheet data is read to its end or the row limit is hit.
    let mut complete = false;

    loop {
        if max_rows.is_some_and(|max| rows.len() >= max) {
            complete = true;
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    row.clear();
                    next_column = 0;
                }
                b"c" => {
                    let (col, k) = cell_attributes(&e);
                    column = col.unwrap_or(next_column);
                    kind = k;
                    value.clear();
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheetData" => {
                complete = true;
                break;
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"c" => {
                let (col, _) = cell_attributes(&e);
                next_column = col.unwrap_or(next_column) + 1;
            }
            Ok(Event::Text(te)) if in_value => {
                let text = te
                    .unescape()
                    .map_err(|e| LcaError::parse(format!("worksheet: {}", e)))?;
                value.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    let resolved = match kind {
                        CellKind::SharedString => value
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared_strings.get(i).cloned())
                            .unwrap_or_default(),
                        CellKind::Literal => std::mem::take(&mut value),
                    };
                    if row.len() <= column {
                        row.resize(column + 1, String::new());
                    }
                    row[column] = resolved;
                    next_column = column + 1;
                }
                b"row" => rows.push(std::mem::take(&mut row)),
                b"sheetData" => {
                    complete = true;
                    break;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(LcaError::parse(format!("worksheet: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    if !complete {
        return Err(LcaError::parse(
            "worksheet is truncated: sheet data never closes",
        ));
    }

    Ok(rows)
}
