//! Streaming XLSX reader.
//!
//! Worksheet XML is scanned with a pull parser straight out of the zip
//! entry, so only the current row (plus the header lookup when reading
//! records) is held in memory. The shared-string table is loaded up front
//! because cell text refers to it by index.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek};
use std::marker::PhantomData;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::conf::{
    C_PART_SHARED_STRINGS, C_PART_WORKBOOK, C_PART_WORKBOOK_RELS, C_PART_WORKSHEET_FALLBACK,
    C_SHEET_NAME_DEFAULT,
};
use crate::error::{ExcelError, Result};
use crate::record::ExcelRecord;
use crate::spec::{EnumCellValue, SpecRawRow, SpecSchema};
use crate::util::{
    decode_ooxml_escapes, derive_col_letters, parse_cell_ref_col, resolve_schema,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct SheetEntry {
    name: String,
    part: String,
}

/// Reader session over one XLSX package.
pub struct XlsxStreamReader<R: Read + Seek> {
    archive: ZipArchive<R>,
    l_sheets: Vec<SheetEntry>,
    l_shared_strings: Vec<String>,
    n_idx_sheet: usize,
}

impl XlsxStreamReader<BufReader<File>> {
    /// Open the workbook file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> XlsxStreamReader<R> {
    /// Open a workbook from any seekable byte source.
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let l_sheets = read_sheet_entries(&mut archive)?;
        let l_shared_strings = read_shared_strings(&mut archive)?;

        log::debug!(
            "xlsx reader opened: sheets={} shared_strings={}",
            l_sheets.len(),
            l_shared_strings.len()
        );
        Ok(Self {
            archive,
            l_sheets,
            l_shared_strings,
            n_idx_sheet: 0,
        })
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.l_sheets.iter().map(|sheet| sheet.name.clone()).collect()
    }

    /// Select the sheet read by [`Self::rows`] and [`Self::records`].
    pub fn select_sheet(&mut self, name: &str) -> Result<()> {
        let n_idx = self
            .l_sheets
            .iter()
            .position(|sheet| sheet.name == name)
            .ok_or_else(|| ExcelError::SheetNotFound(name.to_string()))?;
        self.n_idx_sheet = n_idx;
        Ok(())
    }

    /// Stream the raw rows of the selected sheet.
    pub fn rows(&mut self) -> Result<XlsxRowIter<'_, impl BufRead + '_>> {
        let c_part = self
            .l_sheets
            .get(self.n_idx_sheet)
            .map_or(C_PART_WORKSHEET_FALLBACK, |sheet| sheet.part.as_str());

        let file = match self.archive.by_name(c_part) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => {
                return Err(ExcelError::CorruptDocument(format!(
                    "missing worksheet part: {c_part}"
                )));
            }
            Err(err) => return Err(err.into()),
        };
        Ok(XlsxRowIter::new(
            BufReader::new(file),
            &self.l_shared_strings,
        ))
    }

    /// Stream the selected sheet as records of type `T`.
    ///
    /// The first row is the header; its texts are matched against `T`'s
    /// display names (then internal names). Every later row yields one record.
    pub fn records<T: ExcelRecord>(
        &mut self,
    ) -> Result<XlsxRecordIter<'_, T, impl BufRead + '_>> {
        let schema = resolve_schema::<T>()?;
        let rows = self.rows()?;
        Ok(XlsxRecordIter {
            rows,
            schema,
            l_field_by_col: None,
            _marker: PhantomData,
        })
    }

    /// Read every record of the selected sheet.
    pub fn read_all<T: ExcelRecord>(&mut self) -> Result<Vec<T>> {
        self.records::<T>()?.collect()
    }
}

/// Read every record of the first sheet of the workbook at `path`.
pub fn read_all_from_path<T: ExcelRecord>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    XlsxStreamReader::open(path)?.read_all::<T>()
}

////////////////////////////////////////////////////////////////////////////////
// #region RowIterator

#[derive(Debug, Default)]
struct CellState {
    col_idx: usize,
    c_type: Option<String>,
    text: String,
    if_has_text: bool,
    if_in_v: bool,
    if_in_t: bool,
    n_depth_phonetic: usize,
}

/// Lazy one-shot iterator over worksheet rows.
pub struct XlsxRowIter<'a, S: BufRead> {
    reader: Reader<S>,
    buf: Vec<u8>,
    l_shared_strings: &'a [String],
    n_row_next: usize,
    if_finished: bool,
}

impl<'a, S: BufRead> XlsxRowIter<'a, S> {
    fn new(source: S, l_shared_strings: &'a [String]) -> Self {
        Self {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            l_shared_strings,
            n_row_next: 0,
            if_finished: false,
        }
    }

    fn read_next_row(&mut self) -> Result<Option<SpecRawRow>> {
        let l_shared_strings = self.l_shared_strings;
        let mut row: Option<SpecRawRow> = None;
        let mut cell: Option<CellState> = None;

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) if e.local_name().as_ref() == b"row" => {
                    row = Some(SpecRawRow {
                        row_idx: parse_row_idx(&e, self.n_row_next)?,
                        cells: vec![],
                    });
                }
                Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                    let n_row_idx = parse_row_idx(&e, self.n_row_next)?;
                    self.n_row_next = n_row_idx + 1;
                    return Ok(Some(SpecRawRow {
                        row_idx: n_row_idx,
                        cells: vec![],
                    }));
                }
                Event::End(e) if e.local_name().as_ref() == b"row" => {
                    if let Some(row_done) = row.take() {
                        self.n_row_next = row_done.row_idx + 1;
                        return Ok(Some(row_done));
                    }
                }
                Event::Start(e) if e.local_name().as_ref() == b"c" => {
                    if let Some(row_open) = &row {
                        cell = Some(parse_cell_start(&e, row_open.cells.len())?);
                    }
                }
                Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                    if let Some(row_open) = row.as_mut() {
                        let state = parse_cell_start(&e, row_open.cells.len())?;
                        place_cell(row_open, state.col_idx, EnumCellValue::None);
                    }
                }
                Event::Start(e) if cell.is_some() => {
                    if let Some(state) = cell.as_mut() {
                        match e.local_name().as_ref() {
                            b"v" => state.if_in_v = true,
                            b"t" => state.if_in_t = true,
                            b"rPh" => state.n_depth_phonetic += 1,
                            _ => {}
                        }
                    }
                }
                Event::End(e) if cell.is_some() => {
                    match e.local_name().as_ref() {
                        b"c" => {
                            if let (Some(state), Some(row_open)) = (cell.take(), row.as_mut()) {
                                let value = decode_cell_value(&state, l_shared_strings, row_open.row_idx);
                                place_cell(row_open, state.col_idx, value);
                            }
                        }
                        b"v" => {
                            if let Some(state) = cell.as_mut() {
                                state.if_in_v = false;
                            }
                        }
                        b"t" => {
                            if let Some(state) = cell.as_mut() {
                                state.if_in_t = false;
                            }
                        }
                        b"rPh" => {
                            if let Some(state) = cell.as_mut() {
                                state.n_depth_phonetic = state.n_depth_phonetic.saturating_sub(1);
                            }
                        }
                        _ => {}
                    }
                }
                Event::Text(e) => {
                    if let Some(state) = cell.as_mut()
                        && (state.if_in_v || state.if_in_t)
                        && state.n_depth_phonetic == 0
                    {
                        state.text.push_str(&e.unescape()?);
                        state.if_has_text = true;
                    }
                }
                Event::Eof => {
                    if row.is_some() {
                        return Err(ExcelError::CorruptDocument(
                            "worksheet ended inside a row".to_string(),
                        ));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl<S: BufRead> Iterator for XlsxRowIter<'_, S> {
    type Item = Result<SpecRawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.if_finished {
            return None;
        }
        match self.read_next_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.if_finished = true;
                None
            }
            Err(err) => {
                self.if_finished = true;
                Some(Err(err))
            }
        }
    }
}

fn parse_row_idx(e: &BytesStart<'_>, n_row_default: usize) -> Result<usize> {
    let Some(c_row) = derive_attr_value(e, b"r")? else {
        return Ok(n_row_default);
    };
    match c_row.trim().parse::<usize>() {
        Ok(n_row) if n_row >= 1 => Ok(n_row - 1),
        _ => Err(ExcelError::CorruptDocument(format!(
            "invalid row number: {c_row:?}"
        ))),
    }
}

fn parse_cell_start(e: &BytesStart<'_>, n_col_default: usize) -> Result<CellState> {
    let mut state = CellState {
        col_idx: n_col_default,
        ..Default::default()
    };
    for attr in e.attributes() {
        let attr = attr?;
        match attr.key.as_ref() {
            b"r" => {
                let c_ref = attr.unescape_value()?;
                state.col_idx = parse_cell_ref_col(&c_ref).ok_or_else(|| {
                    ExcelError::CorruptDocument(format!("invalid cell reference: {c_ref:?}"))
                })?;
            }
            b"t" => state.c_type = Some(attr.unescape_value()?.into_owned()),
            _ => {}
        }
    }
    Ok(state)
}

fn place_cell(row: &mut SpecRawRow, col_idx: usize, value: EnumCellValue) {
    if col_idx >= row.cells.len() {
        row.cells.resize(col_idx + 1, EnumCellValue::None);
    }
    row.cells[col_idx] = value;
}

/// Decode one cell; an undecodable value is logged and left blank.
fn decode_cell_value(
    state: &CellState,
    l_shared_strings: &[String],
    row_idx: usize,
) -> EnumCellValue {
    if !state.if_has_text {
        return EnumCellValue::None;
    }
    let c_text = state.text.as_str();
    let c_cell = || format!("{}{}", derive_col_letters(state.col_idx), row_idx + 1);

    match state.c_type.as_deref() {
        Some("s") => match c_text.trim().parse::<usize>() {
            Ok(n_idx) if n_idx < l_shared_strings.len() => {
                EnumCellValue::String(l_shared_strings[n_idx].clone())
            }
            _ => {
                log::debug!("skipped cell {}: bad shared string index {c_text:?}", c_cell());
                EnumCellValue::None
            }
        },
        Some("b") => match c_text.trim() {
            "1" | "true" => EnumCellValue::Bool(true),
            "0" | "false" => EnumCellValue::Bool(false),
            _ => {
                log::debug!("skipped cell {}: bad boolean {c_text:?}", c_cell());
                EnumCellValue::None
            }
        },
        Some("str") | Some("inlineStr") => EnumCellValue::String(decode_ooxml_escapes(c_text)),
        Some("e") | Some("d") => EnumCellValue::String(c_text.to_string()),
        _ => match c_text.trim().parse::<f64>() {
            Ok(n_value) => EnumCellValue::Number(n_value),
            Err(_) => {
                log::debug!("skipped cell {}: bad number {c_text:?}", c_cell());
                EnumCellValue::None
            }
        },
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RecordIterator

/// Lazy one-shot iterator that rebuilds records from worksheet rows.
pub struct XlsxRecordIter<'a, T, S: BufRead> {
    rows: XlsxRowIter<'a, S>,
    schema: SpecSchema,
    l_field_by_col: Option<Vec<Option<usize>>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S: BufRead> XlsxRecordIter<'_, T, S> {
    /// Schema of the target record type.
    pub fn schema(&self) -> &SpecSchema {
        &self.schema
    }
}

impl<T: ExcelRecord, S: BufRead> Iterator for XlsxRecordIter<'_, T, S> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = match self.rows.next()? {
                Ok(row) => row,
                Err(err) => return Some(Err(err)),
            };
            if self.l_field_by_col.is_none() {
                self.l_field_by_col = Some(derive_header_lookup(&row, &self.schema));
                continue;
            }
            let l_field_by_col = self.l_field_by_col.as_deref().unwrap_or(&[]);
            return Some(Ok(build_record::<T>(&row, l_field_by_col, &self.schema)));
        }
    }
}

/// Map each header column to the index of its schema field.
fn derive_header_lookup(header: &SpecRawRow, schema: &SpecSchema) -> Vec<Option<usize>> {
    let l_field_by_col: Vec<Option<usize>> = header
        .cells
        .iter()
        .map(|cell| {
            let c_header = cell.to_text();
            let c_header = c_header.trim();
            if c_header.is_empty() {
                return None;
            }
            let n_idx_field = schema
                .find_by_header(c_header)
                .and_then(|field| {
                    schema
                        .fields
                        .iter()
                        .position(|x| x.internal_name == field.internal_name)
                });
            if n_idx_field.is_none() {
                log::debug!("ignored header column {c_header:?}: no matching field");
            }
            n_idx_field
        })
        .collect();

    if l_field_by_col.iter().all(Option::is_none) {
        log::warn!(
            "header row {} matches no field of `{}`",
            header.row_idx + 1,
            schema.record_type
        );
    }
    l_field_by_col
}

fn build_record<T: ExcelRecord>(
    row: &SpecRawRow,
    l_field_by_col: &[Option<usize>],
    schema: &SpecSchema,
) -> T {
    let mut record = T::default();
    for (n_idx_col, cell) in row.cells.iter().enumerate() {
        let Some(Some(n_idx_field)) = l_field_by_col.get(n_idx_col) else {
            continue;
        };
        if cell.is_blank() {
            continue;
        }
        let c_field = &schema.fields[*n_idx_field].internal_name;
        if let Err(err) = record.set_field(c_field, cell) {
            log::debug!(
                "skipped cell {}{} for field `{c_field}`: {err}",
                derive_col_letters(n_idx_col),
                row.row_idx + 1
            );
        }
    }
    record
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PackageParts

fn read_zip_part_optional<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf).map_err(|err| {
                ExcelError::CorruptDocument(format!("failed to read {name}: {err}"))
            })?;
            Ok(Some(buf))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn derive_attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn resolve_rel_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{target}"),
    }
}

fn read_sheet_entries<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<SheetEntry>> {
    let entry_fallback = SheetEntry {
        name: C_SHEET_NAME_DEFAULT.to_string(),
        part: C_PART_WORKSHEET_FALLBACK.to_string(),
    };
    let Some(v_workbook) = read_zip_part_optional(archive, C_PART_WORKBOOK)? else {
        return Ok(vec![entry_fallback]);
    };
    let dict_targets = match read_zip_part_optional(archive, C_PART_WORKBOOK_RELS)? {
        Some(v_rels) => parse_relationship_targets(&v_rels)?,
        None => HashMap::new(),
    };

    let mut reader = Reader::from_reader(v_workbook.as_slice());
    let mut buf = Vec::new();
    let mut l_sheets = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let mut c_name = None;
                let mut c_rel_id = None;
                for attr in e.attributes() {
                    let attr = attr?;
                    match attr.key.local_name().as_ref() {
                        b"name" => c_name = Some(attr.unescape_value()?.into_owned()),
                        b"id" => c_rel_id = Some(attr.unescape_value()?.into_owned()),
                        _ => {}
                    }
                }
                let n_position = l_sheets.len() + 1;
                let part = c_rel_id
                    .and_then(|rel_id| dict_targets.get(&rel_id).cloned())
                    .unwrap_or_else(|| format!("xl/worksheets/sheet{n_position}.xml"));
                l_sheets.push(SheetEntry {
                    name: c_name.unwrap_or_else(|| format!("Sheet{n_position}")),
                    part,
                });
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if l_sheets.is_empty() {
        l_sheets.push(entry_fallback);
    }
    Ok(l_sheets)
}

fn parse_relationship_targets(xml: &[u8]) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut dict_targets = HashMap::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let c_id = derive_attr_value(&e, b"Id")?;
                let c_target = derive_attr_value(&e, b"Target")?;
                if let (Some(c_id), Some(c_target)) = (c_id, c_target) {
                    dict_targets.insert(c_id, resolve_rel_target(&c_target));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(dict_targets)
}

fn read_shared_strings<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
    let file = match archive.by_name(C_PART_SHARED_STRINGS) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(vec![]),
        Err(err) => return Err(err.into()),
    };

    let mut reader = Reader::from_reader(BufReader::new(file));
    let mut buf = Vec::new();
    let mut l_strings = Vec::new();
    let mut c_current: Option<String> = None;
    let mut if_in_t = false;
    let mut n_depth_phonetic = 0usize;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => c_current = Some(String::new()),
                b"t" => if_in_t = true,
                b"rPh" => n_depth_phonetic += 1,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => l_strings.push(String::new()),
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => {
                    if let Some(c_done) = c_current.take() {
                        l_strings.push(decode_ooxml_escapes(&c_done));
                    }
                }
                b"t" => if_in_t = false,
                b"rPh" => n_depth_phonetic = n_depth_phonetic.saturating_sub(1),
                _ => {}
            },
            Event::Text(e) if if_in_t && n_depth_phonetic == 0 => {
                if let Some(c_open) = c_current.as_mut() {
                    c_open.push_str(&e.unescape()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(l_strings)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
