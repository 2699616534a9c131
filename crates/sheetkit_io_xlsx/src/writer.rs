//! XLSX writer kernel that turns record batches into ordered worksheet rows.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};

use crate::conf::N_LEN_EXCEL_CELL_TEXT_MAX;
use crate::error::{ExcelError, Result};
use crate::record::ExcelRecord;
use crate::spec::{
    EnumCellValue, EnumWriterState, SpecCellFormat, SpecSchema, SpecSheetLimits,
    SpecXlsxWriteOptions,
};
use crate::util::{project_map, project_record, resolve_schema, sanitize_sheet_name};

/// Stateful single-sheet workbook writer.
///
/// The first non-empty batch fixes the schema and emits the header row; every
/// later row lands strictly below the previous one. The workbook is buffered
/// in memory until [`Self::flush`] or [`Self::save`].
pub struct XlsxWriter {
    workbook: Option<Workbook>,
    n_idx_sheet: usize,
    sheet_name: String,
    fmt_header: Format,
    fmt_body: Format,
    limits: SpecSheetLimits,
    schema: Option<SpecSchema>,
    n_row_cursor: usize,
    state: EnumWriterState,
}

impl XlsxWriter {
    /// Create a writer with one empty worksheet.
    pub fn new(options: SpecXlsxWriteOptions) -> Result<Self> {
        let sheet_name = sanitize_sheet_name(&options.sheet_name, "_");
        let mut workbook = Workbook::new();
        workbook.add_worksheet().set_name(&sheet_name)?;

        log::debug!(
            "xlsx writer opened: sheet={sheet_name:?} type={:?}",
            options.excel_type
        );
        Ok(Self {
            workbook: Some(workbook),
            n_idx_sheet: 0,
            sheet_name,
            fmt_header: derive_rust_xlsx_format(&options.fmt_header),
            fmt_body: derive_rust_xlsx_format(&options.fmt_body),
            limits: options.limits(),
            schema: None,
            n_row_cursor: 0,
            state: EnumWriterState::Open,
        })
    }

    /// Create a writer with default options; `None` or a blank name selects
    /// the default sheet name.
    pub fn open(sheet_name: Option<&str>) -> Result<Self> {
        let mut options = SpecXlsxWriteOptions::default();
        if let Some(val) = sheet_name {
            options.sheet_name = val.to_string();
        }
        Self::new(options)
    }

    /// Sanitized name of the target sheet.
    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Next physical row index to be written.
    pub fn row_cursor(&self) -> usize {
        self.n_row_cursor
    }

    /// Schema fixed by the first non-empty batch.
    pub fn schema(&self) -> Option<&SpecSchema> {
        self.schema.as_ref()
    }

    /// Row/column limits enforced by this session.
    pub fn limits(&self) -> SpecSheetLimits {
        self.limits
    }

    /// Whether [`Self::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.state == EnumWriterState::Closed
    }

    /// Append `records` below the rows already written.
    ///
    /// Fails without writing anything when the batch would overflow the sheet
    /// limits or when the record type has no exported fields.
    pub fn write<T: ExcelRecord>(&mut self, records: &[T]) -> Result<()> {
        self.write_projected::<T, _>(records.len(), |schema| {
            records
                .iter()
                .map(|record| project_record(record, schema))
                .collect()
        })
    }

    /// Append string-keyed maps, using `T`'s schema to select and order the
    /// columns. Missing keys produce blank cells.
    pub fn write_maps<T: ExcelRecord>(
        &mut self,
        maps: &[HashMap<String, EnumCellValue>],
    ) -> Result<()> {
        self.write_projected::<T, _>(maps.len(), |schema| {
            maps.iter().map(|map| project_map(map, schema)).collect()
        })
    }

    /// Serialize the workbook into `sink`. The session stays open.
    pub fn flush<W: Write>(&mut self, sink: &mut W) -> Result<()> {
        self.ensure_open()?;
        let workbook = self.workbook.as_mut().ok_or(ExcelError::ClosedSession)?;

        let v_bytes = workbook
            .save_to_buffer()
            .map_err(|err| ExcelError::FlushIo(std::io::Error::other(err.to_string())))?;
        sink.write_all(&v_bytes).map_err(ExcelError::FlushIo)?;
        sink.flush().map_err(ExcelError::FlushIo)?;

        log::debug!(
            "xlsx writer flushed: sheet={:?} rows={} bytes={}",
            self.sheet_name,
            self.n_row_cursor,
            v_bytes.len()
        );
        Ok(())
    }

    /// Serialize the workbook into a new file at `path`.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.ensure_open()?;
        let file = File::create(path.as_ref()).map_err(ExcelError::FlushIo)?;
        let mut writer = BufWriter::new(file);
        self.flush(&mut writer)
    }

    /// Release the workbook and end the session. Idempotent.
    pub fn close(&mut self) {
        if self.state == EnumWriterState::Closed {
            return;
        }
        self.schema = None;
        self.workbook = None;
        self.state = EnumWriterState::Closed;
        log::debug!(
            "xlsx writer closed: sheet={:?} rows={}",
            self.sheet_name,
            self.n_row_cursor
        );
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            EnumWriterState::Open => Ok(()),
            EnumWriterState::Closed => Err(ExcelError::ClosedSession),
        }
    }

    fn write_projected<T, F>(&mut self, n_rows_batch: usize, project: F) -> Result<()>
    where
        T: ExcelRecord,
        F: FnOnce(&SpecSchema) -> Vec<Vec<EnumCellValue>>,
    {
        self.ensure_open()?;
        if n_rows_batch == 0 {
            return Ok(());
        }

        let if_needs_header = self.schema.is_none();
        let n_rows_total = self.n_row_cursor + n_rows_batch + usize::from(if_needs_header);
        if n_rows_total > self.limits.nrows_max {
            return Err(ExcelError::RowLimitExceeded {
                rows: n_rows_total,
                limit: self.limits.nrows_max,
            });
        }

        let schema = match &self.schema {
            Some(schema) => schema.clone(),
            None => {
                let schema = resolve_schema::<T>()?;
                if schema.len() > self.limits.ncols_max {
                    return Err(ExcelError::ColumnLimitExceeded {
                        cols: schema.len(),
                        limit: self.limits.ncols_max,
                    });
                }
                schema
            }
        };

        let l_header: Vec<EnumCellValue> = if if_needs_header {
            schema
                .display_names()
                .into_iter()
                .map(EnumCellValue::String)
                .collect()
        } else {
            vec![]
        };
        let l_rows = project(&schema);

        let n_row_first_data = self.n_row_cursor + usize::from(if_needs_header);
        validate_cell_texts(&l_header, self.n_row_cursor)?;
        for (n_offset, row) in l_rows.iter().enumerate() {
            validate_cell_texts(row, n_row_first_data + n_offset)?;
        }

        if if_needs_header {
            self.write_row(&l_header, true)?;
            log::debug!(
                "xlsx writer header derived: type={} cols={}",
                schema.record_type,
                schema.len()
            );
            self.schema = Some(schema);
        }
        for row in &l_rows {
            self.write_row(row, false)?;
        }
        Ok(())
    }

    /// Write one row of values at the cursor and advance it.
    fn write_row(&mut self, values: &[EnumCellValue], if_header: bool) -> Result<()> {
        let format = if if_header {
            &self.fmt_header
        } else {
            &self.fmt_body
        };
        let worksheet = self
            .workbook
            .as_mut()
            .ok_or(ExcelError::ClosedSession)?
            .worksheet_from_index(self.n_idx_sheet)?;

        for (n_idx_col, value) in values.iter().enumerate() {
            write_cell_with_format(worksheet, self.n_row_cursor, n_idx_col, value, format)?;
        }
        self.n_row_cursor += 1;
        Ok(())
    }
}

/// Write `records` into a new workbook at `path` in one call.
pub fn write_records_to_path<T: ExcelRecord>(
    records: &[T],
    path: impl AsRef<Path>,
    options: SpecXlsxWriteOptions,
) -> Result<()> {
    let mut writer = XlsxWriter::new(options)?;
    writer.write(records)?;
    writer.save(path)?;
    writer.close();
    Ok(())
}

fn validate_cell_texts(values: &[EnumCellValue], row_idx: usize) -> Result<()> {
    for (n_idx_col, value) in values.iter().enumerate() {
        if let EnumCellValue::String(s) = value {
            let n_len = s.chars().count();
            if n_len > N_LEN_EXCEL_CELL_TEXT_MAX {
                return Err(ExcelError::CellTextTooLong {
                    row: row_idx,
                    col: n_idx_col,
                    len: n_len,
                });
            }
        }
    }
    Ok(())
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row_idx: usize,
    col_idx: usize,
    value: &EnumCellValue,
    format: &Format,
) -> Result<()> {
    let n_row = cast_row_num(row_idx)?;
    let n_col = cast_col_num(col_idx)?;
    match value {
        EnumCellValue::None => {
            worksheet.write_blank(n_row, n_col, format)?;
        }
        EnumCellValue::String(val) => {
            worksheet.write_string_with_format(n_row, n_col, val, format)?;
        }
        EnumCellValue::Number(val) => {
            worksheet.write_number_with_format(n_row, n_col, *val, format)?;
        }
        EnumCellValue::Bool(val) => {
            worksheet.write_boolean_with_format(n_row, n_col, *val, format)?;
        }
    }
    Ok(())
}

fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val as f64);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }
    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

fn cast_row_num(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| ExcelError::RowLimitExceeded {
        rows: value,
        limit: u32::MAX as usize,
    })
}

fn cast_col_num(value: usize) -> Result<u16> {
    u16::try_from(value).map_err(|_| ExcelError::ColumnLimitExceeded {
        cols: value,
        limit: u16::MAX as usize,
    })
}
