//! `sheetkit_io_xlsx` v1:
//! Record-oriented XLSX writer and streaming reader.
//!
//! Modules:
//! - `conf`   : constants, sheet limits and default presets
//! - `spec`   : cell values, schemas and options
//! - `error`  : error taxonomy
//! - `record` : record introspection capability and cell conversions
//! - `util`   : pure helper functions
//! - `writer` : stateful workbook writer
//! - `reader` : streaming workbook reader
pub mod conf;
pub mod error;
pub mod reader;
pub mod record;
pub mod spec;
pub mod util;
pub mod writer;

pub use conf::{
    C_SHEET_NAME_DEFAULT, EnumExcelType, N_LEN_EXCEL_CELL_TEXT_MAX, N_LEN_EXCEL_SHEET_NAME_MAX,
    N_NCOLS_XLS_MAX, N_NCOLS_XLSX_MAX, N_NROWS_XLS_MAX, N_NROWS_XLSX_MAX, TUP_EXCEL_ILLEGAL,
};
pub use error::{ExcelError, Result};
pub use reader::{XlsxRecordIter, XlsxRowIter, XlsxStreamReader, read_all_from_path};
pub use record::{ExcelRecord, FromCellValue, IntoCellValue};
pub use spec::{
    EnumCellValue, EnumWriterState, SpecCellFormat, SpecExcelField, SpecFieldMeta,
    SpecFieldSpec, SpecRawRow, SpecSchema, SpecSheetLimits, SpecXlsxWriteOptions,
};
pub use util::{
    decode_ooxml_escapes, derive_col_letters, parse_cell_ref_col, project_map, project_record,
    resolve_schema, sanitize_sheet_name,
};
pub use writer::{XlsxWriter, write_records_to_path};
