//! Error taxonomy shared by the writer and the streaming reader.

use quick_xml::events::attributes::AttrError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExcelError>;

#[derive(Debug, Error)]
pub enum ExcelError {
    #[error("no exported fields found on record type `{record_type}`")]
    SchemaEmpty { record_type: String },
    #[error("record type `{record_type}` declares no fields")]
    InvalidRecordType { record_type: String },
    #[error("row limit exceeded: {rows} rows requested, sheet allows {limit}")]
    RowLimitExceeded { rows: usize, limit: usize },
    #[error("column limit exceeded: {cols} columns requested, sheet allows {limit}")]
    ColumnLimitExceeded { cols: usize, limit: usize },
    #[error("excel writer has been closed")]
    ClosedSession,
    #[error("flush failed: {0}")]
    FlushIo(#[source] std::io::Error),
    #[error("corrupt document: {0}")]
    CorruptDocument(String),
    #[error("worksheet not found: {0}")]
    SheetNotFound(String),
    #[error("cell text too long at row {row}, column {col}: {len} characters")]
    CellTextTooLong { row: usize, col: usize, len: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

impl From<zip::result::ZipError> for ExcelError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::CorruptDocument(format!("zip error: {err}"))
    }
}

impl From<quick_xml::Error> for ExcelError {
    fn from(err: quick_xml::Error) -> Self {
        Self::CorruptDocument(format!("xml error: {err}"))
    }
}

impl From<AttrError> for ExcelError {
    fn from(err: AttrError) -> Self {
        Self::CorruptDocument(format!("xml attribute error: {err}"))
    }
}

impl From<std::str::Utf8Error> for ExcelError {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::CorruptDocument(format!("utf-8 error: {err}"))
    }
}
