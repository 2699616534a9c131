//! Workbook constants, format variants and default preset factories.

use crate::spec::{SpecCellFormat, SpecSheetLimits, SpecXlsxWriteOptions};

/// Excel 2007+ worksheet maximum row count.
pub const N_NROWS_XLSX_MAX: usize = 1_048_576;
/// Excel 2007+ worksheet maximum column count.
pub const N_NCOLS_XLSX_MAX: usize = 16_384;
/// Excel 97-2003 worksheet maximum row count.
pub const N_NROWS_XLS_MAX: usize = 65_536;
/// Excel 97-2003 worksheet maximum column count.
pub const N_NCOLS_XLS_MAX: usize = 256;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Excel cell text maximum length (characters).
pub const N_LEN_EXCEL_CELL_TEXT_MAX: usize = 32_767;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];
/// Sheet name used when the caller gives none.
pub const C_SHEET_NAME_DEFAULT: &str = "Sheet1";

/// Workbook part listing the sheets.
pub const C_PART_WORKBOOK: &str = "xl/workbook.xml";
/// Relationships resolving sheet ids to worksheet parts.
pub const C_PART_WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
/// Shared-string table; optional.
pub const C_PART_SHARED_STRINGS: &str = "xl/sharedStrings.xml";
/// Worksheet read when the workbook part lists no sheets.
pub const C_PART_WORKSHEET_FALLBACK: &str = "xl/worksheets/sheet1.xml";

/// Spreadsheet format variant.
///
/// Both variants serialize through the same XLSX backend; they differ only in
/// the sheet limits the writer enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumExcelType {
    /// Excel 97-2003 limits (65,536 x 256).
    Xls,
    /// Excel 2007+ limits (1,048,576 x 16,384).
    #[default]
    Xlsx,
}

impl EnumExcelType {
    /// Nominal file extension, including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            EnumExcelType::Xls => ".xls",
            EnumExcelType::Xlsx => ".xlsx",
        }
    }

    /// Row/column limits of one worksheet.
    pub fn limits(self) -> SpecSheetLimits {
        match self {
            EnumExcelType::Xls => SpecSheetLimits {
                nrows_max: N_NROWS_XLS_MAX,
                ncols_max: N_NCOLS_XLS_MAX,
            },
            EnumExcelType::Xlsx => SpecSheetLimits {
                nrows_max: N_NROWS_XLSX_MAX,
                ncols_max: N_NCOLS_XLSX_MAX,
            },
        }
    }
}

/// Build the default body cell format.
pub fn derive_default_body_format() -> SpecCellFormat {
    SpecCellFormat {
        font_name: Some("Times New Roman".to_string()),
        font_size: Some(11),
        align: Some("left".to_string()),
        valign: Some("vcenter".to_string()),
        ..Default::default()
    }
}

/// Build the default header cell format (body format, bold and centered).
pub fn derive_default_header_format() -> SpecCellFormat {
    derive_default_body_format().with_(SpecCellFormat {
        bold: Some(true),
        align: Some("center".to_string()),
        ..Default::default()
    })
}

/// Build default write options.
pub fn derive_default_xlsx_write_options() -> SpecXlsxWriteOptions {
    SpecXlsxWriteOptions::default()
}
