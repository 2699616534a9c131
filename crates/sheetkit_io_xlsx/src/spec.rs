//! Shared specification models: cell values, formats, field metadata, schema
//! and session options.

use crate::conf::{C_SHEET_NAME_DEFAULT, EnumExcelType};

////////////////////////////////////////////////////////////////////////////////
// #region CellValue

/// Normalized cell value exchanged between records and worksheets.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EnumCellValue {
    /// Missing/blank value.
    #[default]
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Bool(bool),
}

impl EnumCellValue {
    /// Whether the value renders as an empty cell.
    pub fn is_blank(&self) -> bool {
        match self {
            EnumCellValue::None => true,
            EnumCellValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Render the value as cell text; blank for `None`.
    pub fn to_text(&self) -> String {
        match self {
            EnumCellValue::None => String::new(),
            EnumCellValue::String(s) => s.clone(),
            EnumCellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            EnumCellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        }
    }
}

/// One physical worksheet row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRawRow {
    /// Zero-based row index in the worksheet.
    pub row_idx: usize,
    /// Cell values by zero-based column index; gaps are `EnumCellValue::None`.
    pub cells: Vec<EnumCellValue>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<i64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Border style for all sides.
    pub border: Option<i64>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color.
    pub bg_color: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            border: other.border.or(self.border),
            text_wrap: other.text_wrap.or(self.text_wrap),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FieldSpecification

/// Export metadata attached to one declared record field.
///
/// A field without this metadata is never written nor read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecExcelField {
    /// Header text; blank falls back to the field name.
    pub head_name: &'static str,
    /// Key used when the record is projected from a string-keyed map; blank
    /// falls back to the field name.
    pub map_key: &'static str,
    /// Whether the field takes part in the sheet.
    pub excel_require: bool,
}

impl SpecExcelField {
    /// Exported field with default header text and map key.
    pub const fn new() -> Self {
        Self {
            head_name: "",
            map_key: "",
            excel_require: true,
        }
    }

    pub const fn with_head_name(self, head_name: &'static str) -> Self {
        Self { head_name, ..self }
    }

    pub const fn with_map_key(self, map_key: &'static str) -> Self {
        Self { map_key, ..self }
    }

    pub const fn with_excel_require(self, excel_require: bool) -> Self {
        Self {
            excel_require,
            ..self
        }
    }
}

impl Default for SpecExcelField {
    fn default() -> Self {
        Self::new()
    }
}

/// One declared field of a record type, as exposed by
/// [`crate::record::ExcelRecord::fields`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecFieldMeta {
    /// Field name in the record type.
    pub name: &'static str,
    /// Export metadata, if any.
    pub excel: Option<SpecExcelField>,
}

/// Resolved column definition for one exported field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecFieldSpec {
    /// Field name in the record type.
    pub internal_name: String,
    /// Header text.
    pub display_name: String,
    /// Key used by map projection.
    pub map_key: String,
    /// Copied from the field's `excel_require` flag. Always `true` in a
    /// resolved schema, since fields without it are not columns.
    pub if_required: bool,
    /// Zero-based position among all declared fields.
    pub declaration_order: usize,
}

/// Ordered, non-empty column schema derived from a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSchema {
    /// Record type name the schema was resolved from.
    pub record_type: String,
    /// Columns in declaration order.
    pub fields: Vec<SpecFieldSpec>,
}

impl SpecSchema {
    /// Number of columns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Header texts in column order.
    pub fn display_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|field| field.display_name.clone())
            .collect()
    }

    /// Internal field names in column order.
    pub fn internal_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|field| field.internal_name.clone())
            .collect()
    }

    /// Find the column matching header text: display name first, then
    /// internal name.
    pub fn find_by_header(&self, header: &str) -> Option<&SpecFieldSpec> {
        self.fields
            .iter()
            .find(|field| field.display_name == header)
            .or_else(|| self.fields.iter().find(|field| field.internal_name == header))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOptions

/// Per-sheet row/column limits enforced by the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecSheetLimits {
    /// Maximum physical rows, header included.
    pub nrows_max: usize,
    /// Maximum columns.
    pub ncols_max: usize,
}

/// Writer session options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxWriteOptions {
    /// Format variant; selects the default sheet limits.
    pub excel_type: EnumExcelType,
    /// Target sheet name; sanitized before use.
    pub sheet_name: String,
    /// Header row format.
    pub fmt_header: SpecCellFormat,
    /// Data row format.
    pub fmt_body: SpecCellFormat,
    /// Replace the variant limits when set.
    pub limits_override: Option<SpecSheetLimits>,
}

impl SpecXlsxWriteOptions {
    /// Effective sheet limits.
    pub fn limits(&self) -> SpecSheetLimits {
        self.limits_override
            .unwrap_or_else(|| self.excel_type.limits())
    }
}

impl Default for SpecXlsxWriteOptions {
    fn default() -> Self {
        Self {
            excel_type: EnumExcelType::Xlsx,
            sheet_name: C_SHEET_NAME_DEFAULT.to_string(),
            fmt_header: crate::conf::derive_default_header_format(),
            fmt_body: crate::conf::derive_default_body_format(),
            limits_override: None,
        }
    }
}

/// Writer session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumWriterState {
    /// Accepting writes and flushes.
    Open,
    /// Terminal; every write/flush fails.
    Closed,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_to_text_renders_integral_numbers_without_fraction() {
        assert_eq!(EnumCellValue::Number(10.0).to_text(), "10");
        assert_eq!(EnumCellValue::Number(2.5).to_text(), "2.5");
        assert_eq!(EnumCellValue::Bool(true).to_text(), "TRUE");
        assert_eq!(EnumCellValue::None.to_text(), "");
        assert!(EnumCellValue::String(String::new()).is_blank());
        assert!(!EnumCellValue::Number(0.0).is_blank());
    }

    #[test]
    fn test_excel_field_builders_overlay_defaults() {
        let field = SpecExcelField::new()
            .with_head_name("Address")
            .with_map_key("ADDRESS");

        assert_eq!(field.head_name, "Address");
        assert_eq!(field.map_key, "ADDRESS");
        assert!(field.excel_require);
        assert!(!field.with_excel_require(false).excel_require);
    }

    #[test]
    fn test_write_options_limits_override_wins() {
        let mut options = SpecXlsxWriteOptions {
            excel_type: EnumExcelType::Xls,
            ..Default::default()
        };
        assert_eq!(options.limits().nrows_max, 65_536);

        options.limits_override = Some(SpecSheetLimits {
            nrows_max: 3,
            ncols_max: 2,
        });
        assert_eq!(options.limits().nrows_max, 3);
        assert_eq!(options.limits().ncols_max, 2);
    }
}
