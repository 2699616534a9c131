//! Stateless helpers: schema resolution, row projection, sheet names and cell
//! references.

use std::collections::{BTreeSet, HashMap};

use crate::conf::{C_SHEET_NAME_DEFAULT, N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL};
use crate::error::{ExcelError, Result};
use crate::record::ExcelRecord;
use crate::spec::{EnumCellValue, SpecFieldSpec, SpecSchema};

////////////////////////////////////////////////////////////////////////////////
// #region SchemaResolution

/// Derive the ordered column schema of record type `T`.
///
/// Only fields whose export metadata has `excel_require` set are kept, in
/// declaration order.
pub fn resolve_schema<T: ExcelRecord>() -> Result<SpecSchema> {
    let l_fields_declared = T::fields();
    let c_record_type = T::record_type().to_string();
    if l_fields_declared.is_empty() {
        return Err(ExcelError::InvalidRecordType {
            record_type: c_record_type,
        });
    }

    let mut set_names_seen = BTreeSet::new();
    let mut l_fields = Vec::new();
    for (n_idx, meta) in l_fields_declared.iter().enumerate() {
        let Some(excel) = meta.excel else {
            continue;
        };
        if !excel.excel_require || !set_names_seen.insert(meta.name) {
            continue;
        }

        let display_name = if excel.head_name.trim().is_empty() {
            meta.name
        } else {
            excel.head_name
        };
        let map_key = if excel.map_key.trim().is_empty() {
            meta.name
        } else {
            excel.map_key
        };
        l_fields.push(SpecFieldSpec {
            internal_name: meta.name.to_string(),
            display_name: display_name.to_string(),
            map_key: map_key.to_string(),
            if_required: excel.excel_require,
            declaration_order: n_idx,
        });
    }

    if l_fields.is_empty() {
        return Err(ExcelError::SchemaEmpty {
            record_type: c_record_type,
        });
    }

    Ok(SpecSchema {
        record_type: c_record_type,
        fields: l_fields,
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RowProjection

/// Project `record` onto `schema` columns; unknown fields become blank cells.
pub fn project_record<T: ExcelRecord>(record: &T, schema: &SpecSchema) -> Vec<EnumCellValue> {
    schema
        .fields
        .iter()
        .map(|field| {
            record
                .get_field(&field.internal_name)
                .unwrap_or(EnumCellValue::None)
        })
        .collect()
}

/// Project a string-keyed map onto `schema` columns by map key.
///
/// Keys are matched exactly (case-sensitive). Keys outside the schema are
/// ignored; missing keys become blank cells.
pub fn project_map(
    map: &HashMap<String, EnumCellValue>,
    schema: &SpecSchema,
) -> Vec<EnumCellValue> {
    schema
        .fields
        .iter()
        .map(|field| map.get(&field.map_key).cloned().unwrap_or_default())
        .collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = C_SHEET_NAME_DEFAULT.to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellReference

/// Parse the zero-based column index out of an A1-style reference (`"BC12"`).
pub fn parse_cell_ref_col(cell_ref: &str) -> Option<usize> {
    let c_letters: &str = {
        let n_end = cell_ref
            .char_indices()
            .find(|(_, chr)| !chr.is_ascii_alphabetic())
            .map_or(cell_ref.len(), |(n_idx, _)| n_idx);
        &cell_ref[..n_end]
    };
    if c_letters.is_empty() || c_letters.len() > 3 {
        return None;
    }

    let c_digits = &cell_ref[c_letters.len()..];
    if !c_digits.is_empty() && !c_digits.chars().all(|chr| chr.is_ascii_digit()) {
        return None;
    }

    let mut n_col = 0usize;
    for chr in c_letters.chars() {
        n_col = n_col * 26 + (chr.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(n_col - 1)
}

/// Convert a zero-based column index to letters (`0 -> "A"`, `27 -> "AB"`).
pub fn derive_col_letters(mut col_idx: usize) -> String {
    let mut l_chars = Vec::new();
    loop {
        l_chars.push((b'A' + (col_idx % 26) as u8) as char);
        if col_idx < 26 {
            break;
        }
        col_idx = col_idx / 26 - 1;
    }
    l_chars.iter().rev().collect()
}

/// Decode the `_xHHHH_` escapes OOXML uses for characters XML cannot carry.
///
/// `_x005F_` stands for a literal `_`, so `_x005F_x0041_` decodes to
/// `_x0041_`. Sequences that are not a valid escape are kept as written.
pub fn decode_ooxml_escapes(text: &str) -> String {
    if !text.contains("_x") {
        return text.to_string();
    }

    let mut c_out = String::with_capacity(text.len());
    let mut c_rest = text;
    while let Some(n_pos) = c_rest.find("_x") {
        c_out.push_str(&c_rest[..n_pos]);
        let c_tail = &c_rest[n_pos..];
        let chr_escaped = c_tail
            .get(2..6)
            .filter(|hex| hex.chars().all(|chr| chr.is_ascii_hexdigit()))
            .filter(|_| c_tail.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match chr_escaped {
            Some(chr) => {
                c_out.push(chr);
                c_rest = &c_tail[7..];
            }
            None => {
                c_out.push_str("_x");
                c_rest = &c_tail[2..];
            }
        }
    }
    c_out.push_str(c_rest);
    c_out
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impl_excel_record;
    use crate::spec::SpecExcelField;

    #[derive(Debug, Default)]
    struct Contact {
        name: String,
        age: String,
        address: String,
        email: String,
    }

    impl_excel_record!(Contact {
        name: SpecExcelField::new(),
        age: SpecExcelField::new(),
        address: SpecExcelField::new().with_map_key("ADDRESS"),
        email: SpecExcelField::new(),
    });

    #[derive(Debug, Default)]
    struct Partial {
        id: i64,
        label: String,
        hidden: String,
    }

    impl_excel_record!(Partial {
        id,
        label: SpecExcelField::new().with_head_name("Label"),
        hidden: SpecExcelField::new().with_excel_require(false),
    });

    #[derive(Debug, Default)]
    struct NothingExported {
        id: i64,
    }

    impl_excel_record!(NothingExported { id });

    #[derive(Debug, Default)]
    struct NoFields {}

    impl_excel_record!(NoFields {});

    #[test]
    fn test_resolve_schema_keeps_declaration_order() {
        let schema = resolve_schema::<Contact>().unwrap();

        assert_eq!(
            schema.internal_names(),
            vec!["name", "age", "address", "email"]
        );
        assert_eq!(schema.display_names(), schema.internal_names());
        assert_eq!(schema.fields[2].map_key, "ADDRESS");
        assert_eq!(schema.len(), 4);
    }

    #[test]
    fn test_resolve_schema_skips_unexported_and_not_required() {
        let schema = resolve_schema::<Partial>().unwrap();

        assert_eq!(schema.len(), 1);
        assert_eq!(schema.fields[0].internal_name, "label");
        assert_eq!(schema.fields[0].display_name, "Label");
        assert_eq!(schema.fields[0].declaration_order, 1);
    }

    #[test]
    fn test_resolve_schema_errors() {
        assert!(matches!(
            resolve_schema::<NothingExported>(),
            Err(ExcelError::SchemaEmpty { .. })
        ));
        assert!(matches!(
            resolve_schema::<NoFields>(),
            Err(ExcelError::InvalidRecordType { .. })
        ));
    }

    #[test]
    fn test_project_record_aligns_with_schema() {
        let schema = resolve_schema::<Contact>().unwrap();
        let record = Contact {
            name: "Ann".to_string(),
            age: "10".to_string(),
            address: "Main St".to_string(),
            email: "ann@example.com".to_string(),
        };

        assert_eq!(
            project_record(&record, &schema),
            vec![
                EnumCellValue::String("Ann".to_string()),
                EnumCellValue::String("10".to_string()),
                EnumCellValue::String("Main St".to_string()),
                EnumCellValue::String("ann@example.com".to_string()),
            ]
        );
    }

    #[test]
    fn test_project_map_blanks_missing_keys_and_ignores_extra() {
        let schema = resolve_schema::<Contact>().unwrap();
        let mut map = HashMap::new();
        map.insert("name".to_string(), EnumCellValue::String("Ann".to_string()));
        map.insert("ADDRESS".to_string(), EnumCellValue::String("Bund 38".to_string()));
        map.insert("address".to_string(), EnumCellValue::String("lower".to_string()));
        map.insert("unrelated".to_string(), EnumCellValue::Number(1.0));

        assert_eq!(
            project_map(&map, &schema),
            vec![
                EnumCellValue::String("Ann".to_string()),
                EnumCellValue::None,
                EnumCellValue::String("Bund 38".to_string()),
                EnumCellValue::None,
            ]
        );
    }

    #[test]
    fn test_sanitize_sheet_name() {
        assert_eq!(sanitize_sheet_name("a/b:c", "_"), "a_b_c");
        assert_eq!(sanitize_sheet_name("   ", "_"), "Sheet1");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40), "_").len(), 31);
    }

    #[test]
    fn test_cell_ref_col_round_trips_letters() {
        assert_eq!(parse_cell_ref_col("A1"), Some(0));
        assert_eq!(parse_cell_ref_col("z9"), Some(25));
        assert_eq!(parse_cell_ref_col("AB12"), Some(27));
        assert_eq!(parse_cell_ref_col("XFD1048576"), Some(16_383));
        assert_eq!(parse_cell_ref_col("12"), None);
        assert_eq!(parse_cell_ref_col("A1B"), None);
        assert_eq!(derive_col_letters(0), "A");
        assert_eq!(derive_col_letters(27), "AB");
        assert_eq!(derive_col_letters(16_383), "XFD");
    }

    #[test]
    fn test_decode_ooxml_escapes() {
        assert_eq!(decode_ooxml_escapes("a_x0001_b"), "a\u{1}b");
        assert_eq!(decode_ooxml_escapes("_x005F_x0041_"), "_x0041_");
        assert_eq!(decode_ooxml_escapes("_x000D__x000a_"), "\r\n");
        assert_eq!(decode_ooxml_escapes("plain_x"), "plain_x");
        assert_eq!(decode_ooxml_escapes("_xZZZZ_ _x12_"), "_xZZZZ_ _x12_");
        assert_eq!(decode_ooxml_escapes("_xD800_"), "_xD800_");
    }
}
