//! Record-type introspection capability and cell value conversions.
//!
//! A record type exposes a static list of declared fields with optional export
//! metadata, plus get/set access by field name. [`impl_excel_record!`] derives
//! all of it from a field list:
//!
//! ```
//! use sheetkit_io_xlsx::impl_excel_record;
//! use sheetkit_io_xlsx::spec::SpecExcelField;
//!
//! #[derive(Debug, Default)]
//! struct Person {
//!     name: String,
//!     age: i64,
//!     note: String,
//! }
//!
//! impl_excel_record!(Person {
//!     name: SpecExcelField::new().with_head_name("Name"),
//!     age: SpecExcelField::new(),
//!     note,
//! });
//! ```

use crate::spec::{EnumCellValue, SpecFieldMeta};

/// Introspection capability consumed by the schema resolver, the writer and
/// the streaming reader.
pub trait ExcelRecord: Default {
    /// Type name used in error messages.
    fn record_type() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Declared fields in declaration order.
    fn fields() -> &'static [SpecFieldMeta];

    /// Current value of field `name`; `None` when no such field exists.
    fn get_field(&self, name: &str) -> Option<EnumCellValue>;

    /// Coerce `value` into field `name` and assign it.
    fn set_field(&mut self, name: &str, value: &EnumCellValue) -> Result<(), String>;
}

/// Conversion of a field value into a cell value.
pub trait IntoCellValue {
    fn to_cell_value(&self) -> EnumCellValue;
}

/// Coercion of a cell value into a field value.
pub trait FromCellValue: Sized {
    fn from_cell_value(value: &EnumCellValue) -> Result<Self, String>;
}

////////////////////////////////////////////////////////////////////////////////
// #region IntoCellValue

impl IntoCellValue for String {
    fn to_cell_value(&self) -> EnumCellValue {
        EnumCellValue::String(self.clone())
    }
}

impl IntoCellValue for bool {
    fn to_cell_value(&self) -> EnumCellValue {
        EnumCellValue::Bool(*self)
    }
}

impl<T: IntoCellValue> IntoCellValue for Option<T> {
    fn to_cell_value(&self) -> EnumCellValue {
        match self {
            Some(val) => val.to_cell_value(),
            None => EnumCellValue::None,
        }
    }
}

/// Largest integer magnitude an `f64` cell number holds exactly (2^53).
const N_INT_EXACT_F64_MAX: u128 = 1 << 53;

macro_rules! impl_into_cell_value_integer {
    ($($t:ty),* $(,)?) => {
        $(
            impl IntoCellValue for $t {
                fn to_cell_value(&self) -> EnumCellValue {
                    // Beyond 2^53 a number cell would round; keep the digits as text.
                    if (*self as i128).unsigned_abs() <= N_INT_EXACT_F64_MAX {
                        EnumCellValue::Number(*self as f64)
                    } else {
                        EnumCellValue::String(self.to_string())
                    }
                }
            }
        )*
    };
}

impl_into_cell_value_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! impl_into_cell_value_float {
    ($($t:ty),* $(,)?) => {
        $(
            impl IntoCellValue for $t {
                fn to_cell_value(&self) -> EnumCellValue {
                    EnumCellValue::Number(*self as f64)
                }
            }
        )*
    };
}

impl_into_cell_value_float!(f32, f64);

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FromCellValue

impl FromCellValue for String {
    fn from_cell_value(value: &EnumCellValue) -> Result<Self, String> {
        Ok(value.to_text())
    }
}

impl FromCellValue for bool {
    fn from_cell_value(value: &EnumCellValue) -> Result<Self, String> {
        match value {
            EnumCellValue::Bool(b) => Ok(*b),
            EnumCellValue::Number(n) => Ok(*n != 0.0),
            EnumCellValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(format!("cannot read {s:?} as bool")),
            },
            EnumCellValue::None => Err("blank cell".to_string()),
        }
    }
}

impl<T: FromCellValue> FromCellValue for Option<T> {
    fn from_cell_value(value: &EnumCellValue) -> Result<Self, String> {
        if value.is_blank() {
            return Ok(None);
        }
        T::from_cell_value(value).map(Some)
    }
}

macro_rules! impl_from_cell_value_integer {
    ($($t:ty),* $(,)?) => {
        $(
            impl FromCellValue for $t {
                fn from_cell_value(value: &EnumCellValue) -> Result<Self, String> {
                    let n_value = match value {
                        EnumCellValue::Number(n) => *n,
                        EnumCellValue::String(s) => {
                            let c_text = s.trim();
                            if let Ok(val) = c_text.parse::<$t>() {
                                return Ok(val);
                            }
                            c_text
                                .parse::<f64>()
                                .map_err(|_| format!("cannot read {s:?} as {}", stringify!($t)))?
                        }
                        EnumCellValue::Bool(_) => {
                            return Err(format!("cannot read bool as {}", stringify!($t)));
                        }
                        EnumCellValue::None => return Err("blank cell".to_string()),
                    };
                    if !n_value.is_finite()
                        || n_value.fract() != 0.0
                        || n_value < <$t>::MIN as f64
                        || n_value > <$t>::MAX as f64
                    {
                        return Err(format!("{n_value} does not fit {}", stringify!($t)));
                    }
                    Ok(n_value as $t)
                }
            }
        )*
    };
}

impl_from_cell_value_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! impl_from_cell_value_float {
    ($($t:ty),* $(,)?) => {
        $(
            impl FromCellValue for $t {
                fn from_cell_value(value: &EnumCellValue) -> Result<Self, String> {
                    match value {
                        EnumCellValue::Number(n) => Ok(*n as $t),
                        EnumCellValue::String(s) => s
                            .trim()
                            .parse::<$t>()
                            .map_err(|_| format!("cannot read {s:?} as {}", stringify!($t))),
                        EnumCellValue::Bool(_) => {
                            Err(format!("cannot read bool as {}", stringify!($t)))
                        }
                        EnumCellValue::None => Err("blank cell".to_string()),
                    }
                }
            }
        )*
    };
}

impl_from_cell_value_float!(f32, f64);

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RecordMacro

/// Implement [`ExcelRecord`] for a struct from its field list.
///
/// Fields are listed in declaration order. `field: <SpecExcelField expr>`
/// marks a field as exported; a bare `field` is declared but not exported.
/// Every listed field type must implement [`IntoCellValue`] and
/// [`FromCellValue`].
#[macro_export]
macro_rules! impl_excel_record {
    (@excel) => {
        None
    };
    (@excel $meta:expr) => {
        Some($meta)
    };
    ($ty:ident { $( $field:ident $( : $meta:expr )? ),* $(,)? }) => {
        impl $crate::record::ExcelRecord for $ty {
            fn record_type() -> &'static str {
                stringify!($ty)
            }

            fn fields() -> &'static [$crate::spec::SpecFieldMeta] {
                const FIELDS: &[$crate::spec::SpecFieldMeta] = &[
                    $(
                        $crate::spec::SpecFieldMeta {
                            name: stringify!($field),
                            excel: $crate::impl_excel_record!(@excel $( $meta )?),
                        },
                    )*
                ];
                FIELDS
            }

            #[allow(unused_variables)]
            fn get_field(&self, name: &str) -> Option<$crate::spec::EnumCellValue> {
                $(
                    if name == stringify!($field) {
                        return Some($crate::record::IntoCellValue::to_cell_value(&self.$field));
                    }
                )*
                None
            }

            #[allow(unused_variables)]
            fn set_field(
                &mut self,
                name: &str,
                value: &$crate::spec::EnumCellValue,
            ) -> ::std::result::Result<(), String> {
                $(
                    if name == stringify!($field) {
                        self.$field = $crate::record::FromCellValue::from_cell_value(value)?;
                        return Ok(());
                    }
                )*
                Err(format!("unknown field: {name}"))
            }
        }
    };
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::SpecExcelField;

    #[derive(Debug, Default, PartialEq)]
    struct Sample {
        name: String,
        age: u32,
        score: Option<f64>,
        active: bool,
        secret: String,
    }

    crate::impl_excel_record!(Sample {
        name: SpecExcelField::new().with_head_name("Name"),
        age: SpecExcelField::new(),
        score: SpecExcelField::new(),
        active: SpecExcelField::new(),
        secret,
    });

    #[test]
    fn test_macro_exposes_fields_in_declaration_order() {
        let l_names: Vec<&str> = Sample::fields().iter().map(|field| field.name).collect();

        assert_eq!(l_names, vec!["name", "age", "score", "active", "secret"]);
        assert_eq!(Sample::fields()[0].excel.map(|x| x.head_name), Some("Name"));
        assert!(Sample::fields()[4].excel.is_none());
        assert_eq!(Sample::record_type(), "Sample");
    }

    #[test]
    fn test_macro_get_and_set_by_name() {
        let mut record = Sample::default();
        record
            .set_field("age", &EnumCellValue::String(" 42 ".to_string()))
            .unwrap();
        record
            .set_field("score", &EnumCellValue::Number(1.5))
            .unwrap();
        record
            .set_field("active", &EnumCellValue::String("TRUE".to_string()))
            .unwrap();

        assert_eq!(record.age, 42);
        assert_eq!(record.score, Some(1.5));
        assert!(record.active);
        assert_eq!(record.get_field("age"), Some(EnumCellValue::Number(42.0)));
        assert_eq!(record.get_field("missing"), None);
        assert!(record.set_field("missing", &EnumCellValue::None).is_err());
    }

    #[test]
    fn test_integer_coercion_rejects_fractions_and_overflow() {
        assert_eq!(u8::from_cell_value(&EnumCellValue::Number(255.0)), Ok(255));
        assert!(u8::from_cell_value(&EnumCellValue::Number(256.0)).is_err());
        assert!(i64::from_cell_value(&EnumCellValue::Number(1.5)).is_err());
        assert!(i64::from_cell_value(&EnumCellValue::String("abc".to_string())).is_err());
        assert_eq!(i64::from_cell_value(&EnumCellValue::String("7.0".to_string())), Ok(7));
    }

    #[test]
    fn test_string_coercion_reads_numbers_as_text() {
        assert_eq!(
            String::from_cell_value(&EnumCellValue::Number(10.0)),
            Ok("10".to_string())
        );
        assert_eq!(
            Option::<String>::from_cell_value(&EnumCellValue::String(String::new())),
            Ok(None)
        );
    }

    #[test]
    fn test_large_integers_are_written_as_exact_text() {
        let n_big: i64 = 9_007_199_254_740_993;

        assert_eq!(
            n_big.to_cell_value(),
            EnumCellValue::String("9007199254740993".to_string())
        );
        assert_eq!(
            (-n_big).to_cell_value(),
            EnumCellValue::String("-9007199254740993".to_string())
        );
        assert_eq!(
            9_007_199_254_740_992_i64.to_cell_value(),
            EnumCellValue::Number(9_007_199_254_740_992.0)
        );
        assert_eq!(u64::MAX.to_cell_value(), EnumCellValue::String(u64::MAX.to_string()));
        assert_eq!(i64::from_cell_value(&n_big.to_cell_value()), Ok(n_big));
    }
}
