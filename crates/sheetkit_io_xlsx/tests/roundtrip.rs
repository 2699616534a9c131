use pretty_assertions::assert_eq;
use sheetkit_io_xlsx::{
    EnumCellValue, EnumExcelType, ExcelError, SpecExcelField, SpecXlsxWriteOptions,
    XlsxStreamReader, XlsxWriter, impl_excel_record, read_all_from_path, write_records_to_path,
};

#[derive(Debug, Clone, Default, PartialEq)]
struct Contact {
    name: String,
    age: String,
    address: String,
    email: String,
}

impl_excel_record!(Contact {
    name: SpecExcelField::new(),
    age: SpecExcelField::new(),
    address: SpecExcelField::new(),
    email: SpecExcelField::new(),
});

#[derive(Debug, Clone, Default, PartialEq)]
struct Measurement {
    label: String,
    count: i64,
    ratio: Option<f64>,
    valid: bool,
    internal: String,
}

impl_excel_record!(Measurement {
    label: SpecExcelField::new().with_head_name("Label"),
    count: SpecExcelField::new().with_head_name("Count"),
    ratio: SpecExcelField::new(),
    valid: SpecExcelField::new(),
    internal,
});

fn create_contacts(n: usize) -> Vec<Contact> {
    (0..n)
        .map(|idx| Contact {
            name: format!("user{idx}"),
            age: (20 + idx).to_string(),
            address: format!("{idx} Main St"),
            email: format!("user{idx}@example.com"),
        })
        .collect()
}

#[test]
fn test_saved_workbook_reads_back_identical_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contacts.xlsx");
    let l_contacts = create_contacts(3);

    let mut writer = XlsxWriter::open(Some("Contacts")).unwrap();
    writer.write(&l_contacts[..2]).unwrap();
    writer.write(&l_contacts[2..]).unwrap();
    writer.save(&path).unwrap();
    writer.close();

    let mut reader = XlsxStreamReader::open(&path).unwrap();
    assert_eq!(reader.sheet_names(), vec!["Contacts".to_string()]);
    let l_read: Vec<Contact> = reader.read_all().unwrap();

    assert_eq!(l_read, l_contacts);
}

#[test]
fn test_typed_fields_survive_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("measurements.xlsx");
    let l_rows = vec![
        Measurement {
            label: "a".to_string(),
            count: 3,
            ratio: Some(0.25),
            valid: true,
            internal: "dropped".to_string(),
        },
        Measurement {
            label: "b".to_string(),
            count: -7,
            ratio: None,
            valid: false,
            internal: String::new(),
        },
    ];

    write_records_to_path(&l_rows, &path, SpecXlsxWriteOptions::default()).unwrap();
    let l_read: Vec<Measurement> = read_all_from_path(&path).unwrap();

    let l_expected: Vec<Measurement> = l_rows
        .into_iter()
        .map(|row| Measurement {
            internal: String::new(),
            ..row
        })
        .collect();
    assert_eq!(l_read, l_expected);

    let mut reader = XlsxStreamReader::open(&path).unwrap();
    let header = reader.rows().unwrap().next().unwrap().unwrap();
    assert_eq!(
        header.cells,
        vec![
            EnumCellValue::String("Label".to_string()),
            EnumCellValue::String("Count".to_string()),
            EnumCellValue::String("ratio".to_string()),
            EnumCellValue::String("valid".to_string()),
        ]
    );
}

#[test]
fn test_reader_fills_partial_target_type() {
    #[derive(Debug, Default, PartialEq)]
    struct NameAndPhone {
        name: String,
        phone: String,
    }

    impl_excel_record!(NameAndPhone {
        name: SpecExcelField::new(),
        phone: SpecExcelField::new(),
    });

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.xlsx");
    write_records_to_path(&create_contacts(2), &path, SpecXlsxWriteOptions::default()).unwrap();

    let l_read: Vec<NameAndPhone> = read_all_from_path(&path).unwrap();

    assert_eq!(
        l_read,
        vec![
            NameAndPhone {
                name: "user0".to_string(),
                phone: String::new(),
            },
            NameAndPhone {
                name: "user1".to_string(),
                phone: String::new(),
            },
        ]
    );
}

#[test]
fn test_xls_limits_apply_to_row_count() {
    let mut writer = XlsxWriter::new(SpecXlsxWriteOptions {
        excel_type: EnumExcelType::Xls,
        ..Default::default()
    })
    .unwrap();
    let l_contacts = create_contacts(65_536);

    assert!(matches!(
        writer.write(&l_contacts),
        Err(ExcelError::RowLimitExceeded {
            rows: 65_537,
            limit: 65_536
        })
    ));
    assert_eq!(writer.row_cursor(), 0);

    writer.write(&l_contacts[..65_535]).unwrap();
    assert_eq!(writer.row_cursor(), 65_536);
    assert!(matches!(
        writer.write(&l_contacts[..1]),
        Err(ExcelError::RowLimitExceeded { .. })
    ));
}

#[test]
fn test_streaming_large_sheet_stops_early() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("large.xlsx");
    write_records_to_path(&create_contacts(5_000), &path, SpecXlsxWriteOptions::default())
        .unwrap();

    let mut reader = XlsxStreamReader::open(&path).unwrap();
    let l_first: Vec<Contact> = reader
        .records::<Contact>()
        .unwrap()
        .take(2)
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(l_first, create_contacts(2));
    assert_eq!(reader.read_all::<Contact>().unwrap().len(), 5_000);
}

#[test]
fn test_open_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = XlsxStreamReader::open(dir.path().join("missing.xlsx"));

    assert!(matches!(result, Err(ExcelError::Io(_))));
}

#[test]
fn test_control_chars_and_literal_escapes_round_trip() {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Note {
        text: String,
    }

    impl_excel_record!(Note {
        text: SpecExcelField::new(),
    });

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.xlsx");
    let l_notes = vec![
        Note {
            text: "a\u{1}b".to_string(),
        },
        Note {
            text: "_x0041_".to_string(),
        },
        Note {
            text: "line\nbreak_x".to_string(),
        },
    ];

    write_records_to_path(&l_notes, &path, SpecXlsxWriteOptions::default()).unwrap();
    let l_read: Vec<Note> = read_all_from_path(&path).unwrap();

    assert_eq!(l_read, l_notes);
}

#[test]
fn test_integers_beyond_f64_precision_round_trip() {
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Ledger {
        id: i64,
        total: u64,
    }

    impl_excel_record!(Ledger {
        id: SpecExcelField::new(),
        total: SpecExcelField::new(),
    });

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.xlsx");
    let l_rows = vec![
        Ledger {
            id: 9_007_199_254_740_993,
            total: u64::MAX,
        },
        Ledger {
            id: -9_007_199_254_740_993,
            total: 42,
        },
    ];

    write_records_to_path(&l_rows, &path, SpecXlsxWriteOptions::default()).unwrap();
    let l_read: Vec<Ledger> = read_all_from_path(&path).unwrap();

    assert_eq!(l_read, l_rows);
}
