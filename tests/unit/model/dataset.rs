use super::*;

#[test]
fn csv_headers_come_from_first_row() {
    let ds = Dataset::from_csv_reader("Name,Course,Date\nAda,Math,2024\nLin,Art,\n".as_bytes())
        .unwrap();
    assert_eq!(ds.headers(), &["Name", "Course", "Date"]);
    assert_eq!(ds.len(), 2);
    assert_eq!(ds.records()[0].get("Course"), Some("Math"));
    assert_eq!(ds.records()[1].get("Date"), Some(""));
}

#[test]
fn delimiter_is_sniffed() {
    let semi = Dataset::from_csv_reader("Name;Score\nAda;10\n".as_bytes()).unwrap();
    assert_eq!(semi.headers(), &["Name", "Score"]);
    assert_eq!(semi.records()[0].get("Score"), Some("10"));

    let tabs = Dataset::from_csv_reader("Name\tScore\nAda\t10\n".as_bytes()).unwrap();
    assert_eq!(tabs.records()[0].get("Name"), Some("Ada"));
}

#[test]
fn short_rows_are_padded_and_blank_rows_skipped() {
    let ds = Dataset::from_csv_reader("\u{feff}Name,Score\nAda\n,\nLin,7\n".as_bytes()).unwrap();
    assert_eq!(ds.headers(), &["Name", "Score"]);
    assert_eq!(ds.len(), 2);
    assert_eq!(ds.records()[0].get("Score"), Some(""));
    assert_eq!(ds.records()[1].get("Score"), Some("7"));
}

#[test]
fn duplicate_headers_are_rejected() {
    assert!(Dataset::from_csv_reader("Name,Name\na,b\n".as_bytes()).is_err());
}

#[test]
fn empty_input_is_an_empty_dataset() {
    let ds = Dataset::from_csv_reader("".as_bytes()).unwrap();
    assert!(ds.is_empty());
    assert!(ds.headers().is_empty());
}

#[test]
fn from_records_fills_missing_headers() {
    let ds = Dataset::from_records(vec![
        Record::from_pairs([("Name", "Ada"), ("Score", "9")]),
        Record::from_pairs([("Name", "Lin")]),
    ]);
    assert!(ds.has_header("Score"));
    assert_eq!(ds.records()[1].get("Score"), Some(""));
}
