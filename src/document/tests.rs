use super::*;
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::NamedTempFile;

fn jsonl(lines: &[&str]) -> Cursor<Vec<u8>> {
    Cursor::new(lines.join("\n").into_bytes())
}

#[test]
fn test_normalize_text() {
    assert_eq!(normalize_text("  Summer \t Cotton\n\nMidi  "), "Summer Cotton Midi");
    assert_eq!(normalize_text(""), "");
    assert_eq!(normalize_text("   "), "");
}

#[test]
fn test_document_accepts_meta_alias() {
    let doc: Document = serde_json::from_str(
        r#"{"id":"prod_1_0","text":"Title: Red Dress","meta":{"title":"Red Dress"}}"#,
    )
    .unwrap();

    assert_eq!(doc.id, "prod_1_0");
    assert_eq!(doc.metadata.get("title").map(String::as_str), Some("Red Dress"));
}

#[test]
fn test_document_without_metadata() {
    let doc: Document = serde_json::from_str(r#"{"id":"a","text":"b"}"#).unwrap();
    assert!(doc.metadata.is_empty());
}

#[test]
fn test_product_record_composition() {
    let record = ProductRecord {
        pid: "42".into(),
        title: "Summer  Cotton Midi Dress".into(),
        brand: "Aurelia".into(),
        price: "1899".into(),
        ..Default::default()
    };

    let doc = record.into_document(7).unwrap();
    assert_eq!(doc.id, "prod_42_7");
    assert_eq!(
        doc.text,
        "Title: Summer Cotton Midi Dress Brand: Aurelia Price: 1899"
    );
    assert_eq!(doc.metadata["title"], "Summer Cotton Midi Dress");
    assert_eq!(doc.metadata["color"], "");
}

#[test]
fn test_product_record_empty_is_skipped() {
    let record = ProductRecord {
        pid: "1".into(),
        ..Default::default()
    };
    assert!(record.into_document(0).is_none());
}

#[test]
fn test_hit_snippet_is_char_safe() {
    let hit = Hit {
        doc_id: "d".into(),
        text: "Kurta – cotton".into(),
        score: 1.0,
        metadata: Metadata::new(),
    };

    assert_eq!(hit.snippet(6), "Kurta ");
    assert_eq!(hit.snippet(7), "Kurta –");
    assert_eq!(hit.snippet(300), "Kurta – cotton");
}

#[test]
fn test_result_set_serializes_as_array() {
    let set = ResultSet::from(vec![Hit {
        doc_id: "d1".into(),
        text: "t".into(),
        score: 0.5,
        metadata: Metadata::new(),
    }]);

    let json = serde_json::to_value(&set).unwrap();
    assert!(json.is_array());
    assert_eq!(json[0]["doc_id"], "d1");

    let back = ResultSet::from_json_bytes(&set.to_json_bytes().unwrap()).unwrap();
    assert_eq!(back, set);
}

#[test]
fn test_result_set_ordering_check() {
    let hit = |score| Hit {
        doc_id: String::new(),
        text: String::new(),
        score,
        metadata: Metadata::new(),
    };

    assert!(ResultSet::empty().is_ordered());
    assert!(ResultSet::from(vec![hit(3.0), hit(3.0), hit(1.0)]).is_ordered());
    assert!(!ResultSet::from(vec![hit(1.0), hit(2.0)]).is_ordered());
}

#[test]
fn test_batches_respect_size() {
    let input = jsonl(&[
        r#"{"id":"a","text":"1"}"#,
        r#"{"id":"b","text":"2"}"#,
        "",
        r#"{"id":"c","text":"3"}"#,
    ]);

    let batches: Vec<_> = DocumentBatches::from_reader(input, Path::new("mem"), 2)
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 2);
    assert_eq!(batches[1][0].id, "c");
}

#[test]
fn test_malformed_line_reports_line_number() {
    let input = jsonl(&[r#"{"id":"a","text":"1"}"#, "", "{not json"]);

    let mut batches = DocumentBatches::from_reader(input, Path::new("mem"), 10);
    let err = batches.next().unwrap().unwrap_err();

    assert!(matches!(err, DocumentError::Malformed { line: 3, .. }));
    assert!(batches.next().is_none());
}

#[test]
fn test_empty_id_rejected() {
    let input = jsonl(&[r#"{"id":"  ","text":"1"}"#]);

    let err = DocumentBatches::from_reader(input, Path::new("mem"), 10)
        .next()
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, DocumentError::EmptyId { line: 1 }));
}

#[test]
fn test_open_missing_file() {
    let result = DocumentBatches::open(Path::new("/nonexistent/processed.jsonl"), 10);
    assert!(matches!(result, Err(DocumentError::NotFound { .. })));
}

#[test]
fn test_read_documents_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"id":"a","text":"Title: A","meta":{{"brand":"X"}}}}"#).unwrap();
    writeln!(file, r#"{{"id":"b","text":"Title: B"}}"#).unwrap();

    let docs = read_documents(file.path()).unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].metadata["brand"], "X");
}
