use serde_json::json;
use stencil_dom::{Document, MutationRecord, PropValue};

#[test]
fn test_moving_parsed_nodes_keeps_identity() {
    let mut doc = Document::new();
    let fragment = doc
        .parse_fragment(r#"<ul id="list"><li>a</li><li>b</li></ul>"#)
        .unwrap();
    let list = doc.first_child(fragment).unwrap();
    let items: Vec<_> = doc.children(list).collect();

    let body = doc.body();
    doc.append_child(body, fragment).unwrap();
    assert_eq!(doc.parent(list), Some(body));
    assert!(doc.is_connected(items[1]));

    doc.start_recording();
    doc.insert_before(list, items[1], Some(items[0])).unwrap();
    let records = doc.stop_recording();

    assert_eq!(doc.children(list).collect::<Vec<_>>(), vec![items[1], items[0]]);
    assert_eq!(doc.inner_html(body), r#"<ul id="list"><li>b</li><li>a</li></ul>"#);
    assert_eq!(
        records,
        vec![
            MutationRecord::ChildList {
                target: list,
                added: vec![],
                removed: vec![items[1]],
            },
            MutationRecord::ChildList {
                target: list,
                added: vec![items[1]],
                removed: vec![],
            },
        ]
    );
}

#[test]
fn test_records_serialize_as_tagged_json() {
    let mut doc = Document::new();
    let input = doc.create_element("input");
    let body = doc.body();
    doc.append_child(body, input).unwrap();

    doc.start_recording();
    doc.set_attribute(input, "value", "a").unwrap();
    doc.set_property(input, "value", PropValue::Text("typed".into()))
        .unwrap();
    let records = doc.stop_recording();

    let value = serde_json::to_value(&records).unwrap();
    assert_eq!(value[0]["type"], json!("attribute"));
    assert_eq!(value[0]["name"], json!("value"));
    assert_eq!(value[1]["type"], json!("property"));
}

#[test]
fn test_stale_handles_after_discard() {
    let mut doc = Document::new();
    let fragment = doc.parse_fragment("<p>gone</p>").unwrap();
    let paragraph = doc.first_child(fragment).unwrap();
    doc.discard(fragment).unwrap();

    let reused = doc.create_element("div");
    assert!(!doc.contains(paragraph));
    assert!(doc.contains(reused));
    assert_ne!(paragraph, reused);
    assert!(doc.set_text(paragraph, "x").is_err());
}
