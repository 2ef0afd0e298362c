use serde_json::json;
use std::sync::Arc;
use stencil_dom::{Document, MutationRecord, NodeId, PropValue};
use stencil_template::{RenderError, RenderNode, Renderer, Template};

struct Harness {
    document: Document,
    host: NodeId,
    renderer: Renderer,
}

impl Harness {
    fn new(source: &str) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let template = Arc::new(Template::compile("test", source).expect("template compiles"));
        let mut document = Document::new();
        let host = document.create_element("div");
        let body = document.body();
        document.append_child(body, host).unwrap();
        Self {
            document,
            host,
            renderer: Renderer::new(template),
        }
    }

    fn render(&mut self, data: serde_json::Value) -> Result<(), RenderError> {
        self.renderer
            .render_into(&mut self.document, self.host, &RenderNode::from(data))
    }

    fn html(&self) -> String {
        self.document.visible_html(self.host)
    }

    fn find(&self, tag: &str) -> Vec<NodeId> {
        self.document
            .descendants(self.host)
            .filter(|node| self.document.tag(*node) == Some(tag))
            .collect()
    }
}

#[test]
fn test_end_to_end_counter_and_rows() {
    let mut harness = Harness::new("<span>${count}</span><!--${rows}-->");

    harness
        .render(json!({"count": 1, "rows": ["<li>x</li>"]}))
        .unwrap();
    assert_eq!(harness.html(), "<span>1</span><li>x</li>");
    let span = harness.find("span")[0];
    let first_item = harness.find("li")[0];

    let before = harness.document.stats();
    harness.document.start_recording();
    harness
        .render(json!({"count": 2, "rows": ["<li>x</li>", "<li>y</li>"]}))
        .unwrap();
    let records = harness.document.stop_recording();
    let delta = harness.document.stats() - before;

    assert_eq!(harness.html(), "<span>2</span><li>x</li><li>y</li>");
    assert_eq!(harness.find("span"), vec![span]);
    assert_eq!(harness.find("li")[0], first_item);
    assert_eq!(delta.text_writes, 1);
    assert_eq!(delta.inserted, 1);
    assert_eq!(delta.removed, 0);
    assert_eq!(delta.attribute_writes, 0);
    assert_eq!(records.len(), 2);
}

#[test]
fn test_second_identical_render_is_a_no_op() {
    let mut harness = Harness::new(
        r#"<h1 class="${tone}">${title}</h1>
<ul><!--${rows}--></ul>
<input value="${query}" disabled="${locked}">
<template id="row"><li data-id="${id}">${label}</li></template>"#,
    );
    let data = json!({
        "tone": "info",
        "title": "Users",
        "query": "ad",
        "locked": false,
        "rows": [
            {"$template": "row", "id": 1, "label": "Ada"},
            {"$template": "row", "id": 2, "label": "Grace"},
        ],
    });

    harness.render(data.clone()).unwrap();
    let html = harness.html();
    let before = harness.document.stats();

    harness.render(data).unwrap();
    let delta = harness.document.stats() - before;

    assert_eq!(harness.html(), html);
    assert_eq!(delta.created, 0);
    assert_eq!(delta.writes(), 0);
    assert_eq!(delta.inserted, 0);
    assert_eq!(delta.removed, 0);
}

#[test]
fn test_changing_one_field_touches_one_node() {
    let mut harness = Harness::new("<h1>${a.b}</h1><p>${a.c}</p><input value=\"${v}\">");
    harness
        .render(json!({"a": {"b": "one", "c": "same"}, "v": "x"}))
        .unwrap();
    let heading_text = harness.document.first_child(harness.find("h1")[0]).unwrap();

    harness.document.start_recording();
    harness
        .render(json!({"a": {"b": "two", "c": "same"}, "v": "x"}))
        .unwrap();
    let records = harness.document.stop_recording();

    assert_eq!(
        records,
        vec![MutationRecord::CharacterData {
            target: heading_text
        }]
    );
    assert_eq!(harness.html(), "<h1>two</h1><p>same</p><input value=\"x\">");
}

#[test]
fn test_boolean_attribute_semantics() {
    let mut harness = Harness::new(r#"<button disabled="${d}">go</button>"#);
    let cases = [
        (json!({"d": true}), Some("")),
        (json!({"d": false}), None),
        (json!({"d": null}), None),
        (json!({}), None),
        (json!({"d": "x"}), Some("x")),
        (json!({"d": 0}), Some("0")),
    ];

    for (data, expected) in cases {
        harness.render(data.clone()).unwrap();
        let button = harness.find("button")[0];
        assert_eq!(
            harness.document.attribute(button, "disabled"),
            expected,
            "rendering {}",
            data
        );
    }
}

#[test]
fn test_markup_list_keeps_identity_of_survivors() {
    let mut harness = Harness::new("<ul><!--${rows}--></ul>");
    harness
        .render(json!({"rows": ["<li>A</li>", "<li>B</li>", "<li>C</li>"]}))
        .unwrap();
    let items = harness.find("li");

    let before = harness.document.stats();
    harness
        .render(json!({"rows": ["<li>A</li>", "<li>C</li>"]}))
        .unwrap();
    let delta = harness.document.stats() - before;

    assert_eq!(harness.html(), "<ul><li>A</li><li>C</li></ul>");
    assert_eq!(harness.find("li"), vec![items[0], items[2]]);
    assert!(!harness.document.contains(items[1]));
    assert_eq!(delta.removed, 1);
    assert_eq!(delta.inserted, 0);
    assert_eq!(delta.created, 0);
}

#[test]
fn test_sub_template_pool_is_ordinal_and_shrinks() {
    let mut harness = Harness::new(
        r#"<ul><!--${rows}--></ul><template id="row"><li>${label}</li></template>"#,
    );
    let rows = |labels: &[&str]| {
        json!({
            "rows": labels
                .iter()
                .map(|label| json!({"$template": "row", "label": label}))
                .collect::<Vec<_>>()
        })
    };

    harness.render(rows(&["A", "B", "C"])).unwrap();
    assert_eq!(harness.renderer.pool_len(Some("row")), 3);
    let items = harness.find("li");

    harness.render(rows(&["A", "C"])).unwrap();
    assert_eq!(harness.html(), "<ul><li>A</li><li>C</li></ul>");
    assert_eq!(harness.renderer.pool_len(Some("row")), 2);
    assert_eq!(harness.find("li"), vec![items[0], items[1]]);
    assert!(!harness.document.contains(items[2]));

    harness.render(rows(&[])).unwrap();
    assert_eq!(harness.html(), "<ul></ul>");
    assert_eq!(harness.renderer.pool_len(Some("row")), 0);
}

#[test]
fn test_adjacent_anchors_do_not_leak() {
    let mut harness = Harness::new("<div><!--${left}--><!--${right}--></div>");
    let steps = [
        (json!({"left": ["<i>a</i>", "<i>b</i>"], "right": ["<b>c</b>"]}), "<div><i>a</i><i>b</i><b>c</b></div>"),
        (json!({"left": [], "right": ["<b>c</b>", "<b>d</b>"]}), "<div><b>c</b><b>d</b></div>"),
        (json!({"left": ["<i>x</i>"], "right": []}), "<div><i>x</i></div>"),
        (json!({"left": null, "right": null}), "<div></div>"),
        (
            json!({"left": ["<i>a</i>", "<i>b</i>", "<i>c</i>"], "right": "<b>d</b>"}),
            "<div><i>a</i><i>b</i><i>c</i><b>d</b></div>",
        ),
    ];

    for (data, expected) in steps {
        harness.render(data.clone()).unwrap();
        assert_eq!(harness.html(), expected, "rendering {}", data);
    }
}

#[test]
fn test_instances_move_between_adjacent_anchors() {
    let mut harness = Harness::new(
        r#"<div><!--${left}--><!--${right}--></div><template id="tag"><em>${t}</em></template>"#,
    );
    let tag = |t: &str| json!({"$template": "tag", "t": t});

    harness
        .render(json!({"left": [tag("a")], "right": []}))
        .unwrap();
    assert_eq!(harness.html(), "<div><em>a</em></div>");
    let em = harness.find("em")[0];

    harness
        .render(json!({"left": [], "right": [tag("b")]}))
        .unwrap();
    assert_eq!(harness.html(), "<div><em>b</em></div>");

    harness
        .render(json!({"left": [tag("c")], "right": []}))
        .unwrap();
    assert_eq!(harness.html(), "<div><em>c</em></div>");
    assert_eq!(harness.find("em"), vec![em]);

    let div = harness.document.first_child(harness.host).unwrap();
    let comments: Vec<NodeId> = harness
        .document
        .children(div)
        .filter(|node| harness.document.is_comment(*node))
        .collect();
    assert_eq!(comments.len(), 2);
    assert_eq!(harness.document.next_sibling(comments[0]), Some(em));
    assert_eq!(harness.document.next_sibling(em), Some(comments[1]));
}

#[test]
fn test_nested_sub_templates() {
    let mut harness = Harness::new(
        r#"<ul><!--${rows}--></ul>
<template id="row"><li>${label}<!--${badge}--></li></template>
<template id="badge"><b>${n}</b></template>"#,
    );
    harness
        .render(json!({
            "rows": [
                {"$template": "row", "label": "inbox", "badge": {"$template": "badge", "n": 3}},
                {"$template": "row", "label": "sent", "badge": null},
            ]
        }))
        .unwrap();

    assert_eq!(
        harness.html(),
        "<ul><li>inbox<b>3</b></li><li>sent</li></ul>"
    );
}

#[test]
fn test_textarea_and_live_properties() {
    let mut harness = Harness::new(
        r#"<textarea>${body}</textarea><input type="checkbox" checked="${on}"><input class="free">"#,
    );
    harness.render(json!({"body": "hello", "on": true})).unwrap();

    let textarea = harness.find("textarea")[0];
    let inputs = harness.find("input");
    let (checkbox, free) = (inputs[0], inputs[1]);
    assert_eq!(
        harness.document.property(textarea, "value"),
        Some(PropValue::Text("hello".into()))
    );
    assert_eq!(
        harness.document.property(checkbox, "checked"),
        Some(PropValue::Flag(true))
    );

    // the user types into the unbound input
    harness
        .document
        .set_property(free, "value", PropValue::Text("typed".into()))
        .unwrap();

    harness.render(json!({"body": "hello", "on": false})).unwrap();
    assert_eq!(harness.document.attribute(checkbox, "checked"), None);
    assert_eq!(
        harness.document.property(checkbox, "checked"),
        Some(PropValue::Flag(false))
    );
    assert_eq!(harness.find("input"), vec![checkbox, free]);
    assert_eq!(
        harness.document.property(free, "value"),
        Some(PropValue::Text("typed".into()))
    );
}

#[test]
fn test_unknown_template_leaves_dom_untouched() {
    let mut harness = Harness::new(
        r#"<p>${title}</p><!--${rows}--><template id="row"><i>${n}</i></template>"#,
    );
    harness
        .render(json!({"title": "ok", "rows": [{"$template": "row", "n": 1}]}))
        .unwrap();
    let html = harness.html();
    let before = harness.document.stats();

    let error = harness
        .render(json!({"title": "changed", "rows": [{"$template": "nope"}]}))
        .unwrap_err();

    assert_eq!(
        error,
        RenderError::UnknownTemplate {
            template: "test".into(),
            name: "nope".into()
        }
    );
    assert_eq!(harness.html(), html);
    assert_eq!(harness.document.stats() - before, Default::default());
}

#[test]
fn test_root_must_be_a_record_or_template() {
    let mut harness = Harness::new("<p>${a}</p><template id=\"row\"><i>${n}</i></template>");
    assert!(matches!(
        harness.render(json!([1, 2])),
        Err(RenderError::InvalidRoot { found: "list" })
    ));

    harness.render(json!({"$template": "row", "n": 5})).unwrap();
    assert_eq!(harness.html(), "<i>5</i>");
}

#[test]
fn test_clear_frees_everything() {
    let mut harness = Harness::new("<p>${a}</p><!--${rows}-->");
    let empty = harness.document.len();
    harness
        .render(json!({"a": 1, "rows": ["<li>1</li>", "<li>2</li>"]}))
        .unwrap();

    let Harness {
        document,
        renderer,
        host,
    } = &mut harness;
    renderer.clear(document).unwrap();
    assert_eq!(document.first_child(*host), None);
    assert_eq!(document.len(), empty);
}
