use crate::markdown::{
    helper::{blockquote, br, code_block, doc, em, h, img, li, link, mark, ol, p, strong},
    markdown_schema,
};
use crate::model::{Node, NodeError, Slice};
use crate::transform::{find_wrapping, RemoveMarkStep, Step, StepJsonError, Transform};
use serde_json::json;

fn sample_doc() -> Node {
    doc((
        h(2, ("Intro ", img("a.png"))),
        p(("plain ", em("em"), br(), link("https://example.com", "link"))),
        code_block("rust", "fn main() {}"),
        ol((li(p("one")), li((p("two"), blockquote(p(strong("deep"))))))),
    ))
}

#[test]
fn test_doc_round_trip() {
    let schema = markdown_schema();
    let d = sample_doc();
    let json = d.to_json();
    assert_eq!(Node::from_json(schema, &json).unwrap(), d);

    let text = serde_json::to_string(&d).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, json);
    assert_eq!(json["content"][2]["attrs"], json!({"params": "rust"}));
    assert_eq!(
        json["content"][0]["content"][1]["attrs"],
        json!({"src": "a.png", "alt": null, "title": null})
    );
}

#[test]
fn test_slice_json() {
    let schema = markdown_schema();
    let d = doc((p("ab"), p("cd")));
    let slice = d.slice(2..6, false).unwrap();
    let json = slice.to_json();
    assert_eq!(
        json,
        json!({
            "content": [
                {"type": "paragraph", "content": [{"type": "text", "text": "b"}]},
                {"type": "paragraph", "content": [{"type": "text", "text": "c"}]}
            ],
            "openStart": 1,
            "openEnd": 1
        })
    );
    assert_eq!(Slice::from_json(schema, &json).unwrap(), slice);
    assert_eq!(Slice::from_json(schema, &json!(null)).unwrap(), Slice::empty());
}

#[test]
fn test_wrap_step_json() {
    let schema = markdown_schema();
    let d = doc(p("ab"));
    let rp = d.resolve(1).unwrap();
    let range = rp.block_range(&rp, None).unwrap();
    let quote = schema.node_type("blockquote").unwrap();
    let wrappers = find_wrapping(&range, &quote, None, None).unwrap();
    let mut tr = Transform::new(d);
    tr.wrap(&range, &wrappers).unwrap();

    let json = tr.steps()[0].to_json().unwrap();
    assert_eq!(
        json,
        json!({
            "stepType": "replaceAround",
            "from": 0,
            "to": 4,
            "gapFrom": 0,
            "gapTo": 4,
            "insert": 1,
            "structure": true,
            "slice": {"content": [{"type": "blockquote"}]}
        })
    );
    assert_eq!(Step::from_json(schema, &json).unwrap(), tr.steps()[0]);
}

#[test]
fn test_step_round_trips() {
    let schema = markdown_schema();
    let mut tr = Transform::new(sample_doc());
    tr.add_mark(1, 4, &mark("strong"))
        .unwrap()
        .delete(10, 12)
        .unwrap()
        .step(RemoveMarkStep::new(1, 6, mark("em")))
        .unwrap();
    let paragraph = schema.node_type("paragraph").unwrap();
    tr.set_block_type(1, 1, &paragraph, None).unwrap();
    assert!(tr.steps().len() >= 4);

    for step in tr.steps() {
        let json = step.to_json().unwrap();
        assert_eq!(json["stepType"], json!(step.step_type()));
        assert_eq!(&Step::from_json(schema, &json).unwrap(), step);
    }
}

#[test]
fn test_step_json_errors() {
    let schema = markdown_schema();
    assert_eq!(
        Step::from_json(schema, &json!({"from": 1, "to": 2})),
        Err(StepJsonError::MissingType)
    );
    assert_eq!(
        Step::from_json(schema, &json!({"stepType": "attr", "pos": 1})),
        Err(StepJsonError::UnknownType("attr".into()))
    );
    assert!(matches!(
        Step::from_json(schema, &json!({"stepType": "replace", "from": 1})),
        Err(StepJsonError::Malformed(_))
    ));
    assert!(matches!(
        Step::from_json(
            schema,
            &json!({"stepType": "addMark", "from": 1, "to": 2, "mark": {"type": "underline"}})
        ),
        Err(StepJsonError::Content(NodeError::UnknownMarkType(_)))
    ));
}

#[test]
fn test_step_json_rejects_bad_ranges() {
    let schema = markdown_schema();
    let malformed = |json: serde_json::Value| {
        matches!(Step::from_json(schema, &json), Err(StepJsonError::Malformed(_)))
    };
    assert!(malformed(json!({"stepType": "replace", "from": 3, "to": 1, "structure": true})));
    assert!(malformed(json!({"stepType": "addMark", "from": 5, "to": 2, "mark": {"type": "em"}})));
    assert!(malformed(json!({
        "stepType": "replaceAround",
        "from": 4, "to": 2, "gapFrom": 1, "gapTo": 3, "insert": 0
    })));
    assert!(malformed(json!({
        "stepType": "replaceAround",
        "from": 0, "to": 4, "gapFrom": 1, "gapTo": 3, "insert": 3,
        "slice": {"content": [{"type": "blockquote"}]}
    })));

    let too_open = json!({
        "stepType": "replace",
        "from": 1,
        "to": 1,
        "slice": {"content": [{"type": "text", "text": "x"}], "openStart": 2}
    });
    assert!(matches!(
        Step::from_json(schema, &too_open),
        Err(StepJsonError::Content(NodeError::InvalidJson(_)))
    ));
    assert!(Slice::from_json(schema, &json!({"openEnd": 1})).is_err());
    let open = json!({"content": [{"type": "paragraph"}], "openStart": 1, "openEnd": 1});
    assert_eq!(Slice::from_json(schema, &open).unwrap().size(), 0);
}
