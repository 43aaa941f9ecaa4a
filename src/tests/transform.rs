use crate::markdown::{
    helper::{doc, em, mark, marked, p, strong, text},
    markdown_schema,
};
use crate::model::{Fragment, Node, NodeSpec, Schema, SchemaSpec, Slice};
use crate::transform::{AddMarkStep, Assoc, Mappable, ReplaceStep, Step, StepKind, Transform};
use serde_json::json;

fn plain_schema() -> Schema {
    Schema::new(
        SchemaSpec::new()
            .node("doc", NodeSpec::default().content("paragraph+"))
            .node("paragraph", NodeSpec::default().content("text*"))
            .node("text", NodeSpec::default()),
    )
    .unwrap()
}

fn plain_doc(schema: &Schema, paragraphs: &[&str]) -> Node {
    let content: Vec<Node> = paragraphs
        .iter()
        .map(|t| {
            schema
                .node("paragraph", None, schema.text(t, vec![]).unwrap(), vec![])
                .unwrap()
        })
        .collect();
    schema.node("doc", None, content, vec![]).unwrap()
}

#[test]
fn test_apply() {
    let d1 = doc(p("Hello World!"));
    let step1 = AddMarkStep::new(1, 9, mark("strong"));
    let d2 = step1.apply(&d1).unwrap();
    assert_eq!(d2, doc(p((strong("Hello Wo"), "rld!"))));
}

#[test]
fn test_deserialize() {
    let schema = markdown_schema();
    let s1 = Step::from_json(
        schema,
        &json!({"stepType": "addMark", "mark": {"type": "em"}, "from": 61, "to": 648}),
    )
    .unwrap();
    assert_eq!(s1, Step::AddMark(AddMarkStep::new(61, 648, mark("em"))));

    let s2 = Step::from_json(
        schema,
        &json!({
            "stepType": "replace",
            "from": 986,
            "to": 986,
            "slice": {"content": [{"type": "text", "text": "!"}]}
        }),
    )
    .unwrap();
    assert_eq!(
        s2,
        Step::Replace(ReplaceStep::new(
            986,
            986,
            Slice::new(Fragment::from(text("!")), 0, 0),
            false
        ))
    );
}

#[test]
fn test_insert_and_invert() {
    let schema = plain_schema();
    let d = plain_doc(&schema, &["ab", "cd"]);

    let rp = d.resolve(2).unwrap();
    assert_eq!(rp.depth(), 1);
    assert_eq!(rp.parent(), d.child(0));
    assert_eq!(rp.text_offset(), 1);

    let x = Slice::new(Fragment::from(schema.text("X", vec![]).unwrap()), 0, 0);
    let at_start = ReplaceStep::new(1, 1, x.clone(), false).apply(&d).unwrap();
    assert_eq!(at_start, plain_doc(&schema, &["Xab", "cd"]));

    let step = ReplaceStep::new(2, 2, x, false);
    let changed = step.apply(&d).unwrap();
    assert_eq!(changed, plain_doc(&schema, &["aXb", "cd"]));

    let inverted = step.invert(&d).unwrap();
    assert_eq!(inverted.apply(&changed).unwrap(), d);
}

#[test]
fn test_merge_adjacent_inserts() {
    let slice = |t: &str| Slice::new(Fragment::from(marked(t, vec![mark("em")])), 0, 0);
    let a = Step::from(ReplaceStep::new(2, 4, slice("xy"), false));
    let b = Step::from(ReplaceStep::new(4, 6, slice("zw"), false));
    let merged = a.merge(&b).unwrap();
    assert_eq!(merged, Step::from(ReplaceStep::new(2, 6, slice("xyzw"), false)));

    // Steps only merge when the second starts where the first one's content ends
    let c = Step::from(ReplaceStep::new(5, 6, slice("q"), false));
    assert_eq!(a.merge(&c), None);
    // Different kinds never merge
    let d = Step::from(AddMarkStep::new(4, 6, mark("em")));
    assert_eq!(a.merge(&d), None);
}

#[test]
fn test_merged_step_applies_like_both() {
    let d = doc(p("abcdefg"));
    let a = ReplaceStep::new(2, 4, Slice::new(Fragment::from(text("XY")), 0, 0), false);
    let after_a = a.apply(&d).unwrap();
    let b = ReplaceStep::new(4, 6, Slice::new(Fragment::from(text("ZW")), 0, 0), false);
    let after_b = b.apply(&after_a).unwrap();
    let merged = a.merge(&b).unwrap();
    assert_eq!(merged.apply(&d).unwrap(), after_b);
    assert_eq!(after_b, doc(p("aXYZWfg")));
}

#[test]
fn test_transform_chain() {
    let mut tr = Transform::new(doc(p("hello world")));
    tr.insert(1, text(">"))
        .unwrap()
        .add_mark(8, 13, &mark("em"))
        .unwrap()
        .delete(2, 3)
        .unwrap();
    assert_eq!(tr.doc(), &doc(p((">ello ", em("world")))));
    assert_eq!(tr.steps().len(), 3);
    assert_eq!(tr.before(), &doc(p("hello world")));

    // Positions in the original document map through all steps
    let mapping = tr.mapping();
    assert_eq!(mapping.map(7, Assoc::Right), 7);
    assert_eq!(mapping.map(1, Assoc::Left), 1);
    assert_eq!(mapping.map(1, Assoc::Right), 2);
    assert!(mapping.map_result(2, Assoc::Left).deleted());
    let right = mapping.map_result(2, Assoc::Right);
    assert!(!right.deleted());
    assert!(right.deleted_before());

    // Undo by applying the inverted steps in reverse order
    let mut undo = Transform::new(tr.doc().clone());
    for (step, before) in tr.steps().iter().zip(tr.docs()).rev() {
        undo.step(step.invert(before).unwrap()).unwrap();
    }
    assert_eq!(undo.doc(), tr.before());
}
