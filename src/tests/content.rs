use crate::markdown::{helper::p, markdown_schema, markdown_schema_spec};
use crate::model::{
    AttributeSpec, ContentExprError, Fragment, NodeSpec, Schema, SchemaError, SchemaSpec,
};

fn section_schema() -> Schema {
    Schema::new(
        SchemaSpec::new()
            .node("doc", NodeSpec::default().content("section+"))
            .node("section", NodeSpec::default().content("heading paragraph*"))
            .node("heading", NodeSpec::default().content("text*"))
            .node("paragraph", NodeSpec::default().content("text*"))
            .node("text", NodeSpec::default()),
    )
    .unwrap()
}

#[test]
fn test_required_heading() {
    let schema = section_schema();
    let heading = schema.node_type("heading").unwrap();
    let paragraph = schema.node_type("paragraph").unwrap();
    let start = schema.node_type("section").unwrap().content_match();
    assert!(!start.valid_end());
    assert!(start.match_type(&paragraph).is_none());

    let after = start.match_type(&heading).unwrap();
    assert!(after.valid_end());
    assert!(after.match_type(&paragraph).unwrap().valid_end());

    let fill = start.fill_before(&Fragment::new(), true, 0).unwrap();
    assert_eq!(fill.child_count(), 1);
    assert_eq!(fill.child(0), &heading.create_and_fill(None, Fragment::new(), vec![]).unwrap());
}

#[test]
fn test_create_and_fill() {
    let schema = section_schema();
    let doc = schema.top_node_type().create_and_fill(None, Fragment::new(), vec![]).unwrap();
    assert_eq!(doc.to_string(), "doc(section(heading))");
    assert!(doc.check().is_ok());

    // A paragraph gets the missing heading in front of it
    let para = schema.node("paragraph", None, Fragment::new(), vec![]).unwrap();
    let section = schema
        .node_type("section")
        .unwrap()
        .create_and_fill(None, para, vec![])
        .unwrap();
    assert_eq!(section.to_string(), "section(heading, paragraph)");
}

#[test]
fn test_fill_blocked_by_required_attrs() {
    let schema = Schema::new(
        SchemaSpec::new()
            .node("doc", NodeSpec::default().content("figure"))
            .node(
                "figure",
                NodeSpec::default().attr("src", AttributeSpec::required()),
            )
            .node("text", NodeSpec::default()),
    );
    // The figure can never be created without its attribute, so the expression dead-ends
    assert!(matches!(
        schema,
        Err(SchemaError::Content(ContentExprError::DeadEnd { .. }))
    ));
}

#[test]
fn test_schema_errors() {
    let spec = markdown_schema_spec().node("em", NodeSpec::default());
    assert_eq!(
        Schema::new(spec).unwrap_err(),
        SchemaError::DuplicateName("em".into())
    );

    let spec = markdown_schema_spec()
        .node("aside", NodeSpec::default().content("paragraph | text").group("block"));
    assert!(matches!(
        Schema::new(spec),
        Err(SchemaError::Content(ContentExprError::MixedContent(_)))
    ));

    let spec = markdown_schema_spec().node("aside", NodeSpec::default().content("(paragraph"));
    assert!(matches!(
        Schema::new(spec),
        Err(SchemaError::Content(ContentExprError::MissingParen(_)))
    ));
}

#[test]
fn test_list_wrapping() {
    let schema = markdown_schema();
    let list = schema.node_type("bullet_list").unwrap();
    let paragraph = schema.node_type("paragraph").unwrap();
    let list_item = schema.node_type("list_item").unwrap();
    assert_eq!(
        list.content_match().find_wrapping(&paragraph),
        Some(vec![list_item.clone()])
    );
    assert_eq!(list.content_match().default_type(), Some(list_item));
    assert!(list
        .content_match()
        .match_fragment(&Fragment::from(p("a")))
        .is_none());
}
