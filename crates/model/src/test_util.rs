//! A small schema and node builders for the tests in this crate.
use crate::{AttributeSpec, Fragment, Mark, MarkSpec, Node, NodeSpec, Schema, SchemaSpec};
use serde_json::json;
use std::sync::OnceLock;

pub(crate) fn test_schema() -> Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            Schema::new(
                SchemaSpec::new()
                    .node("doc", NodeSpec::default().content("block+"))
                    .node(
                        "paragraph",
                        NodeSpec::default().content("inline*").group("block"),
                    )
                    .node(
                        "heading",
                        NodeSpec::default()
                            .content("inline*")
                            .group("block")
                            .defining()
                            .attr("level", AttributeSpec::with_default(1)),
                    )
                    .node(
                        "blockquote",
                        NodeSpec::default().content("block+").group("block"),
                    )
                    .node("text", NodeSpec::default().group("inline"))
                    .node(
                        "image",
                        NodeSpec::default()
                            .inline()
                            .group("inline")
                            .attr("src", AttributeSpec::required()),
                    )
                    .mark("em", MarkSpec::default())
                    .mark("strong", MarkSpec::default())
                    .mark("code", MarkSpec::default().excludes("_"))
                    .mark(
                        "link",
                        MarkSpec::default()
                            .inclusive(false)
                            .attr("href", AttributeSpec::required()),
                    ),
            )
            .unwrap()
        })
        .clone()
}

pub(crate) fn node(name: &str, content: Vec<Node>) -> Node {
    test_schema()
        .node(name, None, Fragment::from(content), vec![])
        .unwrap()
}

pub(crate) fn doc(content: Vec<Node>) -> Node {
    node("doc", content)
}

pub(crate) fn p(content: Vec<Node>) -> Node {
    node("paragraph", content)
}

pub(crate) fn blockquote(content: Vec<Node>) -> Node {
    node("blockquote", content)
}

pub(crate) fn text(text: &str) -> Node {
    test_schema().text(text, vec![]).unwrap()
}

pub(crate) fn marked(text: &str, marks: &[&str]) -> Node {
    let marks = marks.iter().map(|m| mark(m)).collect();
    test_schema().text(text, marks).unwrap()
}

pub(crate) fn mark(name: &str) -> Mark {
    let schema = test_schema();
    if name == "link" {
        let attrs = [("href".to_owned(), json!("foo"))].into_iter().collect();
        schema.mark(name, Some(&attrs)).unwrap()
    } else {
        schema.mark(name, None).unwrap()
    }
}

pub(crate) fn img() -> Node {
    let attrs = [("src".to_owned(), json!("img.png"))].into_iter().collect();
    test_schema()
        .node("image", Some(&attrs), Fragment::new(), vec![])
        .unwrap()
}
