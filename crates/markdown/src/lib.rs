//! # The markdown schema
//!
//! This crate provides the schema used by `prosemirror-markdown`, which mirrors the
//! node and mark kinds of CommonMark, along with typed views of its attributes and
//! some [helpers](helper) to write documents in that schema.
mod attrs;
pub mod helper;

pub use attrs::{
    BulletListAttrs, CodeBlockAttrs, HeadingAttrs, ImageAttrs, LinkAttrs, OrderedListAttrs,
    TypedAttrs,
};

use parchment_model::{AttributeSpec, MarkSpec, NodeSpec, Schema, SchemaSpec};
use serde_json::Value;
use std::sync::OnceLock;

/// The spec the [markdown schema](markdown_schema) is compiled from.
///
/// Use this as a starting point when a schema needs a few more node or mark types.
pub fn markdown_schema_spec() -> SchemaSpec {
    SchemaSpec::new()
        .node("doc", NodeSpec::default().content("block+"))
        .node(
            "paragraph",
            NodeSpec::default().content("inline*").group("block"),
        )
        .node(
            "blockquote",
            NodeSpec::default().content("block+").group("block"),
        )
        .node("horizontal_rule", NodeSpec::default().group("block"))
        .node(
            "heading",
            NodeSpec::default()
                .content("(text | image)*")
                .group("block")
                .defining()
                .attr("level", AttributeSpec::with_default(1)),
        )
        .node(
            "code_block",
            NodeSpec::default()
                .content("text*")
                .group("block")
                .marks("")
                .code()
                .defining()
                .attr("params", AttributeSpec::with_default("")),
        )
        .node(
            "ordered_list",
            NodeSpec::default()
                .content("list_item+")
                .group("block")
                .attr("order", AttributeSpec::with_default(1))
                .attr("tight", AttributeSpec::with_default(false)),
        )
        .node(
            "bullet_list",
            NodeSpec::default()
                .content("list_item+")
                .group("block")
                .attr("tight", AttributeSpec::with_default(false)),
        )
        .node(
            "list_item",
            NodeSpec::default().content("paragraph block*").defining(),
        )
        .node("text", NodeSpec::default().group("inline"))
        .node(
            "image",
            NodeSpec::default()
                .inline()
                .group("inline")
                .attr("src", AttributeSpec::required())
                .attr("alt", AttributeSpec::with_default(Value::Null))
                .attr("title", AttributeSpec::with_default(Value::Null)),
        )
        .node("hard_break", NodeSpec::default().inline().group("inline"))
        .mark("em", MarkSpec::default())
        .mark("strong", MarkSpec::default())
        .mark(
            "link",
            MarkSpec::default()
                .inclusive(false)
                .attr("href", AttributeSpec::required())
                .attr("title", AttributeSpec::with_default(Value::Null)),
        )
        .mark("code", MarkSpec::default())
}

/// The markdown schema, compiled once per process.
///
/// # Panics
///
/// Only if [`markdown_schema_spec`] does not compile, which the tests of this crate rule out.
pub fn markdown_schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        Schema::new(markdown_schema_spec()).expect("the markdown schema spec is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::{markdown_schema, HeadingAttrs, ImageAttrs, LinkAttrs, OrderedListAttrs};
    use crate::helper::{code_block, doc, em, h, img, link, ol, p};
    use parchment_model::{Fragment, Node, NodeError};
    use serde_json::json;

    #[test]
    fn test_schema_types() {
        let schema = markdown_schema();
        let names: Vec<_> = schema
            .node_types()
            .map(|t| t.name().to_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "doc",
                "paragraph",
                "blockquote",
                "horizontal_rule",
                "heading",
                "code_block",
                "ordered_list",
                "bullet_list",
                "list_item",
                "text",
                "image",
                "hard_break"
            ]
        );
        assert_eq!(schema.top_node_type().name(), "doc");
        let code_block = schema.node_type("code_block").unwrap();
        let em = schema.mark_type("em").unwrap();
        assert!(!code_block.allows_mark_type(&em));
        assert!(!schema.mark_type("link").unwrap().inclusive());
    }

    #[test]
    fn test_default_attrs() {
        let heading = markdown_schema()
            .node_type("heading")
            .unwrap()
            .create(None, Fragment::new(), vec![])
            .unwrap();
        assert_eq!(heading.attrs_as::<HeadingAttrs>().unwrap(), HeadingAttrs { level: 1 });
        let list = ol(p("a"));
        assert_eq!(
            list.attrs_as::<OrderedListAttrs>().unwrap(),
            OrderedListAttrs {
                order: 1,
                tight: false
            }
        );
    }

    #[test]
    fn test_image_requires_src() {
        let image = markdown_schema().node_type("image").unwrap();
        assert!(matches!(image.create(None, Fragment::new(), vec![]), Err(NodeError::Attr(_))));
        let attrs = img("cat.png").attrs_as::<ImageAttrs>().unwrap();
        assert_eq!(attrs.src, "cat.png");
        assert_eq!(attrs.alt, "");
    }

    #[test]
    fn test_from_json() {
        let json = json!({
            "type": "doc",
            "content": [
                {"type": "heading", "attrs": {"level": 2}, "content": [{"type": "text", "text": "Hi"}]},
                {"type": "code_block", "content": [{"type": "text", "text": "x"}]},
                {"type": "paragraph", "content": [
                    {"type": "text", "text": "a", "marks": [{"type": "link", "attrs": {"href": "b"}}]},
                    {"type": "text", "text": "c", "marks": [{"type": "em"}]}
                ]}
            ]
        });
        let node = Node::from_json(markdown_schema(), &json).unwrap();
        assert_eq!(
            node,
            doc((h(2, "Hi"), code_block("", "x"), p((link("b", "a"), em("c")))))
        );
        let href = node.child(2).child(0).marks()[0].attrs().clone();
        assert_eq!(href.get("href"), Some(&json!("b")));
        let link_attrs: LinkAttrs = serde_json::from_value(json!({"href": "b", "title": null})).unwrap();
        assert_eq!(link_attrs.title, "");
    }
}
