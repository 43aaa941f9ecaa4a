//! # Helpers
//!
//! This module contains some functions to create nodes in the
//! [markdown schema](crate::markdown_schema) programmatically.
//!
//! ```
//! use parchment_markdown::helper::{doc, em, h1, p};
//!
//! let d = doc((h1("Title"), p(("some ", em("emphasized"), " text"))));
//! assert_eq!(d.child_count(), 2);
//! ```
//!
//! The builders are meant for tests and examples, so they panic instead of returning
//! errors when the described node can't be created.
//!
//! See also: <https://github.com/prosemirror/prosemirror-test-builder>
use crate::{markdown_schema, CodeBlockAttrs, HeadingAttrs, ImageAttrs, LinkAttrs, TypedAttrs};
use parchment_model::{Attrs, Fragment, Mark, Node};

/// Content that can be turned into a fragment for a builder.
pub trait IntoFragment {
    /// Build the fragment
    fn into_fragment(self) -> Fragment;
}

/// A single child in a tuple of builder content.
pub trait IntoNode {
    /// Build the node
    fn into_node(self) -> Node;
}

impl IntoNode for Node {
    fn into_node(self) -> Node {
        self
    }
}

impl IntoNode for &str {
    fn into_node(self) -> Node {
        text(self)
    }
}

impl IntoFragment for &str {
    fn into_fragment(self) -> Fragment {
        if self.is_empty() {
            Fragment::new()
        } else {
            Fragment::from(text(self))
        }
    }
}

impl IntoFragment for Node {
    fn into_fragment(self) -> Fragment {
        Fragment::from(self)
    }
}

impl IntoFragment for Vec<Node> {
    fn into_fragment(self) -> Fragment {
        Fragment::from(self)
    }
}

impl IntoFragment for Fragment {
    fn into_fragment(self) -> Fragment {
        self
    }
}

impl IntoFragment for () {
    fn into_fragment(self) -> Fragment {
        Fragment::new()
    }
}

macro_rules! tuple_into_fragment {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: IntoNode),+> IntoFragment for ($($name,)+) {
            fn into_fragment(self) -> Fragment {
                Fragment::from(vec![$(self.$idx.into_node()),+])
            }
        }
    };
}

tuple_into_fragment!(A 0);
tuple_into_fragment!(A 0, B 1);
tuple_into_fragment!(A 0, B 1, C 2);
tuple_into_fragment!(A 0, B 1, C 2, D 3);
tuple_into_fragment!(A 0, B 1, C 2, D 3, E 4);

fn typed<T: TypedAttrs, C: IntoFragment>(attrs: T, content: C) -> Node {
    node(T::TYPE_NAME, Some(&attrs.to_attrs()), content)
}

fn link_mark(attrs: LinkAttrs) -> Mark {
    match markdown_schema().mark(LinkAttrs::TYPE_NAME, Some(&attrs.to_attrs())) {
        Ok(mark) => mark,
        Err(e) => panic!("failed to build link: {}", e),
    }
}

/// Create a node of the type with the given name.
///
/// # Panics
///
/// If the type does not exist or the attributes are missing a required value.
pub fn node<C: IntoFragment>(name: &str, attrs: Option<&Attrs>, content: C) -> Node {
    match markdown_schema().node(name, attrs, content.into_fragment(), vec![]) {
        Ok(node) => node,
        Err(e) => panic!("failed to build {}: {}", name, e),
    }
}

/// Create a text node with the given marks.
///
/// # Panics
///
/// If `text` is empty.
pub fn marked(text: &str, marks: Vec<Mark>) -> Node {
    match markdown_schema().text(text, marks) {
        Ok(node) => node,
        Err(e) => panic!("failed to build text {:?}: {}", text, e),
    }
}

/// Create a plain text node. Panics if `text` is empty.
pub fn text(text: &str) -> Node {
    marked(text, vec![])
}

/// Create a mark of the type with the given name. Links point to `#`.
///
/// # Panics
///
/// If there is no such mark type.
pub fn mark(name: &str) -> Mark {
    if name == LinkAttrs::TYPE_NAME {
        return link_mark(LinkAttrs::new("#".to_owned()));
    }
    match markdown_schema().mark(name, None) {
        Ok(mark) => mark,
        Err(e) => panic!("failed to build mark {}: {}", name, e),
    }
}

/// Create a document node
pub fn doc<C: IntoFragment>(content: C) -> Node {
    node("doc", None, content)
}

/// Create a paragraph node
pub fn p<C: IntoFragment>(content: C) -> Node {
    node("paragraph", None, content)
}

/// Create a blockquote node
pub fn blockquote<C: IntoFragment>(content: C) -> Node {
    node("blockquote", None, content)
}

/// Create a heading node with the given level
pub fn h<C: IntoFragment>(level: u8, content: C) -> Node {
    typed(HeadingAttrs::new(level), content)
}

/// Create a heading node with level 1
pub fn h1<C: IntoFragment>(content: C) -> Node {
    h(1, content)
}

/// Create a heading node with level 2
pub fn h2<C: IntoFragment>(content: C) -> Node {
    h(2, content)
}

/// Create a code block with the given params and text
pub fn code_block(params: &str, content: &str) -> Node {
    typed(CodeBlockAttrs::new(params.to_owned()), content)
}

/// Create a bullet list node
pub fn ul<C: IntoFragment>(content: C) -> Node {
    node("bullet_list", None, content)
}

/// Create an ordered list node
pub fn ol<C: IntoFragment>(content: C) -> Node {
    node("ordered_list", None, content)
}

/// Create a list item node
pub fn li<C: IntoFragment>(content: C) -> Node {
    node("list_item", None, content)
}

/// Create a horizontal rule
pub fn hr() -> Node {
    node("horizontal_rule", None, ())
}

/// Create a hard break
pub fn br() -> Node {
    node("hard_break", None, ())
}

/// Create an image with the given source URL
pub fn img(src: &str) -> Node {
    typed(ImageAttrs::new(src.to_owned()), ())
}

/// Create an emphasized text node
pub fn em(text: &str) -> Node {
    marked(text, vec![mark("em")])
}

/// Create a strong text node
pub fn strong(text: &str) -> Node {
    marked(text, vec![mark("strong")])
}

/// Create an inline code text node
pub fn code(text: &str) -> Node {
    marked(text, vec![mark("code")])
}

/// Create a text node linking to `href`
///
/// # Panics
///
/// If `text` is empty.
pub fn link(href: &str, text: &str) -> Node {
    marked(text, vec![link_mark(LinkAttrs::new(href.to_owned()))])
}

#[cfg(test)]
mod tests {
    use super::{blockquote, br, code, doc, em, h2, hr, li, mark, marked, p, strong, ul};
    use crate::HeadingAttrs;

    #[test]
    fn test_builders() {
        let d = doc((
            h2("Title"),
            blockquote(p(("a", br(), strong("b")))),
            ul(li(p(code("c")))),
            hr(),
            p(""),
        ));
        assert_eq!(d.child_count(), 5);
        assert_eq!(d.child(0).attrs_as::<HeadingAttrs>().unwrap().level, 2);
        assert_eq!(d.child(4).content_size(), 0);
        assert!(d.check().is_ok());
        assert_eq!(
            d.to_string(),
            "doc(heading(\"Title\"), blockquote(paragraph(\"a\", hard_break, strong(\"b\"))), \
             bullet_list(list_item(paragraph(code(\"c\")))), horizontal_rule, paragraph)"
        );
    }

    #[test]
    fn test_adjacent_text_merges() {
        assert_eq!(p(("a", "b")), p("ab"));
        assert_eq!(p((em("a"), em("b"))), p(em("ab")));
        assert_ne!(p((em("a"), "b")), p("ab"));
    }

    #[test]
    fn test_mark_order() {
        let a = marked("x", vec![mark("strong"), mark("em")]);
        let b = marked("x", vec![mark("em"), mark("strong")]);
        assert_eq!(a, b);
        let names: Vec<_> = a.marks().iter().map(|m| m.r#type().name().to_owned()).collect();
        assert_eq!(names, vec!["em", "strong"]);
    }
}
