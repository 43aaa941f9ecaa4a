use crate::marks::RawMark;
use crate::replace::replace;
use crate::{
    util, AttrError, Attrs, ContentMatch, ContentMatchError, Fragment, Index, IndexError, Mark,
    MarkType, NodeType, ReplaceError, ResolveErr, ResolvedPos, Schema, Slice,
};
use displaydoc::Display;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::ops::RangeBounds;
use std::sync::Arc;
use thiserror::Error;

/// Errors when building or checking nodes
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum NodeError {
    /// Invalid attributes: {0}
    Attr(#[from] AttrError),
    /// Empty text nodes are not allowed
    EmptyText,
    /// NodeType.create can't construct text nodes
    CreateText,
    /// Invalid content for node {0}
    InvalidContent(NodeType),
    /// Invalid collection of marks for node {0}
    InvalidMarks(NodeType),
    /// Unknown node type: {0}
    UnknownNodeType(String),
    /// Unknown mark type: {0}
    UnknownMarkType(String),
    /// Invalid JSON input: {0}
    InvalidJson(String),
}

/// Error type raised by `Node::slice` when given an invalid replacement.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SliceError {
    /// Failed to resolve the start or end of the slice
    Resolve(#[from] ResolveErr),
    /// Removing non-flat range
    NonFlatRange,
    /// Position out of range: {0}
    Index(#[from] IndexError),
}

/// A string that stores its length in utf-16
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    len_utf16: usize,
    content: String,
}

impl Text {
    /// Return the contained string
    pub fn as_str(&self) -> &str {
        &self.content
    }

    /// The length of this string if it were encoded in utf-16
    pub fn len_utf16(&self) -> usize {
        self.len_utf16
    }
}

impl From<String> for Text {
    fn from(src: String) -> Text {
        Text {
            len_utf16: src.encode_utf16().count(),
            content: src,
        }
    }
}

impl From<&str> for Text {
    fn from(src: &str) -> Text {
        Text::from(src.to_owned())
    }
}

impl Serialize for Text {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.content.serialize(serializer)
    }
}

#[derive(PartialEq, Eq)]
struct NodeInner {
    r#type: NodeType,
    attrs: Attrs,
    content: Fragment,
    marks: Vec<Mark>,
    text: Option<Text>,
}

/// This struct represents a node in the tree that makes up a document. So a document is an
/// instance of Node, with children that are also instances of Node.
///
/// Nodes are persistent: they are never changed after creation, and cloning one only clones
/// a reference. Every update creates new nodes that share unchanged children with the old
/// ones.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

impl Node {
    pub(crate) fn new(r#type: NodeType, attrs: Attrs, content: Fragment, marks: Vec<Mark>) -> Node {
        Node(Arc::new(NodeInner {
            r#type,
            attrs,
            content,
            marks,
            text: None,
        }))
    }

    pub(crate) fn new_text(r#type: NodeType, text: Text, marks: Vec<Mark>) -> Node {
        Node(Arc::new(NodeInner {
            r#type,
            attrs: Attrs::new(),
            content: Fragment::new(),
            marks,
            text: Some(text),
        }))
    }

    /// True if both handles point to the same node allocation
    pub fn ptr_eq(a: &Node, b: &Node) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// The type of node that this is.
    pub fn r#type(&self) -> &NodeType {
        &self.0.r#type
    }

    /// An object mapping attribute names to values.
    pub fn attrs(&self) -> &Attrs {
        &self.0.attrs
    }

    /// A single attribute
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.0.attrs.get(name)
    }

    /// Deserialize the attributes into a typed struct
    pub fn attrs_as<T: DeserializeOwned>(&self) -> Result<T, NodeError> {
        let object: Map<String, Value> = self.attrs().clone().into_iter().collect();
        serde_json::from_value(Value::Object(object))
            .map_err(|e| NodeError::InvalidJson(e.to_string()))
    }

    /// A container holding the node's children.
    pub fn content(&self) -> &Fragment {
        &self.0.content
    }

    /// The marks (things like whether it is emphasized or part of a link) applied to this node.
    pub fn marks(&self) -> &[Mark] {
        &self.0.marks
    }

    /// For text nodes, this contains the node's text content.
    pub fn text(&self) -> Option<&str> {
        self.0.text.as_ref().map(Text::as_str)
    }

    /// The size of this node, as defined by the integer-based indexing scheme. For text nodes,
    /// this is the amount of characters. For other leaf nodes, it is one. For non-leaf nodes, it
    /// is the size of the content plus two (the start and end token).
    pub fn node_size(&self) -> usize {
        if let Some(text) = &self.0.text {
            text.len_utf16()
        } else if self.is_leaf() {
            1
        } else {
            self.0.content.size() + 2
        }
    }

    /// Represents `.content.size` in JS
    pub fn content_size(&self) -> usize {
        self.0.content.size()
    }

    /// The number of children that the node has.
    pub fn child_count(&self) -> usize {
        self.0.content.child_count()
    }

    /// Get the child node at the given index. Panics when the index is out of range.
    pub fn child(&self, index: usize) -> &Node {
        self.0.content.child(index)
    }

    /// Get the child node at the given index, if it exists.
    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.0.content.maybe_child(index)
    }

    /// Returns this node's first child, or `None` if there are no children.
    pub fn first_child(&self) -> Option<&Node> {
        self.0.content.first_child()
    }

    /// Returns this node's last child, or `None` if there are no children.
    pub fn last_child(&self) -> Option<&Node> {
        self.0.content.last_child()
    }

    /// True when this is a block (non-inline node)
    pub fn is_block(&self) -> bool {
        self.r#type().is_block()
    }

    /// True when this is an inline node (a text node or a node that can appear among text).
    pub fn is_inline(&self) -> bool {
        self.r#type().is_inline()
    }

    /// True when this is a textblock node, a block node with inline content.
    pub fn is_textblock(&self) -> bool {
        self.r#type().is_textblock()
    }

    /// True when this node allows inline content.
    pub fn inline_content(&self) -> bool {
        self.r#type().inline_content()
    }

    /// True when this is a text node.
    pub fn is_text(&self) -> bool {
        self.0.text.is_some()
    }

    /// True when this is a leaf node.
    pub fn is_leaf(&self) -> bool {
        self.r#type().is_leaf()
    }

    /// True when this is an atom, i.e. when it does not have directly editable content.
    pub fn is_atom(&self) -> bool {
        self.r#type().is_atom()
    }

    /// Compare the markup (type, attributes, and marks) of this node to those of another.
    pub fn same_markup(&self, other: &Node) -> bool {
        self.has_markup(other.r#type(), Some(other.attrs()), Some(other.marks()))
    }

    /// Check whether this node's markup correspond to the given type, attributes, and marks.
    pub fn has_markup(&self, r#type: &NodeType, attrs: Option<&Attrs>, marks: Option<&[Mark]>) -> bool {
        if self.r#type() != r#type {
            return false;
        }
        let attrs_match = match attrs {
            Some(attrs) => attrs == self.attrs(),
            None => match r#type.compute_attrs(None) {
                Ok(defaults) => &defaults == self.attrs(),
                Err(_) => false,
            },
        };
        attrs_match && Mark::same_set(self.marks(), marks.unwrap_or(&[]))
    }

    /// Create a new node with the same markup as this node, containing the given content (or
    /// empty, if no content is given).
    pub fn copy<F>(&self, map: F) -> Node
    where
        F: FnOnce(&Fragment) -> Fragment,
    {
        let content = map(self.content());
        if content == *self.content() {
            return self.clone();
        }
        Node(Arc::new(NodeInner {
            r#type: self.0.r#type.clone(),
            attrs: self.0.attrs.clone(),
            content,
            marks: self.0.marks.clone(),
            text: self.0.text.clone(),
        }))
    }

    /// Create a copy of this node, with the given set of marks instead of the node's own marks.
    pub fn mark(&self, marks: Vec<Mark>) -> Node {
        if marks == self.0.marks {
            return self.clone();
        }
        Node(Arc::new(NodeInner {
            r#type: self.0.r#type.clone(),
            attrs: self.0.attrs.clone(),
            content: self.0.content.clone(),
            marks,
            text: self.0.text.clone(),
        }))
    }

    /// Create a text node with the same marks as this one, but with the given text. Returns
    /// a clone of `self` for nodes that are not text nodes.
    pub fn with_text(&self, text: String) -> Node {
        match &self.0.text {
            Some(current) if current.as_str() == text => self.clone(),
            Some(_) => Node::new_text(self.0.r#type.clone(), Text::from(text), self.0.marks.clone()),
            None => self.clone(),
        }
    }

    /// Create a copy of this node with only the content between the given positions.
    pub fn cut<R: RangeBounds<usize>>(&self, range: R) -> Node {
        let from = util::from(&range);
        if let Some(text) = &self.0.text {
            let len = text.len_utf16();
            let to = util::to(&range, len);
            if from == 0 && to == len {
                return self.clone();
            }
            self.with_text(util::slice_utf16(text.as_str(), from, to).to_owned())
        } else {
            let size = self.content_size();
            let to = util::to(&range, size);
            if from == 0 && to == size {
                return self.clone();
            }
            self.copy(|c| c.cut(from..to))
        }
    }

    /// Cut out the part of the document between the given positions, and return it as a
    /// `Slice` object.
    pub fn slice<R: RangeBounds<usize>>(
        &self,
        range: R,
        include_parents: bool,
    ) -> Result<Slice, SliceError> {
        let from = util::from(&range);
        let to = util::to(&range, self.content_size());

        if from == to {
            return Ok(Slice::default());
        }

        let rp_from = self.resolve(from)?;
        let rp_to = self.resolve(to)?;
        let depth = if include_parents {
            0
        } else {
            rp_from.shared_depth(to)
        };
        let start = rp_from.start(depth);
        let node = rp_from.node(depth);
        let content = node.content().cut((rp_from.pos - start)..(rp_to.pos - start));
        Ok(Slice::new(
            content,
            rp_from.depth - depth,
            rp_to.depth - depth,
        ))
    }

    /// Replace the part of the document between the given positions with the given slice.
    /// The slice must 'fit', meaning its open sides must be able to connect to the surrounding
    /// content, and its content nodes must be valid children for the node they are placed
    /// into. If any of this is violated, an error of type `ReplaceError` is returned.
    pub fn replace<R: RangeBounds<usize>>(&self, range: R, slice: &Slice) -> Result<Node, ReplaceError> {
        let from = util::from(&range);
        let to = util::to(&range, self.content_size());
        let rp_from = self.resolve(from)?;
        let rp_to = self.resolve(to)?;
        replace(&rp_from, &rp_to, slice)
    }

    /// Find the node directly after the given position.
    pub fn node_at(&self, mut pos: usize) -> Option<Node> {
        let mut node = self.clone();
        loop {
            let Index { index, offset } = node.content().find_index(pos, false).ok()?;
            let child = node.maybe_child(index)?.clone();
            if offset == pos || child.is_text() {
                return Some(child);
            }
            pos -= offset + 1;
            node = child;
        }
    }

    /// Find the (direct) child node after the given offset, if any, and return it along
    /// with its index and offset relative to this node.
    pub fn child_after(&self, pos: usize) -> Result<(Option<&Node>, Index), IndexError> {
        let index = self.content().find_index(pos, false)?;
        Ok((self.maybe_child(index.index), index))
    }

    /// Find the (direct) child node before the given offset, if any, and return it along
    /// with its index and offset relative to this node.
    pub fn child_before(&self, pos: usize) -> Result<(Option<&Node>, Index), IndexError> {
        if pos == 0 {
            return Ok((None, Index::new(0, 0)));
        }
        let Index { index, offset } = self.content().find_index(pos, false)?;
        if offset < pos {
            return Ok((Some(self.child(index)), Index::new(index, offset)));
        }
        let node = self.child(index - 1);
        Ok((Some(node), Index::new(index - 1, offset - node.node_size())))
    }

    /// Invoke a callback for all descendant nodes recursively between the given two positions
    /// that are relative to start of this node's content. The callback is invoked with the
    /// node, its position relative to the original node (method receiver), its parent node,
    /// and its child index. When the callback returns false for a given node, that node's
    /// children will not be recursed over.
    pub fn nodes_between<F>(&self, from: usize, to: usize, f: &mut F)
    where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        self.content().nodes_between(from, to, f, 0, Some(self))
    }

    /// Call the given callback for every descendant node.
    pub fn descendants<F>(&self, f: &mut F)
    where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        self.nodes_between(0, self.content_size(), f)
    }

    /// Concatenates all the text nodes found in this fragment and its children.
    pub fn text_content(&self) -> String {
        match self.text() {
            Some(text) => text.to_owned(),
            None => self.text_between(0, self.content_size(), None, None),
        }
    }

    /// Get all text between positions `from` and `to`. When `block_separator` is given, it
    /// will be inserted to separate text from different block nodes. When `leaf_text` is
    /// given, it'll be inserted for every non-text leaf node encountered.
    pub fn text_between(
        &self,
        from: usize,
        to: usize,
        block_separator: Option<&str>,
        leaf_text: Option<&str>,
    ) -> String {
        self.content()
            .text_between(from, to, block_separator, leaf_text)
    }

    /// Resolve the given position in the document, returning a struct with information about its
    /// context. Recent results are cached per thread.
    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos, ResolveErr> {
        ResolvedPos::resolve_cached(self, pos)
    }

    /// Resolve the given position without consulting or filling the cache.
    pub fn resolve_no_cache(&self, pos: usize) -> Result<ResolvedPos, ResolveErr> {
        ResolvedPos::resolve(self, pos)
    }

    /// Test whether a given mark or mark type occurs in this document between the two given
    /// positions.
    pub fn range_has_mark(&self, from: usize, to: usize, mark_type: &MarkType) -> bool {
        let mut found = false;
        if to > from {
            self.nodes_between(from, to, &mut |node, _, _, _| {
                if mark_type.is_in_set(node.marks()).is_some() {
                    found = true;
                }
                !found
            });
        }
        found
    }

    /// Get the content match in this node at the given index.
    pub fn content_match_at(&self, index: usize) -> Result<ContentMatch, ContentMatchError> {
        self.r#type()
            .content_match()
            .match_fragment_range(self.content(), 0..index)
            .ok_or(ContentMatchError::InvalidContent)
    }

    /// Test whether replacing the range between `from` and `to` (by child index) with the
    /// given replacement fragment (which defaults to the empty fragment) would leave the
    /// node's content valid. You can optionally pass `range` to only use part of the
    /// fragment.
    pub fn can_replace<R: RangeBounds<usize>>(
        &self,
        from: usize,
        to: usize,
        replacement: Option<&Fragment>,
        range: R,
    ) -> bool {
        let empty = Fragment::new();
        let replacement = replacement.unwrap_or(&empty);
        let start = util::from(&range);
        let end = util::to(&range, replacement.child_count()).min(replacement.child_count());

        let one = match self.content_match_at(from) {
            Ok(m) => m.match_fragment_range(replacement, start..end),
            Err(_) => return false,
        };
        let two = one.and_then(|m| m.match_fragment_range(self.content(), to..));
        match two {
            Some(m) if m.valid_end() => {}
            _ => return false,
        }
        replacement.children()[start.min(end)..end]
            .iter()
            .all(|child| self.r#type().allows_marks(child.marks()))
    }

    /// Test whether replacing the range `from` to `to` (by index) with a node of the given
    /// type would leave the node's content valid.
    pub fn can_replace_with(
        &self,
        from: usize,
        to: usize,
        r#type: &NodeType,
        marks: Option<&[Mark]>,
    ) -> bool {
        if let Some(marks) = marks {
            if !self.r#type().allows_marks(marks) {
                return false;
            }
        }
        let start = match self.content_match_at(from) {
            Ok(m) => m.match_type(r#type),
            Err(_) => return false,
        };
        let end = start.and_then(|m| m.match_fragment_range(self.content(), to..));
        matches!(end, Some(m) if m.valid_end())
    }

    /// Test whether the given node's content could be appended to this node. If that node is
    /// empty, this will only return true if there is at least one node type that can appear in
    /// both nodes (to avoid merging completely incompatible nodes).
    pub fn can_append(&self, other: &Node) -> bool {
        if other.content_size() > 0 {
            self.can_replace(self.child_count(), self.child_count(), Some(other.content()), ..)
        } else {
            self.r#type().compatible_content(other.r#type())
        }
    }

    /// Check whether this node and its descendants conform to the schema, and return an
    /// error when they do not.
    pub fn check(&self) -> Result<(), NodeError> {
        self.r#type().check_content(self.content())?;
        let mut copy: Vec<Mark> = Vec::new();
        for mark in self.marks() {
            copy = mark.add_to_set(&copy);
        }
        if !Mark::same_set(&copy, self.marks()) {
            return Err(NodeError::InvalidMarks(self.r#type().clone()));
        }
        for child in self.content().children() {
            child.check()?;
        }
        Ok(())
    }

    /// Return a JSON-serializeable representation of this node.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".into(), Value::from(self.r#type().name()));
        if !self.attrs().is_empty() {
            obj.insert(
                "attrs".into(),
                Value::Object(self.attrs().clone().into_iter().collect()),
            );
        }
        if self.content_size() > 0 {
            obj.insert("content".into(), self.content().to_json());
        }
        if !self.marks().is_empty() {
            obj.insert(
                "marks".into(),
                Value::Array(self.marks().iter().map(Mark::to_json).collect()),
            );
        }
        if let Some(text) = self.text() {
            obj.insert("text".into(), Value::from(text));
        }
        Value::Object(obj)
    }

    /// Deserialize a node from its JSON representation.
    pub fn from_json(schema: &Schema, json: &Value) -> Result<Node, NodeError> {
        let raw = RawNode::deserialize(json).map_err(|e| NodeError::InvalidJson(e.to_string()))?;
        raw.build(schema)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || *self.0 == *other.0
    }
}

impl Eq for Node {}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for mark in self.marks() {
            write!(f, "{}(", mark.r#type().name())?;
        }
        if let Some(text) = self.text() {
            write!(f, "{:?}", text)?;
        } else {
            f.write_str(self.r#type().name())?;
            if self.content_size() > 0 {
                f.write_str("(")?;
                self.content().fmt_inner(f)?;
                f.write_str(")")?;
            }
        }
        for _ in self.marks() {
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Deserialize)]
struct RawNode {
    #[serde(rename = "type")]
    r#type: String,
    #[serde(default)]
    attrs: Option<Attrs>,
    #[serde(default)]
    content: Vec<RawNode>,
    #[serde(default)]
    marks: Vec<RawMark>,
    #[serde(default)]
    text: Option<String>,
}

impl RawNode {
    fn build(self, schema: &Schema) -> Result<Node, NodeError> {
        let marks = self
            .marks
            .into_iter()
            .map(|m| m.build(schema))
            .collect::<Result<Vec<_>, _>>()?;
        if self.r#type == "text" {
            let text = self
                .text
                .ok_or_else(|| NodeError::InvalidJson("text node without text".into()))?;
            return schema.text(&text, marks);
        }
        let r#type = schema
            .node_type(&self.r#type)
            .ok_or(NodeError::UnknownNodeType(self.r#type))?;
        let content = self
            .content
            .into_iter()
            .map(|c| c.build(schema))
            .collect::<Result<Vec<_>, _>>()?;
        r#type.create(self.attrs.as_ref(), Fragment::from(content), marks)
    }
}
