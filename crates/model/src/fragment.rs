use crate::{util, Index, Node, NodeError, Schema};
use displaydoc::Display;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::ops::RangeBounds;
use thiserror::Error;

/// Errors when looking up positions in a fragment
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, Error)]
pub enum IndexError {
    /// Position {pos} outside of fragment of size {size}
    OutOfRange {
        /// The position that was looked up
        pos: usize,
        /// The size of the fragment
        size: usize,
    },
}

/// A fragment represents a node's collection of child nodes.
///
/// Like nodes, fragments are persistent data structures, and you should not mutate them or their
/// content. Rather, you create new instances whenever needed. The API tries to make this easy.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    inner: Vec<Node>,
    size: usize,
}

impl Fragment {
    /// Create a new empty fragment
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fragment from an array of nodes, joining adjacent text nodes with the same
    /// marks.
    pub fn from_array(nodes: Vec<Node>) -> Self {
        let mut inner: Vec<Node> = Vec::with_capacity(nodes.len());
        let mut size = 0;
        for node in nodes {
            size += node.node_size();
            if let Some(last) = inner.last_mut() {
                if node.is_text() && node.same_markup(last) {
                    *last = last.with_text(join_text(last, &node));
                    continue;
                }
            }
            inner.push(node);
        }
        Fragment { inner, size }
    }

    /// The size of the fragment, which is the total of the size of its content nodes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get a slice to all child nodes
    pub fn children(&self) -> &[Node] {
        &self.inner[..]
    }

    /// The first child of the fragment wrapped in `Some`, or `None` if it is empty.
    pub fn first_child(&self) -> Option<&Node> {
        self.inner.first()
    }

    /// The last child of the fragment wrapped in `Some`, or `None` if it is empty.
    pub fn last_child(&self) -> Option<&Node> {
        self.inner.last()
    }

    /// The number of child nodes in this fragment.
    pub fn child_count(&self) -> usize {
        self.inner.len()
    }

    /// Get the child node at the given index. Panics when the index is out of range.
    pub fn child(&self, index: usize) -> &Node {
        &self.inner[index]
    }

    /// Get the child node at the given index, if it exists.
    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.inner.get(index)
    }

    /// Create a new fragment containing the combined content of this fragment and the other.
    pub fn append(mut self, mut other: Self) -> Self {
        if other.size == 0 {
            return self;
        }
        if self.size == 0 {
            return other;
        }
        if let (Some(last), Some(first)) = (self.inner.last_mut(), other.inner.first()) {
            if first.is_text() && first.same_markup(last) {
                *last = last.with_text(join_text(last, first));
                other.inner.remove(0);
            }
        }
        self.inner.append(&mut other.inner);
        self.size += other.size;
        self
    }

    /// Cut out the sub-fragment between the two given positions.
    pub fn cut<R: RangeBounds<usize>>(&self, range: R) -> Self {
        let from = util::from(&range);
        let to = util::to(&range, self.size);

        if from == 0 && to == self.size {
            return self.clone();
        }

        let mut result = vec![];
        let mut size = 0;
        if to > from {
            let mut pos = 0;
            let mut i = 0;
            while pos < to && i < self.inner.len() {
                let child = &self.inner[i];
                let end = pos + child.node_size();
                if end > from {
                    let new_child = if pos < from || end > to {
                        if child.is_text() {
                            child.cut(from.saturating_sub(pos)..usize::min(child.node_size(), to - pos))
                        } else {
                            let t = pos + 1;
                            child.cut(
                                from.saturating_sub(t)..usize::min(child.content().size(), to - t),
                            )
                        }
                    } else {
                        child.clone()
                    };
                    size += new_child.node_size();
                    result.push(new_child);
                }
                pos = end;
                i += 1;
            }
        }
        Fragment {
            inner: result,
            size,
        }
    }

    /// Cut out the children between the two given indices.
    pub fn cut_by_index<R: RangeBounds<usize>>(&self, range: R) -> Self {
        let from = util::from(&range);
        let to = util::to(&range, self.inner.len());
        if from == to {
            return Fragment::new();
        }
        if from == 0 && to == self.inner.len() {
            return self.clone();
        }
        Fragment::from(self.inner[from..to].to_vec())
    }

    /// Invoke a callback for all descendant nodes between the given two positions (relative to
    /// start of this fragment). Doesn't descend into a node when the callback returns `false`.
    ///
    /// The callback receives the node, its position, its parent (`None` for the children of
    /// this fragment unless `parent` is given) and its index in the parent.
    pub fn nodes_between<F>(
        &self,
        from: usize,
        to: usize,
        f: &mut F,
        node_start: usize,
        parent: Option<&Node>,
    ) where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        let mut pos = 0;
        for (i, child) in self.inner.iter().enumerate() {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from && f(child, node_start + pos, parent, i) && child.content().size() > 0 {
                let start = pos + 1;
                child.content().nodes_between(
                    from.saturating_sub(start),
                    usize::min(child.content().size(), to - start),
                    f,
                    node_start + start,
                    Some(child),
                )
            }
            pos = end;
        }
    }

    /// Call the given callback for every descendant node.
    pub fn descendants<F>(&self, f: &mut F)
    where
        F: FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    {
        self.nodes_between(0, self.size, f, 0, None)
    }

    /// Get all text between positions from and to. When `block_separator` is given, it will be
    /// inserted whenever a new block node is started. When `leaf_text` is given, it'll be inserted
    /// for every non-text leaf node encountered.
    pub fn text_between(
        &self,
        from: usize,
        to: usize,
        block_separator: Option<&str>,
        leaf_text: Option<&str>,
    ) -> String {
        let mut text = String::new();
        let mut first = true;
        self.nodes_between(
            from,
            to,
            &mut |node, pos, _, _| {
                let node_text = if let Some(t) = node.text() {
                    util::slice_utf16(t, from.saturating_sub(pos), to - pos)
                } else if !node.is_leaf() {
                    ""
                } else {
                    leaf_text.unwrap_or("")
                };
                if let Some(sep) = block_separator.filter(|s| !s.is_empty()) {
                    if (node.is_block() && node.is_leaf() && !node_text.is_empty())
                        || node.is_textblock()
                    {
                        if first {
                            first = false;
                        } else {
                            text.push_str(sep);
                        }
                    }
                }
                text.push_str(node_text);
                true
            },
            0,
            None,
        );
        text
    }

    /// Find the first position at which this fragment and another fragment differ, or `None`
    /// if they are the same.
    pub fn find_diff_start(&self, other: &Fragment, pos: usize) -> Option<usize> {
        let mut pos = pos;
        for i in 0.. {
            let (child_a, child_b) = match (self.maybe_child(i), other.maybe_child(i)) {
                (None, None) => return None,
                (Some(a), Some(b)) => (a, b),
                _ => return Some(pos),
            };
            if child_a == child_b {
                pos += child_a.node_size();
                continue;
            }
            if !child_a.same_markup(child_b) {
                return Some(pos);
            }
            if let (Some(a), Some(b)) = (child_a.text(), child_b.text()) {
                if a != b {
                    let common = a
                        .chars()
                        .zip(b.chars())
                        .take_while(|(x, y)| x == y)
                        .map(|(c, _)| c.len_utf16())
                        .sum::<usize>();
                    return Some(pos + common);
                }
            }
            if child_a.content().size() > 0 || child_b.content().size() > 0 {
                if let Some(inner) = child_a.content().find_diff_start(child_b.content(), pos + 1) {
                    return Some(inner);
                }
            }
            pos += child_a.node_size();
        }
        None
    }

    /// Create a new fragment in which the node at the given index is replaced by the given node.
    pub fn replace_child(&self, index: usize, node: Node) -> Fragment {
        let current = &self.inner[index];
        if *current == node {
            return self.clone();
        }
        let size = self.size + node.node_size() - current.node_size();
        let mut copy = self.inner.clone();
        copy[index] = node;
        Fragment { inner: copy, size }
    }

    /// Create a new fragment by prepending the given node to this fragment.
    pub fn add_to_start(&self, node: Node) -> Fragment {
        let mut inner = Vec::with_capacity(self.inner.len() + 1);
        inner.push(node);
        inner.extend_from_slice(&self.inner);
        Fragment::from(inner)
    }

    /// Create a new fragment by appending the given node to this fragment.
    pub fn add_to_end(&self, node: Node) -> Fragment {
        let mut inner = self.inner.clone();
        inner.push(node);
        Fragment::from(inner)
    }

    /// Find the index and inner offset corresponding to a given relative position in this
    /// fragment. With `round`, a position inside a child resolves to the index after it.
    pub fn find_index(&self, pos: usize, round: bool) -> Result<Index, IndexError> {
        match pos {
            0 => Ok(Index::new(0, pos)),
            p if p == self.size => Ok(Index::new(self.inner.len(), pos)),
            p if p > self.size => Err(IndexError::OutOfRange {
                pos,
                size: self.size,
            }),
            p => {
                let mut cur_pos = 0;
                for (i, cur) in self.inner.iter().enumerate() {
                    let end = cur_pos + cur.node_size();
                    if end >= p {
                        if end == p || round {
                            return Ok(Index::new(i + 1, end));
                        } else {
                            return Ok(Index::new(i, cur_pos));
                        }
                    }
                    cur_pos = end;
                }
                panic!("Invariant failed: self.size must be the sum of all node sizes")
            }
        }
    }

    /// Convert this fragment to its JSON representation, an array of nodes.
    pub fn to_json(&self) -> Value {
        Value::Array(self.inner.iter().map(Node::to_json).collect())
    }

    /// Deserialize a fragment from its JSON representation. `null` is the empty fragment.
    pub fn from_json(schema: &Schema, json: &Value) -> Result<Fragment, NodeError> {
        if json.is_null() {
            return Ok(Fragment::new());
        }
        let raw = Vec::<Value>::deserialize(json).map_err(|e| NodeError::InvalidJson(e.to_string()))?;
        let nodes = raw
            .iter()
            .map(|n| Node::from_json(schema, n))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Fragment::from(nodes))
    }

    pub(crate) fn fmt_inner(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, child) in self.inner.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            fmt::Display::fmt(child, f)?;
        }
        Ok(())
    }
}

fn join_text(a: &Node, b: &Node) -> String {
    let mut joined = String::from(a.text().unwrap_or_default());
    joined.push_str(b.text().unwrap_or_default());
    joined
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<")?;
        self.fmt_inner(f)?;
        f.write_str(">")
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Fragment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.inner.serialize(serializer)
    }
}

impl From<Vec<Node>> for Fragment {
    fn from(src: Vec<Node>) -> Fragment {
        Fragment::from_array(src)
    }
}

impl From<Node> for Fragment {
    fn from(node: Node) -> Fragment {
        Fragment {
            size: node.node_size(),
            inner: vec![node],
        }
    }
}

impl From<Fragment> for Vec<Node> {
    fn from(src: Fragment) -> Vec<Node> {
        src.inner
    }
}

impl<A, B> From<(A, B)> for Fragment
where
    A: Into<Node>,
    B: Into<Node>,
{
    fn from((a, b): (A, B)) -> Self {
        Self::from(vec![a.into(), b.into()])
    }
}

impl<A> From<(A,)> for Fragment
where
    A: Into<Node>,
{
    fn from((a,): (A,)) -> Self {
        Self::from(vec![a.into()])
    }
}
