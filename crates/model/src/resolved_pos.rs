use crate::{IndexError, Mark, MarkSet, Node};
use derivative::Derivative;
use derive_new::new;
use displaydoc::Display;
use std::cell::RefCell;
use std::fmt;
use thiserror::Error;

/// Errors at `resolve`
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, Error)]
pub enum ResolveErr {
    /// Position {pos} out of range
    RangeError {
        /// The position that was out of range
        pos: usize,
    },
    /// Index error
    Index(#[from] IndexError),
}

/// The index of a child and the offset at which it starts
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, new)]
pub struct Index {
    /// Index into the parent's children
    pub index: usize,
    /// Offset of the child (or of the end) relative to the parent's content
    pub offset: usize,
}

#[derive(Clone, PartialEq, Eq, new)]
/// A node in the resolution path
pub struct ResolvedNode {
    /// The node
    pub node: Node,
    /// Index of the in the parent fragment
    pub index: usize,
    /// Offset immediately before the node
    pub before: usize,
}

impl fmt::Debug for ResolvedNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedNode")
            .field("node.type", &self.node.r#type())
            .field("index", &self.index)
            .field("before", &self.before)
            .finish()
    }
}

/// You can resolve a position to get more information about it. Objects of this class represent
/// such a resolved position, providing various pieces of context information, and some helper
/// methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPos {
    pub(crate) pos: usize,
    path: Vec<ResolvedNode>,
    pub(crate) parent_offset: usize,
    pub(crate) depth: usize,
}

impl ResolvedPos {
    pub(crate) fn new(pos: usize, path: Vec<ResolvedNode>, parent_offset: usize) -> Self {
        Self {
            depth: path.len() - 1,
            pos,
            path,
            parent_offset,
        }
    }

    /// The position that was resolved.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The number of levels the parent node is from the root. If this position points directly
    /// into the root node, it is 0. If it points into a top-level paragraph, 1, and so on.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The offset this position has into its parent node.
    pub fn parent_offset(&self) -> usize {
        self.parent_offset
    }

    /// The parent node that the position points into. Note that even if
    /// a position points into a text node, that node is not considered
    /// the parent; text nodes are ‘flat’ in this model, and have no content.
    pub fn parent(&self) -> &Node {
        self.node(self.depth)
    }

    /// The root node in which the position was resolved.
    pub fn doc(&self) -> &Node {
        self.node(0)
    }

    /// The ancestor node at the given level. `p.node(p.depth)` is the same as `p.parent()`.
    pub fn node(&self, depth: usize) -> &Node {
        &self.path[depth].node
    }

    /// The index into the ancestor at the given level. If this points at the 3rd node in the
    /// 2nd paragraph on the top level, for example, `p.index(0)` is 1 and `p.index(1)` is 2.
    pub fn index(&self, depth: usize) -> usize {
        self.path[depth].index
    }

    /// The index pointing after this position into the ancestor at the given level.
    pub fn index_after(&self, depth: usize) -> usize {
        let index = self.index(depth);
        if depth == self.depth && self.text_offset() == 0 {
            index
        } else {
            index + 1
        }
    }

    /// The (absolute) position at the start of the node at the given level.
    pub fn start(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.path[depth - 1].before + 1
        }
    }

    /// The (absolute) position at the end of the node at the given level.
    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// The (absolute) position directly before the wrapping node at the given level, or, when
    /// depth is `self.depth + 1`, the original position.
    ///
    /// Panics at depth 0, since there is no position before the top-level node.
    pub fn before(&self, depth: usize) -> usize {
        assert!(depth > 0, "There is no position before the top-level node");
        if depth == self.depth + 1 {
            self.pos
        } else {
            self.path[depth - 1].before
        }
    }

    /// The (absolute) position directly after the wrapping node at the given level, or the
    /// original position when depth is `self.depth + 1`.
    ///
    /// Panics at depth 0, since there is no position after the top-level node.
    pub fn after(&self, depth: usize) -> usize {
        assert!(depth > 0, "There is no position after the top-level node");
        if depth == self.depth + 1 {
            self.pos
        } else {
            self.path[depth - 1].before + self.path[depth].node.node_size()
        }
    }

    /// When this position points into a text node, this returns the
    /// distance between the position and the start of the text node.
    /// Will be zero for positions that point between nodes.
    pub fn text_offset(&self) -> usize {
        self.pos - self.path[self.depth].before
    }

    /// Get the node directly before the position, if any. If the position points into a text node,
    /// only the part of that node before the position is returned.
    pub fn node_before(&self) -> Option<Node> {
        let index = self.index(self.depth);
        let d_off = self.text_offset();
        if d_off > 0 {
            Some(self.parent().child(index).cut(0..d_off))
        } else if index == 0 {
            None
        } else {
            Some(self.parent().child(index - 1).clone())
        }
    }

    /// Get the node directly after the position, if any. If the position points into a text node,
    /// only the part of that node after the position is returned.
    pub fn node_after(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth);
        let child = parent.maybe_child(index)?;
        let d_off = self.text_offset();
        if d_off > 0 {
            Some(child.cut(d_off..))
        } else {
            Some(child.clone())
        }
    }

    /// Get the position at the given index in the parent node at the given depth (which
    /// defaults to `self.depth`).
    pub fn pos_at_index(&self, index: usize, depth: Option<usize>) -> usize {
        let depth = depth.unwrap_or(self.depth);
        let node = self.node(depth);
        let mut pos = self.start(depth);
        for child in &node.content().children()[..index] {
            pos += child.node_size();
        }
        pos
    }

    /// Get the marks at this position, factoring in the surrounding marks' `inclusive`
    /// property. If the position is at the start of a non-empty node, the marks of the node
    /// after it (if any) are returned.
    pub fn marks(&self) -> MarkSet {
        let parent = self.parent();
        let index = self.index(self.depth);

        // In an empty parent, return the empty array
        if parent.content_size() == 0 {
            return Vec::new();
        }

        // When inside a text node, just return the text node's marks
        if self.text_offset() > 0 {
            return parent.child(index).marks().to_vec();
        }

        let before = index.checked_sub(1).and_then(|i| parent.maybe_child(i));
        let after = parent.maybe_child(index);
        let (main, other) = match (before, after) {
            (Some(before), after) => (before, after),
            (None, Some(after)) => (after, None),
            (None, None) => return Vec::new(),
        };

        main.marks()
            .iter()
            .filter(|m| m.r#type().inclusive() || other.map_or(false, |o| m.is_in_set(o.marks())))
            .cloned()
            .collect()
    }

    /// Get the marks after the current position, if any, except those that are non-inclusive
    /// and not present at position `end`. This is mostly useful for getting the set of marks
    /// to preserve after a deletion. Will return `None` if this position is at the end of its
    /// parent node or its parent node isn't a textblock.
    pub fn marks_across(&self, end: &ResolvedPos) -> Option<MarkSet> {
        let after = self.parent().maybe_child(self.index(self.depth))?;
        if !after.is_inline() {
            return None;
        }
        let next = end.parent().maybe_child(end.index(end.depth));
        let marks: Vec<Mark> = after
            .marks()
            .iter()
            .filter(|m| m.r#type().inclusive() || next.map_or(false, |n| m.is_in_set(n.marks())))
            .cloned()
            .collect();
        Some(marks)
    }

    /// The depth up to which this position and the given (non-resolved)
    /// position share the same parent nodes.
    pub fn shared_depth(&self, pos: usize) -> usize {
        for depth in (1..=self.depth).rev() {
            if self.start(depth) <= pos && self.end(depth) >= pos {
                return depth;
            }
        }
        0
    }

    /// Returns a range based on the place where this position and the given position
    /// diverge around block content. If both point into the same textblock, for example, a
    /// range around that textblock will be returned. If they point into different blocks,
    /// the range around those blocks in their shared ancestor is returned. You can pass in
    /// an optional predicate that will be called with a parent node to see if a range into
    /// that parent is acceptable.
    pub fn block_range(
        &self,
        other: &ResolvedPos,
        pred: Option<&dyn Fn(&Node) -> bool>,
    ) -> Option<NodeRange> {
        if other.pos < self.pos {
            return other.block_range(self, pred);
        }
        let sub = if self.parent().inline_content() || self.pos == other.pos {
            1
        } else {
            0
        };
        let top = self.depth.checked_sub(sub)?;
        for d in (0..=top).rev() {
            if other.pos <= self.end(d) && pred.map_or(true, |p| p(self.node(d))) {
                return Some(NodeRange::new(self.clone(), other.clone(), d));
            }
        }
        None
    }

    /// Query whether the given position shares the same parent node.
    pub fn same_parent(&self, other: &ResolvedPos) -> bool {
        self.pos - self.parent_offset == other.pos - other.parent_offset
    }

    /// Return the greater of this and the given position.
    pub fn max<'b>(&'b self, other: &'b ResolvedPos) -> &'b ResolvedPos {
        if other.pos > self.pos {
            other
        } else {
            self
        }
    }

    /// Return the smaller of this and the given position.
    pub fn min<'b>(&'b self, other: &'b ResolvedPos) -> &'b ResolvedPos {
        if other.pos < self.pos {
            other
        } else {
            self
        }
    }

    pub(crate) fn resolve(doc: &Node, pos: usize) -> Result<Self, ResolveErr> {
        if pos > doc.content_size() {
            return Err(ResolveErr::RangeError { pos });
        }
        let mut path = vec![];
        let mut start = 0;
        let mut parent_offset = pos;
        let mut node = doc.clone();

        loop {
            let Index { index, offset } = node.content().find_index(parent_offset, false)?;
            let rem = parent_offset - offset;
            let next = node.maybe_child(index).cloned();
            path.push(ResolvedNode::new(node, index, start + offset));
            if rem == 0 {
                break;
            }
            node = match next {
                Some(child) if !child.is_text() => child,
                _ => break,
            };
            parent_offset = rem - 1;
            start += offset + 1;
        }
        Ok(ResolvedPos::new(pos, path, parent_offset))
    }

    pub(crate) fn resolve_cached(doc: &Node, pos: usize) -> Result<Self, ResolveErr> {
        if let Some(hit) = RESOLVE_CACHE.with(|cache| cache.borrow().get(doc, pos)) {
            return Ok(hit);
        }
        let result = ResolvedPos::resolve(doc, pos)?;
        RESOLVE_CACHE.with(|cache| cache.borrow_mut().insert(result.clone()));
        Ok(result)
    }
}

impl fmt::Display for ResolvedPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in 1..=self.depth {
            if d > 1 {
                f.write_str("/")?;
            }
            write!(f, "{}_{}", self.node(d).r#type().name(), self.index(d - 1))?;
        }
        write!(f, ":{}", self.parent_offset)
    }
}

/// Represents a flat range of content, i.e. one that starts and ends in the same node.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct NodeRange {
    /// A resolved position along the start of the content. May have a `depth` greater than
    /// this object's `depth` property, since these are the positions that were used to
    /// compute the range, not re-resolved positions directly at its boundaries.
    pub from: ResolvedPos,
    /// A position along the end of the content.
    pub to: ResolvedPos,
    /// The depth of the node that this range points into.
    pub depth: usize,
}

impl NodeRange {
    /// The position at the start of the range.
    pub fn start(&self) -> usize {
        self.from.before(self.depth + 1)
    }

    /// The position at the end of the range.
    pub fn end(&self) -> usize {
        self.to.after(self.depth + 1)
    }

    /// The parent node that the range points into.
    pub fn parent(&self) -> &Node {
        self.from.node(self.depth)
    }

    /// The start index of the range in the parent node.
    pub fn start_index(&self) -> usize {
        self.from.index(self.depth)
    }

    /// The end index of the range in the parent node.
    pub fn end_index(&self) -> usize {
        self.to.index_after(self.depth)
    }
}

const DEFAULT_CACHE_SIZE: usize = 12;

#[derive(Derivative)]
#[derivative(Debug)]
struct ResolveCache {
    #[derivative(Debug = "ignore")]
    entries: Vec<ResolvedPos>,
    next: usize,
    capacity: usize,
}

impl ResolveCache {
    fn get(&self, doc: &Node, pos: usize) -> Option<ResolvedPos> {
        self.entries
            .iter()
            .find(|rp| rp.pos == pos && Node::ptr_eq(rp.doc(), doc))
            .cloned()
    }

    fn insert(&mut self, rp: ResolvedPos) {
        if self.capacity == 0 {
            return;
        }
        if self.next < self.entries.len() {
            self.entries[self.next] = rp;
        } else {
            self.entries.push(rp);
        }
        self.next = (self.next + 1) % self.capacity;
    }

    fn resize(&mut self, capacity: usize) {
        self.entries.truncate(capacity);
        self.capacity = capacity;
        self.next = if capacity == 0 {
            0
        } else {
            self.entries.len() % capacity
        };
    }
}

thread_local! {
    static RESOLVE_CACHE: RefCell<ResolveCache> = RefCell::new(ResolveCache {
        entries: Vec::new(),
        next: 0,
        capacity: DEFAULT_CACHE_SIZE,
    });
}

/// Set the number of recently resolved positions that are kept per thread. A size of 0
/// disables the cache.
pub fn set_resolve_cache_size(size: usize) {
    RESOLVE_CACHE.with(|cache| cache.borrow_mut().resize(size))
}

/// Forget all cached resolved positions of the current thread.
pub fn clear_resolve_cache() {
    RESOLVE_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        cache.entries.clear();
        cache.next = 0;
    })
}

#[cfg(test)]
mod tests {
    use super::{clear_resolve_cache, set_resolve_cache_size, ResolveErr};
    use crate::test_util::{blockquote, doc, img, marked, p, text};
    use crate::Node;

    fn test_doc() -> Node {
        doc(vec![
            p(vec![text("ab")]),
            blockquote(vec![p(vec![marked("cd", &["em"]), text("ef")])]),
        ])
    }

    #[test]
    fn test_resolve_paths() {
        let d = test_doc();
        // (depth, parent_offset, start(depth), end(depth), node_before, node_after)
        let expected: [(usize, usize, usize, usize, Option<&str>, Option<&str>); 13] = [
            (0, 0, 0, 12, None, Some("paragraph")),
            (1, 0, 1, 3, None, Some("ab")),
            (1, 1, 1, 3, Some("a"), Some("b")),
            (1, 2, 1, 3, Some("ab"), None),
            (0, 4, 0, 12, Some("paragraph"), Some("blockquote")),
            (1, 0, 5, 11, None, Some("paragraph")),
            (2, 0, 6, 10, None, Some("cd")),
            (2, 1, 6, 10, Some("c"), Some("d")),
            (2, 2, 6, 10, Some("cd"), Some("ef")),
            (2, 3, 6, 10, Some("e"), Some("f")),
            (2, 4, 6, 10, Some("ef"), None),
            (1, 6, 5, 11, Some("paragraph"), None),
            (0, 12, 0, 12, Some("blockquote"), None),
        ];
        for (pos, (depth, offset, start, end, before, after)) in expected.iter().enumerate() {
            let rp = d.resolve(pos).unwrap();
            assert_eq!(rp.depth(), *depth, "depth at {}", pos);
            assert_eq!(rp.parent_offset(), *offset, "offset at {}", pos);
            assert_eq!(rp.start(rp.depth()), *start, "start at {}", pos);
            assert_eq!(rp.end(rp.depth()), *end, "end at {}", pos);
            let describe = |n: Option<Node>| {
                n.map(|n| match n.text() {
                    Some(t) => t.to_owned(),
                    None => n.r#type().name().to_owned(),
                })
            };
            assert_eq!(describe(rp.node_before()).as_deref(), *before, "before at {}", pos);
            assert_eq!(describe(rp.node_after()).as_deref(), *after, "after at {}", pos);
        }
        assert_eq!(d.resolve(13), Err(ResolveErr::RangeError { pos: 13 }));
    }

    #[test]
    fn test_text_offset_and_depths() {
        let d = test_doc();
        let rp = d.resolve(2).unwrap();
        assert_eq!(rp.text_offset(), 1);
        assert_eq!(rp.before(1), 0);
        assert_eq!(rp.after(1), 4);
        assert_eq!(rp.before(2), 2);
        assert_eq!(rp.index(0), 0);
        assert_eq!(rp.index_after(1), 1);

        let rp = d.resolve(8).unwrap();
        assert_eq!(rp.shared_depth(7), 2);
        assert_eq!(rp.shared_depth(3), 0);
        assert_eq!(rp.pos_at_index(1, None), 8);
        assert_eq!(rp.pos_at_index(1, Some(0)), 4);
        assert_eq!(rp.to_string(), "blockquote_1/paragraph_0:2");
    }

    #[test]
    #[should_panic]
    fn test_before_top_level_panics() {
        test_doc().resolve(0).unwrap().before(0);
    }

    #[test]
    fn test_marks() {
        let d = doc(vec![p(vec![
            text("a"),
            marked("b", &["em", "link"]),
            text("c"),
            img(),
        ])]);
        let names = |pos: usize| {
            d.resolve(pos)
                .unwrap()
                .marks()
                .iter()
                .map(|m| m.r#type().name().to_owned())
                .collect::<Vec<_>>()
        };
        assert!(names(1).is_empty());
        assert!(names(2).is_empty());
        // link is not inclusive, so only em carries over at the end of "b"
        assert_eq!(names(3), ["em"]);
        assert!(names(4).is_empty());

        let start = d.resolve(2).unwrap();
        let across = start.marks_across(&d.resolve(3).unwrap()).unwrap();
        assert_eq!(across.len(), 1);
        assert!(d.resolve(5).unwrap().marks_across(&start).is_none());
    }

    #[test]
    fn test_block_range() {
        let d = test_doc();
        let a = d.resolve(1).unwrap();
        let range = a.block_range(&d.resolve(2).unwrap(), None).unwrap();
        assert_eq!((range.depth, range.start(), range.end()), (0, 0, 4));

        let b = d.resolve(7).unwrap();
        let range = a.block_range(&b, None).unwrap();
        assert_eq!((range.depth, range.start_index(), range.end_index()), (0, 0, 2));

        let inner = d.resolve(7).unwrap().block_range(&d.resolve(9).unwrap(), None).unwrap();
        assert_eq!((inner.depth, inner.start(), inner.end()), (1, 5, 11));
        assert_eq!(inner.parent().r#type().name(), "blockquote");

        let only_docs = |n: &Node| n.r#type().name() == "doc";
        let outer = d
            .resolve(7)
            .unwrap()
            .block_range(&d.resolve(9).unwrap(), Some(&only_docs))
            .unwrap();
        assert_eq!(outer.depth, 0);
    }

    #[test]
    fn test_cache() {
        let d = test_doc();
        set_resolve_cache_size(2);
        let first = d.resolve(3).unwrap();
        assert_eq!(d.resolve(3).unwrap(), first);
        clear_resolve_cache();
        set_resolve_cache_size(0);
        assert_eq!(d.resolve(3).unwrap(), first);
        set_resolve_cache_size(12);
    }
}
