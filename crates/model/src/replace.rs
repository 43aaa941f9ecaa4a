use crate::{Fragment, Index, IndexError, Node, NodeError, NodeType, ResolveErr, ResolvedPos, Schema};
use displaydoc::Display;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// A slice represents a piece cut out of a larger document. It stores not only a fragment,
/// but also the depth up to which nodes on both side are ‘open’ (cut through).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Slice {
    /// The slice's content.
    pub content: Fragment,
    /// The open depth at the start.
    pub open_start: usize,
    /// The open depth at the end.
    pub open_end: usize,
}

impl Slice {
    /// Create a slice. When specifying a non-zero open depth, you must
    /// make sure that there are nodes of at least that depth at the
    /// appropriate side of the fragment, i.e. if the fragment is an empty
    /// paragraph node, `openStart` and `openEnd` can't be greater than 1.
    ///
    /// It is not necessary for the content of open nodes to conform to
    /// the schema's content constraints, though it should be a valid
    /// start/end/middle for such a node, depending on which sides are
    /// open.
    pub fn new(content: Fragment, open_start: usize, open_end: usize) -> Slice {
        Slice {
            content,
            open_start,
            open_end,
        }
    }

    /// The empty slice.
    pub fn empty() -> Slice {
        Slice::default()
    }

    /// The size this slice would add when inserted into a document.
    pub fn size(&self) -> usize {
        self.content.size() - self.open_start - self.open_end
    }

    /// True if inserting this slice would not add anything.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Insert a fragment at the given position, relative to the slice's content. Returns
    /// `None` if the fragment is not allowed there.
    pub fn insert_at(&self, pos: usize, fragment: Fragment) -> Result<Option<Slice>, InsertError> {
        let content = insert_into(&self.content, pos + self.open_start, fragment, None)?;
        Ok(content.map(|c| Slice::new(c, self.open_start, self.open_end)))
    }

    /// Remove the flat range between the given positions, relative to the slice's content.
    pub fn remove_between(&self, from: usize, to: usize) -> Result<Slice, InsertError> {
        let content = remove_range(&self.content, from + self.open_start, to + self.open_start)?;
        Ok(Slice::new(content, self.open_start, self.open_end))
    }

    /// Create a slice from a fragment by taking the maximum possible open value on both side
    /// of the fragment.
    pub fn max_open(fragment: Fragment, open_isolating: bool) -> Slice {
        let mut open_start = 0;
        let mut open_end = 0;
        let mut n = fragment.first_child().cloned();
        while let Some(node) = n {
            if node.is_leaf() || (!open_isolating && node.r#type().is_isolating()) {
                break;
            }
            open_start += 1;
            n = node.first_child().cloned();
        }
        let mut n = fragment.last_child().cloned();
        while let Some(node) = n {
            if node.is_leaf() || (!open_isolating && node.r#type().is_isolating()) {
                break;
            }
            open_end += 1;
            n = node.last_child().cloned();
        }
        Slice::new(fragment, open_start, open_end)
    }

    /// Convert a slice to a JSON-serializable representation.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        if self.content.size() > 0 {
            obj.insert("content".into(), self.content.to_json());
        }
        if self.open_start > 0 {
            obj.insert("openStart".into(), Value::from(self.open_start));
        }
        if self.open_end > 0 {
            obj.insert("openEnd".into(), Value::from(self.open_end));
        }
        Value::Object(obj)
    }

    /// Deserialize a slice from its JSON representation. `null` is the empty slice.
    pub fn from_json(schema: &Schema, json: &Value) -> Result<Slice, NodeError> {
        if json.is_null() {
            return Ok(Slice::empty());
        }
        let raw = RawSlice::deserialize(json).map_err(|e| NodeError::InvalidJson(e.to_string()))?;
        let content = Fragment::from_json(schema, &raw.content)?;
        let max = Slice::max_open(content, true);
        if raw.open_start > max.open_start || raw.open_end > max.open_end {
            return Err(NodeError::InvalidJson(format!(
                "open depths {}/{} exceed the slice's depths {}/{}",
                raw.open_start, raw.open_end, max.open_start, max.open_end
            )));
        }
        Ok(Slice::new(max.content, raw.open_start, raw.open_end))
    }
}

impl Serialize for Slice {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        if self.content.size() > 0 {
            map.serialize_entry("content", &self.content)?;
        }
        if self.open_start > 0 {
            map.serialize_entry("openStart", &self.open_start)?;
        }
        if self.open_end > 0 {
            map.serialize_entry("openEnd", &self.open_end)?;
        }
        map.end()
    }
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.content, self.open_start, self.open_end)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSlice {
    #[serde(default)]
    content: Value,
    #[serde(default)]
    open_start: usize,
    #[serde(default)]
    open_end: usize,
}

/// Error on insertion
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum InsertError {
    /// Position out of range: {0}
    Index(#[from] IndexError),
    /// Removing non-flat range
    NonFlatRange,
}

fn remove_range(content: &Fragment, from: usize, to: usize) -> Result<Fragment, InsertError> {
    let Index { index, offset } = content.find_index(from, false)?;
    let child = content.maybe_child(index);
    let Index {
        index: index_to,
        offset: offset_to,
    } = content.find_index(to, false)?;
    if offset == from || matches!(child, Some(c) if c.is_text()) {
        if offset_to != to && !content.child(index_to).is_text() {
            return Err(InsertError::NonFlatRange);
        }
        return Ok(content.cut(..from).append(content.cut(to..)));
    }
    let child = match child {
        Some(child) if index == index_to => child,
        _ => return Err(InsertError::NonFlatRange),
    };
    let inner = remove_range(child.content(), from - offset - 1, to - offset - 1)?;
    Ok(content.replace_child(index, child.copy(|_| inner)))
}

fn insert_into(
    content: &Fragment,
    dist: usize,
    insert: Fragment,
    parent: Option<&Node>,
) -> Result<Option<Fragment>, InsertError> {
    let Index { index, offset } = content.find_index(dist, false)?;
    let child = content.maybe_child(index);
    match child {
        Some(child) if offset != dist && !child.is_text() => {
            let inner = insert_into(child.content(), dist - offset - 1, insert, Some(child))?;
            Ok(inner.map(|i| content.replace_child(index, child.copy(|_| i))))
        }
        _ => {
            if let Some(p) = parent {
                if !p.can_replace(index, index, Some(&insert), ..) {
                    return Ok(None);
                }
            }
            Ok(Some(content.cut(..dist).append(insert).append(content.cut(dist..))))
        }
    }
}

/// An error that can occur when replacing a slice
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ReplaceError {
    /// Inserted content deeper than insertion position
    InsertTooDeep,
    /// Inconsistent open depths
    InconsistentOpenDepths {
        /// Depth at the start
        from_depth: usize,
        /// How many nodes are "open" at the start
        open_start: usize,
        /// Depth at the end
        to_depth: usize,
        /// How many nodes are "open" at the end
        open_end: usize,
    },
    /// Could not resolve an index
    Resolve(#[from] ResolveErr),
    /// Cannot join {0} onto {1}
    CannotJoin(NodeType, NodeType),
    /// Invalid content for node {0}
    InvalidContent(NodeType),
}

pub(crate) fn replace(
    rp_from: &ResolvedPos,
    rp_to: &ResolvedPos,
    slice: &Slice,
) -> Result<Node, ReplaceError> {
    if slice.open_start > rp_from.depth {
        Err(ReplaceError::InsertTooDeep)
    } else if slice.open_end > rp_to.depth
        || rp_from.depth - slice.open_start != rp_to.depth - slice.open_end
    {
        Err(ReplaceError::InconsistentOpenDepths {
            from_depth: rp_from.depth,
            open_start: slice.open_start,
            to_depth: rp_to.depth,
            open_end: slice.open_end,
        })
    } else {
        replace_outer(rp_from, rp_to, slice, 0)
    }
}

fn replace_outer(
    rp_from: &ResolvedPos,
    rp_to: &ResolvedPos,
    slice: &Slice,
    depth: usize,
) -> Result<Node, ReplaceError> {
    let index = rp_from.index(depth);
    let node = rp_from.node(depth);
    if index == rp_to.index(depth) && depth < rp_from.depth - slice.open_start {
        // Both ends are in the same child and we have not reached an open node yet
        let inner = replace_outer(rp_from, rp_to, slice, depth + 1)?;
        Ok(node.copy(|c| c.replace_child(index, inner)))
    } else if slice.content.size() == 0 {
        let content = replace_two_way(rp_from, rp_to, depth)?;
        close(node, content)
    } else if slice.open_start == 0
        && slice.open_end == 0
        && rp_from.depth == depth
        && rp_to.depth == depth
    {
        // Simple, flat case
        let parent = rp_from.parent();
        let content = parent.content();
        let new_content = content
            .cut(..rp_from.parent_offset)
            .append(slice.content.clone())
            .append(content.cut(rp_to.parent_offset..));
        close(parent, new_content)
    } else {
        let (n, start, end) = prepare_slice_for_replace(slice, rp_from);
        let rp_start = n.resolve_no_cache(start)?;
        let rp_end = n.resolve_no_cache(end)?;
        let content = replace_three_way(rp_from, &rp_start, &rp_end, rp_to, depth)?;
        close(node, content)
    }
}

fn check_join(main: &Node, sub: &Node) -> Result<(), ReplaceError> {
    let sub_type = sub.r#type();
    let main_type = main.r#type();
    if sub_type.compatible_content(main_type) {
        Ok(())
    } else {
        Err(ReplaceError::CannotJoin(sub_type.clone(), main_type.clone()))
    }
}

fn joinable<'a>(
    rp_before: &'a ResolvedPos,
    rp_after: &ResolvedPos,
    depth: usize,
) -> Result<&'a Node, ReplaceError> {
    let node = rp_before.node(depth);
    check_join(node, rp_after.node(depth))?;
    Ok(node)
}

fn add_node(child: Node, target: &mut Vec<Node>) {
    if let Some(last) = target.last_mut() {
        if child.is_text() && child.same_markup(last) {
            let mut joined = String::from(last.text().unwrap_or_default());
            joined.push_str(child.text().unwrap_or_default());
            *last = last.with_text(joined);
            return;
        }
    }
    target.push(child);
}

// Copy the children of the node at `depth` lying between `start` and `end`. A missing
// bound means the start or end of that node.
fn add_range(
    start: Option<&ResolvedPos>,
    end: Option<&ResolvedPos>,
    depth: usize,
    target: &mut Vec<Node>,
) {
    let node = match end.or(start) {
        Some(rp) => rp.node(depth),
        None => return,
    };
    let end_index = end.map_or(node.child_count(), |rp_end| rp_end.index(depth));

    let mut start_index = 0;
    if let Some(rp_start) = start {
        start_index = rp_start.index(depth);
        if rp_start.depth > depth {
            start_index += 1;
        } else if rp_start.text_offset() > 0 {
            if let Some(after) = rp_start.node_after() {
                add_node(after, target);
            }
            start_index += 1;
        }
    }
    for i in start_index..end_index {
        add_node(node.child(i).clone(), target);
    }
    if let Some(rp_end) = end {
        if rp_end.depth == depth && rp_end.text_offset() > 0 {
            if let Some(before) = rp_end.node_before() {
                add_node(before, target);
            }
        }
    }
}

fn close(node: &Node, content: Fragment) -> Result<Node, ReplaceError> {
    let node_type = node.r#type();
    if node_type.valid_content(&content) {
        Ok(node.copy(|_| content))
    } else {
        Err(ReplaceError::InvalidContent(node_type.clone()))
    }
}

fn replace_three_way(
    rp_from: &ResolvedPos,
    rp_start: &ResolvedPos,
    rp_end: &ResolvedPos,
    rp_to: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ReplaceError> {
    let open_start = if rp_from.depth > depth {
        Some(joinable(rp_from, rp_start, depth + 1)?)
    } else {
        None
    };
    let open_end = if rp_to.depth > depth {
        Some(joinable(rp_end, rp_to, depth + 1)?)
    } else {
        None
    };

    let mut content = Vec::new();
    add_range(None, Some(rp_from), depth, &mut content);
    match (open_start, open_end) {
        (Some(os), Some(oe)) if rp_start.index(depth) == rp_end.index(depth) => {
            check_join(os, oe)?;
            let inner = replace_three_way(rp_from, rp_start, rp_end, rp_to, depth + 1)?;
            add_node(close(os, inner)?, &mut content);
        }
        _ => {
            if let Some(os) = open_start {
                let inner = replace_two_way(rp_from, rp_start, depth + 1)?;
                add_node(close(os, inner)?, &mut content);
            }
            add_range(Some(rp_start), Some(rp_end), depth, &mut content);
            if let Some(oe) = open_end {
                let inner = replace_two_way(rp_end, rp_to, depth + 1)?;
                add_node(close(oe, inner)?, &mut content);
            }
        }
    }
    add_range(Some(rp_to), None, depth, &mut content);
    Ok(Fragment::from(content))
}

fn replace_two_way(
    rp_from: &ResolvedPos,
    rp_to: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ReplaceError> {
    let mut content = Vec::new();
    add_range(None, Some(rp_from), depth, &mut content);
    if rp_from.depth > depth {
        let r#type = joinable(rp_from, rp_to, depth + 1)?;
        let inner = replace_two_way(rp_from, rp_to, depth + 1)?;
        add_node(close(r#type, inner)?, &mut content);
    }
    add_range(Some(rp_to), None, depth, &mut content);
    Ok(Fragment::from(content))
}

fn prepare_slice_for_replace(slice: &Slice, rp_along: &ResolvedPos) -> (Node, usize, usize) {
    let extra = rp_along.depth - slice.open_start;
    let parent = rp_along.node(extra);
    let mut node = parent.copy(|_| slice.content.clone());
    for i in (0..extra).rev() {
        node = rp_along.node(i).copy(|_| Fragment::from(node));
    }

    let start = slice.open_start + extra;
    let end = node.content_size() - slice.open_end - extra;
    (node, start, end)
}

#[cfg(test)]
mod tests {
    use super::{InsertError, Slice};
    use crate::test_util::{blockquote, img, p, test_schema, text};
    use crate::Fragment;
    use serde_json::json;

    #[test]
    fn test_max_open() {
        let frag = Fragment::from(vec![blockquote(vec![p(vec![text("a")])]), p(vec![img()])]);
        let slice = Slice::max_open(frag, false);
        assert_eq!((slice.open_start, slice.open_end), (2, 1));
        assert_eq!(slice.size(), 5);
    }

    #[test]
    fn test_insert_at() {
        let slice = Slice::new(Fragment::from(vec![p(vec![text("ab")])]), 1, 1);
        let inserted = slice
            .insert_at(1, Fragment::from(text("X")))
            .unwrap()
            .unwrap();
        assert_eq!(inserted.content.to_string(), "<paragraph(\"aXb\")>");

        // paragraphs can't hold paragraphs
        let nested = Slice::new(Fragment::from(vec![blockquote(vec![p(vec![])])]), 0, 0);
        assert_eq!(nested.insert_at(2, Fragment::from(p(vec![]))).unwrap(), None);
    }

    #[test]
    fn test_remove_between() {
        let slice = Slice::new(Fragment::from(vec![p(vec![text("abcd")])]), 1, 1);
        let removed = slice.remove_between(1, 3).unwrap();
        assert_eq!(removed.content.to_string(), "<paragraph(\"ad\")>");

        let two = Slice::new(Fragment::from(vec![p(vec![text("ab")]), p(vec![text("cd")])]), 0, 0);
        assert_eq!(two.remove_between(2, 6), Err(InsertError::NonFlatRange));
    }

    #[test]
    fn test_json() {
        let schema = test_schema();
        let slice = Slice::new(Fragment::from(vec![p(vec![text("ab")])]), 1, 0);
        let json = serde_json::to_value(&slice).unwrap();
        assert_eq!(
            json,
            json!({"content": [{"type": "paragraph", "content": [{"type": "text", "text": "ab"}]}], "openStart": 1})
        );
        assert_eq!(json, slice.to_json());
        assert_eq!(Slice::from_json(&schema, &json).unwrap(), slice);
        assert_eq!(Slice::from_json(&schema, &json!(null)).unwrap(), Slice::empty());
    }
}
