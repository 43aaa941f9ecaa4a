use crate::content_expr::MatchState;
use crate::{util, Fragment, NodeType, Schema};
use displaydoc::Display;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::ops::RangeBounds;
use thiserror::Error;
use tracing::trace;

/// Error on content matching
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ContentMatchError {
    /// Called contentMatchAt on a node with invalid content
    InvalidContent,
}

/// Instances of this struct represent a match state of a node type's content expression, and
/// can be used to find out whether further content matches here, and whether a given position
/// is a valid end of the node.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ContentMatch {
    schema: Schema,
    id: usize,
}

impl ContentMatch {
    pub(crate) fn new(schema: Schema, id: usize) -> Self {
        Self { schema, id }
    }

    fn state(&self) -> &MatchState {
        self.schema.state(self.id)
    }

    fn at(&self, id: usize) -> ContentMatch {
        ContentMatch::new(self.schema.clone(), id)
    }

    /// True when this match state represents a valid end of the node.
    pub fn valid_end(&self) -> bool {
        self.state().valid_end
    }

    /// Match a node type, returning a match after that node if successful.
    pub fn match_type(&self, r#type: &NodeType) -> Option<ContentMatch> {
        if r#type.schema() != &self.schema {
            return None;
        }
        self.state()
            .next
            .iter()
            .find(|(t, _)| *t == r#type.id())
            .map(|&(_, next)| self.at(next))
    }

    /// Try to match a fragment. Returns the resulting match when successful.
    pub fn match_fragment(&self, fragment: &Fragment) -> Option<ContentMatch> {
        self.match_fragment_range(fragment, ..)
    }

    /// Try to match a part of a fragment. Returns the resulting match when successful.
    pub fn match_fragment_range<R: RangeBounds<usize>>(
        &self,
        fragment: &Fragment,
        range: R,
    ) -> Option<ContentMatch> {
        let children = fragment.children();
        let start = util::from(&range);
        let end = util::to(&range, children.len()).min(children.len());
        let mut cur = self.clone();
        for child in children.get(start..end).unwrap_or(&[]) {
            cur = cur.match_type(child.r#type())?;
        }
        Some(cur)
    }

    /// Whether the first edge out of this state leads to inline content
    pub fn inline_content(&self) -> bool {
        self.state()
            .next
            .first()
            .map_or(false, |&(t, _)| NodeType::new(self.schema.clone(), t).is_inline())
    }

    /// Get the first matching node type at this match position that can be generated.
    pub fn default_type(&self) -> Option<NodeType> {
        self.state()
            .next
            .iter()
            .map(|&(t, _)| NodeType::new(self.schema.clone(), t))
            .find(|t| !(t.is_text() || t.has_required_attrs()))
    }

    /// Whether some node type is accepted both here and at `other`
    pub fn compatible(&self, other: &ContentMatch) -> bool {
        self.schema == other.schema
            && self
                .state()
                .next
                .iter()
                .any(|(a, _)| other.state().next.iter().any(|(b, _)| a == b))
    }

    /// Try to match the given fragment, and if that fails, see if it can be made to match by
    /// inserting nodes in front of it. When successful, return a fragment of inserted nodes
    /// (which may be empty if nothing had to be inserted). When `to_end` is true, only return
    /// a fragment if the resulting match goes to the end of the content expression.
    pub fn fill_before(&self, after: &Fragment, to_end: bool, start_index: usize) -> Option<Fragment> {
        let mut seen = vec![self.id];
        let mut types = Vec::new();
        self.search_fill(after, to_end, start_index, &mut seen, &mut types)
    }

    fn search_fill(
        &self,
        after: &Fragment,
        to_end: bool,
        start_index: usize,
        seen: &mut Vec<usize>,
        types: &mut Vec<NodeType>,
    ) -> Option<Fragment> {
        if let Some(finished) = self.match_fragment_range(after, start_index..) {
            if !to_end || finished.valid_end() {
                let filled = types
                    .iter()
                    .map(|t| t.create_and_fill(None, Fragment::new(), vec![]))
                    .collect::<Option<Vec<_>>>();
                if let Some(nodes) = filled {
                    return Some(Fragment::from(nodes));
                }
            }
        }
        for &(t, next) in &self.state().next {
            let r#type = NodeType::new(self.schema.clone(), t);
            if !(r#type.is_text() || r#type.has_required_attrs()) && !seen.contains(&next) {
                seen.push(next);
                types.push(r#type);
                if let Some(found) = self.at(next).search_fill(after, to_end, start_index, seen, types) {
                    return Some(found);
                }
                types.pop();
            }
        }
        None
    }

    /// Find a set of wrapping node types that would allow a node of the given type to appear
    /// at this position. The result may be empty (when it fits directly) and will be `None`
    /// when no such wrapping exists.
    pub fn find_wrapping(&self, target: &NodeType) -> Option<Vec<NodeType>> {
        if target.schema() != &self.schema {
            return None;
        }
        let key = (self.id, target.id());
        let ids = match self.schema.cached_wrapping(key) {
            Some(cached) => cached,
            None => {
                trace!(node_type = %target, state = self.id, "computing wrapping");
                let computed = self.compute_wrapping(target);
                self.schema.cache_wrapping(key, computed.clone());
                computed
            }
        };
        ids.map(|ids| {
            ids.into_iter()
                .map(|id| NodeType::new(self.schema.clone(), id))
                .collect()
        })
    }

    fn compute_wrapping(&self, target: &NodeType) -> Option<Vec<usize>> {
        struct Active {
            state: usize,
            r#type: Option<usize>,
            via: Option<usize>,
        }

        let mut seen = HashSet::new();
        let mut entries = vec![Active {
            state: self.id,
            r#type: None,
            via: None,
        }];
        let mut queue = VecDeque::from([0]);
        while let Some(idx) = queue.pop_front() {
            let current = self.at(entries[idx].state);
            if current.match_type(target).is_some() {
                let mut result = Vec::new();
                let mut cur = Some(idx);
                while let Some(i) = cur {
                    match entries[i].r#type {
                        Some(t) => {
                            result.push(t);
                            cur = entries[i].via;
                        }
                        None => break,
                    }
                }
                result.reverse();
                return Some(result);
            }
            let is_start = entries[idx].r#type.is_none();
            for &(t, next) in &current.state().next {
                let r#type = NodeType::new(self.schema.clone(), t);
                if !r#type.is_leaf()
                    && !r#type.has_required_attrs()
                    && !seen.contains(&t)
                    && (is_start || self.schema.state(next).valid_end)
                {
                    entries.push(Active {
                        state: r#type.content_match_id(),
                        r#type: Some(t),
                        via: Some(idx),
                    });
                    queue.push_back(entries.len() - 1);
                    seen.insert(t);
                }
            }
        }
        None
    }

    /// The number of outgoing edges this node has in the finite automaton that describes the
    /// content expression.
    pub fn edge_count(&self) -> usize {
        self.state().next.len()
    }

    /// Get the _n_th outgoing edge from this node in the finite automaton that describes the
    /// content expression.
    pub fn edge(&self, n: usize) -> Option<(NodeType, ContentMatch)> {
        self.state()
            .next
            .get(n)
            .map(|&(t, next)| (NodeType::new(self.schema.clone(), t), self.at(next)))
    }
}

impl fmt::Debug for ContentMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentMatch({})", self.id)
    }
}

impl fmt::Display for ContentMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut seen = vec![self.id];
        let mut i = 0;
        while i < seen.len() {
            for &(_, next) in &self.schema.state(seen[i]).next {
                if !seen.contains(&next) {
                    seen.push(next);
                }
            }
            i += 1;
        }
        for (i, &id) in seen.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            let state = self.schema.state(id);
            write!(f, "{}{} ", i, if state.valid_end { "*" } else { " " })?;
            for (j, &(t, next)) in state.next.iter().enumerate() {
                if j > 0 {
                    f.write_str(", ")?;
                }
                let index = seen.iter().position(|&s| s == next).unwrap_or_default();
                write!(f, "{}->{}", NodeType::new(self.schema.clone(), t).name(), index)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::test_util::{img, p, test_schema, text};
    use crate::Fragment;

    #[test]
    fn test_match_and_valid_end() {
        let schema = test_schema();
        let doc = schema.top_node_type();
        let start = doc.content_match();
        assert!(!start.valid_end());
        let paragraph = schema.node_type("paragraph").unwrap();
        let after = start.match_type(&paragraph).unwrap();
        assert!(after.valid_end());
        assert!(start.match_type(&schema.text_type()).is_none());

        let frag = Fragment::from(vec![p(vec![]), p(vec![])]);
        assert!(start.match_fragment(&frag).unwrap().valid_end());
        assert_eq!(start.match_fragment_range(&frag, 2..), Some(start.clone()));
        assert_eq!(start.edge_count(), 3);
        assert_eq!(start.edge(0).unwrap().0, paragraph);
        assert_eq!(start.default_type(), Some(paragraph));
    }

    #[test]
    fn test_inline_content() {
        let schema = test_schema();
        let paragraph = schema.node_type("paragraph").unwrap();
        assert!(paragraph.content_match().inline_content());
        assert!(!schema.top_node_type().content_match().inline_content());
        let frag = Fragment::from(vec![text("a"), img()]);
        assert!(paragraph.content_match().match_fragment(&frag).is_some());
    }

    #[test]
    fn test_fill_before() {
        let schema = test_schema();
        let start = schema.top_node_type().content_match();
        let fill = start.fill_before(&Fragment::new(), true, 0).unwrap();
        assert_eq!(fill.to_string(), "<paragraph>");
        let fill = start.fill_before(&Fragment::from(p(vec![])), true, 0).unwrap();
        assert_eq!(fill.size(), 0);
        let para = schema.node_type("paragraph").unwrap().content_match();
        assert!(para.fill_before(&Fragment::from(p(vec![])), false, 0).is_none());
    }

    #[test]
    fn test_find_wrapping() {
        let schema = test_schema();
        let doc = schema.top_node_type().content_match();
        let paragraph = schema.node_type("paragraph").unwrap();
        assert_eq!(doc.find_wrapping(&paragraph), Some(vec![]));
        let wrap = doc.find_wrapping(&schema.text_type()).unwrap();
        assert_eq!(wrap, vec![paragraph.clone()]);
        // served from the cache the second time
        assert_eq!(doc.find_wrapping(&schema.text_type()).unwrap(), wrap);
        assert!(paragraph
            .content_match()
            .find_wrapping(&schema.top_node_type())
            .is_none());
    }

    #[test]
    fn test_display() {
        let schema = test_schema();
        let dump = schema.top_node_type().content_match().to_string();
        assert_eq!(
            dump,
            "0  paragraph->1, heading->1, blockquote->1\n1* paragraph->1, heading->1, blockquote->1"
        );
    }
}
