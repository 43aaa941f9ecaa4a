use crate::{Assoc, Mappable, ReplaceAroundStep, ReplaceStep, Transform, TransformError};
use derive_new::new;
use parchment_model::{Attrs, Fragment, Mark, Node, NodeRange, NodeType, Slice};

/// A node type together with the attributes to create it with, as used for wrapping and
/// splitting.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Wrapper {
    /// The type of the node
    pub r#type: NodeType,
    /// The attributes, `None` for the defaults
    pub attrs: Option<Attrs>,
}

fn can_cut(node: &Node, start: usize, end: usize) -> bool {
    (start == 0 || node.can_replace(start, node.child_count(), None, ..))
        && (end == node.child_count() || node.can_replace(0, end, None, ..))
}

/// Try to find a target depth to which the content in the given range can be lifted. Will
/// not go across [isolating](parchment_model::NodeSpec::isolating) parent nodes.
pub fn lift_target(range: &NodeRange) -> Option<usize> {
    let parent = range.parent();
    let content = parent
        .content()
        .cut_by_index(range.start_index()..range.end_index());
    for depth in (0..=range.depth).rev() {
        let node = range.from.node(depth);
        let index = range.from.index(depth);
        let end_index = range.to.index_after(depth);
        if depth < range.depth && node.can_replace(index, end_index, Some(&content), ..) {
            return Some(depth);
        }
        if depth == 0 || node.r#type().is_isolating() || !can_cut(node, index, end_index) {
            break;
        }
    }
    None
}

/// Try to find a valid way to wrap the content in the given range in a node of the given
/// type. May introduce extra nodes around and inside the wrapper node, if necessary.
/// Returns `None` if no valid wrapping could be found. When `inner_range` is given, that
/// range's content is used as the content to fit into the wrapping, instead of the
/// content of `range`.
pub fn find_wrapping(
    range: &NodeRange,
    node_type: &NodeType,
    attrs: Option<Attrs>,
    inner_range: Option<&NodeRange>,
) -> Option<Vec<Wrapper>> {
    let around = find_wrapping_outside(range, node_type)?;
    let inner = find_wrapping_inside(inner_range.unwrap_or(range), node_type)?;
    let mut wrappers: Vec<Wrapper> = around.into_iter().map(|t| Wrapper::new(t, None)).collect();
    wrappers.push(Wrapper::new(node_type.clone(), attrs));
    wrappers.extend(inner.into_iter().map(|t| Wrapper::new(t, None)));
    Some(wrappers)
}

fn find_wrapping_outside(range: &NodeRange, r#type: &NodeType) -> Option<Vec<NodeType>> {
    let parent = range.parent();
    let start_index = range.start_index();
    let around = parent
        .content_match_at(start_index)
        .ok()?
        .find_wrapping(r#type)?;
    let outer = around.first().unwrap_or(r#type);
    if parent.can_replace_with(start_index, range.end_index(), outer, None) {
        Some(around)
    } else {
        None
    }
}

fn find_wrapping_inside(range: &NodeRange, r#type: &NodeType) -> Option<Vec<NodeType>> {
    let parent = range.parent();
    let inner = parent.maybe_child(range.start_index())?;
    let inside = r#type.content_match().find_wrapping(inner.r#type())?;
    let last_type = inside.last().unwrap_or(r#type);
    let mut inner_match = Some(last_type.content_match());
    for child in &parent.content().children()[range.start_index()..range.end_index()] {
        inner_match = inner_match.and_then(|m| m.match_type(child.r#type()));
    }
    match inner_match {
        Some(m) if m.valid_end() => Some(inside),
        _ => None,
    }
}

fn can_change_type(doc: &Node, pos: usize, r#type: &NodeType) -> bool {
    match doc.resolve(pos) {
        Ok(rp) => {
            let index = rp.index(rp.depth());
            rp.parent().can_replace_with(index, index + 1, r#type, None)
        }
        Err(_) => false,
    }
}

/// Check whether splitting at the given position is allowed. `types_after` can override
/// the type (and attributes) of the nodes after the split, from the outermost split level
/// inward; `None` entries keep the original type.
pub fn can_split(doc: &Node, pos: usize, depth: usize, types_after: &[Option<Wrapper>]) -> bool {
    let rp = match doc.resolve(pos) {
        Ok(rp) => rp,
        Err(_) => return false,
    };
    let base = match rp.depth().checked_sub(depth) {
        Some(base) => base,
        None => return false,
    };
    let parent = rp.parent();
    let index = rp.index(rp.depth());
    let inner_type = match types_after.last() {
        Some(Some(wrapper)) => &wrapper.r#type,
        _ => parent.r#type(),
    };
    if parent.r#type().is_isolating()
        || !parent.can_replace(index, parent.child_count(), None, ..)
        || !inner_type.valid_content(&parent.content().cut_by_index(index..))
    {
        return false;
    }
    for d in (base + 1..rp.depth()).rev() {
        let node = rp.node(d);
        let index = rp.index(d);
        if node.r#type().is_isolating() {
            return false;
        }
        // Position of this level in `types_after`, counted from the base
        let i = d - base - 1;
        let mut rest = node.content().cut_by_index(index..);
        if let Some(Some(child)) = types_after.get(i + 1) {
            match child.r#type.create(child.attrs.as_ref(), Fragment::new(), vec![]) {
                Ok(created) => rest = rest.replace_child(0, created),
                Err(_) => return false,
            }
        }
        let after = match types_after.get(i) {
            Some(Some(wrapper)) => &wrapper.r#type,
            _ => node.r#type(),
        };
        if !node.can_replace(index + 1, node.child_count(), None, ..) || !after.valid_content(&rest) {
            return false;
        }
    }
    let index = rp.index_after(base);
    let base_type = match types_after.first() {
        Some(Some(wrapper)) => &wrapper.r#type,
        _ => rp.node(base + 1).r#type(),
    };
    rp.node(base).can_replace_with(index, index, base_type, None)
}

fn joinable(a: Option<&Node>, b: Option<&Node>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => !a.is_leaf() && a.can_append(b),
        _ => false,
    }
}

/// Test whether the blocks before and after a given position can be joined.
pub fn can_join(doc: &Node, pos: usize) -> bool {
    match doc.resolve(pos) {
        Ok(rp) => {
            let index = rp.index(rp.depth());
            joinable(rp.node_before().as_ref(), rp.node_after().as_ref())
                && rp.parent().can_replace(index, index + 1, None, ..)
        }
        Err(_) => false,
    }
}

/// Find an ancestor of the given position that can be joined to the block before it (or
/// after it if `forward` is true).
pub fn join_point(doc: &Node, pos: usize, forward: bool) -> Option<usize> {
    let rp = doc.resolve(pos).ok()?;
    let mut pos = pos;
    for d in (0..=rp.depth()).rev() {
        let mut index = rp.index(d);
        let (before, after) = if d == rp.depth() {
            (rp.node_before(), rp.node_after())
        } else if forward {
            index += 1;
            (Some(rp.node(d + 1).clone()), rp.node(d).maybe_child(index).cloned())
        } else {
            let before = index
                .checked_sub(1)
                .and_then(|i| rp.node(d).maybe_child(i).cloned());
            (before, Some(rp.node(d + 1).clone()))
        };
        if let Some(b) = &before {
            if !b.is_textblock()
                && joinable(before.as_ref(), after.as_ref())
                && rp.node(d).can_replace(index, index + 1, None, ..)
            {
                return Some(pos);
            }
        }
        if d == 0 {
            break;
        }
        pos = if forward { rp.after(d) } else { rp.before(d) };
    }
    None
}

/// Try to find a point where a node of the given type can be inserted near `pos`, by
/// searching up the node hierarchy when `pos` itself isn't a valid place but is at the
/// start or end of a node. Return `None` if no position was found.
pub fn insert_point(doc: &Node, pos: usize, node_type: &NodeType) -> Option<usize> {
    let rp = doc.resolve(pos).ok()?;
    let index = rp.index(rp.depth());
    if rp.parent().can_replace_with(index, index, node_type, None) {
        return Some(pos);
    }
    if rp.parent_offset() == 0 {
        for d in (0..rp.depth()).rev() {
            let index = rp.index(d);
            if rp.node(d).can_replace_with(index, index, node_type, None) {
                return Some(rp.before(d + 1));
            }
            if index > 0 {
                return None;
            }
        }
    }
    if rp.parent_offset() == rp.parent().content_size() {
        for d in (0..rp.depth()).rev() {
            let index = rp.index_after(d);
            if rp.node(d).can_replace_with(index, index, node_type, None) {
                return Some(rp.after(d + 1));
            }
            if index < rp.node(d).child_count() {
                return None;
            }
        }
    }
    None
}

impl Transform {
    /// Split the content in the given range off from its parent, if there is sibling
    /// content before or after it, and move it up the tree to the depth specified by
    /// `target`. You'll probably want to use [`lift_target`] to compute `target`, to make
    /// sure the lift is valid.
    pub fn lift(&mut self, range: &NodeRange, target: usize) -> Result<&mut Self, TransformError> {
        let NodeRange { from, to, depth } = range;
        let depth = *depth;

        let gap_start = from.before(depth + 1);
        let gap_end = to.after(depth + 1);
        let mut start = gap_start;
        let mut end = gap_end;

        let mut before = Fragment::new();
        let mut open_start = 0;
        let mut splitting = false;
        for d in (target + 1..=depth).rev() {
            if splitting || from.index(d) > 0 {
                splitting = true;
                before = Fragment::from(from.node(d).copy(move |_| before));
                open_start += 1;
            } else {
                start -= 1;
            }
        }
        let mut after = Fragment::new();
        let mut open_end = 0;
        let mut splitting = false;
        for d in (target + 1..=depth).rev() {
            if splitting || to.after(d + 1) < to.end(d) {
                splitting = true;
                after = Fragment::from(to.node(d).copy(move |_| after));
                open_end += 1;
            } else {
                end += 1;
            }
        }

        let insert = before.size() - open_start;
        self.step(ReplaceAroundStep::new(
            start,
            end,
            gap_start,
            gap_end,
            Slice::new(before.append(after), open_start, open_end),
            insert,
            true,
        ))
    }

    /// Wrap the given [range](NodeRange) in the given set of wrappers. The wrappers are
    /// assumed to be valid in this position, and should probably be computed with
    /// [`find_wrapping`].
    pub fn wrap(&mut self, range: &NodeRange, wrappers: &[Wrapper]) -> Result<&mut Self, TransformError> {
        let mut content = Fragment::new();
        for wrapper in wrappers.iter().rev() {
            if content.size() > 0 {
                match wrapper.r#type.content_match().match_fragment(&content) {
                    Some(m) if m.valid_end() => {}
                    _ => return Err(TransformError::InvalidWrapper),
                }
            }
            content = Fragment::from(wrapper.r#type.create(wrapper.attrs.as_ref(), content, vec![])?);
        }
        let start = range.start();
        let end = range.end();
        self.step(ReplaceAroundStep::new(
            start,
            end,
            start,
            end,
            Slice::new(content, 0, 0),
            wrappers.len(),
            true,
        ))
    }

    /// Set the type of all textblocks (partly) between `from` and `to` to the given node
    /// type with the given attributes.
    pub fn set_block_type(
        &mut self,
        from: usize,
        to: usize,
        r#type: &NodeType,
        attrs: Option<&Attrs>,
    ) -> Result<&mut Self, TransformError> {
        if !r#type.is_textblock() {
            return Err(TransformError::NotTextblock);
        }
        let map_from = self.steps().len();
        let mut blocks = Vec::new();
        self.doc().nodes_between(from, to, &mut |node, pos, _, _| {
            if node.is_textblock() {
                if !node.has_markup(r#type, attrs, None) {
                    blocks.push((pos, node.node_size(), node.marks().to_vec()));
                }
                return false;
            }
            true
        });
        for (pos, size, marks) in blocks {
            let mapping = self.mapping().slice(map_from, self.mapping().maps().len());
            if !can_change_type(self.doc(), mapping.map(pos, Assoc::Right), r#type) {
                continue;
            }
            // Clear all markup that isn't allowed in the new node type
            self.clear_incompatible(mapping.map(pos, Assoc::Right), r#type, None)?;
            let mapping = self.mapping().slice(map_from, self.mapping().maps().len());
            let start = mapping.map(pos, Assoc::Right);
            let end = mapping.map(pos + size, Assoc::Right);
            let wrapper = r#type.create(attrs, Fragment::new(), marks)?;
            self.step(ReplaceAroundStep::new(
                start,
                end,
                start + 1,
                end - 1,
                Slice::new(Fragment::from(wrapper), 0, 0),
                1,
                true,
            ))?;
        }
        Ok(self)
    }

    /// Change the type, attributes, and/or marks of the node at `pos`. When `type` isn't
    /// given, the existing node type is preserved.
    pub fn set_node_markup(
        &mut self,
        pos: usize,
        r#type: Option<&NodeType>,
        attrs: Option<&Attrs>,
        marks: Option<Vec<Mark>>,
    ) -> Result<&mut Self, TransformError> {
        let node = self.doc().node_at(pos).ok_or(TransformError::NoNodeAt(pos))?;
        let r#type = r#type.unwrap_or_else(|| node.r#type());
        let marks = marks.unwrap_or_else(|| node.marks().to_vec());
        let new_node = r#type.create(attrs, Fragment::new(), marks)?;
        if node.is_leaf() {
            return self.replace_with(pos, pos + node.node_size(), new_node);
        }
        r#type.check_content(node.content())?;
        self.step(ReplaceAroundStep::new(
            pos,
            pos + node.node_size(),
            pos + 1,
            pos + node.node_size() - 1,
            Slice::new(Fragment::from(new_node), 0, 0),
            1,
            true,
        ))
    }

    /// Split the node at the given position, and optionally, if `depth` is greater than
    /// one, any number of nodes above that. By default, the parts split off will inherit
    /// the node type of the original node. This can be changed by passing `types_after`,
    /// ordered from the outermost split level inward.
    pub fn split(
        &mut self,
        pos: usize,
        depth: usize,
        types_after: &[Option<Wrapper>],
    ) -> Result<&mut Self, TransformError> {
        let rp = self.doc().resolve(pos)?;
        let base = rp
            .depth()
            .checked_sub(depth)
            .ok_or(TransformError::SplitDepth(depth))?;
        let mut before = Fragment::new();
        let mut after = Fragment::new();
        for d in (base + 1..=rp.depth()).rev() {
            before = Fragment::from(rp.node(d).copy(move |_| before));
            let node_after = match types_after.get(d - base - 1) {
                Some(Some(wrapper)) => wrapper.r#type.create(wrapper.attrs.as_ref(), after, vec![])?,
                _ => rp.node(d).copy(move |_| after),
            };
            after = Fragment::from(node_after);
        }
        self.step(ReplaceStep::new(
            pos,
            pos,
            Slice::new(before.append(after), depth, depth),
            true,
        ))
    }

    /// Join the blocks around the given position. If depth is 2, their last and first
    /// siblings are also joined, and so on.
    pub fn join(&mut self, pos: usize, depth: usize) -> Result<&mut Self, TransformError> {
        let from = pos.checked_sub(depth).ok_or(TransformError::SplitDepth(depth))?;
        self.step(ReplaceStep::new(from, pos + depth, Slice::empty(), true))
    }
}

#[cfg(test)]
mod tests {
    use super::{can_join, can_split, find_wrapping, insert_point, join_point, lift_target, Wrapper};
    use crate::{Transform, TransformError};
    use parchment_markdown::helper::{blockquote, doc, h1, h2, hr, li, p, ul};
    use parchment_markdown::markdown_schema;

    #[test]
    fn test_lift_out_of_blockquote() {
        let d = doc(blockquote((p("a"), p("b"), p("c"))));
        let from = d.resolve(5).unwrap();
        let to = d.resolve(5).unwrap();
        let range = from.block_range(&to, None).unwrap();
        let target = lift_target(&range).unwrap();
        assert_eq!(target, 0);
        let mut tr = Transform::new(d);
        tr.lift(&range, target).unwrap();
        assert_eq!(
            tr.doc(),
            &doc((blockquote(p("a")), p("b"), blockquote(p("c"))))
        );
    }

    #[test]
    fn test_lift_target_none_at_top() {
        let d = doc(p("a"));
        let rp = d.resolve(1).unwrap();
        let range = rp.block_range(&rp, None).unwrap();
        assert_eq!(lift_target(&range), None);
    }

    #[test]
    fn test_wrap_in_list() {
        let schema = markdown_schema();
        let d = doc((p("a"), p("b")));
        let from = d.resolve(1).unwrap();
        let to = d.resolve(4).unwrap();
        let range = from.block_range(&to, None).unwrap();
        let bullet_list = schema.node_type("bullet_list").unwrap();
        let wrappers = find_wrapping(&range, &bullet_list, None, None).unwrap();
        let names: Vec<_> = wrappers.iter().map(|w| w.r#type.name().to_owned()).collect();
        assert_eq!(names, vec!["bullet_list", "list_item"]);

        let mut tr = Transform::new(d);
        tr.wrap(&range, &wrappers).unwrap();
        assert_eq!(tr.doc(), &doc((ul(li((p("a"), p("b")))))));
    }

    #[test]
    fn test_wrap_invalid_chain() {
        let schema = markdown_schema();
        let d = doc(p("a"));
        let rp = d.resolve(1).unwrap();
        let range = rp.block_range(&rp, None).unwrap();
        let wrappers = vec![
            Wrapper::new(schema.node_type("bullet_list").unwrap(), None),
            Wrapper::new(schema.node_type("blockquote").unwrap(), None),
            Wrapper::new(schema.node_type("paragraph").unwrap(), None),
        ];
        let mut tr = Transform::new(d);
        assert_eq!(tr.wrap(&range, &wrappers).unwrap_err(), TransformError::InvalidWrapper);
    }

    #[test]
    fn test_set_block_type() {
        let schema = markdown_schema();
        let d = doc((p("a"), p("b"), blockquote(p("c"))));
        let heading = schema.node_type("heading").unwrap();
        let mut attrs = parchment_model::Attrs::new();
        attrs.insert("level".into(), 2.into());
        let mut tr = Transform::new(d);
        tr.set_block_type(1, 10, &heading, Some(&attrs)).unwrap();
        assert_eq!(tr.doc(), &doc((h2("a"), h2("b"), blockquote(h2("c")))));
        assert_eq!(tr.steps().len(), 3);
    }

    #[test]
    fn test_set_block_type_rejects_non_textblock() {
        let schema = markdown_schema();
        let mut tr = Transform::new(doc(p("a")));
        let quote = schema.node_type("blockquote").unwrap();
        assert_eq!(
            tr.set_block_type(1, 1, &quote, None).unwrap_err(),
            TransformError::NotTextblock
        );
    }

    #[test]
    fn test_set_node_markup() {
        let schema = markdown_schema();
        let mut tr = Transform::new(doc(p("a")));
        let heading = schema.node_type("heading").unwrap();
        tr.set_node_markup(0, Some(&heading), None, None).unwrap();
        assert_eq!(tr.doc(), &doc(h1("a")));
        assert_eq!(
            tr.set_node_markup(10, None, None, None).unwrap_err(),
            TransformError::NoNodeAt(10)
        );
    }

    #[test]
    fn test_split() {
        let d = doc(p("abcd"));
        assert!(can_split(&d, 3, 1, &[]));
        let mut tr = Transform::new(d);
        tr.split(3, 1, &[]).unwrap();
        assert_eq!(tr.doc(), &doc((p("ab"), p("cd"))));
    }

    #[test]
    fn test_split_list_item() {
        let d = doc(ul(li(p("abcd"))));
        assert!(can_split(&d, 5, 2, &[]));
        let mut tr = Transform::new(d);
        tr.split(5, 2, &[]).unwrap();
        assert_eq!(tr.doc(), &doc(ul((li(p("ab")), li(p("cd"))))));
    }

    #[test]
    fn test_split_with_type_after() {
        let schema = markdown_schema();
        let d = doc(h1("abcd"));
        let paragraph = Wrapper::new(schema.node_type("paragraph").unwrap(), None);
        let after = [Some(paragraph)];
        assert!(can_split(&d, 5, 1, &after));
        let mut tr = Transform::new(d);
        tr.split(5, 1, &after).unwrap();
        assert_eq!(tr.doc(), &doc((h1("abcd"), p(""))));
    }

    #[test]
    fn test_cannot_split_too_deep() {
        let d = doc(p("ab"));
        assert!(!can_split(&d, 2, 2, &[]));
        assert!(!can_split(&d, 100, 1, &[]));
    }

    #[test]
    fn test_join() {
        let d = doc((p("ab"), p("cd")));
        assert!(can_join(&d, 4));
        assert!(!can_join(&d, 2));
        let mut tr = Transform::new(d);
        tr.join(4, 1).unwrap();
        assert_eq!(tr.doc(), &doc(p("abcd")));
    }

    #[test]
    fn test_cannot_join_leaf() {
        let d = doc((hr(), p("a")));
        assert!(!can_join(&d, 1));
        let d = doc((p("a"), ul(li(p("b")))));
        assert!(!can_join(&d, 3));
    }

    #[test]
    fn test_join_point() {
        let d = doc((blockquote(p("a")), blockquote(p("b"))));
        // From inside the second paragraph, the closest joinable point is between the
        // blockquotes.
        assert_eq!(join_point(&d, 8, false), Some(5));
        assert_eq!(join_point(&d, 2, true), Some(5));
    }

    #[test]
    fn test_insert_point() {
        let schema = markdown_schema();
        let hr_type = schema.node_type("horizontal_rule").unwrap();
        let d = doc(p("ab"));
        assert_eq!(insert_point(&d, 0, &hr_type), Some(0));
        assert_eq!(insert_point(&d, 1, &hr_type), Some(0));
        assert_eq!(insert_point(&d, 3, &hr_type), Some(4));
        assert_eq!(insert_point(&d, 2, &hr_type), None);
    }
}
