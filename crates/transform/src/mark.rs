use crate::{AddMarkStep, RemoveMarkStep, ReplaceStep, Transform, TransformError};
use parchment_model::{ContentMatch, Fragment, Mark, MarkType, NodeType, Slice};

/// Selects the marks that [`Transform::remove_mark`] removes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkFilter {
    /// Remove exactly this mark
    Mark(Mark),
    /// Remove every mark of this type
    Type(MarkType),
    /// Remove all marks
    All,
}

impl From<Mark> for MarkFilter {
    fn from(mark: Mark) -> Self {
        MarkFilter::Mark(mark)
    }
}

impl From<MarkType> for MarkFilter {
    fn from(mark_type: MarkType) -> Self {
        MarkFilter::Type(mark_type)
    }
}

impl MarkFilter {
    fn matching(&self, marks: &[Mark]) -> Vec<Mark> {
        match self {
            MarkFilter::Mark(mark) if mark.is_in_set(marks) => vec![mark.clone()],
            MarkFilter::Mark(_) => vec![],
            MarkFilter::Type(mark_type) => {
                let mut found = Vec::new();
                let mut set = marks.to_vec();
                while let Some(mark) = mark_type.is_in_set(&set).cloned() {
                    set = mark.remove_from_set(&set);
                    found.push(mark);
                }
                found
            }
            MarkFilter::All => marks.to_vec(),
        }
    }
}

struct MatchedMark {
    style: Mark,
    from: usize,
    to: usize,
    step: usize,
}

impl Transform {
    /// Add the given mark to the inline content between `from` and `to`.
    pub fn add_mark(&mut self, from: usize, to: usize, mark: &Mark) -> Result<&mut Self, TransformError> {
        let mut removed: Vec<RemoveMarkStep> = Vec::new();
        let mut added: Vec<AddMarkStep> = Vec::new();
        let mut removing: Option<usize> = None;
        let mut adding: Option<usize> = None;
        self.doc().nodes_between(from, to, &mut |node, pos, parent, _| {
            if !node.is_inline() {
                return true;
            }
            let marks = node.marks();
            let allowed = parent.map_or(false, |p| p.r#type().allows_mark_type(mark.r#type()));
            if !mark.is_in_set(marks) && allowed {
                let start = pos.max(from);
                let end = (pos + node.node_size()).min(to);
                let new_set = mark.add_to_set(marks);

                for old in marks.iter().filter(|m| !m.is_in_set(&new_set)) {
                    match removing {
                        Some(i) if removed[i].span.to == start && &removed[i].mark == old => {
                            removed[i].span.to = end
                        }
                        _ => {
                            removing = Some(removed.len());
                            removed.push(RemoveMarkStep::new(start, end, old.clone()));
                        }
                    }
                }

                match adding {
                    Some(i) if added[i].span.to == start => added[i].span.to = end,
                    _ => {
                        adding = Some(added.len());
                        added.push(AddMarkStep::new(start, end, mark.clone()));
                    }
                }
            }
            true
        });

        for step in removed {
            self.step(step)?;
        }
        for step in added {
            self.step(step)?;
        }
        Ok(self)
    }

    /// Remove marks from inline nodes between `from` and `to`. The filter selects a single
    /// mark, all marks of a type, or all marks.
    pub fn remove_mark<F: Into<MarkFilter>>(
        &mut self,
        from: usize,
        to: usize,
        filter: F,
    ) -> Result<&mut Self, TransformError> {
        let filter = filter.into();
        let mut matched: Vec<MatchedMark> = Vec::new();
        let mut step = 0;
        self.doc().nodes_between(from, to, &mut |node, pos, _, _| {
            if !node.is_inline() {
                return true;
            }
            step += 1;
            let to_remove = filter.matching(node.marks());
            let end = (pos + node.node_size()).min(to);
            for style in to_remove {
                // Extend a run from the directly preceding inline node
                match matched
                    .iter_mut()
                    .find(|m| m.step + 1 == step && m.style == style)
                {
                    Some(found) => {
                        found.to = end;
                        found.step = step;
                    }
                    None => matched.push(MatchedMark {
                        style,
                        from: pos.max(from),
                        to: end,
                        step,
                    }),
                }
            }
            true
        });
        for m in matched {
            self.step(RemoveMarkStep::new(m.from, m.to, m.style))?;
        }
        Ok(self)
    }

    /// Removes all marks and nodes from the content of the node at `pos` that don't match
    /// the given new parent node type. Accepts an optional starting content match as third
    /// argument.
    pub fn clear_incompatible(
        &mut self,
        pos: usize,
        parent_type: &NodeType,
        r#match: Option<ContentMatch>,
    ) -> Result<&mut Self, TransformError> {
        let node = self.doc().node_at(pos).ok_or(TransformError::NoNodeAt(pos))?;
        let mut r#match = r#match.unwrap_or_else(|| parent_type.content_match());
        let mut del_steps = Vec::new();
        let mut cur = pos + 1;
        for child in node.content().children() {
            let end = cur + child.node_size();
            match r#match.match_type(child.r#type()) {
                None => del_steps.push(ReplaceStep::new(cur, end, Slice::empty(), false)),
                Some(allowed) => {
                    r#match = allowed;
                    for mark in child.marks() {
                        if !parent_type.allows_mark_type(mark.r#type()) {
                            self.step(RemoveMarkStep::new(cur, end, mark.clone()))?;
                        }
                    }
                }
            }
            cur = end;
        }
        if !r#match.valid_end() {
            if let Some(fill) = r#match.fill_before(&Fragment::new(), true, 0) {
                self.replace(cur, cur, Slice::new(fill, 0, 0))?;
            }
        }
        for step in del_steps.into_iter().rev() {
            self.step(step)?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::MarkFilter;
    use crate::Transform;
    use parchment_markdown::helper::{br, code_block, doc, em, link, mark, marked, p, strong};
    use parchment_markdown::markdown_schema;
    use parchment_model::Attrs;

    #[test]
    fn test_add_mark() {
        let mut tr = Transform::new(doc(p("hello")));
        tr.add_mark(2, 4, &mark("em")).unwrap();
        assert_eq!(tr.doc(), &doc(p(("h", em("el"), "lo"))));
    }

    #[test]
    fn test_add_mark_single_step_across_nodes() {
        let mut tr = Transform::new(doc(p(("ab", strong("cd")))));
        tr.add_mark(1, 5, &mark("em")).unwrap();
        assert_eq!(tr.steps().len(), 1);
        assert_eq!(
            tr.doc(),
            &doc(p((
                marked("ab", vec![mark("em")]),
                marked("cd", vec![mark("em"), mark("strong")]),
            )))
        );
    }

    #[test]
    fn test_add_mark_replaces_excluded() {
        let schema = markdown_schema();
        let mut attrs = Attrs::new();
        attrs.insert("href".into(), "b".into());
        let link_b = schema.mark("link", Some(&attrs)).unwrap();
        let mut tr = Transform::new(doc(p(link("a", "xy"))));
        tr.add_mark(1, 3, &link_b).unwrap();
        assert_eq!(tr.steps().len(), 2);
        assert_eq!(tr.doc(), &doc(p(link("b", "xy"))));
    }

    #[test]
    fn test_add_mark_skips_code_block() {
        let d = doc(code_block("", "x"));
        let mut tr = Transform::new(d.clone());
        tr.add_mark(1, 2, &mark("strong")).unwrap();
        assert!(!tr.doc_changed());
        assert_eq!(tr.doc(), &d);
    }

    #[test]
    fn test_remove_mark_by_type() {
        let schema = markdown_schema();
        let em_type = schema.mark_type("em").unwrap();
        let mut tr = Transform::new(doc(p((em("ab"), "c", em("d")))));
        tr.remove_mark(1, 5, em_type).unwrap();
        assert_eq!(tr.doc(), &doc(p("abcd")));
        assert_eq!(tr.steps().len(), 2);
    }

    #[test]
    fn test_remove_single_mark_partially() {
        let mut tr = Transform::new(doc(p(em("abc"))));
        tr.remove_mark(2, 3, mark("em")).unwrap();
        assert_eq!(tr.doc(), &doc(p((em("a"), "b", em("c")))));
    }

    #[test]
    fn test_remove_all_marks() {
        let mut tr = Transform::new(doc(p((strong("a"), marked("b", vec![mark("em"), mark("strong")])))));
        tr.remove_mark(1, 3, MarkFilter::All).unwrap();
        assert_eq!(tr.doc(), &doc(p("ab")));
    }

    #[test]
    fn test_clear_incompatible() {
        let schema = markdown_schema();
        let code = schema.node_type("code_block").unwrap();
        let mut tr = Transform::new(doc(p((em("a"), br(), "b"))));
        tr.clear_incompatible(0, &code, None).unwrap();
        assert_eq!(tr.doc(), &doc(p("ab")));
    }

    #[test]
    fn test_set_block_type_clears_marks() {
        let schema = markdown_schema();
        let code = schema.node_type("code_block").unwrap();
        let mut tr = Transform::new(doc(p(em("ab"))));
        tr.set_block_type(1, 1, &code, None).unwrap();
        assert_eq!(tr.doc(), &doc(code_block("", "ab")));
    }
}
