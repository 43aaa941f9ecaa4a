use crate::{Assoc, Mappable, Span, Step, StepError, StepJsonError, StepKind, StepResult};
use parchment_model::{Fragment, Mark, Node, Schema, Slice};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn map_fragment<F>(fragment: &Fragment, f: &F, parent: &Node) -> Fragment
where
    F: Fn(Node, &Node) -> Node,
{
    let mut mapped = vec![];
    for child in fragment.children() {
        let mut child = if child.content_size() > 0 {
            child.copy(|c| map_fragment(c, f, child))
        } else {
            child.clone()
        };

        if child.is_inline() {
            child = f(child, parent)
        }
        mapped.push(child)
    }
    Fragment::from_array(mapped)
}

#[derive(Deserialize)]
struct RawMarkStep {
    from: usize,
    to: usize,
    mark: Value,
}

impl RawMarkStep {
    fn parse(schema: &Schema, json: &Value) -> Result<(usize, usize, Mark), StepJsonError> {
        let raw = RawMarkStep::deserialize(json)?;
        if raw.from > raw.to {
            return Err(StepJsonError::Malformed(format!(
                "mark range {}..{} is reversed",
                raw.from, raw.to
            )));
        }
        let mark = Mark::from_json(schema, &raw.mark)?;
        Ok((raw.from, raw.to, mark))
    }
}

/// Adding a mark on some part of the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMarkStep {
    /// The affected part of the document
    #[serde(flatten)]
    pub span: Span,
    /// The mark to add
    pub mark: Mark,
}

impl AddMarkStep {
    /// Create a mark step.
    pub fn new(from: usize, to: usize, mark: Mark) -> Self {
        AddMarkStep {
            span: Span::new(from, to),
            mark,
        }
    }

    /// Merge with an overlapping step that adds the same mark.
    pub fn merge(&self, other: &AddMarkStep) -> Option<AddMarkStep> {
        if other.mark == self.mark && self.span.touches(&other.span) {
            let span = self.span.cover(&other.span);
            Some(AddMarkStep::new(span.from, span.to, self.mark.clone()))
        } else {
            None
        }
    }

    pub(crate) fn from_json(schema: &Schema, json: &Value) -> Result<Step, StepJsonError> {
        let (from, to, mark) = RawMarkStep::parse(schema, json)?;
        Ok(Step::AddMark(AddMarkStep::new(from, to, mark)))
    }
}

impl StepKind for AddMarkStep {
    fn apply(&self, doc: &Node) -> StepResult {
        let old_slice = doc.slice(self.span.range(), false)?;
        let rp_from = doc.resolve(self.span.from)?;
        let parent = rp_from.node(rp_from.shared_depth(self.span.to));

        let new_content = map_fragment(
            &old_slice.content,
            &|node, parent| {
                if !node.is_atom() || !parent.r#type().allows_mark_type(self.mark.r#type()) {
                    node
                } else {
                    let marks = self.mark.add_to_set(node.marks());
                    node.mark(marks)
                }
            },
            parent,
        );

        let slice = Slice::new(new_content, old_slice.open_start, old_slice.open_end);
        let new_node = doc.replace(self.span.range(), &slice)?;
        Ok(new_node)
    }

    fn invert(&self, _doc: &Node) -> Result<Step, StepError> {
        Ok(Step::RemoveMark(RemoveMarkStep::new(
            self.span.from,
            self.span.to,
            self.mark.clone(),
        )))
    }

    fn map(&self, mapping: &dyn Mappable) -> Option<Step> {
        let from = mapping.map_result(self.span.from, Assoc::Right);
        let to = mapping.map_result(self.span.to, Assoc::Left);
        if (from.deleted() && to.deleted()) || from.pos >= to.pos {
            return None;
        }
        Some(Step::AddMark(AddMarkStep::new(
            from.pos,
            to.pos,
            self.mark.clone(),
        )))
    }
}

/// Removing a mark on some part of the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMarkStep {
    /// The affected part of the document
    #[serde(flatten)]
    pub span: Span,
    /// The mark to remove
    pub mark: Mark,
}

impl RemoveMarkStep {
    /// Create a mark-removing step.
    pub fn new(from: usize, to: usize, mark: Mark) -> Self {
        RemoveMarkStep {
            span: Span::new(from, to),
            mark,
        }
    }

    /// Merge with an overlapping step that removes the same mark.
    pub fn merge(&self, other: &RemoveMarkStep) -> Option<RemoveMarkStep> {
        if other.mark == self.mark && self.span.touches(&other.span) {
            let span = self.span.cover(&other.span);
            Some(RemoveMarkStep::new(span.from, span.to, self.mark.clone()))
        } else {
            None
        }
    }

    pub(crate) fn from_json(schema: &Schema, json: &Value) -> Result<Step, StepJsonError> {
        let (from, to, mark) = RawMarkStep::parse(schema, json)?;
        Ok(Step::RemoveMark(RemoveMarkStep::new(from, to, mark)))
    }
}

impl StepKind for RemoveMarkStep {
    fn apply(&self, doc: &Node) -> StepResult {
        let old_slice = doc.slice(self.span.range(), false)?;

        let new_content = map_fragment(
            &old_slice.content,
            &|node, _| {
                let marks = self.mark.remove_from_set(node.marks());
                node.mark(marks)
            },
            doc,
        );

        let slice = Slice::new(new_content, old_slice.open_start, old_slice.open_end);
        let new_node = doc.replace(self.span.range(), &slice)?;
        Ok(new_node)
    }

    fn invert(&self, _doc: &Node) -> Result<Step, StepError> {
        Ok(Step::AddMark(AddMarkStep::new(
            self.span.from,
            self.span.to,
            self.mark.clone(),
        )))
    }

    fn map(&self, mapping: &dyn Mappable) -> Option<Step> {
        let from = mapping.map_result(self.span.from, Assoc::Right);
        let to = mapping.map_result(self.span.to, Assoc::Left);
        if (from.deleted() && to.deleted()) || from.pos >= to.pos {
            return None;
        }
        Some(Step::RemoveMark(RemoveMarkStep::new(
            from.pos,
            to.pos,
            self.mark.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::{AddMarkStep, RemoveMarkStep};
    use crate::StepKind;
    use parchment_markdown::helper::{code_block, doc, em, mark, p};

    #[test]
    fn test_add_and_remove() {
        let d = doc(p("hello"));
        let step = AddMarkStep::new(2, 4, mark("em"));
        let marked = step.apply(&d).unwrap();
        assert_eq!(marked, doc(p(("h", em("el"), "lo"))));

        let inverted = step.invert(&d).unwrap();
        assert_eq!(inverted.apply(&marked).unwrap(), d);

        let removed = RemoveMarkStep::new(1, 6, mark("em")).apply(&marked).unwrap();
        assert_eq!(removed, d);
    }

    #[test]
    fn test_add_mark_skips_disallowed_parent() {
        let d = doc(code_block("", "x = 1"));
        let marked = AddMarkStep::new(1, 4, mark("em")).apply(&d).unwrap();
        assert_eq!(marked, d);
    }

    #[test]
    fn test_merge() {
        let a = AddMarkStep::new(1, 3, mark("em"));
        let b = AddMarkStep::new(3, 5, mark("em"));
        assert_eq!(a.merge(&b), Some(AddMarkStep::new(1, 5, mark("em"))));
        let c = AddMarkStep::new(4, 5, mark("em"));
        assert_eq!(a.merge(&c), None);
        let d = AddMarkStep::new(2, 5, mark("strong"));
        assert_eq!(a.merge(&d), None);
    }
}
