use crate::{Assoc, Mappable, Span, Step, StepError, StepJsonError, StepKind, StepMap, StepResult};
use parchment_model::{Node, ResolveErr, Schema, Slice};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Replace some part of the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceStep {
    /// The affected span
    #[serde(flatten)]
    pub span: Span,
    /// The slice to replace the current content with
    #[serde(skip_serializing_if = "Slice::is_empty")]
    pub slice: Slice,
    /// Whether this is a structural change
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub structure: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReplaceStep {
    from: usize,
    to: usize,
    #[serde(default)]
    slice: Value,
    #[serde(default)]
    structure: bool,
}

impl ReplaceStep {
    /// The given `slice` should fit the 'gap' between `from` and `to`. When `structure` is
    /// true, the step will fail if the content between from and to is not just a sequence
    /// of closing and then opening tokens (this is to guard against rebased replace steps
    /// overwriting something they weren't supposed to).
    pub fn new(from: usize, to: usize, slice: Slice, structure: bool) -> Self {
        ReplaceStep {
            span: Span::new(from, to),
            slice,
            structure,
        }
    }

    /// Try to merge this step with another one, to be applied directly after it. Returns
    /// the merged step when possible, `None` if the steps can't be merged.
    pub fn merge(&self, other: &ReplaceStep) -> Option<ReplaceStep> {
        if other.structure || self.structure {
            return None;
        }
        let empty = self.slice.size() + other.slice.size() == 0;
        if self.span.from + self.slice.size() == other.span.from
            && self.slice.open_end == 0
            && other.slice.open_start == 0
        {
            let slice = if empty {
                Slice::empty()
            } else {
                Slice::new(
                    self.slice.content.clone().append(other.slice.content.clone()),
                    self.slice.open_start,
                    other.slice.open_end,
                )
            };
            Some(ReplaceStep::new(
                self.span.from,
                self.span.to + other.span.len(),
                slice,
                self.structure,
            ))
        } else if other.span.to == self.span.from
            && self.slice.open_start == 0
            && other.slice.open_end == 0
        {
            let slice = if empty {
                Slice::empty()
            } else {
                Slice::new(
                    other.slice.content.clone().append(self.slice.content.clone()),
                    other.slice.open_start,
                    self.slice.open_end,
                )
            };
            Some(ReplaceStep::new(
                other.span.from,
                self.span.to,
                slice,
                self.structure,
            ))
        } else {
            None
        }
    }

    pub(crate) fn from_json(schema: &Schema, json: &Value) -> Result<Step, StepJsonError> {
        let raw = RawReplaceStep::deserialize(json)?;
        if raw.from > raw.to {
            return Err(StepJsonError::Malformed(format!(
                "replace range {}..{} is reversed",
                raw.from, raw.to
            )));
        }
        let slice = Slice::from_json(schema, &raw.slice)?;
        Ok(Step::Replace(ReplaceStep::new(
            raw.from,
            raw.to,
            slice,
            raw.structure,
        )))
    }
}

impl StepKind for ReplaceStep {
    fn apply(&self, doc: &Node) -> StepResult {
        let from = self.span.from;
        let to = self.span.to;
        if self.structure && content_between(doc, from, to)? {
            Err(StepError::WouldOverwrite)
        } else {
            let node = doc.replace(from..to, &self.slice)?;
            Ok(node)
        }
    }

    fn get_map(&self) -> StepMap {
        StepMap::new(
            vec![self.span.from, self.span.len(), self.slice.size()],
            false,
        )
    }

    fn invert(&self, doc: &Node) -> Result<Step, StepError> {
        let slice = doc.slice(self.span.range(), false)?;
        Ok(Step::Replace(ReplaceStep::new(
            self.span.from,
            self.span.from + self.slice.size(),
            slice,
            false,
        )))
    }

    fn map(&self, mapping: &dyn Mappable) -> Option<Step> {
        let from = mapping.map_result(self.span.from, Assoc::Right);
        let to = mapping.map_result(self.span.to, Assoc::Left);
        if from.deleted_across() && to.deleted_across() {
            return None;
        }
        Some(Step::Replace(ReplaceStep::new(
            from.pos,
            from.pos.max(to.pos),
            self.slice.clone(),
            self.structure,
        )))
    }
}

/// Replace the document structure while keeping some content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceAroundStep {
    /// The affected part of the document
    #[serde(flatten)]
    pub span: Span,
    /// Start of the gap
    pub gap_from: usize,
    /// End of the gap
    pub gap_to: usize,
    /// The inner slice
    #[serde(skip_serializing_if = "Slice::is_empty")]
    pub slice: Slice,
    /// The position in the slice where the gap content is inserted
    pub insert: usize,
    /// Whether this is a structural change
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub structure: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReplaceAroundStep {
    from: usize,
    to: usize,
    gap_from: usize,
    gap_to: usize,
    insert: usize,
    #[serde(default)]
    slice: Value,
    #[serde(default)]
    structure: bool,
}

impl ReplaceAroundStep {
    /// Create a replace-around step with the given range and gap. `insert` should be the
    /// point in the slice into which the content of the gap should be moved. `structure`
    /// has the same meaning as it has in the [`ReplaceStep`] type.
    pub fn new(
        from: usize,
        to: usize,
        gap_from: usize,
        gap_to: usize,
        slice: Slice,
        insert: usize,
        structure: bool,
    ) -> Self {
        ReplaceAroundStep {
            span: Span::new(from, to),
            gap_from,
            gap_to,
            slice,
            insert,
            structure,
        }
    }

    pub(crate) fn from_json(schema: &Schema, json: &Value) -> Result<Step, StepJsonError> {
        let raw = RawReplaceAroundStep::deserialize(json)?;
        if !(raw.from <= raw.gap_from && raw.gap_from <= raw.gap_to && raw.gap_to <= raw.to) {
            return Err(StepJsonError::Malformed(format!(
                "gap {}..{} is not inside {}..{}",
                raw.gap_from, raw.gap_to, raw.from, raw.to
            )));
        }
        let slice = Slice::from_json(schema, &raw.slice)?;
        if raw.insert > slice.size() {
            return Err(StepJsonError::Malformed(format!(
                "insert position {} is past the slice size {}",
                raw.insert,
                slice.size()
            )));
        }
        Ok(Step::ReplaceAround(ReplaceAroundStep::new(
            raw.from,
            raw.to,
            raw.gap_from,
            raw.gap_to,
            slice,
            raw.insert,
            raw.structure,
        )))
    }
}

impl StepKind for ReplaceAroundStep {
    fn apply(&self, doc: &Node) -> StepResult {
        if self.structure
            && (content_between(doc, self.span.from, self.gap_from)?
                || content_between(doc, self.gap_to, self.span.to)?)
        {
            return Err(StepError::GapWouldOverwrite);
        }

        let gap = doc.slice(self.gap_from..self.gap_to, false)?;
        if gap.open_start != 0 || gap.open_end != 0 {
            return Err(StepError::GapNotFlat);
        }

        let inserted = self.slice.insert_at(self.insert, gap.content)?;
        let inserted = inserted.ok_or(StepError::GapNotFit)?;

        let result = doc.replace(self.span.range(), &inserted)?;
        Ok(result)
    }

    fn get_map(&self) -> StepMap {
        StepMap::new(
            vec![
                self.span.from,
                self.gap_from - self.span.from,
                self.insert,
                self.gap_to,
                self.span.to - self.gap_to,
                self.slice.size() - self.insert,
            ],
            false,
        )
    }

    fn invert(&self, doc: &Node) -> Result<Step, StepError> {
        let gap = self.gap_to - self.gap_from;
        let from = self.span.from;
        let slice = doc
            .slice(from..self.span.to, false)?
            .remove_between(self.gap_from - from, self.gap_to - from)?;
        Ok(Step::ReplaceAround(ReplaceAroundStep::new(
            from,
            from + self.slice.size() + gap,
            from + self.insert,
            from + self.insert + gap,
            slice,
            self.gap_from - from,
            self.structure,
        )))
    }

    fn map(&self, mapping: &dyn Mappable) -> Option<Step> {
        let from = mapping.map_result(self.span.from, Assoc::Right);
        let to = mapping.map_result(self.span.to, Assoc::Left);
        let gap_from = if self.span.from == self.gap_from {
            from.pos
        } else {
            mapping.map(self.gap_from, Assoc::Left)
        };
        let gap_to = if self.span.to == self.gap_to {
            to.pos
        } else {
            mapping.map(self.gap_to, Assoc::Right)
        };
        if (from.deleted_across() && to.deleted_across()) || gap_from < from.pos || gap_to > to.pos {
            return None;
        }
        Some(Step::ReplaceAround(ReplaceAroundStep::new(
            from.pos,
            to.pos,
            gap_from,
            gap_to,
            self.slice.clone(),
            self.insert,
            self.structure,
        )))
    }
}

/// Whether there is non-structural content (anything besides closing and opening tokens)
/// between the two positions.
fn content_between(doc: &Node, from: usize, to: usize) -> Result<bool, ResolveErr> {
    let rp_from = doc.resolve(from)?;
    let mut dist = to - from;
    let mut depth = rp_from.depth();
    while dist > 0 && depth > 0 && rp_from.index_after(depth) == rp_from.node(depth).child_count() {
        depth -= 1;
        dist -= 1;
    }
    if dist > 0 {
        let mut next = rp_from.node(depth).maybe_child(rp_from.index_after(depth));
        while dist > 0 {
            match next {
                Some(c) if !c.is_leaf() => {
                    next = c.first_child();
                    dist -= 1;
                }
                _ => return Ok(true),
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::{ReplaceAroundStep, ReplaceStep};
    use crate::{Assoc, Mappable, StepKind, StepMap};
    use parchment_markdown::helper::{blockquote, doc, p};
    use parchment_model::{Fragment, Slice};

    #[test]
    fn test_structure_guard() {
        let d = doc((p("ab"), p("cd")));
        // closing and opening tokens only
        let ok = ReplaceStep::new(4, 6, Slice::empty(), true);
        assert_eq!(ok.apply(&d).unwrap(), doc(p("abcd")));
        // would eat text
        let bad = ReplaceStep::new(3, 6, Slice::empty(), true);
        assert!(bad.apply(&d).is_err());
    }

    #[test]
    fn test_step_map() {
        let step = ReplaceStep::new(2, 4, Slice::new(Fragment::from(p("x")), 0, 0), false);
        let map = step.get_map();
        assert_eq!(map, StepMap::new(vec![2, 2, 3], false));
        assert_eq!(map.map(5, Assoc::Right), 6);
    }

    #[test]
    fn test_replace_around_wrap() {
        let d = doc(p("ab"));
        let wrapper = blockquote(());
        let step = ReplaceAroundStep::new(0, 4, 0, 4, Slice::new(Fragment::from(wrapper), 0, 0), 1, true);
        let wrapped = step.apply(&d).unwrap();
        assert_eq!(wrapped, doc(blockquote(p("ab"))));
        assert_eq!(step.get_map().map(1, Assoc::Right), 2);

        let inverted = step.invert(&d).unwrap();
        assert_eq!(inverted.apply(&wrapped).unwrap(), d);
    }

    #[test]
    fn test_map_deleted() {
        let step = ReplaceStep::new(3, 4, Slice::empty(), false);
        let deleting = StepMap::new(vec![2, 4, 0], false);
        assert!(step.map(&deleting).is_none());
        let shifting = StepMap::new(vec![0, 0, 2], false);
        let mapped = step.map(&shifting).unwrap();
        assert_eq!(mapped, crate::Step::Replace(ReplaceStep::new(5, 6, Slice::empty(), false)));
    }
}
