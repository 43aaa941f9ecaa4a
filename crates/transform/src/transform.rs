use crate::{Mapping, Step, StepError, StepResult};
use displaydoc::Display;
use parchment_model::{Fragment, Node, NodeError, ResolveErr, Slice};
use thiserror::Error;
use tracing::debug;

/// Errors raised by the operations of a [`Transform`]
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum TransformError {
    /// Step failed: {0}
    Step(#[from] StepError),
    /// Invalid position: {0}
    Resolve(#[from] ResolveErr),
    /// Could not create node: {0}
    Node(#[from] NodeError),
    /// Type given to setBlockType should be a textblock
    NotTextblock,
    /// Wrapper type given to Transform.wrap does not form valid content of its parent wrapper
    InvalidWrapper,
    /// No node at position {0}
    NoNodeAt(usize),
    /// Cannot split {0} levels deep at this position
    SplitDepth(usize),
}

/// Abstraction to build up and track an array of [steps](Step) representing a document
/// transformation.
///
/// Most transforming methods return the `Transform` object itself, so that they can be
/// chained.
#[derive(Debug, Clone)]
pub struct Transform {
    doc: Node,
    steps: Vec<Step>,
    docs: Vec<Node>,
    mapping: Mapping,
}

impl Transform {
    /// Create a transform that starts with the given document.
    pub fn new(doc: Node) -> Self {
        Transform {
            doc,
            steps: Vec::new(),
            docs: Vec::new(),
            mapping: Mapping::new(),
        }
    }

    /// The current document (the result of applying the steps in the transform).
    pub fn doc(&self) -> &Node {
        &self.doc
    }

    /// The starting document.
    pub fn before(&self) -> &Node {
        self.docs.first().unwrap_or(&self.doc)
    }

    /// The steps in this transform.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The documents before each of the steps.
    pub fn docs(&self) -> &[Node] {
        &self.docs
    }

    /// A mapping with the maps for each of the steps in this transform.
    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// True when the document has been changed (when there are any steps).
    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Apply a new step in this transform, saving the result. Fails when the step fails.
    pub fn step<S: Into<Step>>(&mut self, step: S) -> Result<&mut Self, TransformError> {
        self.maybe_step(step.into())?;
        Ok(self)
    }

    /// Try to apply a step in this transformation, ignoring it if it fails. Returns the
    /// step result.
    pub fn maybe_step(&mut self, step: Step) -> StepResult {
        match step.apply(&self.doc) {
            Ok(doc) => {
                self.add_step(step, doc.clone());
                Ok(doc)
            }
            Err(e) => {
                debug!(step_type = step.step_type(), error = %e, "step failed");
                Err(e)
            }
        }
    }

    fn add_step(&mut self, step: Step, doc: Node) {
        let before = std::mem::replace(&mut self.doc, doc);
        self.docs.push(before);
        self.mapping.append_map(step.get_map(), None);
        self.steps.push(step);
    }

    /// Replace the part of the document between `from` and `to` with the given `slice`,
    /// fitting it into the document structure when it doesn't fit directly.
    pub fn replace(&mut self, from: usize, to: usize, slice: Slice) -> Result<&mut Self, TransformError> {
        if let Some(step) = crate::replace_step(&self.doc, from, to, &slice)? {
            self.step(step)?;
        }
        Ok(self)
    }

    /// Replace the given range with the given content, which may be a fragment or a node.
    pub fn replace_with<C: Into<Fragment>>(
        &mut self,
        from: usize,
        to: usize,
        content: C,
    ) -> Result<&mut Self, TransformError> {
        self.replace(from, to, Slice::new(content.into(), 0, 0))
    }

    /// Delete the content between the given positions.
    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self, TransformError> {
        self.replace(from, to, Slice::empty())
    }

    /// Insert the given content at the given position.
    pub fn insert<C: Into<Fragment>>(&mut self, pos: usize, content: C) -> Result<&mut Self, TransformError> {
        self.replace_with(pos, pos, content)
    }
}

#[cfg(test)]
mod tests {
    use super::{Transform, TransformError};
    use crate::{ReplaceStep, StepError};
    use parchment_markdown::helper::{doc, p};
    use parchment_model::Slice;

    #[test]
    fn test_step_tracking() {
        let d = doc(p("abc"));
        let mut tr = Transform::new(d.clone());
        assert!(!tr.doc_changed());
        tr.delete(1, 2).unwrap().insert(3, p("x")).unwrap();
        assert!(tr.doc_changed());
        assert_eq!(tr.steps().len(), 2);
        assert_eq!(tr.docs().len(), 2);
        assert_eq!(tr.before(), &d);
        assert_eq!(tr.doc(), &doc((p("bc"), p("x"))));
        assert_eq!(tr.mapping().maps().len(), 2);
    }

    #[test]
    fn test_failing_step() {
        let mut tr = Transform::new(doc(p("abc")));
        let err = tr.step(ReplaceStep::new(2, 3, Slice::empty(), true)).unwrap_err();
        assert_eq!(err, TransformError::Step(StepError::WouldOverwrite));
        assert!(!tr.doc_changed());
        assert!(tr
            .maybe_step(ReplaceStep::new(2, 3, Slice::empty(), true).into())
            .is_err());
        assert!(tr.steps().is_empty());
    }
}
