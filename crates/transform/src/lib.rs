#![warn(missing_docs)]
//! # The document transformations
//!
//! Steps are atomic, invertible changes to a document. A [`Transform`] applies a sequence of
//! them and offers the higher-level editing operations (replacing with slice fitting, lifting,
//! wrapping, splitting, joining and marking) that are built on top of steps.
mod map;
mod mark;
mod mark_step;
mod replace;
mod replace_step;
mod step;
mod structure;
mod transform;
mod util;

pub use map::{Assoc, MapResult, Mappable, Mapping, Recover, StepMap};
pub use mark::MarkFilter;
pub use mark_step::{AddMarkStep, RemoveMarkStep};
pub use replace::replace_step;
pub use replace_step::{ReplaceAroundStep, ReplaceStep};
pub use step::{register_step_type, StepError, StepJsonError, StepKind, StepParser, StepResult};
pub use structure::{
    can_join, can_split, find_wrapping, insert_point, join_point, lift_target, Wrapper,
};
pub use transform::{Transform, TransformError};
pub use util::Span;

use parchment_model::{Node, Schema};
use serde::Serialize;
use serde_json::Value;

/// Steps that can be applied on a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stepType", rename_all = "camelCase")]
pub enum Step {
    /// Replace some content
    Replace(ReplaceStep),
    /// Replace around some content
    ReplaceAround(ReplaceAroundStep),
    /// Add a mark to a span
    AddMark(AddMarkStep),
    /// Remove a mark from a span
    RemoveMark(RemoveMarkStep),
}

impl Step {
    fn kind(&self) -> &dyn StepKind {
        match self {
            Self::Replace(r_step) => r_step,
            Self::ReplaceAround(ra_step) => ra_step,
            Self::AddMark(am_step) => am_step,
            Self::RemoveMark(rm_step) => rm_step,
        }
    }

    /// Apply the step to the given node
    pub fn apply(&self, doc: &Node) -> StepResult {
        self.kind().apply(doc)
    }

    /// The step map describing the position changes made by this step
    pub fn get_map(&self) -> StepMap {
        self.kind().get_map()
    }

    /// Create the step that undoes this one, given the document it was applied to
    pub fn invert(&self, doc: &Node) -> Result<Step, StepError> {
        self.kind().invert(doc)
    }

    /// Map this step through a mapping, returning `None` if it was deleted
    pub fn map(&self, mapping: &dyn Mappable) -> Option<Step> {
        self.kind().map(mapping)
    }

    /// Try to merge this step with another one, to be applied directly after it.
    pub fn merge(&self, other: &Step) -> Option<Step> {
        match (self, other) {
            (Self::Replace(a), Self::Replace(b)) => a.merge(b).map(Step::Replace),
            (Self::AddMark(a), Self::AddMark(b)) => a.merge(b).map(Step::AddMark),
            (Self::RemoveMark(a), Self::RemoveMark(b)) => a.merge(b).map(Step::RemoveMark),
            _ => None,
        }
    }

    /// The JSON ID this step is registered under
    pub fn step_type(&self) -> &'static str {
        match self {
            Self::Replace(_) => "replace",
            Self::ReplaceAround(_) => "replaceAround",
            Self::AddMark(_) => "addMark",
            Self::RemoveMark(_) => "removeMark",
        }
    }

    /// Create a JSON-serializeable representation of this step.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Deserialize a step from its JSON representation. Dispatches on the `stepType`
    /// property, using the parsers passed to [`register_step_type`].
    pub fn from_json(schema: &Schema, json: &Value) -> Result<Step, StepJsonError> {
        let id = json
            .get("stepType")
            .and_then(Value::as_str)
            .ok_or(StepJsonError::MissingType)?;
        let parser = step::step_parser(id)?;
        parser(schema, json)
    }
}

impl From<ReplaceStep> for Step {
    fn from(step: ReplaceStep) -> Self {
        Step::Replace(step)
    }
}

impl From<ReplaceAroundStep> for Step {
    fn from(step: ReplaceAroundStep) -> Self {
        Step::ReplaceAround(step)
    }
}

impl From<AddMarkStep> for Step {
    fn from(step: AddMarkStep) -> Self {
        Step::AddMark(step)
    }
}

impl From<RemoveMarkStep> for Step {
    fn from(step: RemoveMarkStep) -> Self {
        Step::RemoveMark(step)
    }
}
