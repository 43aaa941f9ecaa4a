use crate::{
    AddMarkStep, Mappable, RemoveMarkStep, ReplaceAroundStep, ReplaceStep, Step, StepMap,
};
use displaydoc::Display;
use parchment_model::{InsertError, Node, NodeError, ReplaceError, ResolveErr, Schema, SliceError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};
use thiserror::Error;

/// Different ways a step application can fail
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum StepError {
    /// Structure replace would overwrite content
    WouldOverwrite,
    /// Structure gap-replace would overwrite content
    GapWouldOverwrite,
    /// Gap is not a flat range
    GapNotFlat,
    /// Content does not fit in gap
    GapNotFit,
    /// Invalid indices: {0}
    Resolve(#[from] ResolveErr),
    /// Invalid replace: {0}
    Replace(#[from] ReplaceError),
    /// Invalid slice: {0}
    Slice(#[from] SliceError),
    /// Insert error: {0}
    Insert(#[from] InsertError),
}

/// The result of [applying](StepKind::apply) a step. Contains either a
/// new document or a failure value.
pub type StepResult = Result<Node, StepError>;

/// A step object represents an atomic change.
///
/// It generally applies only to the document it was created for, since the positions
/// stored in it will only make sense for that document.
pub trait StepKind {
    /// Applies this step to the given document, returning a result
    /// object that either indicates failure, if the step can not be
    /// applied to this document, or indicates success by containing a
    /// transformed document.
    fn apply(&self, doc: &Node) -> StepResult;

    /// Get the step map that represents the changes made by this step, and which can be
    /// used to transform between positions in the old and the new document.
    fn get_map(&self) -> StepMap {
        StepMap::empty()
    }

    /// Create an inverted version of this step. Needs the document as it was before the
    /// step as argument.
    fn invert(&self, doc: &Node) -> Result<Step, StepError>;

    /// Map this step through a mappable thing, returning either a version of that step
    /// with its positions adjusted, or `None` if the step was entirely deleted by the
    /// mapping.
    fn map(&self, mapping: &dyn Mappable) -> Option<Step>;
}

/// Errors when reading a step from JSON
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum StepJsonError {
    /// Missing `stepType` property
    MissingType,
    /// No step type {0} defined
    UnknownType(String),
    /// Duplicate use of step JSON ID {0}
    DuplicateType(String),
    /// Malformed step: {0}
    Malformed(String),
    /// Invalid step content: {0}
    Content(#[from] NodeError),
}

impl From<serde_json::Error> for StepJsonError {
    fn from(e: serde_json::Error) -> Self {
        StepJsonError::Malformed(e.to_string())
    }
}

/// A function that reads a step of a registered type from its JSON representation
pub type StepParser = fn(&Schema, &Value) -> Result<Step, StepJsonError>;

fn registry() -> &'static RwLock<HashMap<String, StepParser>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, StepParser>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut parsers: HashMap<String, StepParser> = HashMap::new();
        parsers.insert("replace".into(), ReplaceStep::from_json);
        parsers.insert("replaceAround".into(), ReplaceAroundStep::from_json);
        parsers.insert("addMark".into(), AddMarkStep::from_json);
        parsers.insert("removeMark".into(), RemoveMarkStep::from_json);
        RwLock::new(parsers)
    })
}

/// Register a parser for the given `stepType` ID, so that [`Step::from_json`] can read
/// steps with that ID. IDs can only be registered once.
pub fn register_step_type(id: &str, parser: StepParser) -> Result<(), StepJsonError> {
    let mut parsers = registry().write().unwrap_or_else(PoisonError::into_inner);
    if parsers.contains_key(id) {
        return Err(StepJsonError::DuplicateType(id.to_owned()));
    }
    parsers.insert(id.to_owned(), parser);
    Ok(())
}

pub(crate) fn step_parser(id: &str) -> Result<StepParser, StepJsonError> {
    let parsers = registry().read().unwrap_or_else(PoisonError::into_inner);
    parsers
        .get(id)
        .copied()
        .ok_or_else(|| StepJsonError::UnknownType(id.to_owned()))
}
