use crate::content_expr::{self, MatchState, TypeInfo, EMPTY};
use crate::{
    ContentExprError, ContentMatch, Fragment, Mark, MarkSpec, Node, NodeError, NodeSpec,
    SchemaSpec,
};
use displaydoc::Display;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// The attributes of a node or mark
pub type Attrs = BTreeMap<String, Value>;

/// Errors when compiling a schema
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SchemaError {
    /// {0} can not be both a node and a mark
    DuplicateName(String),
    /// Schema is missing its top node type ('{0}')
    MissingTopNode(String),
    /// Every schema needs a 'text' type
    MissingText,
    /// The text node type should not have attributes
    TextAttributes,
    /// Unknown mark type: '{0}'
    UnknownMark(String),
    /// {0}
    Content(#[from] ContentExprError),
}

/// Errors when computing attributes
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum AttrError {
    /// No value supplied for attribute {name} of {owner}
    Missing {
        /// The attribute
        name: String,
        /// The node or mark type
        owner: String,
    },
}

#[derive(Debug)]
struct NodeTypeData {
    name: String,
    spec: NodeSpec,
    groups: Vec<String>,
    block: bool,
    text: bool,
    content_match: usize,
    inline_content: bool,
    /// `None` means all marks are allowed
    mark_set: Option<Vec<usize>>,
    default_attrs: Option<Attrs>,
}

#[derive(Debug)]
struct MarkTypeData {
    name: String,
    spec: MarkSpec,
    excluded: Vec<usize>,
    default_attrs: Option<Attrs>,
}

struct SchemaInner {
    spec: SchemaSpec,
    nodes: Vec<NodeTypeData>,
    marks: Vec<MarkTypeData>,
    states: Vec<MatchState>,
    top: usize,
    text: usize,
    wrappings: Mutex<HashMap<(usize, usize), Option<Vec<usize>>>>,
}

/// A document schema. Holds node and mark type objects for the nodes and marks that may
/// occur in conforming documents, and provides functionality for creating and
/// deserializing such documents.
///
/// Cloning a schema is cheap, all clones share the same compiled types. Two schemas are
/// equal only if they are clones of each other.
#[derive(Clone)]
pub struct Schema(Arc<SchemaInner>);

fn default_attrs(attrs: &IndexMap<String, crate::AttributeSpec>) -> Option<Attrs> {
    attrs
        .iter()
        .map(|(name, attr)| attr.default.clone().map(|value| (name.clone(), value)))
        .collect()
}

fn compute_attrs(
    attrs: &IndexMap<String, crate::AttributeSpec>,
    owner: &str,
    value: Option<&Attrs>,
) -> Result<Attrs, AttrError> {
    let mut built = Attrs::new();
    for (name, attr) in attrs {
        let given = value.and_then(|v| v.get(name)).or(attr.default.as_ref());
        match given {
            Some(given) => {
                built.insert(name.clone(), given.clone());
            }
            None => {
                return Err(AttrError::Missing {
                    name: name.clone(),
                    owner: owner.to_owned(),
                })
            }
        }
    }
    Ok(built)
}

fn split_names(names: &Option<String>) -> Vec<String> {
    names
        .as_deref()
        .map(|g| g.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

fn gather_marks(marks: &[MarkTypeData], names: &str) -> Result<Vec<usize>, SchemaError> {
    let mut found = Vec::new();
    for name in names.split_whitespace() {
        let mut ok = false;
        for (id, mark) in marks.iter().enumerate() {
            if name == "_"
                || mark.name == name
                || split_names(&mark.spec.group).iter().any(|g| g == name)
            {
                if !found.contains(&id) {
                    found.push(id);
                }
                ok = true;
            }
        }
        if !ok {
            return Err(SchemaError::UnknownMark(name.to_owned()));
        }
    }
    Ok(found)
}

impl Schema {
    /// Construct a schema from a schema specification.
    pub fn new(spec: SchemaSpec) -> Result<Schema, SchemaError> {
        let top_name = spec.top_node.clone().unwrap_or_else(|| "doc".to_owned());
        if let Some(name) = spec.marks.keys().find(|m| spec.nodes.contains_key(*m)) {
            return Err(SchemaError::DuplicateName(name.clone()));
        }
        let top = spec
            .nodes
            .get_index_of(&top_name)
            .ok_or(SchemaError::MissingTopNode(top_name))?;
        let text = spec
            .nodes
            .get_index_of("text")
            .ok_or(SchemaError::MissingText)?;
        if !spec.nodes[text].attrs.is_empty() {
            return Err(SchemaError::TextAttributes);
        }

        let mut marks: Vec<MarkTypeData> = spec
            .marks
            .iter()
            .map(|(name, mark)| MarkTypeData {
                name: name.clone(),
                spec: mark.clone(),
                excluded: Vec::new(),
                default_attrs: default_attrs(&mark.attrs),
            })
            .collect();
        for id in 0..marks.len() {
            let excluded = match marks[id].spec.excludes.as_deref() {
                None => vec![id],
                Some(names) => gather_marks(&marks, names)?,
            };
            marks[id].excluded = excluded;
        }

        let infos: Vec<TypeInfo> = spec
            .nodes
            .iter()
            .enumerate()
            .map(|(id, (name, node))| TypeInfo {
                name,
                groups: node
                    .group
                    .as_deref()
                    .map(|g| g.split_whitespace().collect())
                    .unwrap_or_default(),
                inline: node.inline || id == text,
                generatable: id != text && node.attrs.values().all(|a| a.default.is_some()),
            })
            .collect();

        let mut states = vec![MatchState::empty()];
        let mut compiled: HashMap<&str, usize> = HashMap::new();
        let mut nodes = Vec::with_capacity(spec.nodes.len());
        for (id, (name, node)) in spec.nodes.iter().enumerate() {
            let expr = node.content.as_deref().unwrap_or("");
            let content_match = match compiled.get(expr) {
                Some(&start) => {
                    debug!(node = %name, expr, "reusing compiled content expression");
                    start
                }
                None => {
                    let start = content_expr::compile(expr, &infos, &mut states)?;
                    compiled.insert(expr, start);
                    start
                }
            };
            let inline_content = states[content_match]
                .next
                .first()
                .map_or(false, |&(t, _)| infos[t].inline);
            let mark_set = match node.marks.as_deref() {
                Some("_") => None,
                Some(names) => Some(gather_marks(&marks, names)?),
                None if inline_content => None,
                None => Some(Vec::new()),
            };
            nodes.push(NodeTypeData {
                name: name.clone(),
                spec: node.clone(),
                groups: split_names(&node.group),
                block: !(node.inline || id == text),
                text: id == text,
                content_match,
                inline_content,
                mark_set,
                default_attrs: default_attrs(&node.attrs),
            });
        }

        debug!(
            nodes = nodes.len(),
            marks = marks.len(),
            states = states.len(),
            "compiled schema"
        );
        Ok(Schema(Arc::new(SchemaInner {
            spec,
            nodes,
            marks,
            states,
            top,
            text,
            wrappings: Mutex::new(HashMap::new()),
        })))
    }

    /// The spec this schema was built from
    pub fn spec(&self) -> &SchemaSpec {
        &self.0.spec
    }

    /// The node type with the given name
    pub fn node_type(&self, name: &str) -> Option<NodeType> {
        self.0
            .nodes
            .iter()
            .position(|n| n.name == name)
            .map(|id| NodeType::new(self.clone(), id))
    }

    /// All node types, in the order they were defined
    pub fn node_types(&self) -> impl Iterator<Item = NodeType> + '_ {
        (0..self.0.nodes.len()).map(move |id| NodeType::new(self.clone(), id))
    }

    /// The mark type with the given name
    pub fn mark_type(&self, name: &str) -> Option<MarkType> {
        self.0
            .marks
            .iter()
            .position(|m| m.name == name)
            .map(|id| MarkType::new(self.clone(), id))
    }

    /// All mark types, in rank order
    pub fn mark_types(&self) -> impl Iterator<Item = MarkType> + '_ {
        (0..self.0.marks.len()).map(move |id| MarkType::new(self.clone(), id))
    }

    /// The type of the default top node for this schema.
    pub fn top_node_type(&self) -> NodeType {
        NodeType::new(self.clone(), self.0.top)
    }

    /// The text node type
    pub fn text_type(&self) -> NodeType {
        NodeType::new(self.clone(), self.0.text)
    }

    /// Create a node in this schema.
    pub fn node<C: Into<Fragment>>(
        &self,
        name: &str,
        attrs: Option<&Attrs>,
        content: C,
        marks: Vec<Mark>,
    ) -> Result<Node, NodeError> {
        let r#type = self
            .node_type(name)
            .ok_or_else(|| NodeError::UnknownNodeType(name.to_owned()))?;
        r#type.create(attrs, content, marks)
    }

    /// Create a text node in the schema. Empty text nodes are not allowed.
    pub fn text(&self, text: &str, marks: Vec<Mark>) -> Result<Node, NodeError> {
        if text.is_empty() {
            return Err(NodeError::EmptyText);
        }
        Ok(Node::new_text(
            self.text_type(),
            text.into(),
            Mark::set_from(marks),
        ))
    }

    /// Create a mark with the given type and attributes.
    pub fn mark(&self, name: &str, attrs: Option<&Attrs>) -> Result<Mark, NodeError> {
        let r#type = self
            .mark_type(name)
            .ok_or_else(|| NodeError::UnknownMarkType(name.to_owned()))?;
        Ok(r#type.create(attrs)?)
    }

    /// Deserialize a node from its JSON representation.
    pub fn node_from_json(&self, json: &Value) -> Result<Node, NodeError> {
        Node::from_json(self, json)
    }

    /// Deserialize a mark from its JSON representation.
    pub fn mark_from_json(&self, json: &Value) -> Result<Mark, NodeError> {
        Mark::from_json(self, json)
    }

    pub(crate) fn state(&self, id: usize) -> &MatchState {
        &self.0.states[id]
    }

    pub(crate) fn cached_wrapping(&self, key: (usize, usize)) -> Option<Option<Vec<usize>>> {
        let cache = self.0.wrappings.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get(&key).cloned()
    }

    pub(crate) fn cache_wrapping(&self, key: (usize, usize), wrapping: Option<Vec<usize>>) {
        let mut cache = self.0.wrappings.lock().unwrap_or_else(PoisonError::into_inner);
        cache.insert(key, wrapping);
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Schema {}

impl Hash for Schema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("nodes", &self.0.nodes.iter().map(|n| &n.name).collect::<Vec<_>>())
            .field("marks", &self.0.marks.iter().map(|m| &m.name).collect::<Vec<_>>())
            .finish()
    }
}

/// Node types are handles into a schema. Each node in a document has a type, which
/// determines its content expression, its attributes, and the marks it allows.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NodeType {
    schema: Schema,
    id: usize,
}

impl NodeType {
    pub(crate) fn new(schema: Schema, id: usize) -> Self {
        Self { schema, id }
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    fn data(&self) -> &NodeTypeData {
        &self.schema.0.nodes[self.id]
    }

    /// The name the node type has in this schema.
    pub fn name(&self) -> &str {
        &self.data().name
    }

    /// A link back to the `Schema` the node type belongs to.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The spec that this type is based on
    pub fn spec(&self) -> &NodeSpec {
        &self.data().spec
    }

    /// The groups this type belongs to
    pub fn groups(&self) -> &[String] {
        &self.data().groups
    }

    /// True if this type is in the given group
    pub fn is_in_group(&self, group: &str) -> bool {
        self.groups().iter().any(|g| g == group)
    }

    /// True if this is a block type
    pub fn is_block(&self) -> bool {
        self.data().block
    }

    /// True if this is an inline type.
    pub fn is_inline(&self) -> bool {
        !self.is_block()
    }

    /// True if this is the text node type.
    pub fn is_text(&self) -> bool {
        self.data().text
    }

    /// True if this is a textblock type, a block that contains inline content.
    pub fn is_textblock(&self) -> bool {
        self.is_block() && self.inline_content()
    }

    /// True if this node type has inline content.
    pub fn inline_content(&self) -> bool {
        self.data().inline_content
    }

    /// True for node types that allow no content.
    pub fn is_leaf(&self) -> bool {
        self.data().content_match == EMPTY
    }

    /// True when this node is an atom, i.e. when it does not have directly editable content.
    pub fn is_atom(&self) -> bool {
        self.is_leaf() || self.spec().atom
    }

    /// Whether this node type is defining when it is the context of a replaced range
    pub fn is_defining_as_context(&self) -> bool {
        let spec = self.spec();
        spec.defining || spec.defining_as_context
    }

    /// Whether this node type is defining when it is the outer node of inserted content
    pub fn is_defining_for_content(&self) -> bool {
        let spec = self.spec();
        spec.defining || spec.defining_for_content
    }

    /// Whether nodes of this type are isolating
    pub fn is_isolating(&self) -> bool {
        self.spec().isolating
    }

    /// The starting match of the node type's content expression.
    pub fn content_match(&self) -> ContentMatch {
        ContentMatch::new(self.schema.clone(), self.data().content_match)
    }

    pub(crate) fn content_match_id(&self) -> usize {
        self.data().content_match
    }

    /// Tells you whether this node type has any required attributes.
    pub fn has_required_attrs(&self) -> bool {
        self.data().default_attrs.is_none()
    }

    /// Compute the full set of attributes from the given ones, filling in defaults.
    pub fn compute_attrs(&self, attrs: Option<&Attrs>) -> Result<Attrs, AttrError> {
        match (attrs, &self.data().default_attrs) {
            (None, Some(defaults)) => Ok(defaults.clone()),
            _ => compute_attrs(&self.spec().attrs, self.name(), attrs),
        }
    }

    /// Indicates whether this node allows some of the same content as the given node type.
    pub fn compatible_content(&self, other: &NodeType) -> bool {
        self == other || self.content_match().compatible(&other.content_match())
    }

    /// Returns true if the given fragment is valid content for this node type with the given
    /// attributes.
    pub fn valid_content(&self, content: &Fragment) -> bool {
        match self.content_match().match_fragment(content) {
            Some(result) if result.valid_end() => {}
            _ => return false,
        }
        content
            .children()
            .iter()
            .all(|child| self.allows_marks(child.marks()))
    }

    /// Throws an error if the given fragment is not valid content for this node type.
    pub fn check_content(&self, content: &Fragment) -> Result<(), NodeError> {
        if self.valid_content(content) {
            Ok(())
        } else {
            Err(NodeError::InvalidContent(self.clone()))
        }
    }

    /// Check whether the given mark type is allowed in this node.
    pub fn allows_mark_type(&self, mark_type: &MarkType) -> bool {
        match &self.data().mark_set {
            None => true,
            Some(set) => mark_type.schema == self.schema && set.contains(&mark_type.id),
        }
    }

    /// Test whether the given set of marks are allowed in this node.
    pub fn allows_marks(&self, marks: &[Mark]) -> bool {
        marks.iter().all(|m| self.allows_mark_type(m.r#type()))
    }

    /// Removes the marks that are not allowed in this node from the given set.
    pub fn allowed_marks(&self, marks: &[Mark]) -> Vec<Mark> {
        marks
            .iter()
            .filter(|m| self.allows_mark_type(m.r#type()))
            .cloned()
            .collect()
    }

    /// Create a `Node` of this type. The given attributes are checked and defaulted. The
    /// content is not checked against the content expression.
    pub fn create<C: Into<Fragment>>(
        &self,
        attrs: Option<&Attrs>,
        content: C,
        marks: Vec<Mark>,
    ) -> Result<Node, NodeError> {
        if self.is_text() {
            return Err(NodeError::CreateText);
        }
        let attrs = self.compute_attrs(attrs)?;
        Ok(Node::new(
            self.clone(),
            attrs,
            content.into(),
            Mark::set_from(marks),
        ))
    }

    /// Like `create`, but check the given content against the node type's content
    /// restrictions, and return an error if it doesn't match.
    pub fn create_checked<C: Into<Fragment>>(
        &self,
        attrs: Option<&Attrs>,
        content: C,
        marks: Vec<Mark>,
    ) -> Result<Node, NodeError> {
        let content = content.into();
        self.check_content(&content)?;
        self.create(attrs, content, marks)
    }

    /// Like `create`, but see if it is necessary to add nodes to the start or end of the
    /// given fragment to make it fit the node. If no fitting wrapping can be found, or the
    /// attributes are incomplete, return `None`. Note that, due to the fact that required
    /// nodes can always be created, this will always succeed if you pass a valid fragment.
    pub fn create_and_fill<C: Into<Fragment>>(
        &self,
        attrs: Option<&Attrs>,
        content: C,
        marks: Vec<Mark>,
    ) -> Option<Node> {
        let attrs = self.compute_attrs(attrs).ok()?;
        let mut content = content.into();
        if content.size() > 0 {
            let before = self
                .content_match()
                .fill_before(&content, false, 0)?;
            content = before.append(content);
        }
        let matched = self.content_match().match_fragment(&content)?;
        let after = matched.fill_before(&Fragment::new(), true, 0)?;
        Some(Node::new(
            self.clone(),
            attrs,
            content.append(after),
            Mark::set_from(marks),
        ))
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeType({})", self.name())
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Like nodes, marks (which are associated with nodes to signify things like emphasis or
/// being part of a link) are tagged with type objects, which are handles into the schema.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MarkType {
    schema: Schema,
    id: usize,
}

impl MarkType {
    pub(crate) fn new(schema: Schema, id: usize) -> Self {
        Self { schema, id }
    }

    fn data(&self) -> &MarkTypeData {
        &self.schema.0.marks[self.id]
    }

    /// The name of the mark type.
    pub fn name(&self) -> &str {
        &self.data().name
    }

    /// The schema that this mark type instance is part of.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The spec on which the type is based.
    pub fn spec(&self) -> &MarkSpec {
        &self.data().spec
    }

    /// The position of this type in the schema, used to order mark sets.
    pub fn rank(&self) -> usize {
        self.id
    }

    /// Whether the mark extends to content inserted at its end
    pub fn inclusive(&self) -> bool {
        self.spec().inclusive.unwrap_or(true)
    }

    /// Compute the full set of attributes from the given ones, filling in defaults.
    pub fn compute_attrs(&self, attrs: Option<&Attrs>) -> Result<Attrs, AttrError> {
        match (attrs, &self.data().default_attrs) {
            (None, Some(defaults)) => Ok(defaults.clone()),
            _ => compute_attrs(&self.spec().attrs, self.name(), attrs),
        }
    }

    /// Create a mark of this type. `attrs` may be `None` or a map containing only some of
    /// the mark's attributes. The others, if they have defaults, will be added.
    pub fn create(&self, attrs: Option<&Attrs>) -> Result<Mark, AttrError> {
        Ok(Mark::new(self.clone(), self.compute_attrs(attrs)?))
    }

    /// Queries whether a given mark type is excluded by this one.
    pub fn excludes(&self, other: &MarkType) -> bool {
        self.schema == other.schema && self.data().excluded.contains(&other.id)
    }

    /// Tests whether there is a mark of this type in the given set.
    pub fn is_in_set<'a>(&self, set: &'a [Mark]) -> Option<&'a Mark> {
        set.iter().find(|m| m.r#type() == self)
    }

    /// When there is a mark of this type in the given set, a new set without it is
    /// returned. Otherwise, the input set is returned.
    pub fn remove_from_set(&self, set: &[Mark]) -> Vec<Mark> {
        set.iter().filter(|m| m.r#type() != self).cloned().collect()
    }
}

impl fmt::Debug for MarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MarkType({})", self.name())
    }
}

impl fmt::Display for MarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
