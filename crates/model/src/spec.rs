//! # Schema specifications
//!
//! These are the plain, serializable descriptions that a [`Schema`](crate::Schema) is
//! compiled from. They can be written out in Rust using the builder methods or read from
//! a JSON object that uses the same field names as the ProseMirror schema spec.
use crate::de;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Used to define attributes on nodes or marks.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AttributeSpec {
    /// The default value for this attribute, to use when no explicit value is provided.
    /// Attributes that have no default must be provided whenever a node or mark of a type
    /// that has them is created. Note that an explicit `null` is a default.
    #[serde(
        default,
        deserialize_with = "de::present",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<Value>,
}

impl AttributeSpec {
    /// An attribute without a default, which must be provided on creation
    pub fn required() -> Self {
        Self { default: None }
    }

    /// An attribute with the given default value
    pub fn with_default<V: Into<Value>>(value: V) -> Self {
        Self {
            default: Some(value.into()),
        }
    }
}

/// A description of a node type, used when defining a schema.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeSpec {
    /// The content expression for this node. When not given, the node does not allow any
    /// content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// The marks that are allowed inside of this node. May be a space-separated string
    /// referring to mark names or groups, `"_"` to explicitly allow all marks, or `""` to
    /// disallow marks. When not given, nodes with inline content default to allowing all
    /// marks, other nodes default to not allowing marks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marks: Option<String>,
    /// The group or space-separated groups to which this node belongs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Should be set to true for inline nodes.
    pub inline: bool,
    /// Can be set to true to indicate that, though this isn't a leaf node, it doesn't have
    /// directly editable content and should be treated as a single unit.
    pub atom: bool,
    /// The attributes that nodes of this type get.
    #[serde(deserialize_with = "de::null_as_default")]
    pub attrs: IndexMap<String, AttributeSpec>,
    /// Can be used to indicate that this node contains code.
    pub code: bool,
    /// Shorthand for setting both `defining_as_context` and `defining_for_content`.
    pub defining: bool,
    /// The node is kept as context when its content is replaced.
    pub defining_as_context: bool,
    /// The node's type is kept when it is the outer node of pasted content.
    pub defining_for_content: bool,
    /// When enabled, the sides of nodes of this type count as boundaries that regular
    /// editing operations, like backspacing or lifting, won't cross.
    pub isolating: bool,
}

impl NodeSpec {
    /// Set the content expression
    pub fn content(mut self, expr: &str) -> Self {
        self.content = Some(expr.to_owned());
        self
    }

    /// Set the allowed marks
    pub fn marks(mut self, marks: &str) -> Self {
        self.marks = Some(marks.to_owned());
        self
    }

    /// Set the groups
    pub fn group(mut self, group: &str) -> Self {
        self.group = Some(group.to_owned());
        self
    }

    /// Mark this node type as inline
    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    /// Mark this node type as an atom
    pub fn atom(mut self) -> Self {
        self.atom = true;
        self
    }

    /// Mark this node type as containing code
    pub fn code(mut self) -> Self {
        self.code = true;
        self
    }

    /// Mark this node type as defining
    pub fn defining(mut self) -> Self {
        self.defining = true;
        self
    }

    /// Mark this node type as isolating
    pub fn isolating(mut self) -> Self {
        self.isolating = true;
        self
    }

    /// Add an attribute
    pub fn attr(mut self, name: &str, spec: AttributeSpec) -> Self {
        self.attrs.insert(name.to_owned(), spec);
        self
    }
}

/// Used to define marks when creating a schema.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkSpec {
    /// The attributes that marks of this type get.
    #[serde(deserialize_with = "de::null_as_default")]
    pub attrs: IndexMap<String, AttributeSpec>,
    /// Whether this mark should be active when the cursor is positioned at its end.
    /// Defaults to true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inclusive: Option<bool>,
    /// Determines which other marks this mark can coexist with. Should be a space-separated
    /// string naming other marks or groups of marks. When not given, only marks of the same
    /// type are excluded. `"_"` excludes all marks, `""` excludes none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excludes: Option<String>,
    /// The group or space-separated groups to which this mark belongs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl MarkSpec {
    /// Add an attribute
    pub fn attr(mut self, name: &str, spec: AttributeSpec) -> Self {
        self.attrs.insert(name.to_owned(), spec);
        self
    }

    /// Set whether the mark extends to content inserted at its end
    pub fn inclusive(mut self, inclusive: bool) -> Self {
        self.inclusive = Some(inclusive);
        self
    }

    /// Set the excluded marks
    pub fn excludes(mut self, excludes: &str) -> Self {
        self.excludes = Some(excludes.to_owned());
        self
    }

    /// Set the groups
    pub fn group(mut self, group: &str) -> Self {
        self.group = Some(group.to_owned());
        self
    }
}

/// An object describing a schema.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaSpec {
    /// The node types in this schema. Order matters: it determines which types are preferred
    /// when a group is used in a content expression, and the first type is the default
    /// top node when no `top_node` is given and there is no `doc` type.
    pub nodes: IndexMap<String, NodeSpec>,
    /// The mark types in this schema. The order determines the rank of the marks, and so
    /// the order in which mark sets are sorted.
    pub marks: IndexMap<String, MarkSpec>,
    /// The name of the default top-level node for the schema. Defaults to `"doc"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_node: Option<String>,
}

impl SchemaSpec {
    /// Create an empty schema spec
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node type
    pub fn node(mut self, name: &str, spec: NodeSpec) -> Self {
        self.nodes.insert(name.to_owned(), spec);
        self
    }

    /// Add a mark type
    pub fn mark(mut self, name: &str, spec: MarkSpec) -> Self {
        self.marks.insert(name.to_owned(), spec);
        self
    }

    /// Set the top node type
    pub fn top_node(mut self, name: &str) -> Self {
        self.top_node = Some(name.to_owned());
        self
    }
}
