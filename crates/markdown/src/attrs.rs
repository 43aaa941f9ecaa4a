use derive_new::new;
use parchment_model::Attrs;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// Optional string attributes default to `null` in the schema
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Typed attributes of one node or mark type in the markdown schema.
///
/// Read them from a node with [`Node::attrs_as`](parchment_model::Node::attrs_as).
pub trait TypedAttrs: Serialize {
    /// Name of the node or mark type the attributes belong to
    const TYPE_NAME: &'static str;

    /// The untyped attributes. Empty optional strings are left out, so the schema
    /// fills in its defaults for them.
    fn to_attrs(&self) -> Attrs {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.into_iter().collect(),
            _ => Attrs::new(),
        }
    }
}

/// Attributes for a heading (i.e. `<h1>`, `<h2>`, ...)
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, new)]
pub struct HeadingAttrs {
    /// Level from 1 to 6
    pub level: u8,
}

impl Default for HeadingAttrs {
    fn default() -> Self {
        Self { level: 1 }
    }
}

impl TypedAttrs for HeadingAttrs {
    const TYPE_NAME: &'static str = "heading";
}

/// Attributes for a fenced code block
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, new)]
pub struct CodeBlockAttrs {
    /// Info string after the opening fence, usually the language
    pub params: String,
}

impl TypedAttrs for CodeBlockAttrs {
    const TYPE_NAME: &'static str = "code_block";
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct BulletListAttrs {
    /// No blank lines between the items
    #[serde(default)]
    pub tight: bool,
}

impl TypedAttrs for BulletListAttrs {
    const TYPE_NAME: &'static str = "bullet_list";
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct OrderedListAttrs {
    /// Number of the first item
    pub order: usize,
    /// No blank lines between the items
    #[serde(default)]
    pub tight: bool,
}

impl Default for OrderedListAttrs {
    fn default() -> Self {
        Self {
            order: 1,
            tight: false,
        }
    }
}

impl TypedAttrs for OrderedListAttrs {
    const TYPE_NAME: &'static str = "ordered_list";
}

/// Attributes for an inline image
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, new)]
pub struct ImageAttrs {
    pub src: String,
    /// Alternative text, empty if there is none
    #[new(default)]
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "String::is_empty"
    )]
    pub alt: String,
    #[new(default)]
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "String::is_empty"
    )]
    pub title: String,
}

impl TypedAttrs for ImageAttrs {
    const TYPE_NAME: &'static str = "image";
}

/// The attributes of a link mark
#[derive(Debug, Hash, Eq, Clone, PartialEq, Deserialize, Serialize, new)]
pub struct LinkAttrs {
    /// Target URL
    pub href: String,
    /// Tooltip, empty if there is none
    #[new(default)]
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "String::is_empty"
    )]
    pub title: String,
}

impl TypedAttrs for LinkAttrs {
    const TYPE_NAME: &'static str = "link";
}
