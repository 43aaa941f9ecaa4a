//! Field deserializers for the schema spec types.

use serde::de::{Deserialize, Deserializer};

/// A field that is present counts as `Some`, even when it is `null`. Pair with
/// `#[serde(default)]` so that only a missing field gives `None`.
pub fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// A `null` field gets the default value of its type.
pub fn null_as_default<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use crate::{AttributeSpec, MarkSpec};
    use serde_json::json;

    #[test]
    fn null_default_is_kept() {
        let spec: AttributeSpec = serde_json::from_value(json!({"default": null})).unwrap();
        assert_eq!(spec.default, Some(json!(null)));
        let spec: AttributeSpec = serde_json::from_value(json!({})).unwrap();
        assert_eq!(spec.default, None);
    }

    #[test]
    fn null_attrs_are_empty() {
        let spec: MarkSpec = serde_json::from_value(json!({"attrs": null})).unwrap();
        assert!(spec.attrs.is_empty());
    }
}
