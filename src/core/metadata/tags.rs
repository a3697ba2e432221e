//! Typed view of ExifTool's `-j -G` output.
//!
//! ExifTool emits one JSON object per file with `Group:Name` keys. Values
//! are strings, numbers, or arrays depending on the tag and the file, so
//! each one is normalized into a [`TagValue`] up front instead of being
//! checked for its JSON type at every call site.

use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// A single tag value
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    Number(f64),
    List(Vec<TagValue>),
}

impl TagValue {
    /// Convert a JSON value; objects and nulls carry nothing we use
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(TagValue::Text(s)),
            Value::Number(n) => n.as_f64().map(TagValue::Number),
            Value::Bool(b) => Some(TagValue::Text(b.to_string())),
            Value::Array(items) => Some(TagValue::List(
                items.into_iter().filter_map(TagValue::from_json).collect(),
            )),
            Value::Object(_) | Value::Null => None,
        }
    }

    /// Scalar rendered as text; lists have no single text form
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            TagValue::Text(s) => Some(Cow::Borrowed(s.as_str())),
            TagValue::Number(n) if n.fract() == 0.0 => Some(Cow::Owned(format!("{}", *n as i64))),
            TagValue::Number(n) => Some(Cow::Owned(n.to_string())),
            TagValue::List(_) => None,
        }
    }

    /// Numeric value, accepting numeric text such as `"4000"`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Number(n) => Some(*n),
            TagValue::Text(s) => s.trim().parse().ok(),
            TagValue::List(items) => items.first().and_then(TagValue::as_f64),
        }
    }

    /// Non-negative integer value
    pub fn as_u32(&self) -> Option<u32> {
        self.as_f64()
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n.min(u32::MAX as f64) as u32)
    }
}

/// All tags reported for one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagMap {
    tags: BTreeMap<String, TagValue>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from one ExifTool JSON object, returning the `SourceFile` it names
    pub fn from_json_object(object: Map<String, Value>) -> (Option<String>, Self) {
        let mut source = None;
        let mut tags = BTreeMap::new();

        for (key, value) in object {
            if key == "SourceFile" {
                source = value.as_str().map(str::to_string);
                continue;
            }
            if let Some(value) = TagValue::from_json(value) {
                tags.insert(key, value);
            }
        }

        (source, Self { tags })
    }

    pub fn insert(&mut self, key: impl Into<String>, value: TagValue) {
        self.tags.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Look up a tag.
    ///
    /// `Group:Name` keys match exactly. A bare `Name` matches the first
    /// grouped key with that name (in key order).
    pub fn get(&self, key: &str) -> Option<&TagValue> {
        if let Some(value) = self.tags.get(key) {
            return Some(value);
        }
        if key.contains(':') {
            return None;
        }
        self.tags
            .iter()
            .find(|(k, _)| k.rsplit_once(':').map(|(_, name)| name) == Some(key))
            .map(|(_, v)| v)
    }

    /// First key in `keys` that is present
    pub fn first_of(&self, keys: &[&str]) -> Option<&TagValue> {
        keys.iter().find_map(|k| self.get(k))
    }

    /// First key in `keys` with non-empty text
    pub fn text_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.get(k))
            .filter_map(|v| v.as_text())
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn json_object_splits_source_file() {
        let (source, tags) = TagMap::from_json_object(object(json!({
            "SourceFile": "/photos/a.jpg",
            "File:FileType": "JPEG",
            "EXIF:ImageWidth": 4000,
            "XMP:Subject": ["Beach", "Family"],
            "Composite:Unused": null
        })));

        assert_eq!(source.as_deref(), Some("/photos/a.jpg"));
        assert_eq!(tags.len(), 3);
        assert_eq!(
            tags.get("File:FileType"),
            Some(&TagValue::Text("JPEG".to_string()))
        );
    }

    #[test]
    fn bare_name_matches_any_group() {
        let mut tags = TagMap::new();
        tags.insert("QuickTime:ImageWidth", TagValue::Number(1920.0));

        assert_eq!(tags.get("ImageWidth"), Some(&TagValue::Number(1920.0)));
        assert_eq!(tags.get("EXIF:ImageWidth"), None);
        assert_eq!(tags.get("Width"), None);
    }

    #[test]
    fn first_of_respects_order() {
        let mut tags = TagMap::new();
        tags.insert("EXIF:Make", TagValue::Text("Canon".into()));
        tags.insert("XMP:Make", TagValue::Text("Other".into()));

        let make = tags.first_of(&["XMP:Make", "EXIF:Make"]).unwrap();
        assert_eq!(make.as_text().unwrap(), "Other");
    }

    #[test]
    fn text_of_skips_blank_values() {
        let mut tags = TagMap::new();
        tags.insert("EXIF:Model", TagValue::Text("   ".into()));
        tags.insert("XMP:Model", TagValue::Text("EOS R5".into()));

        assert_eq!(
            tags.text_of(&["EXIF:Model", "XMP:Model"]).as_deref(),
            Some("EOS R5")
        );
    }

    #[test]
    fn numbers_render_without_trailing_fraction() {
        assert_eq!(TagValue::Number(5.0).as_text().unwrap(), "5");
        assert_eq!(TagValue::Number(2.5).as_text().unwrap(), "2.5");
    }

    #[test]
    fn numeric_text_parses() {
        assert_eq!(TagValue::Text(" 3024 ".into()).as_u32(), Some(3024));
        assert_eq!(TagValue::Text("n/a".into()).as_u32(), None);
        assert_eq!(TagValue::Number(-1.0).as_u32(), None);
    }
}
