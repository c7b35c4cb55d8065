use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Separator between the document id and the dotted path.
pub const DOCUMENT_SEPARATOR: &str = "::";
/// Separator between path segments.
pub const SEGMENT_SEPARATOR: char = '.';

/// A property path scoped to the document it was found in.
///
/// Serialized as `"document::seg1.seg2...segN"`. Equality, ordering and
/// hashing are structural, so two keys that serialize identically but were
/// built from different segments (a segment containing `.`) stay distinct in
/// memory. See [`PathKey::is_ambiguous`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathKey {
    document: String,
    segments: Vec<String>,
}

impl PathKey {
    /// Empty segments are dropped.
    pub fn new<I, S>(document: impl Into<String>, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            document: document.into(),
            segments: segments
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    pub fn root(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            segments: Vec::new(),
        }
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, the property name for extracted keys.
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// New key with one more segment. An empty segment leaves the path as is.
    pub fn child(&self, segment: &str) -> Self {
        let mut next = self.clone();
        if !segment.is_empty() {
            next.segments.push(segment.to_string());
        }
        next
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut parent = self.clone();
        parent.segments.pop();
        Some(parent)
    }

    pub fn dotted_path(&self) -> String {
        self.segments.join(".")
    }

    pub fn serialize_key(&self) -> String {
        format!("{}{}{}", self.document, DOCUMENT_SEPARATOR, self.dotted_path())
    }

    /// Inverse of [`PathKey::serialize_key`] for unambiguous keys.
    pub fn parse(raw: &str) -> Option<Self> {
        let (document, path) = raw.split_once(DOCUMENT_SEPARATOR)?;
        if document.is_empty() {
            return None;
        }
        Some(Self::new(document, path.split(SEGMENT_SEPARATOR)))
    }

    /// True when serializing this key would not round-trip through `parse`.
    pub fn is_ambiguous(&self) -> bool {
        self.document.contains(DOCUMENT_SEPARATOR)
            || self.segments.iter().any(|s| {
                s.contains(SEGMENT_SEPARATOR) || s.contains(DOCUMENT_SEPARATOR)
            })
    }

    /// The same property addressed the way an instance document nests it.
    ///
    /// Schema paths follow `("properties" name | "items")*`; the view keeps only
    /// the names, so `properties.user.properties.email` becomes `user.email`.
    /// Returns `None` when the path does not follow that shape.
    pub fn instance_view(&self) -> Option<Self> {
        let mut names = Vec::new();
        let mut iter = self.segments.iter();
        while let Some(segment) = iter.next() {
            match segment.as_str() {
                "properties" => names.push(iter.next()?.clone()),
                "items" => {}
                _ => return None,
            }
        }
        if names.is_empty() {
            return None;
        }
        Some(Self {
            document: self.document.clone(),
            segments: names,
        })
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize_key())
    }
}

impl Serialize for PathKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.serialize_key())
    }
}

impl<'de> Deserialize<'de> for PathKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PathKeyVisitor;

        impl Visitor<'_> for PathKeyVisitor {
            type Value = PathKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string of the form \"document::a.b.c\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<PathKey, E> {
                PathKey::parse(value)
                    .ok_or_else(|| E::custom(format!("invalid path key: {}", value)))
            }
        }

        deserializer.deserialize_str(PathKeyVisitor)
    }
}
