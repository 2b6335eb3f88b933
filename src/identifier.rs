//! Composite resource identifiers.
//!
//! Every resource stores an `id` made of its parent scope identifiers and its
//! own natural name joined with a literal comma, e.g. `pid,iid,job`. The same
//! string is what users pass to `import`.

use std::fmt;

use crate::error::ProviderError;

/// Separator between identifier segments.
pub const ID_SEPARATOR: &str = ",";

/// Describes the ordered segments of a resource's composite identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdFormat {
    fields: &'static [&'static str],
}

impl IdFormat {
    /// Create a format from its ordered field names.
    ///
    /// Resource hierarchies are two to four levels deep.
    pub const fn new(fields: &'static [&'static str]) -> Self {
        assert!(
            fields.len() >= 2 && fields.len() <= 4,
            "composite identifiers have 2 to 4 segments"
        );
        Self { fields }
    }

    /// The field names, in order.
    pub fn fields(&self) -> &'static [&'static str] {
        self.fields
    }

    /// The human-readable pattern, e.g. `[project_id],[instance_id],[name]`.
    pub fn pattern(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("[{}]", f))
            .collect::<Vec<_>>()
            .join(ID_SEPARATOR)
    }

    /// Join `segments` into an identifier.
    ///
    /// Fails with [`ProviderError::InvalidInput`] if the segment count does
    /// not match or a segment is empty.
    pub fn build(&self, segments: &[&str]) -> Result<CompositeId, ProviderError> {
        if segments.len() != self.fields.len() {
            return Err(ProviderError::InvalidInput(format!(
                "identifier {} needs {} segments, got {}",
                self.pattern(),
                self.fields.len(),
                segments.len()
            )));
        }
        if let Some(pos) = segments.iter().position(|s| s.is_empty()) {
            return Err(ProviderError::InvalidInput(format!(
                "identifier segment {} is empty",
                self.fields[pos]
            )));
        }
        Ok(CompositeId {
            segments: segments.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Parse an import string.
    ///
    /// Rejects a wrong segment count or any empty segment with
    /// [`ProviderError::ImportFormat`] citing the expected pattern.
    pub fn parse(&self, raw: &str) -> Result<CompositeId, ProviderError> {
        let segments: Vec<&str> = raw.split(ID_SEPARATOR).collect();
        if segments.len() != self.fields.len() || segments.iter().any(|s| s.is_empty()) {
            return Err(ProviderError::ImportFormat {
                expected: self.pattern(),
                got: raw.to_string(),
            });
        }
        Ok(CompositeId {
            segments: segments.into_iter().map(str::to_string).collect(),
        })
    }
}

/// A parsed or built composite identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeId {
    segments: Vec<String>,
}

impl CompositeId {
    /// All segments, in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The segment at `index`.
    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    /// The last segment: the resource's own natural name or ID.
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join(ID_SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCOPED: IdFormat = IdFormat::new(&["project_id", "instance_id", "name"]);

    #[test]
    fn test_build_and_display() {
        let id = SCOPED.build(&["pid", "iid", "name"]).unwrap();
        assert_eq!(id.to_string(), "pid,iid,name");
        assert_eq!(id.name(), "name");
        assert_eq!(id.segment(1), Some("iid"));
    }

    #[test]
    fn test_parse_roundtrip() {
        let id = SCOPED.parse("pid,iid,name").unwrap();
        assert_eq!(id.segments(), &["pid", "iid", "name"]);
        assert_eq!(id.to_string(), "pid,iid,name");
    }

    #[test]
    fn test_parse_wrong_segment_count() {
        let err = SCOPED.parse("pid,iid").unwrap_err();
        match err {
            ProviderError::ImportFormat { expected, got } => {
                assert_eq!(expected, "[project_id],[instance_id],[name]");
                assert_eq!(got, "pid,iid");
            },
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(SCOPED.parse("pid,iid,name,extra").is_err());
        assert!(SCOPED.parse("").is_err());
    }

    #[test]
    fn test_parse_empty_segment() {
        assert!(matches!(
            SCOPED.parse("pid,,name"),
            Err(ProviderError::ImportFormat { .. })
        ));
        assert!(matches!(
            SCOPED.parse(",iid,name"),
            Err(ProviderError::ImportFormat { .. })
        ));
    }

    #[test]
    fn test_build_rejects_empty_segment() {
        let err = SCOPED.build(&["pid", "", "name"]).unwrap_err();
        assert!(err.to_string().contains("instance_id"));
    }

    #[test]
    fn test_two_and_four_segment_formats() {
        let two = IdFormat::new(&["project_id", "instance_id"]);
        assert_eq!(two.parse("pid,iid").unwrap().name(), "iid");

        let four = IdFormat::new(&["project_id", "region", "instance_id", "user_id"]);
        assert_eq!(four.pattern(), "[project_id],[region],[instance_id],[user_id]");
        assert!(four.parse("pid,eu01,iid").is_err());
    }
}
