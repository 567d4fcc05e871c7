use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ─── Slug IDs ──────────────────────────────────────────────────────────────────

/// Longest slug accepted for test and question identifiers.
pub const MAX_SLUG_LEN: usize = 64;

fn is_valid_slug(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_SLUG_LEN
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Unique identifier for a test (exam), e.g. `html-basics`.
///
/// Restricted to ASCII alphanumerics, `-` and `_` so it can double as a
/// storage key (file name, row key) without escaping.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TestId(String);

impl TestId {
    /// Creates a new `TestId`.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the slug is empty, too long, or contains
    /// characters outside `[A-Za-z0-9_-]`.
    pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
        let id = id.into();
        if is_valid_slug(&id) {
            Ok(Self(id))
        } else {
            Err(ParseIdError::new("TestId"))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a question within the catalog, e.g. `html-3`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QuestionId(String);

impl QuestionId {
    /// Creates a new `QuestionId`.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the slug is not valid.
    pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
        let id = id.into();
        if is_valid_slug(&id) {
            Ok(Self(id))
        } else {
            Err(ParseIdError::new("QuestionId"))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TestId {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TestId> for String {
    fn from(value: TestId) -> Self {
        value.0
    }
}

impl TryFrom<String> for QuestionId {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QuestionId> for String {
    fn from(value: QuestionId) -> Self {
        value.0
    }
}

// ─── Numeric / UUID IDs ────────────────────────────────────────────────────────

/// Unique identifier for a Subject
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectId(u64);

impl SubjectId {
    /// Creates a new `SubjectId`
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying u64 value
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Identity of a user as issued by the auth provider.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generates a fresh random identity. Used by local sign-in and tests.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl fmt::Debug for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TestId({})", self.0)
    }
}

impl fmt::Debug for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionId({})", self.0)
    }
}

impl fmt::Debug for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubjectId({})", self.0)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl ParseIdError {
    fn new(kind: &'static str) -> Self {
        Self { kind }
    }
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for TestId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for QuestionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl FromStr for SubjectId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(SubjectId::new)
            .map_err(|_| ParseIdError::new("SubjectId"))
    }
}

impl FromStr for UserId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(UserId::new)
            .map_err(|_| ParseIdError::new("UserId"))
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_accepts_slugs() {
        let id = TestId::new("html-basics").unwrap();
        assert_eq!(id.to_string(), "html-basics");
        assert!(TestId::new("js_essentials2").is_ok());
    }

    #[test]
    fn test_id_rejects_path_like_values() {
        assert!(TestId::new("").is_err());
        assert!(TestId::new("../etc").is_err());
        assert!(TestId::new("a b").is_err());
        assert!(TestId::new("x".repeat(MAX_SLUG_LEN + 1)).is_err());
    }

    #[test]
    fn question_id_from_str() {
        let id: QuestionId = "css-4".parse().unwrap();
        assert_eq!(id.as_str(), "css-4");
        assert!("css/4".parse::<QuestionId>().is_err());
    }

    #[test]
    fn subject_id_from_str_invalid() {
        assert!("not-a-number".parse::<SubjectId>().is_err());
        assert_eq!("7".parse::<SubjectId>().unwrap(), SubjectId::new(7));
    }

    #[test]
    fn user_id_roundtrip() {
        let original = UserId::random();
        let parsed: UserId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn slug_ids_validate_when_deserialized() {
        let ok: TestId = serde_json::from_str("\"html-basics\"").unwrap();
        assert_eq!(ok.as_str(), "html-basics");
        assert!(serde_json::from_str::<TestId>("\"no spaces\"").is_err());
    }
}
