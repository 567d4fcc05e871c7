use thiserror::Error;

use crate::model::ids::SubjectId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubjectError {
    #[error("subject name cannot be empty")]
    EmptyName,
}

/// A topic that exams are grouped under (e.g. "HTML", "Data Analysis").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    id: SubjectId,
    name: String,
    description: Option<String>,
}

impl Subject {
    /// Creates a subject with a trimmed, non-empty name.
    ///
    /// # Errors
    ///
    /// Returns `SubjectError::EmptyName` if the name is blank.
    pub fn new(
        id: SubjectId,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<Self, SubjectError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(SubjectError::EmptyName);
        }
        Ok(Self {
            id,
            name,
            description: description.filter(|d| !d.trim().is_empty()),
        })
    }

    #[must_use]
    pub fn id(&self) -> SubjectId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_name_is_trimmed() {
        let s = Subject::new(SubjectId::new(1), "  CSS ", None).unwrap();
        assert_eq!(s.name(), "CSS");
    }

    #[test]
    fn subject_rejects_blank_name() {
        let err = Subject::new(SubjectId::new(1), "   ", None).unwrap_err();
        assert_eq!(err, SubjectError::EmptyName);
    }
}
