//! Upload metadata entered by the user

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LoopdeckError, Result};

/// Who can see an uploaded track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

impl Visibility {
    /// Wire value: 0 private, 1 public
    pub fn code(&self) -> u8 {
        match self {
            Visibility::Private => 0,
            Visibility::Public => 1,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Private => write!(f, "private"),
            Visibility::Public => write!(f, "public"),
        }
    }
}

/// Title, description, visibility and tags of a track upload
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UploadMetadata {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub tags: Vec<u32>,
}

impl UploadMetadata {
    pub fn new(title: impl Into<String>, description: impl Into<String>, tags: Vec<u32>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            visibility: Visibility::default(),
            tags,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Check required fields
    ///
    /// # Errors
    /// * `MissingUploadField` - for a blank title or description, or no tags
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(LoopdeckError::MissingUploadField { field: "title" });
        }
        if self.description.trim().is_empty() {
            return Err(LoopdeckError::MissingUploadField {
                field: "description",
            });
        }
        if self.tags.is_empty() {
            return Err(LoopdeckError::MissingUploadField { field: "tags" });
        }
        Ok(())
    }

    /// Tags as a comma-separated list
    pub fn tags_csv(&self) -> String {
        self.tags
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Mix file name for this upload, with a single `.wav` suffix
    ///
    /// Path separators in the title become `_`, so the name is always one
    /// component inside the files directory.
    pub fn mix_file_name(&self) -> String {
        let stem: String = self
            .title
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '\0' => '_',
                c => c,
            })
            .collect();
        if stem.ends_with(".wav") {
            stem
        } else {
            format!("{}.wav", stem)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("", "desc", vec![1], "title" ; "blank title")]
    #[test_case("   ", "desc", vec![1], "title" ; "whitespace title")]
    #[test_case("Song", "", vec![1], "description" ; "blank description")]
    #[test_case("Song", "desc", vec![], "tags" ; "no tags")]
    fn test_validate_rejects(title: &str, description: &str, tags: Vec<u32>, missing: &str) {
        let err = UploadMetadata::new(title, description, tags)
            .validate()
            .unwrap_err();
        match err {
            LoopdeckError::MissingUploadField { field } => assert_eq!(field, missing),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_validate_accepts_complete_metadata() {
        let meta = UploadMetadata::new("Song", "A song", vec![3, 7]);
        assert!(meta.validate().is_ok());
        assert_eq!(meta.tags_csv(), "3,7");
    }

    #[test]
    fn test_mix_file_name() {
        assert_eq!(UploadMetadata::new("jam", "d", vec![1]).mix_file_name(), "jam.wav");
        assert_eq!(UploadMetadata::new("jam.wav", "d", vec![1]).mix_file_name(), "jam.wav");
    }

    #[test_case("/tmp/outside", "_tmp_outside.wav" ; "absolute path")]
    #[test_case("../up", ".._up.wav" ; "parent traversal")]
    #[test_case("..", "...wav" ; "bare parent")]
    #[test_case("a\\b:c", "a_b_c.wav" ; "windows separators")]
    fn test_mix_file_name_is_one_component(title: &str, expected: &str) {
        let name = UploadMetadata::new(title, "d", vec![1]).mix_file_name();
        assert_eq!(name, expected);
        let path = std::path::Path::new(&name);
        assert_eq!(path.components().count(), 1);
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some(expected));
    }

    #[test]
    fn test_visibility_codes() {
        assert_eq!(Visibility::Private.code(), 0);
        assert_eq!(Visibility::Public.code(), 1);
        assert_eq!(Visibility::Public.to_string(), "public");
    }
}
