#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Named fallback chain of font faces.
///
/// When a glyph is missing from the first face, the next one is tried.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FontSet {
    name: String,
    face_names: Vec<String>,
}

impl FontSet {
    /// Creates an empty font set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            face_names: Vec::new(),
        }
    }

    /// Name of the set.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a face to the chain.
    pub fn add_face_name(&mut self, face_name: impl Into<String>) {
        self.face_names.push(face_name.into());
    }

    /// Builder version of [`FontSet::add_face_name`].
    pub fn with_face_name(mut self, face_name: impl Into<String>) -> Self {
        self.add_face_name(face_name);
        self
    }

    /// Faces in fallback order.
    pub fn face_names(&self) -> &[String] {
        &self.face_names
    }
}
