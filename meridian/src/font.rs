//! Font faces available for labels.

use std::path::Path;
use std::sync::Arc;

use ahash::HashMap;
use fontdb::{Database, FaceInfo, Style, Weight};
use parking_lot::Mutex;

use crate::error::{Error, ErrorKind};
use crate::style::FontSet;

/// Font data and the index of the face in it.
#[derive(Debug, Clone)]
pub struct FaceData {
    /// Contents of the font file.
    pub data: Arc<Vec<u8>>,
    /// Index of the face in a font collection.
    pub index: u32,
}

/// Catalog of font faces, addressed by face names like `DejaVu Sans Bold`.
///
/// A face name is the family name followed by the style name. Regular faces answer to `Regular`,
/// `Book`, `Normal` and `Roman`, italic ones to `Italic` and `Oblique`, and bold ones to `Bold`
/// with either of those. The bare family name and the PostScript name match as well.
pub struct FontCatalog {
    db: Mutex<Database>,
    faces: Mutex<HashMap<String, Option<FaceData>>>,
}

impl std::fmt::Debug for FontCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontCatalog")
            .field("faces", &self.db.lock().len())
            .finish()
    }
}

impl Default for FontCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl FontCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self {
            db: Mutex::new(Database::new()),
            faces: Mutex::new(HashMap::default()),
        }
    }

    /// Adds the fonts installed in the system.
    pub fn load_system_fonts(&self) {
        self.db.lock().load_system_fonts();
        self.faces.lock().clear();
    }

    /// Adds every font file in the directory, recursively.
    pub fn load_fonts_dir(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(Error::new(ErrorKind::Font(format!(
                "font directory '{}' does not exist",
                path.display()
            ))));
        }

        let mut db = self.db.lock();
        let before = db.len();
        db.load_fonts_dir(path);
        log::debug!(
            "Loaded {} font faces from '{}'",
            db.len() - before,
            path.display()
        );
        drop(db);

        self.faces.lock().clear();
        Ok(())
    }

    /// Adds a font from its file contents.
    pub fn load_font_data(&self, data: Vec<u8>) {
        self.db.lock().load_font_data(data);
        self.faces.lock().clear();
    }

    /// Canonical names of every face, sorted.
    pub fn face_names(&self) -> Vec<String> {
        let db = self.db.lock();
        let mut names: Vec<String> = db
            .faces()
            .filter_map(|face| {
                let family = face.families.first()?;
                let style = style_names(face).first()?.to_string();
                Some(format!("{} {}", family.0, style))
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Returns true if a face with the name exists.
    pub fn has_face(&self, name: &str) -> bool {
        self.face(name).is_some()
    }

    /// Data of the face with the name.
    pub fn face(&self, name: &str) -> Option<FaceData> {
        if let Some(cached) = self.faces.lock().get(name) {
            return cached.clone();
        }

        let found = {
            let db = self.db.lock();
            let id = db
                .faces()
                .find(|face| face_matches(face, name))
                .map(|face| face.id);
            let found = id.and_then(|id| {
                db.with_face_data(id, |data, index| FaceData {
                    data: Arc::new(data.to_vec()),
                    index,
                })
            });
            found
        };

        if found.is_none() {
            log::debug!("Font face '{name}' not found");
        }

        self.faces.lock().insert(name.to_string(), found.clone());
        found
    }

    /// Data of every face of the font set that exists, in fallback order.
    pub fn fontset_faces(&self, fontset: &FontSet) -> Vec<FaceData> {
        fontset
            .face_names()
            .iter()
            .filter_map(|name| self.face(name))
            .collect()
    }
}

fn style_names(face: &FaceInfo) -> &'static [&'static str] {
    let bold = face.weight >= Weight::BOLD;
    let italic = matches!(face.style, Style::Italic | Style::Oblique);
    match (bold, italic) {
        (false, false) => &["Book", "Regular", "Normal", "Roman"],
        (false, true) => &["Italic", "Oblique"],
        (true, false) => &["Bold"],
        (true, true) => &["Bold Italic", "Bold Oblique"],
    }
}

fn face_matches(face: &FaceInfo, name: &str) -> bool {
    let name = name.trim();
    if face.post_script_name == name {
        return true;
    }

    face.families.iter().any(|(family, _)| {
        if family == name {
            return face.weight == Weight::NORMAL && face.style == Style::Normal;
        }

        name.strip_prefix(family.as_str())
            .and_then(|rest| rest.strip_prefix(' '))
            .is_some_and(|style| style_names(face).contains(&style))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_catalog() {
        let catalog = FontCatalog::new();
        assert!(catalog.face_names().is_empty());
        assert!(!catalog.has_face("DejaVu Sans Book"));
        assert!(catalog
            .fontset_faces(&FontSet::new("labels").with_face_name("DejaVu Sans Book"))
            .is_empty());
    }

    #[test]
    fn missing_directory() {
        let catalog = FontCatalog::new();
        assert!(catalog.load_fonts_dir("/no/such/fonts").is_err());
    }

    #[test]
    fn system_faces_are_found_by_their_names() {
        let catalog = FontCatalog::new();
        catalog.load_system_fonts();

        // Depends on the fonts installed on the machine, so only consistency is checked.
        for name in catalog.face_names().iter().take(5) {
            assert!(catalog.has_face(name), "{name}");
        }
    }
}
