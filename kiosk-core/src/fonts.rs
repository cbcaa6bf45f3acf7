//! TrueType faces for the text drawn onto the composite.

use std::{fs, path::Path};

use ab_glyph::FontVec;
use tracing::{info, warn};

use crate::error::{KioskError, KioskResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Bold,
}

impl FontWeight {
    pub fn file_name(self) -> &'static str {
        match self {
            FontWeight::Regular => "arial.ttf",
            FontWeight::Bold => "arialbd.ttf",
        }
    }
}

/// Regular and bold faces loaded from the asset directory.
///
/// A missing weight borrows the other one; with neither present, text is
/// left off the composite and only the text slots carry it.
#[derive(Default)]
pub struct FontSet {
    regular: Option<FontVec>,
    bold: Option<FontVec>,
}

impl std::fmt::Debug for FontSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontSet")
            .field("regular", &self.regular.is_some())
            .field("bold", &self.bold.is_some())
            .finish()
    }
}

impl FontSet {
    pub fn load(dir: &Path) -> Self {
        let load = |weight: FontWeight| match load_font(&dir.join(weight.file_name())) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!("Font error: {e}");
                None
            }
        };

        let set = Self {
            regular: load(FontWeight::Regular),
            bold: load(FontWeight::Bold),
        };
        if set.is_empty() {
            warn!(dir = %dir.display(), "no fonts loaded; composite will carry no text");
        } else {
            info!(?set, "fonts loaded");
        }
        set
    }

    pub fn get(&self, weight: FontWeight) -> Option<&FontVec> {
        let (wanted, other) = match weight {
            FontWeight::Regular => (&self.regular, &self.bold),
            FontWeight::Bold => (&self.bold, &self.regular),
        };
        wanted.as_ref().or(other.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.regular.is_none() && self.bold.is_none()
    }
}

pub fn load_font(path: &Path) -> KioskResult<FontVec> {
    let missing = |reason: String| KioskError::AssetMissing {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = fs::read(path).map_err(|e| missing(e.to_string()))?;
    FontVec::try_from_vec(bytes).map_err(|e| missing(e.to_string()))
}
