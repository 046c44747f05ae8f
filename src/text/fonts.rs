use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Arc,
};

use usvg::fontdb;

/// Font face bytes picked for one (family, bold, italic) request.
#[derive(Clone, Debug)]
pub struct ResolvedFont {
    /// Raw font file bytes (shared with every element using this face).
    pub bytes: Arc<Vec<u8>>,
    /// Face index inside a collection file.
    pub index: u32,
    /// Family name as stored in the face.
    pub family: String,
    /// Actual face weight (`400` regular, `700` bold).
    pub weight: u16,
    /// Whether the face is italic or oblique.
    pub italic: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct FaceRequest {
    family: String,
    bold: bool,
    italic: bool,
}

const SANS_SERIF_CANDIDATES: &[&str] = &[
    "Arial",
    "Helvetica",
    "Liberation Sans",
    "DejaVu Sans",
    "Noto Sans",
    "FreeSans",
    "Roboto",
];
const SERIF_CANDIDATES: &[&str] = &[
    "Times New Roman",
    "Liberation Serif",
    "DejaVu Serif",
    "Noto Serif",
    "FreeSerif",
];
const MONOSPACE_CANDIDATES: &[&str] = &[
    "Courier New",
    "Liberation Mono",
    "DejaVu Sans Mono",
    "Noto Sans Mono",
    "FreeMono",
];

/// System and project font lookup.
///
/// Requests that name an unknown family fall back to sans-serif, serif, monospace, then the
/// installed family with the most faces. The requested weight and style are honored at every
/// step. `None` only when no font is installed.
pub struct FontBook {
    db: fontdb::Database,
    fallback_family: Option<String>,
    resolved: HashMap<FaceRequest, Option<Arc<ResolvedFont>>>,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("faces", &self.db.len())
            .field("resolved", &self.resolved.len())
            .finish()
    }
}

impl FontBook {
    /// System fonts plus every `.ttf`/`.otf`/`.ttc` file in `extra_dirs`.
    pub fn system(extra_dirs: &[PathBuf]) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        for dir in extra_dirs {
            load_fonts_from_dir(&mut db, dir);
        }
        tracing::debug!(faces = db.len(), "font database loaded");
        Self::from_database(db)
    }

    /// A book with no faces; every lookup fails. Useful for tests and pure-geometry callers.
    pub fn empty() -> Self {
        Self::from_database(fontdb::Database::new())
    }

    /// Wrap an already populated database.
    ///
    /// Generic families are pointed at installed faces; fontdb's defaults name Microsoft fonts
    /// that many systems lack.
    pub fn from_database(mut db: fontdb::Database) -> Self {
        let fallback_family = configure_generic_families(&mut db);
        Self {
            db,
            fallback_family,
            resolved: HashMap::new(),
        }
    }

    /// Register one font file from memory.
    pub fn load_font_data(&mut self, bytes: Vec<u8>) {
        self.db.load_font_data(bytes);
        self.fallback_family = configure_generic_families(&mut self.db);
        self.resolved.clear();
    }

    /// Number of faces known.
    pub fn face_count(&self) -> usize {
        self.db.len()
    }

    /// Best face for `family` with the requested style.
    pub fn resolve(&mut self, family: &str, bold: bool, italic: bool) -> Option<Arc<ResolvedFont>> {
        let req = FaceRequest {
            family: family.to_string(),
            bold,
            italic,
        };
        if let Some(hit) = self.resolved.get(&req) {
            return hit.clone();
        }

        let found = self.lookup(&req).map(Arc::new);
        if found.is_none() {
            tracing::warn!(family, bold, italic, "no usable font face");
        }
        self.resolved.insert(req, found.clone());
        found
    }

    fn lookup(&self, req: &FaceRequest) -> Option<ResolvedFont> {
        let weight = if req.bold {
            fontdb::Weight::BOLD
        } else {
            fontdb::Weight::NORMAL
        };
        let style = if req.italic {
            fontdb::Style::Italic
        } else {
            fontdb::Style::Normal
        };
        let query = |families: &[fontdb::Family<'_>]| {
            self.db.query(&fontdb::Query {
                families,
                weight,
                stretch: fontdb::Stretch::Normal,
                style,
            })
        };

        let id = query(&[
            fontdb::Family::Name(&req.family),
            fontdb::Family::SansSerif,
            fontdb::Family::Serif,
            fontdb::Family::Monospace,
        ])
        .or_else(|| {
            let family = self.fallback_family.as_deref()?;
            query(&[fontdb::Family::Name(family)])
        })?;
        let face = self.db.face(id)?;
        let family = face
            .families
            .first()
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| req.family.clone());
        let weight = face.weight.0;
        let italic = face.style != fontdb::Style::Normal;

        let (bytes, index) = self
            .db
            .with_face_data(id, |data, index| (data.to_vec(), index))?;

        Some(ResolvedFont {
            bytes: Arc::new(bytes),
            index,
            family,
            weight,
            italic,
        })
    }
}

/// Point fontdb's generic families at installed families and return the family with the most
/// faces as the last resort.
fn configure_generic_families(db: &mut fontdb::Database) -> Option<String> {
    let mut installed = HashSet::new();
    let mut face_counts: HashMap<String, usize> = HashMap::new();
    for face in db.faces() {
        for (name, _) in &face.families {
            installed.insert(name.clone());
        }
        if let Some((name, _)) = face.families.first() {
            *face_counts.entry(name.clone()).or_default() += 1;
        }
    }

    let pick = |candidates: &[&str]| {
        candidates
            .iter()
            .find(|c| installed.contains(**c))
            .map(|c| c.to_string())
    };
    let sans = pick(SANS_SERIF_CANDIDATES);
    let serif = pick(SERIF_CANDIDATES);
    let mono = pick(MONOSPACE_CANDIDATES);
    if let Some(name) = &sans {
        db.set_sans_serif_family(name.as_str());
    }
    if let Some(name) = &serif {
        db.set_serif_family(name.as_str());
    }
    if let Some(name) = &mono {
        db.set_monospace_family(name.as_str());
    }

    // ties broken by name so the choice does not depend on scan order
    let fallback = face_counts
        .into_iter()
        .max_by(|(a_name, a), (b_name, b)| a.cmp(b).then_with(|| b_name.cmp(a_name)))
        .map(|(name, _)| name);
    tracing::debug!(
        sans_serif = sans.as_deref().unwrap_or("-"),
        serif = serif.as_deref().unwrap_or("-"),
        monospace = mono.as_deref().unwrap_or("-"),
        fallback = fallback.as_deref().unwrap_or("-"),
        "generic font families"
    );
    fallback
}

fn load_fonts_from_dir(db: &mut fontdb::Database, dir: &Path) {
    let Ok(rd) = std::fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "font directory is not readable");
        return;
    };

    for entry in rd.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if ext != "ttf" && ext != "otf" && ext != "ttc" {
            continue;
        }
        if let Err(e) = db.load_font_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "skipping font file");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/text/fonts.rs"]
mod tests;
