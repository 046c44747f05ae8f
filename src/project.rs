//! JSON project files: templates, their images and placed elements.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    assets::store::{FsResolver, normalize_rel_path},
    foundation::error::{StampError, StampResult},
    geometry::scale::PreviewBox,
    model::element::{Element, ImageSource},
    model::template::{Template, TemplateImage},
};

/// One template entry of a project file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    /// Template name; also the archive folder when several templates are exported.
    pub name: String,
    /// Template image path, relative to the project file.
    pub image: PathBuf,
    /// Elements in z-order.
    #[serde(default)]
    pub elements: Vec<Element>,
}

/// Serialized project.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    /// Editing bounding box the element coordinates were recorded in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_box: Option<PreviewBox>,
    /// Templates in export order.
    pub templates: Vec<TemplateSpec>,
}

/// A project file plus the directory its relative paths resolve against.
#[derive(Clone, Debug)]
pub struct Project {
    root: PathBuf,
    file: ProjectFile,
}

impl Project {
    /// Read and parse `path`.
    pub fn from_path(path: impl AsRef<Path>) -> StampResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read project file '{}'", path.display()))?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_json_str(&text, root)
    }

    /// Parse project JSON whose relative paths resolve against `root`.
    pub fn from_json_str(text: &str, root: impl Into<PathBuf>) -> StampResult<Self> {
        let file: ProjectFile = serde_json::from_str(text).context("parse project json")?;
        Ok(Self {
            root: root.into(),
            file,
        })
    }

    /// Wrap an in-memory project.
    pub fn new(file: ProjectFile, root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file,
        }
    }

    /// Directory relative paths resolve against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parsed contents.
    pub fn file(&self) -> &ProjectFile {
        &self.file
    }

    /// Resolver for image element files.
    pub fn resolver(&self) -> FsResolver {
        FsResolver::new(&self.root)
    }

    /// Load every template image and rebuild the templates, checking element invariants.
    ///
    /// `fallback_box` applies when the file does not record its own preview box.
    pub fn load_templates(&self, fallback_box: PreviewBox) -> StampResult<Vec<Template>> {
        let preview_box = self.file.preview_box.unwrap_or(fallback_box);
        self.file
            .templates
            .iter()
            .map(|entry| {
                let rel = normalize_rel_path(&entry.image.to_string_lossy())?;
                let path = self.root.join(&rel);
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("read template image '{}'", path.display()))?;
                let image = TemplateImage::from_bytes(bytes).map_err(|e| {
                    StampError::validation(format!("template '{}': {e}", entry.name))
                })?;
                Template::from_parts(entry.name.clone(), image, preview_box, entry.elements.clone())
            })
            .collect()
    }

    /// Snapshot of `templates` as a project file with the given image paths.
    ///
    /// In-memory image sources have no serialized form; a template holding one is rejected.
    pub fn capture(
        templates: &[(PathBuf, &Template)],
        preview_box: Option<PreviewBox>,
    ) -> StampResult<ProjectFile> {
        let templates = templates
            .iter()
            .map(|(image, t)| {
                let in_memory = t.elements().iter().find(|el| {
                    matches!(el, Element::Image(img) if matches!(img.source, ImageSource::Bytes(_)))
                });
                if let Some(el) = in_memory {
                    return Err(StampError::validation(format!(
                        "template '{}': image element {} holds in-memory bytes; \
                         save it to a file or use a url source before capturing",
                        t.name(),
                        el.id()
                    )));
                }
                Ok(TemplateSpec {
                    name: t.name().to_string(),
                    image: image.clone(),
                    elements: t.elements().to_vec(),
                })
            })
            .collect::<StampResult<Vec<_>>>()?;
        Ok(ProjectFile {
            preview_box,
            templates,
        })
    }
}

#[cfg(test)]
#[path = "../tests/unit/project.rs"]
mod tests;
