//! Templates x records export into one zip archive.

use crate::{
    assets::store::{PreparedTemplate, SourceResolver},
    foundation::error::{StampError, StampResult},
    model::dataset::{Dataset, Record},
    model::element::ElementId,
    model::template::Template,
    render::archive::ArchiveBuilder,
    render::compositor::Compositor,
    render::encode::encode_png,
    render::settings::ArchiveCompression,
};

/// Progress after one (template, record) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchProgress {
    /// Pairs finished so far, rendered or skipped.
    pub completed: usize,
    /// Eligible templates times records.
    pub total: usize,
}

impl BatchProgress {
    /// `completed / total` in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }
}

/// Something left out of a batch, with the reason.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Skipped {
    /// Template name.
    pub template: String,
    /// 0-based record index, when the skip concerns one record.
    pub record: Option<usize>,
    /// Element id, when the skip concerns one element.
    pub element: Option<ElementId>,
    /// Human-readable reason.
    pub reason: String,
}

/// Result of one batch run.
#[derive(Clone, Debug)]
pub struct BatchOutput {
    /// Finished zip bytes (`certificates.zip`).
    pub archive: Vec<u8>,
    /// Images rendered; exceeds `entries.len()` when file names collided.
    pub images_generated: usize,
    /// Archive paths in insertion order.
    pub entries: Vec<String>,
    /// Elements, records and templates left out.
    pub skipped: Vec<Skipped>,
}

/// Output file stem for `record`: `Name`, else `name`, else `certificate_{index + 1}`, with
/// every character outside `[A-Za-z0-9]` replaced by `_`.
pub fn safe_file_name(record: &Record, index: usize) -> String {
    let raw = ["Name", "name"]
        .iter()
        .filter_map(|k| record.get(k))
        .find(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("certificate_{}", index + 1));
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn folder_name(template: &Template, position: usize) -> String {
    let name = template.name().trim();
    if name.is_empty() {
        return format!("template_{}", position + 1);
    }
    name.replace(['/', '\\'], "_")
}

/// Drives a [`Compositor`] over every eligible template and record.
///
/// Templates are processed in list order and records in dataset order; that order fixes both
/// progress growth and archive entry order.
pub struct BatchRenderer<'a> {
    compositor: &'a mut Compositor,
    resolver: &'a dyn SourceResolver,
    compression: ArchiveCompression,
}

impl<'a> BatchRenderer<'a> {
    /// Batch renderer drawing with `compositor` and loading sources through `resolver`.
    pub fn new(compositor: &'a mut Compositor, resolver: &'a dyn SourceResolver) -> Self {
        Self {
            compositor,
            resolver,
            compression: ArchiveCompression::default(),
        }
    }

    /// Archive entry packing.
    pub fn with_compression(mut self, compression: ArchiveCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Render every (eligible template, record) pair into one archive.
    ///
    /// Templates without text elements are skipped silently; zero-size templates are skipped
    /// and reported. Failures of one element or one pair never abort the batch. With nothing to
    /// do the result is an empty archive and `on_progress` is never called.
    #[tracing::instrument(skip_all, fields(templates = templates.len(), records = dataset.len()))]
    pub fn run(
        &mut self,
        templates: &[Template],
        dataset: &Dataset,
        mut on_progress: impl FnMut(BatchProgress),
    ) -> StampResult<BatchOutput> {
        let mut skipped = Vec::new();
        let mut eligible = Vec::new();
        for t in templates {
            if t.text_element_count() == 0 {
                tracing::debug!(template = %t.name(), "template has no text elements; skipped");
                continue;
            }
            if t.image().is_degenerate() {
                tracing::warn!(template = %t.name(), "template image has zero size; skipped");
                skipped.push(Skipped {
                    template: t.name().to_string(),
                    record: None,
                    element: None,
                    reason: "template image has zero size".to_string(),
                });
                continue;
            }
            eligible.push(t);
        }

        let total = eligible.len() * dataset.len();
        let nested = eligible.len() > 1;
        tracing::info!(
            eligible = eligible.len(),
            records = dataset.len(),
            total,
            "batch render started"
        );

        let mut archive = ArchiveBuilder::new(self.compression);
        let mut images_generated = 0usize;
        let mut completed = 0usize;

        if total > 0 {
            for (pos, template) in eligible.iter().enumerate() {
                let folder = folder_name(template, pos);
                let prepared = match PreparedTemplate::prepare(template, self.resolver) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(
                            template = %template.name(),
                            error = %e,
                            "template could not be prepared; skipped"
                        );
                        skipped.push(Skipped {
                            template: template.name().to_string(),
                            record: None,
                            element: None,
                            reason: e.to_string(),
                        });
                        for _ in dataset.records() {
                            completed += 1;
                            on_progress(BatchProgress { completed, total });
                        }
                        continue;
                    }
                };
                skipped.extend(prepared.skipped().iter().map(|e| Skipped {
                    template: template.name().to_string(),
                    record: None,
                    element: match e {
                        StampError::ImageDecode { element, .. } => Some(*element),
                        _ => None,
                    },
                    reason: e.to_string(),
                }));

                for (idx, record) in dataset.records().iter().enumerate() {
                    let stem = safe_file_name(record, idx);
                    let path = if nested {
                        format!("{folder}/{stem}.png")
                    } else {
                        format!("{stem}.png")
                    };

                    match self.render_one(&prepared, record) {
                        Ok(png) => {
                            archive.insert(path.as_str(), png);
                            images_generated += 1;
                            tracing::debug!(path = %path, "rendered");
                        }
                        Err(e) => {
                            tracing::warn!(
                                template = %template.name(),
                                record = idx,
                                error = %e,
                                "record could not be rendered; skipped"
                            );
                            skipped.push(Skipped {
                                template: template.name().to_string(),
                                record: Some(idx),
                                element: None,
                                reason: e.to_string(),
                            });
                        }
                    }

                    completed += 1;
                    on_progress(BatchProgress { completed, total });
                }
            }
        }

        self.compositor.clear_cache();

        let entries: Vec<String> = archive.paths().map(str::to_string).collect();
        let archive = archive.finish()?;
        tracing::info!(
            images_generated,
            entries = entries.len(),
            skipped = skipped.len(),
            "batch render finished"
        );

        Ok(BatchOutput {
            archive,
            images_generated,
            entries,
            skipped,
        })
    }

    fn render_one(&mut self, prepared: &PreparedTemplate, record: &Record) -> StampResult<Vec<u8>> {
        let frame = self.compositor.render(prepared, record)?;
        encode_png(&frame)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/batch.rs"]
mod tests;
