use std::{
    collections::HashMap,
    io::{Cursor, Write},
};

use crate::{
    foundation::error::{StampError, StampResult},
    render::settings::ArchiveCompression,
};

/// In-memory zip assembled from named entries.
///
/// Entries are written in insertion order. Inserting a path that already exists replaces its
/// content but keeps its original position.
#[derive(Debug)]
pub struct ArchiveBuilder {
    compression: ArchiveCompression,
    entries: Vec<(String, Vec<u8>)>,
    index: HashMap<String, usize>,
}

impl ArchiveBuilder {
    /// Empty archive.
    pub fn new(compression: ArchiveCompression) -> Self {
        Self {
            compression,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add or replace one entry. Returns `true` when an existing entry was overwritten.
    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) -> bool {
        let path = path.into();
        if let Some(&i) = self.index.get(&path) {
            tracing::warn!(path = %path, "archive entry overwritten by a later record");
            self.entries[i].1 = bytes;
            return true;
        }
        self.index.insert(path.clone(), self.entries.len());
        self.entries.push((path, bytes));
        false
    }

    /// Entry paths in archive order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    /// Number of distinct entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry was added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the zip and return its bytes.
    pub fn finish(self) -> StampResult<Vec<u8>> {
        let method = match self.compression {
            ArchiveCompression::Deflate => zip::CompressionMethod::Deflated,
            ArchiveCompression::Stored => zip::CompressionMethod::Stored,
        };
        // fixed default timestamp keeps archives reproducible
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(method)
            .unix_permissions(0o644);

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (path, bytes) in &self.entries {
            zip.start_file(path.as_str(), options)?;
            zip.write_all(bytes)
                .map_err(|e| StampError::archive(format!("write entry '{path}': {e}")))?;
        }
        Ok(zip.finish()?.into_inner())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/archive.rs"]
mod tests;
