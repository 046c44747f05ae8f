use std::{collections::BTreeMap, io::Read, path::Path};

use anyhow::Context;

use crate::foundation::error::{StampError, StampResult};

/// One row of input data: field name -> string value.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(field, value)` pairs; later duplicates win.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Value of `field`, if present.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Set `field` to `value`.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into(), value.into());
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field names in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Ordered records plus the header list they share.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dataset {
    headers: Vec<String>,
    records: Vec<Record>,
}

impl Dataset {
    /// Dataset from explicit headers and records. Missing header values are filled with `""`.
    pub fn new(headers: Vec<String>, records: Vec<Record>) -> Self {
        let records = records
            .into_iter()
            .map(|mut r| {
                for h in &headers {
                    if r.get(h).is_none() {
                        r.insert(h.clone(), "");
                    }
                }
                r
            })
            .collect();
        Self { headers, records }
    }

    /// Dataset whose headers come from the first record's fields.
    pub fn from_records(records: Vec<Record>) -> Self {
        let headers = records
            .first()
            .map(|r| r.fields().map(str::to_string).collect())
            .unwrap_or_default();
        Self::new(headers, records)
    }

    /// Parse delimited text. The first row holds the headers; the delimiter is sniffed from
    /// it among `,`, `;`, tab and `|`.
    pub fn from_csv_reader(mut reader: impl Read) -> StampResult<Self> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .context("read tabular data")?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
        let delimiter = sniff_delimiter(text.lines().next().unwrap_or_default());

        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = rdr
            .headers()
            .context("read header row")?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.iter().all(String::is_empty) {
            return Ok(Self::default());
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = headers.iter().find(|h| !seen.insert(h.as_str())) {
            return Err(StampError::validation(format!(
                "header '{dup}' appears more than once"
            )));
        }

        let mut records = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let row_data = result.with_context(|| format!("read data row {}", row + 2))?;
            if row_data.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            let record = Record::from_pairs(
                headers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| (h.clone(), row_data.get(i).unwrap_or_default().to_string())),
            );
            records.push(record);
        }
        tracing::debug!(headers = headers.len(), records = records.len(), "dataset parsed");
        Ok(Self::new(headers, records))
    }

    /// Parse a delimited file from disk.
    pub fn from_csv_path(path: impl AsRef<Path>) -> StampResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("open dataset '{}'", path.display()))?;
        Self::from_csv_reader(std::io::BufReader::new(file))
    }

    /// Header list in column order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Records in input order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `field` is one of the headers.
    pub fn has_header(&self, field: &str) -> bool {
        self.headers.iter().any(|h| h == field)
    }
}

fn sniff_delimiter(header_line: &str) -> u8 {
    let mut best = (b',', 0usize);
    for d in [b',', b';', b'\t', b'|'] {
        let n = header_line.bytes().filter(|&b| b == d).count();
        // Earlier candidates win ties.
        if n > best.1 {
            best = (d, n);
        }
    }
    best.0
}

#[cfg(test)]
#[path = "../../tests/unit/model/dataset.rs"]
mod tests;
