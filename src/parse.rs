use std::collections::HashSet;

use csv::ReaderBuilder;

use crate::config::HeaderVocabulary;
use crate::error::{IngestError, RowError};

const BOM: char = '\u{feff}';

/// Picks the field separator from the header line. Comma unless another
/// candidate clearly dominates.
pub fn detect_delimiter(header_line: &str) -> u8 {
    let line = header_line.trim_start_matches(BOM);
    let commas = line.matches(',').count();
    let semicolons = line.matches(';').count();
    let tabs = line.matches('\t').count();

    if semicolons > commas && semicolons >= tabs {
        b';'
    } else if tabs > commas && tabs > semicolons {
        b'\t'
    } else {
        b','
    }
}

/// Case, whitespace and punctuation folding used for synonym lookup.
pub fn fold_header(raw: &str) -> String {
    raw.trim_matches(|c: char| c == BOM || c.is_whitespace())
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

pub struct HeaderCanonicalizer<'a> {
    vocabulary: &'a HeaderVocabulary,
}

impl<'a> HeaderCanonicalizer<'a> {
    pub fn new(vocabulary: &'a HeaderVocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn canonicalize(&self, raw: &str) -> String {
        match self.vocabulary.lookup(&fold_header(raw)) {
            Some(canonical) => canonical.to_string(),
            None => raw
                .trim_matches(|c: char| c == BOM || c.is_whitespace())
                .to_string(),
        }
    }

    /// Keeps order and length so headers can be paired positionally with cells.
    pub fn canonicalize_all(&self, headers: &[String]) -> Vec<String> {
        headers.iter().map(|h| self.canonicalize(h)).collect()
    }
}

/// The upload split into its header and raw cell lines.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub delimiter: u8,
    pub headers: Vec<String>,
    pub lines: Vec<Vec<String>>,
}

impl RawRecord {
    pub fn read(text: &str) -> Result<Self, IngestError> {
        let text = text.trim_start_matches(BOM);
        if text.trim().is_empty() {
            return Err(IngestError::MalformedInput("the uploaded file is empty".into()));
        }

        let header_line = text.lines().next().unwrap_or_default();
        if header_line.trim().is_empty() {
            return Err(IngestError::MalformedInput(
                "the header row is missing or empty".into(),
            ));
        }

        let delimiter = detect_delimiter(header_line);
        let headers = read_line(header_line, delimiter).map_err(|err| {
            IngestError::MalformedInput(format!("unable to read the header row: {err}"))
        })?;
        if headers.iter().all(|h| h.trim_matches(BOM).trim().is_empty()) {
            return Err(IngestError::MalformedInput(
                "the header row is missing or empty".into(),
            ));
        }

        let mut lines = Vec::new();
        for (index, line) in text.lines().enumerate().skip(1) {
            match read_line(line, delimiter) {
                Ok(cells) => lines.push(cells),
                Err(err) => tracing::warn!(line = index + 1, %err, "skipping unreadable line"),
            }
        }

        Ok(Self {
            delimiter,
            headers,
            lines,
        })
    }
}

/// Splits one physical line into cells. Quotes protect delimiters but never
/// continue a record onto the next line.
fn read_line(line: &str, delimiter: u8) -> Result<Vec<String>, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(record) => Ok(record?.iter().map(str::to_string).collect()),
        None => Ok(Vec::new()),
    }
}

/// Ordered canonical-field → value pairs for one data line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRow {
    fields: Vec<(String, String)>,
}

impl CanonicalRow {
    /// Pairs `headers` with `cells`, padding short rows with empty strings and
    /// dropping cells past the last header.
    pub fn from_cells(headers: &[String], cells: &[String]) -> Result<Self, RowError> {
        let mut seen = HashSet::with_capacity(headers.len());
        let mut fields = Vec::with_capacity(headers.len());

        for (index, header) in headers.iter().enumerate() {
            if !seen.insert(header.as_str()) {
                return Err(RowError::DuplicateColumn(header.clone()));
            }
            let value = cells.get(index).map(|c| c.trim()).unwrap_or_default();
            fields.push((header.clone(), value.to_string()));
        }

        Ok(Self { fields })
    }

    /// Value of `field`, or `None` when the column is absent or blank.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.raw(field).filter(|v| !v.is_empty())
    }

    pub fn raw(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }
}

/// Turns every non-blank line into a [`CanonicalRow`]. Rows that cannot be
/// paired with the headers are skipped, never fatal.
pub fn parse_rows(raw: &RawRecord, canonicalizer: &HeaderCanonicalizer<'_>) -> Vec<CanonicalRow> {
    let headers = canonicalizer.canonicalize_all(&raw.headers);
    tracing::debug!(
        delimiter = %char::from(raw.delimiter).escape_default(),
        ?headers,
        lines = raw.lines.len(),
        "parsing upload"
    );
    let mut rows = Vec::with_capacity(raw.lines.len());

    for (index, cells) in raw.lines.iter().enumerate() {
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        if cells.len() > headers.len() {
            tracing::debug!(
                line = index + 2,
                cells = cells.len(),
                headers = headers.len(),
                "truncating row to header length"
            );
        }
        match CanonicalRow::from_cells(&headers, cells) {
            Ok(row) => rows.push(row),
            Err(err) => tracing::warn!(line = index + 2, %err, "skipping row"),
        }
    }

    rows
}

pub fn parse_csv_text(
    text: &str,
    vocabulary: &HeaderVocabulary,
) -> Result<Vec<CanonicalRow>, IngestError> {
    let raw = RawRecord::read(text)?;
    Ok(parse_rows(&raw, &HeaderCanonicalizer::new(vocabulary)))
}
