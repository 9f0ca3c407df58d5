//! Tab-separated sheet body parsing.

use std::collections::HashMap;

/// One data row of a sheet, keyed by header name.
///
/// Columns missing from a short row are absent, never empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    fields: HashMap<String, String>,
}

impl Row {
    /// Builds a row from `(header, value)` pairs.
    #[must_use]
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns the raw value of a column, if the row has it.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Returns the trimmed value of a column, or `""` when absent.
    #[must_use]
    pub fn field(&self, column: &str) -> &str {
        self.get(column).map_or("", str::trim)
    }

    /// Returns the first non-blank trimmed value among `columns`.
    #[must_use]
    pub fn first_of(&self, columns: &[&str]) -> Option<&str> {
        columns
            .iter()
            .map(|column| self.field(column))
            .find(|value| !value.is_empty())
    }

    /// Number of columns present in this row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Parses a TSV body into rows keyed by the header line.
///
/// The first line is the header. Blank lines are skipped, values beyond the
/// header width are dropped, and short rows leave trailing columns absent.
#[must_use]
pub fn parse_tsv(body: &str) -> Vec<Row> {
    let mut lines = body.lines();
    let Some(header_line) = lines.next() else {
        return Vec::new();
    };
    let headers: Vec<&str> = header_line.split('\t').collect();

    lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| Row::from_pairs(headers.iter().copied().zip(line.split('\t'))))
        .collect()
}
