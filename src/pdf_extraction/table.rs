// Raw tabular output of the extractor
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use std::fmt;

/// Cell value; `None` is a missing cell
pub type Cell = Option<String>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
pub enum ColumnLabel {
    /// Unnamed column, addressed by original position
    Positional(usize),
    Named(String),
}

impl fmt::Display for ColumnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnLabel::Positional(i) => write!(f, "{i}"),
            ColumnLabel::Named(name) => f.write_str(name),
        }
    }
}

impl Serialize for ColumnLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, serde::Serialize)]
pub struct Table {
    pub columns: Vec<ColumnLabel>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Positional labels; short rows are padded with missing cells.
    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self {
            columns: (0..width).map(ColumnLabel::Positional).collect(),
            rows,
        }
    }

    /// Convenience for tests and fixtures: "" becomes a missing cell
    pub fn from_strs(rows: &[&[&str]]) -> Self {
        Self::from_rows(
            rows.iter()
                .map(|r| {
                    r.iter()
                        .map(|c| if c.is_empty() { None } else { Some((*c).to_string()) })
                        .collect()
                })
                .collect(),
        )
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    pub fn has_positional_labels(&self) -> bool {
        self.columns.iter().all(|c| matches!(c, ColumnLabel::Positional(_)))
    }

    /// Rows as label->value records, skipping missing cells
    pub fn records(&self) -> Vec<Record<'_>> {
        self.rows.iter().map(|row| Record { columns: &self.columns, row }).collect()
    }
}

/// Borrowed view of one row keyed by column label
pub struct Record<'a> {
    columns: &'a [ColumnLabel],
    row: &'a [Cell],
}

impl Record<'_> {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c.to_string() == label)
            .and_then(|i| self.row.get(i))
            .and_then(|c| c.as_deref())
    }
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (label, cell) in self.columns.iter().zip(self.row) {
            if let Some(value) = cell {
                map.serialize_entry(label, value)?;
            }
        }
        map.end()
    }
}

/// Joined text of the present cells, used for row-level matching
pub fn row_text(row: &[Cell]) -> String {
    row.iter()
        .filter_map(|c| c.as_deref())
        .collect::<Vec<_>>()
        .join(" ")
}
