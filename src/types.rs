// Core types and errors for tablemark
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// Semantic role of a table region on the page
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Header,
    Items,
    Summary,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Header, Section::Items, Section::Summary];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Header => "header",
            Section::Items => "items",
            Section::Summary => "summary",
        }
    }

    /// Header holds any number of tables; items and summary hold at most one.
    pub fn allows_multiple(self) -> bool {
        matches!(self, Section::Header)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = GeometryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "header" => Ok(Section::Header),
            "items" => Ok(Section::Items),
            "summary" => Ok(Section::Summary),
            other => Err(GeometryError::UnknownSection(other.to_string())),
        }
    }
}

/// One value per section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionMap<T> {
    #[serde(default)]
    pub header: T,
    #[serde(default)]
    pub items: T,
    #[serde(default)]
    pub summary: T,
}

impl<T> SectionMap<T> {
    pub fn new(header: T, items: T, summary: T) -> Self {
        Self { header, items, summary }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Section, &T)> {
        Section::ALL.into_iter().map(move |s| (s, &self[s]))
    }
}

impl<T> Index<Section> for SectionMap<T> {
    type Output = T;

    fn index(&self, section: Section) -> &T {
        match section {
            Section::Header => &self.header,
            Section::Items => &self.items,
            Section::Summary => &self.summary,
        }
    }
}

impl<T> IndexMut<Section> for SectionMap<T> {
    fn index_mut(&mut self, section: Section) -> &mut T {
        match section {
            Section::Header => &mut self.header,
            Section::Items => &mut self.items,
            Section::Summary => &mut self.summary,
        }
    }
}

// Error types
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GeometryError {
    #[error("page has zero raster size ({width}x{height} px)")]
    ZeroRaster { width: u32, height: u32 },

    #[error("degenerate rectangle: {width} x {height}")]
    Degenerate { width: f64, height: f64 },

    #[error("column x={x} lies outside {label} ({left}..{right})")]
    ColumnOutsideRegion {
        x: f64,
        label: String,
        left: f64,
        right: f64,
    },

    #[error("no table region contains the point ({x}, {y})")]
    NoOwningRegion { x: f64, y: f64 },

    #[error("point ({x}, {y}) falls inside {count} overlapping regions")]
    AmbiguousOwner { x: f64, y: f64, count: usize },

    #[error("no such region: {0}")]
    UnknownRegion(String),

    #[error("unknown section: {0}")]
    UnknownSection(String),

    #[error("page {0} is out of range")]
    PageOutOfRange(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("template storage is corrupt: {0}")]
    Corruption(String),

    #[error("template not found: {0}")]
    NotFound(String),

    #[error("a template named {0:?} already exists")]
    DuplicateName(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TemplateError>;
