// Template model: regions + extraction parameters, single or multi-page
use crate::config::{DEFAULT_ROW_TOLERANCE, MAX_TEMPLATE_NAME_LEN};
use crate::geometry::{GeometryModel, PageGeometry, StoredColumnLines, StoredRegions};
use crate::types::{Result, Section, SectionMap, TemplateError};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    // Only stream is supported; anything else on disk reads back as stream
    #[default]
    #[serde(other)]
    Stream,
}

impl Flavor {
    pub fn as_str(self) -> &'static str {
        match self {
            Flavor::Stream => "stream",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowTolerance {
    #[serde(default = "default_row_tolerance")]
    pub header: u32,
    #[serde(default = "default_row_tolerance")]
    pub items: u32,
    #[serde(default = "default_row_tolerance")]
    pub summary: u32,
}

fn default_row_tolerance() -> u32 { DEFAULT_ROW_TOLERANCE }
fn default_strip_text() -> String { "\n".to_string() }
fn default_true() -> bool { true }

impl Default for RowTolerance {
    fn default() -> Self {
        Self {
            header: DEFAULT_ROW_TOLERANCE,
            items: DEFAULT_ROW_TOLERANCE,
            summary: DEFAULT_ROW_TOLERANCE,
        }
    }
}

impl RowTolerance {
    pub fn get(&self, section: Section) -> u32 {
        match section {
            Section::Header => self.header,
            Section::Items => self.items,
            Section::Summary => self.summary,
        }
    }
}

/// Start/end/skip row patterns for one section. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<String>,
    #[serde(default = "default_true")]
    pub include_matches: bool,
}

impl Default for RegexRule {
    fn default() -> Self {
        Self { start: None, end: None, skip: None, include_matches: true }
    }
}

impl RegexRule {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.skip.is_none()
    }

    pub fn patterns(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        [("start", &self.start), ("end", &self.end), ("skip", &self.skip)]
            .into_iter()
            .filter_map(|(kind, p)| p.as_deref().map(|p| (kind, p)))
    }
}

pub type RegexPatternSet = SectionMap<Option<RegexRule>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionParams {
    #[serde(default)]
    pub row_tolerance: RowTolerance,
    #[serde(default)]
    pub split_text: bool,
    #[serde(default = "default_strip_text")]
    pub strip_text: String,
    #[serde(default)]
    pub flavor: Flavor,
    #[serde(default)]
    pub regex_patterns: RegexPatternSet,
}

impl Default for ExtractionParams {
    fn default() -> Self {
        Self {
            row_tolerance: RowTolerance::default(),
            split_text: false,
            strip_text: default_strip_text(),
            flavor: Flavor::Stream,
            regex_patterns: RegexPatternSet::default(),
        }
    }
}

impl ExtractionParams {
    /// Every configured pattern must compile
    pub fn validate(&self) -> Result<()> {
        for (section, rule) in self.regex_patterns.iter() {
            let Some(rule) = rule else { continue };
            for (kind, pattern) in rule.patterns() {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        TemplateError::Validation(format!("{section} {kind} pattern {pattern:?}: {e}"))
                    })?;
            }
        }
        Ok(())
    }
}

/// Geometry and parameters for one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageTemplate {
    pub geometry: PageGeometry,
    pub params: ExtractionParams,
}

impl PageTemplate {
    pub fn new(geometry: PageGeometry, params: ExtractionParams) -> Self {
        Self { geometry, params }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    #[default]
    Single,
    Multi,
}

impl TemplateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateKind::Single => "single",
            TemplateKind::Multi => "multi",
        }
    }

    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("multi") {
            TemplateKind::Multi
        } else {
            TemplateKind::Single
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateLayout {
    Single(PageTemplate),
    Multi {
        page_count: usize,
        pages: BTreeMap<usize, PageTemplate>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub id: Option<i64>,
    pub name: String,
    pub description: String,
    pub layout: TemplateLayout,
    pub validation_rules: serde_json::Value,
    pub created_at: Option<String>,
    pub last_modified: Option<String>,
}

impl Template {
    pub fn single(name: impl Into<String>, page: PageTemplate) -> Self {
        Self::with_layout(name, TemplateLayout::Single(page))
    }

    pub fn multi(
        name: impl Into<String>,
        page_count: usize,
        pages: BTreeMap<usize, PageTemplate>,
    ) -> Self {
        Self::with_layout(name, TemplateLayout::Multi { page_count, pages })
    }

    fn with_layout(name: impl Into<String>, layout: TemplateLayout) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            layout,
            validation_rules: serde_json::Value::Null,
            created_at: None,
            last_modified: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn kind(&self) -> TemplateKind {
        match self.layout {
            TemplateLayout::Single(_) => TemplateKind::Single,
            TemplateLayout::Multi { .. } => TemplateKind::Multi,
        }
    }

    pub fn page_count(&self) -> usize {
        match &self.layout {
            TemplateLayout::Single(_) => 1,
            TemplateLayout::Multi { page_count, .. } => *page_count,
        }
    }

    /// Pages with their templates in page order. Single layouts report page 1.
    pub fn pages(&self) -> Vec<(usize, &PageTemplate)> {
        match &self.layout {
            TemplateLayout::Single(page) => vec![(1, page)],
            TemplateLayout::Multi { pages, .. } => pages.iter().map(|(n, p)| (*n, p)).collect(),
        }
    }

    pub fn geometry(&self) -> GeometryModel {
        GeometryModel::from_pages(
            self.pages()
                .into_iter()
                .map(|(n, p)| (n, p.geometry.clone()))
                .collect(),
        )
    }

    /// Replace every page's geometry with `model`, keeping per-page params.
    /// Pages the model does not mention are left without regions.
    pub fn set_geometry(&mut self, model: &GeometryModel) {
        match &mut self.layout {
            TemplateLayout::Single(page) => {
                page.geometry = model.page(1).cloned().unwrap_or_default();
            }
            TemplateLayout::Multi { page_count, pages } => {
                for page in pages.values_mut() {
                    page.geometry = PageGeometry::default();
                }
                for (n, geometry) in model.pages() {
                    pages.entry(n).or_default().geometry = geometry.clone();
                    *page_count = (*page_count).max(n);
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(TemplateError::Validation("template name is empty".into()));
        }
        if name.chars().count() > MAX_TEMPLATE_NAME_LEN {
            return Err(TemplateError::Validation(format!(
                "template name exceeds {MAX_TEMPLATE_NAME_LEN} characters"
            )));
        }
        if let TemplateLayout::Multi { page_count, pages } = &self.layout {
            if *page_count == 0 {
                return Err(TemplateError::Validation("page count must be at least 1".into()));
            }
            if let Some(bad) = pages.keys().find(|&&p| p == 0 || p > *page_count) {
                return Err(TemplateError::Validation(format!(
                    "page {bad} is outside 1..={page_count}"
                )));
            }
        }
        for (_, page) in self.pages() {
            page.params.validate()?;
        }
        Ok(())
    }

    pub fn to_document(&self) -> TemplateDocument {
        let mut doc = TemplateDocument {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            kind: self.kind(),
            page_count: None,
            regions: StoredRegions::default(),
            column_lines: StoredColumnLines::default(),
            params: ExtractionParams::default(),
            page_regions: BTreeMap::new(),
            page_column_lines: BTreeMap::new(),
            page_params: BTreeMap::new(),
            validation_rules: self.validation_rules.clone(),
            creation_date: self.created_at.clone(),
            last_modified: self.last_modified.clone(),
        };

        match &self.layout {
            TemplateLayout::Single(page) => {
                let (regions, columns) = page.geometry.to_stored();
                doc.regions = regions;
                doc.column_lines = columns;
                doc.params = page.params.clone();
            }
            TemplateLayout::Multi { page_count, pages } => {
                doc.page_count = Some(*page_count);
                for (n, page) in pages {
                    let (regions, columns) = page.geometry.to_stored();
                    doc.page_regions.insert(*n, regions);
                    doc.page_column_lines.insert(*n, columns);
                    doc.page_params.insert(*n, page.params.clone());
                }
                // Single-page readers still see page 1
                if let Some(first) = pages.get(&1) {
                    let (regions, columns) = first.geometry.to_stored();
                    doc.regions = regions;
                    doc.column_lines = columns;
                    doc.params = first.params.clone();
                }
            }
        }
        doc
    }

    pub fn from_document(doc: TemplateDocument) -> Self {
        let layout = match doc.kind {
            TemplateKind::Single => TemplateLayout::Single(PageTemplate::new(
                PageGeometry::from_stored(&doc.regions, &doc.column_lines),
                doc.params,
            )),
            TemplateKind::Multi => {
                let mut numbers: Vec<usize> = doc
                    .page_regions
                    .keys()
                    .chain(doc.page_params.keys())
                    .copied()
                    .collect();
                numbers.sort_unstable();
                numbers.dedup();

                let empty_columns = StoredColumnLines::default();
                let pages: BTreeMap<usize, PageTemplate> = numbers
                    .into_iter()
                    .map(|n| {
                        let regions = doc.page_regions.get(&n).cloned().unwrap_or_default();
                        let columns = doc.page_column_lines.get(&n).unwrap_or(&empty_columns);
                        let params = doc.page_params.get(&n).cloned().unwrap_or_else(|| doc.params.clone());
                        (n, PageTemplate::new(PageGeometry::from_stored(&regions, columns), params))
                    })
                    .collect();
                let page_count = doc
                    .page_count
                    .unwrap_or_else(|| pages.keys().next_back().copied().unwrap_or(1))
                    .max(1);
                TemplateLayout::Multi { page_count, pages }
            }
        };

        Self {
            id: doc.id,
            name: doc.name,
            description: doc.description,
            layout,
            validation_rules: doc.validation_rules,
            created_at: doc.creation_date,
            last_modified: doc.last_modified,
        }
    }
}

/// Persisted and exported form of a template. Unknown keys are ignored and
/// missing optional keys fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: TemplateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
    #[serde(default)]
    pub regions: StoredRegions,
    #[serde(default)]
    pub column_lines: StoredColumnLines,
    #[serde(default)]
    pub params: ExtractionParams,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub page_regions: BTreeMap<usize, StoredRegions>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub page_column_lines: BTreeMap<usize, StoredColumnLines>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub page_params: BTreeMap<usize, ExtractionParams>,
    #[serde(default)]
    pub validation_rules: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// Row of `list_templates`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSummary {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub kind: TemplateKind,
    pub page_count: usize,
    pub created_at: Option<String>,
    pub last_modified: Option<String>,
}
