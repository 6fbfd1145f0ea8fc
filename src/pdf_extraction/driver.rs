// Drives one extractor call per region and assembles the structured result
use super::classifier::{classify, ItemGroup};
use super::extractor::{ExtractionRequest, TableExtractor};
use super::regex_filter::RowFilter;
use super::reshape::reshape;
use super::table::Table;
use crate::geometry::TableRegion;
use crate::template::{ExtractionParams, Template, TemplateKind};
use crate::types::Section;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// What a single region produced
#[derive(Debug, Clone, PartialEq)]
pub enum RegionOutcome {
    Extracted(Table),
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum WarningKind {
    NoTablesFound,
    ExtractionFailed(String),
    InvalidPattern(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionWarning {
    pub label: String,
    #[serde(flatten)]
    pub kind: WarningKind,
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WarningKind::NoTablesFound => write!(f, "no_tables_found: {}", self.label),
            WarningKind::ExtractionFailed(e) => write!(f, "extraction_failed: {}: {}", self.label, e),
            WarningKind::InvalidPattern(e) => write!(f, "invalid_pattern: {}: {}", self.label, e),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    Success,
    Partial,
    Failed,
}

/// One region's cleaned table, kept in drawing order even when empty
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionTable {
    pub page: usize,
    pub section: Section,
    pub order_index: usize,
    pub label: String,
    pub table: Option<Table>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionReport {
    pub header: Vec<RegionTable>,
    pub items: Vec<ItemGroup>,
    pub summary: Vec<RegionTable>,
    pub warnings: Vec<ExtractionWarning>,
    pub status: ExtractionStatus,
}

impl ExtractionReport {
    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }
}

/// Per-region results of one section on one page
#[derive(Debug, Default)]
pub struct SectionRun {
    pub tables: Vec<RegionTable>,
    pub warnings: Vec<ExtractionWarning>,
}

/// Stateless across calls; safe to share between threads when the
/// extractor is.
pub struct ExtractionDriver<E> {
    extractor: E,
}

impl<E: TableExtractor> ExtractionDriver<E> {
    pub fn new(extractor: E) -> Self {
        Self { extractor }
    }

    pub fn extract(&self, pdf_path: &Path, template: &Template) -> ExtractionReport {
        let multi_page = template.kind() == TemplateKind::Multi;
        let mut header = Vec::new();
        let mut summary = Vec::new();
        let mut items = Vec::new();
        let mut warnings = Vec::new();
        let mut region_total = 0usize;
        let mut with_data = 0usize;

        for (page, page_template) in template.pages() {
            for section in Section::ALL {
                let regions = page_template.geometry.regions(section);
                if regions.is_empty() {
                    continue;
                }
                let prefix = multi_page.then(|| format!("page{page}_"));
                let run = self.extract_section(
                    pdf_path,
                    page,
                    section,
                    &regions,
                    &page_template.params,
                    prefix.as_deref(),
                );

                region_total += run.tables.len();
                with_data += run.tables.iter().filter(|t| t.table.is_some()).count();
                warnings.extend(run.warnings);

                match section {
                    Section::Header => header.extend(run.tables),
                    Section::Summary => summary.extend(run.tables),
                    Section::Items => {
                        for table in run.tables.iter().filter_map(|t| t.table.as_ref()) {
                            items.extend(classify(table));
                        }
                    }
                }
            }
        }

        let status = if with_data == 0 {
            ExtractionStatus::Failed
        } else if warnings.is_empty() {
            ExtractionStatus::Success
        } else {
            ExtractionStatus::Partial
        };
        info!(
            pdf = %pdf_path.display(),
            template = %template.name,
            regions = region_total,
            with_data,
            ?status,
            "extraction finished"
        );

        ExtractionReport { header, items, summary, warnings, status }
    }

    /// The one routine every section goes through: request per region,
    /// row filter, reshape. A failing region never stops its siblings.
    pub fn extract_section(
        &self,
        pdf_path: &Path,
        page: usize,
        section: Section,
        regions: &[TableRegion],
        params: &ExtractionParams,
        label_prefix: Option<&str>,
    ) -> SectionRun {
        let mut run = SectionRun::default();

        let filter = match params.regex_patterns[section].as_ref().filter(|r| !r.is_empty()) {
            None => None,
            Some(rule) => match RowFilter::new(rule) {
                Ok(filter) => Some(filter),
                Err(e) => {
                    warn!(%section, error = %e, "ignoring invalid row pattern");
                    run.warnings.push(ExtractionWarning {
                        label: format!("{}{}", label_prefix.unwrap_or(""), section),
                        kind: WarningKind::InvalidPattern(e.to_string()),
                    });
                    None
                }
            },
        };

        for region in regions {
            let label = format!("{}{}", label_prefix.unwrap_or(""), region.label());
            let request = ExtractionRequest {
                pdf_path: pdf_path.to_path_buf(),
                area: region.rect,
                columns: (!region.columns.is_empty()).then(|| region.columns.clone()),
                pages: page.to_string(),
                split_text: params.split_text,
                strip_text: params.strip_text.clone(),
                flavor: params.flavor,
                row_tolerance: params.row_tolerance.get(section),
            };

            let table = match self.extract_region(&request, &label) {
                RegionOutcome::Extracted(raw) => {
                    let raw = match &filter {
                        Some(f) => f.apply(raw),
                        None => raw,
                    };
                    let shaped = reshape(raw);
                    if shaped.is_none() {
                        warn!(%label, "region produced only empty rows");
                        run.warnings.push(ExtractionWarning {
                            label: label.clone(),
                            kind: WarningKind::NoTablesFound,
                        });
                    }
                    shaped
                }
                RegionOutcome::NotFound => {
                    run.warnings.push(ExtractionWarning {
                        label: label.clone(),
                        kind: WarningKind::NoTablesFound,
                    });
                    None
                }
                RegionOutcome::Failed(message) => {
                    run.warnings.push(ExtractionWarning {
                        label: label.clone(),
                        kind: WarningKind::ExtractionFailed(message),
                    });
                    None
                }
            };

            run.tables.push(RegionTable {
                page,
                section,
                order_index: region.order_index,
                label,
                table,
            });
        }
        run
    }

    fn extract_region(&self, request: &ExtractionRequest, label: &str) -> RegionOutcome {
        debug!(
            %label,
            area = %request.area_string(),
            columns = ?request.columns_string(),
            pages = %request.pages,
            "extracting region"
        );
        match self.extractor.extract(request) {
            Ok(Some(table)) if !table.is_empty() => RegionOutcome::Extracted(table),
            Ok(_) => {
                warn!(%label, "no tables found");
                RegionOutcome::NotFound
            }
            Err(e) => {
                warn!(%label, error = %format!("{e:#}"), "extractor failed");
                RegionOutcome::Failed(format!("{e:#}"))
            }
        }
    }
}
