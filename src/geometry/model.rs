// Per-page, per-section table regions and their column dividers
use super::mapper::CoordinateMapper;
use super::rect::{ContentRect, DeviceRect};
use crate::types::{GeometryError, Section, SectionMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// A table region as handed to extraction: rect plus its sorted column xs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRegion {
    pub section: Section,
    pub order_index: usize,
    pub rect: ContentRect,
    pub columns: Vec<f64>,
}

impl TableRegion {
    /// "header_table_1", "items_table_1", ...
    pub fn label(&self) -> String {
        region_label(self.section, self.order_index)
    }
}

pub fn region_label(section: Section, order_index: usize) -> String {
    format!("{}_table_{}", section, order_index + 1)
}

/// Vertical divider owned by exactly one region
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnLine {
    pub x: f64,
    pub section: Section,
    pub owner_index: usize,
}

/// On-disk shape of a column line. Old files stored bare x values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredColumnLine {
    Tagged {
        x: f64,
        #[serde(default)]
        table_index: Option<usize>,
    },
    Bare(f64),
}

impl StoredColumnLine {
    fn parts(&self) -> (f64, Option<usize>) {
        match *self {
            StoredColumnLine::Tagged { x, table_index } => (x, table_index),
            StoredColumnLine::Bare(x) => (x, None),
        }
    }
}

pub type StoredRegions = SectionMap<Vec<ContentRect>>;
pub type StoredColumnLines = SectionMap<Vec<StoredColumnLine>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageGeometry {
    regions: SectionMap<Vec<ContentRect>>,
    columns: SectionMap<Vec<ColumnLine>>,
}

impl PageGeometry {
    pub fn is_empty(&self) -> bool {
        Section::ALL.iter().all(|&s| self.regions[s].is_empty())
    }

    pub fn region_count(&self, section: Section) -> usize {
        self.regions[section].len()
    }

    pub fn rects(&self, section: Section) -> &[ContentRect] {
        &self.regions[section]
    }

    pub fn column_lines(&self, section: Section) -> &[ColumnLine] {
        &self.columns[section]
    }

    /// Regions of a section in drawing order, each with its own columns
    pub fn regions(&self, section: Section) -> Vec<TableRegion> {
        self.regions[section]
            .iter()
            .enumerate()
            .map(|(order_index, rect)| TableRegion {
                section,
                order_index,
                rect: *rect,
                columns: self.column_xs(section, order_index),
            })
            .collect()
    }

    pub fn column_xs(&self, section: Section, order_index: usize) -> Vec<f64> {
        let mut xs: Vec<f64> = self.columns[section]
            .iter()
            .filter(|c| c.owner_index == order_index)
            .map(|c| c.x)
            .collect();
        xs.sort_by(|a, b| a.total_cmp(b));
        xs
    }

    /// Returns the new region's order index
    pub fn add_region(&mut self, section: Section, rect: ContentRect) -> usize {
        if !section.allows_multiple() {
            self.regions[section].clear();
            self.columns[section].clear();
        }
        self.regions[section].push(rect);
        self.regions[section].len() - 1
    }

    /// Attach a divider to the single region under the pointer-down point.
    pub fn add_column_line(&mut self, x: f64, y: f64) -> Result<ColumnLine, GeometryError> {
        let hits: Vec<(Section, usize)> = Section::ALL
            .iter()
            .flat_map(|&s| {
                self.regions[s]
                    .iter()
                    .enumerate()
                    .filter(move |(_, r)| r.contains(x, y))
                    .map(move |(i, _)| (s, i))
            })
            .collect();

        match hits.as_slice() {
            [] => Err(GeometryError::NoOwningRegion { x, y }),
            [(section, order_index)] => self.add_owned_column(*section, *order_index, x),
            many => Err(GeometryError::AmbiguousOwner { x, y, count: many.len() }),
        }
    }

    /// Attach a divider to an explicitly named region
    pub fn add_owned_column(
        &mut self,
        section: Section,
        order_index: usize,
        x: f64,
    ) -> Result<ColumnLine, GeometryError> {
        let rect = self.regions[section]
            .get(order_index)
            .ok_or_else(|| GeometryError::UnknownRegion(region_label(section, order_index)))?;
        if !rect.contains_x(x) {
            return Err(GeometryError::ColumnOutsideRegion {
                x,
                label: region_label(section, order_index),
                left: rect.left(),
                right: rect.right(),
            });
        }
        let line = ColumnLine { x, section, owner_index: order_index };
        self.columns[section].push(line);
        Ok(line)
    }

    pub fn clear_section(&mut self, section: Section) {
        self.regions[section].clear();
        self.columns[section].clear();
    }

    pub fn to_stored(&self) -> (StoredRegions, StoredColumnLines) {
        let regions = self.regions.clone();
        let mut columns = StoredColumnLines::default();
        for section in Section::ALL {
            columns[section] = self.columns[section]
                .iter()
                .map(|c| StoredColumnLine::Tagged { x: c.x, table_index: Some(c.owner_index) })
                .collect();
        }
        (regions, columns)
    }

    /// Rebuild from persisted JSON. Untagged legacy lines are attributed only
    /// when exactly one region of their section spans them; otherwise dropped.
    pub fn from_stored(regions: &StoredRegions, columns: &StoredColumnLines) -> Self {
        let mut page = PageGeometry { regions: regions.clone(), ..Default::default() };

        for section in Section::ALL {
            for stored in &columns[section] {
                let (x, tag) = stored.parts();
                let owner = match tag {
                    Some(index) => Some(index),
                    None => {
                        let spanning: Vec<usize> = page.regions[section]
                            .iter()
                            .enumerate()
                            .filter(|(_, r)| r.contains_x(x))
                            .map(|(i, _)| i)
                            .collect();
                        match spanning.as_slice() {
                            [only] => Some(*only),
                            _ => None,
                        }
                    }
                };

                let Some(owner) = owner else {
                    warn!(%section, x, "dropping untagged column line with no unique owner");
                    continue;
                };
                if let Err(e) = page.add_owned_column(section, owner, x) {
                    warn!(%section, x, error = %e, "dropping stored column line");
                }
            }
        }
        page
    }
}

/// All pages of a template layout. Pages are 1-based.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryModel {
    pages: BTreeMap<usize, PageGeometry>,
}

impl GeometryModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pages(pages: BTreeMap<usize, PageGeometry>) -> Self {
        Self { pages }
    }

    pub fn page(&self, page: usize) -> Option<&PageGeometry> {
        self.pages.get(&page)
    }

    pub fn pages(&self) -> impl Iterator<Item = (usize, &PageGeometry)> {
        self.pages.iter().map(|(p, g)| (*p, g))
    }

    pub fn page_count(&self) -> usize {
        self.pages.keys().next_back().copied().unwrap_or(0)
    }

    fn page_mut(&mut self, page: usize) -> Result<&mut PageGeometry, GeometryError> {
        if page == 0 {
            return Err(GeometryError::PageOutOfRange(page));
        }
        Ok(self.pages.entry(page).or_default())
    }

    pub fn add_region(
        &mut self,
        page: usize,
        section: Section,
        rect: ContentRect,
    ) -> Result<TableRegion, GeometryError> {
        let order_index = self.page_mut(page)?.add_region(section, rect);
        Ok(TableRegion { section, order_index, rect, columns: Vec::new() })
    }

    pub fn add_region_from_device(
        &mut self,
        page: usize,
        section: Section,
        rect: &DeviceRect,
        mapper: &CoordinateMapper,
    ) -> Result<TableRegion, GeometryError> {
        let content = mapper.to_content_rect(rect)?;
        self.add_region(page, section, content)
    }

    /// `(x, y)` is the pointer-down location in content space
    pub fn add_column_line(&mut self, page: usize, x: f64, y: f64) -> Result<ColumnLine, GeometryError> {
        self.pages
            .get_mut(&page)
            .ok_or(GeometryError::NoOwningRegion { x, y })?
            .add_column_line(x, y)
    }

    pub fn add_column_from_device(
        &mut self,
        page: usize,
        x: f64,
        y: f64,
        mapper: &CoordinateMapper,
    ) -> Result<ColumnLine, GeometryError> {
        let (cx, cy) = mapper.to_content_point(x, y);
        self.add_column_line(page, cx, cy)
    }

    pub fn regions(&self, page: usize, section: Section) -> Vec<TableRegion> {
        self.pages.get(&page).map(|g| g.regions(section)).unwrap_or_default()
    }

    pub fn column_xs(&self, page: usize, section: Section, order_index: usize) -> Vec<f64> {
        self.pages
            .get(&page)
            .map(|g| g.column_xs(section, order_index))
            .unwrap_or_default()
    }

    pub fn clear_section(&mut self, page: usize, section: Section) {
        if let Some(g) = self.pages.get_mut(&page) {
            g.clear_section(section);
        }
    }

    pub fn clear_page(&mut self, page: usize) {
        self.pages.remove(&page);
    }

    pub fn clear_all(&mut self) {
        self.pages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x1: f64, y1: f64, x2: f64, y2: f64) -> ContentRect {
        ContentRect::from_corners(x1, y1, x2, y2).unwrap()
    }

    #[test]
    fn test_header_regions_keep_drawing_order() {
        let mut model = GeometryModel::new();
        // Drawn bottom-up on screen; order must follow drawing, not position
        model.add_region(1, Section::Header, rect(0.0, 100.0, 50.0, 50.0)).unwrap();
        model.add_region(1, Section::Header, rect(0.0, 700.0, 50.0, 650.0)).unwrap();
        model.add_region(1, Section::Header, rect(0.0, 400.0, 50.0, 350.0)).unwrap();

        let regions = model.regions(1, Section::Header);
        let order: Vec<usize> = regions.iter().map(|r| r.order_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(regions[1].rect.y1, 700.0);
        assert_eq!(regions[2].label(), "header_table_3");
    }

    #[test]
    fn test_items_region_is_replaced_with_its_columns() {
        let mut model = GeometryModel::new();
        model.add_region(1, Section::Items, rect(0.0, 500.0, 300.0, 100.0)).unwrap();
        model.add_column_line(1, 150.0, 300.0).unwrap();
        let replaced = model.add_region(1, Section::Items, rect(10.0, 400.0, 200.0, 200.0)).unwrap();

        assert_eq!(replaced.order_index, 0);
        assert_eq!(model.regions(1, Section::Items).len(), 1);
        assert!(model.column_xs(1, Section::Items, 0).is_empty());
    }

    #[test]
    fn test_column_owner_is_fixed_at_creation() {
        let mut model = GeometryModel::new();
        let page = model.page_mut(1).unwrap();
        // Three header regions stacked vertically, all spanning the same x range
        page.add_region(Section::Header, rect(0.0, 700.0, 400.0, 600.0));
        page.add_region(Section::Header, rect(0.0, 500.0, 400.0, 400.0));
        page.add_region(Section::Header, rect(0.0, 300.0, 400.0, 200.0));

        let line = model.add_column_line(1, 120.0, 250.0).unwrap();
        assert_eq!((line.section, line.owner_index), (Section::Header, 2));
        assert_eq!(model.column_xs(1, Section::Header, 2), vec![120.0]);
        assert!(model.column_xs(1, Section::Header, 0).is_empty());
        assert!(model.column_xs(1, Section::Header, 1).is_empty());
    }

    #[test]
    fn test_column_outside_or_ambiguous_is_rejected() {
        let mut model = GeometryModel::new();
        model.add_region(1, Section::Header, rect(0.0, 700.0, 200.0, 500.0)).unwrap();
        model.add_region(1, Section::Items, rect(100.0, 600.0, 400.0, 100.0)).unwrap();

        assert!(matches!(
            model.add_column_line(1, 500.0, 300.0),
            Err(GeometryError::NoOwningRegion { .. })
        ));
        assert!(matches!(
            model.add_column_line(1, 150.0, 550.0),
            Err(GeometryError::AmbiguousOwner { count: 2, .. })
        ));
        assert!(matches!(
            model.add_column_line(2, 150.0, 550.0),
            Err(GeometryError::NoOwningRegion { .. })
        ));
    }

    #[test]
    fn test_columns_are_sorted() {
        let mut model = GeometryModel::new();
        model.add_region(1, Section::Items, rect(0.0, 500.0, 300.0, 100.0)).unwrap();
        for x in [220.0, 40.0, 130.0] {
            model.add_column_line(1, x, 300.0).unwrap();
        }
        assert_eq!(model.column_xs(1, Section::Items, 0), vec![40.0, 130.0, 220.0]);
    }

    #[test]
    fn test_stored_round_trip() {
        let mut page = PageGeometry::default();
        page.add_region(Section::Header, rect(0.0, 700.0, 200.0, 600.0));
        page.add_region(Section::Header, rect(0.0, 500.0, 200.0, 400.0));
        page.add_owned_column(Section::Header, 1, 80.0).unwrap();

        let (regions, columns) = page.to_stored();
        assert_eq!(PageGeometry::from_stored(&regions, &columns), page);
    }

    #[test]
    fn test_legacy_untagged_columns_are_attributed_or_dropped() {
        let mut regions = StoredRegions::default();
        regions.header = vec![rect(0.0, 700.0, 200.0, 600.0), rect(300.0, 700.0, 500.0, 600.0)];
        regions.items = vec![rect(0.0, 500.0, 400.0, 100.0)];
        regions.summary = vec![rect(0.0, 90.0, 100.0, 10.0)];

        let mut columns = StoredColumnLines::default();
        // x=350 is spanned only by header table 2
        columns.header = vec![StoredColumnLine::Bare(350.0)];
        columns.items = vec![StoredColumnLine::Tagged { x: 120.0, table_index: None }];
        // outside the only summary region: never guessed as index 0
        columns.summary = vec![StoredColumnLine::Bare(150.0)];

        let page = PageGeometry::from_stored(&regions, &columns);
        assert_eq!(page.column_xs(Section::Header, 1), vec![350.0]);
        assert!(page.column_xs(Section::Header, 0).is_empty());
        assert_eq!(page.column_xs(Section::Items, 0), vec![120.0]);
        assert!(page.column_lines(Section::Summary).is_empty());
    }

    #[test]
    fn test_page_zero_is_rejected() {
        let mut model = GeometryModel::new();
        assert_eq!(
            model.add_region(0, Section::Header, rect(0.0, 2.0, 2.0, 0.0)).unwrap_err(),
            GeometryError::PageOutOfRange(0)
        );
    }

    #[test]
    fn test_clear_operations() {
        let mut model = GeometryModel::new();
        model.add_region(1, Section::Header, rect(0.0, 2.0, 2.0, 0.0)).unwrap();
        model.add_region(2, Section::Items, rect(0.0, 2.0, 2.0, 0.0)).unwrap();
        assert_eq!(model.page_count(), 2);

        model.clear_section(1, Section::Header);
        assert!(model.page(1).unwrap().is_empty());
        model.clear_page(2);
        assert!(model.page(2).is_none());
        model.clear_all();
        assert_eq!(model.page_count(), 0);
    }
}
