// Page dimensions via lopdf - Pure Rust
use crate::geometry::PageMetrics;
use anyhow::{anyhow, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::Path;

// US Letter when a page carries no usable MediaBox
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];
const MAX_PARENT_DEPTH: usize = 32;

/// Supplies page size in points and pixmap size at the render scale
pub trait PageMetricsProvider {
    fn page_count(&self) -> usize;
    /// `page` is 1-based
    fn page_metrics(&self, page: usize) -> Result<PageMetrics>;
}

pub struct LopdfPageMetrics {
    document: Document,
    render_scale: f64,
}

impl LopdfPageMetrics {
    pub fn open(pdf_path: &Path, render_scale: f64) -> Result<Self> {
        let document = Document::load(pdf_path)
            .map_err(|e| anyhow!("Failed to load {}: {}", pdf_path.display(), e))?;
        Ok(Self::from_document(document, render_scale))
    }

    pub fn from_document(document: Document, render_scale: f64) -> Self {
        Self { document, render_scale }
    }

    fn page_id(&self, page: usize) -> Result<ObjectId> {
        self.document
            .get_pages()
            .get(&(page as u32))
            .copied()
            .ok_or_else(|| anyhow!("Page {} not found", page))
    }

    /// MediaBox is inheritable, so walk up the Parent chain
    fn media_box(&self, page_id: ObjectId) -> [f64; 4] {
        let mut current = self.document.get_object(page_id).and_then(Object::as_dict).ok();
        for _ in 0..MAX_PARENT_DEPTH {
            let Some(dict) = current else { break };
            if let Some(bounds) = self.read_box(dict) {
                return bounds;
            }
            current = dict
                .get(b"Parent")
                .and_then(Object::as_reference)
                .and_then(|id| self.document.get_object(id))
                .and_then(Object::as_dict)
                .ok();
        }
        DEFAULT_MEDIA_BOX
    }

    fn read_box(&self, dict: &Dictionary) -> Option<[f64; 4]> {
        let obj = dict.get(b"MediaBox").ok()?;
        let arr = match obj {
            Object::Reference(id) => self.document.get_object(*id).ok()?.as_array().ok()?,
            Object::Array(a) => a,
            _ => return None,
        };

        let bounds: Vec<f64> = arr
            .iter()
            .filter_map(|obj| match obj {
                Object::Integer(i) => Some(*i as f64),
                Object::Real(f) => Some(*f as f64),
                _ => None,
            })
            .collect();
        <[f64; 4]>::try_from(bounds).ok()
    }
}

impl PageMetricsProvider for LopdfPageMetrics {
    fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    fn page_metrics(&self, page: usize) -> Result<PageMetrics> {
        let [x0, y0, x1, y1] = self.media_box(self.page_id(page)?);
        Ok(PageMetrics::at_scale(
            (x1 - x0).abs(),
            (y1 - y0).abs(),
            self.render_scale,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn two_page_document() -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let inherited = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        let a4 = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(595.5), 842.into()],
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![inherited.into(), a4.into()],
            "Count" => 2,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn test_inherited_and_own_media_box() {
        let metrics = LopdfPageMetrics::from_document(two_page_document(), 2.0);
        assert_eq!(metrics.page_count(), 2);

        let first = metrics.page_metrics(1).unwrap();
        assert_eq!((first.content_width, first.content_height), (612.0, 792.0));
        assert_eq!((first.pixel_width, first.pixel_height), (1224, 1584));

        let second = metrics.page_metrics(2).unwrap();
        assert_eq!((second.content_width, second.content_height), (595.5, 842.0));
        assert_eq!(second.pixel_width, 1191);
    }

    #[test]
    fn test_missing_page() {
        let metrics = LopdfPageMetrics::from_document(two_page_document(), 1.0);
        assert!(metrics.page_metrics(3).is_err());
    }

    #[test]
    fn test_open_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.pdf");
        two_page_document().save(&path).unwrap();
        assert_eq!(LopdfPageMetrics::open(&path, 2.0).unwrap().page_count(), 2);
        assert!(LopdfPageMetrics::open(&dir.path().join("missing.pdf"), 2.0).is_err());
    }
}
