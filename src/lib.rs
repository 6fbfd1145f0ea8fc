// tablemark: PDF table templates, region geometry and template storage
pub mod config;
pub mod geometry;
pub mod pdf_extraction;
pub mod storage;
pub mod template;
pub mod types;

pub use config::Config;
pub use geometry::{ContentRect, CoordinateMapper, DeviceRect, GeometryModel, PageMetrics};
pub use pdf_extraction::{ExtractionDriver, ExtractionReport, ExtractionStatus, TableExtractor};
pub use storage::{TemplateRef, TemplateStore};
pub use template::{ExtractionParams, PageTemplate, Template, TemplateLayout};
pub use types::{GeometryError, Result, Section, TemplateError};
