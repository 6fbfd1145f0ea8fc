// Region geometry: rect types, coordinate mapping, per-page model
pub mod mapper;
pub mod model;
pub mod rect;

pub use mapper::{CoordinateMapper, PageMetrics};
pub use model::{
    region_label, ColumnLine, GeometryModel, PageGeometry, StoredColumnLine, StoredColumnLines,
    StoredRegions, TableRegion,
};
pub use rect::{ContentRect, DeviceRect};
