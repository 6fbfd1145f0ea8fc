// PDF extraction module
pub mod classifier;
pub mod driver;
pub mod extractor;
pub mod page_metrics;
pub mod regex_filter;
pub mod reshape;
pub mod table;

pub use classifier::{classify, flatten_groups, ItemGroup, ItemRow};
pub use driver::{
    ExtractionDriver, ExtractionReport, ExtractionStatus, ExtractionWarning, RegionOutcome,
    RegionTable, WarningKind,
};
pub use extractor::{CamelotCli, ExtractionRequest, TableExtractor};
pub use page_metrics::{LopdfPageMetrics, PageMetricsProvider};
pub use regex_filter::RowFilter;
pub use reshape::{clean, reshape};
pub use table::{Cell, ColumnLabel, Table};
