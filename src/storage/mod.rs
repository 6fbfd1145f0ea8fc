// Storage layer module
pub mod maintenance;
pub mod migrations;
pub mod template_store;

pub use maintenance::{IntegrityReport, MaintenanceOptions, MaintenanceReport, OptimizeStats, RepairReport};
pub use template_store::{TemplateRef, TemplateStore};
