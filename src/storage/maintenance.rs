// Integrity checks, salvage repair, backups and space reclamation
use super::migrations::run_migrations;
use super::template_store::{connect, TemplateStore};
use crate::config::DEFAULT_KEEP_BACKUPS;
use crate::types::{Result, TemplateError};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const BACKUP_PREFIX: &str = "templates_";
const BACKUP_SUFFIX: &str = ".db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub recovered: usize,
    pub total: usize,
    pub backup_path: Option<PathBuf>,
}

impl RepairReport {
    pub fn succeeded(&self) -> bool {
        self.recovered > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub ok: bool,
    pub message: String,
    pub repair: Option<RepairReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OptimizeStats {
    pub size_before: u64,
    pub size_after: u64,
}

impl OptimizeStats {
    pub fn space_reclaimed(&self) -> u64 {
        self.size_before.saturating_sub(self.size_after)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceOptions {
    pub backup: bool,
    pub check_integrity: bool,
    /// Repair when the integrity check fails
    pub repair: bool,
    pub optimize: bool,
    pub keep_backups: usize,
}

impl Default for MaintenanceOptions {
    fn default() -> Self {
        Self {
            backup: true,
            check_integrity: true,
            repair: true,
            optimize: true,
            keep_backups: DEFAULT_KEEP_BACKUPS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub backup_created: bool,
    pub backup_path: Option<PathBuf>,
    pub backups_removed: usize,
    pub integrity_ok: Option<bool>,
    pub repaired: bool,
    pub optimized: bool,
    pub optimize_stats: Option<OptimizeStats>,
    pub errors: Vec<String>,
}

impl MaintenanceReport {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl TemplateStore {
    /// Quick check first, full check only if that passes. With `repair`, a
    /// failure triggers salvage; the report is ok when anything was recovered.
    /// A rebuild that already happened in `open` is reported by the first call.
    pub fn check_integrity(&mut self, repair: bool) -> Result<IntegrityReport> {
        if let Some(report) = self.open_repair.take() {
            return Ok(repaired("schema unreadable when opened", report));
        }

        let problem = match integrity_problem(&self.conn) {
            Ok(None) => {
                return Ok(IntegrityReport {
                    ok: true,
                    message: "ok".to_string(),
                    repair: None,
                })
            }
            Ok(Some(problem)) => problem,
            Err(e) => e.to_string(),
        };
        warn!(%problem, "template store failed integrity check");

        if !repair {
            return Ok(IntegrityReport { ok: false, message: problem, repair: None });
        }

        let report = self.repair()?;
        Ok(repaired(&problem, report))
    }

    /// Back up the file, salvage every readable row into a scratch store,
    /// rebuild from a fresh schema and import what survived.
    pub fn repair(&mut self) -> Result<RepairReport> {
        let backup_path = match self.path {
            Some(_) => Some(self.copy_damaged_file()?),
            None => None,
        };

        let ids = self.template_ids().unwrap_or_else(|e| {
            warn!(error = %e, "cannot enumerate templates");
            Vec::new()
        });
        let total = ids.len();

        let mut scratch = TemplateStore::in_memory()?.with_limits(self.limits);
        for id in ids {
            let exported = self
                .get_template(id)
                .and_then(|t| t.ok_or_else(|| TemplateError::NotFound(format!("#{id}"))))
                .and_then(|t| scratch.restore_template(&t));
            if let Err(e) = exported {
                warn!(id, error = %e, "skipping unreadable template");
            }
        }
        let salvaged = scratch.all_templates()?;

        self.recreate()?;
        let mut recovered = 0;
        for template in &salvaged {
            match self.restore_template(template) {
                Ok(_) => recovered += 1,
                Err(e) => warn!(name = %template.name, error = %e, "failed to re-import template"),
            }
        }

        info!(recovered, total, "template store repaired");
        Ok(RepairReport { recovered, total, backup_path })
    }

    /// Close the current connection and start over with an empty schema
    fn recreate(&mut self) -> Result<()> {
        let damaged = std::mem::replace(&mut self.conn, Connection::open_in_memory()?);
        if let Err((_, e)) = damaged.close() {
            warn!(error = %e, "error closing damaged store");
        }

        if let Some(path) = self.path.clone() {
            for sidecar in ["", "-journal", "-wal", "-shm"] {
                let file = PathBuf::from(format!("{}{}", path.display(), sidecar));
                if file.exists() {
                    fs::remove_file(&file)?;
                }
            }
            self.conn = connect(&path, self.busy_timeout)?;
        }
        run_migrations(&mut self.conn)?;
        Ok(())
    }

    pub fn backup_dir(&self) -> Option<PathBuf> {
        self.backup_dir.clone().or_else(|| {
            self.path
                .as_ref()
                .and_then(|p| p.parent())
                .map(|dir| dir.join("backups"))
        })
    }

    /// Snapshot the database into `templates_YYYYmmdd_HHMMSS_ffffff.db`.
    /// `VACUUM INTO` reads through the connection, so pending journal or WAL
    /// content is included.
    pub fn create_backup(&self) -> Result<PathBuf> {
        let target = self.next_backup_path()?;
        self.conn.execute("VACUUM INTO ?1", params![target.to_string_lossy().into_owned()])?;
        info!(backup = %target.display(), "created template store backup");
        Ok(target)
    }

    /// Byte copy for files SQLite can no longer read
    fn copy_damaged_file(&self) -> Result<PathBuf> {
        let target = self.next_backup_path()?;
        if let Some(source) = self.path.as_ref().filter(|p| p.exists()) {
            fs::copy(source, &target)?;
        }
        info!(backup = %target.display(), "preserved damaged template store");
        Ok(target)
    }

    fn next_backup_path(&self) -> Result<PathBuf> {
        let (Some(_), Some(dir)) = (self.path.as_ref(), self.backup_dir()) else {
            return Err(TemplateError::Validation(
                "an in-memory store has no file to back up".to_string(),
            ));
        };
        fs::create_dir_all(&dir)?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S_%6f");
        Ok(dir.join(format!("{BACKUP_PREFIX}{stamp}{BACKUP_SUFFIX}")))
    }

    /// Backups, newest first
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        match self.backup_dir() {
            Some(dir) => backups_in(&dir),
            None => Ok(Vec::new()),
        }
    }

    /// Keep the newest `keep` backups; returns how many were deleted
    pub fn rotate_backups(&self, keep: usize) -> Result<usize> {
        let backups = self.list_backups()?;
        let mut removed = 0;
        for old in backups.iter().skip(keep) {
            fs::remove_file(old)?;
            removed += 1;
        }
        if removed > 0 {
            info!(removed, keep, "rotated backups");
        }
        Ok(removed)
    }

    /// Reclaim free pages and refresh planner statistics
    pub fn optimize(&mut self) -> Result<OptimizeStats> {
        let size_before = database_size(&self.conn)?;
        self.conn.execute_batch("VACUUM; ANALYZE;")?;
        let size_after = database_size(&self.conn)?;
        info!(size_before, size_after, "optimized template store");
        Ok(OptimizeStats { size_before, size_after })
    }

    /// Runs the requested steps in order. A failing step is recorded and the
    /// remaining steps still run.
    pub fn perform_maintenance(&mut self, options: &MaintenanceOptions) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        if options.backup {
            match self.create_backup() {
                Ok(path) => {
                    report.backup_created = true;
                    report.backup_path = Some(path);
                    match self.rotate_backups(options.keep_backups) {
                        Ok(removed) => report.backups_removed = removed,
                        Err(e) => report.errors.push(format!("backup rotation: {e}")),
                    }
                }
                Err(e) => report.errors.push(format!("backup: {e}")),
            }
        }

        if options.check_integrity {
            match self.check_integrity(options.repair) {
                Ok(integrity) => {
                    report.integrity_ok = Some(integrity.ok);
                    report.repaired = integrity.repair.as_ref().is_some_and(RepairReport::succeeded);
                    if !integrity.ok {
                        report.errors.push(format!("integrity: {}", integrity.message));
                    }
                }
                Err(e) => report.errors.push(format!("integrity: {e}")),
            }
        }

        if options.optimize {
            match self.optimize() {
                Ok(stats) => {
                    report.optimized = true;
                    report.optimize_stats = Some(stats);
                }
                Err(e) => report.errors.push(format!("optimize: {e}")),
            }
        }

        info!(ok = report.ok(), errors = report.errors.len(), "maintenance finished");
        report
    }
}

fn repaired(problem: &str, report: RepairReport) -> IntegrityReport {
    let message = if report.succeeded() {
        format!("repaired: recovered {} of {} templates", report.recovered, report.total)
    } else {
        format!("repair recovered nothing ({problem})")
    };
    IntegrityReport {
        ok: report.succeeded(),
        message,
        repair: Some(report),
    }
}

/// `None` when both checks report "ok"
fn integrity_problem(conn: &Connection) -> Result<Option<String>> {
    for pragma in ["quick_check", "integrity_check"] {
        let mut stmt = conn.prepare(&format!("PRAGMA {pragma}"))?;
        let lines = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if lines.len() != 1 || lines[0] != "ok" {
            return Ok(Some(format!("{pragma}: {}", lines.join("; "))));
        }
    }
    Ok(None)
}

fn database_size(conn: &Connection) -> Result<u64> {
    let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
    let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
    Ok((page_count * page_size) as u64)
}

fn backups_in(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut backups: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name().is_some_and(|n| {
                let n = n.to_string_lossy();
                n.starts_with(BACKUP_PREFIX) && n.ends_with(BACKUP_SUFFIX)
            })
        })
        .collect();
    // Timestamped names sort chronologically
    backups.sort();
    backups.reverse();
    Ok(backups)
}
