// SQLite-backed template persistence
use super::maintenance::RepairReport;
use super::migrations::{existing_columns, optional_columns, run_migrations};
use crate::config::{Config, PayloadLimits};
use crate::template::{ExtractionParams, Template, TemplateDocument, TemplateKind, TemplateSummary};
use crate::types::{Result, TemplateError};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Look a template up by row id or by its unique name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    Id(i64),
    Name(String),
}

impl From<i64> for TemplateRef {
    fn from(id: i64) -> Self {
        TemplateRef::Id(id)
    }
}

impl From<&str> for TemplateRef {
    fn from(name: &str) -> Self {
        TemplateRef::Name(name.trim().to_string())
    }
}

impl From<String> for TemplateRef {
    fn from(name: String) -> Self {
        TemplateRef::from(name.as_str())
    }
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateRef::Id(id) => write!(f, "#{id}"),
            TemplateRef::Name(name) => write!(f, "{name:?}"),
        }
    }
}

pub struct TemplateStore {
    pub(crate) conn: Connection,
    pub(crate) path: Option<PathBuf>,
    pub(crate) backup_dir: Option<PathBuf>,
    pub(crate) limits: PayloadLimits,
    pub(crate) busy_timeout: Duration,
    /// Set when `open` had to rebuild an unreadable file
    pub(crate) open_repair: Option<RepairReport>,
}

impl TemplateStore {
    /// Open or create the store and bring its schema up to date. A file
    /// whose schema cannot be read is backed up and rebuilt in place.
    pub fn open(path: &Path, config: &Config) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let mut store = Self {
            conn: connect(path, busy_timeout)?,
            path: Some(path.to_path_buf()),
            backup_dir: config.backup_dir.clone(),
            limits: config.limits,
            busy_timeout,
            open_repair: None,
        };

        match run_migrations(&mut store.conn) {
            Ok(applied) => debug!(path = %path.display(), applied, "opened template store"),
            Err(e) if is_corruption(&e) => {
                warn!(path = %path.display(), error = %e, "template store unreadable, rebuilding");
                store.open_repair = Some(store.repair()?);
            }
            Err(e) => return Err(e),
        }
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        run_migrations(&mut conn)?;
        Ok(Self {
            conn,
            path: None,
            backup_dir: None,
            limits: PayloadLimits::default(),
            busy_timeout: Duration::from_millis(crate::config::DEFAULT_BUSY_TIMEOUT_MS),
            open_repair: None,
        })
    }

    pub fn with_limits(mut self, limits: PayloadLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Raw connection, for inspection and diagnostics
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert or update by name. Payloads are size-checked before anything
    /// is written; an update touches only columns the current file has.
    pub fn save_template(&mut self, template: &Template) -> Result<i64> {
        template.validate()?;
        let now = timestamp();
        let mut encoded = EncodedTemplate::encode(template, &self.limits)?;
        encoded.id = None;
        encoded.creation_date = now.clone();
        encoded.last_modified = Some(now);

        let columns = existing_columns(&self.conn)?;
        let tx = self.conn.transaction()?;
        let existing = find_id(&tx, &encoded.name)?;
        let id = write_row(&tx, &columns, &encoded, existing)?;
        tx.commit()?;

        info!(
            id,
            name = %encoded.name,
            updated = existing.is_some(),
            "saved template"
        );
        Ok(id)
    }

    /// Save `template` under its (possibly new) name, replacing `old_name`
    pub fn rename_template(&mut self, old_name: &str, template: &Template) -> Result<i64> {
        template.validate()?;
        let mut encoded = EncodedTemplate::encode(template, &self.limits)?;
        encoded.id = None;
        encoded.last_modified = Some(timestamp());

        let columns = existing_columns(&self.conn)?;
        let tx = self.conn.transaction()?;
        let old_name = old_name.trim();
        let old_id = find_id(&tx, old_name)?
            .ok_or_else(|| TemplateError::NotFound(old_name.to_string()))?;
        if encoded.name != old_name && find_id(&tx, &encoded.name)?.is_some() {
            return Err(TemplateError::DuplicateName(encoded.name));
        }

        encoded.creation_date = tx
            .query_row(
                "SELECT creation_date FROM templates WHERE id = ?1",
                params![old_id],
                |row| row.get::<_, Option<String>>(0),
            )?
            .unwrap_or_else(timestamp);
        tx.execute("DELETE FROM templates WHERE id = ?1", params![old_id])?;
        let id = write_row(&tx, &columns, &encoded, None)?;
        tx.commit()?;

        info!(from = %old_name, to = %encoded.name, id, "renamed template");
        Ok(id)
    }

    pub fn get_template(&self, reference: impl Into<TemplateRef>) -> Result<Option<Template>> {
        let reference = reference.into();
        let columns = existing_columns(&self.conn)?;
        let raw = match &reference {
            TemplateRef::Id(id) => self
                .conn
                .query_row(&format!("{} WHERE id = ?1", select_sql(&columns)), params![id], RawTemplate::from_row)
                .optional()?,
            TemplateRef::Name(name) => self
                .conn
                .query_row(&format!("{} WHERE name = ?1", select_sql(&columns)), params![name], RawTemplate::from_row)
                .optional()?,
        };
        raw.map(RawTemplate::decode).transpose()
    }

    pub fn list_templates(&self) -> Result<Vec<TemplateSummary>> {
        let columns = existing_columns(&self.conn)?;
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY name COLLATE NOCASE", select_sql(&columns)))?;
        let rows = stmt.query_map([], RawTemplate::from_row)?;

        let mut summaries = Vec::new();
        for raw in rows {
            summaries.push(raw?.summary());
        }
        Ok(summaries)
    }

    /// Every row, decoded. Fails on the first row that cannot be decoded.
    pub fn all_templates(&self) -> Result<Vec<Template>> {
        let columns = existing_columns(&self.conn)?;
        let mut stmt = self.conn.prepare(&format!("{} ORDER BY id", select_sql(&columns)))?;
        let rows = stmt.query_map([], RawTemplate::from_row)?;

        let mut templates = Vec::new();
        for raw in rows {
            templates.push(raw?.decode()?);
        }
        Ok(templates)
    }

    pub fn delete_template(&mut self, reference: impl Into<TemplateRef>) -> Result<bool> {
        let reference = reference.into();
        let tx = self.conn.transaction()?;
        let deleted = match &reference {
            TemplateRef::Id(id) => tx.execute("DELETE FROM templates WHERE id = ?1", params![id])?,
            TemplateRef::Name(name) => {
                tx.execute("DELETE FROM templates WHERE name = ?1", params![name])?
            }
        };
        tx.commit()?;
        if deleted > 0 {
            info!(template = %reference, "deleted template");
        }
        Ok(deleted > 0)
    }

    pub fn template_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM templates", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Write a template back with its original id and timestamps
    pub(crate) fn restore_template(&mut self, template: &Template) -> Result<i64> {
        let mut encoded = EncodedTemplate::encode(template, &self.limits)?;
        encoded.creation_date = template.created_at.clone().unwrap_or_else(timestamp);
        encoded.last_modified = template.last_modified.clone();

        let columns = existing_columns(&self.conn)?;
        let tx = self.conn.transaction()?;
        let existing = find_id(&tx, &encoded.name)?;
        let id = write_row(&tx, &columns, &encoded, existing)?;
        tx.commit()?;
        Ok(id)
    }

    /// Row ids in id order
    pub(crate) fn template_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare("SELECT id FROM templates ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }
}

pub(crate) fn connect(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    Ok(conn)
}

/// Damage SQLite reports while reading pages, as opposed to bad input
pub(crate) fn is_corruption(err: &TemplateError) -> bool {
    match err {
        TemplateError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => {
            matches!(e.code, ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase)
        }
        _ => false,
    }
}

pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

fn find_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row("SELECT id FROM templates WHERE name = ?1", params![name], |row| row.get(0))
        .optional()?)
}

/// Column values ready for SQL, with payload sizes already checked
struct EncodedTemplate {
    id: Option<i64>,
    name: String,
    description: String,
    kind: TemplateKind,
    page_count: usize,
    regions: String,
    column_lines: String,
    config: String,
    page_regions: Option<String>,
    page_column_lines: Option<String>,
    page_configs: Option<String>,
    validation_rules: Option<String>,
    creation_date: String,
    last_modified: Option<String>,
}

impl EncodedTemplate {
    fn encode(template: &Template, limits: &PayloadLimits) -> Result<Self> {
        let doc = template.to_document();
        let multi = doc.kind == TemplateKind::Multi;

        let regions = guarded("regions", &doc.regions, limits.regions_bytes)?;
        let column_lines = guarded("column lines", &doc.column_lines, limits.column_lines_bytes)?;
        let config = guarded("params", &doc.params, limits.params_bytes)?;
        let (page_regions, page_column_lines, page_configs) = if multi {
            (
                Some(guarded("page regions", &doc.page_regions, limits.regions_bytes)?),
                Some(guarded("page column lines", &doc.page_column_lines, limits.column_lines_bytes)?),
                Some(guarded("page params", &doc.page_params, limits.params_bytes)?),
            )
        } else {
            (None, None, None)
        };
        let validation_rules = if doc.validation_rules.is_null() {
            None
        } else {
            Some(guarded("validation rules", &doc.validation_rules, limits.params_bytes)?)
        };

        Ok(Self {
            id: doc.id,
            name: doc.name.trim().to_string(),
            description: doc.description,
            kind: doc.kind,
            page_count: template.page_count(),
            regions,
            column_lines,
            config,
            page_regions,
            page_column_lines,
            page_configs,
            validation_rules,
            creation_date: String::new(),
            last_modified: None,
        })
    }
}

fn guarded<T: Serialize>(what: &str, value: &T, limit: usize) -> Result<String> {
    let json = serde_json::to_string(value)?;
    if json.len() > limit {
        return Err(TemplateError::Validation(format!(
            "{what} payload is {} bytes, limit is {limit}",
            json.len()
        )));
    }
    Ok(json)
}

fn text(value: &Option<String>) -> Value {
    value.clone().map_or(Value::Null, Value::Text)
}

/// Update `existing` in place, or insert a new row
fn write_row(
    conn: &Connection,
    columns: &HashSet<String>,
    row: &EncodedTemplate,
    existing: Option<i64>,
) -> Result<i64> {
    let mut values: Vec<(&str, Value)> = vec![
        ("description", Value::Text(row.description.clone())),
        ("regions", Value::Text(row.regions.clone())),
        ("column_lines", Value::Text(row.column_lines.clone())),
        ("config", Value::Text(row.config.clone())),
    ];
    let optional = [
        ("template_type", Value::Text(row.kind.as_str().to_string())),
        ("page_count", Value::Integer(row.page_count as i64)),
        ("page_regions", text(&row.page_regions)),
        ("page_column_lines", text(&row.page_column_lines)),
        ("page_configs", text(&row.page_configs)),
        ("last_modified", text(&row.last_modified)),
        ("validation_rules", text(&row.validation_rules)),
    ];
    values.extend(optional.into_iter().filter(|(column, _)| columns.contains(*column)));

    match existing {
        Some(id) => {
            let assignments: Vec<String> = values
                .iter()
                .enumerate()
                .map(|(i, (column, _))| format!("{column} = ?{}", i + 1))
                .collect();
            let sql = format!(
                "UPDATE templates SET {} WHERE id = ?{}",
                assignments.join(", "),
                values.len() + 1
            );
            let mut bound: Vec<Value> = values.into_iter().map(|(_, v)| v).collect();
            bound.push(Value::Integer(id));
            conn.execute(&sql, params_from_iter(bound))?;
            Ok(id)
        }
        None => {
            values.push(("name", Value::Text(row.name.clone())));
            values.push(("creation_date", Value::Text(row.creation_date.clone())));
            if let Some(id) = row.id {
                values.push(("id", Value::Integer(id)));
            }
            let names: Vec<&str> = values.iter().map(|(column, _)| *column).collect();
            let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT INTO templates ({}) VALUES ({})",
                names.join(", "),
                placeholders.join(", ")
            );
            conn.execute(&sql, params_from_iter(values.into_iter().map(|(_, v)| v)))?;
            Ok(conn.last_insert_rowid())
        }
    }
}

/// Select list that reads NULL for optional columns an older file lacks
fn select_sql(columns: &HashSet<String>) -> String {
    let optional: Vec<String> = optional_columns()
        .map(|c| {
            if columns.contains(c) {
                c.to_string()
            } else {
                format!("NULL AS {c}")
            }
        })
        .collect();
    format!(
        "SELECT id, name, description, regions, column_lines, config, creation_date, {} FROM templates",
        optional.join(", ")
    )
}

/// A row as stored, before any JSON is parsed
struct RawTemplate {
    id: i64,
    name: String,
    description: Option<String>,
    regions: Option<String>,
    column_lines: Option<String>,
    config: Option<String>,
    creation_date: Option<String>,
    template_type: Option<String>,
    page_count: Option<i64>,
    page_regions: Option<String>,
    page_column_lines: Option<String>,
    page_configs: Option<String>,
    last_modified: Option<String>,
    validation_rules: Option<String>,
}

impl RawTemplate {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            regions: row.get("regions")?,
            column_lines: row.get("column_lines")?,
            config: row.get("config")?,
            creation_date: row.get("creation_date")?,
            template_type: row.get("template_type")?,
            page_count: row.get("page_count")?,
            page_regions: row.get("page_regions")?,
            page_column_lines: row.get("page_column_lines")?,
            page_configs: row.get("page_configs")?,
            last_modified: row.get("last_modified")?,
            validation_rules: row.get("validation_rules")?,
        })
    }

    fn kind(&self) -> TemplateKind {
        self.template_type.as_deref().map(TemplateKind::parse).unwrap_or_default()
    }

    fn summary(self) -> TemplateSummary {
        let kind = self.kind();
        TemplateSummary {
            id: self.id,
            name: self.name,
            description: self.description.unwrap_or_default(),
            kind,
            page_count: match kind {
                TemplateKind::Single => 1,
                TemplateKind::Multi => self.page_count.unwrap_or(1).max(1) as usize,
            },
            created_at: self.creation_date,
            last_modified: self.last_modified,
        }
    }

    fn decode(self) -> Result<Template> {
        let name = self.name.as_str();
        let page_params: BTreeMap<usize, ExtractionParams> =
            parse_column(name, "page_configs", self.page_configs.as_deref())?;

        let doc = TemplateDocument {
            id: Some(self.id),
            kind: self.kind(),
            page_count: self.page_count.map(|p| p.max(1) as usize),
            regions: parse_column(name, "regions", self.regions.as_deref())?,
            column_lines: parse_column(name, "column_lines", self.column_lines.as_deref())?,
            params: parse_column(name, "config", self.config.as_deref())?,
            page_regions: parse_column(name, "page_regions", self.page_regions.as_deref())?,
            page_column_lines: parse_column(name, "page_column_lines", self.page_column_lines.as_deref())?,
            page_params,
            validation_rules: parse_column(name, "validation_rules", self.validation_rules.as_deref())?,
            name: self.name,
            description: self.description.unwrap_or_default(),
            creation_date: self.creation_date,
            last_modified: self.last_modified,
        };
        Ok(Template::from_document(doc))
    }
}

/// NULL, empty and `null` all read as the default value
fn parse_column<T: DeserializeOwned + Default>(
    template: &str,
    column: &str,
    raw: Option<&str>,
) -> Result<T> {
    match raw.map(str::trim) {
        None | Some("") | Some("null") => Ok(T::default()),
        Some(json) => serde_json::from_str(json).map_err(|e| {
            TemplateError::Corruption(format!("template {template:?}, column {column}: {e}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ContentRect, PageGeometry};
    use crate::template::{PageTemplate, RegexRule};
    use crate::types::Section;

    fn rect(x1: f64, y1: f64, x2: f64, y2: f64) -> ContentRect {
        ContentRect::from_corners(x1, y1, x2, y2).unwrap()
    }

    fn invoice(header_tables: usize) -> Template {
        let mut geometry = PageGeometry::default();
        for i in 0..header_tables {
            let top = 780.0 - 60.0 * i as f64;
            geometry.add_region(Section::Header, rect(40.0, top, 300.0, top - 50.0));
        }
        geometry.add_region(Section::Items, rect(40.0, 500.0, 560.0, 200.0));
        geometry.add_column_line(120.0, 300.0).unwrap();
        geometry.add_column_line(400.0, 300.0).unwrap();

        let mut params = ExtractionParams::default();
        params.row_tolerance.items = 10;
        params.regex_patterns.items = Some(RegexRule {
            skip: Some(r"Page \d+".into()),
            ..Default::default()
        });
        Template::single("Acme Invoice", PageTemplate::new(geometry, params))
            .with_description("monthly invoice")
    }

    #[test]
    fn test_round_trip() {
        let mut store = TemplateStore::in_memory().unwrap();
        let template = invoice(2);
        let id = store.save_template(&template).unwrap();

        let loaded = store.get_template("Acme Invoice").unwrap().unwrap();
        assert_eq!(loaded.id, Some(id));
        assert_eq!(loaded.layout, template.layout);
        assert_eq!(loaded.description, "monthly invoice");
        assert!(loaded.created_at.is_some());
        assert_eq!(loaded.created_at, loaded.last_modified);

        let by_id = store.get_template(id).unwrap().unwrap();
        assert_eq!(by_id.name, "Acme Invoice");
    }

    #[test]
    fn test_same_name_overwrites() {
        let mut store = TemplateStore::in_memory().unwrap();
        let first = store.save_template(&invoice(1)).unwrap();
        let second = store.save_template(&invoice(3)).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.template_count().unwrap(), 1);
        let loaded = store.get_template("Acme Invoice").unwrap().unwrap();
        assert_eq!(loaded.pages()[0].1.geometry.region_count(Section::Header), 3);
    }

    #[test]
    fn test_missing_template_is_none() {
        let store = TemplateStore::in_memory().unwrap();
        assert!(store.get_template("nope").unwrap().is_none());
        assert!(store.get_template(42).unwrap().is_none());
    }

    #[test]
    fn test_oversized_payload_writes_nothing() {
        let mut store = TemplateStore::in_memory().unwrap();
        store.save_template(&invoice(1)).unwrap();
        let mut store = store.with_limits(PayloadLimits {
            regions_bytes: 64,
            ..PayloadLimits::default()
        });

        let err = store.save_template(&invoice(4)).unwrap_err();
        assert!(matches!(err, TemplateError::Validation(_)));
        let loaded = store.get_template("Acme Invoice").unwrap().unwrap();
        assert_eq!(loaded.pages()[0].1.geometry.region_count(Section::Header), 1);
    }

    #[test]
    fn test_invalid_name_and_pattern_rejected() {
        let mut store = TemplateStore::in_memory().unwrap();
        let mut blank = invoice(1);
        blank.name = "   ".into();
        assert!(matches!(store.save_template(&blank), Err(TemplateError::Validation(_))));

        let mut bad_pattern = invoice(1);
        if let crate::template::TemplateLayout::Single(page) = &mut bad_pattern.layout {
            page.params.regex_patterns.header = Some(RegexRule { start: Some("(".into()), ..Default::default() });
        }
        assert!(matches!(store.save_template(&bad_pattern), Err(TemplateError::Validation(_))));
        assert_eq!(store.template_count().unwrap(), 0);
    }

    #[test]
    fn test_rename() {
        let mut store = TemplateStore::in_memory().unwrap();
        store.save_template(&invoice(1)).unwrap();
        let mut other = invoice(1);
        other.name = "Other".into();
        store.save_template(&other).unwrap();

        let mut renamed = invoice(1);
        renamed.name = "Acme Invoice v2".into();
        store.rename_template("Acme Invoice", &renamed).unwrap();
        assert!(store.get_template("Acme Invoice").unwrap().is_none());
        assert!(store.get_template("Acme Invoice v2").unwrap().is_some());

        renamed.name = "Other".into();
        assert!(matches!(
            store.rename_template("Acme Invoice v2", &renamed),
            Err(TemplateError::DuplicateName(_))
        ));
        assert!(matches!(
            store.rename_template("missing", &renamed),
            Err(TemplateError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_and_delete() {
        let mut store = TemplateStore::in_memory().unwrap();
        for name in ["beta", "Alpha"] {
            let mut t = invoice(1);
            t.name = name.into();
            store.save_template(&t).unwrap();
        }
        let names: Vec<String> = store.list_templates().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Alpha", "beta"]);

        assert!(store.delete_template("beta").unwrap());
        assert!(!store.delete_template("beta").unwrap());
        assert_eq!(store.template_count().unwrap(), 1);
    }

    #[test]
    fn test_multi_page_round_trip() {
        let mut pages = BTreeMap::new();
        pages.insert(1, invoice(1).pages()[0].1.clone());
        let mut last = PageGeometry::default();
        last.add_region(Section::Summary, rect(300.0, 200.0, 560.0, 100.0));
        pages.insert(3, PageTemplate::new(last, ExtractionParams::default()));
        let template = Template::multi("Statement", 3, pages);

        let mut store = TemplateStore::in_memory().unwrap();
        store.save_template(&template).unwrap();
        let loaded = store.get_template("Statement").unwrap().unwrap();
        assert_eq!(loaded.kind(), TemplateKind::Multi);
        assert_eq!(loaded.page_count(), 3);
        assert_eq!(loaded.layout, template.layout);

        let summary = &store.list_templates().unwrap()[0];
        assert_eq!((summary.kind, summary.page_count), (TemplateKind::Multi, 3));
    }

    #[test]
    fn test_legacy_row_reads_with_defaults() {
        let store = TemplateStore::in_memory().unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO templates (name, regions, column_lines, config, creation_date, template_type)
                 VALUES ('legacy', ?1, NULL, ?2, '2021-03-04', NULL)",
                params![
                    r#"{"header": [{"x": 10, "y": 700, "width": 100, "height": 50}], "future": 1}"#,
                    r#"{"row_tolerance": {"items": 7}, "unknown_key": true}"#,
                ],
            )
            .unwrap();

        let loaded = store.get_template("legacy").unwrap().unwrap();
        assert_eq!(loaded.kind(), TemplateKind::Single);
        let (_, page) = loaded.pages()[0];
        assert_eq!(page.geometry.rects(Section::Header), &[rect(10.0, 700.0, 110.0, 650.0)]);
        assert_eq!(page.params.row_tolerance.items, 7);
        assert_eq!(page.params.row_tolerance.header, crate::config::DEFAULT_ROW_TOLERANCE);
    }

    #[test]
    fn test_malformed_json_is_corruption() {
        let store = TemplateStore::in_memory().unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO templates (name, regions, creation_date) VALUES ('broken', '{nope', 'x')",
                [],
            )
            .unwrap();
        assert!(matches!(store.get_template("broken"), Err(TemplateError::Corruption(_))));
    }
}
