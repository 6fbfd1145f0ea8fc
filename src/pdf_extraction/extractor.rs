// Boundary to the external table extractor
use super::table::{Cell, Table};
use crate::config::ExtractorConfig;
use crate::geometry::rect::fmt_coord;
use crate::geometry::ContentRect;
use crate::template::Flavor;
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// One region's worth of work for the extractor
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    pub pdf_path: PathBuf,
    pub area: ContentRect,
    pub columns: Option<Vec<f64>>,
    /// 1-based page selector
    pub pages: String,
    pub split_text: bool,
    pub strip_text: String,
    pub flavor: Flavor,
    pub row_tolerance: u32,
}

impl ExtractionRequest {
    pub fn area_string(&self) -> String {
        self.area.area_string()
    }

    pub fn columns_string(&self) -> Option<String> {
        self.columns
            .as_ref()
            .map(|xs| xs.iter().map(|x| fmt_coord(*x)).collect::<Vec<_>>().join(","))
    }
}

/// Extracts at most one table from a PDF area. `Ok(None)` means no table
/// was found there, which callers treat as a warning, not a failure.
pub trait TableExtractor: Send + Sync {
    fn extract(&self, request: &ExtractionRequest) -> Result<Option<Table>>;
}

impl<T: TableExtractor + ?Sized> TableExtractor for &T {
    fn extract(&self, request: &ExtractionRequest) -> Result<Option<Table>> {
        (**self).extract(request)
    }
}

/// Runs the camelot command line tool with stream flavor
#[derive(Debug, Clone)]
pub struct CamelotCli {
    program: String,
    extra_args: Vec<String>,
}

impl Default for CamelotCli {
    fn default() -> Self {
        Self::new(&ExtractorConfig::default())
    }
}

impl CamelotCli {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            program: config.program.clone(),
            extra_args: config.extra_args.clone(),
        }
    }

    pub fn build_args(&self, request: &ExtractionRequest, output: &Path) -> Vec<String> {
        let mut args = self.extra_args.clone();
        args.extend([
            "--pages".to_string(),
            request.pages.clone(),
            "--format".to_string(),
            "json".to_string(),
            "--output".to_string(),
            output.to_string_lossy().into_owned(),
        ]);
        if request.split_text {
            args.push("--split_text".to_string());
        }
        if !request.strip_text.is_empty() {
            args.push("--strip_text".to_string());
            args.push(request.strip_text.clone());
        }
        args.push(request.flavor.as_str().to_string());
        args.push("--table_areas".to_string());
        args.push(request.area_string());
        if let Some(columns) = request.columns_string() {
            args.push("--columns".to_string());
            args.push(columns);
        }
        args.push("--row_tol".to_string());
        args.push(request.row_tolerance.to_string());
        args.push(request.pdf_path.to_string_lossy().into_owned());
        args
    }
}

impl TableExtractor for CamelotCli {
    fn extract(&self, request: &ExtractionRequest) -> Result<Option<Table>> {
        // Each call gets its own scratch dir so concurrent runs never collide
        let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
        let output = scratch.path().join("out.json");
        let args = self.build_args(request, &output);
        debug!(program = %self.program, ?args, "running extractor");

        let result = Command::new(&self.program)
            .args(&args)
            .output()
            .with_context(|| format!("Failed to launch {}", self.program))?;

        if !result.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }

        let Some(first) = first_table_file(scratch.path())? else {
            return Ok(None);
        };
        let json = fs::read_to_string(&first)
            .with_context(|| format!("Failed to read {}", first.display()))?;
        parse_records(&json).map(Some)
    }
}

/// Output files are named `<stem>-page-<p>-table-<n>.json`
fn first_table_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension().is_some_and(|e| e == "json")
                && p.file_name().is_some_and(|n| n.to_string_lossy().contains("-table-"))
        })
        .collect();
    files.sort();
    Ok(files.into_iter().next())
}

/// Parse records-oriented JSON (`[{"0": "..", "1": ".."}, ..]`) into rows
/// ordered by positional key.
pub fn parse_records(json: &str) -> Result<Table> {
    let records: Vec<BTreeMap<String, serde_json::Value>> =
        serde_json::from_str(json).context("Extractor output is not a list of records")?;

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let mut cells: Vec<(usize, Cell)> = record
            .into_iter()
            .filter_map(|(key, value)| {
                let index = key.parse::<usize>().ok()?;
                let cell = match value {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(s) => Some(s),
                    other => Some(other.to_string()),
                };
                Some((index, cell))
            })
            .collect();
        cells.sort_by_key(|(i, _)| *i);

        let width = cells.last().map_or(0, |(i, _)| i + 1);
        let mut row: Vec<Cell> = vec![None; width];
        for (i, cell) in cells {
            row[i] = cell;
        }
        rows.push(row);
    }
    Ok(Table::from_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ExtractionRequest {
        ExtractionRequest {
            pdf_path: PathBuf::from("/tmp/invoice.pdf"),
            area: ContentRect::from_corners(50.0, 767.0, 200.0, 747.0).unwrap(),
            columns: Some(vec![80.0, 120.5]),
            pages: "2".into(),
            split_text: true,
            strip_text: "\n".into(),
            flavor: Flavor::Stream,
            row_tolerance: 10,
        }
    }

    #[test]
    fn test_build_args() {
        let cli = CamelotCli::default();
        let args = cli.build_args(&request(), Path::new("/scratch/out.json"));
        assert_eq!(
            args,
            vec![
                "--pages", "2", "--format", "json", "--output", "/scratch/out.json",
                "--split_text", "--strip_text", "\n", "stream", "--table_areas",
                "50,767,200,747", "--columns", "80,120.5", "--row_tol", "10",
                "/tmp/invoice.pdf",
            ]
        );
    }

    #[test]
    fn test_build_args_without_columns() {
        let mut req = request();
        req.columns = None;
        req.split_text = false;
        req.strip_text.clear();
        let args = CamelotCli::default().build_args(&req, Path::new("o.json"));
        assert!(!args.iter().any(|a| a == "--columns" || a == "--split_text" || a == "--strip_text"));
    }

    #[test]
    fn test_parse_records_orders_by_position() {
        let table = parse_records(
            r#"[{"1": "2", "0": "Widget", "2": null}, {"0": "Bolt", "2": 0.1}]"#,
        )
        .unwrap();
        assert_eq!(table.width(), 3);
        assert_eq!(table.rows[0], vec![Some("Widget".into()), Some("2".into()), None]);
        assert_eq!(table.rows[1], vec![Some("Bolt".into()), None, Some("0.1".into())]);
    }

    #[test]
    fn test_parse_records_rejects_garbage() {
        assert!(parse_records("{\"not\": \"records\"}").is_err());
    }

    #[test]
    fn test_first_table_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(first_table_file(dir.path()).unwrap().is_none());
        fs::write(dir.path().join("out-page-1-table-2.json"), "[]").unwrap();
        fs::write(dir.path().join("out-page-1-table-1.json"), "[]").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        let first = first_table_file(dir.path()).unwrap().unwrap();
        assert!(first.ends_with("out-page-1-table-1.json"));
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let cli = CamelotCli::new(&ExtractorConfig {
            program: "tablemark-no-such-extractor".into(),
            extra_args: vec![],
        });
        assert!(cli.extract(&request()).is_err());
    }
}
