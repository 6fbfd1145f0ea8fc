// tablemark - manage PDF table templates and run extractions from the shell
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tablemark::pdf_extraction::{CamelotCli, LopdfPageMetrics, PageMetricsProvider};
use tablemark::storage::MaintenanceOptions;
use tablemark::template::TemplateDocument;
use tablemark::{Config, ExtractionDriver, ExtractionStatus, Template, TemplateStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "PDF table templates and extraction")]
struct Cli {
    /// Config file (defaults to ./tablemark.toml or $TABLEMARK_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Template database, overriding the configured path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stored templates
    List,
    /// Print one template as JSON
    Show { name: String },
    /// Create or replace a template from a JSON file
    Import { file: PathBuf },
    /// Write a template as JSON to stdout or a file
    Export {
        name: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete a template
    Delete { name: String },
    /// Extract a PDF's tables with a stored template
    Extract {
        pdf: PathBuf,
        #[arg(short, long)]
        template: String,
    },
    /// Page sizes in points and at the render scale
    Pages { pdf: PathBuf },
    /// Run the integrity check
    Check {
        #[arg(long)]
        repair: bool,
    },
    /// Backup, check and optimize; with no step flags every step runs
    Maintain {
        #[arg(long)]
        backup: bool,
        #[arg(long)]
        check: bool,
        #[arg(long)]
        optimize: bool,
        /// Backups to keep after rotation
        #[arg(long)]
        keep: Option<usize>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "tablemark=debug" } else { "tablemark=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(db) = &cli.db {
        config.database_path = db.clone();
    }
    Ok(config)
}

fn open_store(config: &Config) -> Result<TemplateStore> {
    TemplateStore::open(&config.database_path, config)
        .with_context(|| format!("Failed to open {}", config.database_path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn find_template(store: &TemplateStore, name: &str) -> Result<Template> {
    match store.get_template(name)? {
        Some(template) => Ok(template),
        None => bail!("No template named {name:?}"),
    }
}

/// `Ok(false)` means the command ran but reported a failure
fn run(cli: Cli) -> Result<bool> {
    let config = load_config(&cli)?;

    match cli.command {
        Command::List => {
            let store = open_store(&config)?;
            print_json(&store.list_templates()?)?;
        }
        Command::Show { name } => {
            let store = open_store(&config)?;
            print_json(&find_template(&store, &name)?.to_document())?;
        }
        Command::Import { file } => {
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let doc: TemplateDocument = serde_json::from_str(&content)
                .with_context(|| format!("Invalid template JSON in {}", file.display()))?;
            let template = Template::from_document(doc);

            let mut store = open_store(&config)?;
            let id = store.save_template(&template)?;
            print_json(&serde_json::json!({ "id": id, "name": template.name.trim() }))?;
        }
        Command::Export { name, output } => {
            let store = open_store(&config)?;
            let json = serde_json::to_string_pretty(&find_template(&store, &name)?.to_document())?;
            match output {
                Some(path) => fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{json}"),
            }
        }
        Command::Delete { name } => {
            let mut store = open_store(&config)?;
            let deleted = store.delete_template(name.as_str())?;
            print_json(&serde_json::json!({ "deleted": deleted, "name": name }))?;
            return Ok(deleted);
        }
        Command::Extract { pdf, template } => {
            if !pdf.exists() {
                bail!("PDF not found: {}", pdf.display());
            }
            let store = open_store(&config)?;
            let template = find_template(&store, &template)?;
            let driver = ExtractionDriver::new(CamelotCli::new(&config.extractor));
            let report = driver.extract(&pdf, &template);
            print_json(&report)?;
            return Ok(report.status != ExtractionStatus::Failed);
        }
        Command::Pages { pdf } => {
            let metrics = LopdfPageMetrics::open(&pdf, config.render_scale)?;
            let pages = (1..=metrics.page_count())
                .map(|page| {
                    metrics
                        .page_metrics(page)
                        .map(|m| serde_json::json!({ "page": page, "metrics": m }))
                })
                .collect::<Result<Vec<_>>>()?;
            print_json(&pages)?;
        }
        Command::Check { repair } => {
            let mut store = open_store(&config)?;
            let report = store.check_integrity(repair)?;
            print_json(&report)?;
            return Ok(report.ok);
        }
        Command::Maintain { backup, check, optimize, keep } => {
            let run_all = !(backup || check || optimize);
            let options = MaintenanceOptions {
                backup: run_all || backup,
                check_integrity: run_all || check,
                repair: true,
                optimize: run_all || optimize,
                keep_backups: keep.unwrap_or(config.keep_backups),
            };
            let mut store = open_store(&config)?;
            let report = store.perform_maintenance(&options);
            print_json(&report)?;
            return Ok(report.ok());
        }
    }
    Ok(true)
}
