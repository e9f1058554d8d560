use anyhow::Context;
use clap::Parser;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use jobboard_audit::audit::report;
use jobboard_audit::config::loader::{load_global_settings, load_settings_from_file};
use jobboard_audit::{
    AuditConfig, AuditContext, AuditError, AuditRun, Auditor, Category, DataStore, LogCollector,
    MemoryStore, RestStore, Settings,
};

/// Exit status for configuration and usage errors.
const USAGE_EXIT: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "jobboard-audit",
    version,
    about = "Data-integrity and conformance audit for the job-board backend"
)]
struct Cli {
    #[arg(long, help = "JSON settings file (default: ~/.config/jobboard-audit/settings.json)")]
    config: Option<PathBuf>,
    #[arg(long, help = "Frontend source root scanned by the frontend checks")]
    src: Option<PathBuf>,
    #[arg(long, help = "Write the full run as JSON to this file")]
    report: Option<PathBuf>,
    #[arg(long, help = "Audit an offline JSON snapshot instead of the live store")]
    snapshot: Option<PathBuf>,
    #[arg(long = "only", value_name = "CATEGORY", help = "Run only these categories (repeatable)")]
    only: Vec<Category>,
    #[arg(long, help = "Maximum rows sampled by per-row checks")]
    sample_limit: Option<usize>,
    #[arg(long, help = "Also append diagnostics to <dir>/audit-<timestamp>.log")]
    log_dir: Option<PathBuf>,
    #[arg(short, long, help = "Debug-level diagnostics on stderr")]
    verbose: bool,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            source_root: self.src.clone(),
            row_sample_limit: self.sample_limit,
            report_path: self.report.clone(),
            log_dir: self.log_dir.clone(),
            ..Settings::default()
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<AuditConfig, AuditError> {
    let file = match &cli.config {
        Some(path) => Some(load_settings_from_file(path)?),
        None => load_global_settings()?,
    };
    let layers = file
        .into_iter()
        .chain([Settings::from_env(), cli.settings()]);
    Ok(AuditConfig::resolve(layers))
}

fn open_store(cli: &Cli, config: &AuditConfig) -> Result<Box<dyn DataStore>, AuditError> {
    if let Some(snapshot) = &cli.snapshot {
        log::info!("[Main] Auditing snapshot {}", snapshot.display());
        return Ok(Box::new(MemoryStore::load(snapshot)?));
    }
    let credentials = config.credentials()?;
    log::info!("[Main] Auditing live store at {}", credentials.endpoint);
    let store = RestStore::new(
        &credentials.endpoint,
        &credentials.api_key,
        config.request_timeout(),
    )?;
    Ok(Box::new(store))
}

fn save_report(run: &AuditRun, path: &Path) -> anyhow::Result<()> {
    report::write_json(run, path)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

fn init_logging(verbose: bool, log_dir: Option<&Path>) -> Option<&'static LogCollector> {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let collector = match LogCollector::new(level, log_dir) {
        Ok(collector) => collector,
        Err(e) => {
            eprintln!("[Main] WARNING: Log directory unavailable, logging to stderr only: {}", e);
            LogCollector::new(level, None).ok()?
        }
    };
    match collector.init() {
        Ok(collector) => Some(collector),
        Err(e) => {
            eprintln!("[Main] WARNING: Failed to set LogCollector as global logger: {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::from(USAGE_EXIT);
        }
    };

    let logger = init_logging(cli.verbose, config.log_dir.as_deref());
    log::debug!("[Main] Resolved {:?}", config);

    let store = match open_store(&cli, &config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("❌ {}", e);
            let code = match e {
                AuditError::Io(_) | AuditError::InvalidJson(_) if cli.snapshot.is_some() => {
                    USAGE_EXIT
                }
                other => other.exit_code() as u8,
            };
            return ExitCode::from(code);
        }
    };

    let ctx = AuditContext::new(store.as_ref(), config.source_root.clone())
        .with_sample_limit(config.row_sample_limit);
    let auditor = Auditor::new(ctx).only(&cli.only);

    let mut stdout = io::stdout();
    let run = auditor.run(&mut stdout).await;

    if let Some(path) = &config.report_path {
        if let Err(e) = save_report(&run, path) {
            log::error!("[Main] {:#}", e);
        }
    }

    if let Some(logger) = logger {
        if let Err(e) = logger.wait_for_empty() {
            eprintln!("[Main] WARNING: Failed to flush logs: {}", e);
        }
    }

    ExitCode::from(run.overall.exit_code() as u8)
}
