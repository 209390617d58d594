use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use phishscan::{
    config::Config,
    detector::HttpDetectorFactory,
    host::{Host, HostNotifier, Outbox},
    ignore::{IgnoreRules, RuleType},
    logging,
    mode::ModeController,
    model::{Judgment, Mode, ScanRequest, TabId},
    notify::{Notifier, SilentNotifier},
    output::{print_availability, print_ignore_rules, print_report, OutputFormat, PageReport, ScanReport},
    store::{JsonStore, Store},
    tabs::TabTable,
    Coordinator,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::warn;
use walkdir::WalkDir;

/// Exit codes for scripting
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const THREAT: u8 = 2;
}

/// File extensions picked up by `scan-dir`.
const PAGE_EXTENSIONS: &[&str] = &["html", "htm", "txt", "eml"];

/// Tab id used for a single-page `scan`.
const SCAN_TAB: TabId = 1;

#[derive(Parser)]
#[command(name = "phishscan")]
#[command(
    author,
    version,
    about = "Phishing detection service for the phishscan browser extension"
)]
struct Cli {
    /// Enable debug logging (overridden by PHISHSCAN_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as the extension's native messaging host (stdio)
    Serve,

    /// Analyse one page's text, read from a file or stdin
    Scan {
        /// URL the text was taken from
        url: String,

        /// Read page text from this file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,

        /// Analyse with this mode instead of the saved one (local, cloud)
        #[arg(short, long)]
        mode: Option<String>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Analyse every .html, .htm, .txt and .eml file under a directory
    ScanDir {
        dir: PathBuf,

        /// Analyse with this mode instead of the saved one (local, cloud)
        #[arg(short, long)]
        mode: Option<String>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show or change the analysis mode
    Mode {
        /// New mode (local, cloud)
        mode: Option<String>,
    },

    /// Report whether the active backend can serve requests
    Availability,

    /// Manage pages and domains that are never analysed
    Ignore {
        #[command(subcommand)]
        action: IgnoreAction,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Subcommand)]
enum IgnoreAction {
    /// Add a rule
    Add {
        pattern: String,

        /// Rule type (url, domain)
        #[arg(short = 't', long = "type", default_value = "domain")]
        rule_type: String,
    },

    /// List rules with their indices
    List,

    /// Remove the rule at an index
    Remove { index: usize },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = Config::load().unwrap_or_else(|e| {
        warn!("Using default configuration: {:#}", e);
        Config::default()
    });

    match cli.command {
        Commands::Serve => {
            serve(config).await?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Scan {
            url,
            file,
            mode,
            format,
        } => run_scan(config, url, file, mode, format).await,
        Commands::ScanDir { dir, mode, format } => run_scan_dir(config, dir, mode, format).await,
        Commands::Mode { mode } => {
            handle_mode(config, mode).await?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Availability => {
            let store = Arc::new(open_store()?);
            let modes = mode_controller(&config, store.clone(), store).await?;
            print_availability(&modes.availability());
            Ok(exit_codes::SUCCESS)
        }
        Commands::Ignore { action } => {
            handle_ignore(&config, action)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn open_store() -> Result<JsonStore> {
    JsonStore::open_default().context("Failed to open state file")
}

async fn mode_controller(
    config: &Config,
    persistent: Arc<JsonStore>,
    store: Arc<dyn Store>,
) -> Result<ModeController> {
    let install_id = persistent.install_id()?;
    let factory = HttpDetectorFactory::new(config.clone()).with_install_id(install_id);
    Ok(ModeController::initialize(Arc::new(factory), store, config.default_mode).await)
}

async fn serve(config: Config) -> Result<()> {
    let store = Arc::new(open_store()?);
    let tabs = Arc::new(TabTable::new());
    let (outbox, outgoing) = Outbox::channel();

    let modes = mode_controller(&config, store.clone(), store.clone()).await?;
    let coordinator = Arc::new(Coordinator::new(
        &config,
        modes,
        store,
        tabs.clone(),
        Arc::new(HostNotifier::new(outbox.clone())),
    ));

    Host::new(coordinator, tabs, outbox, outgoing)
        .serve(tokio::io::stdin(), tokio::io::stdout())
        .await?;
    Ok(())
}

/// Builds a coordinator for one-shot scans. Results are kept in memory so a
/// CLI run never touches the extension's per-tab state; mode and ignore rules
/// come from the saved state.
async fn one_shot_coordinator(
    config: &Config,
    mode: Option<String>,
    tabs: Arc<TabTable>,
) -> Result<Coordinator> {
    let persistent = Arc::new(open_store()?);
    let scratch = JsonStore::in_memory();
    scratch.set_ignore_rules(&persistent.ignore_rules()?)?;

    let mode = match mode {
        Some(mode) => Some(Mode::from_str(&mode).map_err(|e| anyhow::anyhow!(e))?),
        None => persistent.mode()?,
    };
    if let Some(mode) = mode {
        scratch.set_mode(mode)?;
    }

    let scratch: Arc<dyn Store> = Arc::new(scratch);
    let modes = mode_controller(config, persistent, scratch.clone()).await?;
    let notifier: Arc<dyn Notifier> = Arc::new(SilentNotifier);
    Ok(Coordinator::new(config, modes, scratch, tabs, notifier))
}

async fn run_scan(
    config: Config,
    url: String,
    file: Option<PathBuf>,
    mode: Option<String>,
    format: String,
) -> Result<u8> {
    let format = OutputFormat::from_str(&format).map_err(|e| anyhow::anyhow!(e))?;

    let content = match &file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut content = String::new();
            tokio::io::stdin()
                .read_to_string(&mut content)
                .await
                .context("Failed to read page text from stdin")?;
            content
        }
    };

    let tabs = Arc::new(TabTable::new());
    let coordinator = one_shot_coordinator(&config, mode, tabs.clone()).await?;

    let progress = if format == OutputFormat::Table {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Analysing with {} mode...", coordinator.mode()));
        Some(pb)
    } else {
        None
    };

    tabs.set_url(SCAN_TAB, url.clone());
    let result = coordinator
        .handle_scan_request(ScanRequest::new(SCAN_TAB, url.clone(), content))
        .await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let exit_code = if result.judgment == Judgment::Threat {
        exit_codes::THREAT
    } else if result.judgment.is_failure() {
        exit_codes::ERROR
    } else {
        exit_codes::SUCCESS
    };

    let report = ScanReport::new(vec![PageReport {
        source: url,
        result,
    }]);
    print_report(&report, format)?;

    Ok(exit_code)
}

async fn run_scan_dir(
    config: Config,
    dir: PathBuf,
    mode: Option<String>,
    format: String,
) -> Result<u8> {
    let format = OutputFormat::from_str(&format).map_err(|e| anyhow::anyhow!(e))?;
    let is_interactive = format == OutputFormat::Table;

    let files = collect_pages(&dir);
    let tabs = Arc::new(TabTable::new());
    let coordinator = one_shot_coordinator(&config, mode, tabs.clone()).await?;

    let progress = if is_interactive {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} Analysing pages...")?
                .progress_chars("#>-"),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(Arc::new(pb))
    } else {
        None
    };

    let futures: Vec<_> = files
        .iter()
        .enumerate()
        .map(|(index, path)| {
            let pb = progress.clone();
            let coordinator = &coordinator;
            let tabs = &tabs;
            async move {
                let tab_id = index as TabId + 1;
                let source = path.display().to_string();
                let url = file_url(path);
                let result = match tokio::fs::read_to_string(path).await {
                    Ok(content) => {
                        tabs.set_url(tab_id, url.clone());
                        coordinator
                            .handle_scan_request(ScanRequest::new(tab_id, url, content))
                            .await
                    }
                    Err(e) => {
                        warn!("Failed to read {}: {}", source, e);
                        phishscan::AnalysisResult::error(
                            coordinator.mode(),
                            0,
                            format!("could not read file: {}", e),
                        )
                    }
                };
                if let Some(ref pb) = pb {
                    pb.inc(1);
                }
                PageReport { source, result }
            }
        })
        .collect();

    let pages = join_all(futures).await;

    if let Some(pb) = progress {
        pb.finish_with_message(format!("Analysed {} pages", pages.len()));
    }

    let report = ScanReport::new(pages);
    print_report(&report, format)?;

    Ok(if report.threats() > 0 {
        exit_codes::THREAT
    } else {
        exit_codes::SUCCESS
    })
}

fn collect_pages(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| PAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

fn file_url(path: &Path) -> String {
    let absolute = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf());
    reqwest::Url::from_file_path(&absolute)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| format!("file://{}", absolute.display()))
}

async fn handle_mode(config: Config, mode: Option<String>) -> Result<()> {
    let store = Arc::new(open_store()?);

    let Some(mode) = mode else {
        let mode = store.mode()?.unwrap_or(config.default_mode);
        println!("{}", mode);
        return Ok(());
    };

    let mode = Mode::from_str(&mode).map_err(|e| anyhow::anyhow!(e))?;
    let modes = mode_controller(&config, store.clone(), store).await?;
    if modes.mode() != mode {
        modes.switch_mode(mode).await;
    }

    println!("Mode set to {}.", mode.display_name());
    println!();
    print_availability(&modes.availability());
    Ok(())
}

fn handle_ignore(config: &Config, action: IgnoreAction) -> Result<()> {
    let store = open_store()?;
    let mut rules = IgnoreRules::new(config.extension_origin.clone(), store.ignore_rules()?);

    match action {
        IgnoreAction::Add { pattern, rule_type } => {
            let rule_type = RuleType::from_str(&rule_type).map_err(|e| anyhow::anyhow!(e))?;
            if rules.add(&pattern, rule_type) {
                store.set_ignore_rules(rules.rules())?;
                println!("Added {} rule.", rule_type.as_str());
            } else {
                println!("Rule is empty or already present.");
            }
        }
        IgnoreAction::List => print_ignore_rules(rules.rules()),
        IgnoreAction::Remove { index } => match rules.remove(index) {
            Some(removed) => {
                store.set_ignore_rules(rules.rules())?;
                println!("Removed {} rule: {}", removed.rule_type.as_str(), removed.pattern);
            }
            None => anyhow::bail!("No ignore rule at index {}", index),
        },
    }

    Ok(())
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'phishscan config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
