//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use docgate_core::{
    AnalysisEvent, Analyzer, SilentProgress, StartOutcome, crawl_site, format_markdown,
};
use docgate_shared::{
    AppConfig, ProviderName, Settings, init_config, load_config, load_config_from, urls,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// DocGate: find the documentation pages that matter for your problem.
#[derive(Parser)]
#[command(
    name = "docgate",
    version,
    about = "Crawl a documentation site and let an AI pick the pages relevant to your issue.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.docgate/docgate.toml.
    #[arg(long, global = true, env = "DOCGATE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Report format for `analyze`.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum ReportFormat {
    Markdown,
    Json,
}

/// Provider overrides shared by commands that talk to an AI backend.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct ProviderArgs {
    /// AI provider: openai, anthropic, gemini, deepseek or ollama.
    #[arg(long)]
    pub provider: Option<String>,

    /// Model id (defaults to the provider's default model).
    #[arg(long)]
    pub model: Option<String>,

    /// Base URL override for the provider API.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Name of the env var holding the API key.
    #[arg(long)]
    pub api_key_env: Option<String>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl a documentation site and rank its pages against an issue.
    Analyze {
        /// Documentation base URL (scheme optional).
        url: String,

        /// Description of the problem you are trying to solve.
        issue: String,

        #[command(flatten)]
        provider: ProviderArgs,

        /// Maximum number of results to report.
        #[arg(long)]
        max_results: Option<usize>,

        /// Maximum number of pages to collect.
        #[arg(long)]
        max_urls: Option<usize>,

        /// Report format.
        #[arg(short, long, default_value = "markdown")]
        format: ReportFormat,

        /// Write the report to a file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Discover the pages of a documentation site without scoring them.
    Crawl {
        /// Documentation base URL (scheme optional).
        url: String,

        /// Maximum number of pages to collect.
        #[arg(long)]
        max_urls: Option<usize>,
    },

    /// Check that the configured AI provider is reachable.
    TestConnection {
        #[command(flatten)]
        provider: ProviderArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so reports
/// on stdout stay pipeable.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docgate=info",
        1 => "docgate=debug",
        _ => "docgate=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Analyze {
            url,
            issue,
            provider,
            max_results,
            max_urls,
            format,
            out,
        } => {
            let mut config = apply_provider_args(config, &provider)?;
            if let Some(n) = max_results {
                config.filter.max_results = n;
            }
            if let Some(n) = max_urls {
                config.crawl.max_urls = n;
            }
            cmd_analyze(&config, &url, &issue, format, out).await
        }
        Command::Crawl { url, max_urls } => {
            let mut config = config;
            if let Some(n) = max_urls {
                config.crawl.max_urls = n;
            }
            cmd_crawl(&config, &url).await
        }
        Command::TestConnection { provider } => {
            cmd_test_connection(&apply_provider_args(config, &provider)?).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&config).await,
        },
    }
}

fn apply_provider_args(mut config: AppConfig, args: &ProviderArgs) -> Result<AppConfig> {
    if let Some(name) = &args.provider {
        let name: ProviderName = name.parse()?;
        if name != config.provider.name {
            // a model or key var chosen for another provider does not carry over
            config.provider.model = None;
            config.provider.api_key_env = None;
            config.provider.endpoint = None;
        }
        config.provider.name = name;
    }
    if let Some(model) = &args.model {
        config.provider.model = Some(model.clone());
    }
    if let Some(endpoint) = &args.endpoint {
        config.provider.endpoint = Some(endpoint.clone());
    }
    if let Some(var) = &args.api_key_env {
        config.provider.api_key_env = Some(var.clone());
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_analyze(
    config: &AppConfig,
    url: &str,
    issue: &str,
    format: ReportFormat,
    out: Option<PathBuf>,
) -> Result<()> {
    let settings = Settings::resolve(config)?;
    info!(
        url,
        provider = settings.provider.name.display_name(),
        model = %settings.provider.model,
        "starting analysis"
    );

    let (analyzer, mut events) = Analyzer::new(settings);
    let handle = match analyzer.start_analysis(url, issue)? {
        StartOutcome::Started { handle, .. } => handle,
        StartOutcome::AlreadyRunning => return Err(eyre!("an analysis is already running")),
    };

    let progress = CliProgress::new()?;

    let outcome = loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    progress.finish();
                    return Err(eyre!("analysis ended without a result"));
                };
                match event {
                    AnalysisEvent::Progress(update) => {
                        progress.update(update.percent, &update.message);
                    }
                    AnalysisEvent::RealtimeResult { page, batch_progress } => {
                        if page.relevance > 0.0 {
                            progress.println(format!(
                                "  [{}/{}] {:>4.1}  {}",
                                batch_progress.current, batch_progress.total, page.relevance, page.url()
                            ));
                        }
                    }
                    AnalysisEvent::Complete(outcome) => break outcome,
                    AnalysisEvent::Error { message, .. } => {
                        progress.finish();
                        return Err(eyre!(message));
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                analyzer.cancel_analysis();
                progress.finish();
                handle.await.wrap_err("analysis task failed")?;
                return Err(eyre!("analysis cancelled"));
            }
        }
    };

    progress.finish();
    handle.await.wrap_err("analysis task failed")?;

    let report = match format {
        ReportFormat::Markdown => format_markdown(&outcome, &report_source(url), Utc::now()),
        ReportFormat::Json => serde_json::to_string_pretty(&outcome)?,
    };

    match out {
        Some(path) => {
            std::fs::write(&path, &report)
                .wrap_err_with(|| format!("cannot write report to {}", path.display()))?;
            eprintln!(
                "  {} relevant of {} pages, report written to {}",
                outcome.results.len(),
                outcome.total_scanned,
                path.display()
            );
        }
        None => println!("{report}"),
    }

    Ok(())
}

async fn cmd_crawl(config: &AppConfig, url: &str) -> Result<()> {
    let outcome = crawl_site(url, &config.crawl, &SilentProgress, None).await;
    for error in &outcome.errors {
        warn!(%error, "crawl error");
    }
    if outcome.pages.is_empty() {
        return Err(eyre!(docgate_core::NO_URLS_FOUND));
    }

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn cmd_test_connection(config: &AppConfig) -> Result<()> {
    let settings = Settings::resolve(config)?;
    let adapter = docgate_scoring::create_adapter(&settings.provider)?;

    let spinner = CliProgress::new()?;
    spinner.update(0, &format!("Connecting to {}...", adapter.name()));
    let ok = adapter.test_connection().await;
    spinner.finish();

    if ok {
        println!(
            "  {} ({}) is reachable.",
            adapter.name(),
            settings.provider.model
        );
        Ok(())
    } else {
        Err(eyre!(
            "{} is not reachable at {}",
            adapter.name(),
            settings.provider.endpoint
        ))
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress
// ---------------------------------------------------------------------------

/// Progress bar driven by analysis events.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")?
                .progress_chars("=> ")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Ok(Self { bar })
    }

    fn update(&self, percent: u8, message: &str) {
        self.bar.set_position(u64::from(percent));
        self.bar.set_message(message.to_string());
    }

    fn println(&self, line: String) {
        self.bar.println(line);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// The site URL as the analysis saw it: scheme added and canonicalized.
fn report_source(raw: &str) -> String {
    let with_scheme = urls::ensure_scheme(raw);
    urls::normalize(&with_scheme, &with_scheme).unwrap_or(with_scheme)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_analyze_with_overrides() {
        let cli = Cli::try_parse_from([
            "docgate",
            "analyze",
            "react.dev",
            "hydration mismatch",
            "--provider",
            "ollama",
            "--max-results",
            "5",
            "--format",
            "json",
        ])
        .unwrap();

        let Command::Analyze {
            url,
            issue,
            provider,
            max_results,
            format,
            ..
        } = cli.command
        else {
            panic!("expected analyze");
        };
        assert_eq!(url, "react.dev");
        assert_eq!(issue, "hydration mismatch");
        assert_eq!(provider.provider.as_deref(), Some("ollama"));
        assert_eq!(max_results, Some(5));
        assert!(matches!(format, ReportFormat::Json));
    }

    #[test]
    fn switching_provider_drops_foreign_overrides() {
        let mut config = AppConfig::default();
        config.provider.model = Some("gpt-4o".into());
        config.provider.api_key_env = Some("MY_OPENAI_KEY".into());

        let args = ProviderArgs {
            provider: Some("anthropic".into()),
            ..ProviderArgs::default()
        };
        let config = apply_provider_args(config, &args).unwrap();
        assert_eq!(config.provider.name, ProviderName::Anthropic);
        assert!(config.provider.model.is_none());
        assert!(config.provider.api_key_env.is_none());
    }

    #[test]
    fn same_provider_keeps_config_and_applies_model() {
        let mut config = AppConfig::default();
        config.provider.api_key_env = Some("MY_OPENAI_KEY".into());

        let args = ProviderArgs {
            provider: Some("openai".into()),
            model: Some("gpt-4.1-mini".into()),
            ..ProviderArgs::default()
        };
        let config = apply_provider_args(config, &args).unwrap();
        assert_eq!(config.provider.model.as_deref(), Some("gpt-4.1-mini"));
        assert_eq!(config.provider.api_key_env.as_deref(), Some("MY_OPENAI_KEY"));
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let args = ProviderArgs {
            provider: Some("bard".into()),
            ..ProviderArgs::default()
        };
        assert!(apply_provider_args(AppConfig::default(), &args).is_err());
    }

    #[test]
    fn report_source_is_the_analyzed_url() {
        assert_eq!(report_source("  react.dev "), "https://react.dev/");
        assert_eq!(
            report_source("https://docs.rs/tokio/#top"),
            "https://docs.rs/tokio"
        );
        assert_eq!(report_source("http://x.dev/guide"), "http://x.dev/guide");
    }
}
