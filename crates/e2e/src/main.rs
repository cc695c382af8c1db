//! catalog-e2e - run the inventory catalog CRUD scenario in a real browser
//!
//! Exit status: 0 when every checkpoint passed, 1 when the scenario failed,
//! 2 when the run could not start (configuration, reachability, browser).

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use catalog_e2e::{ScenarioConfig, ScenarioRunner};

#[derive(Parser)]
#[command(name = "catalog-e2e")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scenario configuration (YAML); built-in defaults when omitted
    #[arg(short, long, env = "CATALOG_E2E_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the catalog app
    #[arg(long, env = "CATALOG_E2E_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "CATALOG_E2E_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "CATALOG_E2E_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Root directory for failure artifacts
    #[arg(long, env = "CATALOG_E2E_ARTIFACTS_DIR")]
    artifacts_dir: Option<PathBuf>,

    /// Fixed run id instead of a generated one
    #[arg(long, env = "CATALOG_E2E_RUN_ID")]
    run_id: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Default per-step timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Write the JSON run report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Permit "n-th button in the row" lookups (deprecated)
    #[arg(long)]
    allow_positional_fallback: bool,

    /// Skip the HTTP reachability check
    #[arg(long)]
    no_preflight: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<ScenarioConfig> {
        let mut config = ScenarioConfig::load(self.config.as_deref())
            .with_context(|| format!("loading configuration {:?}", self.config))?;

        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(username) = &self.username {
            config.credentials.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.credentials.password = password.clone();
        }
        if let Some(dir) = &self.artifacts_dir {
            config.artifacts.dir = dir.clone();
        }
        if let Some(run_id) = &self.run_id {
            config.artifacts.run_id = Some(run_id.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeouts.step_ms = timeout_ms;
        }
        if self.headed {
            config.browser.headless = false;
        }
        if self.allow_positional_fallback {
            config.allow_positional_fallback = true;
        }
        if self.no_preflight {
            config.preflight.enabled = false;
        }
        Ok(config)
    }
}

fn init_logging(cli: &Cli) {
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = cli.load_config()?;
    let runner = ScenarioRunner::new(config).context("invalid configuration")?;
    info!(run_id = runner.run_id(), "catalog-e2e");

    let (report, code) = match runner.launch_and_run().await {
        Ok(report) => {
            let code = report.exit_code();
            (report, code)
        }
        Err(failure) => {
            error!("Run failed: {}", failure.error);
            let code = failure.exit_code();
            (failure.report, code)
        }
    };

    if let Some(path) = &cli.report {
        report
            .write(path)
            .with_context(|| format!("writing report to {}", path.display()))?;
    }
    Ok(code)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            2
        }
    };
    std::process::exit(code);
}
