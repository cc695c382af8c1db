//! Run orchestration: preflight, browser session, scenario, report

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::browser::ChromiumDriver;
use crate::config::ScenarioConfig;
use crate::diagnostics::{generate_run_id, DiagnosticBundle, DiagnosticsCollector, Failure};
use crate::dialog::DialogRecord;
use crate::driver::PageDriver;
use crate::error::{E2eError, E2eResult};
use crate::preflight;
use crate::scenario::{run_crud, FlowContext, Phase};
use crate::session::Session;
use crate::steps::StepRecord;

/// Why a run failed, as written to the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    /// `E2eError::kind()`
    pub kind: String,
    pub message: String,
    /// Scenario phase in flight; `None` when the scenario never started
    pub phase: Option<Phase>,
    /// Configuration, preflight or launch problem rather than a UI failure
    pub harness: bool,
    pub screenshot: Option<PathBuf>,
    pub markup: Option<PathBuf>,
    pub console: Option<PathBuf>,
}

impl FailureReport {
    pub fn new(error: &E2eError, phase: Option<Phase>, bundle: DiagnosticBundle) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
            phase,
            harness: error.is_harness_error(),
            screenshot: bundle.screenshot,
            markup: bundle.markup,
            console: bundle.console,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Pending,
    Passed,
    Failed(FailureReport),
}

impl RunOutcome {
    /// Settle a pending outcome. Returns `false`, leaving the outcome
    /// untouched, if it was already final or `outcome` is `Pending`.
    pub fn finalize(&mut self, outcome: RunOutcome) -> bool {
        if !matches!(self, RunOutcome::Pending) || matches!(outcome, RunOutcome::Pending) {
            warn!("Ignoring attempt to re-finalize run outcome");
            return false;
        }
        *self = outcome;
        true
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, RunOutcome::Passed)
    }

    /// 0 passed, 1 scenario failure, 2 harness error or unfinished run.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Passed => 0,
            RunOutcome::Failed(failure) if !failure.harness => 1,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub steps: Vec<StepRecord>,
    pub dialogs: Vec<DialogRecord>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_screenshot: Option<PathBuf>,
}

impl RunReport {
    fn pending(run_id: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.to_string(),
            started_at,
            outcome: RunOutcome::Pending,
            steps: Vec::new(),
            dialogs: Vec::new(),
            duration_ms: 0,
            final_screenshot: None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }

    pub fn write(&self, path: &Path) -> E2eResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!("Report written to: {}", path.display());
        Ok(())
    }
}

/// A failed run. `error` is the failure exactly as raised.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    pub error: E2eError,
    pub report: RunReport,
}

impl RunFailure {
    pub fn exit_code(&self) -> i32 {
        self.report.exit_code()
    }
}

pub struct ScenarioRunner {
    config: ScenarioConfig,
    run_id: String,
}

impl ScenarioRunner {
    pub fn new(config: ScenarioConfig) -> E2eResult<Self> {
        config.validate()?;
        let run_id = config
            .artifacts
            .run_id
            .clone()
            .unwrap_or_else(generate_run_id);
        Ok(Self { config, run_id })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Wait for the app to answer HTTP before any browser is started.
    pub async fn preflight(&self) -> E2eResult<()> {
        let preflight = &self.config.preflight;
        if !preflight.enabled {
            return Ok(());
        }
        let url = self.config.url("/");
        preflight::wait_for_app(&url, std::time::Duration::from_millis(preflight.timeout_ms)).await?;
        Ok(())
    }

    /// Preflight, launch Chromium, run the scenario.
    pub async fn launch_and_run(&self) -> Result<RunReport, RunFailure> {
        let started_at = Utc::now();
        if let Err(e) = self.preflight().await {
            return Err(self.harness_failure(e, started_at));
        }
        let driver = ChromiumDriver::launch(&self.config.browser, self.config.timeouts.navigation())
            .await
            .map_err(|e| self.harness_failure(e, started_at))?;
        self.run(Box::new(driver)).await
    }

    /// Run the CRUD scenario on `driver`. The driver is closed on return,
    /// whatever the outcome.
    pub async fn run(&self, driver: Box<dyn PageDriver>) -> Result<RunReport, RunFailure> {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut report = RunReport::pending(&self.run_id, started_at);
        info!(run_id = %self.run_id, base_url = %self.config.base_url, "Starting CRUD run");

        let config = &self.config;
        let diagnostics = DiagnosticsCollector::new(&config.artifacts, &self.run_id);
        let diagnostics = &diagnostics;

        let (result, steps, dialogs, anomalies, phase, final_screenshot) = Session::new(driver)
            .scoped(|session| async move {
                if let Err(e) = session.driver().capture_console().await {
                    warn!("Console capture unavailable: {}", e);
                }
                let ctx = FlowContext::new(&session, config);
                let result = diagnostics
                    .guard(session.driver(), async {
                        session.arm_dialogs().await?;
                        run_crud(&ctx).await
                    })
                    .await;
                let final_screenshot = if result.is_ok() {
                    diagnostics.capture_success(session.driver()).await
                } else {
                    None
                };
                let dialogs = session.dialogs().records();
                let anomalies = session.dialogs().anomalies().len();
                (result, ctx.take_steps(), dialogs, anomalies, ctx.phase(), final_screenshot)
            })
            .await;

        report.steps = steps;
        report.dialogs = dialogs;
        report.final_screenshot = final_screenshot;
        report.duration_ms = start.elapsed().as_millis() as u64;

        if anomalies > 0 {
            warn!(anomalies, "Unexpected dialogs were accepted during the run");
        }

        match result {
            Ok(()) => {
                report.outcome.finalize(RunOutcome::Passed);
                info!(
                    steps = report.steps.len(),
                    duration_ms = report.duration_ms,
                    "✓ CRUD run {} passed",
                    self.run_id
                );
                Ok(report)
            }
            Err(Failure { error, bundle }) => {
                report
                    .outcome
                    .finalize(RunOutcome::Failed(FailureReport::new(&error, Some(phase), bundle)));
                error!(phase = %phase, kind = error.kind(), "✗ CRUD run {} failed: {}", self.run_id, error);
                Err(RunFailure { error, report })
            }
        }
    }

    fn harness_failure(&self, error: E2eError, started_at: DateTime<Utc>) -> RunFailure {
        error!(kind = error.kind(), "Run {} could not start: {}", self.run_id, error);
        let mut report = RunReport::pending(&self.run_id, started_at);
        let mut failure = FailureReport::new(&error, None, DiagnosticBundle::default());
        failure.harness = true;
        report.outcome.finalize(RunOutcome::Failed(failure));
        RunFailure { error, report }
    }
}
