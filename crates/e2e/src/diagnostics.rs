//! Failure diagnostics
//!
//! Wraps scenario execution: when the body fails, the page is captured to
//! `<dir>/<run_id>/` and the original error is handed back untouched.
//! Capture is best-effort; a capture problem is logged, never raised.

use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ArtifactConfig;
use crate::driver::PageDriver;
use crate::error::{E2eError, E2eResult};

pub const SCREENSHOT_FILE: &str = "failure.png";
pub const MARKUP_FILE: &str = "failure.html";
pub const CONSOLE_FILE: &str = "console.log";
pub const FINAL_SCREENSHOT_FILE: &str = "final.png";

/// `<UTC timestamp>-<8 hex chars>`, unique enough to keep runs apart.
pub fn generate_run_id() -> String {
    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", stamp, &suffix[..8])
}

/// Paths of the artifacts a failure produced. `None` means the capture
/// was skipped or failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticBundle {
    pub screenshot: Option<PathBuf>,
    pub markup: Option<PathBuf>,
    pub console: Option<PathBuf>,
}

/// A failed run: the error exactly as raised, plus what was captured.
#[derive(Debug)]
pub struct Failure {
    pub error: E2eError,
    pub bundle: DiagnosticBundle,
}

#[derive(Debug, Clone)]
pub struct DiagnosticsCollector {
    run_id: String,
    run_dir: PathBuf,
    capture_markup: bool,
    capture_on_success: bool,
}

impl DiagnosticsCollector {
    pub fn new(config: &ArtifactConfig, run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            run_dir: config.dir.join(run_id),
            capture_markup: config.capture_markup,
            capture_on_success: config.capture_on_success,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn screenshot_path(&self) -> PathBuf {
        self.run_dir.join(SCREENSHOT_FILE)
    }

    pub fn markup_path(&self) -> PathBuf {
        self.run_dir.join(MARKUP_FILE)
    }

    pub fn console_path(&self) -> PathBuf {
        self.run_dir.join(CONSOLE_FILE)
    }

    /// Await `body`; on error, capture the page and return the error as-is.
    pub async fn guard<T, Fut>(&self, driver: &dyn PageDriver, body: Fut) -> Result<T, Failure>
    where
        Fut: Future<Output = E2eResult<T>>,
    {
        match body.await {
            Ok(value) => Ok(value),
            Err(error) => {
                error!(kind = error.kind(), "Scenario failed: {}", error);
                let bundle = self.capture_failure(driver).await;
                Err(Failure { error, bundle })
            }
        }
    }

    /// Write whatever of the failure state can be captured.
    pub async fn capture_failure(&self, driver: &dyn PageDriver) -> DiagnosticBundle {
        if let Err(e) = std::fs::create_dir_all(&self.run_dir) {
            warn!(dir = %self.run_dir.display(), "Cannot create artifact directory: {}", e);
            return DiagnosticBundle::default();
        }

        let mut bundle = DiagnosticBundle::default();

        let shot = self.screenshot_path();
        match driver.screenshot(&shot).await {
            Ok(()) => {
                info!(path = %shot.display(), "Failure screenshot saved");
                bundle.screenshot = Some(shot);
            }
            Err(e) => warn!("Failure screenshot not captured: {}", e),
        }

        if self.capture_markup {
            let path = self.markup_path();
            match self.write_markup(driver, &path).await {
                Ok(()) => bundle.markup = Some(path),
                Err(e) => warn!("Page markup not captured: {}", e),
            }
        }

        let lines = driver.console_lines();
        if !lines.is_empty() {
            let path = self.console_path();
            match std::fs::write(&path, lines.join("\n") + "\n") {
                Ok(()) => bundle.console = Some(path),
                Err(e) => warn!("Console log not written: {}", e),
            }
        }

        bundle
    }

    /// Screenshot a green run when configured to; otherwise nothing is
    /// written.
    pub async fn capture_success(&self, driver: &dyn PageDriver) -> Option<PathBuf> {
        if !self.capture_on_success {
            return None;
        }
        if let Err(e) = std::fs::create_dir_all(&self.run_dir) {
            warn!("Cannot create artifact directory: {}", e);
            return None;
        }
        let path = self.run_dir.join(FINAL_SCREENSHOT_FILE);
        match driver.screenshot(&path).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Final screenshot not captured: {}", e);
                None
            }
        }
    }

    async fn write_markup(&self, driver: &dyn PageDriver, path: &Path) -> E2eResult<()> {
        let html = driver.content().await?;
        std::fs::write(path, html)?;
        Ok(())
    }
}
