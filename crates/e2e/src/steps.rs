//! Atomic scenario steps and their execution
//!
//! A [`Step`] is one action against one semantic target. The [`StepRunner`]
//! resolves the target afresh, performs the action, and records the result.
//! Interactive actions first wait for their target to be visible, the way a
//! user can only click what is on screen.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::locator::{Choice, ElementRef};
use crate::resolver::SelectorResolver;
use crate::scenario::Phase;
use crate::session::Session;
use crate::ui::UiMap;
use crate::wait::{Condition, UrlPattern, WaitCoordinator};

/// Text typed into a read-only field to prove it does not change.
const MUTATION_PROBE: &str = "-e2e";

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Navigate(String),
    Fill(String),
    Click,
    Select(Choice),
    AssertVisible,
    AssertHidden,
    /// Disabled or read-only, and typing into it changes nothing
    AssertDisabled,
    AssertUrl(UrlPattern),
    /// Hidden, and still hidden once the stability window has passed
    AssertGone(Duration),
}

impl Action {
    fn kind(&self) -> &'static str {
        match self {
            Action::Navigate(_) => "navigate",
            Action::Fill(_) => "fill",
            Action::Click => "click",
            Action::Select(_) => "select",
            Action::AssertVisible => "assert_visible",
            Action::AssertHidden => "assert_hidden",
            Action::AssertDisabled => "assert_disabled",
            Action::AssertUrl(_) => "assert_url",
            Action::AssertGone(_) => "assert_gone",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,
    pub action: Action,
    pub target: Option<ElementRef>,
    /// Overrides the default step timeout for waits this step performs
    pub timeout: Option<Duration>,
}

impl Step {
    fn on(name: &str, action: Action, target: &ElementRef) -> Self {
        Self {
            name: name.to_string(),
            action,
            target: Some(target.clone()),
            timeout: None,
        }
    }

    pub fn navigate(name: &str, url: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            action: Action::Navigate(url.into()),
            target: None,
            timeout: None,
        }
    }

    pub fn fill(name: &str, target: &ElementRef, value: impl Into<String>) -> Self {
        Self::on(name, Action::Fill(value.into()), target)
    }

    pub fn click(name: &str, target: &ElementRef) -> Self {
        Self::on(name, Action::Click, target)
    }

    pub fn select(name: &str, target: &ElementRef, choice: &Choice) -> Self {
        Self::on(name, Action::Select(choice.clone()), target)
    }

    pub fn assert_visible(name: &str, target: &ElementRef) -> Self {
        Self::on(name, Action::AssertVisible, target)
    }

    pub fn assert_hidden(name: &str, target: &ElementRef) -> Self {
        Self::on(name, Action::AssertHidden, target)
    }

    pub fn assert_disabled(name: &str, target: &ElementRef) -> Self {
        Self::on(name, Action::AssertDisabled, target)
    }

    pub fn assert_url(name: &str, pattern: &UrlPattern) -> Self {
        Self {
            name: name.to_string(),
            action: Action::AssertUrl(pattern.clone()),
            target: None,
            timeout: None,
        }
    }

    pub fn assert_gone(name: &str, target: &ElementRef, window: Duration) -> Self {
        Self::on(name, Action::AssertGone(window), target)
    }

    pub fn within(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn target(&self) -> E2eResult<&ElementRef> {
        self.target.as_ref().ok_or_else(|| {
            E2eError::InvalidConfig(format!("step '{}' ({}) needs a target", self.name, self.action.kind()))
        })
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{} [{} {}]", self.name, self.action.kind(), target),
            None => write!(f, "{} [{}]", self.name, self.action.kind()),
        }
    }
}

/// Result of one executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub phase: Phase,
    pub action: String,
    pub duration_ms: u64,
    pub success: bool,
    pub error: Option<String>,
}

pub struct StepRunner<'a> {
    session: &'a Session,
    resolver: &'a SelectorResolver,
    waits: &'a WaitCoordinator,
    ui: &'a UiMap,
    default_timeout: Duration,
    log: &'a Mutex<Vec<StepRecord>>,
}

impl<'a> StepRunner<'a> {
    pub fn new(
        session: &'a Session,
        resolver: &'a SelectorResolver,
        waits: &'a WaitCoordinator,
        ui: &'a UiMap,
        default_timeout: Duration,
        log: &'a Mutex<Vec<StepRecord>>,
    ) -> Self {
        Self {
            session,
            resolver,
            waits,
            ui,
            default_timeout,
            log,
        }
    }

    /// Execute `steps` in order, stopping at the first failure.
    pub async fn run_all(&self, phase: Phase, steps: &[Step]) -> E2eResult<()> {
        for step in steps {
            self.run(phase, step).await?;
        }
        Ok(())
    }

    pub async fn run(&self, phase: Phase, step: &Step) -> E2eResult<()> {
        let start = Instant::now();
        debug!(phase = %phase, "Executing step: {}", step);

        let result = self.execute(step).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(()) => info!(phase = %phase, duration_ms, "✓ {}", step.name),
            Err(e) => error!(phase = %phase, duration_ms, "✗ {} - {}", step.name, e),
        }

        self.log.lock().push(StepRecord {
            name: step.name.clone(),
            phase,
            action: step.action.kind().to_string(),
            duration_ms,
            success: result.is_ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
        });
        result
    }

    /// Wait for `condition` with the step timeout unless `limit` is given.
    pub async fn wait(&self, condition: &Condition, limit: Option<Duration>) -> E2eResult<Duration> {
        self.waits
            .await_condition(self.session.driver(), condition, limit.unwrap_or(self.default_timeout))
            .await
    }

    async fn execute(&self, step: &Step) -> E2eResult<()> {
        let driver = self.session.driver();
        let limit = step.timeout.unwrap_or(self.default_timeout);

        match &step.action {
            Action::Navigate(url) => driver.goto(url).await,
            Action::Fill(value) => {
                let target = self.actionable(step, limit).await?;
                let query = self.resolver.resolve(driver, target).await?;
                driver.fill(&query, value).await
            }
            Action::Click => {
                let target = self.actionable(step, limit).await?;
                let query = self.resolver.resolve(driver, target).await?;
                driver.click(&query).await
            }
            Action::Select(choice) => {
                let target = self.actionable(step, limit).await?;
                self.choose(target, choice, limit).await
            }
            Action::AssertVisible => {
                let target = step.target()?;
                self.wait(&Condition::Visible(target.clone()), Some(limit)).await?;
                Ok(())
            }
            Action::AssertHidden => {
                let target = step.target()?;
                self.wait(&Condition::Hidden(target.clone()), Some(limit)).await?;
                Ok(())
            }
            Action::AssertDisabled => {
                let target = self.actionable(step, limit).await?;
                self.assert_read_only(target).await
            }
            Action::AssertUrl(pattern) => {
                self.wait(&Condition::UrlMatches(pattern.clone()), Some(limit)).await?;
                Ok(())
            }
            Action::AssertGone(window) => {
                let target = step.target()?;
                self.waits
                    .await_stable(driver, &Condition::Hidden(target.clone()), *window, limit)
                    .await?;
                Ok(())
            }
        }
    }

    async fn actionable<'s>(&self, step: &'s Step, limit: Duration) -> E2eResult<&'s ElementRef> {
        let target = step.target()?;
        self.wait(&Condition::Visible(target.clone()), Some(limit)).await?;
        Ok(target)
    }

    /// Pick `choice` in a selection control, native or composite.
    ///
    /// The control decides the path, not the caller: a `<select>` gets its
    /// value set, anything else is opened and its `role=option` entry clicked.
    async fn choose(&self, target: &ElementRef, choice: &Choice, limit: Duration) -> E2eResult<()> {
        let driver = self.session.driver();
        let control = self.resolver.resolve(driver, target).await?;
        let info = driver.inspect(&control).await?;

        if info.is_native_select() {
            debug!(target = %target, choice = %choice, "Native select");
            return driver.select_native(&control, choice).await;
        }

        debug!(target = %target, choice = %choice, tag = %info.tag, role = ?info.role, "Composite dropdown");
        driver.click(&control).await?;

        let option = self.ui.category_option(&choice.label);
        self.wait(&Condition::Visible(option.clone()), Some(limit)).await?;
        let option_query = self.resolver.resolve(driver, &option).await?;
        driver.click(&option_query).await?;

        self.wait(&Condition::Hidden(self.ui.category_options.clone()), Some(limit))
            .await?;
        Ok(())
    }

    async fn assert_read_only(&self, target: &ElementRef) -> E2eResult<()> {
        let driver = self.session.driver();
        let query = self.resolver.resolve(driver, target).await?;
        let before = driver.inspect(&query).await?;

        if !before.visible {
            return Err(E2eError::ReadOnlyViolation {
                field: target.to_string(),
                detail: "field is not shown in the read-only view".to_string(),
            });
        }
        if before.is_editable() {
            return Err(E2eError::ReadOnlyViolation {
                field: target.to_string(),
                detail: "field is editable in the read-only view".to_string(),
            });
        }

        if let Err(e) = driver.type_text(&query, MUTATION_PROBE).await {
            // Refusing input is what a read-only field should do
            debug!(target = %target, "Typing rejected: {}", e);
        }

        let query = self.resolver.resolve(driver, target).await?;
        let after = driver.inspect(&query).await?;
        if after.value != before.value {
            warn!(target = %target, before = ?before.value, after = ?after.value, "Read-only value changed");
            return Err(E2eError::ReadOnlyViolation {
                field: target.to_string(),
                detail: format!(
                    "value changed from {:?} to {:?} after typing",
                    before.value, after.value
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::stub::StubDriver;
    use crate::driver::ElementInfo;
    use crate::locator::Query;

    struct Harness {
        session: Session,
        resolver: SelectorResolver,
        waits: WaitCoordinator,
        ui: UiMap,
        log: Mutex<Vec<StepRecord>>,
    }

    impl Harness {
        fn new(driver: StubDriver) -> Self {
            let resolver = SelectorResolver::default();
            Self {
                session: Session::new(Box::new(driver)),
                waits: WaitCoordinator::new(resolver.clone(), Duration::from_millis(100)),
                resolver,
                ui: UiMap::default(),
                log: Mutex::new(Vec::new()),
            }
        }

        fn runner(&self) -> StepRunner<'_> {
            StepRunner::new(
                &self.session,
                &self.resolver,
                &self.waits,
                &self.ui,
                Duration::from_millis(300),
                &self.log,
            )
        }
    }

    fn save_button() -> ElementRef {
        ElementRef::new("save button").role("button", "Salvar Item")
    }

    fn first_query(target: &ElementRef) -> Query {
        Query::for_ref(target, &target.strategies[0])
    }

    #[tokio::test]
    async fn test_click_records_success() {
        let driver = StubDriver::new();
        driver.script(&first_query(&save_button()), &[(1, 1)]);
        let harness = Harness::new(driver);

        harness
            .runner()
            .run(Phase::Creating, &Step::click("save", &save_button()))
            .await
            .unwrap();

        let log = harness.log.lock();
        assert_eq!(log.len(), 1);
        assert!(log[0].success);
        assert_eq!(log[0].action, "click");
        assert_eq!(log[0].phase, Phase::Creating);
    }

    #[tokio::test]
    async fn test_failed_step_is_recorded_and_returned() {
        let harness = Harness::new(StubDriver::new());
        let step = Step::click("save", &save_button()).within(Duration::from_millis(200));

        let err = harness.runner().run(Phase::Editing, &step).await.unwrap_err();
        assert!(matches!(err, E2eError::WaitTimeout { .. }));

        let log = harness.log.lock();
        assert!(!log[0].success);
        assert!(log[0].error.as_deref().unwrap_or_default().contains("save button visible"));
    }

    #[tokio::test]
    async fn test_run_all_stops_at_first_failure() {
        let driver = StubDriver::new();
        driver.script(&first_query(&save_button()), &[(1, 1)]);
        let harness = Harness::new(driver);
        let missing = ElementRef::new("missing").text("Nada");

        let steps = [
            Step::assert_visible("first", &missing),
            Step::click("never runs", &save_button()),
        ];
        assert!(harness.runner().run_all(Phase::Listing, &steps).await.is_err());
        assert_eq!(harness.log.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_editable_field_is_read_only_violation() {
        let name = UiMap::default().name_field;
        let driver = StubDriver::new();
        driver.script(&first_query(&name), &[(1, 1)]);
        let harness = Harness::new(driver);

        let err = harness
            .runner()
            .run(Phase::Viewing, &Step::assert_disabled("name is read-only", &name))
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::ReadOnlyViolation { .. }));
    }

    #[tokio::test]
    async fn test_disabled_field_passes_read_only_check() {
        let name = UiMap::default().name_field;
        let driver = StubDriver::new();
        driver.script(&first_query(&name), &[(1, 1)]);
        *driver.info.lock() = Some(ElementInfo {
            tag: "input".to_string(),
            disabled: true,
            value: Some("Test Chemical 123".to_string()),
            visible: true,
            ..Default::default()
        });
        let harness = Harness::new(driver);

        harness
            .runner()
            .run(Phase::Viewing, &Step::assert_disabled("name is read-only", &name))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_hidden_field_fails_read_only_check() {
        let name = UiMap::default().name_field;
        let driver = StubDriver::new();
        driver.script(&first_query(&name), &[(1, 1)]);
        *driver.info.lock() = Some(ElementInfo {
            tag: "input".to_string(),
            disabled: true,
            visible: false,
            ..Default::default()
        });
        let harness = Harness::new(driver);

        let err = harness
            .runner()
            .run(Phase::Viewing, &Step::assert_disabled("name is read-only", &name))
            .await
            .unwrap_err();
        match err {
            E2eError::ReadOnlyViolation { detail, .. } => assert!(detail.contains("not shown")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_step_without_target_is_config_error() {
        let harness = Harness::new(StubDriver::new());
        let step = Step {
            name: "click nothing".to_string(),
            action: Action::Click,
            target: None,
            timeout: None,
        };

        let err = harness.runner().run(Phase::Listing, &step).await.unwrap_err();
        assert!(matches!(err, E2eError::InvalidConfig(_)));
    }
}
