//! The CRUD scenario as a typestate machine
//!
//! ```text
//! Unauthenticated ─authenticate─▶ Dashboard ─open_inventory─▶ Listing
//!   ─create─▶ Created ─edit─▶ Edited ─view─▶ Viewed ─delete─▶ Deleted
//! ```
//!
//! Each transition consumes the previous state, so a step can only be
//! reached once the one before it has been proven on the page. Transient
//! phases (`Authenticating`, `Creating`, ...) are tracked in the
//! [`FlowContext`] so a failure can be attributed to the transition that
//! was in flight.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{ItemSpec, ScenarioConfig};
use crate::error::{E2eError, E2eResult};
use crate::resolver::SelectorResolver;
use crate::session::Session;
use crate::steps::{Step, StepRecord, StepRunner};
use crate::ui::UiMap;
use crate::wait::{Condition, WaitCoordinator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Unauthenticated,
    Authenticating,
    Dashboard,
    Listing,
    Creating,
    Created,
    Editing,
    Edited,
    Viewing,
    Viewed,
    Deleting,
    Deleted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Unauthenticated => "unauthenticated",
            Phase::Authenticating => "authenticating",
            Phase::Dashboard => "dashboard",
            Phase::Listing => "listing",
            Phase::Creating => "creating",
            Phase::Created => "created",
            Phase::Editing => "editing",
            Phase::Edited => "edited",
            Phase::Viewing => "viewing",
            Phase::Viewed => "viewed",
            Phase::Deleting => "deleting",
            Phase::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// Everything a scenario needs besides its current state.
pub struct FlowContext<'s> {
    session: &'s Session,
    config: &'s ScenarioConfig,
    resolver: SelectorResolver,
    waits: WaitCoordinator,
    steps: Mutex<Vec<StepRecord>>,
    phase: Mutex<Phase>,
}

impl<'s> FlowContext<'s> {
    pub fn new(session: &'s Session, config: &'s ScenarioConfig) -> Self {
        let resolver = SelectorResolver::new(config.allow_positional_fallback);
        let waits = WaitCoordinator::new(resolver.clone(), config.timeouts.poll_interval());
        Self {
            session,
            config,
            resolver,
            waits,
            steps: Mutex::new(Vec::new()),
            phase: Mutex::new(Phase::Unauthenticated),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    pub fn take_steps(&self) -> Vec<StepRecord> {
        std::mem::take(&mut *self.steps.lock())
    }

    fn enter(&self, phase: Phase) {
        *self.phase.lock() = phase;
        info!(phase = %phase, "Phase");
    }

    fn ui(&self) -> &UiMap {
        &self.config.ui
    }

    fn runner(&self) -> StepRunner<'_> {
        StepRunner::new(
            self.session,
            &self.resolver,
            &self.waits,
            &self.config.ui,
            self.config.timeouts.step(),
            &self.steps,
        )
    }

    /// Fail before mutating anything if `name` is already listed: the row
    /// lookups that follow could not be unique.
    async fn ensure_unlisted(&self, name: &str) -> E2eResult<()> {
        let entry = self.ui().listing_entry(name);
        let sighting = self.resolver.locate(self.session.driver(), &entry).await?;
        if let Some(query) = &sighting.query {
            return Err(E2eError::AmbiguousMatch {
                reference: format!(
                    "{} via {} (already listed before this run touched it; saving would make {})",
                    entry,
                    query,
                    sighting.probe.matches + 1
                ),
                count: sighting.probe.matches,
            });
        }
        Ok(())
    }
}

pub struct Unauthenticated;
pub struct Dashboard;
pub struct Listing;

pub struct Created {
    name: String,
}

pub struct Edited {
    name: String,
}

pub struct Viewed {
    name: String,
}

pub struct Deleted {
    name: String,
}

pub struct Scenario<'c, S> {
    ctx: &'c FlowContext<'c>,
    state: S,
}

impl<'c, S> Scenario<'c, S> {
    fn advance<N>(self, state: N) -> Scenario<'c, N> {
        Scenario {
            ctx: self.ctx,
            state,
        }
    }
}

impl<'c> Scenario<'c, Unauthenticated> {
    pub fn start(ctx: &'c FlowContext<'c>) -> Self {
        ctx.enter(Phase::Unauthenticated);
        Self {
            ctx,
            state: Unauthenticated,
        }
    }

    /// Sign in and wait for the dashboard.
    ///
    /// Not retried: a login that does not reach the dashboard is a
    /// credential or workflow problem, not a transient one.
    pub async fn authenticate(self) -> E2eResult<Scenario<'c, Dashboard>> {
        let ctx = self.ctx;
        let config = ctx.config;
        let ui = ctx.ui();
        let timeouts = &config.timeouts;
        ctx.enter(Phase::Authenticating);

        let runner = ctx.runner();
        let steps = [
            Step::navigate("open login page", config.url(&config.routes.login)),
            Step::fill("enter username", &ui.username, &config.credentials.username)
                .within(timeouts.navigation()),
            Step::fill("enter password", &ui.password, &config.credentials.password),
            Step::click("submit credentials", &ui.login_submit),
        ];
        runner.run_all(Phase::Authenticating, &steps).await?;

        let mut arrival = vec![Step::assert_visible("reach dashboard", &ui.dashboard_marker)
            .within(timeouts.auth())];
        if let Some(pattern) = &config.routes.dashboard {
            arrival.push(Step::assert_url("land on dashboard URL", pattern).within(timeouts.auth()));
        }
        if let Err(e) = runner.run_all(Phase::Authenticating, &arrival).await {
            return Err(self.login_failure(e).await);
        }

        ctx.enter(Phase::Dashboard);
        Ok(self.advance(Dashboard))
    }

    async fn login_failure(&self, cause: E2eError) -> E2eError {
        if !matches!(cause, E2eError::WaitTimeout { .. }) {
            return cause;
        }
        let ctx = self.ctx;
        let shown = ctx
            .waits
            .check(ctx.session.driver(), &Condition::Visible(ctx.ui().login_error.clone()))
            .await
            .unwrap_or(false);
        let reason = if shown {
            format!("the login view reported an error ({})", cause)
        } else {
            format!("dashboard not reached ({})", cause)
        };
        E2eError::AuthenticationFailed { reason }
    }
}

impl<'c> Scenario<'c, Dashboard> {
    pub async fn open_inventory(self) -> E2eResult<Scenario<'c, Listing>> {
        let ctx = self.ctx;
        let config = ctx.config;
        let ui = ctx.ui();

        let open = if config.routes.inventory_via_link {
            Step::click("follow inventory link", &ui.inventory_link)
        } else {
            Step::navigate("open inventory", config.url(&config.routes.inventory))
        };
        let steps = [
            open,
            Step::assert_visible("see catalog header", &ui.catalog_header)
                .within(config.timeouts.navigation()),
        ];
        ctx.runner().run_all(Phase::Dashboard, &steps).await?;

        ctx.enter(Phase::Listing);
        Ok(self.advance(Listing))
    }
}

impl<'c> Scenario<'c, Listing> {
    pub async fn create(self, item: &ItemSpec) -> E2eResult<Scenario<'c, Created>> {
        let ctx = self.ctx;
        let ui = ctx.ui();
        ctx.enter(Phase::Creating);
        ctx.ensure_unlisted(&item.name).await?;

        let mut steps = vec![
            Step::click("open create form", &ui.add_button),
            Step::assert_visible("see create form", &ui.create_title),
            Step::fill("enter name", &ui.name_field, &item.name),
            Step::select("choose category", &ui.category_field, &item.category),
            Step::fill("enter minimum stock", &ui.min_stock_field, item.min_stock.to_string()),
        ];
        if let Some(description) = &item.description {
            steps.push(Step::fill("enter description", &ui.description_field, description));
        }
        steps.extend([
            Step::click("save new item", &ui.save_new),
            Step::assert_hidden("create form closed", &ui.create_title),
            Step::assert_visible("new item listed", &ui.listing_entry(&item.name)),
        ]);
        ctx.runner().run_all(Phase::Creating, &steps).await?;

        ctx.enter(Phase::Created);
        Ok(self.advance(Created {
            name: item.name.clone(),
        }))
    }
}

impl<'c> Scenario<'c, Created> {
    /// Rename the item. Both the new name showing up and the old one going
    /// away are asserted; either alone would also pass for a duplicated row.
    pub async fn edit(self, new_name: &str) -> E2eResult<Scenario<'c, Edited>> {
        let ctx = self.ctx;
        let ui = ctx.ui();
        let old_name = self.state.name.as_str();
        ctx.enter(Phase::Editing);
        ctx.ensure_unlisted(new_name).await?;

        let steps = [
            Step::click("open edit form", &ui.edit_action.in_row(old_name)),
            Step::assert_visible("see edit form", &ui.edit_title),
            Step::fill("change name", &ui.name_field, new_name),
            Step::click("save changes", &ui.save_changes),
            Step::assert_hidden("edit form closed", &ui.edit_title),
            Step::assert_visible("new name listed", &ui.listing_entry(new_name)),
            Step::assert_hidden("old name gone", &ui.listing_entry(old_name)),
        ];
        ctx.runner().run_all(Phase::Editing, &steps).await?;

        ctx.enter(Phase::Edited);
        Ok(self.advance(Edited {
            name: new_name.to_string(),
        }))
    }
}

impl<'c> Scenario<'c, Edited> {
    /// Open the detail view and prove the name cannot be changed there.
    pub async fn view(self) -> E2eResult<Scenario<'c, Viewed>> {
        let ctx = self.ctx;
        let ui = ctx.ui();
        let name = self.state.name.as_str();
        ctx.enter(Phase::Viewing);

        let steps = [
            Step::click("open detail view", &ui.view_action.in_row(name)),
            Step::assert_visible("see detail view", &ui.view_title),
            Step::assert_disabled("name is read-only", &ui.name_field),
        ];
        ctx.runner().run_all(Phase::Viewing, &steps).await?;

        ctx.enter(Phase::Viewed);
        let name = self.state.name.clone();
        Ok(self.advance(Viewed { name }))
    }
}

impl<'c> Scenario<'c, Viewed> {
    /// Close the detail view, delete the item and confirm it stays gone.
    pub async fn delete(self) -> E2eResult<Scenario<'c, Deleted>> {
        let ctx = self.ctx;
        let config = ctx.config;
        let ui = ctx.ui();
        let name = self.state.name.as_str();
        ctx.enter(Phase::Deleting);
        let runner = ctx.runner();

        let close = [
            Step::click("close detail view", &ui.close_details),
            Step::assert_hidden("detail view closed", &ui.view_title),
        ];
        runner.run_all(Phase::Deleting, &close).await?;

        ctx.session.arm_dialogs().await?;
        ctx.session.dialogs().expect_next("confirm deletion");
        runner
            .run(Phase::Deleting, &Step::click("delete item", &ui.delete_action.in_row(name)))
            .await?;

        // The list reloads wholesale after the confirmation, with no interim
        // state to wait on.
        ctx.waits
            .settle(config.timeouts.settle(), "catalog list reload after delete")
            .await;

        let gone = Step::assert_gone(
            "item no longer listed",
            &ui.listing_entry(name),
            config.timeouts.stability(),
        );
        runner.run(Phase::Deleting, &gone).await?;

        if let Some(step) = ctx.session.dialogs().clear_expectation() {
            warn!(step = %step, "No confirmation dialog appeared during deletion");
        }

        ctx.enter(Phase::Deleted);
        let name = self.state.name.clone();
        Ok(self.advance(Deleted { name }))
    }
}

impl<'c> Scenario<'c, Deleted> {
    pub fn item(&self) -> &str {
        &self.state.name
    }
}

/// Run the whole scenario for `ctx`'s configured item.
pub async fn run_crud(ctx: &FlowContext<'_>) -> E2eResult<()> {
    let item = &ctx.config.item;
    let deleted = Scenario::start(ctx)
        .authenticate()
        .await?
        .open_inventory()
        .await?
        .create(item)
        .await?
        .edit(&item.renamed)
        .await?
        .view()
        .await?
        .delete()
        .await?;
    debug!(item = deleted.item(), "CRUD scenario complete");
    Ok(())
}
