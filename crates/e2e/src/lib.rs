//! Catalog E2E - browser-driven CRUD verification for the inventory catalog
//!
//! This crate logs into the catalog UI, creates an item, renames it, checks
//! that the detail view is read-only, deletes it, and proves each step on
//! the rendered page. A failure stops the run, captures the page, and is
//! reported unchanged.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ScenarioRunner (run id, report)             │
//! │    ├── preflight::wait_for_app(base_url)                    │
//! │    ├── ChromiumDriver::launch() -> Box<dyn PageDriver>      │
//! │    └── Session::scoped(...)          closes on every path   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  DiagnosticsCollector::guard                                │
//! │    └── Scenario (typestate)                                 │
//! │          Unauthenticated -> Dashboard -> Listing            │
//! │          -> Created -> Edited -> Viewed -> Deleted          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  StepRunner                                                 │
//! │    ├── SelectorResolver   ElementRef -> unique Query        │
//! │    ├── WaitCoordinator    visible / hidden / url / text     │
//! │    └── DialogInterceptor  session-owned, accept + record    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PageDriver (trait)                                         │
//! │    └── ChromiumDriver     CDP + page-side query scripts     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod browser;
pub mod config;
pub mod diagnostics;
pub mod dialog;
pub mod driver;
pub mod error;
pub mod locator;
pub mod preflight;
pub mod resolver;
pub mod runner;
pub mod scenario;
pub mod script;
pub mod session;
pub mod steps;
pub mod ui;
pub mod wait;

pub use config::{ItemSpec, ScenarioConfig};
pub use dialog::{DialogEvent, DialogInterceptor, DialogResponse};
pub use driver::{ElementInfo, NativeWait, PageDriver, Probe};
pub use error::{E2eError, E2eResult};
pub use locator::{Choice, ElementRef, Query, Strategy};
pub use runner::{RunFailure, RunOutcome, RunReport, ScenarioRunner};
pub use scenario::Phase;
pub use wait::{Condition, UrlPattern};
