//! Page-automation boundary
//!
//! The engine talks to the browser only through [`PageDriver`]. Every call
//! takes a [`Query`] and re-resolves it against the live page.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dialog::DialogInterceptor;
use crate::error::E2eResult;
use crate::locator::{Choice, Query};
use crate::wait::Condition;

/// Match counts for a query at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    pub matches: usize,
    pub visible: usize,
}

/// State of a uniquely matched element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub tag: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub visible: bool,
}

impl ElementInfo {
    pub fn is_native_select(&self) -> bool {
        self.tag.eq_ignore_ascii_case("select")
    }

    pub fn is_editable(&self) -> bool {
        !self.disabled && !self.read_only
    }
}

/// Result of a driver-native wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeWait {
    Satisfied,
    TimedOut,
    /// The driver cannot wait on this condition itself; poll instead.
    Unsupported,
}

#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn goto(&self, url: &str) -> E2eResult<()>;

    async fn current_url(&self) -> E2eResult<String>;

    /// Count matches of `query` and how many of them are rendered visibly.
    async fn probe(&self, query: &Query) -> E2eResult<Probe>;

    /// Describe the unique match of `query`.
    async fn inspect(&self, query: &Query) -> E2eResult<ElementInfo>;

    async fn click(&self, query: &Query) -> E2eResult<()>;

    /// Replace the value of an editable control.
    async fn fill(&self, query: &Query, value: &str) -> E2eResult<()>;

    /// Type into the control the way a user would, without clearing it first.
    async fn type_text(&self, query: &Query, text: &str) -> E2eResult<()>;

    /// Pick an entry of a native `<select>`.
    async fn select_native(&self, query: &Query, choice: &Choice) -> E2eResult<()>;

    async fn wait_native(&self, _condition: &Condition, _timeout: Duration) -> E2eResult<NativeWait> {
        Ok(NativeWait::Unsupported)
    }

    /// Route native dialogs to `interceptor` until removed.
    async fn install_dialog_handler(&self, interceptor: Arc<DialogInterceptor>) -> E2eResult<()>;

    async fn remove_dialog_handler(&self) -> E2eResult<()>;

    /// Start collecting browser console output and uncaught exceptions.
    async fn capture_console(&self) -> E2eResult<()> {
        Ok(())
    }

    fn console_lines(&self) -> Vec<String> {
        Vec::new()
    }

    async fn screenshot(&self, path: &Path) -> E2eResult<()>;

    async fn content(&self) -> E2eResult<String>;

    async fn close(&self) -> E2eResult<()>;
}
