//! Scenario configuration, parsed from YAML
//!
//! Every field has a default, so an empty document describes the reference
//! run: log in as `admin`, create "Test Chemical 123" (CHEMICAL, minimum
//! stock 10), rename it to "Test Chemical Updated", view it, delete it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{E2eError, E2eResult};
use crate::locator::Choice;
use crate::ui::UiMap;
use crate::wait::UrlPattern;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Where the catalog app is served
    pub base_url: String,

    pub routes: Routes,

    pub credentials: Credentials,

    /// The item created, renamed, viewed and deleted
    pub item: ItemSpec,

    pub timeouts: Timeouts,

    pub artifacts: ArtifactConfig,

    pub browser: BrowserSettings,

    pub preflight: PreflightConfig,

    /// Allow "n-th button in the row" lookups when no accessible name,
    /// label or title matches. Off by default.
    pub allow_positional_fallback: bool,

    pub ui: UiMap,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            routes: Routes::default(),
            credentials: Credentials::default(),
            item: ItemSpec::default(),
            timeouts: Timeouts::default(),
            artifacts: ArtifactConfig::default(),
            browser: BrowserSettings::default(),
            preflight: PreflightConfig::default(),
            allow_positional_fallback: false,
            ui: UiMap::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Routes {
    pub login: String,
    pub inventory: String,
    /// URL the app lands on after a successful login
    pub dashboard: Option<UrlPattern>,
    /// Reach the inventory by clicking the navigation link instead of
    /// loading its URL directly
    pub inventory_via_link: bool,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            login: "/#/login".to_string(),
            inventory: "/#/inventory".to_string(),
            dashboard: UrlPattern::new("**/#/").ok(),
            inventory_via_link: false,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemSpec {
    pub name: String,
    pub renamed: String,
    pub category: Choice,
    pub min_stock: u32,
    pub description: Option<String>,
}

impl Default for ItemSpec {
    fn default() -> Self {
        Self {
            name: "Test Chemical 123".to_string(),
            renamed: "Test Chemical Updated".to_string(),
            category: Choice::new("CHEMICAL", "Químico"),
            min_stock: 10,
            description: None,
        }
    }
}

impl ItemSpec {
    /// Append `suffix` to both names, to keep concurrent runs apart.
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.name = format!("{} {}", self.name, suffix);
        self.renamed = format!("{} {}", self.renamed, suffix);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Default wait after a step
    pub step_ms: u64,
    /// Page loads and route changes
    pub navigation_ms: u64,
    /// Reaching the dashboard after submitting credentials
    pub auth_ms: u64,
    /// Poll interval, clamped to 100..=250 ms
    pub poll_interval_ms: u64,
    /// How long a deleted item must stay absent
    pub stability_ms: u64,
    /// Fixed pause after the delete confirmation; 0 disables it
    pub settle_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            step_ms: 5_000,
            navigation_ms: 10_000,
            auth_ms: 10_000,
            poll_interval_ms: 200,
            stability_ms: 500,
            settle_ms: 0,
        }
    }
}

impl Timeouts {
    pub fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn auth(&self) -> Duration {
        Duration::from_millis(self.auth_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stability(&self) -> Duration {
        Duration::from_millis(self.stability_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Root directory; each run writes under `<dir>/<run_id>/`
    pub dir: PathBuf,
    /// Fixed run id; generated when absent
    pub run_id: Option<String>,
    /// Dump rendered markup next to the failure screenshot
    pub capture_markup: bool,
    /// Also screenshot green runs
    pub capture_on_success: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("test-results"),
            run_id: None,
            capture_markup: true,
            capture_on_success: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Chrome/Chromium binary; auto-detected when absent
    pub executable: Option<PathBuf>,
    pub args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            executable: None,
            args: vec!["--no-sandbox".to_string(), "--no-first-run".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreflightConfig {
    pub enabled: bool,
    pub timeout_ms: u64,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 30_000,
        }
    }
}

impl ScenarioConfig {
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        // An empty document deserializes as unit, not as a map
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load `path` if given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> E2eResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Absolute URL for an app route.
    pub fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), route)
    }

    pub fn validate(&self) -> E2eResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(E2eError::InvalidConfig(format!(
                "base_url must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.item.name.trim().is_empty() || self.item.renamed.trim().is_empty() {
            return Err(E2eError::InvalidConfig("item names must not be empty".to_string()));
        }
        if self.item.name == self.item.renamed {
            return Err(E2eError::InvalidConfig(
                "item.renamed must differ from item.name, or the rename cannot be observed".to_string(),
            ));
        }
        if self.item.renamed.contains(&self.item.name) || self.item.name.contains(&self.item.renamed) {
            return Err(E2eError::InvalidConfig(
                "one item name contains the other; listing rows could not be told apart".to_string(),
            ));
        }
        let t = &self.timeouts;
        if t.step_ms == 0 || t.navigation_ms == 0 || t.auth_ms == 0 {
            return Err(E2eError::InvalidConfig("timeouts must be greater than zero".to_string()));
        }
        if self.credentials.username.is_empty() {
            return Err(E2eError::InvalidConfig("credentials.username is empty".to_string()));
        }
        Ok(())
    }
}
