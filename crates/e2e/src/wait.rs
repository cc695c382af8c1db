//! Wait coordination
//!
//! Every state-changing step is followed by a wait on the condition that
//! proves the change landed. The driver's native wait is used when it has
//! one; otherwise the condition is polled at a bounded interval. Either way
//! the whole wait runs under a single timeout, so a hung page surfaces as
//! `WaitTimeout` instead of blocking the run.

use std::fmt;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

use crate::driver::{NativeWait, PageDriver};
use crate::error::{E2eError, E2eResult};
use crate::locator::{ElementRef, Query, Strategy};
use crate::resolver::SelectorResolver;

/// Poll interval bounds.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// URL glob: `**` matches anything, `*` anything but `/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UrlPattern {
    glob: String,
    regex: Regex,
}

impl UrlPattern {
    pub fn new(glob: &str) -> E2eResult<Self> {
        let mut pattern = String::from("^");
        let mut chars = glob.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '*' {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    pattern.push_str(".*");
                } else {
                    pattern.push_str("[^/]*");
                }
            } else {
                pattern.push_str(&regex::escape(&c.to_string()));
            }
        }
        pattern.push('$');

        let regex = Regex::new(&pattern)
            .map_err(|e| E2eError::InvalidConfig(format!("bad URL pattern '{}': {}", glob, e)))?;
        Ok(Self {
            glob: glob.to_string(),
            regex,
        })
    }

    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    pub fn as_str(&self) -> &str {
        &self.glob
    }
}

impl PartialEq for UrlPattern {
    fn eq(&self, other: &Self) -> bool {
        self.glob == other.glob
    }
}

impl TryFrom<String> for UrlPattern {
    type Error = E2eError;

    fn try_from(glob: String) -> Result<Self, Self::Error> {
        Self::new(&glob)
    }
}

impl From<UrlPattern> for String {
    fn from(pattern: UrlPattern) -> Self {
        pattern.glob
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.glob)
    }
}

/// Something the page must eventually show.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Exactly one match, and it is visible
    Visible(ElementRef),
    /// No visible match (absent or hidden)
    Hidden(ElementRef),
    UrlMatches(UrlPattern),
    /// Some visible element contains the text
    TextPresent(String),
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Visible(target) => write!(f, "{} visible", target),
            Condition::Hidden(target) => write!(f, "{} hidden", target),
            Condition::UrlMatches(pattern) => write!(f, "URL matches '{}'", pattern),
            Condition::TextPresent(text) => write!(f, "text '{}' present", text),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WaitCoordinator {
    resolver: SelectorResolver,
    poll_interval: Duration,
}

impl WaitCoordinator {
    pub fn new(resolver: SelectorResolver, poll_interval: Duration) -> Self {
        Self {
            resolver,
            poll_interval: poll_interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Block until `condition` holds, returning how long it took.
    pub async fn await_condition(
        &self,
        driver: &dyn PageDriver,
        condition: &Condition,
        limit: Duration,
    ) -> E2eResult<Duration> {
        let start = Instant::now();
        debug!(condition = %condition, timeout_ms = limit.as_millis() as u64, "Waiting");

        match driver.wait_native(condition, limit).await? {
            NativeWait::Satisfied => return Ok(start.elapsed()),
            NativeWait::TimedOut => {
                return Err(E2eError::WaitTimeout {
                    condition: condition.to_string(),
                    elapsed: start.elapsed(),
                })
            }
            NativeWait::Unsupported => {}
        }

        let remaining = limit.saturating_sub(start.elapsed());
        match timeout(remaining, self.poll_until(driver, condition)).await {
            Ok(Ok(())) => {
                let elapsed = start.elapsed();
                debug!(condition = %condition, elapsed_ms = elapsed.as_millis() as u64, "Condition met");
                Ok(elapsed)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(E2eError::WaitTimeout {
                condition: condition.to_string(),
                elapsed: start.elapsed(),
            }),
        }
    }

    /// Wait for `condition`, then require it to keep holding for `window`.
    pub async fn await_stable(
        &self,
        driver: &dyn PageDriver,
        condition: &Condition,
        window: Duration,
        limit: Duration,
    ) -> E2eResult<Duration> {
        let start = Instant::now();
        self.await_condition(driver, condition, limit).await?;

        let held_since = Instant::now();
        while held_since.elapsed() < window {
            sleep(self.poll_interval).await;
            if !self.check(driver, condition).await? {
                return Err(E2eError::WaitTimeout {
                    condition: format!("{} to stay true for {:?}", condition, window),
                    elapsed: start.elapsed(),
                });
            }
        }
        Ok(start.elapsed())
    }

    /// Fixed pause for transitions with no observable interim state.
    ///
    /// Not a substitute for a wait: callers still wait on the resulting
    /// condition afterwards.
    pub async fn settle(&self, delay: Duration, reason: &str) {
        if delay.is_zero() {
            return;
        }
        info!(delay_ms = delay.as_millis() as u64, reason, "Settle delay");
        sleep(delay).await;
    }

    async fn poll_until(&self, driver: &dyn PageDriver, condition: &Condition) -> E2eResult<()> {
        loop {
            if self.check(driver, condition).await? {
                return Ok(());
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Evaluate `condition` once.
    pub async fn check(&self, driver: &dyn PageDriver, condition: &Condition) -> E2eResult<bool> {
        match condition {
            Condition::Visible(target) => {
                let sighting = self.resolver.locate(driver, target).await?;
                if sighting.probe.matches > 1 {
                    return Err(E2eError::AmbiguousMatch {
                        reference: target.to_string(),
                        count: sighting.probe.matches,
                    });
                }
                Ok(sighting.probe.visible == 1)
            }
            Condition::Hidden(target) => {
                let sighting = self.resolver.locate(driver, target).await?;
                Ok(sighting.probe.visible == 0)
            }
            Condition::UrlMatches(pattern) => {
                let url = driver.current_url().await?;
                Ok(pattern.matches(&url))
            }
            Condition::TextPresent(text) => {
                let query = Query::new(Strategy::Text { text: text.clone() });
                Ok(driver.probe(&query).await?.visible > 0)
            }
        }
    }
}
