//! Chromium backend over the DevTools protocol

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    EnableParams, EventConsoleApiCalled, EventExceptionThrown, RemoteObject,
};
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BrowserSettings;
use crate::dialog::{DialogEvent, DialogInterceptor};
use crate::driver::{ElementInfo, PageDriver, Probe};
use crate::error::{E2eError, E2eResult};
use crate::locator::{Choice, Query};
use crate::script;

/// Console lines kept for the failure bundle.
const CONSOLE_BUFFER: usize = 2000;

#[derive(Debug, Deserialize)]
struct Outcome {
    count: usize,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Inspection {
    count: usize,
    #[serde(default)]
    info: Option<ElementInfo>,
}

pub struct ChromiumDriver {
    browser: tokio::sync::Mutex<Option<Browser>>,
    page: Page,
    handler: JoinHandle<()>,
    dialog_task: Mutex<Option<JoinHandle<()>>>,
    console_tasks: Mutex<Vec<JoinHandle<()>>>,
    console: Arc<Mutex<VecDeque<String>>>,
    navigation_timeout: Duration,
}

impl ChromiumDriver {
    /// Launch a browser and open one blank page.
    pub async fn launch(settings: &BrowserSettings, navigation_timeout: Duration) -> E2eResult<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(settings.viewport_width, settings.viewport_height)
            .viewport(None);
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &settings.executable {
            builder = builder.chrome_executable(executable);
        }
        for arg in &settings.args {
            builder = builder.arg(arg.as_str());
        }
        let config = builder.build().map_err(E2eError::BrowserLaunch)?;

        info!(headless = settings.headless, "Launching Chromium");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| E2eError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!("CDP handler loop ended");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(E2eError::BrowserLaunch(format!("cannot open page: {}", e)));
            }
        };

        Ok(Self {
            browser: tokio::sync::Mutex::new(Some(browser)),
            page,
            handler,
            dialog_task: Mutex::new(None),
            console_tasks: Mutex::new(Vec::new()),
            console: Arc::new(Mutex::new(VecDeque::with_capacity(CONSOLE_BUFFER))),
            navigation_timeout,
        })
    }

    async fn eval<T: DeserializeOwned>(&self, expression: String) -> E2eResult<T> {
        let json: String = self
            .page
            .evaluate(expression)
            .await
            .map_err(E2eError::driver)?
            .into_value()?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Tag the unique match of `query` and hand it to CDP.
    async fn element(&self, query: &Query) -> E2eResult<Element> {
        let token = Uuid::new_v4().simple().to_string();
        let outcome: Outcome = self.eval(script::mark(query, &token)?).await?;
        if !outcome.ok {
            return Err(not_unique(query, outcome.count));
        }
        self.page
            .find_element(script::marked(&token))
            .await
            .map_err(E2eError::driver)
    }

    fn push_console(buffer: &Mutex<VecDeque<String>>, line: String) {
        info!(target: "browser_console", "{}", line);
        let mut lines = buffer.lock();
        if lines.len() == CONSOLE_BUFFER {
            lines.pop_front();
        }
        lines.push_back(line);
    }
}

fn not_unique(query: &Query, count: usize) -> E2eError {
    if count == 0 {
        E2eError::ElementNotFound {
            reference: query.to_string(),
            tried: query.to_string(),
        }
    } else {
        E2eError::AmbiguousMatch {
            reference: query.to_string(),
            count,
        }
    }
}

fn checked(query: &Query, outcome: Outcome) -> E2eResult<()> {
    if outcome.count != 1 {
        return Err(not_unique(query, outcome.count));
    }
    if !outcome.ok {
        return Err(E2eError::Driver(format!(
            "{}: {}",
            query,
            outcome.reason.unwrap_or_else(|| "rejected".to_string())
        )));
    }
    Ok(())
}

fn render_arg(arg: &RemoteObject) -> String {
    match (&arg.value, &arg.description) {
        (Some(serde_json::Value::String(s)), _) => s.clone(),
        (Some(value), _) => value.to_string(),
        (None, Some(description)) => description.clone(),
        (None, None) => String::new(),
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        debug!(url, "Navigating");
        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(E2eError::Driver(format!("navigation to {} failed: {}", url, e))),
            Err(_) => {
                // In-document (hash) navigations may never report a load
                let current = self.current_url().await?;
                if current == url {
                    Ok(())
                } else {
                    Err(E2eError::WaitTimeout {
                        condition: format!("navigation to {}", url),
                        elapsed: self.navigation_timeout,
                    })
                }
            }
        }
    }

    async fn current_url(&self) -> E2eResult<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(E2eError::driver)?
            .unwrap_or_default())
    }

    async fn probe(&self, query: &Query) -> E2eResult<Probe> {
        self.eval(script::probe(query)?).await
    }

    async fn inspect(&self, query: &Query) -> E2eResult<ElementInfo> {
        let inspection: Inspection = self.eval(script::inspect(query)?).await?;
        match inspection.info {
            Some(info) if inspection.count == 1 => Ok(info),
            _ => Err(not_unique(query, inspection.count)),
        }
    }

    async fn click(&self, query: &Query) -> E2eResult<()> {
        let element = self.element(query).await?;
        element.click().await.map_err(E2eError::driver)?;
        Ok(())
    }

    async fn fill(&self, query: &Query, value: &str) -> E2eResult<()> {
        let outcome: Outcome = self.eval(script::fill(query, value)?).await?;
        checked(query, outcome)
    }

    async fn type_text(&self, query: &Query, text: &str) -> E2eResult<()> {
        let element = self.element(query).await?;
        element.click().await.map_err(E2eError::driver)?;
        element.type_str(text).await.map_err(E2eError::driver)?;
        Ok(())
    }

    async fn select_native(&self, query: &Query, choice: &Choice) -> E2eResult<()> {
        let outcome: Outcome = self.eval(script::select_native(query, choice)?).await?;
        checked(query, outcome)
    }

    async fn install_dialog_handler(&self, interceptor: Arc<DialogInterceptor>) -> E2eResult<()> {
        let mut events = self
            .page
            .event_listener::<EventJavascriptDialogOpening>()
            .await
            .map_err(E2eError::driver)?;
        let page = self.page.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let kind = format!("{:?}", event.r#type).to_lowercase();
                let response = interceptor.on_dialog(DialogEvent::new(kind, event.message.clone()));
                if let Err(e) = page
                    .execute(HandleJavaScriptDialogParams::new(response.accepts()))
                    .await
                {
                    warn!("Failed to answer dialog: {}", e);
                }
            }
        });

        if let Some(previous) = self.dialog_task.lock().replace(task) {
            previous.abort();
        }
        Ok(())
    }

    async fn remove_dialog_handler(&self) -> E2eResult<()> {
        if let Some(task) = self.dialog_task.lock().take() {
            task.abort();
        }
        Ok(())
    }

    async fn capture_console(&self) -> E2eResult<()> {
        self.page
            .execute(EnableParams::default())
            .await
            .map_err(E2eError::driver)?;

        let mut calls = self
            .page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .map_err(E2eError::driver)?;
        let mut exceptions = self
            .page
            .event_listener::<EventExceptionThrown>()
            .await
            .map_err(E2eError::driver)?;

        let buffer = self.console.clone();
        let console_task = tokio::spawn(async move {
            while let Some(event) = calls.next().await {
                let text = event.args.iter().map(render_arg).collect::<Vec<_>>().join(" ");
                let level = format!("{:?}", event.r#type).to_lowercase();
                Self::push_console(&buffer, format!("[{}] {}", level, text));
            }
        });

        let buffer = self.console.clone();
        let exception_task = tokio::spawn(async move {
            while let Some(event) = exceptions.next().await {
                let details = &event.exception_details;
                let description = details
                    .exception
                    .as_ref()
                    .and_then(|e| e.description.clone())
                    .unwrap_or_default();
                Self::push_console(&buffer, format!("[exception] {} {}", details.text, description));
            }
        });

        self.console_tasks.lock().extend([console_task, exception_task]);
        Ok(())
    }

    fn console_lines(&self) -> Vec<String> {
        self.console.lock().iter().cloned().collect()
    }

    async fn screenshot(&self, path: &Path) -> E2eResult<()> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page
            .save_screenshot(params, path)
            .await
            .map_err(E2eError::driver)?;
        Ok(())
    }

    async fn content(&self) -> E2eResult<String> {
        self.page.content().await.map_err(E2eError::driver)
    }

    async fn close(&self) -> E2eResult<()> {
        if let Some(task) = self.dialog_task.lock().take() {
            task.abort();
        }
        for task in self.console_tasks.lock().drain(..) {
            task.abort();
        }

        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        let closed = browser.close().await.map_err(E2eError::driver);
        if let Err(e) = browser.wait().await {
            warn!("Browser process did not exit cleanly: {}", e);
        }
        self.handler.abort();
        closed.map(|_| ())
    }
}
