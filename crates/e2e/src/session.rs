//! Browser session ownership
//!
//! A [`Session`] is one page plus the dialog interceptor bound to it. It is
//! released exactly once, on every exit path, by [`Session::scoped`].

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::dialog::DialogInterceptor;
use crate::driver::PageDriver;
use crate::error::E2eResult;

pub struct Session {
    driver: Box<dyn PageDriver>,
    dialogs: Arc<DialogInterceptor>,
    closed: AtomicBool,
}

impl Session {
    pub fn new(driver: Box<dyn PageDriver>) -> Self {
        Self {
            driver,
            dialogs: DialogInterceptor::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn driver(&self) -> &dyn PageDriver {
        self.driver.as_ref()
    }

    pub fn dialogs(&self) -> &Arc<DialogInterceptor> {
        &self.dialogs
    }

    /// Install the dialog interceptor on this session's page. Safe to call
    /// again; only the first call touches the page.
    pub async fn arm_dialogs(&self) -> E2eResult<()> {
        if self.dialogs.arm() {
            debug!("Installing dialog handler");
            if let Err(e) = self.driver.install_dialog_handler(self.dialogs.clone()).await {
                self.dialogs.disarm();
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Disarm dialogs and release the browser. Idempotent.
    pub async fn close(&self) -> E2eResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.dialogs.is_armed() {
            if let Err(e) = self.driver.remove_dialog_handler().await {
                warn!("Failed to remove dialog handler: {}", e);
            }
            self.dialogs.disarm();
        }
        info!("Closing browser session");
        self.driver.close().await
    }

    /// Run `body` with this session and close it afterwards, whether `body`
    /// succeeds, fails or panics. A failure to close is logged and does not
    /// replace the body's result.
    pub async fn scoped<T, F, Fut>(self, body: F) -> T
    where
        F: FnOnce(Arc<Session>) -> Fut,
        Fut: Future<Output = T>,
    {
        let session = Arc::new(self);
        let outcome = AssertUnwindSafe(body(session.clone())).catch_unwind().await;

        if let Err(e) = session.close().await {
            warn!("Browser session did not close cleanly: {}", e);
        }

        match outcome {
            Ok(value) => value,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
