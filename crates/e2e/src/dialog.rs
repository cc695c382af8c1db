//! Native dialog interception
//!
//! The interceptor is owned by a [`Session`](crate::session::Session) and
//! installed on its page once. Every native dialog is accepted so the page
//! can never block on one; dialogs that arrive while no step announced one
//! are recorded and logged as anomalies.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::E2eError;

/// A native dialog raised by the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogEvent {
    /// `alert`, `confirm`, `prompt` or `beforeunload`
    pub kind: String,
    pub message: String,
}

impl DialogEvent {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogResponse {
    Accept,
    Dismiss,
}

impl DialogResponse {
    pub fn accepts(self) -> bool {
        matches!(self, DialogResponse::Accept)
    }
}

/// What happened to one dialog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogRecord {
    pub event: DialogEvent,
    pub response: DialogResponse,
    /// Step that announced the dialog; `None` for anomalies
    pub expected_by: Option<String>,
    pub at: DateTime<Utc>,
}

impl DialogRecord {
    pub fn is_anomaly(&self) -> bool {
        self.expected_by.is_none()
    }
}

#[derive(Debug, Default)]
pub struct DialogInterceptor {
    armed: AtomicBool,
    expecting: Mutex<Option<String>>,
    records: Mutex<Vec<DialogRecord>>,
}

impl DialogInterceptor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark the interceptor armed. Returns `true` only on the first call,
    /// when the caller must install it on the page.
    pub fn arm(&self) -> bool {
        !self.armed.swap(true, Ordering::SeqCst)
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
        self.expecting.lock().take();
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Announce that `step` is about to trigger a dialog.
    pub fn expect_next(&self, step: &str) {
        *self.expecting.lock() = Some(step.to_string());
    }

    /// Drop an expectation that was not consumed. Returns the step name if
    /// one was still pending.
    pub fn clear_expectation(&self) -> Option<String> {
        self.expecting.lock().take()
    }

    /// Decide how to answer `event`. Always accepts while armed.
    pub fn on_dialog(&self, event: DialogEvent) -> DialogResponse {
        if !self.is_armed() {
            warn!(kind = %event.kind, message = %event.message, "Dialog after disarm, dismissing");
            return DialogResponse::Dismiss;
        }

        let expected_by = self.expecting.lock().take();
        match &expected_by {
            Some(step) => info!(step = %step, kind = %event.kind, "Accepting expected dialog"),
            None => {
                let anomaly = E2eError::UnexpectedDialog {
                    kind: event.kind.clone(),
                    message: event.message.clone(),
                };
                warn!("{}; accepting so the page does not block", anomaly);
            }
        }

        self.records.lock().push(DialogRecord {
            event,
            response: DialogResponse::Accept,
            expected_by,
            at: Utc::now(),
        });
        DialogResponse::Accept
    }

    pub fn records(&self) -> Vec<DialogRecord> {
        self.records.lock().clone()
    }

    pub fn anomalies(&self) -> Vec<DialogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.is_anomaly())
            .cloned()
            .collect()
    }
}
