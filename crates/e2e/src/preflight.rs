//! Reachability check before a browser is launched

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll `url` until it answers with anything but a server error.
///
/// Returns the number of attempts it took.
pub async fn wait_for_app(url: &str, limit: Duration) -> E2eResult<usize> {
    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        match client.get(url).send().await {
            Ok(resp) if !resp.status().is_server_error() => {
                info!(url, attempts, status = %resp.status(), "Application reachable");
                return Ok(attempts);
            }
            Ok(resp) => {
                warn!(url, "Preflight returned {}", resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!(url, "Waiting for application...");
                }
                // Connection refused is expected while the app is starting
                if !e.is_connect() {
                    warn!(url, "Preflight error: {}", e);
                }
            }
        }

        if start.elapsed() + POLL_INTERVAL >= limit {
            break;
        }
        sleep(POLL_INTERVAL).await;
    }

    Err(E2eError::AppUnreachable {
        url: url.to_string(),
        attempts,
    })
}
