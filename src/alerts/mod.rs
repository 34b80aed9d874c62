pub mod classify;

pub use classify::{Classification, Counts};

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::platform::{Alert, AlertState, Platform, PlatformError};

#[derive(Debug, Error)]
pub enum AlertsError {
    #[error("Failed to fetch code-scanning alerts: {0}")]
    Fetch(#[from] PlatformError),
}

/// Fetch the pull request's code-scanning alerts produced by `tool_name`.
///
/// The tool name must match exactly. Alerts already fixed by a later commit
/// are not findings and are dropped. An empty result is a normal outcome.
#[instrument(skip(platform))]
pub async fn fetch(
    platform: &dyn Platform,
    pr: u64,
    tool_name: &str,
) -> Result<Vec<Alert>, AlertsError> {
    let all = platform.code_scanning_alerts(pr).await?;
    let fetched = all.len();

    let alerts: Vec<Alert> = all
        .into_iter()
        .filter(|a| a.tool == tool_name)
        .filter(|a| {
            let kept = matches!(a.state, AlertState::Open | AlertState::Dismissed);
            if !kept {
                debug!(number = a.number, state = %a.state, "dropping alert");
            }
            kept
        })
        .collect();

    debug!(fetched, kept = alerts.len(), "filtered alerts by tool and state");
    info!(alerts = alerts.len(), "fetched alerts");
    Ok(alerts)
}
