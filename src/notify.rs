use serde_json::json;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::pr::ChangedFile;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("No webhook URL configured (set notify.webhook_url or NOTIFY_WEBHOOK_URL)")]
    MissingWebhook,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    NothingWatched,
    Sent { paths: Vec<String> },
    /// The webhook rejected or never received the message
    SendFailed { paths: Vec<String>, reason: String },
}

/// Changed files that match a watched path (exact file, or directory
/// prefix when the entry ends in '/').
pub fn watched_changes<'a>(watched: &[String], changed: &'a [ChangedFile]) -> Vec<&'a ChangedFile> {
    changed
        .iter()
        .filter(|file| watched.iter().any(|pattern| file.touches(pattern)))
        .collect()
}

/// Post `message` to the webhook when a watched path changed.
/// Delivery is fire-and-forget: a failed send is logged, not raised.
#[instrument(skip(client, webhook_url, message, changed), fields(files = changed.len()))]
pub async fn notify_on_change(
    client: &reqwest::Client,
    webhook_url: Option<&str>,
    message: &str,
    watched: &[String],
    changed: &[ChangedFile],
) -> Result<NotifyOutcome, NotifyError> {
    let paths: Vec<String> = watched_changes(watched, changed)
        .into_iter()
        .map(|file| file.path.clone())
        .collect();
    if paths.is_empty() {
        info!("no watched configuration changed");
        return Ok(NotifyOutcome::NothingWatched);
    }

    let url = webhook_url.ok_or(NotifyError::MissingWebhook)?;
    info!(paths = ?paths, "watched configuration changed, sending notification");

    let sent = client
        .post(url)
        .json(&json!({ "text": message }))
        .send()
        .await
        .and_then(|response| response.error_for_status());

    match sent {
        Ok(_) => Ok(NotifyOutcome::Sent { paths }),
        Err(err) => {
            warn!(error = %err, "webhook notification failed");
            Ok(NotifyOutcome::SendFailed {
                paths,
                reason: err.to_string(),
            })
        }
    }
}
