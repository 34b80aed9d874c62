pub mod render;

pub use render::render_body;

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::alerts::Classification;
use crate::platform::{Platform, PlatformError};

/// First line of the status comment. The comment is found again on every
/// run by this prefix, so the same constant drives both search and creation.
pub const COMMENT_MARKER: &str = "### 🤖 GitHub Action: Security Alerts Review";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to publish status comment: {0}")]
    Platform(#[from] PlatformError),
}

/// What happened to the status comment on this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentAction {
    Created(u64),
    Updated(u64),
    /// Nothing to report and no earlier comment to refresh
    Skipped,
}

/// Render the classification and publish it as the PR's status comment.
///
/// A PR with no alerts at all and no earlier status comment is left alone;
/// once a comment exists it is refreshed on every run.
#[instrument(skip(platform, classification), fields(alerts = classification.total()))]
pub async fn publish(
    platform: &dyn Platform,
    pr: u64,
    classification: &Classification,
) -> Result<CommentAction, ReportError> {
    let body = render_body(classification);
    let existing = find_status_comment(platform, pr).await?;

    let action = match existing {
        Some(id) => {
            platform.update_issue_comment(id, &body).await?;
            CommentAction::Updated(id)
        }
        None if classification.total() == 0 => CommentAction::Skipped,
        None => {
            let created = platform.create_issue_comment(pr, &body).await?;
            CommentAction::Created(created.id)
        }
    };

    info!(?action, "status comment published");
    Ok(action)
}

async fn find_status_comment(platform: &dyn Platform, pr: u64) -> Result<Option<u64>, ReportError> {
    let comments = platform.issue_comments(pr).await?;
    let found = comments
        .iter()
        .find(|c| c.body.starts_with(COMMENT_MARKER))
        .map(|c| c.id);
    debug!(comments = comments.len(), found = ?found, "searched for status comment");
    Ok(found)
}
