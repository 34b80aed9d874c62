use thiserror::Error;
use tracing::{info, instrument};

use crate::platform::{Platform, PlatformError, WorkflowRun};

#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("No completed run of {workflow} found for branch {branch}")]
    NoMatchingRun { workflow: String, branch: String },

    #[error("Latest run of {workflow} on {branch} concluded {conclusion:?}, expected success ({url})")]
    NotSuccessful {
        workflow: String,
        branch: String,
        conclusion: Option<String>,
        url: String,
    },

    #[error("Failed to list workflow runs: {0}")]
    Platform(#[from] PlatformError),
}

/// Require that the latest completed run of `workflow` on `branch` succeeded.
///
/// Alerts are only meaningful once the analysis for this branch has
/// finished, so anything else aborts the gate before it has side effects.
#[instrument(skip(platform))]
pub async fn check(
    platform: &dyn Platform,
    workflow: &str,
    branch: &str,
) -> Result<WorkflowRun, PreconditionError> {
    let runs = platform.completed_workflow_runs(workflow, branch).await?;

    let latest = runs
        .into_iter()
        .filter(|run| run.head_branch.as_deref() == Some(branch))
        .max_by(|a, b| a.created_at.cmp(&b.created_at))
        .ok_or_else(|| PreconditionError::NoMatchingRun {
            workflow: workflow.to_string(),
            branch: branch.to_string(),
        })?;

    if latest.conclusion.as_deref() != Some("success") {
        return Err(PreconditionError::NotSuccessful {
            workflow: workflow.to_string(),
            branch: branch.to_string(),
            conclusion: latest.conclusion,
            url: latest.html_url,
        });
    }

    info!(run_id = latest.id, url = %latest.html_url, "upstream analysis succeeded");
    Ok(latest)
}
