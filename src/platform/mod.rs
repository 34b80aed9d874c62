pub mod github;
pub mod types;

#[cfg(test)]
pub mod fake;

pub use github::GitHubClient;
pub use types::{Alert, AlertState, WorkflowRun};

use async_trait::async_trait;
use types::{IssueComment, PullRequestFile, PullRequestMeta, Review};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("GitHub API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub GraphQL request failed: {0}")]
    GraphQl(String),

    #[error("GitHub token not found in config or environment")]
    MissingToken,

    #[error("Invalid repository slug: {0:?} (expected owner/name)")]
    InvalidRepository(String),

    #[cfg(test)]
    #[error("{0} unavailable")]
    Unavailable(String),
}

/// Every call the gates make against the review platform, scoped to one
/// repository. The platform is an external, eventually-consistent store:
/// calls are not retried and a failure aborts the caller.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Completed runs of `workflow` on `branch`, newest first.
    async fn completed_workflow_runs(
        &self,
        workflow: &str,
        branch: &str,
    ) -> Result<Vec<WorkflowRun>, PlatformError>;

    /// All code-scanning alerts on the pull request's merge ref, every tool.
    async fn code_scanning_alerts(&self, pr: u64) -> Result<Vec<Alert>, PlatformError>;

    async fn issue_comments(&self, pr: u64) -> Result<Vec<IssueComment>, PlatformError>;

    async fn create_issue_comment(&self, pr: u64, body: &str)
        -> Result<IssueComment, PlatformError>;

    async fn update_issue_comment(&self, id: u64, body: &str)
        -> Result<IssueComment, PlatformError>;

    async fn pull_request(&self, pr: u64) -> Result<PullRequestMeta, PlatformError>;

    /// Files changed by the pull request, with rename sources.
    async fn pull_request_files(&self, pr: u64) -> Result<Vec<PullRequestFile>, PlatformError>;

    async fn convert_to_draft(&self, node_id: &str) -> Result<(), PlatformError>;

    async fn pull_request_reviews(&self, pr: u64) -> Result<Vec<Review>, PlatformError>;

    /// Logins of the current members of `org/team`.
    async fn team_members(&self, org: &str, team: &str) -> Result<Vec<String>, PlatformError>;
}
