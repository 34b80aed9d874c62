use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::types::{
    Alert, AlertState, IssueComment, PullRequestFile, PullRequestMeta, Review, WorkflowRun,
};
use super::{Platform, PlatformError};
use crate::config::Config;

const USER_AGENT: &str = "security-gate";
const API_VERSION: &str = "2022-11-28";
const PAGE_SIZE: usize = 100;

const CONVERT_TO_DRAFT_MUTATION: &str = r#"
mutation($id: ID!) {
  convertPullRequestToDraft(input: { pullRequestId: $id }) {
    pullRequest { isDraft }
  }
}"#;

/// `Platform` backed by the GitHub REST and GraphQL APIs.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    graphql_url: String,
    token: String,
    owner: String,
    repo: String,
}

#[derive(Deserialize)]
struct User {
    login: String,
}

#[derive(Deserialize)]
struct RunsResponse {
    workflow_runs: Vec<RunResponse>,
}

#[derive(Deserialize)]
struct RunResponse {
    id: u64,
    head_branch: Option<String>,
    conclusion: Option<String>,
    html_url: String,
    created_at: String,
}

#[derive(Deserialize)]
struct AlertResponse {
    number: u64,
    html_url: String,
    state: String,
    dismissed_reason: Option<String>,
    dismissed_comment: Option<String>,
    tool: ToolResponse,
    #[serde(default)]
    rule: Option<RuleResponse>,
    #[serde(default)]
    most_recent_instance: Option<InstanceResponse>,
}

#[derive(Deserialize)]
struct ToolResponse {
    name: String,
}

#[derive(Deserialize)]
struct RuleResponse {
    description: Option<String>,
}

#[derive(Deserialize)]
struct InstanceResponse {
    location: Option<LocationResponse>,
    message: Option<MessageResponse>,
}

#[derive(Deserialize)]
struct LocationResponse {
    path: Option<String>,
}

#[derive(Deserialize)]
struct MessageResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct CommentResponse {
    id: u64,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Deserialize)]
struct RefResponse {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Deserialize)]
struct PullResponse {
    number: u64,
    node_id: String,
    #[serde(default)]
    draft: bool,
    head: RefResponse,
    base: RefResponse,
}

#[derive(Deserialize)]
struct FileResponse {
    filename: String,
    #[serde(default)]
    previous_filename: Option<String>,
    status: String,
}

#[derive(Deserialize)]
struct ReviewResponse {
    user: Option<User>,
    state: String,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

impl From<AlertResponse> for Alert {
    fn from(raw: AlertResponse) -> Self {
        let (path, instance_message) = match raw.most_recent_instance {
            Some(instance) => (
                instance.location.and_then(|l| l.path),
                instance.message.and_then(|m| m.text),
            ),
            None => (None, None),
        };
        let message = instance_message
            .or_else(|| raw.rule.and_then(|r| r.description))
            .unwrap_or_default();

        Alert {
            number: raw.number,
            html_url: raw.html_url,
            tool: raw.tool.name,
            path: path.unwrap_or_default(),
            message,
            state: AlertState::from_api(&raw.state),
            dismissed_reason: raw.dismissed_reason,
            dismissed_comment: raw.dismissed_comment,
        }
    }
}

impl From<CommentResponse> for IssueComment {
    fn from(raw: CommentResponse) -> Self {
        IssueComment {
            id: raw.id,
            body: raw.body.unwrap_or_default(),
        }
    }
}

impl GitHubClient {
    /// Build a client for `repository` (`owner/name`) from the resolved config.
    pub fn new(config: &Config, repository: &str) -> Result<Self, PlatformError> {
        let token = config.github.token.clone().ok_or(PlatformError::MissingToken)?;
        let (owner, repo) = split_repository(repository)?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_url: config.github.api_url.trim_end_matches('/').to_string(),
            graphql_url: config.graphql_url(),
            token,
            owner,
            repo,
        })
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_url, self.owner, self.repo, path)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .bearer_auth(&self.token)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, PlatformError> {
        let value = self
            .request(reqwest::Method::GET, url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json::<T>()
            .await?;
        Ok(value)
    }

    /// Follow `page=N` until a short page comes back.
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, PlatformError> {
        let mut items = Vec::new();
        let mut page = 1usize;
        loop {
            let mut paged: Vec<(&str, String)> = query.to_vec();
            paged.push(("per_page", PAGE_SIZE.to_string()));
            paged.push(("page", page.to_string()));

            let batch: Vec<T> = self.get_json(url, &paged).await?;
            let len = batch.len();
            items.extend(batch);
            debug!(url, page, len, "fetched page");
            if len < PAGE_SIZE {
                break;
            }
            page += 1;
        }
        Ok(items)
    }
}

/// Code-scanning results for a pull request are uploaded under its merge ref.
fn alerts_query(pr: u64) -> Vec<(&'static str, String)> {
    vec![("ref", format!("refs/pull/{pr}/merge"))]
}

fn split_repository(repository: &str) -> Result<(String, String), PlatformError> {
    match repository.split_once('/') {
        Some((owner, repo))
            if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
        {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(PlatformError::InvalidRepository(repository.to_string())),
    }
}

#[async_trait]
impl Platform for GitHubClient {
    #[instrument(skip(self), fields(repo = %self.repo))]
    async fn completed_workflow_runs(
        &self,
        workflow: &str,
        branch: &str,
    ) -> Result<Vec<WorkflowRun>, PlatformError> {
        let url = self.repo_url(&format!("actions/workflows/{workflow}/runs"));
        let response: RunsResponse = self
            .get_json(
                &url,
                &[
                    ("branch", branch.to_string()),
                    ("status", "completed".to_string()),
                    ("per_page", PAGE_SIZE.to_string()),
                ],
            )
            .await?;
        debug!(runs = response.workflow_runs.len(), "received workflow runs");

        Ok(response
            .workflow_runs
            .into_iter()
            .map(|run| WorkflowRun {
                id: run.id,
                head_branch: run.head_branch,
                conclusion: run.conclusion,
                html_url: run.html_url,
                created_at: run.created_at,
            })
            .collect())
    }

    #[instrument(skip(self), fields(repo = %self.repo))]
    async fn code_scanning_alerts(&self, pr: u64) -> Result<Vec<Alert>, PlatformError> {
        let url = self.repo_url("code-scanning/alerts");
        let raw: Vec<AlertResponse> = self
            .get_paginated(&url, &alerts_query(pr))
            .await?;
        debug!(alerts = raw.len(), "received code-scanning alerts");
        Ok(raw.into_iter().map(Alert::from).collect())
    }

    #[instrument(skip(self), fields(repo = %self.repo))]
    async fn issue_comments(&self, pr: u64) -> Result<Vec<IssueComment>, PlatformError> {
        let url = self.repo_url(&format!("issues/{pr}/comments"));
        let raw: Vec<CommentResponse> = self.get_paginated(&url, &[]).await?;
        Ok(raw.into_iter().map(IssueComment::from).collect())
    }

    #[instrument(skip(self, body), fields(repo = %self.repo, body_bytes = body.len()))]
    async fn create_issue_comment(
        &self,
        pr: u64,
        body: &str,
    ) -> Result<IssueComment, PlatformError> {
        let url = self.repo_url(&format!("issues/{pr}/comments"));
        let raw = self
            .request(reqwest::Method::POST, &url)
            .json(&json!({ "body": body }))
            .send()
            .await?
            .error_for_status()?
            .json::<CommentResponse>()
            .await?;
        Ok(raw.into())
    }

    #[instrument(skip(self, body), fields(repo = %self.repo, body_bytes = body.len()))]
    async fn update_issue_comment(
        &self,
        id: u64,
        body: &str,
    ) -> Result<IssueComment, PlatformError> {
        let url = self.repo_url(&format!("issues/comments/{id}"));
        let raw = self
            .request(reqwest::Method::PATCH, &url)
            .json(&json!({ "body": body }))
            .send()
            .await?
            .error_for_status()?
            .json::<CommentResponse>()
            .await?;
        Ok(raw.into())
    }

    #[instrument(skip(self), fields(repo = %self.repo))]
    async fn pull_request(&self, pr: u64) -> Result<PullRequestMeta, PlatformError> {
        let url = self.repo_url(&format!("pulls/{pr}"));
        let raw: PullResponse = self.get_json(&url, &[]).await?;
        Ok(PullRequestMeta {
            number: raw.number,
            node_id: raw.node_id,
            draft: raw.draft,
            head_ref: raw.head.name,
            base_ref: raw.base.name,
        })
    }

    #[instrument(skip(self), fields(repo = %self.repo))]
    async fn pull_request_files(&self, pr: u64) -> Result<Vec<PullRequestFile>, PlatformError> {
        let url = self.repo_url(&format!("pulls/{pr}/files"));
        let raw: Vec<FileResponse> = self.get_paginated(&url, &[]).await?;
        debug!(files = raw.len(), "received PR files");
        Ok(raw
            .into_iter()
            .map(|f| PullRequestFile {
                filename: f.filename,
                previous_filename: f.previous_filename,
                status: f.status,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn convert_to_draft(&self, node_id: &str) -> Result<(), PlatformError> {
        let response = self
            .http
            .post(&self.graphql_url)
            .header("User-Agent", USER_AGENT)
            .bearer_auth(&self.token)
            .json(&json!({
                "query": CONVERT_TO_DRAFT_MUTATION,
                "variables": { "id": node_id },
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<GraphQlResponse>()
            .await?;

        if response.errors.is_empty() {
            Ok(())
        } else {
            let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
            Err(PlatformError::GraphQl(messages.join("; ")))
        }
    }

    #[instrument(skip(self), fields(repo = %self.repo))]
    async fn pull_request_reviews(&self, pr: u64) -> Result<Vec<Review>, PlatformError> {
        let url = self.repo_url(&format!("pulls/{pr}/reviews"));
        let raw: Vec<ReviewResponse> = self.get_paginated(&url, &[]).await?;
        Ok(raw
            .into_iter()
            .map(|r| Review {
                author: r.user.map(|u| u.login),
                state: r.state,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn team_members(&self, org: &str, team: &str) -> Result<Vec<String>, PlatformError> {
        let url = format!("{}/orgs/{org}/teams/{team}/members", self.api_url);
        let raw: Vec<User> = self.get_paginated(&url, &[]).await?;
        Ok(raw.into_iter().map(|u| u.login).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_repository() {
        assert_eq!(
            split_repository("lifinance/contracts").unwrap(),
            ("lifinance".to_string(), "contracts".to_string())
        );
        assert!(split_repository("contracts").is_err());
        assert!(split_repository("/contracts").is_err());
        assert!(split_repository("a/b/c").is_err());
    }

    #[test]
    fn test_alerts_query_targets_merge_ref() {
        assert_eq!(
            alerts_query(42),
            vec![("ref", "refs/pull/42/merge".to_string())]
        );
    }

    #[test]
    fn test_file_response_json() {
        let raw: Vec<FileResponse> = serde_json::from_str(
            r#"[
                {"filename": ".github/workflows/évil.yml", "status": "added", "additions": 3},
                {"filename": "ci/gate.yml", "previous_filename": ".github/workflows/gate.yml",
                 "status": "renamed"}
            ]"#,
        )
        .unwrap();
        assert_eq!(raw[0].filename, ".github/workflows/évil.yml");
        assert!(raw[0].previous_filename.is_none());
        assert_eq!(raw[1].previous_filename.as_deref(), Some(".github/workflows/gate.yml"));
        assert_eq!(raw[1].status, "renamed");
    }

    #[test]
    fn test_new_requires_token() {
        let config = Config::default();
        assert!(matches!(
            GitHubClient::new(&config, "org/repo"),
            Err(PlatformError::MissingToken)
        ));
    }

    #[test]
    fn test_alert_from_api_json() {
        let raw: AlertResponse = serde_json::from_str(
            r#"{
                "number": 7,
                "html_url": "https://github.com/org/repo/security/code-scanning/7",
                "state": "dismissed",
                "dismissed_reason": "used in tests",
                "dismissed_comment": "only\nin mocks",
                "tool": { "name": "Olympix Integrated Security" },
                "rule": { "description": "Reentrancy" },
                "most_recent_instance": {
                    "location": { "path": "src/Facets/BarFacet.sol" },
                    "message": { "text": "External call before state update" }
                }
            }"#,
        )
        .unwrap();
        let alert = Alert::from(raw);
        assert_eq!(alert.number, 7);
        assert_eq!(alert.state, AlertState::Dismissed);
        assert_eq!(alert.path, "src/Facets/BarFacet.sol");
        assert_eq!(alert.message, "External call before state update");
        assert_eq!(alert.dismissed_reason.as_deref(), Some("used in tests"));
    }

    #[test]
    fn test_alert_message_falls_back_to_rule_description() {
        let raw: AlertResponse = serde_json::from_str(
            r#"{
                "number": 1,
                "html_url": "https://example.test/1",
                "state": "open",
                "dismissed_reason": null,
                "dismissed_comment": null,
                "tool": { "name": "Olympix Integrated Security" },
                "rule": { "description": "Unchecked return value" }
            }"#,
        )
        .unwrap();
        let alert = Alert::from(raw);
        assert_eq!(alert.message, "Unchecked return value");
        assert_eq!(alert.path, "");
        assert!(alert.dismissed_comment.is_none());
    }

    #[test]
    fn test_graphql_errors_deserialize() {
        let response: GraphQlResponse = serde_json::from_str(
            r#"{"data": null, "errors": [{"message": "Resource not accessible by integration"}]}"#,
        )
        .unwrap();
        assert_eq!(response.errors.len(), 1);

        let ok: GraphQlResponse =
            serde_json::from_str(r#"{"data": {"convertPullRequestToDraft": {}}}"#).unwrap();
        assert!(ok.errors.is_empty());
    }
}
