//! In-memory `Platform` for tests. Holds one pull request's worth of state
//! and counts every call so tests can assert which stages ran.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::types::{
    Alert, AlertState, IssueComment, PullRequestFile, PullRequestMeta, Review, WorkflowRun,
};
use super::{Platform, PlatformError};

#[derive(Debug, Default)]
pub struct FakeState {
    pub runs: Vec<WorkflowRun>,
    pub alerts: Vec<Alert>,
    pub comments: Vec<IssueComment>,
    pub draft: bool,
    pub files: Vec<PullRequestFile>,
    pub reviews: Vec<Review>,
    pub team: Vec<String>,
    pub fail_draft: bool,
    pub fail_reviews: bool,
    pub fail_team: bool,
    pub calls: HashMap<&'static str, usize>,
}

#[derive(Debug, Default)]
pub struct FakePlatform {
    pub state: Mutex<FakeState>,
}

fn unavailable(what: &str) -> PlatformError {
    PlatformError::Unavailable(what.to_string())
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(f: impl FnOnce(&mut FakeState)) -> Self {
        let platform = Self::new();
        {
            let mut state = platform.state.lock().unwrap();
            f(&mut *state);
        }
        platform
    }

    pub fn calls(&self, method: &str) -> usize {
        self.state.lock().unwrap().calls.get(method).copied().unwrap_or(0)
    }

    pub fn comments(&self) -> Vec<IssueComment> {
        self.state.lock().unwrap().comments.clone()
    }

    pub fn is_draft(&self) -> bool {
        self.state.lock().unwrap().draft
    }

    fn record(&self, method: &'static str) -> std::sync::MutexGuard<'_, FakeState> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(method).or_insert(0) += 1;
        state
    }
}

pub fn alert(number: u64, state: AlertState) -> Alert {
    Alert {
        number,
        html_url: format!("https://github.com/org/repo/security/code-scanning/{number}"),
        tool: "Olympix Integrated Security".to_string(),
        path: format!("src/Facets/Facet{number}.sol"),
        message: format!("Finding {number}"),
        state,
        dismissed_reason: None,
        dismissed_comment: None,
    }
}

pub fn dismissed(number: u64, reason: &str, comment: Option<&str>) -> Alert {
    Alert {
        dismissed_reason: Some(reason.to_string()),
        dismissed_comment: comment.map(str::to_string),
        ..alert(number, AlertState::Dismissed)
    }
}

pub fn run(id: u64, branch: &str, conclusion: &str, created_at: &str) -> WorkflowRun {
    WorkflowRun {
        id,
        head_branch: Some(branch.to_string()),
        conclusion: Some(conclusion.to_string()),
        html_url: format!("https://github.com/org/repo/actions/runs/{id}"),
        created_at: created_at.to_string(),
    }
}

pub fn file(filename: &str, status: &str) -> PullRequestFile {
    PullRequestFile {
        filename: filename.to_string(),
        previous_filename: None,
        status: status.to_string(),
    }
}

pub fn review(author: &str, state: &str) -> Review {
    Review {
        author: Some(author.to_string()),
        state: state.to_string(),
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn completed_workflow_runs(
        &self,
        _workflow: &str,
        _branch: &str,
    ) -> Result<Vec<WorkflowRun>, PlatformError> {
        Ok(self.record("completed_workflow_runs").runs.clone())
    }

    async fn code_scanning_alerts(&self, _pr: u64) -> Result<Vec<Alert>, PlatformError> {
        Ok(self.record("code_scanning_alerts").alerts.clone())
    }

    async fn issue_comments(&self, _pr: u64) -> Result<Vec<IssueComment>, PlatformError> {
        Ok(self.record("issue_comments").comments.clone())
    }

    async fn create_issue_comment(
        &self,
        _pr: u64,
        body: &str,
    ) -> Result<IssueComment, PlatformError> {
        let mut state = self.record("create_issue_comment");
        let comment = IssueComment {
            id: 1000 + state.comments.len() as u64,
            body: body.to_string(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn update_issue_comment(
        &self,
        id: u64,
        body: &str,
    ) -> Result<IssueComment, PlatformError> {
        let mut state = self.record("update_issue_comment");
        let comment = state
            .comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| unavailable("comment"))?;
        comment.body = body.to_string();
        Ok(comment.clone())
    }

    async fn pull_request(&self, pr: u64) -> Result<PullRequestMeta, PlatformError> {
        let state = self.record("pull_request");
        Ok(PullRequestMeta {
            number: pr,
            node_id: format!("PR_node{pr}"),
            draft: state.draft,
            head_ref: "feature".to_string(),
            base_ref: "main".to_string(),
        })
    }

    async fn pull_request_files(&self, _pr: u64) -> Result<Vec<PullRequestFile>, PlatformError> {
        Ok(self.record("pull_request_files").files.clone())
    }

    async fn convert_to_draft(&self, _node_id: &str) -> Result<(), PlatformError> {
        let mut state = self.record("convert_to_draft");
        if state.fail_draft {
            return Err(unavailable("draft conversion"));
        }
        state.draft = true;
        Ok(())
    }

    async fn pull_request_reviews(&self, _pr: u64) -> Result<Vec<Review>, PlatformError> {
        let state = self.record("pull_request_reviews");
        if state.fail_reviews {
            return Err(unavailable("reviews"));
        }
        Ok(state.reviews.clone())
    }

    async fn team_members(&self, _org: &str, _team: &str) -> Result<Vec<String>, PlatformError> {
        let state = self.record("team_members");
        if state.fail_team {
            return Err(unavailable("team"));
        }
        Ok(state.team.clone())
    }
}
