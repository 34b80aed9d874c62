/// Lifecycle state of a code-scanning alert as reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    Open,
    Dismissed,
    Fixed,
    Unknown,
}

impl AlertState {
    pub fn from_api(state: &str) -> Self {
        match state {
            "open" => AlertState::Open,
            "dismissed" => AlertState::Dismissed,
            "fixed" => AlertState::Fixed,
            _ => AlertState::Unknown,
        }
    }
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertState::Open => write!(f, "open"),
            AlertState::Dismissed => write!(f, "dismissed"),
            AlertState::Fixed => write!(f, "fixed"),
            AlertState::Unknown => write!(f, "unknown"),
        }
    }
}

/// One static-analysis finding attached to a pull request.
/// Owned by the code-scanning subsystem; only ever read here.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    /// Alert number within the repository
    pub number: u64,
    /// Deep link to the alert page
    pub html_url: String,
    /// Name of the analyzer that produced the alert
    pub tool: String,
    /// Path of the most recent instance (empty if the API omitted it)
    pub path: String,
    /// Message text of the most recent instance
    pub message: String,
    pub state: AlertState,
    pub dismissed_reason: Option<String>,
    pub dismissed_comment: Option<String>,
}

/// A completed run of a workflow.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub id: u64,
    pub head_branch: Option<String>,
    pub conclusion: Option<String>,
    pub html_url: String,
    /// RFC 3339 timestamp; lexical order is chronological order
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueComment {
    pub id: u64,
    pub body: String,
}

/// The subset of pull request metadata the gates act on.
#[derive(Debug, Clone)]
pub struct PullRequestMeta {
    pub number: u64,
    /// Opaque GraphQL node identity
    pub node_id: String,
    pub draft: bool,
    pub head_ref: String,
    pub base_ref: String,
}

/// One entry of the pull request files listing.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequestFile {
    pub filename: String,
    /// Source path of a rename
    pub previous_filename: Option<String>,
    /// `added`, `modified`, `removed`, `renamed`, ...
    pub status: String,
}

/// A submitted review. `author` is None for deleted ("ghost") accounts.
#[derive(Debug, Clone)]
pub struct Review {
    pub author: Option<String>,
    pub state: String,
}
