//! What the triggering CI event tells us about the pull request.

use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

/// Values resolved from the GitHub Actions environment. Every field is
/// optional here; callers decide which absences are fatal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventContext {
    pub pr_number: Option<u64>,
    /// `GITHUB_HEAD_REF`, empty outside pull_request triggers
    pub head_ref: Option<String>,
    pub base_ref: Option<String>,
    /// `GITHUB_REF`, e.g. `refs/heads/feature`
    pub git_ref: Option<String>,
    pub repository: Option<String>,
}

#[derive(Deserialize)]
struct EventPayload {
    pull_request: Option<PullRequestPayload>,
    #[serde(default)]
    inputs: Option<DispatchInputs>,
}

#[derive(Deserialize)]
struct PullRequestPayload {
    number: u64,
    head: Option<RefPayload>,
    base: Option<RefPayload>,
}

#[derive(Deserialize)]
struct RefPayload {
    #[serde(rename = "ref")]
    name: String,
}

/// `workflow_dispatch` inputs are always strings.
#[derive(Deserialize)]
struct DispatchInputs {
    pr_number: Option<String>,
}

impl EventContext {
    pub fn from_env() -> Self {
        let mut ctx = match std::env::var("GITHUB_EVENT_PATH") {
            Ok(path) if !path.is_empty() => Self::from_event_file(Path::new(&path)),
            _ => EventContext::default(),
        };

        if let Some(head_ref) = env("GITHUB_HEAD_REF") {
            ctx.head_ref = Some(head_ref);
        }
        if let Some(base_ref) = env("GITHUB_BASE_REF") {
            ctx.base_ref = Some(base_ref);
        }
        ctx.git_ref = env("GITHUB_REF");
        ctx.repository = env("GITHUB_REPOSITORY");
        ctx
    }

    /// An unreadable payload leaves the context empty; resolution of the
    /// PR number fails loudly later if nothing else supplies it.
    fn from_event_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_event_json(&contents),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not read event payload");
                EventContext::default()
            }
        }
    }

    pub fn from_event_json(contents: &str) -> Self {
        let payload: EventPayload = match serde_json::from_str(contents) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "could not parse event payload");
                return EventContext::default();
            }
        };

        let mut ctx = EventContext::default();
        if let Some(pr) = payload.pull_request {
            ctx.pr_number = Some(pr.number);
            ctx.head_ref = pr.head.map(|r| r.name);
            ctx.base_ref = pr.base.map(|r| r.name);
        } else if let Some(number) = payload
            .inputs
            .and_then(|i| i.pr_number)
            .and_then(|n| n.trim().parse::<u64>().ok())
        {
            ctx.pr_number = Some(number);
        }
        debug!(pr = ?ctx.pr_number, head_ref = ?ctx.head_ref, "parsed event payload");
        ctx
    }

    pub fn branch(&self) -> Option<String> {
        resolve_branch(self.head_ref.as_deref(), self.git_ref.as_deref())
    }
}

/// The event-supplied head ref when non-empty, otherwise the branch name
/// derived from the full git ref.
pub fn resolve_branch(head_ref: Option<&str>, git_ref: Option<&str>) -> Option<String> {
    if let Some(head) = head_ref.map(str::trim).filter(|h| !h.is_empty()) {
        return Some(head.to_string());
    }
    git_ref
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| r.strip_prefix("refs/heads/").unwrap_or(r).to_string())
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_branch_prefers_head_ref() {
        assert_eq!(
            resolve_branch(Some("feature/x"), Some("refs/pull/12/merge")).as_deref(),
            Some("feature/x")
        );
    }

    #[test]
    fn test_resolve_branch_falls_back_to_ref() {
        assert_eq!(
            resolve_branch(Some(""), Some("refs/heads/feature/x")).as_deref(),
            Some("feature/x")
        );
        assert_eq!(
            resolve_branch(None, Some("refs/heads/main")).as_deref(),
            Some("main")
        );
        assert_eq!(resolve_branch(Some("  "), None), None);
    }

    #[test]
    fn test_pull_request_payload() {
        let ctx = EventContext::from_event_json(
            r#"{"action":"synchronize","pull_request":{"number":42,
                "head":{"ref":"feature","sha":"abc"},"base":{"ref":"main","sha":"def"}}}"#,
        );
        assert_eq!(ctx.pr_number, Some(42));
        assert_eq!(ctx.head_ref.as_deref(), Some("feature"));
        assert_eq!(ctx.base_ref.as_deref(), Some("main"));
    }

    #[test]
    fn test_workflow_dispatch_payload() {
        let ctx = EventContext::from_event_json(r#"{"inputs":{"pr_number":" 17 "}}"#);
        assert_eq!(ctx.pr_number, Some(17));
        assert!(ctx.head_ref.is_none());
    }

    #[test]
    fn test_unparseable_payload_is_empty() {
        assert_eq!(EventContext::from_event_json("not json"), EventContext::default());
    }
}
