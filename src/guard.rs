//! Protected-path guard: changes to the gate definitions themselves need a
//! review from the privileged team.

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::pr::ChangedFile;
use crate::platform::Platform;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Diff between base and head is empty; a pull request always changes at least one file")]
    EmptyDiff,
}

/// Where the protected files live and who may approve changes to them.
#[derive(Debug, Clone)]
pub struct GuardPolicy {
    pub protected_dir: String,
    pub organization: String,
    pub team: String,
}

impl GuardPolicy {
    pub fn new(protected_dir: &str, organization: &str, team: &str) -> Self {
        let mut protected_dir = protected_dir.trim().to_string();
        if !protected_dir.ends_with('/') {
            protected_dir.push('/');
        }
        Self {
            protected_dir,
            organization: organization.to_string(),
            team: team.to_string(),
        }
    }

    pub fn group(&self) -> String {
        format!("@{}/{}", self.organization, self.team)
    }
}

/// Result of the approval lookup. Lookup failures and a genuine lack of a
/// privileged review both end up as `Missing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Approval {
    Granted { reviewer: String },
    Missing { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// No protected file in the diff; no approval was looked up
    Unprotected,
    Approved { reviewer: String, protected: Vec<String> },
    Rejected { protected: Vec<String>, reason: String },
}

impl GuardOutcome {
    pub fn passed(&self) -> bool {
        !matches!(self, GuardOutcome::Rejected { .. })
    }
}

/// Files in the change set that lie under the protected directory.
pub fn protected_changes<'a>(changed: &'a [ChangedFile], policy: &GuardPolicy) -> Vec<&'a ChangedFile> {
    changed
        .iter()
        .filter(|file| file.touches(&policy.protected_dir))
        .collect()
}

/// Scan, filter, then check approval only when protected files changed.
#[instrument(skip(platform, changed, policy), fields(files = changed.len(), dir = %policy.protected_dir))]
pub async fn evaluate(
    platform: &dyn Platform,
    pr: u64,
    changed: &[ChangedFile],
    policy: &GuardPolicy,
) -> Result<GuardOutcome, GuardError> {
    if changed.is_empty() {
        return Err(GuardError::EmptyDiff);
    }

    let protected: Vec<String> = protected_changes(changed, policy)
        .into_iter()
        .map(|file| file.path.clone())
        .collect();
    if protected.is_empty() {
        info!("no protected files changed");
        return Ok(GuardOutcome::Unprotected);
    }
    info!(protected = ?protected, "protected files changed, checking approval");

    match privileged_review(platform, pr, policy).await {
        Approval::Granted { reviewer } => {
            info!(%reviewer, "privileged review found");
            Ok(GuardOutcome::Approved {
                reviewer,
                protected,
            })
        }
        Approval::Missing { reason } => {
            warn!(%reason, group = %policy.group(), "privileged review missing");
            Ok(GuardOutcome::Rejected { protected, reason })
        }
    }
}

/// Look for a review submitted by a current member of the privileged team.
pub async fn privileged_review(platform: &dyn Platform, pr: u64, policy: &GuardPolicy) -> Approval {
    let members = match platform.team_members(&policy.organization, &policy.team).await {
        Ok(members) => members,
        Err(err) => {
            return Approval::Missing {
                reason: format!("could not resolve members of {}: {err}", policy.group()),
            }
        }
    };
    if members.is_empty() {
        return Approval::Missing {
            reason: format!("{} has no members", policy.group()),
        };
    }

    let reviews = match platform.pull_request_reviews(pr).await {
        Ok(reviews) => reviews,
        Err(err) => {
            return Approval::Missing {
                reason: format!("could not list reviews: {err}"),
            }
        }
    };

    for review in &reviews {
        debug!(author = ?review.author, state = %review.state, "review");
    }

    reviews
        .into_iter()
        .filter_map(|review| review.author)
        .find(|author| members.iter().any(|m| m.eq_ignore_ascii_case(author)))
        .map(|reviewer| Approval::Granted { reviewer })
        .unwrap_or_else(|| Approval::Missing {
            reason: format!("no review from a member of {}", policy.group()),
        })
}
