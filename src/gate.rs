use tracing::{error, info, instrument, warn};

use crate::alerts::Counts;
use crate::platform::Platform;

/// A sub-condition that makes the alerts gate block the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Unresolved(usize),
    DismissedWithoutComment(usize),
    InvalidReason(usize),
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Unresolved(n) => write!(f, "{n} unresolved alert(s)"),
            Trigger::DismissedWithoutComment(n) => {
                write!(f, "{n} alert(s) dismissed without a comment")
            }
            Trigger::InvalidReason(n) => {
                write!(f, "{n} alert(s) dismissed with an invalid reason")
            }
        }
    }
}

/// Pass/fail for the alerts gate, derived only from the classification counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateDecision {
    pub triggers: Vec<Trigger>,
}

impl GateDecision {
    pub fn from_counts(unresolved: usize, dismissed_no_comment: usize, invalid_reason: usize) -> Self {
        let mut triggers = Vec::new();
        if unresolved > 0 {
            triggers.push(Trigger::Unresolved(unresolved));
        }
        if dismissed_no_comment > 0 {
            triggers.push(Trigger::DismissedWithoutComment(dismissed_no_comment));
        }
        if invalid_reason > 0 {
            triggers.push(Trigger::InvalidReason(invalid_reason));
        }
        Self { triggers }
    }

    pub fn evaluate(counts: &Counts) -> Self {
        Self::from_counts(counts.unresolved, counts.dismissed_no_comment, counts.invalid_reason)
    }

    pub fn is_blocking(&self) -> bool {
        !self.triggers.is_empty()
    }

    pub fn summary(&self) -> String {
        self.triggers
            .iter()
            .map(Trigger::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

/// Outcome of the draft demotion side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Demotion {
    NotNeeded,
    AlreadyDraft,
    Converted,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enforcement {
    pub verdict: Verdict,
    pub demotion: Demotion,
}

/// Apply the decision to the pull request.
///
/// A blocking decision always yields `Verdict::Fail`. Moving the PR back to
/// draft is attempted as well, but its failure only gets logged: the failed
/// check is what actually stops the merge.
#[instrument(skip(platform, decision), fields(blocking = decision.is_blocking()))]
pub async fn enforce(platform: &dyn Platform, pr: u64, decision: &GateDecision) -> Enforcement {
    if !decision.is_blocking() {
        info!("no blocking alerts, gate passes");
        return Enforcement {
            verdict: Verdict::Pass,
            demotion: Demotion::NotNeeded,
        };
    }

    for trigger in &decision.triggers {
        error!(%trigger, "blocking condition");
    }
    error!(pr, summary = %decision.summary(), "security alerts gate failed");

    let demotion = demote_to_draft(platform, pr).await;
    Enforcement {
        verdict: Verdict::Fail,
        demotion,
    }
}

async fn demote_to_draft(platform: &dyn Platform, pr: u64) -> Demotion {
    let meta = match platform.pull_request(pr).await {
        Ok(meta) => meta,
        Err(err) => {
            warn!(error = %err, "could not load PR metadata, skipping draft conversion");
            return Demotion::Failed(err.to_string());
        }
    };

    info!(
        pr = meta.number,
        head = %meta.head_ref,
        base = %meta.base_ref,
        draft = meta.draft,
        "loaded PR metadata"
    );
    if meta.draft {
        info!("PR is already a draft");
        return Demotion::AlreadyDraft;
    }

    match platform.convert_to_draft(&meta.node_id).await {
        Ok(()) => {
            info!("converted PR to draft");
            Demotion::Converted
        }
        Err(err) => {
            warn!(error = %err, "failed to convert PR to draft");
            Demotion::Failed(err.to_string())
        }
    }
}
