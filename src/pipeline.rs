use thiserror::Error;
use tracing::{info, info_span, Instrument};

use crate::alerts::{self, AlertsError, Classification, Counts};
use crate::config::Config;
use crate::gate::{self, Enforcement, GateDecision};
use crate::platform::Platform;
use crate::precondition::{self, PreconditionError};
use crate::report::{self, CommentAction, ReportError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Alerts(#[from] AlertsError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Everything the alerts gate decided on one run.
#[derive(Debug)]
pub struct GateReport {
    pub counts: Counts,
    pub decision: GateDecision,
    pub comment: CommentAction,
    pub enforcement: Enforcement,
}

/// Precondition, fetch, classify, publish the status comment, enforce.
///
/// Stages run strictly in order and any error aborts the rest, so a
/// missing or failed analysis run never reaches the comment or the gate.
pub async fn run_alerts_gate(
    platform: &dyn Platform,
    config: &Config,
    pr: u64,
    branch: &str,
) -> Result<GateReport, PipelineError> {
    precondition::check(platform, &config.precondition.workflow, branch)
        .instrument(info_span!("stage", name = "precondition"))
        .await?;

    let alerts = alerts::fetch(platform, pr, &config.alerts.tool_name)
        .instrument(info_span!("stage", name = "fetch"))
        .await?;

    let classification = Classification::from_alerts(&alerts, &config.alerts.invalid_reasons);
    let counts = classification.counts();
    info!(%counts, "classified alerts");

    let comment = report::publish(platform, pr, &classification)
        .instrument(info_span!("stage", name = "report"))
        .await?;

    let decision = GateDecision::evaluate(&counts);
    let enforcement = gate::enforce(platform, pr, &decision)
        .instrument(info_span!("stage", name = "enforce"))
        .await;

    Ok(GateReport {
        counts,
        decision,
        comment,
        enforcement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{Demotion, Verdict};
    use crate::platform::fake::{alert, dismissed, run, FakePlatform};
    use crate::platform::AlertState;

    fn passing_run() -> Vec<crate::platform::WorkflowRun> {
        vec![run(1, "feature", "success", "2026-10-01T10:00:00Z")]
    }

    #[tokio::test]
    async fn test_missing_analysis_aborts_before_fetch() {
        let platform = FakePlatform::with(|s| {
            s.alerts = vec![alert(1, AlertState::Open)];
        });
        let result = run_alerts_gate(&platform, &Config::default(), 42, "feature").await;

        assert!(matches!(
            result,
            Err(PipelineError::Precondition(PreconditionError::NoMatchingRun { .. }))
        ));
        assert_eq!(platform.calls("code_scanning_alerts"), 0);
        assert_eq!(platform.calls("issue_comments"), 0);
        assert_eq!(platform.calls("convert_to_draft"), 0);
    }

    #[tokio::test]
    async fn test_failed_analysis_aborts_before_fetch() {
        let platform = FakePlatform::with(|s| {
            s.runs = vec![run(1, "feature", "cancelled", "2026-10-01T10:00:00Z")];
        });
        let result = run_alerts_gate(&platform, &Config::default(), 42, "feature").await;
        assert!(result.is_err());
        assert_eq!(platform.calls("code_scanning_alerts"), 0);
    }

    #[tokio::test]
    async fn test_blocking_alerts_fail_and_demote() {
        let platform = FakePlatform::with(|s| {
            s.runs = passing_run();
            s.alerts = vec![
                alert(1, AlertState::Open),
                dismissed(2, "false positive", Some("guarded")),
            ];
        });
        let report = run_alerts_gate(&platform, &Config::default(), 42, "feature")
            .await
            .unwrap();

        assert_eq!(report.counts.unresolved, 1);
        assert_eq!(report.counts.dismissed_with_comment, 1);
        assert!(report.decision.is_blocking());
        assert_eq!(report.enforcement.verdict, Verdict::Fail);
        assert_eq!(report.enforcement.demotion, Demotion::Converted);
        assert!(matches!(report.comment, CommentAction::Created(_)));
        assert!(platform.comments()[0].body.contains("Unresolved Security Alerts Found"));
    }

    #[tokio::test]
    async fn test_justified_dismissals_pass() {
        let platform = FakePlatform::with(|s| {
            s.runs = passing_run();
            s.alerts = vec![dismissed(2, "won't fix", Some("accepted risk"))];
        });
        let report = run_alerts_gate(&platform, &Config::default(), 42, "feature")
            .await
            .unwrap();

        assert_eq!(report.enforcement.verdict, Verdict::Pass);
        assert!(!platform.is_draft());
        assert!(platform.comments()[0].body.contains("No unresolved security alerts"));
    }

    #[tokio::test]
    async fn test_alerts_from_other_tools_are_ignored() {
        let mut codeql = alert(1, AlertState::Open);
        codeql.tool = "CodeQL".to_string();
        let platform = FakePlatform::with(|s| {
            s.runs = passing_run();
            s.alerts = vec![codeql];
        });
        let report = run_alerts_gate(&platform, &Config::default(), 42, "feature")
            .await
            .unwrap();

        assert_eq!(report.enforcement.verdict, Verdict::Pass);
        assert_eq!(report.comment, CommentAction::Skipped);
    }
}
