use crate::platform::{Alert, AlertState};

/// Alerts partitioned by how they were handled. Each sequence keeps the
/// order the API returned, so rendering is reproducible.
///
/// `unresolved`, `dismissed_no_comment` and `dismissed_with_comment` are
/// disjoint and cover every open or dismissed alert. `invalid_reason` is a
/// refinement of `dismissed_with_comment`: its members appear in both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub unresolved: Vec<Alert>,
    pub dismissed_no_comment: Vec<Alert>,
    pub dismissed_with_comment: Vec<Alert>,
    pub invalid_reason: Vec<Alert>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub unresolved: usize,
    pub dismissed_no_comment: usize,
    pub dismissed_with_comment: usize,
    pub invalid_reason: usize,
}

impl std::fmt::Display for Counts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unresolved={} dismissed_no_comment={} dismissed_with_comment={} invalid_reason={}",
            self.unresolved, self.dismissed_no_comment, self.dismissed_with_comment, self.invalid_reason
        )
    }
}

impl Classification {
    /// Partition `alerts`. A dismissal reason matching any of
    /// `invalid_reasons` (case-insensitive) marks a commented dismissal as
    /// invalid. Alerts that are neither open nor dismissed are ignored.
    pub fn from_alerts(alerts: &[Alert], invalid_reasons: &[String]) -> Self {
        let mut classification = Classification::default();

        for alert in alerts {
            match alert.state {
                AlertState::Open => classification.unresolved.push(alert.clone()),
                AlertState::Dismissed if has_comment(alert) => {
                    if has_invalid_reason(alert, invalid_reasons) {
                        classification.invalid_reason.push(alert.clone());
                    }
                    classification.dismissed_with_comment.push(alert.clone());
                }
                AlertState::Dismissed => classification.dismissed_no_comment.push(alert.clone()),
                AlertState::Fixed | AlertState::Unknown => {}
            }
        }

        classification
    }

    pub fn counts(&self) -> Counts {
        Counts {
            unresolved: self.unresolved.len(),
            dismissed_no_comment: self.dismissed_no_comment.len(),
            dismissed_with_comment: self.dismissed_with_comment.len(),
            invalid_reason: self.invalid_reason.len(),
        }
    }

    /// Number of distinct alerts classified.
    pub fn total(&self) -> usize {
        self.unresolved.len() + self.dismissed_no_comment.len() + self.dismissed_with_comment.len()
    }

    pub fn is_invalid(&self, alert: &Alert) -> bool {
        self.invalid_reason.iter().any(|a| a.number == alert.number)
    }
}

fn has_comment(alert: &Alert) -> bool {
    alert
        .dismissed_comment
        .as_deref()
        .is_some_and(|c| !c.trim().is_empty())
}

fn has_invalid_reason(alert: &Alert, invalid_reasons: &[String]) -> bool {
    let Some(reason) = alert.dismissed_reason.as_deref() else {
        return false;
    };
    let reason = reason.trim();
    invalid_reasons
        .iter()
        .any(|invalid| invalid.trim().eq_ignore_ascii_case(reason))
}
