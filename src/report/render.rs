use super::COMMENT_MARKER;
use crate::alerts::Classification;
use crate::platform::Alert;

/// Build the status comment body for a classification.
///
/// Sections appear in a fixed order and only when they have members:
/// unresolved, dismissed without comment, dismissed with an invalid reason,
/// then the "resolve before merging" warning. When none of those apply a
/// single success line takes their place. Commented dismissals with a valid
/// reason are listed last in either case.
pub fn render_body(classification: &Classification) -> String {
    let counts = classification.counts();
    let mut md = String::new();
    md.push_str(&format!("{COMMENT_MARKER}\n\n"));

    if counts.unresolved > 0 {
        md.push_str("🚨 **Unresolved Security Alerts Found!** 🚨\n\n");
        md.push_str("The following alerts are still open and must be fixed or dismissed with a justification:\n\n");
        for alert in &classification.unresolved {
            push_alert(&mut md, "🔴", alert);
            md.push_str(&format!("🔹 **Description:** {}\n\n", alert.message));
        }
    }

    if counts.dismissed_no_comment > 0 {
        md.push_str("⚠️ **Dismissed Alerts Without Comments** ⚠️\n\n");
        md.push_str("Every dismissal needs a comment explaining why the finding does not apply:\n\n");
        for alert in &classification.dismissed_no_comment {
            push_alert(&mut md, "🟠", alert);
            md.push_str(&format!(
                "🔹 **Reason:** {}\n\n",
                capitalize(alert.dismissed_reason.as_deref().unwrap_or("none given"))
            ));
        }
    }

    if counts.invalid_reason > 0 {
        md.push_str("❌ **Dismissed Alerts With Invalid Reason** ❌\n\n");
        md.push_str("Analysis only runs on production code, so \"used in tests\" cannot justify a dismissal:\n\n");
        for alert in &classification.invalid_reason {
            push_alert(&mut md, "🔴", alert);
            md.push_str(&format!(
                "🔹 **Reason:** {}\n\n",
                capitalize(alert.dismissed_reason.as_deref().unwrap_or_default())
            ));
        }
    }

    if counts.unresolved > 0 || counts.dismissed_no_comment > 0 || counts.invalid_reason > 0 {
        md.push_str("⚠️ **Please resolve the above issues before merging.**\n\n");
    } else {
        md.push_str("✅ **No unresolved security alerts!** 🎉\n\n");
    }

    let justified: Vec<&Alert> = classification
        .dismissed_with_comment
        .iter()
        .filter(|alert| !classification.is_invalid(alert))
        .collect();
    if !justified.is_empty() {
        md.push_str("🟢 **Dismissed Security Alerts with Comments** 🟢\n\n");
        for alert in justified {
            push_alert(&mut md, "✅", alert);
            md.push_str(&format!(
                "🔹 **Reason:** {}\n",
                capitalize(alert.dismissed_reason.as_deref().unwrap_or_default())
            ));
            md.push_str(&format!(
                "🔹 **Comment:** {}\n\n",
                flatten(alert.dismissed_comment.as_deref().unwrap_or_default())
            ));
        }
    }

    md.truncate(md.trim_end().len());
    md.push('\n');
    md
}

fn push_alert(md: &mut String, icon: &str, alert: &Alert) {
    md.push_str(&format!(
        "{icon} **View Alert:** [#{}]({})\n",
        alert.number, alert.html_url
    ));
    md.push_str(&format!("🔹 **File:** `{}`\n", alert.path));
}

/// Upper-case the first character, leave the rest untouched.
fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Join the lines of a free-text comment into one line.
fn flatten(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
