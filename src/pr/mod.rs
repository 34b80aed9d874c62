pub mod diff;
pub mod types;

pub use types::{ChangeStatus, ChangedFile, PrRef};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::platform::{Platform, PlatformError};

#[derive(Debug, Error)]
pub enum PrError {
    #[error("Invalid PR URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to parse diff: {0}")]
    DiffParse(String),

    #[error("Failed to run git: {0}")]
    GitSpawn(#[from] std::io::Error),

    #[error("git diff {range} failed: {stderr}")]
    Git { range: String, stderr: String },

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Where the guard and the notifier read the change set from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DiffSource {
    /// `git diff --name-status <base>...<head>` in the local checkout
    Git,
    /// The pull request's file listing from the GitHub API
    Api,
}

/// Parse a GitHub PR URL into its component parts.
/// Expected format: https://github.com/{owner}/{repo}/pull/{number}
pub fn parse_pr_url(url: &str) -> Result<PrRef, PrError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| PrError::InvalidUrl(url.to_string()))?;

    if parsed.host_str() != Some("github.com") {
        return Err(PrError::InvalidUrl(url.to_string()));
    }

    let segments: Vec<_> = parsed
        .path_segments()
        .ok_or_else(|| PrError::InvalidUrl(url.to_string()))?
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.len() != 4 || segments[2] != "pull" {
        return Err(PrError::InvalidUrl(url.to_string()));
    }

    let pr_number = segments[3]
        .parse::<u64>()
        .map_err(|_| PrError::InvalidUrl(url.to_string()))?;

    Ok(PrRef {
        owner: segments[0].to_string(),
        repo: segments[1].to_string(),
        pr_number,
    })
}

/// Files changed between the merge base of `base` and `head`, from the
/// local git checkout (three-dot range, like the PR "Files changed" view).
/// Paths are read NUL-terminated with quoting off so they arrive verbatim.
#[instrument]
pub async fn changed_files_from_git(base: &str, head: &str) -> Result<Vec<ChangedFile>, PrError> {
    let range = format!("{base}...{head}");
    let output = Command::new("git")
        .args([
            "-c",
            "core.quotePath=false",
            "diff",
            "--name-status",
            "-z",
            "-M",
            &range,
        ])
        .output()
        .await?;

    if !output.status.success() {
        return Err(PrError::Git {
            range,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    debug!(bytes = raw.len(), "received git name-status");
    diff::parse_name_status(&raw)
}

/// Files changed by the pull request, as reported by the platform.
#[instrument(skip(platform))]
pub async fn changed_files_from_api(
    platform: &dyn Platform,
    pr: u64,
) -> Result<Vec<ChangedFile>, PrError> {
    let files: Vec<ChangedFile> = platform
        .pull_request_files(pr)
        .await?
        .into_iter()
        .map(|f| ChangedFile {
            status: ChangeStatus::from_api(&f.status),
            path: f.filename,
            old_path: f.previous_filename,
        })
        .collect();
    debug!(files = files.len(), "listed PR files");
    Ok(files)
}
