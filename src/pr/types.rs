/// Represents the parsed components of a GitHub PR URL.
#[derive(Debug, Clone, PartialEq)]
pub struct PrRef {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
}

impl PrRef {
    /// `owner/name` slug as used by the REST API.
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// How a file was changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    Other,
}

impl ChangeStatus {
    /// Status letter from `git diff --name-status` (`R100` and `C075`
    /// carry a similarity score after the letter).
    pub fn from_git(code: &str) -> Self {
        match code.chars().next() {
            Some('A') => ChangeStatus::Added,
            Some('M') | Some('T') => ChangeStatus::Modified,
            Some('D') => ChangeStatus::Deleted,
            Some('R') => ChangeStatus::Renamed,
            Some('C') => ChangeStatus::Copied,
            _ => ChangeStatus::Other,
        }
    }

    /// `status` field of the pull request files API.
    pub fn from_api(status: &str) -> Self {
        match status {
            "added" => ChangeStatus::Added,
            "modified" | "changed" => ChangeStatus::Modified,
            "removed" => ChangeStatus::Deleted,
            "renamed" => ChangeStatus::Renamed,
            "copied" => ChangeStatus::Copied,
            _ => ChangeStatus::Other,
        }
    }

    /// Whether the entry names a source path besides the destination.
    pub fn has_source(self) -> bool {
        matches!(self, ChangeStatus::Renamed | ChangeStatus::Copied)
    }
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeStatus::Added => write!(f, "added"),
            ChangeStatus::Modified => write!(f, "modified"),
            ChangeStatus::Deleted => write!(f, "deleted"),
            ChangeStatus::Renamed => write!(f, "renamed"),
            ChangeStatus::Copied => write!(f, "copied"),
            ChangeStatus::Other => write!(f, "other"),
        }
    }
}

/// A single file touched by a change set.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedFile {
    /// Path after the change (e.g., ".github/workflows/gate.yml")
    pub path: String,
    /// Previous path when the file was renamed or copied
    pub old_path: Option<String>,
    pub status: ChangeStatus,
}

impl ChangedFile {
    /// Both sides of the change; a rename touches two locations.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.path.as_str()).chain(self.old_path.as_deref())
    }

    /// True when either side of the change is `pattern` itself or, for a
    /// pattern ending in '/', lies below it.
    pub fn touches(&self, pattern: &str) -> bool {
        self.paths().any(|path| {
            if pattern.ends_with('/') {
                path.starts_with(pattern)
            } else {
                path == pattern
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pr_ref_repository() {
        let pr = PrRef {
            owner: "org".to_string(),
            repo: "repo".to_string(),
            pr_number: 42,
        };
        assert_eq!(pr.repository(), "org/repo");
    }

    #[test]
    fn test_changed_file_paths_include_rename_source() {
        let file = ChangedFile {
            path: "ci/gate.yml".to_string(),
            old_path: Some(".github/workflows/gate.yml".to_string()),
            status: ChangeStatus::Renamed,
        };
        let paths: Vec<&str> = file.paths().collect();
        assert_eq!(paths, vec!["ci/gate.yml", ".github/workflows/gate.yml"]);
        assert!(file.touches(".github/workflows/"));
        assert!(file.touches("ci/gate.yml"));
        assert!(!file.touches("ci/gate"));
        assert!(!file.touches("src/"));
        assert!(file.touches(".github/workflows/gate.yml"));
    }

    #[test]
    fn test_change_status_codes() {
        assert_eq!(ChangeStatus::from_git("R100"), ChangeStatus::Renamed);
        assert_eq!(ChangeStatus::from_git("A"), ChangeStatus::Added);
        assert_eq!(ChangeStatus::from_git("T"), ChangeStatus::Modified);
        assert_eq!(ChangeStatus::from_api("removed"), ChangeStatus::Deleted);
        assert_eq!(ChangeStatus::from_api("renamed").to_string(), "renamed");
        assert!(ChangeStatus::Copied.has_source());
        assert!(!ChangeStatus::Deleted.has_source());
    }
}
