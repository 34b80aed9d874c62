use super::types::{ChangeStatus, ChangedFile};
use super::PrError;

/// Parse the output of `git diff --name-status -z` into the files it names.
///
/// Records are NUL-separated: a status token (`M`, `A`, `D`, `R100`, ...)
/// followed by one path, or two paths (source, destination) for renames and
/// copies. With `-z` git writes paths verbatim, so spaces, quotes and
/// non-ASCII names come through unchanged.
pub fn parse_name_status(raw: &str) -> Result<Vec<ChangedFile>, PrError> {
    let mut files = Vec::new();
    let mut fields = raw.split('\0').filter(|field| !field.is_empty());

    while let Some(code) = fields.next() {
        let status = ChangeStatus::from_git(code.trim());
        let first = fields
            .next()
            .ok_or_else(|| PrError::DiffParse(format!("Missing path after status {code:?}")))?;

        let file = if status.has_source() {
            let destination = fields.next().ok_or_else(|| {
                PrError::DiffParse(format!("Missing destination path after {first:?}"))
            })?;
            ChangedFile {
                path: destination.to_string(),
                old_path: Some(first.to_string()),
                status,
            }
        } else {
            ChangedFile {
                path: first.to_string(),
                old_path: None,
                status,
            }
        };
        files.push(file);
    }

    Ok(files)
}
