//! Archive manager.
//!
//! Mirrors each transcript into `<archive_root>/<project>/<file>` exactly
//! once. An existing archive copy is never overwritten, so it stays the
//! stable provenance anchor for exchange ids even if the live transcript
//! keeps growing. Summaries sit next to their archive copy as
//! `<stem>-summary.txt`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Result of [`archive_transcript`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Copied,
    AlreadyArchived,
}

/// Destination of `file_name` from `project` inside `archive_root`.
pub fn archive_path_for(archive_root: &Path, project: &str, file_name: &str) -> PathBuf {
    archive_root.join(project).join(file_name)
}

/// Copy `source` to `dest` unless `dest` already exists.
pub fn archive_transcript(source: &Path, dest: &Path) -> Result<ArchiveOutcome> {
    if dest.exists() {
        return Ok(ArchiveOutcome::AlreadyArchived);
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create archive directory: {}", parent.display()))?;
    }
    std::fs::copy(source, dest).with_context(|| {
        format!(
            "Failed to archive {} to {}",
            source.display(),
            dest.display()
        )
    })?;
    Ok(ArchiveOutcome::Copied)
}

/// `foo.jsonl` → `foo-summary.txt` in the same directory.
pub fn summary_path_for(archive_path: &Path) -> PathBuf {
    let stem = archive_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    archive_path.with_file_name(format!("{}-summary.txt", stem))
}

/// Whether `path` names a summary file.
pub fn is_summary_file(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().ends_with("-summary.txt"))
        .unwrap_or(false)
}

/// Write a summary next to its archive copy.
pub fn write_summary(archive_path: &Path, summary: &str) -> Result<PathBuf> {
    let path = summary_path_for(archive_path);
    std::fs::write(&path, summary)
        .with_context(|| format!("Failed to write summary: {}", path.display()))?;
    Ok(path)
}
