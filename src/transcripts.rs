//! Transcript discovery and file-level parsing.
//!
//! The transcript root holds one directory per project; each project holds
//! `<session-id>.jsonl` files. Discovery is non-recursive within a project
//! and sorted so runs are deterministic.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use convo_recall_core::models::Exchange;
use convo_recall_core::parser::parse_transcript;

/// A transcript found under the transcript root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFile {
    pub project: String,
    pub file_name: String,
    pub path: PathBuf,
}

/// Compile excluded-project patterns. A plain name matches only itself.
pub fn build_exclusions(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern)
                .with_context(|| format!("Invalid excluded_projects pattern: {}", pattern))?,
        );
    }
    Ok(builder.build()?)
}

/// Project directory names under `root`, sorted, minus exclusions.
pub fn list_projects(root: &Path, excluded: &GlobSet) -> Result<Vec<String>> {
    if !root.is_dir() {
        bail!("Transcript root does not exist: {}", root.display());
    }

    let mut projects = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if excluded.is_match(&name) {
            tracing::debug!("skipping excluded project {}", name);
            continue;
        }
        projects.push(name);
    }
    projects.sort();
    Ok(projects)
}

/// `*.jsonl` files directly inside one project directory, sorted by name.
pub fn list_transcripts(root: &Path, project: &str) -> Result<Vec<TranscriptFile>> {
    let dir = root.join(project);
    let mut files = Vec::new();
    for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        if !file_name.ends_with(".jsonl") {
            continue;
        }
        files.push(TranscriptFile {
            project: project.to_string(),
            file_name,
            path: entry.path().to_path_buf(),
        });
    }
    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(files)
}

/// Every transcript of every non-excluded project.
pub fn discover(root: &Path, excluded: &GlobSet) -> Result<Vec<TranscriptFile>> {
    let mut all = Vec::new();
    for project in list_projects(root, excluded)? {
        all.extend(list_transcripts(root, &project)?);
    }
    Ok(all)
}

/// The first transcript (in discovery order) whose file name contains
/// `session_id`.
pub fn find_session(
    root: &Path,
    excluded: &GlobSet,
    session_id: &str,
) -> Result<Option<TranscriptFile>> {
    Ok(discover(root, excluded)?
        .into_iter()
        .find(|t| t.file_name.contains(session_id)))
}

/// Read and parse a transcript file. Invalid UTF-8 is replaced rather than
/// rejected, so a damaged byte only spoils the record it sits in.
pub fn parse_file(path: &Path, project: &str, archive_path: &Path) -> Result<Vec<Exchange>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(parse_transcript(
        &text,
        project,
        &archive_path.to_string_lossy(),
    ))
}

/// The file to read for an archived transcript: the live transcript at
/// `<transcript_root>/<project>/<file>` while it exists, else the archive
/// copy itself.
pub fn current_transcript(transcript_root: &Path, archive_path: &Path) -> PathBuf {
    if let Some(file_name) = archive_path.file_name() {
        let live = transcript_root.join(project_of(archive_path)).join(file_name);
        if live.is_file() {
            return live;
        }
    }
    archive_path.to_path_buf()
}

/// Project name of an archive copy: its parent directory name.
pub fn project_of(archive_path: &Path) -> String {
    archive_path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn discovery_is_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(&root.join("beta/b.jsonl"));
        touch(&root.join("beta/a.jsonl"));
        touch(&root.join("beta/notes.txt"));
        touch(&root.join("alpha/z.jsonl"));
        touch(&root.join("meta-introspection/x.jsonl"));
        touch(&root.join("stray.jsonl"));

        let excluded = build_exclusions(&["meta-*".to_string()]).unwrap();
        let found: Vec<(String, String)> = discover(root, &excluded)
            .unwrap()
            .into_iter()
            .map(|t| (t.project, t.file_name))
            .collect();
        assert_eq!(
            found,
            vec![
                ("alpha".to_string(), "z.jsonl".to_string()),
                ("beta".to_string(), "a.jsonl".to_string()),
                ("beta".to_string(), "b.jsonl".to_string()),
            ]
        );
    }

    #[test]
    fn plain_exclusion_matches_exactly() {
        let excluded = build_exclusions(&["proj".to_string()]).unwrap();
        assert!(excluded.is_match("proj"));
        assert!(!excluded.is_match("proj-2"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let excluded = build_exclusions(&[]).unwrap();
        assert!(discover(&tmp.path().join("nope"), &excluded).is_err());
    }

    #[test]
    fn find_session_by_substring() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("p/aaaa-1111.jsonl"));
        touch(&tmp.path().join("p/bbbb-2222.jsonl"));
        let excluded = build_exclusions(&[]).unwrap();
        let found = find_session(tmp.path(), &excluded, "bbbb").unwrap().unwrap();
        assert_eq!(found.file_name, "bbbb-2222.jsonl");
        assert!(find_session(tmp.path(), &excluded, "cccc").unwrap().is_none());
    }

    #[test]
    fn current_transcript_prefers_live_file() {
        let tmp = TempDir::new().unwrap();
        let live_root = tmp.path().join("live");
        let archive = tmp.path().join("archive/p/s.jsonl");
        touch(&archive);

        assert_eq!(current_transcript(&live_root, &archive), archive);

        touch(&live_root.join("p/s.jsonl"));
        assert_eq!(
            current_transcript(&live_root, &archive),
            live_root.join("p/s.jsonl")
        );
    }

    #[test]
    fn parse_file_tolerates_invalid_utf8() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("p/s.jsonl");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(
            br#"{"type":"user","message":{"role":"user","content":"q"}}"#,
        );
        bytes.push(b'\n');
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        bytes.extend_from_slice(
            br#"{"type":"assistant","message":{"role":"assistant","content":"a"}}"#,
        );
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, bytes).unwrap();

        let exchanges = parse_file(&path, "p", &path).unwrap();
        assert_eq!(exchanges.len(), 1);
        assert_eq!(exchanges[0].line_start, 1);
        assert_eq!(exchanges[0].line_end, 3);
        assert_eq!(project_of(&path), "p");
    }
}
