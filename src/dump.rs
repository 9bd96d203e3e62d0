//! `recall dump <file>`: show exactly what the summarizer would see.

use anyhow::{bail, Result};
use std::path::Path;

use convo_recall_core::parser::format_conversation;

use crate::transcripts;

/// Parse a transcript and render its conversation text with a short header.
pub fn dump_transcript(path: &Path) -> Result<String> {
    if !path.is_file() {
        bail!("Transcript not found: {}", path.display());
    }
    let project = transcripts::project_of(path);
    let exchanges = transcripts::parse_file(path, &project, path)?;
    let text = format_conversation(&exchanges);

    Ok(format!(
        "Exchanges: {}\nCharacters: {}\n\n{}\n",
        exchanges.len(),
        text.chars().count(),
        text
    ))
}

pub fn run_dump(path: &Path) -> Result<()> {
    print!("{}", dump_transcript(path)?);
    Ok(())
}
