use crate::model::Note;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const FALLBACK_STEM: &str = "untitled";

/// Writes each note's markdown body to `<dir>/<title>.md`. Returns the files
/// written, in note order.
pub fn export_notes(notes: &[Note], dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {:?}", dir))?;
    let mut taken = HashSet::new();
    let mut written = Vec::with_capacity(notes.len());
    for note in notes {
        let name = unique_name(&sanitize_stem(&note.title), &mut taken);
        let path = dir.join(name);
        fs::write(&path, &note.content).with_context(|| format!("writing {:?}", path))?;
        written.push(path);
    }
    log::info!("exported {} notes to {}", written.len(), dir.display());
    Ok(written)
}

/// Replaces characters that are illegal in file names on common platforms.
pub fn sanitize_stem(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        cleaned.to_string()
    }
}

fn unique_name(stem: &str, taken: &mut HashSet<String>) -> String {
    let mut candidate = format!("{stem}.md");
    let mut n = 2;
    while !taken.insert(candidate.to_lowercase()) {
        candidate = format!("{stem} ({n}).md");
        n += 1;
    }
    candidate
}
