use chrono::{DateTime, SubsecRound, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

pub type NoteId = String;

pub const UNTITLED: &str = "Untitled Note";

const ID_LEN: usize = 12;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteField {
    Title,
    Content,
}

#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("not valid JSON: {0}")]
    Syntax(#[source] serde_json::Error),
    #[error("invalid file format: not an array of notes")]
    NotAnArray,
    #[error("note #{index} is malformed: {source}")]
    InvalidNote {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate note id: {0}")]
    DuplicateId(NoteId),
}

/// Ordered collection of notes. Storage order is insertion order with the
/// newest note first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteStore {
    notes: Vec<Note>,
}

impl Note {
    pub fn new(id: NoteId, title: String, content: String) -> Self {
        let now = now();
        Note {
            id,
            title,
            content,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            UNTITLED
        } else {
            &self.title
        }
    }

    fn touch(&mut self) {
        self.updated_at = now().max(self.created_at);
    }

    fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle) || self.content.to_lowercase().contains(needle)
    }
}

impl NoteStore {
    pub fn new() -> Self {
        NoteStore::default()
    }

    #[cfg(test)]
    pub fn from_notes(notes: Vec<Note>) -> Self {
        NoteStore { notes }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn add(&mut self, title: Option<String>, content: Option<String>) -> &Note {
        let id = self.fresh_id();
        let note = Note::new(
            id,
            title.unwrap_or_else(|| UNTITLED.to_string()),
            content.unwrap_or_default(),
        );
        self.notes.insert(0, note);
        &self.notes[0]
    }

    /// Replaces one field of the note and bumps `updated_at`. Returns `false`
    /// without touching anything when `id` is unknown.
    pub fn update(&mut self, id: &str, field: NoteField, value: String) -> bool {
        let Some(note) = self.notes.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        match field {
            NoteField::Title => note.title = value,
            NoteField::Content => note.content = value,
        }
        note.touch();
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        self.notes.len() != before
    }

    pub fn replace(&mut self, notes: Vec<Note>) {
        self.notes = notes;
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }

    /// Display order: most recently updated first.
    pub fn by_recent(&self) -> Vec<&Note> {
        let mut notes: Vec<&Note> = self.notes.iter().collect();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        notes
    }

    pub fn search(&self, term: &str) -> Vec<&Note> {
        let needle = term.trim().to_lowercase();
        self.by_recent()
            .into_iter()
            .filter(|n| needle.is_empty() || n.matches(&needle))
            .collect()
    }

    pub fn serialize(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.notes)
    }

    pub fn deserialize(text: &str) -> Result<Vec<Note>, FormatError> {
        let value: Value = serde_json::from_str(text).map_err(FormatError::Syntax)?;
        let Value::Array(items) = value else {
            return Err(FormatError::NotAnArray);
        };
        let mut seen = HashSet::new();
        let mut notes = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let mut note: Note = serde_json::from_value(item)
                .map_err(|source| FormatError::InvalidNote { index, source })?;
            if !seen.insert(note.id.clone()) {
                return Err(FormatError::DuplicateId(note.id));
            }
            note.updated_at = note.updated_at.max(note.created_at);
            notes.push(note);
        }
        Ok(notes)
    }

    fn fresh_id(&self) -> NoteId {
        loop {
            let id = generate_id();
            if !self.contains(&id) {
                return id;
            }
        }
    }
}

/// Wall-clock time truncated to the millisecond precision the file format keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn generate_id() -> NoteId {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}
