use crate::cli::GlobalArgs;
use crate::export::export_notes;
use crate::gateway::{self, FilePicker};
use crate::model::{Note, NoteField};
use crate::profile::Profile;
use crate::session::{Confirmation, DocumentSession, Interaction, Outcome};
use crate::settings::{Settings, ThemeMode};
use crate::ui;
use anyhow::{bail, Context, Result};
use chrono::Local;
use std::path::PathBuf;

/// Non-interactive stand-in for the dialogs: every pick returns the file named
/// on the command line and every confirmation is granted, since running the
/// command is the user's consent.
struct CommandLine {
    file: PathBuf,
}

impl FilePicker for CommandLine {
    fn pick_open_path(&mut self) -> Option<PathBuf> {
        Some(self.file.clone())
    }

    fn pick_save_path(&mut self) -> Option<PathBuf> {
        Some(self.file.clone())
    }
}

impl Interaction for CommandLine {
    fn confirm(&mut self, question: Confirmation) -> bool {
        log::debug!("auto-confirmed: {}", question.message());
        true
    }
}

pub fn list(global: &GlobalArgs, profile: &Profile, file: PathBuf, search: Option<String>) -> Result<()> {
    let (session, _) = open_document(global, profile, file, false)?;
    let term = search.unwrap_or_default();
    let notes = session.store().search(&term);
    println!(
        "{} ({} notes)",
        session.display_name().unwrap_or("untitled"),
        session.store().len()
    );
    if notes.is_empty() {
        println!("  (no notes found)");
    }
    for note in notes {
        print_note(note);
    }
    Ok(())
}

pub fn add(
    global: &GlobalArgs,
    profile: &Profile,
    file: PathBuf,
    title: String,
    content: Option<String>,
) -> Result<()> {
    let (mut session, mut cli) = open_document(global, profile, file, true)?;
    let id = session.add_note(Some(title), content).id.clone();
    save(&mut session, &mut cli)?;
    println!("Added note {}", id);
    Ok(())
}

pub fn edit(
    global: &GlobalArgs,
    profile: &Profile,
    file: PathBuf,
    note_id: String,
    title: Option<String>,
    content: Option<String>,
) -> Result<()> {
    if title.is_none() && content.is_none() {
        bail!("nothing to change: pass --title and/or --content");
    }
    let (mut session, mut cli) = open_document(global, profile, file, false)?;
    if !session.store().contains(&note_id) {
        bail!("note {} not found", note_id);
    }
    if let Some(t) = title {
        session.update_note(&note_id, NoteField::Title, t);
    }
    if let Some(c) = content {
        session.update_note(&note_id, NoteField::Content, c);
    }
    save(&mut session, &mut cli)?;
    println!("Updated note {}", note_id);
    Ok(())
}

pub fn delete(global: &GlobalArgs, profile: &Profile, file: PathBuf, note_id: String) -> Result<()> {
    let (mut session, mut cli) = open_document(global, profile, file, false)?;
    if !session.delete_note(&note_id) {
        bail!("note {} not found", note_id);
    }
    save(&mut session, &mut cli)?;
    println!("Deleted note {}", note_id);
    Ok(())
}

pub fn export(global: &GlobalArgs, profile: &Profile, file: PathBuf, dir: PathBuf) -> Result<()> {
    let (session, _) = open_document(global, profile, file, false)?;
    let written = export_notes(session.store().notes(), &dir)?;
    println!("Exported {} notes to {}", written.len(), dir.display());
    Ok(())
}

pub fn settings(
    global: &GlobalArgs,
    profile: &Profile,
    theme: Option<ThemeMode>,
    color: Option<String>,
    font_size: Option<u32>,
    editor_font_size: Option<u32>,
    reset: bool,
) -> Result<()> {
    let mut session = DocumentSession::new(gateway::connect(global.backend, profile));
    let mut settings = if reset {
        Settings::default()
    } else {
        session.load_settings()
    };
    let changed = apply_settings(&mut settings, theme, color, font_size, editor_font_size) || reset;
    if changed {
        session
            .save_settings(&settings)
            .context("saving settings")?;
    }
    println!("accent:      {} ({})", settings.accent_name(), settings.primary_color);
    println!("theme:       {}", settings.theme_mode.label());
    println!("font size:   {}", settings.font_size);
    println!("editor size: {}", settings.editor_font_size);
    Ok(())
}

pub fn tui(global: &GlobalArgs, profile: &Profile) -> Result<()> {
    let session = DocumentSession::new(gateway::connect(global.backend, profile));
    ui::run(session)
}

/// Loads `file` into a fresh session. With `create`, a missing file is
/// started as a new empty document instead. A path that does not exist as
/// typed is looked up where the backend would save it.
fn open_document(
    global: &GlobalArgs,
    profile: &Profile,
    file: PathBuf,
    create: bool,
) -> Result<(DocumentSession, CommandLine)> {
    let gateway = gateway::connect(global.backend, profile);
    let file = if file.exists() {
        file
    } else {
        gateway.save_path_for(file)
    };
    let mut session = DocumentSession::new(gateway);
    let mut cli = CommandLine { file: file.clone() };
    if create && !file.exists() {
        session
            .new_document(&mut cli)
            .with_context(|| format!("creating {:?}", file))?;
    } else {
        session
            .open(&mut cli)
            .with_context(|| format!("opening {:?}", file))?;
    }
    Ok((session, cli))
}

fn save(session: &mut DocumentSession, cli: &mut CommandLine) -> Result<()> {
    match session.save(cli).with_context(|| format!("saving {:?}", cli.file))? {
        Outcome::Completed => Ok(()),
        Outcome::Canceled => bail!("save was canceled"),
    }
}

/// Applies the given overrides, with sizes clamped into range. Returns whether
/// anything was given.
fn apply_settings(
    settings: &mut Settings,
    theme: Option<ThemeMode>,
    color: Option<String>,
    font_size: Option<u32>,
    editor_font_size: Option<u32>,
) -> bool {
    let mut changed = false;
    if let Some(theme) = theme {
        settings.theme_mode = theme;
        changed = true;
    }
    if let Some(color) = color.filter(|c| !c.trim().is_empty()) {
        settings.primary_color = color.trim().to_string();
        changed = true;
    }
    if let Some(size) = font_size {
        settings.font_size = size;
        settings.step_font_size(0);
        changed = true;
    }
    if let Some(size) = editor_font_size {
        settings.editor_font_size = size;
        settings.step_editor_font_size(0);
        changed = true;
    }
    changed
}

fn format_timestamp(note: &Note) -> String {
    note.updated_at
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

fn print_note(note: &Note) {
    println!("  - {}: {}  ({})", note.id, note.display_title(), format_timestamp(note));
    if let Some(first) = note.content.lines().find(|l| !l.trim().is_empty()) {
        println!("    {}", first.trim());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::BackendKind;
    use crate::model::NoteStore;
    use std::fs;
    use std::path::Path;

    fn global(backend: BackendKind) -> GlobalArgs {
        GlobalArgs {
            backend,
            profile_dir: None,
            log_level: None,
        }
    }

    fn read_notes(path: &Path) -> Vec<Note> {
        NoteStore::deserialize(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn add_creates_missing_file_then_edit_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let profile = Profile::single(dir.path().join("profile"));
        let file = dir.path().join("notes.json");
        for backend in [BackendKind::Native, BackendKind::Handle] {
            let _ = fs::remove_file(&file);
            let g = global(backend);
            add(&g, &profile, file.clone(), "First".into(), Some("body".into())).unwrap();
            let notes = read_notes(&file);
            assert_eq!(notes.len(), 1);
            let id = notes[0].id.clone();

            edit(&g, &profile, file.clone(), id.clone(), None, Some("changed".into())).unwrap();
            assert_eq!(read_notes(&file)[0].content, "changed");
            assert!(edit(&g, &profile, file.clone(), "missing".into(), Some("x".into()), None).is_err());

            delete(&g, &profile, file.clone(), id).unwrap();
            assert!(read_notes(&file).is_empty());
        }
    }

    #[test]
    fn adding_twice_to_a_bare_name_keeps_earlier_notes() {
        let dir = tempfile::tempdir().unwrap();
        let profile = Profile::single(dir.path().join("profile"));
        let bare = dir.path().join("notes");
        let g = global(BackendKind::Native);
        add(&g, &profile, bare.clone(), "First".into(), None).unwrap();
        add(&g, &profile, bare.clone(), "Second".into(), None).unwrap();

        assert!(!bare.exists());
        let notes = read_notes(&dir.path().join("notes.json"));
        let titles: Vec<&str> = notes.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Second", "First"]);

        edit(&g, &profile, bare.clone(), notes[1].id.clone(), None, Some("x".into())).unwrap();
        assert_eq!(read_notes(&dir.path().join("notes.json")).len(), 2);
    }

    #[test]
    fn commands_refuse_files_that_are_not_note_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let profile = Profile::single(dir.path().join("profile"));
        let file = dir.path().join("object.json");
        fs::write(&file, "{}").unwrap();
        let err = add(&global(BackendKind::Native), &profile, file.clone(), "x".into(), None)
            .unwrap_err();
        assert!(format!("{err:#}").contains("not an array"));
        assert_eq!(fs::read_to_string(&file).unwrap(), "{}");
    }

    #[test]
    fn settings_overrides_are_clamped_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let profile = Profile::single(dir.path().to_path_buf());
        let g = global(BackendKind::Native);
        settings(&g, &profile, Some(ThemeMode::Matrix), None, Some(40), None, false).unwrap();

        let mut session = DocumentSession::new(gateway::connect(g.backend, &profile));
        let stored = session.load_settings();
        assert_eq!(stored.theme_mode, ThemeMode::Matrix);
        assert_eq!(stored.font_size, 20);

        settings(&g, &profile, None, None, None, None, true).unwrap();
        assert_eq!(session.load_settings(), Settings::default());
    }
}
