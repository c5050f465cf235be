//! The open document: which file the notes are bound to and whether they
//! changed since the last load or save.
//!
//! A session starts `Empty`. Open, save-as and new bind it to a file; the
//! `dirty` flag is raised by every applied note mutation and cleared only by a
//! successful load or write. Failed operations leave notes, binding and flag
//! exactly as they were.

use crate::gateway::{
    BackendKind, FileIdentity, FilePicker, GatewayError, PersistenceGateway, Picked,
};
use crate::model::{FormatError, Note, NoteField, NoteId, NoteStore};
use crate::settings::Settings;
use log::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Bound {
        identity: FileIdentity,
        display_name: String,
    },
}

/// Questions the session asks before throwing notes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Opening another file while there are unsaved changes.
    DiscardChanges,
    /// Starting a new file while there are unsaved changes.
    NewDiscardingChanges,
    /// Starting a new file while the current one is saved.
    NewClosingCurrent,
}

/// Host services the session needs from whoever drives it.
pub trait Interaction: FilePicker {
    fn confirm(&mut self, question: Confirmation) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Canceled,
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("encoding notes: {0}")]
    Encode(#[from] serde_json::Error),
}

pub struct DocumentSession {
    gateway: Box<dyn PersistenceGateway>,
    store: NoteStore,
    state: SessionState,
    dirty: bool,
    active: Option<NoteId>,
}

impl Confirmation {
    pub fn message(&self) -> &'static str {
        match self {
            Confirmation::DiscardChanges => "You have unsaved changes. Discard them?",
            Confirmation::NewDiscardingChanges => {
                "You have unsaved changes. These will be lost if you create a new file without saving. Continue?"
            }
            Confirmation::NewClosingCurrent => {
                "This will close the current file and start a new empty one. Continue?"
            }
        }
    }
}

impl DocumentSession {
    pub fn new(gateway: Box<dyn PersistenceGateway>) -> Self {
        DocumentSession {
            gateway,
            store: NoteStore::new(),
            state: SessionState::Empty,
            dirty: false,
            active: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// `None` while nothing is bound.
    pub fn backend_kind(&self) -> Option<BackendKind> {
        match self.state {
            SessionState::Empty => None,
            SessionState::Bound { .. } => Some(self.gateway.kind()),
        }
    }

    pub fn identity(&self) -> Option<&FileIdentity> {
        match &self.state {
            SessionState::Empty => None,
            SessionState::Bound { identity, .. } => Some(identity),
        }
    }

    pub fn display_name(&self) -> Option<&str> {
        match &self.state {
            SessionState::Empty => None,
            SessionState::Bound { display_name, .. } => Some(display_name),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_note(&self) -> Option<&Note> {
        self.active.as_deref().and_then(|id| self.store.get(id))
    }

    pub fn select(&mut self, id: Option<&str>) {
        self.active = id.filter(|id| self.store.contains(id)).map(str::to_string);
    }

    pub fn add_note(&mut self, title: Option<String>, content: Option<String>) -> &Note {
        let id = self.store.add(title, content).id.clone();
        self.dirty = true;
        self.active = Some(id);
        &self.store.notes()[0]
    }

    pub fn update_note(&mut self, id: &str, field: NoteField, value: String) -> bool {
        let applied = self.store.update(id, field, value);
        self.dirty |= applied;
        applied
    }

    pub fn delete_note(&mut self, id: &str) -> bool {
        let removed = self.store.remove(id);
        if removed {
            self.dirty = true;
            if self.active.as_deref() == Some(id) {
                self.active = None;
            }
        }
        removed
    }

    pub fn open<I: Interaction>(&mut self, ui: &mut I) -> Result<Outcome, SessionError> {
        if self.dirty && !ui.confirm(Confirmation::DiscardChanges) {
            return Ok(Outcome::Canceled);
        }
        let target = match self.gateway.pick_open_target(ui) {
            Ok(Picked::Chosen(target)) => target,
            Ok(Picked::Canceled) => return Ok(Outcome::Canceled),
            Err(err) => {
                warn!("open failed: {err}");
                return Err(err.into());
            }
        };
        let notes = NoteStore::deserialize(&target.text).map_err(|err| {
            warn!("rejected {}: {err}", target.display_name);
            err
        })?;
        info!("opened {} ({} notes)", target.display_name, notes.len());
        self.store.replace(notes);
        self.bind(target.identity, target.display_name);
        self.active = None;
        Ok(Outcome::Completed)
    }

    /// Writes to the bound file, or behaves as [`save_as`](Self::save_as) when
    /// nothing is bound yet.
    pub fn save<I: Interaction>(&mut self, ui: &mut I) -> Result<Outcome, SessionError> {
        let Some(identity) = self.identity().cloned() else {
            return self.save_as(ui);
        };
        let text = self.store.serialize()?;
        if let Err(err) = self.gateway.save_to_target(&identity, &text) {
            warn!("save failed: {err}");
            return Err(err.into());
        }
        info!("saved {} notes", self.store.len());
        self.dirty = false;
        Ok(Outcome::Completed)
    }

    pub fn save_as<I: Interaction>(&mut self, ui: &mut I) -> Result<Outcome, SessionError> {
        let text = self.store.serialize()?;
        let saved = match self.gateway.pick_save_as_target(ui, &text) {
            Ok(Picked::Chosen(saved)) => saved,
            Ok(Picked::Canceled) => return Ok(Outcome::Canceled),
            Err(err) => {
                warn!("save as failed: {err}");
                return Err(err.into());
            }
        };
        info!("saved {} notes as {}", self.store.len(), saved.display_name);
        self.bind(saved.identity, saved.display_name);
        Ok(Outcome::Completed)
    }

    /// Starts an empty note file. There is no unsaved scratch state: the new
    /// file is written (as `[]`) before the current notes are dropped.
    pub fn new_document<I: Interaction>(&mut self, ui: &mut I) -> Result<Outcome, SessionError> {
        if !self.store.is_empty() {
            let question = if self.dirty {
                Confirmation::NewDiscardingChanges
            } else {
                Confirmation::NewClosingCurrent
            };
            if !ui.confirm(question) {
                return Ok(Outcome::Canceled);
            }
        }
        let empty = NoteStore::new().serialize()?;
        let saved = match self.gateway.pick_save_as_target(ui, &empty) {
            Ok(Picked::Chosen(saved)) => saved,
            Ok(Picked::Canceled) => return Ok(Outcome::Canceled),
            Err(err) => {
                warn!("creating new file failed: {err}");
                return Err(err.into());
            }
        };
        info!("started new file {}", saved.display_name);
        self.store.clear();
        self.active = None;
        self.bind(saved.identity, saved.display_name);
        Ok(Outcome::Completed)
    }

    /// Persisted settings with migrations applied, or the defaults.
    pub fn load_settings(&mut self) -> Settings {
        self.gateway.load_settings().unwrap_or_else(|| {
            info!("no stored settings, using defaults");
            Settings::default()
        })
    }

    pub fn save_settings(&mut self, settings: &Settings) -> Result<(), GatewayError> {
        self.gateway.save_settings(settings).map_err(|err| {
            warn!("saving settings failed: {err}");
            err
        })
    }

    #[cfg(test)]
    pub(crate) fn gateway_mut(&mut self) -> &mut dyn PersistenceGateway {
        self.gateway.as_mut()
    }

    fn bind(&mut self, identity: FileIdentity, display_name: String) {
        let previous = std::mem::replace(
            &mut self.state,
            SessionState::Bound {
                identity,
                display_name,
            },
        );
        if let SessionState::Bound { identity: old, .. } = previous {
            if self.identity() != Some(&old) {
                self.gateway.release(&old);
            }
        }
        self.dirty = false;
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Disk, MemoryGateway, ScriptedUser};
    use super::*;
    use crate::gateway::HandleBackend;
    use std::fs;
    use crate::settings::ThemeMode;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    fn session() -> (DocumentSession, Rc<RefCell<Disk>>) {
        let (gateway, disk) = MemoryGateway::new();
        (DocumentSession::new(Box::new(gateway)), disk)
    }

    fn path_identity(path: &str) -> FileIdentity {
        FileIdentity::Path(PathBuf::from(path))
    }

    fn bound(session: &mut DocumentSession, path: &str) {
        let outcome = session.save_as(&mut ScriptedUser::picking(path)).unwrap();
        assert_eq!(outcome, Outcome::Completed);
    }

    #[test]
    fn starts_empty_and_clean() {
        let (session, _) = session();
        assert_eq!(session.state(), &SessionState::Empty);
        assert_eq!(session.backend_kind(), None);
        assert!(!session.is_dirty());
        assert!(session.store().is_empty());
    }

    #[test]
    fn save_while_empty_behaves_as_save_as() {
        let (mut via_save, _) = session();
        via_save.add_note(Some("x".into()), None);
        via_save.save(&mut ScriptedUser::picking("/n/a.json")).unwrap();

        let (mut via_save_as, _) = session();
        via_save_as.add_note(Some("x".into()), None);
        via_save_as
            .save_as(&mut ScriptedUser::picking("/n/a.json"))
            .unwrap();

        assert_eq!(via_save.state(), via_save_as.state());
        assert_eq!(via_save.is_dirty(), via_save_as.is_dirty());
        assert_eq!(via_save.backend_kind(), Some(BackendKind::Native));
    }

    #[test]
    fn canceled_save_as_changes_nothing() {
        let (mut session, disk) = session();
        session.add_note(None, None);
        let outcome = session.save_as(&mut ScriptedUser::default()).unwrap();
        assert_eq!(outcome, Outcome::Canceled);
        assert_eq!(session.state(), &SessionState::Empty);
        assert!(session.is_dirty());
        assert!(disk.borrow().files.is_empty());
    }

    #[test]
    fn save_clears_dirty_and_keeps_identity() {
        let (mut session, disk) = session();
        bound(&mut session, "/n/t.json");
        assert!(!session.is_dirty());
        let id = session.add_note(Some("a".into()), None).id.clone();
        assert!(session.is_dirty());

        session.save(&mut ScriptedUser::default()).unwrap();
        assert!(!session.is_dirty());
        assert_eq!(session.identity(), Some(&path_identity("/n/t.json")));
        assert!(disk.borrow().files[&PathBuf::from("/n/t.json")].contains(&id));
    }

    #[test]
    fn failed_save_keeps_dirty_and_identity() {
        let (mut session, disk) = session();
        bound(&mut session, "/n/t.json");
        session.add_note(None, None);
        disk.borrow_mut().fail_writes = true;

        let err = session.save(&mut ScriptedUser::default()).unwrap_err();
        assert!(matches!(err, SessionError::Gateway(GatewayError::Io { .. })));
        assert!(session.is_dirty());
        assert_eq!(session.identity(), Some(&path_identity("/n/t.json")));
        assert_eq!(disk.borrow().files[&PathBuf::from("/n/t.json")], "[]");
    }

    #[test]
    fn mutations_raise_dirty_only_when_applied() {
        let (mut session, _) = session();
        bound(&mut session, "/n/t.json");
        assert!(!session.update_note("nope", NoteField::Title, "x".into()));
        assert!(!session.delete_note("nope"));
        assert!(!session.is_dirty());

        let id = session.add_note(None, None).id.clone();
        session.save(&mut ScriptedUser::default()).unwrap();
        assert!(session.update_note(&id, NoteField::Content, "body".into()));
        assert!(session.is_dirty());

        session.save(&mut ScriptedUser::default()).unwrap();
        assert!(session.delete_note(&id));
        assert!(session.is_dirty());
        assert_eq!(session.active_id(), None);
    }

    #[test]
    fn open_replaces_notes_and_binds() {
        let (mut session, disk) = session();
        disk.borrow_mut().files.insert(
            PathBuf::from("/n/o.json"),
            r#"[{"id":"k","title":"T","content":"C","createdAt":1,"updatedAt":2}]"#.into(),
        );
        session.add_note(None, None);
        session.select(None);

        let mut user = ScriptedUser::picking("/n/o.json");
        user.confirms.push_back(true);
        assert_eq!(session.open(&mut user).unwrap(), Outcome::Completed);
        assert_eq!(user.asked, vec![Confirmation::DiscardChanges]);
        assert_eq!(session.store().len(), 1);
        assert_eq!(session.store().notes()[0].id, "k");
        assert_eq!(session.display_name(), Some("o.json"));
        assert!(!session.is_dirty());
        assert_eq!(session.active_id(), None);
    }

    #[test]
    fn open_declined_or_canceled_is_a_no_op() {
        let (mut session, _) = session();
        session.add_note(Some("keep".into()), None);
        let before = session.store().clone();

        let mut declines = ScriptedUser::picking("/n/o.json");
        declines.confirms.push_back(false);
        assert_eq!(session.open(&mut declines).unwrap(), Outcome::Canceled);
        assert_eq!(declines.picks.len(), 1);

        let mut cancels = ScriptedUser::default();
        cancels.confirms.push_back(true);
        assert_eq!(session.open(&mut cancels).unwrap(), Outcome::Canceled);

        assert_eq!(session.store(), &before);
        assert!(session.is_dirty());
        assert_eq!(session.state(), &SessionState::Empty);
    }

    #[test]
    fn open_with_bad_format_leaves_everything_unchanged() {
        let (mut session, disk) = session();
        bound(&mut session, "/n/t.json");
        let id = session.add_note(Some("mine".into()), None).id.clone();
        disk.borrow_mut()
            .files
            .insert(PathBuf::from("/n/bad.json"), "{}".into());
        let store_before = session.store().clone();
        let state_before = session.state().clone();

        let mut user = ScriptedUser::picking("/n/bad.json");
        user.confirms.push_back(true);
        let err = session.open(&mut user).unwrap_err();
        assert!(matches!(err, SessionError::Format(FormatError::NotAnArray)));
        assert_eq!(session.store(), &store_before);
        assert_eq!(session.state(), &state_before);
        assert!(session.is_dirty());
        assert_eq!(session.active_id(), Some(id.as_str()));
    }

    #[test]
    fn open_of_unreadable_file_reports_io() {
        let (mut session, _) = session();
        let err = session
            .open(&mut ScriptedUser::picking("/n/missing.json"))
            .unwrap_err();
        assert!(matches!(err, SessionError::Gateway(GatewayError::Io { .. })));
        assert_eq!(session.state(), &SessionState::Empty);
    }

    #[test]
    fn new_document_asks_according_to_dirty_state() {
        let (mut session, disk) = session();
        bound(&mut session, "/n/t.json");
        session.add_note(None, None);

        let mut declines = ScriptedUser::picking("/n/new.json");
        declines.confirms.push_back(false);
        assert_eq!(
            session.new_document(&mut declines).unwrap(),
            Outcome::Canceled
        );
        assert_eq!(declines.asked, vec![Confirmation::NewDiscardingChanges]);
        assert_eq!(session.store().len(), 1);

        session.save(&mut ScriptedUser::default()).unwrap();
        let mut accepts = ScriptedUser::picking("/n/new.json");
        accepts.confirms.push_back(true);
        assert_eq!(
            session.new_document(&mut accepts).unwrap(),
            Outcome::Completed
        );
        assert_eq!(accepts.asked, vec![Confirmation::NewClosingCurrent]);
        assert!(session.store().is_empty());
        assert_eq!(session.identity(), Some(&path_identity("/n/new.json")));
        assert!(!session.is_dirty());
        assert_eq!(disk.borrow().files[&PathBuf::from("/n/new.json")], "[]");
    }

    #[test]
    fn new_document_without_notes_skips_confirmation() {
        let (mut session, _) = session();
        let mut user = ScriptedUser::picking("/n/first.json");
        assert_eq!(session.new_document(&mut user).unwrap(), Outcome::Completed);
        assert!(user.asked.is_empty());
        assert_eq!(session.display_name(), Some("first.json"));
    }

    #[test]
    fn new_document_canceled_keeps_current_notes() {
        let (mut session, _) = session();
        session.add_note(None, None);
        let mut user = ScriptedUser::default();
        user.confirms.push_back(true);
        assert_eq!(session.new_document(&mut user).unwrap(), Outcome::Canceled);
        assert_eq!(session.store().len(), 1);
        assert!(session.is_dirty());
    }

    #[test]
    fn settings_fall_back_to_defaults_and_failures_are_reported() {
        let (mut session, disk) = session();
        assert_eq!(session.load_settings(), Settings::default());

        let dark = Settings {
            theme_mode: ThemeMode::Dark,
            ..Settings::default()
        };
        session.save_settings(&dark).unwrap();
        assert_eq!(session.load_settings(), dark);

        disk.borrow_mut().fail_writes = true;
        assert!(session.save_settings(&Settings::default()).is_err());
        assert_eq!(session.load_settings(), dark);
    }

    #[test]
    fn add_edit_save_walkthrough() {
        let (mut session, disk) = session();
        let id = session
            .add_note(Some("Title A".into()), Some("Body A".into()))
            .id
            .clone();
        assert_eq!(session.store().len(), 1);
        assert!(session.is_dirty());
        assert_eq!(session.active_id(), Some(id.as_str()));

        bound(&mut session, "/n/T.json");
        assert!(!session.is_dirty());
        let first_update = session.store().get(&id).unwrap().updated_at;

        session.update_note(&id, NoteField::Content, "Body A2".into());
        assert!(session.is_dirty());
        assert!(session.store().get(&id).unwrap().updated_at >= first_update);

        session.save(&mut ScriptedUser::default()).unwrap();
        assert!(!session.is_dirty());
        assert_eq!(session.identity(), Some(&path_identity("/n/T.json")));

        let written = disk.borrow().files[&PathBuf::from("/n/T.json")].clone();
        let notes = NoteStore::deserialize(&written).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, id);
        assert_eq!(notes[0].title, "Title A");
        assert_eq!(notes[0].content, "Body A2");
    }

    #[test]
    fn rebinding_releases_the_previous_file_only() {
        let (mut session, disk) = session();
        bound(&mut session, "/n/a.json");
        bound(&mut session, "/n/a.json");
        assert!(disk.borrow().released.is_empty());

        bound(&mut session, "/n/b.json");
        assert_eq!(disk.borrow().released, vec![path_identity("/n/a.json")]);
    }

    #[test]
    fn save_through_a_revoked_handle_fails_and_stays_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = HandleBackend::new(dir.path().join("storage.json"));
        let mut session = DocumentSession::new(Box::new(backend));
        let path = dir.path().join("notes.json");
        let id = session.add_note(Some("kept".into()), None).id.clone();
        let mut user = ScriptedUser::picking(path.to_str().unwrap());
        assert_eq!(session.save_as(&mut user).unwrap(), Outcome::Completed);
        let identity = session.identity().cloned().unwrap();
        assert!(matches!(identity, FileIdentity::Handle(_)));

        session.update_note(&id, NoteField::Content, "changed".into());
        session.gateway_mut().release(&identity);
        let err = session.save(&mut ScriptedUser::default()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Gateway(GatewayError::HandleRevoked(_))
        ));
        assert!(session.is_dirty());
        assert_eq!(session.identity(), Some(&identity));

        let on_disk = NoteStore::deserialize(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk[0].content, "");
    }
}
