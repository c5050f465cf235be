//! Where notes and settings live.
//!
//! The document session talks to storage only through [`PersistenceGateway`].
//! Two backends implement it: [`NativeBackend`] addresses files by path,
//! [`HandleBackend`] keeps a granted file handle per picked file and addresses
//! it by an opaque id. Picking a file is a host service consumed through
//! [`FilePicker`]; a declined pick is [`Picked::Canceled`], never an error.

mod handle;
mod native;

pub use handle::HandleBackend;
pub use native::NativeBackend;

use crate::profile::Profile;
use crate::settings::Settings;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    /// Files addressed by filesystem path
    Native,
    /// Files addressed by a handle granted when picked
    Handle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileIdentity {
    Path(PathBuf),
    Handle(HandleId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Picked<T> {
    Canceled,
    Chosen(T),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedTarget {
    pub identity: FileIdentity,
    pub display_name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedTarget {
    pub identity: FileIdentity,
    pub display_name: String,
}

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("failed {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} no longer exists", .0.display())]
    Stale(PathBuf),
    #[error("access to {0} was revoked")]
    HandleRevoked(HandleId),
    #[error("{0:?} does not belong to this backend")]
    ForeignIdentity(FileIdentity),
    #[error("{} is not a valid key-value store: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("encoding settings: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Host dialogs for choosing files. `None` means the user dismissed the dialog.
pub trait FilePicker {
    fn pick_open_path(&mut self) -> Option<PathBuf>;
    fn pick_save_path(&mut self) -> Option<PathBuf>;
}

pub trait PersistenceGateway {
    fn kind(&self) -> BackendKind;

    /// Lets the user choose an existing note file and reads it.
    fn pick_open_target(
        &mut self,
        picker: &mut dyn FilePicker,
    ) -> Result<Picked<OpenedTarget>, GatewayError>;

    /// Lets the user choose a new location and writes `text` there. The file
    /// is either fully written or left untouched.
    fn pick_save_as_target(
        &mut self,
        picker: &mut dyn FilePicker,
        text: &str,
    ) -> Result<Picked<SavedTarget>, GatewayError>;

    /// Where a save-as to `chosen` actually lands.
    fn save_path_for(&self, chosen: PathBuf) -> PathBuf {
        chosen
    }

    /// Overwrites a previously chosen target. One attempt, no retry.
    fn save_to_target(&mut self, identity: &FileIdentity, text: &str) -> Result<(), GatewayError>;

    /// `None` when no settings were ever saved or they cannot be read.
    fn load_settings(&mut self) -> Option<Settings>;

    fn save_settings(&mut self, settings: &Settings) -> Result<(), GatewayError>;

    /// Called when the session stops using `identity`.
    fn release(&mut self, _identity: &FileIdentity) {}
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Native => write!(f, "native"),
            BackendKind::Handle => write!(f, "handle"),
        }
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle #{}", self.0)
    }
}

/// Builds the backend selected at startup.
pub fn connect(kind: BackendKind, profile: &Profile) -> Box<dyn PersistenceGateway> {
    match kind {
        BackendKind::Native => {
            let backend = NativeBackend::new(profile.settings_file());
            log::info!("native backend, settings in {}", backend.settings_path().display());
            Box::new(backend)
        }
        BackendKind::Handle => {
            let backend = HandleBackend::new(profile.storage_file());
            log::info!("handle backend, storage in {}", backend.storage_path().display());
            Box::new(backend)
        }
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// Writes through a temporary sibling and renames it over `path`, so readers
/// see either the old or the new content.
pub(crate) fn write_atomic(path: &Path, text: &str) -> Result<(), GatewayError> {
    let io_err = |source| GatewayError::Io {
        action: "writing",
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(text.as_bytes()).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::FilePicker;
    use std::collections::VecDeque;
    use std::path::PathBuf;

    /// Answers picks from a queue; an exhausted queue cancels.
    #[derive(Default)]
    pub struct QueuedPicker {
        pub answers: VecDeque<Option<PathBuf>>,
    }

    impl QueuedPicker {
        pub fn with(answers: impl IntoIterator<Item = Option<PathBuf>>) -> Self {
            QueuedPicker {
                answers: answers.into_iter().collect(),
            }
        }
    }

    impl FilePicker for QueuedPicker {
        fn pick_open_path(&mut self) -> Option<PathBuf> {
            self.answers.pop_front().flatten()
        }

        fn pick_save_path(&mut self) -> Option<PathBuf> {
            self.answers.pop_front().flatten()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        std::fs::write(&path, "old").unwrap();
        write_atomic(&path, "[]").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn atomic_write_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone").join("notes.json");
        let err = write_atomic(&path, "[]").unwrap_err();
        assert!(matches!(err, GatewayError::Io { action: "writing", .. }));
    }

    #[test]
    fn display_name_is_the_file_name() {
        assert_eq!(display_name(Path::new("/tmp/work/notes.json")), "notes.json");
    }
}
