use super::{
    display_name, write_atomic, BackendKind, FileIdentity, FilePicker, GatewayError, OpenedTarget,
    PersistenceGateway, Picked, SavedTarget,
};
use crate::settings::Settings;
use log::{debug, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Backend for a host with direct filesystem access: file identity is the path.
#[derive(Debug, Clone)]
pub struct NativeBackend {
    settings_path: PathBuf,
}

impl NativeBackend {
    pub fn new(settings_path: PathBuf) -> Self {
        NativeBackend { settings_path }
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }
}

impl PersistenceGateway for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn pick_open_target(
        &mut self,
        picker: &mut dyn FilePicker,
    ) -> Result<Picked<OpenedTarget>, GatewayError> {
        let Some(path) = picker.pick_open_path() else {
            return Ok(Picked::Canceled);
        };
        let text = fs::read_to_string(&path).map_err(|source| GatewayError::Io {
            action: "reading",
            path: path.clone(),
            source,
        })?;
        debug!("read {} bytes from {}", text.len(), path.display());
        Ok(Picked::Chosen(OpenedTarget {
            display_name: display_name(&path),
            identity: FileIdentity::Path(path),
            text,
        }))
    }

    fn pick_save_as_target(
        &mut self,
        picker: &mut dyn FilePicker,
        text: &str,
    ) -> Result<Picked<SavedTarget>, GatewayError> {
        let Some(path) = picker.pick_save_path() else {
            return Ok(Picked::Canceled);
        };
        let path = self.save_path_for(path);
        write_atomic(&path, text)?;
        Ok(Picked::Chosen(SavedTarget {
            display_name: display_name(&path),
            identity: FileIdentity::Path(path),
        }))
    }

    fn save_path_for(&self, mut chosen: PathBuf) -> PathBuf {
        if chosen.extension().is_none() {
            chosen.set_extension("json");
        }
        chosen
    }

    fn save_to_target(&mut self, identity: &FileIdentity, text: &str) -> Result<(), GatewayError> {
        let FileIdentity::Path(path) = identity else {
            return Err(GatewayError::ForeignIdentity(identity.clone()));
        };
        if !path.is_file() {
            return Err(GatewayError::Stale(path.clone()));
        }
        write_atomic(path, text)
    }

    fn load_settings(&mut self) -> Option<Settings> {
        let data = match fs::read_to_string(&self.settings_path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(
                    "cannot read settings {}: {err}",
                    self.settings_path.display()
                );
                return None;
            }
        };
        match serde_json::from_str(&data) {
            Ok(raw) => Some(Settings::load_from(Some(&raw))),
            Err(err) => {
                warn!(
                    "ignoring unparsable settings {}: {err}",
                    self.settings_path.display()
                );
                None
            }
        }
    }

    fn save_settings(&mut self, settings: &Settings) -> Result<(), GatewayError> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).map_err(|source| GatewayError::Io {
                action: "creating",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let serialized = serde_json::to_string_pretty(settings)?;
        write_atomic(&self.settings_path, &serialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::QueuedPicker;
    use crate::gateway::HandleId;
    use crate::settings::ThemeMode;

    fn backend(dir: &Path) -> NativeBackend {
        NativeBackend::new(dir.join("config").join("settings.json"))
    }

    #[test]
    fn open_reads_the_chosen_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mine.json");
        fs::write(&path, "[]").unwrap();
        let mut picker = QueuedPicker::with([Some(path.clone())]);
        let opened = backend(dir.path()).pick_open_target(&mut picker).unwrap();
        assert_eq!(
            opened,
            Picked::Chosen(OpenedTarget {
                identity: FileIdentity::Path(path),
                display_name: "mine.json".into(),
                text: "[]".into(),
            })
        );
    }

    #[test]
    fn open_cancel_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut gateway = backend(dir.path());
        let mut picker = QueuedPicker::with([None, Some(dir.path().join("absent.json"))]);
        assert_eq!(
            gateway.pick_open_target(&mut picker).unwrap(),
            Picked::Canceled
        );
        let err = gateway.pick_open_target(&mut picker).unwrap_err();
        assert!(matches!(err, GatewayError::Io { action: "reading", .. }));
    }

    #[test]
    fn save_as_appends_extension_and_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut gateway = backend(dir.path());
        let mut picker = QueuedPicker::with([Some(dir.path().join("journal"))]);
        let Picked::Chosen(saved) = gateway.pick_save_as_target(&mut picker, "[]").unwrap() else {
            panic!("save-as was canceled");
        };
        let path = dir.path().join("journal.json");
        assert_eq!(saved.identity, FileIdentity::Path(path.clone()));
        assert_eq!(saved.display_name, "journal.json");
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");

        gateway.save_to_target(&saved.identity, "[1]").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[1]");
    }

    #[test]
    fn save_fails_for_deleted_or_foreign_targets() {
        let dir = tempfile::tempdir().unwrap();
        let mut gateway = backend(dir.path());
        let gone = FileIdentity::Path(dir.path().join("gone.json"));
        assert!(matches!(
            gateway.save_to_target(&gone, "[]"),
            Err(GatewayError::Stale(_))
        ));
        assert!(!dir.path().join("gone.json").exists());
        assert!(matches!(
            gateway.save_to_target(&FileIdentity::Handle(HandleId(1)), "[]"),
            Err(GatewayError::ForeignIdentity(_))
        ));
    }

    #[test]
    fn settings_round_trip_and_absent_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut gateway = backend(dir.path());
        assert_eq!(gateway.load_settings(), None);

        let settings = Settings {
            theme_mode: ThemeMode::Matrix,
            editor_font_size: 24,
            ..Settings::default()
        };
        gateway.save_settings(&settings).unwrap();
        assert_eq!(gateway.load_settings(), Some(settings));
        let written = fs::read_to_string(gateway.settings_path()).unwrap();
        assert!(written.contains("\"themeMode\": \"matrix\""));
    }

    #[test]
    fn legacy_and_broken_settings_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut gateway = backend(dir.path());
        fs::create_dir_all(gateway.settings_path().parent().unwrap()).unwrap();

        fs::write(gateway.settings_path(), r#"{"darkMode": true, "fontSize": 18}"#).unwrap();
        let loaded = gateway.load_settings().unwrap();
        assert_eq!(loaded.theme_mode, ThemeMode::Dark);
        assert_eq!(loaded.editor_font_size, 18);

        fs::write(gateway.settings_path(), "{not json").unwrap();
        assert_eq!(gateway.load_settings(), None);
    }
}
