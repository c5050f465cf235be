use super::{
    display_name, write_atomic, BackendKind, FileIdentity, FilePicker, GatewayError, HandleId,
    OpenedTarget, PersistenceGateway, Picked, SavedTarget,
};
use crate::settings::Settings;
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const SETTINGS_KEY: &str = "app_settings";

/// Backend that keeps the file handle granted at pick time and writes through
/// it. A grant from open is read-only until the first save asks for write
/// access. Settings live in a key-value blob.
#[derive(Debug)]
pub struct HandleBackend {
    storage_path: PathBuf,
    grants: HashMap<HandleId, Grant>,
    next_id: u64,
}

#[derive(Debug)]
struct Grant {
    file: File,
    path: PathBuf,
    writable: bool,
}

impl HandleBackend {
    pub fn new(storage_path: PathBuf) -> Self {
        HandleBackend {
            storage_path,
            grants: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Drops the grant for `id`. Later saves against it fail.
    pub fn revoke(&mut self, id: HandleId) -> bool {
        let revoked = self.grants.remove(&id).is_some();
        if revoked {
            info!("revoked {id}");
        }
        revoked
    }

    fn grant(&mut self, file: File, path: PathBuf, writable: bool) -> HandleId {
        let id = HandleId(self.next_id);
        self.next_id += 1;
        debug!("granted {id} for {} (writable={writable})", path.display());
        self.grants.insert(
            id,
            Grant {
                file,
                path,
                writable,
            },
        );
        id
    }

    /// The whole key-value blob. Missing means empty; anything unreadable is
    /// an error so that callers never write over entries they could not see.
    fn read_storage(&self) -> Result<Map<String, Value>, GatewayError> {
        let data = match fs::read_to_string(&self.storage_path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(GatewayError::Io {
                    action: "reading",
                    path: self.storage_path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&data).map_err(|source| GatewayError::Corrupt {
            path: self.storage_path.clone(),
            source,
        })
    }
}

impl PersistenceGateway for HandleBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Handle
    }

    fn pick_open_target(
        &mut self,
        picker: &mut dyn FilePicker,
    ) -> Result<Picked<OpenedTarget>, GatewayError> {
        let Some(path) = picker.pick_open_path() else {
            return Ok(Picked::Canceled);
        };
        let io_err = |source| GatewayError::Io {
            action: "reading",
            path: path.clone(),
            source,
        };
        let mut file = File::open(&path).map_err(io_err)?;
        let mut text = String::new();
        file.read_to_string(&mut text).map_err(io_err)?;
        let display_name = display_name(&path);
        let id = self.grant(file, path, false);
        Ok(Picked::Chosen(OpenedTarget {
            identity: FileIdentity::Handle(id),
            display_name,
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
        write_atomic(&path, text)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| GatewayError::Io {
                action: "opening",
                path: path.clone(),
                source,
            })?;
        let display_name = display_name(&path);
        let id = self.grant(file, path, true);
        Ok(Picked::Chosen(SavedTarget {
            identity: FileIdentity::Handle(id),
            display_name,
        }))
    }

    fn save_to_target(&mut self, identity: &FileIdentity, text: &str) -> Result<(), GatewayError> {
        let FileIdentity::Handle(id) = identity else {
            return Err(GatewayError::ForeignIdentity(identity.clone()));
        };
        let grant = self
            .grants
            .get_mut(id)
            .ok_or(GatewayError::HandleRevoked(*id))?;
        if !grant.writable {
            grant.file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&grant.path)
                .map_err(|source| GatewayError::Io {
                    action: "opening for writing",
                    path: grant.path.clone(),
                    source,
                })?;
            grant.writable = true;
            debug!("{id} upgraded to writable");
        }
        write_through(&mut grant.file, text).map_err(|source| GatewayError::Io {
            action: "writing",
            path: grant.path.clone(),
            source,
        })
    }

    fn load_settings(&mut self) -> Option<Settings> {
        let storage = match self.read_storage() {
            Ok(storage) => storage,
            Err(err) => {
                warn!("ignoring stored settings: {err}");
                return None;
            }
        };
        match storage.get(SETTINGS_KEY)? {
            Value::String(stored) => match serde_json::from_str(stored) {
                Ok(raw) => Some(Settings::load_from(Some(&raw))),
                Err(err) => {
                    warn!("ignoring unparsable stored settings: {err}");
                    None
                }
            },
            raw => Some(Settings::load_from(Some(raw))),
        }
    }

    fn save_settings(&mut self, settings: &Settings) -> Result<(), GatewayError> {
        let mut storage = self.read_storage()?;
        storage.insert(
            SETTINGS_KEY.to_string(),
            Value::String(serde_json::to_string(settings)?),
        );
        if let Some(parent) = self.storage_path.parent() {
            fs::create_dir_all(parent).map_err(|source| GatewayError::Io {
                action: "creating",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        write_atomic(&self.storage_path, &serde_json::to_string_pretty(&storage)?)
    }

    fn release(&mut self, identity: &FileIdentity) {
        if let FileIdentity::Handle(id) = identity {
            self.revoke(*id);
        }
    }
}

/// Replaces the whole content of an already-open file.
fn write_through(file: &mut File, text: &str) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(text.as_bytes())?;
    file.sync_data()
}
