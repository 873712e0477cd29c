use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tabhost_core::{Persistence, Section, StoreSnapshot};
use thiserror::Error;
use tracing::debug;

pub const ENV_DATA_DIR: &str = "TABHOST_DATA_DIR";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("filesystem error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid {section} data in {path}: {source}")]
    Json {
        section: Section,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Document store with one `<section>.json` file per section. Missing files
/// load as empty sections; writes land in a temp file and are renamed into
/// place so a crash never leaves a truncated section behind.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn section_path(&self, section: Section) -> PathBuf {
        self.dir.join(format!("{}.json", section.name()))
    }

    fn read_section<T: DeserializeOwned + Default>(&self, section: Section) -> Result<T, StoreError> {
        let path = self.section_path(section);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_str(&raw).map_err(|source| StoreError::Json {
            section,
            path,
            source,
        })
    }

    fn write_section<T: Serialize>(&self, section: Section, value: &T) -> Result<(), StoreError> {
        let path = self.section_path(section);
        let body = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
            section,
            path: path.clone(),
            source,
        })?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, body).map_err(|source| StoreError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(section = %section, path = %path.display(), "store section written");
        Ok(())
    }
}

impl Persistence for JsonFileStore {
    type Error = StoreError;

    fn load(&mut self) -> Result<StoreSnapshot, Self::Error> {
        Ok(StoreSnapshot {
            history: self.read_section(Section::History)?,
            bookmarks: self.read_section(Section::Bookmarks)?,
            settings: self.read_section(Section::Settings)?,
            permissions: self.read_section(Section::Permissions)?,
        })
    }

    fn save(&mut self, section: Section, snapshot: &StoreSnapshot) -> Result<(), Self::Error> {
        match section {
            Section::History => self.write_section(section, &snapshot.history),
            Section::Bookmarks => self.write_section(section, &snapshot.bookmarks),
            Section::Settings => self.write_section(section, &snapshot.settings),
            Section::Permissions => self.write_section(section, &snapshot.permissions),
        }
    }
}

/// `TABHOST_DATA_DIR` wins, then `$HOME/.tabhost`, then `./target/tabhost-data`.
pub fn default_data_dir() -> Result<PathBuf, StoreError> {
    if let Some(dir) = env::var_os(ENV_DATA_DIR) {
        return Ok(PathBuf::from(dir));
    }
    if let Some(home) = env::var_os("HOME") {
        return Ok(PathBuf::from(home).join(".tabhost"));
    }
    let cwd = env::current_dir().map_err(|source| StoreError::Io {
        path: PathBuf::from("."),
        source,
    })?;
    Ok(cwd.join("target").join("tabhost-data"))
}
