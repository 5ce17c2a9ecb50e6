use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::identity::Identity;

/// The signed-in credential and identity. Passed explicitly into every gateway
/// call that needs authentication; nothing holds it globally.
#[derive(Clone, Debug)]
pub struct Session {
    pub token: SecretString,
    pub user: Identity,
}

impl Session {
    pub fn new(token: impl Into<String>, user: Identity) -> Self {
        Self { token: token.into().into(), user }
    }

    pub fn landing_route(&self) -> &'static str {
        self.user.role.landing_route()
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not read session file `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not write session file `{path}`: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("could not parse session file `{path}`: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("could not serialize session state: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// On-disk representation. Kept separate from [`Session`] so the secrecy
/// wrapper never implements `Serialize`.
#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    token: String,
    user: Identity,
}

/// Loads, replaces, and removes the persisted session.
///
/// Created at app start from the configured path; the file is written on login
/// and removed on logout or when the backend reports the credential invalid.
#[derive(Clone, Debug)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Session>, SessionError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SessionError::Read { path: self.path.clone(), source }),
        };

        let file: SessionFile = toml::from_str(&raw)
            .map_err(|source| SessionError::Parse { path: self.path.clone(), source })?;
        Ok(Some(Session::new(file.token, file.user)))
    }

    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        let file = SessionFile {
            token: session.token.expose_secret().to_string(),
            user: session.user.clone(),
        };
        let raw = toml::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|source| SessionError::Write { path: self.path.clone(), source })?;
            }
        }
        fs::write(&self.path, raw)
            .map_err(|source| SessionError::Write { path: self.path.clone(), source })
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Write { path: self.path.clone(), source }),
        }
    }
}
