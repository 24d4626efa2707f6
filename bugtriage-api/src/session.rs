//! Session: the logged-in user and the bearer credential.
//!
//! A `Session` is produced by [`login`](crate::client::TriageClient::login) and handed
//! to the client explicitly with [`set_session`](crate::client::TriageClient::set_session)
//! or [`with_session`](crate::client::TriageClient::with_session). The library never
//! reads sessions from ambient storage; [`Session::load`] and [`Session::save`] are
//! conveniences for applications that want to persist one.
//!

use std::{fmt, fs, path::Path};

use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Result, error::TriageError};

/// Opaque bearer credential. Zeroized on drop and never printed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adds `Authorization: Bearer ...` when the token is non-empty.
    pub(crate) fn set_auth_header(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.0.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.0)
        }
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("SecretToken(empty)")
        } else {
            f.write_str("SecretToken(MASKED)")
        }
    }
}

/// Logged-in user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    #[serde(default)]
    pub role: String,
    pub company_id: i64,
    #[serde(default, alias = "access_token")]
    pub token: SecretToken,
}

impl Session {
    pub fn new(username: impl Into<String>, company_id: i64, token: SecretToken) -> Self {
        Self {
            username: username.into(),
            role: String::new(),
            company_id,
            token,
        }
    }

    #[must_use]
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Reads a session saved with [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|err| TriageError::SessionFile {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        serde_json::from_str(&data).map_err(|err| TriageError::SessionFile {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Writes the session as json, creating parent directories.
    /// On unix the file is created readable by the owner only.
    pub fn save(&self, path: &Path) -> Result<()> {
        let to_err = |err: std::io::Error| TriageError::SessionFile {
            path: path.to_path_buf(),
            message: err.to_string(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(to_err)?;
        }
        let data = serde_json::to_string_pretty(self).map_err(|source| TriageError::Serialization { source })?;
        fs::write(path, data).map_err(to_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(to_err)?;
        }
        debug!(path=?path, user=%self.username, "session saved");
        Ok(())
    }

    /// Removes a saved session. Missing files are not an error.
    pub fn remove(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(TriageError::SessionFile {
                path: path.to_path_buf(),
                message: err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_masks_token() {
        let session = Session::new("alice", 7, SecretToken::new("super-secret"));
        let text = format!("{session:?}");
        assert!(!text.contains("super-secret"));
        assert!(text.contains("MASKED"));
    }

    #[test]
    fn login_response_accepts_access_token_alias() {
        let session: Session = serde_json::from_str(
            r#"{"username":"bob","role":"admin","company_id":3,"access_token":"t-1"}"#,
        )
        .expect("parse session");
        assert_eq!(session.company_id, 3);
        assert_eq!(session.token, SecretToken::new("t-1"));
    }

    #[test]
    fn missing_token_is_empty() {
        let session: Session =
            serde_json::from_str(r#"{"username":"bob","company_id":3}"#).expect("parse session");
        assert!(session.token.is_empty());
        assert_eq!(session.role, "");
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("session.json");
        let session = Session::new("carol", 11, SecretToken::new("tok")).role("user");
        session.save(&path).expect("save");
        let loaded = Session::load(&path).expect("load");
        assert_eq!(loaded, session);

        Session::remove(&path).expect("remove");
        Session::remove(&path).expect("remove twice");
        assert!(Session::load(&path).is_err());
    }
}
