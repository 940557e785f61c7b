// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use microblog_app::{LoginResponse, Session};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// JSON file holding the signed-in admin session between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
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

    /// Unreadable, corrupt, or non-admin files count as no session.
    pub fn load(&self) -> Result<Option<Session>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("read session file {}", self.path.display()));
            }
        };

        let stored: Session = match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "ignoring corrupt session file");
                return Ok(None);
            }
        };

        match Session::admit(LoginResponse {
            token: stored.token,
            user: stored.user,
        }) {
            Ok(session) => {
                info!(user = %session.user.name, "restored session");
                Ok(Some(session))
            }
            Err(error) => {
                warn!(path = %self.path.display(), %error, "ignoring unusable session file");
                Ok(None)
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create session directory {}", parent.display()))?;
        }
        let encoded = serde_json::to_string_pretty(session).context("encode session")?;
        fs::write(&self.path, encoded).with_context(|| {
            format!(
                "write session file {} -- set [session].path to a writable location",
                self.path.display()
            )
        })?;
        restrict_permissions(&self.path)?;
        Ok(())
    }

    /// Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error)
                .with_context(|| format!("remove session file {}", self.path.display())),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("restrict permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::SessionStore;
    use anyhow::Result;
    use microblog_app::Role;
    use microblog_testkit::{admin_session, temp_file_path};

    #[test]
    fn missing_file_means_no_session() -> Result<()> {
        let (_temp, path) = temp_file_path("session.json")?;
        assert_eq!(SessionStore::new(path).load()?, None);
        Ok(())
    }

    #[test]
    fn saved_session_loads_back() -> Result<()> {
        let (_temp, path) = temp_file_path("nested/session.json")?;
        let store = SessionStore::new(&path);
        store.save(&admin_session())?;
        assert_eq!(store.load()?, Some(admin_session()));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn saved_session_is_private_to_the_owner() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let (_temp, path) = temp_file_path("session.json")?;
        SessionStore::new(&path).save(&admin_session())?;
        let mode = std::fs::metadata(&path)?.permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        Ok(())
    }

    #[test]
    fn corrupt_file_is_treated_as_absent() -> Result<()> {
        let (_temp, path) = temp_file_path("session.json")?;
        std::fs::write(&path, "{not json")?;
        assert_eq!(SessionStore::new(path).load()?, None);
        Ok(())
    }

    #[test]
    fn non_admin_session_is_not_restored() -> Result<()> {
        let (_temp, path) = temp_file_path("session.json")?;
        let store = SessionStore::new(&path);
        let mut session = admin_session();
        session.user.role = Role::Reader.as_str().to_owned();
        store.save(&session)?;
        assert_eq!(store.load()?, None);
        Ok(())
    }

    #[test]
    fn clear_removes_file_once() -> Result<()> {
        let (_temp, path) = temp_file_path("session.json")?;
        let store = SessionStore::new(&path);
        store.save(&admin_session())?;
        assert!(store.clear()?);
        assert!(!path.exists());
        assert!(!store.clear()?);
        Ok(())
    }
}
