//! Credential store backed by a single JSON password file.
//!
//! The file holds a map `clientID -> entry`. Every write replaces the whole
//! file through a temp file in the same directory followed by an atomic
//! rename, while holding the write lock. External replacements of the file
//! are picked up by a [`FileWatcher`] and swapped in atomically.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::password::{self, PasswordHashAlgo};
use super::watcher::FileWatcher;
use super::{AuthnError, MIN_PASSWORD_LENGTH};
use crate::authz::RoleLookup;
use crate::clock::Clock;
use crate::models::authn::{AuthnEntry, ClientProfile, ProfileUpdate};

type EntryMap = BTreeMap<String, AuthnEntry>;

/// Client IDs are used as file names in the keys directory.
pub fn validate_client_id(client_id: &str) -> Result<(), AuthnError> {
    if client_id.is_empty() {
        return Err(AuthnError::InvalidArgument("missing clientID".into()));
    }
    if client_id == "."
        || client_id == ".."
        || client_id
            .chars()
            .any(|c| c.is_whitespace() || c.is_uppercase() || c == '/' || c == '\\')
    {
        return Err(AuthnError::InvalidArgument(format!(
            "invalid clientID '{client_id}'"
        )));
    }
    Ok(())
}

/// File-backed credential store.
pub struct AuthnFileStore {
    path: PathBuf,
    hash_algo: PasswordHashAlgo,
    clock: Arc<dyn Clock>,
    entries: RwLock<EntryMap>,
    /// `Some` while open.
    watcher: Mutex<Option<FileWatcher>>,
    dummy_hash: OnceLock<String>,
}

impl std::fmt::Debug for AuthnFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthnFileStore")
            .field("path", &self.path)
            .field("hash_algo", &self.hash_algo)
            .field("count", &self.count())
            .finish()
    }
}

impl AuthnFileStore {
    pub fn new(
        path: impl Into<PathBuf>,
        hash_algo: PasswordHashAlgo,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            path: path.into(),
            hash_algo,
            clock,
            entries: RwLock::new(EntryMap::new()),
            watcher: Mutex::new(None),
            dummy_hash: OnceLock::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn hash_algo(&self) -> PasswordHashAlgo {
        self.hash_algo
    }

    /// Load the password file, creating it empty if missing, and start
    /// watching it for external changes.
    pub fn open(self: &Arc<Self>) -> Result<(), AuthnError> {
        let mut watcher = self.watcher.lock();
        if watcher.is_some() {
            return Err(AuthnError::AlreadyOpen);
        }

        {
            let mut entries = self.entries.write();
            match fs::metadata(&self.path) {
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    info!(path = %self.path.display(), "creating new password file");
                    self.persist(&EntryMap::new())?;
                }
                Err(e) => return Err(self.io_err(e)),
            }
            *entries = self.read_file()?;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = FileWatcher::watch(self.path.clone(), move || {
            if let Some(store) = weak.upgrade()
                && let Err(e) = store.reload()
            {
                warn!(error = %e, "password file reload failed; keeping previous entries");
            }
        })
        .map_err(|e| self.io_err(e))?;
        *watcher = Some(handle);

        info!(path = %self.path.display(), count = self.count(), "credential store opened");
        Ok(())
    }

    /// Stop watching the file. Idempotent.
    pub fn close(&self) {
        let watcher = self.watcher.lock().take();
        if let Some(mut watcher) = watcher {
            watcher.stop();
            info!(path = %self.path.display(), "credential store closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.watcher.lock().is_some()
    }

    /// Replace the in-memory map with the file content.
    pub fn reload(&self) -> Result<(), AuthnError> {
        let mut entries = self.entries.write();
        let loaded = self.read_file()?;
        debug!(count = loaded.len(), "reloaded password file");
        *entries = loaded;
        Ok(())
    }

    /// Insert or update a client. Role and password hash of an existing
    /// entry are preserved.
    pub fn add(&self, client_id: &str, mut profile: ClientProfile) -> Result<(), AuthnError> {
        validate_client_id(client_id)?;
        if profile.client_id != client_id {
            return Err(AuthnError::InvalidArgument(format!(
                "profile clientID '{}' does not match '{client_id}'",
                profile.client_id
            )));
        }
        profile.updated_millis = self.now_millis();

        let mut entries = self.entries.write();
        let mut updated = entries.clone();
        match updated.get_mut(client_id) {
            Some(entry) => entry.client_profile = profile,
            None => {
                updated.insert(client_id.to_string(), AuthnEntry::new(profile));
            }
        }
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.entries.read().len()
    }

    pub fn get_profile(&self, client_id: &str) -> Result<ClientProfile, AuthnError> {
        self.entries
            .read()
            .get(client_id)
            .map(|e| e.client_profile.clone())
            .ok_or_else(|| AuthnError::NotFound(client_id.to_string()))
    }

    /// All profiles, ordered by clientID.
    pub fn get_profiles(&self) -> Vec<ClientProfile> {
        self.entries
            .read()
            .values()
            .map(|e| e.client_profile.clone())
            .collect()
    }

    /// All entries including password hashes. For internal use only.
    pub fn get_entries(&self) -> Vec<AuthnEntry> {
        self.entries.read().values().cloned().collect()
    }

    pub fn get_role(&self, client_id: &str) -> Result<String, AuthnError> {
        self.entries
            .read()
            .get(client_id)
            .map(|e| e.role.clone())
            .ok_or_else(|| AuthnError::NotFound(client_id.to_string()))
    }

    pub fn set_role(&self, client_id: &str, role: &str) -> Result<(), AuthnError> {
        self.modify(client_id, |entry, _| {
            entry.role = role.to_string();
        })
    }

    /// Delete a client. Idempotent.
    pub fn remove(&self, client_id: &str) -> Result<(), AuthnError> {
        let mut entries = self.entries.write();
        if !entries.contains_key(client_id) {
            return Ok(());
        }
        let mut updated = entries.clone();
        updated.remove(client_id);
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }

    /// Hash and store a new password.
    pub fn set_password(&self, client_id: &str, password: &str) -> Result<(), AuthnError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthnError::InvalidArgument(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        if !self.entries.read().contains_key(client_id) {
            return Err(AuthnError::NotFound(client_id.to_string()));
        }
        let hash = self.hash_algo.hash(password)?;
        self.set_password_hash(client_id, &hash)
    }

    /// Store a pre-computed password hash.
    pub fn set_password_hash(&self, client_id: &str, hash: &str) -> Result<(), AuthnError> {
        self.modify(client_id, |entry, now| {
            entry.password_hash = hash.to_string();
            entry.client_profile.updated_millis = now;
        })
    }

    /// Apply a partial profile update on behalf of `sender_id`.
    pub fn update_profile(&self, sender_id: &str, update: &ProfileUpdate) -> Result<(), AuthnError> {
        if !self.entries.read().contains_key(sender_id) {
            return Err(AuthnError::NotFound(sender_id.to_string()));
        }
        self.modify(&update.client_id, |entry, now| {
            let profile = &mut entry.client_profile;
            if let Some(client_type) = update.client_type {
                profile.client_type = client_type;
            }
            if let Some(name) = update.display_name.as_deref()
                && !name.is_empty()
            {
                profile.display_name = name.to_string();
            }
            if let Some(pub_key) = update.pub_key.as_deref()
                && !pub_key.is_empty()
            {
                profile.pub_key = pub_key.to_string();
            }
            profile.updated_millis = now;
        })
    }

    /// Check a password and return the client's profile.
    ///
    /// Unknown client, missing hash and wrong password all produce the same
    /// error after the same amount of hashing work.
    pub fn verify_password(&self, client_id: &str, password: &str) -> Result<ClientProfile, AuthnError> {
        let (profile, stored_hash) = match self.entries.read().get(client_id) {
            Some(e) => (Some(e.client_profile.clone()), e.password_hash.clone()),
            None => (None, String::new()),
        };
        let candidate = if stored_hash.is_empty() {
            self.dummy_hash()
        } else {
            stored_hash.as_str()
        };
        let matched = match password::verify_password(password, candidate) {
            Ok(matched) => matched,
            Err(e) => {
                warn!(client_id, error = %e, "password verification error");
                false
            }
        };
        match profile {
            Some(profile) if matched && !stored_hash.is_empty() => Ok(profile),
            Some(_) if stored_hash.is_empty() => {
                debug!(client_id, "login rejected: no password set");
                Err(AuthnError::AuthenticationFailed)
            }
            Some(_) => {
                debug!(client_id, "login rejected: password mismatch");
                Err(AuthnError::AuthenticationFailed)
            }
            None => {
                debug!(client_id, "login rejected: unknown client");
                Err(AuthnError::AuthenticationFailed)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    fn dummy_hash(&self) -> &str {
        self.dummy_hash.get_or_init(|| {
            self.hash_algo
                .hash("hiveot-dummy-password")
                .unwrap_or_default()
        })
    }

    /// Apply `f` to an existing entry and persist.
    fn modify<F>(&self, client_id: &str, f: F) -> Result<(), AuthnError>
    where
        F: FnOnce(&mut AuthnEntry, i64),
    {
        let now = self.now_millis();
        let mut entries = self.entries.write();
        let mut updated = entries.clone();
        let entry = updated
            .get_mut(client_id)
            .ok_or_else(|| AuthnError::NotFound(client_id.to_string()))?;
        f(entry, now);
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }

    fn io_err(&self, source: std::io::Error) -> AuthnError {
        AuthnError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read_file(&self) -> Result<EntryMap, AuthnError> {
        let raw = fs::read_to_string(&self.path).map_err(|e| self.io_err(e))?;
        if raw.trim().is_empty() {
            return Ok(EntryMap::new());
        }
        let parsed: EntryMap = serde_json::from_str(&raw).map_err(|source| AuthnError::Parse {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(parsed
            .into_iter()
            .filter(|(key, entry)| {
                let valid = !key.is_empty() && *key == entry.client_profile.client_id;
                if !valid {
                    warn!(key = %key, "skipping password entry whose clientID does not match its key");
                }
                valid
            })
            .collect())
    }

    /// Write the map to a temp file next to the target and rename it over.
    fn persist(&self, entries: &EntryMap) -> Result<(), AuthnError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&dir).map_err(|e| self.io_err(e))?;

        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| AuthnError::Internal(format!("serialize password file: {e}")))?;
        let mut tmp = tempfile::Builder::new()
            .prefix("hub-pwfilestore")
            .tempfile_in(&dir)
            .map_err(|e| self.io_err(e))?;
        tmp.write_all(&json).map_err(|e| self.io_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_err(e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| self.io_err(e))?;
        }
        tmp.persist(&self.path).map_err(|e| self.io_err(e.error))?;
        Ok(())
    }
}

impl RoleLookup for AuthnFileStore {
    fn client_role(&self, client_id: &str) -> Option<String> {
        self.entries.read().get(client_id).map(|e| e.role.clone())
    }
}

impl Drop for AuthnFileStore {
    fn drop(&mut self) {
        self.close();
    }
}
