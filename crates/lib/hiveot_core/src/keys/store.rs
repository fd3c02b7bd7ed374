//! Key and token files in the keys directory.
//!
//! | File | Content | Mode |
//! |------|---------|------|
//! | `<clientID>.key` | PKCS#8 PEM private key | 0400 |
//! | `<clientID>.pub` | SPKI PEM public key | 0644 |
//! | `<clientID>.token` | raw token string | 0400 |

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use super::{HubKey, KeyError, KeyType};

pub const KEY_FILE_EXT: &str = "key";
pub const PUB_FILE_EXT: &str = "pub";
pub const TOKEN_FILE_EXT: &str = "token";

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> KeyError + '_ {
    move |source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub fn key_file_path(keys_dir: &Path, client_id: &str) -> PathBuf {
    keys_dir.join(format!("{client_id}.{KEY_FILE_EXT}"))
}

pub fn pub_file_path(keys_dir: &Path, client_id: &str) -> PathBuf {
    keys_dir.join(format!("{client_id}.{PUB_FILE_EXT}"))
}

pub fn token_file_path(keys_dir: &Path, client_id: &str) -> PathBuf {
    keys_dir.join(format!("{client_id}.{TOKEN_FILE_EXT}"))
}

/// Load `<keys_dir>/<client_id>.key`, or generate a new key pair and write
/// its private and public key files.
///
/// An existing private key file is never overwritten.
pub fn load_create_key_pair(
    client_id: &str,
    keys_dir: &Path,
    key_type: KeyType,
) -> Result<HubKey, KeyError> {
    let key_path = key_file_path(keys_dir, client_id);
    match fs::read_to_string(&key_path) {
        Ok(pem) => return HubKey::import_private(&pem),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(&key_path)(e)),
    }

    ensure_dir(keys_dir)?;
    let key = HubKey::generate(key_type)?;
    write_new_file(&key_path, key.export_private_pem()?.as_bytes(), 0o400)?;

    let pub_path = pub_file_path(keys_dir, client_id);
    remove_if_exists(&pub_path)?;
    write_new_file(&pub_path, key.export_public_pem()?.as_bytes(), 0o644)?;

    info!(client_id, key_type = %key_type, path = %key_path.display(), "generated new key pair");
    Ok(key)
}

/// Write `<keys_dir>/<client_id>.token` read-only, replacing any previous file.
pub fn write_token_file(keys_dir: &Path, client_id: &str, token: &str) -> Result<PathBuf, KeyError> {
    ensure_dir(keys_dir)?;
    let path = token_file_path(keys_dir, client_id);
    remove_if_exists(&path)?;
    write_new_file(&path, token.as_bytes(), 0o400)?;
    Ok(path)
}

/// Read a token file. Returns `None` when it does not exist.
pub fn read_token_file(keys_dir: &Path, client_id: &str) -> Result<Option<String>, KeyError> {
    let path = token_file_path(keys_dir, client_id);
    match fs::read_to_string(&path) {
        Ok(token) => Ok(Some(token.trim().to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(&path)(e)),
    }
}

fn ensure_dir(dir: &Path) -> Result<(), KeyError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(io_err(dir))
}

fn remove_if_exists(path: &Path) -> Result<(), KeyError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(path)(e)),
    }
}

/// Create `path` (which must not exist) with the given mode.
fn write_new_file(path: &Path, content: &[u8], mode: u32) -> Result<(), KeyError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    let mut file = options.open(path).map_err(io_err(path))?;
    file.write_all(content).map_err(io_err(path))?;
    file.sync_all().map_err(io_err(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn mode_of(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn load_create_writes_key_files() {
        let dir = tempfile::tempdir().unwrap();
        let key = load_create_key_pair("authn", dir.path(), KeyType::Ed25519).unwrap();
        assert!(key.is_private());

        let key_path = key_file_path(dir.path(), "authn");
        let pub_path = pub_file_path(dir.path(), "authn");
        assert!(key_path.exists());
        assert_eq!(
            fs::read_to_string(&pub_path).unwrap(),
            key.export_public_pem().unwrap()
        );
        #[cfg(unix)]
        {
            assert_eq!(mode_of(&key_path), 0o400);
            assert_eq!(mode_of(&pub_path), 0o644);
        }
    }

    #[test]
    fn load_create_reuses_existing_key() {
        let dir = tempfile::tempdir().unwrap();
        let first = load_create_key_pair("svc", dir.path(), KeyType::Ed25519).unwrap();
        let second = load_create_key_pair("svc", dir.path(), KeyType::Ed25519).unwrap();
        assert_eq!(
            first.export_public_pem().unwrap(),
            second.export_public_pem().unwrap()
        );
    }

    #[test]
    fn load_create_rejects_corrupt_key_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(key_file_path(dir.path(), "bad"), "garbage").unwrap();
        assert!(load_create_key_pair("bad", dir.path(), KeyType::Ed25519).is_err());
        assert_eq!(
            fs::read_to_string(key_file_path(dir.path(), "bad")).unwrap(),
            "garbage"
        );
    }

    #[test]
    fn token_file_is_replaced_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_token_file(dir.path(), "launcher").unwrap(), None);

        let path = write_token_file(dir.path(), "launcher", "first").unwrap();
        write_token_file(dir.path(), "launcher", "second").unwrap();
        assert_eq!(
            read_token_file(dir.path(), "launcher").unwrap().as_deref(),
            Some("second")
        );
        #[cfg(unix)]
        assert_eq!(mode_of(&path), 0o400);
    }

    #[test]
    fn missing_keys_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("certs").join("clients");
        load_create_key_pair("agent1", &nested, KeyType::Ecdsa).unwrap();
        assert!(key_file_path(&nested, "agent1").exists());
    }
}
