//! Password hashing via argon2id or bcrypt.
//!
//! The configured algorithm only decides how new passwords are hashed.
//! Verification reads the algorithm from the stored hash string, so entries
//! hashed under a previous configuration keep working.

use std::fmt;
use std::str::FromStr;

use argon2::{Algorithm, Argon2, Params, Version};
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};

use super::AuthnError;

/// argon2id memory cost in KiB (16 MiB).
pub const ARGON2_MEMORY_KIB: u32 = 16 * 1024;
/// argon2id iterations.
pub const ARGON2_ITERATIONS: u32 = 2;
/// argon2id lanes.
pub const ARGON2_PARALLELISM: u32 = 4;
/// bcrypt cost factor.
pub const BCRYPT_COST: u32 = 10;

/// Hash algorithm with its parameter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordHashAlgo {
    Argon2id {
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    },
    Bcrypt {
        cost: u32,
    },
}

impl Default for PasswordHashAlgo {
    fn default() -> Self {
        Self::argon2id()
    }
}

impl PasswordHashAlgo {
    pub const fn argon2id() -> Self {
        Self::Argon2id {
            memory_kib: ARGON2_MEMORY_KIB,
            iterations: ARGON2_ITERATIONS,
            parallelism: ARGON2_PARALLELISM,
        }
    }

    pub const fn bcrypt() -> Self {
        Self::Bcrypt { cost: BCRYPT_COST }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Argon2id { .. } => "argon2id",
            Self::Bcrypt { .. } => "bcrypt",
        }
    }

    /// Hash a password into a self-describing hash string.
    pub fn hash(&self, password: &str) -> Result<String, AuthnError> {
        match *self {
            Self::Argon2id {
                memory_kib,
                iterations,
                parallelism,
            } => {
                let params = Params::new(memory_kib, iterations, parallelism, None)
                    .map_err(|e| AuthnError::Internal(format!("argon2 params: {e}")))?;
                let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
                let salt_bytes: [u8; 16] = rand::random();
                let salt = SaltString::encode_b64(&salt_bytes)
                    .map_err(|e| AuthnError::Internal(format!("argon2 salt: {e}")))?;
                let phc = argon2
                    .hash_password(password.as_bytes(), &salt)
                    .map_err(|e| AuthnError::Internal(format!("argon2 hash: {e}")))?;
                Ok(phc.to_string())
            }
            Self::Bcrypt { cost } => bcrypt::hash(password, cost)
                .map_err(|e| AuthnError::Internal(format!("bcrypt hash: {e}"))),
        }
    }
}

impl fmt::Display for PasswordHashAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PasswordHashAlgo {
    type Err = AuthnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "argon2id" => Ok(Self::argon2id()),
            "bcrypt" => Ok(Self::bcrypt()),
            other => Err(AuthnError::InvalidArgument(format!(
                "unsupported password hash algorithm '{other}'"
            ))),
        }
    }
}

/// Algorithm family encoded in a stored hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoredHashKind {
    Argon2,
    Bcrypt,
}

fn stored_hash_kind(hash: &str) -> Option<StoredHashKind> {
    if hash.starts_with("$argon2") {
        Some(StoredHashKind::Argon2)
    } else if ["$2a$", "$2b$", "$2x$", "$2y$"]
        .iter()
        .any(|p| hash.starts_with(p))
    {
        Some(StoredHashKind::Bcrypt)
    } else {
        None
    }
}

/// Verify a password against a stored hash string.
///
/// Returns `Ok(false)` on mismatch and for hashes in an unknown format.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthnError> {
    match stored_hash_kind(hash) {
        Some(StoredHashKind::Argon2) => {
            let parsed = PasswordHash::new(hash)
                .map_err(|e| AuthnError::Internal(format!("argon2 parse: {e}")))?;
            Ok(Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok())
        }
        Some(StoredHashKind::Bcrypt) => bcrypt::verify(password, hash)
            .map_err(|e| AuthnError::Internal(format!("bcrypt verify: {e}"))),
        None => Ok(false),
    }
}
