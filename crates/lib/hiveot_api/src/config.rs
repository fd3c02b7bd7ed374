//! Trust core configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use hiveot_core::authn::TokenValidity;
use hiveot_core::authn::password::PasswordHashAlgo;
use hiveot_core::authn::sessions::DEFAULT_SESSION_DAYS;
use tracing::warn;

use crate::error::{AppError, AppResult};

/// Default request deadline in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Token format used for newly minted tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFormat {
    Paseto,
    Jwt,
}

impl FromStr for TokenFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "paseto" => Ok(TokenFormat::Paseto),
            "jwt" => Ok(TokenFormat::Jwt),
            other => Err(AppError::InvalidArgument(format!(
                "unknown token format '{other}'"
            ))),
        }
    }
}

/// What happens to a client's sessions when it changes its public key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PubKeyChangePolicy {
    /// Sessions and tokens stay valid until they expire.
    #[default]
    KeepSessions,
    /// The client's session is removed, so its session tokens stop validating.
    RevokeSessions,
}

impl FromStr for PubKeyChangePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep-sessions" => Ok(PubKeyChangePolicy::KeepSessions),
            "revoke-sessions" => Ok(PubKeyChangePolicy::RevokeSessions),
            other => Err(AppError::InvalidArgument(format!(
                "unknown pubkey change policy '{other}'"
            ))),
        }
    }
}

/// Configuration of the trust core.
#[derive(Clone, Debug)]
pub struct AuthnConfig {
    /// Root of the hub's data.
    pub home: PathBuf,
    /// JSON password file.
    pub password_file: PathBuf,
    /// Directory holding `.key`, `.pub` and `.token` files.
    pub keys_dir: PathBuf,
    /// Password hash algorithm name. Validated on start.
    pub password_hash: String,
    /// Token format name. Validated on start.
    pub token_format: String,
    pub token_validity: TokenValidity,
    pub session_validity: chrono::Duration,
    pub admin_account_id: String,
    pub launcher_account_id: String,
    pub request_timeout: Duration,
    pub pubkey_change_policy: PubKeyChangePolicy,
}

impl AuthnConfig {
    /// Defaults rooted at `home`.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            password_file: default_password_file(&home),
            keys_dir: home.join("certs"),
            home,
            password_hash: PasswordHashAlgo::default().name().to_string(),
            token_format: "paseto".into(),
            token_validity: TokenValidity::default(),
            session_validity: chrono::Duration::days(DEFAULT_SESSION_DAYS),
            admin_account_id: "admin".into(),
            launcher_account_id: "launcher".into(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            pubkey_change_policy: PubKeyChangePolicy::KeepSessions,
        }
    }

    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                              | Default                              |
    /// |---------------------------------------|--------------------------------------|
    /// | `HIVEOT_HOME`                         | `<data_dir>/hiveot`                  |
    /// | `HIVEOT_PASSWORD_FILE`                | `<home>/stores/authn/hub.passwd`     |
    /// | `HIVEOT_KEYS_DIR`                     | `<home>/certs`                       |
    /// | `HIVEOT_PASSWORD_HASH`                | `argon2id` (`bcrypt` allowed)        |
    /// | `HIVEOT_TOKEN_FORMAT`                 | `paseto` (`jwt` allowed)             |
    /// | `HIVEOT_AGENT_TOKEN_VALIDITY_SEC`     | 90 days                              |
    /// | `HIVEOT_CONSUMER_TOKEN_VALIDITY_SEC`  | 30 days                              |
    /// | `HIVEOT_SERVICE_TOKEN_VALIDITY_SEC`   | 365 days                             |
    /// | `HIVEOT_SESSION_VALIDITY_SEC`         | 30 days                              |
    /// | `HIVEOT_ADMIN_ACCOUNT_ID`             | `admin`                              |
    /// | `HIVEOT_LAUNCHER_ACCOUNT_ID`          | `launcher`                           |
    /// | `HIVEOT_REQUEST_TIMEOUT_MS`           | `10000`                              |
    /// | `HIVEOT_PUBKEY_CHANGE_POLICY`         | `keep-sessions` (`revoke-sessions`)  |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`AuthnConfig::from_env`] with a custom variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let home = get("HIVEOT_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(default_home);
        let mut config = Self::new(home);

        if let Some(p) = get("HIVEOT_PASSWORD_FILE") {
            config.password_file = PathBuf::from(p);
        }
        if let Some(p) = get("HIVEOT_KEYS_DIR") {
            config.keys_dir = PathBuf::from(p);
        }
        if let Some(v) = get("HIVEOT_PASSWORD_HASH") {
            config.password_hash = v;
        }
        if let Some(v) = get("HIVEOT_TOKEN_FORMAT") {
            config.token_format = v;
        }

        let validity = &mut config.token_validity;
        validity.agent = seconds(&get, "HIVEOT_AGENT_TOKEN_VALIDITY_SEC", validity.agent);
        validity.consumer = seconds(&get, "HIVEOT_CONSUMER_TOKEN_VALIDITY_SEC", validity.consumer);
        validity.service = seconds(&get, "HIVEOT_SERVICE_TOKEN_VALIDITY_SEC", validity.service);
        config.session_validity = seconds(
            &get,
            "HIVEOT_SESSION_VALIDITY_SEC",
            config.session_validity,
        );

        if let Some(v) = get("HIVEOT_ADMIN_ACCOUNT_ID") {
            config.admin_account_id = v;
        }
        if let Some(v) = get("HIVEOT_LAUNCHER_ACCOUNT_ID") {
            config.launcher_account_id = v;
        }
        if let Some(v) = get("HIVEOT_REQUEST_TIMEOUT_MS") {
            match v.parse::<u64>() {
                Ok(ms) if ms > 0 => config.request_timeout = Duration::from_millis(ms),
                _ => warn!(value = %v, "invalid HIVEOT_REQUEST_TIMEOUT_MS, using default"),
            }
        }
        if let Some(v) = get("HIVEOT_PUBKEY_CHANGE_POLICY") {
            match v.parse() {
                Ok(policy) => config.pubkey_change_policy = policy,
                Err(e) => warn!(error = %e, "using default pubkey change policy"),
            }
        }
        config
    }

    /// Parsed password hash algorithm.
    pub fn password_hash_algo(&self) -> AppResult<PasswordHashAlgo> {
        self.password_hash.parse().map_err(AppError::from)
    }

    /// Parsed token format.
    pub fn token_format(&self) -> AppResult<TokenFormat> {
        self.token_format.parse()
    }
}

fn default_home() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hiveot")
}

fn default_password_file(home: &Path) -> PathBuf {
    home.join("stores").join("authn").join("hub.passwd")
}

/// Positive number of seconds, else `default` with a warning.
fn seconds(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: chrono::Duration,
) -> chrono::Duration {
    let Some(raw) = get(key) else {
        return default;
    };
    match raw.parse::<i64>() {
        Ok(secs) if secs > 0 => chrono::Duration::seconds(secs),
        _ => {
            warn!(key, value = %raw, "invalid duration, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_rooted_at_home() {
        let config = AuthnConfig::from_lookup(lookup(&[("HIVEOT_HOME", "/srv/hiveot")]));
        assert_eq!(
            config.password_file,
            PathBuf::from("/srv/hiveot/stores/authn/hub.passwd")
        );
        assert_eq!(config.keys_dir, PathBuf::from("/srv/hiveot/certs"));
        assert_eq!(config.password_hash, "argon2id");
        assert_eq!(config.token_format().unwrap(), TokenFormat::Paseto);
        assert_eq!(config.request_timeout, Duration::from_millis(10_000));
        assert_eq!(config.token_validity, TokenValidity::default());
        assert_eq!(config.pubkey_change_policy, PubKeyChangePolicy::KeepSessions);
    }

    #[test]
    fn overrides_are_applied() {
        let config = AuthnConfig::from_lookup(lookup(&[
            ("HIVEOT_HOME", "/h"),
            ("HIVEOT_KEYS_DIR", "/k"),
            ("HIVEOT_PASSWORD_HASH", "bcrypt"),
            ("HIVEOT_TOKEN_FORMAT", "JWT"),
            ("HIVEOT_AGENT_TOKEN_VALIDITY_SEC", "60"),
            ("HIVEOT_SESSION_VALIDITY_SEC", "3600"),
            ("HIVEOT_ADMIN_ACCOUNT_ID", "root"),
            ("HIVEOT_PUBKEY_CHANGE_POLICY", "revoke-sessions"),
        ]));
        assert_eq!(config.keys_dir, PathBuf::from("/k"));
        assert!(matches!(
            config.password_hash_algo().unwrap(),
            PasswordHashAlgo::Bcrypt { .. }
        ));
        assert_eq!(config.token_format().unwrap(), TokenFormat::Jwt);
        assert_eq!(config.token_validity.agent, chrono::Duration::seconds(60));
        assert_eq!(config.session_validity, chrono::Duration::hours(1));
        assert_eq!(config.admin_account_id, "root");
        assert_eq!(
            config.pubkey_change_policy,
            PubKeyChangePolicy::RevokeSessions
        );
    }

    #[test]
    fn malformed_numbers_fall_back_to_defaults() {
        let config = AuthnConfig::from_lookup(lookup(&[
            ("HIVEOT_HOME", "/h"),
            ("HIVEOT_CONSUMER_TOKEN_VALIDITY_SEC", "soon"),
            ("HIVEOT_SERVICE_TOKEN_VALIDITY_SEC", "-5"),
            ("HIVEOT_REQUEST_TIMEOUT_MS", "0"),
        ]));
        assert_eq!(config.token_validity, TokenValidity::default());
        assert_eq!(config.request_timeout, Duration::from_millis(10_000));
    }

    #[test]
    fn unknown_hash_algorithm_is_invalid_argument() {
        let mut config = AuthnConfig::new("/h");
        config.password_hash = "md5".into();
        assert!(matches!(
            config.password_hash_algo(),
            Err(AppError::InvalidArgument(_))
        ));
    }
}
