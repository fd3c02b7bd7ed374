//! PASETO v4.public tokens signed with ED25519.
//!
//! Layout: `v4.public.` + base64url(message || signature), where the
//! signature covers the pre-authentication encoding of header, message,
//! footer and implicit assertion. Claims are JSON with RFC 3339 times.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use ed25519_dalek::{SIGNATURE_LENGTH, Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use super::AuthnError;
use super::token::{
    AUDIENCE, ISSUER, TokenClaims, TokenCodec, TokenIdentity, check_identity, check_times,
};
use crate::keys::{HubKey, KeyType};

const HEADER: &str = "v4.public.";

#[derive(Debug, Serialize, Deserialize)]
struct PasetoClaims {
    iss: String,
    aud: String,
    sub: String,
    iat: DateTime<Utc>,
    nbf: DateTime<Utc>,
    exp: DateTime<Utc>,
    #[serde(rename = "clientID")]
    client_id: String,
    #[serde(rename = "sessionID")]
    session_id: String,
}

/// PASETO v4.public codec.
pub struct PasetoCodec {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl PasetoCodec {
    /// Build from an ED25519 key pair.
    pub fn new(signing_key: &HubKey) -> Result<Self, AuthnError> {
        let sk = signing_key.ed25519_signing_key().ok_or_else(|| {
            AuthnError::InvalidArgument(format!(
                "PASETO v4.public requires an ed25519 key pair, got {}",
                signing_key.key_type()
            ))
        })?;
        Ok(Self {
            signing_key: sk.clone(),
            verifying_key: sk.verifying_key(),
        })
    }
}

/// Little-endian length with the top bit cleared.
fn le64(n: usize) -> [u8; 8] {
    ((n as u64) & (u64::MAX >> 1)).to_le_bytes()
}

/// Pre-authentication encoding.
fn pae(pieces: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + pieces.iter().map(|p| 8 + p.len()).sum::<usize>());
    out.extend_from_slice(&le64(pieces.len()));
    for piece in pieces {
        out.extend_from_slice(&le64(piece.len()));
        out.extend_from_slice(piece);
    }
    out
}

fn invalid(reason: impl Into<String>) -> AuthnError {
    AuthnError::InvalidToken(reason.into())
}

impl TokenCodec for PasetoCodec {
    fn format(&self) -> &'static str {
        "paseto"
    }

    fn encode(&self, claims: &TokenClaims) -> Result<String, AuthnError> {
        let body = PasetoClaims {
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            sub: claims.client_id.clone(),
            iat: claims.issued_at,
            nbf: claims.issued_at,
            exp: claims.expires_at,
            client_id: claims.client_id.clone(),
            session_id: claims.session_id.clone(),
        };
        let message = serde_json::to_vec(&body)
            .map_err(|e| AuthnError::Internal(format!("paseto claims: {e}")))?;
        let signature = self
            .signing_key
            .sign(&pae(&[HEADER.as_bytes(), &message, b"", b""]));

        let mut payload = message;
        payload.extend_from_slice(&signature.to_bytes());
        Ok(format!("{HEADER}{}", URL_SAFE_NO_PAD.encode(payload)))
    }

    fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<TokenIdentity, AuthnError> {
        let rest = token
            .strip_prefix(HEADER)
            .ok_or_else(|| invalid("not a v4.public token"))?;
        let (encoded, footer) = match rest.split_once('.') {
            Some((payload, footer)) => (
                payload,
                URL_SAFE_NO_PAD
                    .decode(footer)
                    .map_err(|_| invalid("malformed footer"))?,
            ),
            None => (rest, Vec::new()),
        };
        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| invalid("malformed payload"))?;
        if payload.len() <= SIGNATURE_LENGTH {
            return Err(invalid("payload too short"));
        }
        let (message, sig_bytes) = payload.split_at(payload.len() - SIGNATURE_LENGTH);
        let signature = Signature::from_slice(sig_bytes).map_err(|_| invalid("bad signature"))?;
        self.verifying_key
            .verify_strict(&pae(&[HEADER.as_bytes(), message, &footer, b""]), &signature)
            .map_err(|_| invalid("signature verification failed"))?;

        let claims: PasetoClaims =
            serde_json::from_slice(message).map_err(|e| invalid(format!("claims: {e}")))?;
        check_identity(
            &claims.iss,
            &claims.aud,
            &claims.sub,
            &claims.client_id,
            &claims.session_id,
        )?;
        check_times(claims.iat, claims.nbf, claims.exp, now)?;
        Ok(TokenIdentity {
            client_id: claims.client_id,
            session_id: claims.session_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn codec() -> PasetoCodec {
        PasetoCodec::new(&HubKey::generate(KeyType::Ed25519).unwrap()).unwrap()
    }

    #[test]
    fn pae_matches_reference_vectors() {
        assert_eq!(pae(&[]), vec![0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            pae(&[b""]),
            vec![1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
        );
        let mut expected = vec![1, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0];
        expected.extend_from_slice(b"test");
        assert_eq!(pae(&[b"test"]), expected);
    }

    #[test]
    fn token_round_trips() {
        let c = codec();
        let now = Utc::now();
        let token = c
            .encode(&TokenClaims::new("alice", "s1", now, Duration::hours(1)))
            .unwrap();
        assert!(token.starts_with("v4.public."));
        let id = c.decode(&token, now).unwrap();
        assert_eq!(id.client_id, "alice");
        assert_eq!(id.session_id, "s1");
    }

    #[test]
    fn expired_token_is_invalid() {
        let c = codec();
        let now = Utc::now();
        let token = c
            .encode(&TokenClaims::new("alice", "s1", now, Duration::hours(1)))
            .unwrap();
        assert!(matches!(
            c.decode(&token, now + Duration::hours(1)),
            Err(AuthnError::InvalidToken(_))
        ));
    }

    #[test]
    fn token_from_the_future_is_invalid() {
        let c = codec();
        let now = Utc::now();
        let token = c
            .encode(&TokenClaims::new("alice", "s1", now + Duration::minutes(5), Duration::hours(1)))
            .unwrap();
        assert!(c.decode(&token, now).is_err());
    }

    #[test]
    fn token_signed_by_other_key_is_invalid() {
        let now = Utc::now();
        let token = codec()
            .encode(&TokenClaims::new("alice", "s1", now, Duration::hours(1)))
            .unwrap();
        assert!(matches!(
            codec().decode(&token, now),
            Err(AuthnError::InvalidToken(_))
        ));
    }

    #[test]
    fn wrong_version_and_garbage_are_invalid() {
        let c = codec();
        let now = Utc::now();
        for bad in ["", "v4.public.", "v3.public.abc", "v4.local.abc", "v4.public.!!!"] {
            assert!(c.decode(bad, now).is_err(), "{bad}");
        }
    }

    #[test]
    fn ecdsa_key_is_rejected_for_paseto() {
        let key = HubKey::generate(KeyType::Ecdsa).unwrap();
        assert!(matches!(
            PasetoCodec::new(&key),
            Err(AuthnError::InvalidArgument(_))
        ));
    }
}
