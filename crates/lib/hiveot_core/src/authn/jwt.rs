//! Legacy JWT session tokens.
//!
//! Signed with the hub key: EdDSA for an ED25519 key, ES256 for a P-256
//! key. Accepted algorithms are EdDSA, ES256 and ES384, narrowed to the
//! family of the verifying key.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::AuthnError;
use super::token::{
    AUDIENCE, ISSUER, TokenClaims, TokenCodec, TokenIdentity, check_identity, check_times,
};
use crate::keys::{HubKey, KeyType};

/// Algorithms accepted on decode, before narrowing to the key family.
const ACCEPTED_ALGORITHMS: [Algorithm; 3] = [Algorithm::ES256, Algorithm::ES384, Algorithm::EdDSA];

/// JWT claims embedded in session tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JwtClaims {
    iss: String,
    aud: String,
    /// Subject: the clientID.
    sub: String,
    /// Issued at (unix timestamp).
    iat: i64,
    /// Not before (unix timestamp).
    nbf: i64,
    /// Expiry (unix timestamp).
    exp: i64,
    #[serde(rename = "clientID")]
    client_id: String,
    #[serde(rename = "sessionID")]
    session_id: String,
}

/// JWT codec.
pub struct JwtCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtCodec {
    pub fn new(signing_key: &HubKey) -> Result<Self, AuthnError> {
        let private_pem = signing_key.export_private_pem()?;
        let public_pem = signing_key.export_public_pem()?;
        let (algorithm, encoding_key, decoding_key) = match signing_key.key_type() {
            KeyType::Ed25519 => (
                Algorithm::EdDSA,
                EncodingKey::from_ed_pem(private_pem.as_bytes()),
                DecodingKey::from_ed_pem(public_pem.as_bytes()),
            ),
            KeyType::Ecdsa => (
                Algorithm::ES256,
                EncodingKey::from_ec_pem(private_pem.as_bytes()),
                DecodingKey::from_ec_pem(public_pem.as_bytes()),
            ),
            KeyType::Rsa => {
                return Err(AuthnError::InvalidArgument(
                    "JWT signing requires an ed25519 or ecdsa key".into(),
                ));
            }
        };
        let encoding_key =
            encoding_key.map_err(|e| AuthnError::Internal(format!("jwt encoding key: {e}")))?;
        let decoding_key =
            decoding_key.map_err(|e| AuthnError::Internal(format!("jwt decoding key: {e}")))?;

        let mut validation = Validation::new(algorithm);
        validation.algorithms = ACCEPTED_ALGORITHMS
            .into_iter()
            .filter(|alg| same_family(*alg, algorithm))
            .collect();
        // Time checks run against the injected clock instead.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[AUDIENCE]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud", "sub"]);

        Ok(Self {
            algorithm,
            encoding_key,
            decoding_key,
            validation,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

fn same_family(a: Algorithm, b: Algorithm) -> bool {
    let ec = |alg| matches!(alg, Algorithm::ES256 | Algorithm::ES384);
    (ec(a) && ec(b)) || (a == Algorithm::EdDSA && b == Algorithm::EdDSA)
}

impl TokenCodec for JwtCodec {
    fn format(&self) -> &'static str {
        "jwt"
    }

    fn encode(&self, claims: &TokenClaims) -> Result<String, AuthnError> {
        let body = JwtClaims {
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            sub: claims.client_id.clone(),
            iat: claims.issued_at.timestamp(),
            nbf: claims.issued_at.timestamp(),
            exp: claims.expires_at.timestamp(),
            client_id: claims.client_id.clone(),
            session_id: claims.session_id.clone(),
        };
        encode(&Header::new(self.algorithm), &body, &self.encoding_key)
            .map_err(|e| AuthnError::Internal(format!("jwt encode: {e}")))
    }

    fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<TokenIdentity, AuthnError> {
        let claims = decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AuthnError::InvalidToken(format!("jwt: {e}")))?
            .claims;
        check_identity(
            &claims.iss,
            &claims.aud,
            &claims.sub,
            &claims.client_id,
            &claims.session_id,
        )?;
        check_times(claims.iat, claims.nbf, claims.exp, now.timestamp())?;
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

    fn codec(kt: KeyType) -> JwtCodec {
        JwtCodec::new(&HubKey::generate(kt).unwrap()).unwrap()
    }

    #[test]
    fn eddsa_token_round_trips() {
        let c = codec(KeyType::Ed25519);
        assert_eq!(c.algorithm(), Algorithm::EdDSA);
        let now = Utc::now();
        let token = c
            .encode(&TokenClaims::new("alice", "s1", now, Duration::hours(1)))
            .unwrap();
        let id = c.decode(&token, now).unwrap();
        assert_eq!(id.client_id, "alice");
        assert_eq!(id.session_id, "s1");
    }

    #[test]
    fn es256_token_round_trips() {
        let c = codec(KeyType::Ecdsa);
        assert_eq!(c.algorithm(), Algorithm::ES256);
        let now = Utc::now();
        let token = c
            .encode(&TokenClaims::new("temp01", "temp01", now, Duration::days(90)))
            .unwrap();
        assert!(c.decode(&token, now).unwrap().is_session_less());
    }

    #[test]
    fn expired_jwt_is_invalid() {
        let c = codec(KeyType::Ed25519);
        let now = Utc::now();
        let token = c
            .encode(&TokenClaims::new("alice", "s1", now, Duration::zero()))
            .unwrap();
        assert!(matches!(
            c.decode(&token, now),
            Err(AuthnError::InvalidToken(_))
        ));
    }

    #[test]
    fn token_from_other_family_is_rejected() {
        let now = Utc::now();
        let ec_token = codec(KeyType::Ecdsa)
            .encode(&TokenClaims::new("alice", "s1", now, Duration::hours(1)))
            .unwrap();
        assert!(codec(KeyType::Ed25519).decode(&ec_token, now).is_err());
    }

    #[test]
    fn hs256_token_is_rejected() {
        let now = Utc::now();
        let claims = JwtClaims {
            iss: ISSUER.into(),
            aud: AUDIENCE.into(),
            sub: "alice".into(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: now.timestamp() + 3600,
            client_id: "alice".into(),
            session_id: "s1".into(),
        };
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"guessable"),
        )
        .unwrap();
        assert!(codec(KeyType::Ed25519).decode(&forged, now).is_err());
    }
}
