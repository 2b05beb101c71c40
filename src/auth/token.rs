//! Bearer token verification.
//!
//! Tokens are compact JWS values signed with HMAC-SHA256. Signature and
//! algorithm checks go through `jsonwebtoken`; expiry is compared against an
//! explicit clock so it stays exclusive (`now >= exp` is expired).
//! The gateway only verifies tokens; `sign` exists for tooling and tests.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::claims::Claims;
use crate::auth::AuthError;

/// Verifies bearer tokens against a pre-shared secret.
///
/// The key is derived once at construction and never changes afterwards, so
/// a validator can be shared freely between request tasks.
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator").finish_non_exhaustive()
    }
}

impl TokenValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked in `validate_at`; `exp` must still be present.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }

    /// Validate against the current wall clock.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate_at(token, now_secs())
    }

    /// Validate with an explicit clock reading (seconds since the Unix epoch).
    pub fn validate_at(&self, token: &str, now: u64) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidSignature => AuthError::InvalidToken("signature mismatch"),
                ErrorKind::InvalidAlgorithm => AuthError::InvalidToken("unsupported algorithm"),
                _ => AuthError::InvalidToken("malformed token"),
            })?
            .claims;

        if now >= claims.exp {
            return Err(AuthError::ExpiredToken);
        }
        Ok(claims)
    }
}

/// Produce a signed HS256 token for `claims`.
pub fn sign(claims: &Claims, secret: &[u8]) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
}

/// Seconds since the Unix epoch.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    const SECRET: &[u8] = b"test_secret_key_32_bytes_long!!!";
    const NOW: u64 = 1_700_000_000;

    fn claims() -> Claims {
        Claims::new("42", NOW + 3600)
            .with_username("alice")
            .with_roles(["USER", "ADMIN"])
            .issued_at(NOW)
    }

    #[test]
    fn valid_token_round_trips_claims() {
        let token = sign(&claims(), SECRET).unwrap();
        let validator = TokenValidator::new(SECRET);

        assert_eq!(validator.validate_at(&token, NOW).unwrap(), claims());
    }

    #[test]
    fn any_single_bit_flip_in_signature_is_rejected() {
        let token = sign(&claims(), SECRET).unwrap();
        let validator = TokenValidator::new(SECRET);

        let (signing_input, signature_b64) = token.rsplit_once('.').unwrap();
        let signature = URL_SAFE_NO_PAD.decode(signature_b64).unwrap();

        for bit in 0..signature.len() * 8 {
            let mut mutated = signature.clone();
            mutated[bit / 8] ^= 1 << (bit % 8);
            let forged = format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(&mutated));

            assert!(
                matches!(
                    validator.validate_at(&forged, NOW),
                    Err(AuthError::InvalidToken(_))
                ),
                "bit {bit} flip was accepted"
            );
        }
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign(&claims(), b"another secret").unwrap();
        let err = TokenValidator::new(SECRET).validate_at(&token, NOW).unwrap_err();
        assert_eq!(err, AuthError::InvalidToken("signature mismatch"));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = sign(&Claims::new("42", NOW - 1), SECRET).unwrap();
        let validator = TokenValidator::new(SECRET);

        assert_eq!(validator.validate_at(&token, NOW), Err(AuthError::ExpiredToken));
        // Expiry is exclusive.
        let token = sign(&Claims::new("42", NOW), SECRET).unwrap();
        assert_eq!(validator.validate_at(&token, NOW), Err(AuthError::ExpiredToken));
        assert!(validator.validate_at(&token, NOW - 1).is_ok());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = sign(&claims(), SECRET).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&Claims::new("1", NOW + 3600).with_roles(["ADMIN"])).unwrap(),
        );
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(
            TokenValidator::new(SECRET).validate_at(&forged, NOW),
            Err(AuthError::InvalidToken("signature mismatch"))
        );
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let validator = TokenValidator::new(SECRET);
        for token in ["", "abc", "a.b", "a.b.c.d", ".b.c", "a..c", "%%%.%%%.%%%"] {
            assert!(
                matches!(validator.validate_at(token, NOW), Err(AuthError::InvalidToken(_))),
                "{token:?} was accepted"
            );
        }
    }

    #[test]
    fn other_algorithms_are_rejected() {
        let hs384 = encode(
            &Header::new(Algorithm::HS384),
            &claims(),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert_eq!(
            TokenValidator::new(SECRET).validate_at(&hs384, NOW),
            Err(AuthError::InvalidToken("unsupported algorithm"))
        );

        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims()).unwrap());
        let unsigned = format!("{header}.{payload}.");
        assert!(matches!(
            TokenValidator::new(SECRET).validate_at(&unsigned, NOW),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn token_without_expiry_is_rejected() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({"sub": "42"}),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(matches!(
            TokenValidator::new(SECRET).validate_at(&token, NOW),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
