/// Identity token verification and the session cookie that carries it
use crate::{
    config::SessionConfig,
    error::{AppError, AppResult},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{
    decode, decode_header,
    jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet, PublicKeyUse},
    Algorithm, DecodingKey, Validation,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Name of the cookie holding the raw identity token
pub const SESSION_COOKIE: &str = "token";

/// Raw identity token as issued by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
}

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// Token whose signature, issuer, audience and lifetime checked out
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub claims: serde_json::Value,
}

/// Claims the service relies on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdTokenClaims {
    pub email: String,
}

struct VerificationKey {
    kid: Option<String>,
    algorithm: Algorithm,
    key: DecodingKey,
}

/// Signing algorithm a published key is bound to
///
/// The JWK's `alg` wins; keys without one fall back to the usual algorithm
/// for their key type. Encryption keys have none.
fn signing_algorithm(jwk: &Jwk) -> Option<Algorithm> {
    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        return None;
    }

    if let Some(alg) = &jwk.common.key_algorithm {
        return Algorithm::from_str(&alg.to_string()).ok();
    }

    match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => Some(Algorithm::RS256),
        AlgorithmParameters::EllipticCurve(params) => match params.curve {
            EllipticCurve::P256 => Some(Algorithm::ES256),
            EllipticCurve::P384 => Some(Algorithm::ES384),
            _ => None,
        },
        AlgorithmParameters::OctetKey(_) => Some(Algorithm::HS256),
        AlgorithmParameters::OctetKeyPair(_) => Some(Algorithm::EdDSA),
    }
}

/// Checks identity tokens against the provider's published keys
pub struct IdTokenVerifier {
    issuer: String,
    audience: String,
    keys: Vec<VerificationKey>,
}

impl IdTokenVerifier {
    /// Build a verifier from the provider's JWK set
    pub fn from_jwks(issuer: &str, audience: &str, jwks: &JwkSet) -> AppResult<Self> {
        let mut keys = Vec::with_capacity(jwks.keys.len());
        for jwk in &jwks.keys {
            let Some(algorithm) = signing_algorithm(jwk) else {
                tracing::debug!("Skipping non-signing JWK {:?}", jwk.common.key_id);
                continue;
            };

            match DecodingKey::from_jwk(jwk) {
                Ok(key) => keys.push(VerificationKey {
                    kid: jwk.common.key_id.clone(),
                    algorithm,
                    key,
                }),
                // Providers publish encryption keys next to signing keys
                Err(e) => tracing::debug!("Skipping unusable JWK {:?}: {}", jwk.common.key_id, e),
            }
        }

        if keys.is_empty() {
            return Err(AppError::IdentityProvider(
                "Provider published no usable signing keys".to_string(),
            ));
        }

        Ok(Self {
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            keys,
        })
    }

    /// Build a verifier from a single HS256 key
    #[cfg(test)]
    pub fn from_key(issuer: &str, audience: &str, kid: Option<&str>, key: DecodingKey) -> Self {
        Self {
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            keys: vec![VerificationKey {
                kid: kid.map(str::to_string),
                algorithm: Algorithm::HS256,
                key,
            }],
        }
    }

    fn select_key(&self, kid: Option<&str>) -> AppResult<&VerificationKey> {
        let found = match kid {
            Some(kid) => self.keys.iter().find(|k| k.kid.as_deref() == Some(kid)),
            None if self.keys.len() == 1 => self.keys.first(),
            None => None,
        };

        found.ok_or_else(|| AppError::InvalidToken("No matching signing key".to_string()))
    }

    /// Verify signature, issuer, audience and expiry
    pub fn validate(&self, raw: &str) -> AppResult<VerifiedToken> {
        let header = decode_header(raw)
            .map_err(|e| AppError::InvalidToken(format!("Malformed token header: {}", e)))?;
        let key = self.select_key(header.kid.as_deref())?;

        // The key decides the algorithm, never the token header
        if header.alg != key.algorithm {
            return Err(AppError::InvalidToken(format!(
                "Token algorithm {:?} does not match key algorithm {:?}",
                header.alg, key.algorithm
            )));
        }

        let mut validation = Validation::new(key.algorithm);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let data = decode::<serde_json::Value>(raw, &key.key, &validation).map_err(|e| {
            tracing::debug!("Identity token rejected: {}", e);
            AppError::InvalidToken(e.to_string())
        })?;

        Ok(VerifiedToken {
            claims: data.claims,
        })
    }

    /// Validate the token and extract the verified email
    pub fn claims(&self, raw: &str) -> AppResult<IdTokenClaims> {
        let verified = self.validate(raw)?;

        let email = verified
            .claims
            .get("email")
            .and_then(|v| v.as_str())
            .filter(|email| !email.is_empty())
            .ok_or_else(|| AppError::Claims("Token carries no email claim".to_string()))?;

        Ok(IdTokenClaims {
            email: email.to_string(),
        })
    }
}

/// Host-only session cookie holding the identity token
pub fn session_cookie(token: &SessionToken, config: &SessionConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.token.clone()))
        .path("/")
        .max_age(time::Duration::seconds(config.max_age))
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Expired replacement that makes the browser drop the session
pub fn expired_session_cookie(config: &SessionConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::UNIX_EPOCH)
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Session token from the request cookies, if any
pub fn token_from_jar(jar: &CookieJar) -> Option<SessionToken> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty())
        .map(SessionToken::new)
}
