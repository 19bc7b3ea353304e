//! HS256 token issuance and verification.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::TokenConfig;
use crate::error::{Result, TokenError};

type HmacSha256 = Hmac<Sha256>;

/// Fixed token header.
#[derive(Serialize)]
struct Header {
    alg: &'static str,
    typ: &'static str,
}

const HEADER: Header = Header {
    alg: "HS256",
    typ: "JWT",
};

/// Claims carried by a cart token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub cart_key: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expires-at, unix seconds.
    pub exp: i64,
    pub iss: String,
}

impl Claims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Claims as they arrive off the wire, before required fields are checked.
#[derive(Deserialize)]
struct RawClaims {
    #[serde(default)]
    cart_key: Option<String>,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    iss: Option<String>,
}

/// Stateless signer/verifier. Holds only the keyed MAC and the issuer.
#[derive(Clone)]
pub struct TokenCodec {
    mac: HmacSha256,
    issuer: String,
    default_ttl: Duration,
}

impl TokenCodec {
    /// Build a codec from its configuration. The secret must not be empty.
    pub fn new(config: TokenConfig) -> Result<Self> {
        if config.secret.is_empty() {
            return Err(TokenError::InvalidSecret("secret is empty".to_string()));
        }
        let mac = HmacSha256::new_from_slice(&config.secret)
            .map_err(|e| TokenError::InvalidSecret(e.to_string()))?;

        Ok(Self {
            mac,
            issuer: config.issuer,
            default_ttl: config.ttl,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issue a token for `cart_key` valid for `ttl` from now.
    pub fn issue(&self, cart_key: &str, ttl: Duration) -> Result<String> {
        self.issue_at(cart_key, ttl, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, cart_key: &str, ttl: Duration, now: DateTime<Utc>) -> Result<String> {
        let iat = now.timestamp();
        let claims = Claims {
            cart_key: cart_key.to_string(),
            iat,
            exp: iat + ttl.num_seconds(),
            iss: self.issuer.clone(),
        };

        let header = serde_json::to_vec(&HEADER).map_err(|e| TokenError::Encode(e.to_string()))?;
        let claims = serde_json::to_vec(&claims).map_err(|e| TokenError::Encode(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(claims)
        );
        let signature = self.sign(&signing_input);

        Ok(format!("{}.{}", signing_input, signature))
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as if the current time were `now`.
    ///
    /// Checks run in a fixed order: shape, signature, claims, expiry.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims> {
        let segments: Vec<&str> = token.split('.').collect();
        let [header, claims, signature] = segments.as_slice() else {
            return Err(TokenError::Malformed);
        };

        let expected = self.sign(&format!("{}.{}", header, claims));
        if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
            return Err(TokenError::BadSignature);
        }

        let claims = decode_claims(claims)?;
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn sign(&self, signing_input: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(signing_input.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

fn decode_claims(segment: &str) -> Result<Claims> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::BadPayload("claims are not base64url".to_string()))?;
    let raw: RawClaims = serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::BadPayload(format!("claims are not a JSON object: {}", e)))?;

    let cart_key = raw
        .cart_key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| TokenError::BadPayload("missing cart_key".to_string()))?;
    let exp = raw
        .exp
        .ok_or_else(|| TokenError::BadPayload("missing exp".to_string()))?;

    Ok(Claims {
        cart_key,
        iat: raw.iat.unwrap_or_default(),
        exp,
        iss: raw.iss.unwrap_or_default(),
    })
}

/// Compare two byte strings without short-circuiting on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        let _ = a.ct_eq(a);
        return false;
    }
    a.ct_eq(b).into()
}
