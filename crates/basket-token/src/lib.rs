//! Compact signed tokens binding a client to one cart session.
//!
//! Tokens use the familiar three-segment form
//! `base64url(header) "." base64url(claims) "." base64url(hmac_sha256)`
//! with padding stripped. Verification needs only the server secret, never a
//! store lookup.
//!
//! Rotating the secret invalidates every outstanding token. Clients holding
//! one are not locked out: the session resolver treats any invalid token as
//! "start a fresh cart" and hands back a new token.
//!
//! # Example
//!
//! ```rust,ignore
//! use basket_token::{TokenCodec, TokenConfig};
//!
//! let codec = TokenCodec::new(TokenConfig::new("server-secret", "https://shop.example"))?;
//! let token = codec.issue("ck_abc", codec.default_ttl())?;
//! let claims = codec.verify(&token)?;
//! assert_eq!(claims.cart_key, "ck_abc");
//! ```

mod codec;
mod config;
mod error;

pub use codec::{Claims, TokenCodec};
pub use config::{DEFAULT_TOKEN_TTL_SECS, TokenConfig};
pub use error::{Result, TokenError};
