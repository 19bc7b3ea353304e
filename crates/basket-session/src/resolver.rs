//! Reuse-or-create session resolution.

use std::sync::Arc;

use basket_store::{CartSession, CartSessionStore, IssuedSession, StoreError};
use tracing::{debug, warn};

use crate::error::{Result, SessionError};

/// How a resolved session came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// A fresh session was created; the client must adopt the new token.
    Created,
    /// An existing session was loaded with the presented token.
    Restored,
}

/// An authoritative session together with the token the client should hold.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub session: CartSession,
    pub token: String,
    pub origin: SessionOrigin,
}

impl ResolvedSession {
    pub fn cart_key(&self) -> &str {
        &self.session.cart_key
    }

    pub fn is_new(&self) -> bool {
        self.origin == SessionOrigin::Created
    }

    fn created(issued: IssuedSession) -> Self {
        Self {
            session: issued.session,
            token: issued.token,
            origin: SessionOrigin::Created,
        }
    }
}

/// Entry point every cart request goes through.
///
/// Calls block on the store.
#[derive(Clone)]
pub struct SessionResolver {
    store: Arc<dyn CartSessionStore>,
}

impl SessionResolver {
    pub fn new(store: Arc<dyn CartSessionStore>) -> Self {
        Self { store }
    }

    /// Resolve the presented token, falling back to a new session.
    ///
    /// An absent, invalid or expired token, or a token whose row is gone,
    /// never fails the call: it yields a new empty session and a new token.
    /// A restored session keeps the presented token. Only store failures
    /// are returned as errors.
    pub fn resolve(&self, token: Option<&str>) -> Result<ResolvedSession> {
        let Some(token) = token else {
            return self.create("no token");
        };

        let claims = match self.store.codec().verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(reason = e.reason(), "Presented token rejected");
                return self.create(e.reason());
            }
        };

        match self.store.load(&claims.cart_key) {
            Ok(session) => {
                debug!(cart_key = %session.cart_key, "Restored cart session");
                Ok(ResolvedSession {
                    session,
                    token: token.to_string(),
                    origin: SessionOrigin::Restored,
                })
            }
            Err(StoreError::NotFound(_)) => self.create("session gone"),
            Err(e @ StoreError::CorruptPayload { .. }) => {
                warn!(cart_key = %claims.cart_key, error = %e, "Replacing cart with unreadable payload");
                self.create("corrupt payload")
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve without ever creating a session.
    ///
    /// Used at the checkout handoff boundary, where silently swapping in an
    /// empty cart would lose the order.
    pub fn resolve_strict(&self, token: Option<&str>) -> Result<ResolvedSession> {
        let token = token.ok_or(SessionError::MissingToken)?;
        let claims = self.store.codec().verify(token)?;

        match self.store.load(&claims.cart_key) {
            Ok(session) => Ok(ResolvedSession {
                session,
                token: token.to_string(),
                origin: SessionOrigin::Restored,
            }),
            Err(StoreError::NotFound(key)) => Err(SessionError::NotFound(key)),
            Err(e) => Err(e.into()),
        }
    }

    fn create(&self, reason: &str) -> Result<ResolvedSession> {
        let issued = self.store.create()?;
        debug!(cart_key = %issued.session.cart_key, reason, "Created cart session");
        Ok(ResolvedSession::created(issued))
    }
}
