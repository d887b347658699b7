//! Token store facade over a storage backend.

use crate::{StorageKeys, TokenStorage};
use std::sync::Arc;
use tracing::warn;

/// Which token a store operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn key(self) -> &'static str {
        match self {
            TokenKind::Access => StorageKeys::ACCESS_TOKEN,
            TokenKind::Refresh => StorageKeys::REFRESH_TOKEN,
        }
    }
}

/// Single source of truth for the current token pair.
///
/// Backend failures degrade to "no token": callers always see a consistent
/// optional value and never have to handle storage errors themselves.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn TokenStorage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self { storage }
    }

    /// Read a token, treating any backend failure as absence.
    pub fn get(&self, kind: TokenKind) -> Option<String> {
        match self.storage.get(kind.key()) {
            Ok(value) => value,
            Err(error) => {
                warn!(key = kind.key(), error = %error, "Token read failed, treating as absent");
                None
            }
        }
    }

    /// Write a token. Failures are logged and swallowed.
    pub fn set(&self, kind: TokenKind, token: &str) {
        if let Err(error) = self.storage.set(kind.key(), token) {
            warn!(key = kind.key(), error = %error, "Token write failed");
        }
    }

    /// Store a fresh access/refresh pair.
    pub fn set_pair(&self, access_token: &str, refresh_token: &str) {
        self.set(TokenKind::Access, access_token);
        self.set(TokenKind::Refresh, refresh_token);
    }

    /// Remove both tokens. Idempotent.
    pub fn clear(&self) {
        for kind in [TokenKind::Access, TokenKind::Refresh] {
            if let Err(error) = self.storage.delete(kind.key()) {
                warn!(key = kind.key(), error = %error, "Token delete failed");
            }
        }
    }

    /// Check whether a token of the given kind is present.
    pub fn has(&self, kind: TokenKind) -> bool {
        self.get(kind).is_some()
    }
}
