//! Token storage for the LexLink client.
//!
//! This crate owns the durable token store backing the auth session:
//! - a `TokenStorage` trait with a JSON-file backend
//! - fixed storage key names shared with the web client
//! - a `TokenStore` facade whose reads degrade to "absent" on backend failure

mod file;
mod keys;
mod tokens;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use tokens::{TokenKind, TokenStore};
pub use traits::TokenStorage;

use std::sync::Arc;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Platform-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Default on-disk location for the token store.
pub fn default_store_path() -> StorageResult<std::path::PathBuf> {
    let base = dirs::data_dir().ok_or_else(|| {
        StorageError::Platform("No data directory available on this platform".to_string())
    })?;
    Ok(base.join("lexlink").join("tokens.json"))
}

/// Create a `TokenStore` backed by the default file location.
pub fn create_token_store() -> StorageResult<TokenStore> {
    let storage = FileStorage::open(default_store_path()?)?;
    Ok(TokenStore::new(Arc::new(storage)))
}
