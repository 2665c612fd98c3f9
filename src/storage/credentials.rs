//! Credential store: the single source of truth for "is this client signed in".
//!
//! Two keyed entries, matching the browser client's `localStorage` layout:
//! `token` holds the opaque bearer token and `user` holds `{username, role}`
//! as JSON. They are written and cleared in one batch.

#[cfg(test)]
#[path = "credentials_test.rs"]
mod credentials_test;

use tracing::warn;

use super::{KeyValueStore, StorageError};
use crate::net::types::{Credential, Identity};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

pub struct CredentialStore<S> {
    storage: S,
}

impl<S: KeyValueStore> CredentialStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Read the persisted credential.
    ///
    /// Fails soft: unreadable storage, a missing half, or identity JSON that
    /// does not parse all read as "not signed in".
    pub fn load(&self) -> Option<Credential> {
        let token = match self.storage.get(TOKEN_KEY) {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => return None,
            Err(e) => {
                warn!(error = %e, "credentials: token unreadable");
                return None;
            }
        };
        let raw_identity = match self.storage.get(USER_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                warn!("credentials: token present without identity");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "credentials: identity unreadable");
                return None;
            }
        };
        match serde_json::from_str::<Identity>(&raw_identity) {
            Ok(identity) => Some(Credential { token, identity }),
            Err(e) => {
                warn!(error = %e, "credentials: malformed identity ignored");
                None
            }
        }
    }

    /// Persist token and identity together.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity cannot be encoded or the batch write
    /// fails; nothing is written in either case.
    pub fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        let identity = serde_json::to_string(&credential.identity)?;
        self.storage
            .set_many(&[(TOKEN_KEY, credential.token.clone()), (USER_KEY, identity)])
    }

    /// Remove token and identity together.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal could not be persisted.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove_many(&[TOKEN_KEY, USER_KEY])
    }
}
