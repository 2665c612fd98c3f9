use super::*;
use crate::net::types::Role;
use crate::storage::MemoryStore;
use crate::test_helpers::ReadOnlyStore;

fn alice() -> Credential {
    Credential::new("tok-alice", "alice", Role::User)
}

// =============================================================
// load
// =============================================================

#[test]
fn load_empty_storage_is_none() {
    let store = CredentialStore::new(MemoryStore::new());
    assert!(store.load().is_none());
}

#[test]
fn save_then_load_returns_same_credential() {
    let store = CredentialStore::new(MemoryStore::new());
    store.save(&alice()).unwrap();
    assert_eq!(store.load(), Some(alice()));
}

#[test]
fn save_writes_browser_compatible_layout() {
    let store = CredentialStore::new(MemoryStore::new());
    store
        .save(&Credential::new("abc", "admin", Role::Admin))
        .unwrap();
    assert_eq!(store.storage().get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
    let raw = store.storage().get(USER_KEY).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value, serde_json::json!({ "username": "admin", "role": "admin" }));
}

#[test]
fn load_malformed_identity_is_none() {
    let storage = MemoryStore::new();
    storage
        .set_many(&[(TOKEN_KEY, "t".to_owned()), (USER_KEY, "{not json".to_owned())])
        .unwrap();
    let store = CredentialStore::new(storage);
    assert!(store.load().is_none());
}

#[test]
fn load_unknown_role_is_none() {
    let storage = MemoryStore::new();
    storage
        .set_many(&[
            (TOKEN_KEY, "t".to_owned()),
            (USER_KEY, r#"{"username":"eve","role":"root"}"#.to_owned()),
        ])
        .unwrap();
    assert!(CredentialStore::new(storage).load().is_none());
}

#[test]
fn load_token_without_identity_is_none() {
    let storage = MemoryStore::new();
    storage.set_many(&[(TOKEN_KEY, "t".to_owned())]).unwrap();
    assert!(CredentialStore::new(storage).load().is_none());
}

#[test]
fn load_identity_without_token_is_none() {
    let storage = MemoryStore::new();
    storage
        .set_many(&[(USER_KEY, r#"{"username":"bob","role":"user"}"#.to_owned())])
        .unwrap();
    assert!(CredentialStore::new(storage).load().is_none());
}

// =============================================================
// clear / failure atomicity
// =============================================================

#[test]
fn clear_removes_both_entries() {
    let store = CredentialStore::new(MemoryStore::new());
    store.save(&alice()).unwrap();
    store.clear().unwrap();
    assert!(store.load().is_none());
    assert!(store.storage().is_empty());
}

#[test]
fn failed_save_leaves_prior_state() {
    let backing = ReadOnlyStore::default();
    backing
        .inner
        .set_many(&[
            (TOKEN_KEY, "old".to_owned()),
            (USER_KEY, r#"{"username":"old","role":"user"}"#.to_owned()),
        ])
        .unwrap();
    let store = CredentialStore::new(backing);

    assert!(store.save(&alice()).is_err());
    assert_eq!(store.load(), Some(Credential::new("old", "old", Role::User)));
}
