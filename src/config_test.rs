use super::*;
use std::sync::{Mutex, MutexGuard};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// # Safety
/// Callers must hold `env_lock()`.
unsafe fn clear_portal_env() {
    unsafe {
        std::env::remove_var("POCKET_BASE_URL");
        std::env::remove_var("POCKET_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("POCKET_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("POCKET_MAX_TOKENS");
        std::env::remove_var("POCKET_STATE_FILE");
    }
}

#[test]
fn from_env_uses_defaults() {
    let _guard = env_lock();
    unsafe { clear_portal_env() };

    let cfg = PortalConfig::from_env().unwrap();
    assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
    assert_eq!(cfg.timeouts, Timeouts::default());
    assert_eq!(cfg.max_tokens, DEFAULT_MAX_TOKENS);
    assert!(cfg.state_file.ends_with(".pocket-portal/state.json"));
}

#[test]
fn from_env_parses_overrides() {
    let _guard = env_lock();
    unsafe {
        clear_portal_env();
        std::env::set_var("POCKET_BASE_URL", "https://chat.example.test/");
        std::env::set_var("POCKET_REQUEST_TIMEOUT_SECS", "5");
        std::env::set_var("POCKET_CONNECT_TIMEOUT_SECS", "2");
        std::env::set_var("POCKET_MAX_TOKENS", "250");
        std::env::set_var("POCKET_STATE_FILE", "/tmp/pocket-state.json");
    }

    let cfg = PortalConfig::from_env().unwrap();
    assert_eq!(cfg.base_url, "https://chat.example.test");
    assert_eq!(cfg.timeouts, Timeouts { request_secs: 5, connect_secs: 2 });
    assert_eq!(cfg.max_tokens, 250);
    assert_eq!(cfg.state_file, PathBuf::from("/tmp/pocket-state.json"));

    unsafe { clear_portal_env() };
}

#[test]
fn from_env_rejects_unparseable_timeout() {
    let _guard = env_lock();
    unsafe {
        clear_portal_env();
        std::env::set_var("POCKET_REQUEST_TIMEOUT_SECS", "soon");
    }

    let err = PortalConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("POCKET_REQUEST_TIMEOUT_SECS"));

    unsafe { clear_portal_env() };
}

#[test]
fn from_env_rejects_out_of_range_max_tokens() {
    let _guard = env_lock();
    unsafe {
        clear_portal_env();
        std::env::set_var("POCKET_MAX_TOKENS", "5000");
    }

    assert!(PortalConfig::from_env().is_err());

    unsafe { clear_portal_env() };
}

#[test]
fn validate_max_tokens_bounds_inclusive() {
    assert_eq!(validate_max_tokens(MIN_MAX_TOKENS).unwrap(), MIN_MAX_TOKENS);
    assert_eq!(validate_max_tokens(MAX_MAX_TOKENS).unwrap(), MAX_MAX_TOKENS);
    assert!(validate_max_tokens(9).is_err());
    assert!(validate_max_tokens(2001).is_err());
}
