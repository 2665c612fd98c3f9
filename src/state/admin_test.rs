use super::*;
use crate::net::types::Role;
use crate::test_helpers::{Call, MockApi, http_error, sample_metrics};

fn admin() -> Credential {
    Credential::new("admin-tok", "admin", Role::Admin)
}

fn user() -> Credential {
    Credential::new("user-tok", "alice", Role::User)
}

#[test]
fn admin_state_defaults() {
    let state = AdminState::default();
    assert!(state.metrics.is_none());
    assert!(!state.loading);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn refresh_loads_metrics_for_admin() {
    let api = MockApi::new().with_metrics(Ok(sample_metrics()));
    let mut state = AdminState::default();

    let metrics = state.refresh(&api, &admin()).await.unwrap();

    assert_eq!(metrics, &sample_metrics());
    assert_eq!(api.calls(), vec![Call::Metrics { token: "admin-tok".to_owned() }]);
}

#[tokio::test]
async fn non_admin_is_refused_without_request() {
    let api = MockApi::new();
    let mut state = AdminState::default();

    assert!(matches!(state.refresh(&api, &user()).await, Err(AdminError::Forbidden)));
    assert!(matches!(state.clear_cache(&api, &user()).await, Err(AdminError::Forbidden)));
    assert_eq!(api.call_count(), 0);
}

#[tokio::test]
async fn refresh_failure_is_recorded() {
    let api = MockApi::new().with_metrics(Err(http_error(403, Some("Admin only"))));
    let mut state = AdminState::default();

    let err = state.refresh(&api, &admin()).await.unwrap_err();

    assert_eq!(err.user_message(), "Admin only");
    assert_eq!(state.error.as_deref(), Some("Admin only"));
    assert!(state.metrics.is_none());
}

#[tokio::test]
async fn clear_cache_refreshes_metrics() {
    let api = MockApi::new()
        .with_clear(Ok(()))
        .with_metrics(Ok(sample_metrics()));
    let mut state = AdminState::default();

    state.clear_cache(&api, &admin()).await.unwrap();

    assert_eq!(
        api.calls(),
        vec![Call::ClearCache { token: "admin-tok".to_owned() }, Call::Metrics { token: "admin-tok".to_owned() }]
    );
    assert_eq!(state.metrics, Some(sample_metrics()));
}

#[tokio::test]
async fn clear_cache_failure_skips_refresh() {
    let api = MockApi::new().with_clear(Err(http_error(500, None)));
    let mut state = AdminState::default();

    let err = state.clear_cache(&api, &admin()).await.unwrap_err();

    assert_eq!(err.user_message(), "HTTP error! status: 500");
    assert_eq!(api.calls(), vec![Call::ClearCache { token: "admin-tok".to_owned() }]);
}

#[tokio::test]
async fn clear_cache_succeeds_even_if_refresh_fails() {
    let api = MockApi::new()
        .with_clear(Ok(()))
        .with_metrics(Err(http_error(502, None)));
    let mut state = AdminState::default();

    state.clear_cache(&api, &admin()).await.unwrap();
    assert_eq!(state.error.as_deref(), Some("HTTP error! status: 502"));
}
