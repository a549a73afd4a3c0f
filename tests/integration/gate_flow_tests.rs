// =============
// tests/integration/gate_flow_tests.rs
// =============
//! Session gate behaviour against the in-memory backend: cold start, role
//! checks, forced sign-out, feed races and teardown.
use std::time::Duration;

use crate::test_utils::{
    wait_for_gate, wait_for_signed_out, wait_for_user, TestApp, CUSTOMER_EMAIL, OWNER_EMAIL,
    PASSWORD,
};
use santorini_admin::auth::{GatePhase, IdentityProvider};
use santorini_common::{Profile, Role};

#[tokio::test(start_paused = true)]
async fn test_no_session_is_denied_once_initialized() {
    let app = TestApp::new();
    let rx = app.gate().subscribe();
    assert!(rx.borrow().loading);
    assert_eq!(rx.borrow().phase(), GatePhase::Loading);

    app.state.start().await;
    let snapshot = app.gate().snapshot();
    assert!(!snapshot.loading);
    assert_eq!(snapshot.phase(), GatePhase::Denied);
    assert!(snapshot.identity().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_owner_sign_in_is_granted() {
    let app = TestApp::started().await;
    app.backend.sign_in_with_password(OWNER_EMAIL, PASSWORD).await.unwrap();

    let snapshot = wait_for_user(app.gate(), app.owner).await;
    assert_eq!(snapshot.phase(), GatePhase::Granted);
    assert_eq!(snapshot.profile.unwrap().email.as_deref(), Some(OWNER_EMAIL));
    assert_eq!(app.backend.sign_out_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_session_without_profile_is_denied() {
    let app = TestApp::started().await;
    let ghost = app.backend.add_user("ghost@santorini.vn", PASSWORD, None);
    app.backend.sign_in_with_password("ghost@santorini.vn", PASSWORD).await.unwrap();

    let snapshot = wait_for_user(app.gate(), ghost).await;
    assert_eq!(snapshot.phase(), GatePhase::Denied);
    assert!(snapshot.profile.is_none());
    // no profile is a plain denial, the session is left alone
    assert_eq!(app.backend.sign_out_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_customer_is_signed_out_exactly_once() {
    let app = TestApp::started().await;
    app.backend.sign_in_with_password(CUSTOMER_EMAIL, PASSWORD).await.unwrap();

    // let the profile commit and the resulting sign-out run through the feed
    tokio::time::sleep(Duration::from_millis(50)).await;
    let snapshot = app.gate().snapshot();
    assert!(snapshot.session.is_none());
    assert_eq!(snapshot.phase(), GatePhase::Denied);
    assert_eq!(app.backend.sign_out_calls(), 1);

    // later guard checks must not sign out again
    app.gate().revoke_if_not_owner().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(app.backend.sign_out_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_revocation_for_same_customer_session() {
    let app = TestApp::started().await;
    app.backend.set_profile_delay(app.customer, Duration::from_millis(100));
    app.backend.sign_in_with_password(CUSTOMER_EMAIL, PASSWORD).await.unwrap();

    // guard calls while the profile is still loading do nothing
    wait_for_gate(app.gate(), |s| s.session.is_some()).await;
    app.gate().revoke_if_not_owner().await;
    assert_eq!(app.backend.sign_out_calls(), 0);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(app.backend.sign_out_calls(), 1);
    assert_eq!(app.gate().snapshot().phase(), GatePhase::Denied);
    for _ in 0..3 {
        app.gate().revoke_if_not_owner().await;
    }
    assert_eq!(app.backend.sign_out_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_role_is_treated_as_non_owner() {
    let app = TestApp::started().await;
    let staff = app.backend.add_user("staff@santorini.vn", PASSWORD, None);
    app.backend.set_profile(Profile {
        id: staff,
        role: Role::Unknown,
        full_name: "Barista".into(),
        avatar_url: None,
        email: None,
    });
    app.backend.sign_in_with_password("staff@santorini.vn", PASSWORD).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(app.gate().snapshot().session.is_none());
    assert_eq!(app.backend.sign_out_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_late_profile_for_previous_identity_is_discarded() {
    let app = TestApp::started().await;
    let second = app.backend.add_user("manager@santorini.vn", PASSWORD, Some(Role::Owner));
    app.backend.set_profile(Profile {
        id: second,
        role: Role::Owner,
        full_name: "Second Owner".into(),
        avatar_url: None,
        email: None,
    });
    app.backend.set_profile_delay(app.owner, Duration::from_millis(200));

    // A's fetch is slow, B's is instant
    app.backend.sign_in_with_password(OWNER_EMAIL, PASSWORD).await.unwrap();
    app.backend.sign_in_with_password("manager@santorini.vn", PASSWORD).await.unwrap();

    let snapshot = wait_for_user(app.gate(), second).await;
    assert_eq!(snapshot.profile.as_ref().unwrap().id, second);

    // let A's lookup finish; it must not overwrite B
    tokio::time::sleep(Duration::from_millis(500)).await;
    let snapshot = app.gate().snapshot();
    assert_eq!(snapshot.identity().unwrap().id, second);
    assert_eq!(snapshot.profile.as_ref().unwrap().full_name, "Second Owner");
    assert_eq!(snapshot.phase(), GatePhase::Granted);
}

#[tokio::test(start_paused = true)]
async fn test_late_customer_profile_does_not_sign_out_next_owner() {
    let app = TestApp::started().await;
    app.backend.set_profile_delay(app.customer, Duration::from_millis(200));

    app.backend.sign_in_with_password(CUSTOMER_EMAIL, PASSWORD).await.unwrap();
    app.backend.sign_in_with_password(OWNER_EMAIL, PASSWORD).await.unwrap();

    wait_for_user(app.gate(), app.owner).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(app.gate().snapshot().phase(), GatePhase::Granted);
    assert_eq!(app.backend.sign_out_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cold_start_with_persisted_owner_session() {
    let app = TestApp::new();
    app.backend.persist_session_for(app.owner).unwrap();

    app.state.start().await;
    let snapshot = app.gate().snapshot();
    assert_eq!(snapshot.phase(), GatePhase::Granted);
    assert_eq!(snapshot.identity().unwrap().id, app.owner);
    assert_eq!(app.backend.sign_in_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cold_start_with_persisted_customer_session() {
    let app = TestApp::new();
    app.backend.persist_session_for(app.customer).unwrap();

    app.state.start().await;
    let snapshot = wait_for_signed_out(app.gate()).await;
    assert_eq!(snapshot.phase(), GatePhase::Denied);
    assert_eq!(app.backend.sign_out_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_during_profile_fetch() {
    let app = TestApp::started().await;
    app.backend.set_profile_delay(app.owner, Duration::from_millis(100));
    app.backend.sign_in_with_password(OWNER_EMAIL, PASSWORD).await.unwrap();
    let loading = wait_for_gate(app.gate(), |s| s.session.is_some()).await;
    assert!(loading.loading);

    app.gate().sign_out().await.unwrap();
    wait_for_gate(app.gate(), |s| s.session.is_none()).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    let snapshot = app.gate().snapshot();
    assert_eq!(snapshot.phase(), GatePhase::Denied);
    assert!(snapshot.profile.is_none());
    assert!(!snapshot.loading);
}

#[tokio::test(start_paused = true)]
async fn test_token_refresh_keeps_profile() {
    let app = TestApp::started().await;
    app.backend.sign_in_with_password(OWNER_EMAIL, PASSWORD).await.unwrap();
    let before = wait_for_user(app.gate(), app.owner).await;
    let lookups = app.backend.profile_calls();

    let refreshed = app.backend.refresh_session().unwrap();
    let after = wait_for_gate(app.gate(), |s| {
        s.session.as_ref().map(|x| &x.access_token) == Some(&refreshed.access_token)
    })
    .await;

    assert!(!after.loading);
    assert_eq!(after.profile, before.profile);
    assert_eq!(after.phase(), GatePhase::Granted);
    assert_eq!(app.backend.profile_calls(), lookups);
}

#[tokio::test(start_paused = true)]
async fn test_profile_store_failure_fails_closed() {
    let app = TestApp::started().await;
    app.backend.fail_profiles(true);
    app.backend.sign_in_with_password(OWNER_EMAIL, PASSWORD).await.unwrap();

    let snapshot = wait_for_user(app.gate(), app.owner).await;
    assert_eq!(snapshot.phase(), GatePhase::Denied);
    assert_eq!(app.backend.sign_out_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_session_read_failure_denies() {
    let app = TestApp::new();
    app.backend.fail_current_session(true);
    app.state.start().await;
    let snapshot = app.gate().snapshot();
    assert!(!snapshot.loading);
    assert_eq!(snapshot.phase(), GatePhase::Denied);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_mid_fetch() {
    let app = TestApp::started().await;
    app.backend.set_profile_delay(app.owner, Duration::from_millis(100));
    app.backend.sign_in_with_password(OWNER_EMAIL, PASSWORD).await.unwrap();
    let before = wait_for_gate(app.gate(), |s| s.session.is_some()).await;

    app.state.shutdown();
    app.backend.sign_out().await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(app.gate().snapshot(), before);
    assert!(app.gate().is_disposed());
    // dispose is idempotent
    app.state.shutdown();
}
