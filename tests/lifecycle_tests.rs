mod common;

use common::{spawn_session, FakeApi, FakeRoom, ROOT_BRANCH, SESSION};
use fac_gym::mode::{IntentError, SessionMode};
use fac_gym::session::{Intent, Lifecycle, LifecycleError};
use std::sync::atomic::Ordering;
use std::time::Duration;

fn lifecycle(api: std::sync::Arc<FakeApi>) -> Lifecycle {
    Lifecycle::new(api, "user", Duration::from_millis(2000))
}

#[tokio::test]
async fn test_start_records_session_and_token() {
    let api = FakeApi::new();
    let mut lifecycle = lifecycle(api.clone());

    let info = lifecycle.start("cs-1").await.unwrap();
    assert_eq!(info.session_id, SESSION);
    assert_eq!(info.active_branch_id, ROOT_BRANCH);
    assert_eq!(info.room_name, format!("room-{}", SESSION));
    assert_eq!(info.token, format!("token-{}-user", SESSION));
    assert_eq!(lifecycle.session(), Some(&info));

    // One session at a time
    match lifecycle.start("cs-1").await {
        Err(LifecycleError::AlreadyActive(id)) => assert_eq!(id, SESSION),
        other => panic!("unexpected: {:?}", other.map(|i| i.session_id)),
    }
    assert_eq!(api.starts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_start_leaves_no_session() {
    let api = FakeApi::new();
    api.fail_start.store(true, Ordering::SeqCst);
    let mut lifecycle = lifecycle(api.clone());

    assert!(matches!(
        lifecycle.start("cs-1").await,
        Err(LifecycleError::Api(_))
    ));
    assert!(lifecycle.session().is_none());
    assert!(api.stops().is_empty());
}

#[tokio::test]
async fn test_failed_token_mint_leaves_no_session() {
    let api = FakeApi::new();
    api.fail_mint.store(true, Ordering::SeqCst);
    let mut lifecycle = lifecycle(api.clone());

    assert!(matches!(
        lifecycle.start("cs-1").await,
        Err(LifecycleError::Api(_))
    ));
    assert!(lifecycle.session().is_none());
    assert!(lifecycle.handle().is_none());
    // The server-side session is not left running
    assert_eq!(api.stops(), vec![SESSION.to_string()]);

    // A later attempt can succeed
    api.fail_mint.store(false, Ordering::SeqCst);
    assert!(lifecycle.start("cs-1").await.is_ok());
}

#[tokio::test]
async fn test_end_clears_state_even_when_stop_fails() {
    let api = FakeApi::new();
    api.fail_stop.store(true, Ordering::SeqCst);
    let mut lifecycle = lifecycle(api.clone());
    lifecycle.start("cs-1").await.unwrap();

    let room = FakeRoom::new();
    let running = spawn_session(room.clone()).await;
    let handle = running.handle.clone();
    lifecycle.attach(running.handle, running.task).unwrap();

    lifecycle.end().await.unwrap();

    assert!(lifecycle.session().is_none());
    assert!(lifecycle.handle().is_none());
    assert_eq!(api.stops(), vec![SESSION.to_string()]);
    assert_eq!(room.sent_kinds(), vec!["finish"]);
    assert!(room.left.load(Ordering::SeqCst));
    assert!(handle.is_closed());

    assert!(matches!(lifecycle.end().await, Err(LifecycleError::NoSession)));
}

#[tokio::test]
async fn test_end_without_runtime_still_stops() {
    let api = FakeApi::new();
    let mut lifecycle = lifecycle(api.clone());
    lifecycle.start("cs-1").await.unwrap();

    lifecycle.end().await.unwrap();
    assert_eq!(api.stops(), vec![SESSION.to_string()]);
    assert!(lifecycle.session().is_none());
}

#[tokio::test]
async fn test_attach_requires_started_session() {
    let mut lifecycle = lifecycle(FakeApi::new());
    let running = spawn_session(FakeRoom::new()).await;

    assert!(matches!(
        lifecycle.attach(running.handle, running.task),
        Err(LifecycleError::NoSession)
    ));
}

#[tokio::test]
async fn test_fetch_rewind_targets_loads_panel() {
    let api = FakeApi::new();
    let mut lifecycle = lifecycle(api.clone());
    lifecycle.start("cs-1").await.unwrap();

    let room = FakeRoom::new();
    let running = spawn_session(room.clone()).await;
    let handle = running.handle.clone();
    lifecycle.attach(running.handle, running.task).unwrap();

    // Only while paused
    assert!(matches!(
        lifecycle.fetch_rewind_targets().await,
        Err(LifecycleError::Intent(IntentError::InvalidMode {
            mode: SessionMode::Live,
            ..
        }))
    ));
    assert!(api.transcript_requests.lock().unwrap().is_empty());

    handle.send(Intent::TimeStop).await.unwrap();
    let targets = lifecycle.fetch_rewind_targets().await.unwrap();

    let eligible: Vec<_> = targets
        .iter()
        .filter(|t| t.eligible)
        .map(|t| t.utterance.utterance_id.as_str())
        .collect();
    assert_eq!(eligible, vec!["u1", "u2", "u4"]);
    assert_eq!(
        api.transcript_requests.lock().unwrap().clone(),
        vec![(SESSION.to_string(), ROOT_BRANCH.to_string())]
    );
    assert_eq!(handle.view().rewind_targets, targets);
}

#[tokio::test]
async fn test_unload_stops_session_and_ignores_failure() {
    let api = FakeApi::new();
    api.fail_stop.store(true, Ordering::SeqCst);
    let mut lifecycle = lifecycle(api.clone());
    lifecycle.start("cs-1").await.unwrap();

    lifecycle.on_unload().await;
    assert_eq!(api.stops(), vec![SESSION.to_string()]);
    assert!(lifecycle.session().is_none());

    // Nothing left to stop
    lifecycle.on_unload().await;
    assert_eq!(api.stops().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unload_gives_up_on_unresponsive_service() {
    let api = FakeApi::new();
    api.hang_stop.store(true, Ordering::SeqCst);
    let mut lifecycle = lifecycle(api.clone());
    lifecycle.start("cs-1").await.unwrap();
    let room = FakeRoom::new();
    let running = spawn_session(room.clone()).await;
    lifecycle.attach(running.handle.clone(), running.task).unwrap();

    let started = tokio::time::Instant::now();
    lifecycle.on_unload().await;
    let waited = started.elapsed();

    assert!(waited >= Duration::from_millis(2000));
    assert!(waited < Duration::from_millis(2500));
    assert_eq!(api.stops(), vec![SESSION.to_string()]);
    assert!(lifecycle.session().is_none());
    assert!(running.handle.is_closed());
    assert!(room.left.load(Ordering::SeqCst));
    // Unload never announces the end of the session
    assert!(room.sent().is_empty());
}

#[tokio::test]
async fn test_list_case_studies() {
    let lifecycle = lifecycle(FakeApi::new());
    let cases = lifecycle.list_case_studies().await.unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].case_study_id, "cs-1");
}
