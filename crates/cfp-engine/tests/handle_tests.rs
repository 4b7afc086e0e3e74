//! Process-level tests for [`EngineHandle`].
//!
//! These spawn real `/bin/sh` engine doubles, so they are unix-only.

#![cfg(unix)]

use std::time::Duration;

use cfp_engine::testing::{
    write_engine_script, write_stub_engine, ANONYMOUS_ENGINE, SILENT_ENGINE,
};
use cfp_engine::{
    DriverTimeouts, EngineConfig, EngineError, EngineEvent, EngineHandle, EnginePlayer,
    EngineState,
};
use cfp_protocol::EngineOption;
use cfp_types::Board;

fn test_config() -> EngineConfig {
    EngineConfig {
        timeouts: DriverTimeouts {
            handshake: Duration::from_secs(5),
            ready: Duration::from_secs(5),
            best_move: Duration::from_secs(5),
        },
        quit_wait: Duration::from_secs(5),
    }
}

async fn loaded_stub() -> (tempfile::TempDir, EngineHandle) {
    let dir = tempfile::tempdir().unwrap();
    let path = write_stub_engine(dir.path()).unwrap();
    let handle = EngineHandle::spawn(&path, &test_config()).unwrap();
    handle.load().await.unwrap();
    (dir, handle)
}

#[tokio::test]
async fn load_fills_identity_and_options() {
    let (_dir, handle) = loaded_stub().await;

    assert_eq!(handle.name(), "Stub Engine");
    assert_eq!(handle.author(), "Arena Tests");
    assert_eq!(handle.state(), EngineState::Ready);

    let options = handle.options();
    assert_eq!(options.len(), 2);
    assert!(matches!(
        options.get("Depth"),
        Some(EngineOption::Spin {
            min: 0,
            max: 10,
            value: 1,
            ..
        })
    ));
    assert!(matches!(options.get("Style"), Some(EngineOption::Combo { .. })));

    handle.quit().await.unwrap();
}

#[tokio::test]
async fn load_twice_is_rejected() {
    let (_dir, handle) = loaded_stub().await;

    assert_eq!(handle.load().await, Err(EngineError::NotReady));

    handle.quit().await.unwrap();
}

#[tokio::test]
async fn thinking_guards() {
    let (_dir, handle) = loaded_stub().await;

    // Not searching yet: stop is rejected.
    assert_eq!(handle.stop().await, Err(EngineError::NotThinking));

    handle.go(Some(Duration::from_millis(10))).await.unwrap();
    assert_eq!(handle.state(), EngineState::Thinking);

    // Already searching: a second go is rejected.
    assert_eq!(
        handle.go(None).await,
        Err(EngineError::AlreadyThinking)
    );

    assert_eq!(handle.stop().await, Ok(3));
    assert_eq!(handle.state(), EngineState::Ready);

    handle.quit().await.unwrap();
}

#[tokio::test]
async fn position_and_new_game_round_trip() {
    let (_dir, handle) = loaded_stub().await;

    handle.new_game().await.unwrap();
    let board = Board::new().apply(2).unwrap();
    handle.position(&board).await.unwrap();

    handle.quit().await.unwrap();
}

#[tokio::test]
async fn set_option_updates_the_local_map() {
    let (_dir, handle) = loaded_stub().await;

    let depth = handle.option("Depth").unwrap();
    let (updated, _text) = depth.with_value("7").unwrap();
    handle.set_option(&updated).await.unwrap();

    assert!(matches!(
        handle.option("Depth"),
        Some(EngineOption::Spin { value: 7, .. })
    ));

    handle.quit().await.unwrap();
}

#[tokio::test]
async fn quit_is_terminal() {
    let (_dir, handle) = loaded_stub().await;

    handle.quit().await.unwrap();
    assert_eq!(handle.state(), EngineState::Quit);

    assert_eq!(handle.new_game().await, Err(EngineError::Gone));
    assert_eq!(handle.quit().await, Err(EngineError::Gone));
}

#[tokio::test]
async fn quit_kills_an_unresponsive_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_engine_script(dir.path(), "deaf-engine", SILENT_ENGINE).unwrap();
    let mut config = test_config();
    config.timeouts.handshake = Duration::from_millis(100);
    config.timeouts.ready = Duration::from_millis(100);
    config.quit_wait = Duration::from_millis(200);

    let handle = EngineHandle::spawn(&path, &config).unwrap();
    assert_eq!(handle.load().await, Err(EngineError::HandshakeTimeout));
    // The failed load reaped the process already.
    assert_eq!(handle.state(), EngineState::Quit);
}

#[tokio::test]
async fn handshake_without_author_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_engine_script(dir.path(), "anon-engine", ANONYMOUS_ENGINE).unwrap();
    let handle = EngineHandle::spawn(&path, &test_config()).unwrap();

    assert_eq!(handle.load().await, Err(EngineError::MissingIdentity));
}

#[tokio::test]
async fn event_stream_sees_the_handshake() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_stub_engine(dir.path()).unwrap();
    let handle = EngineHandle::spawn(&path, &test_config()).unwrap();

    let mut events = handle.event_stream(32).await;
    handle.load().await.unwrap();

    let mut outbound = Vec::new();
    let mut inbound = Vec::new();
    // The handshake produces exactly one outbound line and five
    // inbound ones; drain until cfpok shows up.
    loop {
        match events.recv().await {
            Some(EngineEvent::Comm(comm)) => {
                let done = !comm.to_engine && comm.message == "cfpok";
                if comm.to_engine {
                    outbound.push(comm.message);
                } else {
                    inbound.push(comm.message);
                }
                if done {
                    break;
                }
            }
            Some(EngineEvent::Info(_)) => {}
            None => panic!("event stream ended early"),
        }
    }

    assert_eq!(outbound, vec!["cfp".to_string()]);
    assert_eq!(inbound.first().map(String::as_str), Some("id name Stub Engine"));
    assert_eq!(inbound.last().map(String::as_str), Some("cfpok"));

    handle.quit().await.unwrap();
}

#[tokio::test]
async fn spawn_fails_for_missing_binary() {
    let err = EngineHandle::spawn("/no/such/engine-binary", &test_config());
    assert!(matches!(err, Err(EngineError::Spawn(_))));
}
