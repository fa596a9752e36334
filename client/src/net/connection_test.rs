use std::time::Duration;

use serde_json::json;

use super::*;
use crate::net::transport::ABNORMAL_CLOSE;
use crate::testing::{Call, RecordingTransport, alice, test_config};

fn manager() -> ConnectionManager<RecordingTransport> {
    ConnectionManager::new(RecordingTransport::default(), test_config())
}

fn open_manager() -> (ConnectionManager<RecordingTransport>, SocketId) {
    let mut mgr = manager();
    assert!(mgr.connect(alice()));
    let socket = mgr.current_socket().unwrap();
    assert!(mgr.on_open(socket));
    (mgr, socket)
}

fn fire_retry(mgr: &mut ConnectionManager<RecordingTransport>) -> bool {
    let timer = mgr.transport().last_timer().unwrap();
    mgr.transport_mut().pending_timers.remove(&timer);
    mgr.on_retry_due(timer)
}

/// Drop the current socket abnormally and return what the manager decided.
fn drop_current(mgr: &mut ConnectionManager<RecordingTransport>) -> CloseOutcome {
    let socket = mgr.current_socket().unwrap();
    mgr.on_closed(socket, ABNORMAL_CLOSE)
}

// =============================================================
// connect
// =============================================================

#[test]
fn starts_idle() {
    let mgr = manager();
    assert_eq!(mgr.state(), ConnectionState::Idle);
    assert!(mgr.identity().is_none());
    assert!(mgr.transport().calls.is_empty());
}

#[test]
fn connect_opens_session_scoped_endpoint() {
    let mut mgr = manager();
    assert!(mgr.connect(alice()));
    assert_eq!(mgr.state(), ConnectionState::Connecting);
    assert_eq!(
        mgr.transport().calls,
        vec![Call::Open(SocketId(1), "ws://localhost:8080/ws?session_id=room-1&client_id=alice".into())]
    );
}

#[test]
fn connect_is_idempotent_while_connecting_or_open() {
    let mut mgr = manager();
    mgr.connect(alice());
    assert!(!mgr.connect(alice()));

    let socket = mgr.current_socket().unwrap();
    mgr.on_open(socket);
    assert!(!mgr.connect(alice()));

    assert_eq!(mgr.transport().opened().len(), 1);
    assert_eq!(mgr.state(), ConnectionState::Open);
}

#[test]
fn connect_with_new_identity_releases_old_socket_first() {
    let (mut mgr, first) = open_manager();
    assert!(mgr.connect(SessionIdentity::new("room-2", "alice")));

    let calls = &mgr.transport().calls;
    let close_at = calls.iter().position(|c| *c == Call::Close(first, NORMAL_CLOSE)).unwrap();
    let open_at = calls.iter().rposition(|c| matches!(c, Call::Open(..))).unwrap();
    assert!(close_at < open_at, "old socket must be released before the new one opens");
    assert_eq!(mgr.current_socket(), Some(SocketId(2)));
    assert_eq!(mgr.state(), ConnectionState::Connecting);
}

#[test]
fn on_open_resets_attempt_counter() {
    let (mut mgr, _) = open_manager();
    drop_current(&mut mgr);
    drop_current_after_retry(&mut mgr);
    assert_eq!(mgr.attempt(), 2);

    fire_retry(&mut mgr);
    let socket = mgr.current_socket().unwrap();
    assert!(mgr.on_open(socket));
    assert_eq!(mgr.attempt(), 0);
}

fn drop_current_after_retry(mgr: &mut ConnectionManager<RecordingTransport>) -> CloseOutcome {
    assert!(fire_retry(mgr));
    drop_current(mgr)
}

// =============================================================
// Stale socket fencing
// =============================================================

#[test]
fn events_from_replaced_socket_are_ignored() {
    let (mut mgr, first) = open_manager();
    mgr.reconnect();
    let second = mgr.current_socket().unwrap();
    assert_ne!(first, second);

    assert!(!mgr.on_open(first));
    assert_eq!(mgr.on_text(first, r#"{"type":"pty_output","terminalId":"t","content":"x"}"#), None);
    assert_eq!(mgr.on_closed(first, ABNORMAL_CLOSE), CloseOutcome::Stale);
    assert_eq!(mgr.state(), ConnectionState::Connecting);
    assert!(!mgr.has_pending_retry());
}

// =============================================================
// send
// =============================================================

#[test]
fn send_when_open_stamps_sender_and_emits_one_frame() {
    let (mut mgr, socket) = open_manager();
    mgr.send(FrameType::PtyInput, Some("ls\n"), Some("srv-1")).unwrap();

    let sent: Vec<_> = mgr.transport().calls.iter().filter(|c| matches!(c, Call::Send(s, _) if *s == socket)).collect();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        mgr.transport().sent_json(),
        vec![json!({"type": "pty_input", "content": "ls\n", "sender": "alice", "terminalId": "srv-1"})]
    );
}

#[test]
fn send_before_connect_is_not_connected() {
    let mut mgr = manager();
    assert_eq!(mgr.send(FrameType::PtyInput, Some("x"), None), Err(SendError::NotConnected));
    assert!(mgr.transport().calls.is_empty());
}

#[test]
fn send_while_connecting_fails_without_opening_another_socket() {
    let mut mgr = manager();
    mgr.connect(alice());
    assert_eq!(mgr.send(FrameType::PtyInput, Some("x"), None), Err(SendError::NotConnected));
    assert_eq!(mgr.transport().opened().len(), 1);
}

#[test]
fn send_while_closed_triggers_opportunistic_reconnect() {
    let (mut mgr, _) = open_manager();
    drop_current(&mut mgr);
    assert!(mgr.has_pending_retry());

    assert_eq!(mgr.send(FrameType::PtyInput, Some("x"), None), Err(SendError::NotConnected));
    assert_eq!(mgr.state(), ConnectionState::Connecting);
    assert!(!mgr.has_pending_retry(), "immediate reconnect replaces the pending timer");
    assert!(mgr.transport().pending_timers.is_empty());
    assert_eq!(mgr.transport().opened().len(), 2);
}

#[test]
fn send_surfaces_transport_failure() {
    let (mut mgr, _) = open_manager();
    mgr.transport_mut().fail_sends = true;
    let err = mgr.send(FrameType::PtyInput, Some("x"), Some("srv-1")).unwrap_err();
    assert!(matches!(err, SendError::Transport(_)), "{err:?}");
}

// =============================================================
// Inbound decode
// =============================================================

#[test]
fn inbound_text_is_normalized() {
    let (mut mgr, socket) = open_manager();
    let frame = mgr.on_text(socket, r#"{"type":"terminal_created","terminal_id":"srv-1","frontend_id":"p-1"}"#).unwrap();
    assert_eq!(frame.kind, FrameType::TerminalCreated);
    assert_eq!(frame.terminal_id.as_deref(), Some("srv-1"));
    assert_eq!(frame.frontend_id.as_deref(), Some("p-1"));
}

#[test]
fn malformed_inbound_is_dropped_and_connection_survives() {
    let (mut mgr, socket) = open_manager();
    assert_eq!(mgr.on_text(socket, "{not json"), None);
    assert_eq!(mgr.on_text(socket, r#"{"type":"pty_output"}"#), None);
    assert_eq!(mgr.on_binary(socket, &[0xff, 0xfe]), None);
    assert_eq!(mgr.state(), ConnectionState::Open);

    let frame = mgr.on_binary(socket, br#"{"type":"pty_output","terminalId":"srv-1","content":"ok"}"#).unwrap();
    assert_eq!(frame.content.as_deref(), Some("ok"));
}

// =============================================================
// Close handling and retry policy
// =============================================================

#[test]
fn peer_close_handshake_passes_through_closing() {
    let (mut mgr, socket) = open_manager();
    mgr.on_closing(socket);
    assert_eq!(mgr.state(), ConnectionState::Closing);
    assert_eq!(mgr.on_closed(socket, NORMAL_CLOSE), CloseOutcome::Normal);
    assert_eq!(mgr.state(), ConnectionState::Closed);
}

#[test]
fn normal_close_code_suppresses_reconnect() {
    let (mut mgr, socket) = open_manager();
    assert_eq!(mgr.on_closed(socket, NORMAL_CLOSE), CloseOutcome::Normal);
    assert!(!mgr.has_pending_retry());
    assert_eq!(mgr.transport().opened().len(), 1);
}

#[test]
fn abnormal_close_schedules_fixed_delay_retry() {
    let (mut mgr, _) = open_manager();
    let outcome = drop_current(&mut mgr);
    assert_eq!(outcome, CloseOutcome::Reconnecting { attempt: 1, delay: Duration::from_secs(3) });
    assert_eq!(mgr.state(), ConnectionState::Closed);
    assert!(mgr.has_pending_retry());
    assert!(matches!(mgr.transport().calls.last(), Some(Call::Schedule(_, d)) if *d == Duration::from_secs(3)));

    assert!(fire_retry(&mut mgr));
    assert_eq!(mgr.state(), ConnectionState::Connecting);
    assert_eq!(mgr.transport().opened().len(), 2);
}

#[test]
fn failed_connect_attempt_counts_as_abnormal_close() {
    let mut mgr = manager();
    mgr.connect(alice());
    let outcome = drop_current(&mut mgr);
    assert!(matches!(outcome, CloseOutcome::Reconnecting { attempt: 1, .. }));
}

#[test]
fn cancelled_timer_firing_late_is_ignored() {
    let (mut mgr, _) = open_manager();
    drop_current(&mut mgr);
    let stale = mgr.transport().last_timer().unwrap();
    mgr.reconnect();
    assert!(mgr.transport().calls.contains(&Call::Cancel(stale)));

    assert!(!mgr.on_retry_due(stale));
    assert_eq!(mgr.transport().opened().len(), 2);
}

#[test]
fn at_most_one_retry_timer_pending() {
    let mut mgr = manager();
    mgr.connect(alice());
    for _ in 0..5 {
        drop_current(&mut mgr);
        assert_eq!(mgr.transport().pending_timers.len(), 1);
        fire_retry(&mut mgr);
        assert!(mgr.transport().pending_timers.is_empty());
    }
}

#[test]
fn gives_up_after_ten_consecutive_abnormal_closes() {
    let mut mgr = manager();
    mgr.connect(alice());
    for attempt in 1..10 {
        assert_eq!(
            drop_current(&mut mgr),
            CloseOutcome::Reconnecting { attempt, delay: Duration::from_secs(3) }
        );
        assert!(fire_retry(&mut mgr));
    }
    assert_eq!(drop_current(&mut mgr), CloseOutcome::GaveUp { attempts: 10 });
    assert!(mgr.has_given_up());
    assert!(!mgr.has_pending_retry());
    assert_eq!(mgr.transport().opened().len(), 10);

    // Nothing reopens the socket on its own any more.
    assert_eq!(mgr.send(FrameType::PtyInput, Some("x"), None), Err(SendError::NotConnected));
    assert_eq!(mgr.transport().opened().len(), 10);

    assert!(mgr.reconnect());
    assert_eq!(mgr.attempt(), 0);
    assert!(!mgr.has_given_up());
    assert_eq!(mgr.state(), ConnectionState::Connecting);
    assert_eq!(mgr.transport().opened().len(), 11);
}

#[test]
fn reconnect_before_connect_is_refused() {
    let mut mgr = manager();
    assert!(!mgr.reconnect());
    assert_eq!(mgr.state(), ConnectionState::Idle);
}

// =============================================================
// teardown
// =============================================================

#[test]
fn teardown_leaves_closed_with_no_pending_timer() {
    let (mut mgr, socket) = open_manager();
    mgr.teardown();
    assert_eq!(mgr.state(), ConnectionState::Closed);
    assert!(!mgr.has_pending_retry());
    assert_eq!(mgr.transport().closed(), vec![(socket, NORMAL_CLOSE)]);
}

#[test]
fn teardown_cancels_pending_retry() {
    let (mut mgr, _) = open_manager();
    drop_current(&mut mgr);
    mgr.teardown();
    assert_eq!(mgr.state(), ConnectionState::Closed);
    assert!(!mgr.has_pending_retry());
    assert!(mgr.transport().pending_timers.is_empty());
}

#[test]
fn teardown_is_idempotent_and_safe_from_idle() {
    let mut mgr = manager();
    mgr.teardown();
    mgr.teardown();
    assert_eq!(mgr.state(), ConnectionState::Closed);
    assert!(mgr.transport().calls.is_empty());
}

#[test]
fn teardown_suppresses_reconnect_on_late_close_and_send() {
    let mut mgr = manager();
    mgr.connect(alice());
    mgr.teardown();
    assert_eq!(mgr.on_closed(SocketId(1), ABNORMAL_CLOSE), CloseOutcome::Stale);
    assert_eq!(mgr.send(FrameType::PtyInput, Some("x"), None), Err(SendError::NotConnected));
    assert_eq!(mgr.transport().opened().len(), 1);
    assert!(!mgr.has_pending_retry());
}

#[test]
fn connect_after_teardown_opens_again() {
    let (mut mgr, _) = open_manager();
    mgr.teardown();
    assert!(mgr.connect(alice()));
    assert_eq!(mgr.state(), ConnectionState::Connecting);
}
