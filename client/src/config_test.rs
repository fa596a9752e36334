use std::collections::HashMap;

use super::*;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn from_lookup_defaults() {
    let cfg = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
    assert_eq!(cfg.server_url.as_str(), DEFAULT_SERVER_URL);
    assert_eq!(cfg.reconnect, ReconnectPolicy::default());
    assert_eq!(cfg.reconnect.delay, Duration::from_secs(3));
    assert_eq!(cfg.reconnect.max_attempts, 10);
    assert_eq!(cfg.create_timeout, None);
}

#[test]
fn from_lookup_parses_overrides() {
    let cfg = ClientConfig::from_lookup(lookup_from(&[
        ("SHELLSYNC_WS_URL", "wss://terminals.example.test/ws"),
        ("SHELLSYNC_RECONNECT_DELAY_MS", "250"),
        ("SHELLSYNC_MAX_RECONNECT_ATTEMPTS", " 4 "),
        ("SHELLSYNC_CREATE_TIMEOUT_SECS", "30"),
    ]))
    .unwrap();
    assert_eq!(cfg.server_url.as_str(), "wss://terminals.example.test/ws");
    assert_eq!(cfg.reconnect, ReconnectPolicy { delay: Duration::from_millis(250), max_attempts: 4 });
    assert_eq!(cfg.create_timeout, Some(Duration::from_secs(30)));
}

#[test]
fn from_lookup_rejects_garbage_numbers() {
    let err = ClientConfig::from_lookup(lookup_from(&[("SHELLSYNC_RECONNECT_DELAY_MS", "soon")])).unwrap_err();
    assert_eq!(err, ConfigError::InvalidValue { var: "SHELLSYNC_RECONNECT_DELAY_MS", value: "soon".into() });
}

#[test]
fn from_lookup_rejects_non_websocket_scheme() {
    let err = ClientConfig::from_lookup(lookup_from(&[("SHELLSYNC_WS_URL", "http://localhost:8080/ws")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidUrl { .. }), "{err:?}");
}

#[test]
fn from_lookup_rejects_unparseable_url() {
    let err = ClientConfig::from_lookup(lookup_from(&[("SHELLSYNC_WS_URL", "not a url")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidUrl { .. }), "{err:?}");
}

#[test]
fn with_server_url_overrides_base() {
    let cfg = ClientConfig::from_lookup(lookup_from(&[]))
        .unwrap()
        .with_server_url("ws://10.0.0.5:9000/ws")
        .unwrap();
    assert_eq!(cfg.server_url.as_str(), "ws://10.0.0.5:9000/ws");
}

#[test]
fn endpoint_carries_session_and_client_ids() {
    let cfg = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
    let url = cfg.endpoint(&SessionIdentity::new("room-1", "alice"));
    assert_eq!(url.as_str(), "ws://localhost:8080/ws?session_id=room-1&client_id=alice");
}

#[test]
fn endpoint_escapes_query_values() {
    let cfg = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
    let url = cfg.endpoint(&SessionIdentity::new("a b", "c&d"));
    assert_eq!(url.as_str(), "ws://localhost:8080/ws?session_id=a+b&client_id=c%26d");
}

#[test]
fn generated_identity_has_fresh_client_id() {
    let a = SessionIdentity::generated("room");
    let b = SessionIdentity::generated("room");
    assert_eq!(a.session_id, "room");
    assert_ne!(a.client_id, b.client_id);
    assert_eq!(a.client_id.len(), 36);
}
