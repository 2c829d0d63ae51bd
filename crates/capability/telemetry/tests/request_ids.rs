use hub_telemetry::{metrics, new_request_ids, record_authz_denial, record_message_published};

#[test]
fn request_ids_non_empty() {
    let ids = new_request_ids();
    assert!(!ids.request_id.is_empty());
    assert!(!ids.trace_id.is_empty());
    assert_ne!(ids.request_id, ids.trace_id);
}

#[test]
fn counters_accumulate() {
    let before = metrics().snapshot();
    record_message_published();
    record_message_published();
    record_authz_denial();
    let after = metrics().snapshot();
    assert!(after.messages_published >= before.messages_published + 2);
    assert!(after.authz_denials > before.authz_denials);
}
