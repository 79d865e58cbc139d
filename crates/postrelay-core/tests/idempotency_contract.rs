//! Contract Test: Dedupe State & Idempotency
//!
//! Constraints verified:
//! - The first run with no stored state delivers and persists the newest key
//! - A stored key is never delivered again by a normal run
//! - Delivering A then B leaves B as the stored key
//! - Unreadable state is fatal and nothing is fetched or delivered

mod common;

use common::*;
use postrelay_core::{Error, RunEvent, RunOutcome};

#[tokio::test]
async fn first_run_delivers_and_persists_newest_key() {
    let provider = MockProvider::returning("mock", vec![item("abc123")]);
    let store = CountingStore::new();
    let transport = MockTransport::new();

    let (engine, _events) = build_engine(&[provider], &store, &transport, minimal_config("somehandle"));

    let outcome = tokio_test::assert_ok!(engine.run().await);

    assert_eq!(
        outcome,
        RunOutcome::Delivered {
            keys: vec!["abc123".to_string()]
        }
    );
    assert_eq!(outcome.label(), "delivered");
    assert_eq!(transport.sent_keys(), vec!["abc123"]);
    assert_eq!(store.last_seen_key().await.as_deref(), Some("abc123"));
    assert_eq!(store.save_count(), 1);
}

#[tokio::test]
async fn second_run_without_new_item_delivers_nothing() {
    let provider = MockProvider::returning("mock", vec![item("abc123")]);
    let store = CountingStore::new();
    let transport = MockTransport::new();

    let (engine, _events) = build_engine(&[provider], &store, &transport, minimal_config("somehandle"));

    engine.run().await.unwrap();
    let outcome = engine.run().await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::AlreadySeen {
            key: "abc123".to_string()
        }
    );
    assert_eq!(transport.send_count(), 1, "second run must not deliver");
    assert_eq!(store.save_count(), 1, "second run must not write state");
}

#[tokio::test]
async fn stored_key_matching_candidate_is_already_seen() {
    let provider = MockProvider::returning("mock", vec![item("abc123")]);
    let store = CountingStore::with_last_seen("abc123");
    let transport = MockTransport::new();

    let (engine, mut events) = build_engine(&[provider], &store, &transport, minimal_config("somehandle"));

    let outcome = engine.run().await.unwrap();

    assert_eq!(outcome.label(), "already-seen");
    assert_eq!(transport.send_count(), 0);
    assert_eq!(store.save_count(), 0);
    assert_eq!(store.last_seen_key().await.as_deref(), Some("abc123"));

    let events = drain_events(&mut events);
    assert!(events.contains(&RunEvent::AlreadySeen {
        key: "abc123".to_string()
    }));
}

#[tokio::test]
async fn delivering_a_then_b_persists_b_and_never_repeats_a() {
    let provider = MockProvider::returning("mock", vec![item("A")]);
    let store = CountingStore::new();
    let transport = MockTransport::new();

    let (engine, _events) =
        build_engine(&[provider.clone()], &store, &transport, minimal_config("somehandle"));

    engine.run().await.unwrap();
    assert_eq!(store.last_seen_key().await.as_deref(), Some("A"));

    provider.set_items(vec![item("B"), item("A")]);
    engine.run().await.unwrap();
    engine.run().await.unwrap();

    assert_eq!(transport.sent_keys(), vec!["A", "B"]);
    assert_eq!(store.last_seen_key().await.as_deref(), Some("B"));
}

#[tokio::test]
async fn unreadable_state_is_fatal() {
    let provider = MockProvider::returning("mock", vec![item("abc123")]);
    let store = CountingStore::corrupt();
    let transport = MockTransport::new();

    let (engine, _events) =
        build_engine(&[provider.clone()], &store, &transport, minimal_config("somehandle"));

    let err = tokio_test::assert_err!(engine.run().await);

    assert!(matches!(err, Error::StateUnavailable(_)), "got {err}");
    assert_eq!(provider.call_count(), 0, "no fetch without usable state");
    assert_eq!(transport.send_count(), 0);
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn state_is_loaded_once_per_run() {
    let provider = MockProvider::returning("mock", vec![item("abc123")]);
    let store = CountingStore::new();
    let transport = MockTransport::new();

    let (engine, _events) = build_engine(&[provider], &store, &transport, minimal_config("somehandle"));

    engine.run().await.unwrap();
    assert_eq!(store.load_count(), 1);
}
