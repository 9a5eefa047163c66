use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::*;
use crate::peers::{ClientFactory, MemoryRegistry, PeerId};
use crate::ring::HashRing;

/// Loader that counts calls and answers `"<key>-loaded"` after a delay.
fn counting_loader(calls: Arc<AtomicUsize>, delay: Duration) -> impl Loader {
    LoaderFn::new(move |key: String| {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            match key.as_str() {
                "missing" => Err(LoadError::NotFound),
                "broken" => Err(LoadError::failed("upstream exploded")),
                _ => Ok(CacheValue::from(format!("{}-loaded", key))),
            }
        }
    })
}

/// Remote peer double: answers from a fixed outcome and counts calls.
struct FakePeer {
    id: PeerId,
    calls: Arc<AtomicUsize>,
    outcome: Result<CacheValue>,
}

#[async_trait]
impl PeerGetter for FakePeer {
    fn peer(&self) -> &PeerId {
        &self.id
    }

    async fn get(&self, _group: &str, _key: &str) -> Result<CacheValue> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// A picker for node "self:1" whose only member is "remote:1", so every key
/// is owned remotely.
fn remote_only_picker(calls: Arc<AtomicUsize>, outcome: Result<CacheValue>) -> Arc<PeerPicker> {
    let factory: ClientFactory = Arc::new(move |peer: &PeerId| {
        Arc::new(FakePeer {
            id: peer.clone(),
            calls: Arc::clone(&calls),
            outcome: outcome.clone(),
        }) as Arc<dyn PeerGetter>
    });
    let picker = PeerPicker::with_factory(
        PeerId::from("self:1"),
        "svc",
        Arc::new(MemoryRegistry::new(Duration::from_secs(10))),
        HashRing::new(10),
        factory,
    );
    picker.apply_membership(&[PeerId::from("remote:1")].into_iter().collect());
    picker
}

fn local_group(calls: &Arc<AtomicUsize>) -> Arc<Group> {
    Arc::new(Group::new(
        "scores",
        1024,
        counting_loader(Arc::clone(calls), Duration::from_millis(10)),
    ))
}

#[tokio::test]
async fn test_miss_loads_then_hits() {
    let calls = Arc::new(AtomicUsize::new(0));
    let group = local_group(&calls);

    assert_eq!(group.get("tom").await, Ok(CacheValue::from("tom-loaded")));
    assert_eq!(group.get("tom").await, Ok(CacheValue::from("tom-loaded")));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let stats = group.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.local_loads, 1);
    assert_eq!(stats.store.entry_count, 1);
}

#[tokio::test]
async fn test_concurrent_misses_load_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let group = Arc::new(Group::new(
        "scores",
        1024,
        counting_loader(Arc::clone(&calls), Duration::from_millis(100)),
    ));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let group = Arc::clone(&group);
            tokio::spawn(async move { group.get("x").await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), Ok(CacheValue::from("x-loaded")));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(group.stats().local_loads, 1);
}

#[tokio::test]
async fn test_set_is_visible_to_local_get() {
    let peer_calls = Arc::new(AtomicUsize::new(0));
    let loads = Arc::new(AtomicUsize::new(0));
    let group = local_group(&loads);
    group
        .register_peers(remote_only_picker(
            Arc::clone(&peer_calls),
            Ok(CacheValue::from("remote")),
        ))
        .unwrap();

    group.set("k", "fresh").unwrap();

    assert_eq!(group.get("k").await, Ok(CacheValue::from("fresh")));
    assert_eq!(peer_calls.load(Ordering::SeqCst), 0);
    assert_eq!(loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_remote_owned_key_is_fetched_and_cached() {
    let peer_calls = Arc::new(AtomicUsize::new(0));
    let loads = Arc::new(AtomicUsize::new(0));
    let group = local_group(&loads);
    group
        .register_peers(remote_only_picker(
            Arc::clone(&peer_calls),
            Ok(CacheValue::from("remote")),
        ))
        .unwrap();

    assert_eq!(group.get("k").await, Ok(CacheValue::from("remote")));
    assert_eq!(group.get("k").await, Ok(CacheValue::from("remote")));

    assert_eq!(peer_calls.load(Ordering::SeqCst), 1);
    assert_eq!(loads.load(Ordering::SeqCst), 0);
    let stats = group.stats();
    assert_eq!(stats.peer_loads, 1);
    assert_eq!(stats.hits, 1);
}

#[tokio::test]
async fn test_unreachable_owner_is_not_masked() {
    let peer_calls = Arc::new(AtomicUsize::new(0));
    let loads = Arc::new(AtomicUsize::new(0));
    let group = local_group(&loads);
    group
        .register_peers(remote_only_picker(
            Arc::clone(&peer_calls),
            Err(CacheError::peer_unavailable("remote:1", "connection refused")),
        ))
        .unwrap();

    let result = group.get("k").await;

    assert!(matches!(result, Err(CacheError::PeerUnavailable { .. })));
    assert_eq!(loads.load(Ordering::SeqCst), 0);
    assert_eq!(group.stats().peer_errors, 1);
    assert_eq!(group.stats().store.entry_count, 0);
}

#[tokio::test]
async fn test_remote_not_found_is_preserved() {
    let peer_calls = Arc::new(AtomicUsize::new(0));
    let loads = Arc::new(AtomicUsize::new(0));
    let group = local_group(&loads);
    group
        .register_peers(remote_only_picker(
            Arc::clone(&peer_calls),
            Err(CacheError::NotFound("k".into())),
        ))
        .unwrap();

    assert_eq!(group.get("k").await, Err(CacheError::NotFound("k".into())));
}

#[tokio::test]
async fn test_peer_request_is_served_locally() {
    let peer_calls = Arc::new(AtomicUsize::new(0));
    let loads = Arc::new(AtomicUsize::new(0));
    let group = local_group(&loads);
    group
        .register_peers(remote_only_picker(
            Arc::clone(&peer_calls),
            Ok(CacheValue::from("remote")),
        ))
        .unwrap();

    assert_eq!(group.load_local("k").await, Ok(CacheValue::from("k-loaded")));
    assert_eq!(peer_calls.load(Ordering::SeqCst), 0);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_loader_errors_are_typed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let group = local_group(&calls);

    assert_eq!(
        group.get("missing").await,
        Err(CacheError::NotFound("missing".into()))
    );
    match group.get("broken").await {
        Err(CacheError::LoaderFailed { key, reason }) => {
            assert_eq!(key, "broken");
            assert_eq!(reason, "upstream exploded");
        }
        other => panic!("unexpected result {:?}", other),
    }

    let stats = group.stats();
    assert_eq!(stats.loader_errors, 1);
    assert_eq!(stats.store.entry_count, 0);
}

#[tokio::test]
async fn test_failed_load_is_retried_by_next_caller() {
    let calls = Arc::new(AtomicUsize::new(0));
    let group = local_group(&calls);

    assert!(group.get("broken").await.is_err());
    assert!(group.get("broken").await.is_err());

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_strict_routing_reports_no_owner() {
    let calls = Arc::new(AtomicUsize::new(0));
    let group = Arc::new(
        Group::new(
            "scores",
            1024,
            counting_loader(Arc::clone(&calls), Duration::ZERO),
        )
        .with_strict_routing(true),
    );

    assert_eq!(group.get("k").await, Err(CacheError::NoOwner("k".into())));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_timeout_cancels_only_the_caller() {
    let calls = Arc::new(AtomicUsize::new(0));
    let group = Arc::new(Group::new(
        "scores",
        1024,
        counting_loader(Arc::clone(&calls), Duration::from_millis(150)),
    ));

    let impatient = group.get_with_timeout("slow", Duration::from_millis(20)).await;
    assert_eq!(impatient, Err(CacheError::Cancelled("slow".into())));

    let patient = group.get("slow").await;
    assert_eq!(patient, Ok(CacheValue::from("slow-loaded")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_default_request_timeout_applies() {
    let calls = Arc::new(AtomicUsize::new(0));
    let group = Arc::new(
        Group::new(
            "scores",
            1024,
            counting_loader(Arc::clone(&calls), Duration::from_millis(200)),
        )
        .with_request_timeout(Some(Duration::from_millis(20))),
    );

    assert_eq!(group.get("k").await, Err(CacheError::Cancelled("k".into())));
}

#[tokio::test]
async fn test_register_peers_only_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let group = local_group(&calls);
    let picker = remote_only_picker(Arc::new(AtomicUsize::new(0)), Ok(CacheValue::default()));

    assert!(group.register_peers(Arc::clone(&picker)).is_ok());
    assert!(matches!(
        group.register_peers(picker),
        Err(CacheError::Internal(_))
    ));
}

#[tokio::test]
async fn test_invalid_keys_are_rejected() {
    let calls = Arc::new(AtomicUsize::new(0));
    let group = local_group(&calls);

    assert!(matches!(group.get("").await, Err(CacheError::InvalidRequest(_))));
    assert!(matches!(group.set("", "v"), Err(CacheError::InvalidRequest(_))));
    let long_key = "x".repeat(MAX_KEY_LENGTH + 1);
    assert!(matches!(
        group.get(&long_key).await,
        Err(CacheError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn test_set_during_load_is_not_overwritten() {
    let calls = Arc::new(AtomicUsize::new(0));
    let group = Arc::new(Group::new(
        "scores",
        1024,
        counting_loader(Arc::clone(&calls), Duration::from_millis(100)),
    ));

    let pending = {
        let group = Arc::clone(&group);
        tokio::spawn(async move { group.get("k").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    group.set("k", "fresh").unwrap();

    assert_eq!(pending.await.unwrap(), Ok(CacheValue::from("k-loaded")));
    assert_eq!(group.get("k").await, Ok(CacheValue::from("fresh")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_remove_forces_reload() {
    let calls = Arc::new(AtomicUsize::new(0));
    let group = local_group(&calls);

    group.get("k").await.unwrap();
    assert_eq!(group.remove("k"), Ok(true));
    assert_eq!(group.remove("k"), Ok(false));
    group.get("k").await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stats_never_decrease() {
    let calls = Arc::new(AtomicUsize::new(0));
    let group = local_group(&calls);
    let mut previous = group.stats();

    for key in ["a", "b", "a", "missing", "broken", "b", "c"] {
        let _ = group.get(key).await;
        let current = group.stats();
        assert!(current.hits >= previous.hits);
        assert!(current.misses >= previous.misses);
        assert!(current.local_loads >= previous.local_loads);
        assert!(current.loader_errors >= previous.loader_errors);
        previous = current;
    }

    assert_eq!(previous.hits + previous.misses, 7);
}

#[test]
fn test_registry_rejects_duplicate_names() {
    let registry = GroupRegistry::new();
    let calls = Arc::new(AtomicUsize::new(0));

    registry
        .insert(Group::new("a", 0, counting_loader(Arc::clone(&calls), Duration::ZERO)))
        .unwrap();
    let duplicate = registry.insert(Group::new("a", 0, counting_loader(calls, Duration::ZERO)));

    assert!(duplicate.is_err());
    assert!(registry.get("a").is_some());
    assert!(registry.get("b").is_none());
    assert_eq!(registry.names(), vec!["a".to_string()]);
}
