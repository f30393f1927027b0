//! Multi-instance coordination through a shared history.

use std::sync::Arc;
use std::time::Duration;

use scoped_router::registry::MutationHook;
use scoped_router::router::OverlapPolicy;
use scoped_router::routing::{Route, RouteTable};
use scoped_router::{Registry, RouterInstance};

mod common;

#[tokio::test]
async fn test_scoped_fan_out() {
    let history = common::memory_history();
    let registry = Registry::new(history.clone());

    let nested = RouterInstance::builder(history.clone()).base_path("/nested").build();
    let level_1 = RouterInstance::builder(history.clone())
        .base_path("/nested/level-1")
        .build();
    let other = RouterInstance::builder(history.clone())
        .base_path("/nested-other")
        .build();
    for instance in [&nested, &level_1, &other] {
        instance.mount(&registry).unwrap();
    }

    history.push("/nested/level-1/level-2").unwrap();
    common::settle(&registry, &nested).await;
    common::settle(&registry, &level_1).await;

    assert_eq!(common::current_path(&nested).as_deref(), Some("/level-1/level-2"));
    assert_eq!(common::current_path(&level_1).as_deref(), Some("/level-2"));
    assert_eq!(common::current_path(&other), None);
}

#[tokio::test]
async fn test_mount_resolves_current_location() {
    let history = common::memory_history();
    history.push("/about").unwrap();
    let registry = Registry::new(history.clone());

    let router = RouterInstance::builder(history.clone())
        .routes(RouteTable::new().route(Route::path("/about").unwrap().with_name("about")))
        .build();
    router.mount(&registry).unwrap();

    let mut current = router.current().subscribe();
    assert!(common::wait_for(&mut current, |c| c.is_some()).await);
    assert_eq!(router.current().get().unwrap().name(), Some("about"));
}

#[tokio::test]
async fn test_burst_applies_one_transition_with_latest_location() {
    let history = common::memory_history();
    let registry = Registry::new(history.clone());
    let recorder = common::Recorder::default();

    let router = RouterInstance::builder(history.clone())
        .pre(recorder.hook(Duration::from_millis(50)))
        .build();
    router.mount(&registry).unwrap();
    common::settle(&registry, &router).await;

    history.push("/first").unwrap();
    history.push("/second").unwrap();
    common::settle(&registry, &router).await;

    assert_eq!(recorder.paths(), vec!["/", "/second"]);
    assert_eq!(common::current_path(&router).as_deref(), Some("/second"));
}

#[tokio::test]
async fn test_event_during_transition_is_dropped() {
    let history = common::memory_history();
    let registry = Registry::new(history.clone());
    let recorder = common::Recorder::default();

    let router = RouterInstance::builder(history.clone())
        .pre(recorder.hook(Duration::from_millis(100)))
        .build();
    router.mount(&registry).unwrap();
    common::settle(&registry, &router).await;

    history.push("/first").unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(registry.is_processing(router.id()));
    history.push("/second").unwrap();
    common::settle(&registry, &router).await;

    assert_eq!(recorder.paths(), vec!["/", "/first"]);
    assert_eq!(common::current_path(&router).as_deref(), Some("/first"));

    // The next event catches up with the then-current location.
    history.push("/third").unwrap();
    common::settle(&registry, &router).await;
    assert_eq!(common::current_path(&router).as_deref(), Some("/third"));
}

#[tokio::test]
async fn test_latest_policy_reruns_once() {
    let history = common::memory_history();
    let registry = Registry::new(history.clone());
    let recorder = common::Recorder::default();

    let router = RouterInstance::builder(history.clone())
        .pre(recorder.hook(Duration::from_millis(100)))
        .overlap(OverlapPolicy::Latest)
        .build();
    router.mount(&registry).unwrap();
    common::settle(&registry, &router).await;

    history.push("/first").unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    history.push("/second").unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    history.push("/third").unwrap();
    common::settle(&registry, &router).await;

    assert_eq!(recorder.paths(), vec!["/", "/first", "/third"]);
    assert_eq!(common::current_path(&router).as_deref(), Some("/third"));
}

#[tokio::test]
async fn test_popstate_triggers_resolution() {
    let history = common::memory_history();
    let registry = Registry::new(history.clone());
    let router = RouterInstance::builder(history.clone()).build();
    router.mount(&registry).unwrap();

    router.push("/a").unwrap();
    common::settle(&registry, &router).await;
    router.push("/b").unwrap();
    common::settle(&registry, &router).await;
    assert_eq!(common::current_path(&router).as_deref(), Some("/b"));

    assert!(history.back());
    common::settle(&registry, &router).await;
    assert_eq!(common::current_path(&router).as_deref(), Some("/a"));
}

#[tokio::test]
async fn test_history_patch_is_reversible() {
    let history = common::memory_history();
    let original = Arc::new(MutationHook::new(|_, _| {}));
    history.set_mutation_hook(Some(original.clone()));
    let registry = Registry::new(history.clone());

    let first = RouterInstance::builder(history.clone()).build();
    let second = RouterInstance::builder(history.clone()).base_path("/x").build();
    first.mount(&registry).unwrap();
    let patched = history.mutation_hook().unwrap();
    second.mount(&registry).unwrap();

    // Second registration does not wrap again.
    assert!(Arc::ptr_eq(&patched, &history.mutation_hook().unwrap()));
    assert!(!Arc::ptr_eq(&patched, &original));

    second.destroy();
    assert!(registry.is_attached());
    first.destroy();
    assert!(!registry.is_attached());
    assert!(registry.is_empty());
    assert!(Arc::ptr_eq(&history.mutation_hook().unwrap(), &original));
}

#[tokio::test]
async fn test_destroy_cascades_and_stops_updates() {
    let history = common::memory_history();
    let registry = Registry::new(history.clone());
    let child = RouterInstance::builder(history.clone()).base_path("/child").build();
    let router = RouterInstance::builder(history.clone()).build();
    child.mount(&registry).unwrap();
    router.mount(&registry).unwrap();
    assert_eq!(registry.parent(child.id()), Some(router.id()));

    history.push("/one").unwrap();
    common::settle(&registry, &router).await;
    assert_eq!(common::current_path(&router).as_deref(), Some("/one"));

    router.destroy();
    history.push("/two").unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(common::current_path(&router).as_deref(), Some("/one"));
    assert!(!registry.contains(router.id()));
    assert!(!registry.contains(child.id()));
    assert!(!child.is_mounted());
}

#[tokio::test]
async fn test_overflowing_query_index_does_not_stall_dispatch() {
    let history = common::memory_history();
    let registry = Registry::new(history.clone());

    let router = RouterInstance::builder(history.clone()).build();
    router.mount(&registry).unwrap();
    common::settle(&registry, &router).await;

    history.push("/x?a[18446744073709551615]=1&a[]=2").unwrap();
    common::settle(&registry, &router).await;
    assert_eq!(common::current_path(&router).as_deref(), Some("/x"));

    history.push("/after").unwrap();
    common::settle(&registry, &router).await;
    assert_eq!(common::current_path(&router).as_deref(), Some("/after"));
}
