use super::*;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::sync::Notify;

#[tokio::test]
async fn concurrent_callers_share_one_execution() {
    let flights: Arc<SingleFlight<String, usize>> = Arc::new(SingleFlight::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let release = Arc::new(Notify::new());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let flights = flights.clone();
        let calls = calls.clone();
        let release = release.clone();
        handles.push(tokio::spawn(async move {
            flights
                .run("session".to_string(), move || async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    release.notified().await;
                    n * 10
                })
                .await
        }));
    }

    while !flights.in_flight(&"session".to_string()).await {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    release.notify_one();

    for handle in handles {
        assert_eq!(handle.await.expect("join"), 10);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!flights.in_flight(&"session".to_string()).await);
}

#[tokio::test]
async fn finished_flight_allows_a_fresh_run() {
    let flights: SingleFlight<&'static str, u32> = SingleFlight::new();
    assert_eq!(flights.run("a", || async { 1 }).await, 1);
    assert_eq!(flights.run("a", || async { 2 }).await, 2);
}

#[tokio::test]
async fn different_keys_do_not_share() {
    let flights: SingleFlight<&'static str, &'static str> = SingleFlight::new();
    let (left, right) = tokio::join!(
        flights.run("left", || async { "l" }),
        flights.run("right", || async { "r" }),
    );
    assert_eq!((left, right), ("l", "r"));
}
