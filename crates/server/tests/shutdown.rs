//! Integration test: serve until signalled, then drain.

use bookstore_common::BookFields;
use bookstore_net::{BookClient, Retry};
use bookstore_proto::book as pb;
use bookstore_proto::book::book_service_client::BookServiceClient;
use bookstore_server::{serve, Stopped, INTERRUPT_WINDOW};
use bookstore_storage::{BookStore, LockPolicy};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{Duration, Instant};
use tonic::Code;

#[tokio::test]
async fn test_signal_drains_and_stops_accepting() {
    let addr: SocketAddr = "127.0.0.1:17330".parse().unwrap();
    let store = Arc::new(BookStore::new(LockPolicy::default()));
    let (signal_tx, signal_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(serve(
        addr,
        store.clone(),
        Duration::from_secs(5),
        async {
            let _ = signal_rx.await;
        },
    ));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = BookClient::connect_lazy(&format!("http://{}", addr), Retry::default()).unwrap();
    let reply = client
        .add_book(&BookFields::new("Dune", "Frank Herbert", "978-0441013593", 1965))
        .await
        .unwrap();
    assert!(reply.success);
    drop(client);

    let start = Instant::now();
    signal_tx.send(()).unwrap();
    let stopped = server.await.unwrap().unwrap();
    assert_eq!(stopped, Stopped::Drained);
    assert!(start.elapsed() < Duration::from_secs(5));

    // Lock waits were not interrupted by a clean drain.
    assert!(!store.is_shut_down());
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let addr: SocketAddr = "127.0.0.1:17331".parse().unwrap();
    let _taken = std::net::TcpListener::bind(addr).unwrap();
    let store = Arc::new(BookStore::new(LockPolicy::default()));

    let result = serve(
        addr,
        store,
        Duration::from_secs(1),
        std::future::pending::<()>(),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_expired_grace_interrupts_lock_waiters() {
    let addr: SocketAddr = "127.0.0.1:17332".parse().unwrap();
    let store = Arc::new(BookStore::new(LockPolicy::default()));
    let id = store
        .add(BookFields::new("Dune", "Frank Herbert", "978-0441013593", 1965))
        .await
        .id();
    let (signal_tx, signal_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(serve(
        addr,
        store.clone(),
        Duration::from_millis(200),
        async {
            let _ = signal_rx.await;
        },
    ));
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Keep the record write-locked well past the grace period.
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let holder = {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .hold_write_lock(id, async {
                    let _ = release_rx.await;
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut raw = BookServiceClient::connect(format!("http://{}", addr))
        .await
        .unwrap();
    let update = tokio::spawn(async move {
        raw.update_book(pb::UpdateBookRequest {
            id: id.to_string(),
            title: "Dune Messiah".into(),
            author: "Frank Herbert".into(),
            isbn: "978-0593098233".into(),
            publication_year: 1969,
        })
        .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let start = Instant::now();
    signal_tx.send(()).unwrap();
    let stopped = server.await.unwrap().unwrap();
    assert_eq!(stopped, Stopped::Forced);
    assert!(store.is_shut_down());
    let limit = Duration::from_millis(700) + INTERRUPT_WINDOW;
    assert!(start.elapsed() < limit, "took {:?}", start.elapsed());

    let status = update.await.unwrap().unwrap_err();
    assert!(
        matches!(status.code(), Code::Cancelled | Code::Unavailable | Code::Unknown),
        "unexpected status: {:?}",
        status
    );
    if status.code() == Code::Cancelled {
        assert_eq!(status.message(), "Interrupted while waiting to update book");
    }

    release_tx.send(()).unwrap();
    assert!(holder.await.unwrap());
}
