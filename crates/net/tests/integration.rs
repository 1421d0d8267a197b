//! Integration test: run the book service over real gRPC and drive it
//! through the retrying client and the raw generated client.

use bookstore_common::BookFields;
use bookstore_net::{build_server, BookClient, CallError, Retry, RetryPolicy};
use bookstore_proto::book::book_service_client::BookServiceClient;
use bookstore_proto::book::{DeleteBookRequest, GetBookRequest, ListBooksRequest};
use bookstore_storage::{BookStore, LockPolicy};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::Duration;

struct TestServer {
    addr: SocketAddr,
    store: Arc<BookStore>,
}

impl TestServer {
    fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }
}

async fn spawn_server(port: u16) -> TestServer {
    let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
    let store = Arc::new(BookStore::new(LockPolicy::default()));
    let router = build_server(store.clone());

    tokio::spawn(async move {
        router.serve(addr).await.unwrap();
    });

    // Wait for server to be ready
    tokio::time::sleep(Duration::from_millis(100)).await;

    TestServer { addr, store }
}

fn fast_retry() -> Retry {
    Retry::new(RetryPolicy {
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
        ..RetryPolicy::default()
    })
}

fn dune() -> BookFields {
    BookFields::new("Dune", "Frank Herbert", "978-0441013593", 1965)
}

#[tokio::test]
async fn test_crud_through_retrying_client() {
    let server = spawn_server(17310).await;
    let client = BookClient::connect_lazy(&server.endpoint(), fast_retry()).unwrap();

    let added = client.add_book(&dune()).await.unwrap();
    assert!(added.success);
    assert_eq!(added.message, "Book added successfully");
    let book = added.value.unwrap();
    assert_eq!(book.id().to_string(), "B0");

    let got = client.get_book("B0").await.unwrap();
    assert!(got.success);
    assert_eq!(got.message, "Book found");
    assert_eq!(got.value.unwrap(), book);

    let messiah = BookFields::new("Dune Messiah", "Frank Herbert", "978-0593098233", 1969);
    let updated = client.update_book("B0", &messiah).await.unwrap();
    assert!(updated.success);
    assert_eq!(updated.message, "Book updated successfully");
    assert_eq!(updated.value.unwrap().fields(), &messiah);

    let deleted = client.delete_book("B0").await.unwrap();
    assert!(deleted.success);
    assert_eq!(deleted.message, "Book deleted successfully");

    let gone = client.get_book("B0").await.unwrap();
    assert!(!gone.success);
    assert_eq!(gone.message, "Book not found");
    assert!(gone.value.is_none());

    assert!(server.store.is_empty().await);
}

#[tokio::test]
async fn test_list_returns_books_in_id_order() {
    let server = spawn_server(17311).await;
    let client = BookClient::connect_lazy(&server.endpoint(), fast_retry()).unwrap();

    for title in ["A", "B", "C"] {
        let fields = BookFields::new(title, "Anon", "000", 2000);
        assert!(client.add_book(&fields).await.unwrap().success);
    }
    assert!(client.delete_book("B1").await.unwrap().success);

    let books = client.list_books().await.unwrap();
    let ids: Vec<String> = books.iter().map(|b| b.id().to_string()).collect();
    assert_eq!(ids, ["B0", "B2"]);
    assert_eq!(books[1].title(), "C");
}

#[tokio::test]
async fn test_ids_are_not_reused_after_delete() {
    let server = spawn_server(17312).await;
    let client = BookClient::connect_lazy(&server.endpoint(), fast_retry()).unwrap();

    let first = client.add_book(&dune()).await.unwrap().value.unwrap();
    assert!(client.delete_book(&first.id().to_string()).await.unwrap().success);
    let second = client.add_book(&dune()).await.unwrap().value.unwrap();
    assert_ne!(first.id(), second.id());
}

#[tokio::test]
async fn test_raw_client_sees_domain_rejections() {
    let server = spawn_server(17313).await;
    let mut raw = BookServiceClient::connect(server.endpoint()).await.unwrap();

    let resp = raw
        .get_book(GetBookRequest { id: "B42".into() })
        .await
        .unwrap()
        .into_inner();
    assert!(!resp.success);
    assert_eq!(resp.message, "Book not found");
    assert!(resp.book.is_none());

    let resp = raw
        .delete_book(DeleteBookRequest {
            id: "not-an-id".into(),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(!resp.success);
    assert_eq!(resp.message, "Book not found");

    let resp = raw
        .list_books(ListBooksRequest {})
        .await
        .unwrap()
        .into_inner();
    assert!(resp.books.is_empty());
}

#[tokio::test]
async fn test_concurrent_clients_get_distinct_ids() {
    let server = spawn_server(17314).await;
    let client = BookClient::connect_lazy(&server.endpoint(), fast_retry()).unwrap();

    let calls = (0..16).map(|_| {
        let client = client.clone();
        async move { client.add_book(&dune()).await.unwrap().value.unwrap() }
    });
    let books = futures::future::join_all(calls).await;

    let mut ids: Vec<u64> = books.iter().map(|b| b.id().seq()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 16);
    assert_eq!(server.store.len().await, 16);
}

#[tokio::test]
async fn test_missing_server_exhausts_retries() {
    // Nothing listens on this port.
    let client = BookClient::connect_lazy("http://127.0.0.1:17319", fast_retry()).unwrap();

    let err = client.get_book("B0").await.unwrap_err();
    match err {
        CallError::Rpc {
            operation,
            attempts,
            status,
        } => {
            assert_eq!(operation, "get_book");
            assert_eq!(attempts, 3);
            assert_eq!(status.code(), tonic::Code::Unavailable);
        }
        other => panic!("unexpected {:?}", other),
    }
}
