//! The live-books gauge is process-wide, so this file holds a single test.

use bookstore_common::{Book, BookFields, BookId};
use bookstore_net::BookService;
use bookstore_proto::book::book_service_server::BookService as _;
use bookstore_proto::book::{AddBookRequest, DeleteBookRequest};
use bookstore_storage::{BookStore, Entry, LockPolicy};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Duration;

fn add_request(title: &str) -> tonic::Request<AddBookRequest> {
    tonic::Request::new(AddBookRequest {
        title: title.into(),
        author: "Frank Herbert".into(),
        isbn: "978-0".into(),
        publication_year: 1965,
    })
}

fn delete_request(id: &str) -> tonic::Request<DeleteBookRequest> {
    tonic::Request::new(DeleteBookRequest { id: id.into() })
}

#[tokio::test]
async fn test_books_gauge_tracks_removed_entries_only() {
    let gauge = &bookstore_metrics::metrics().books;
    let store = Arc::new(BookStore::new(LockPolicy::default()));
    let service = BookService::new(store.clone());
    let base = gauge.get();

    let b0 = service.add_book(add_request("Dune")).await.unwrap().into_inner();
    service.add_book(add_request("Emma")).await.unwrap();
    assert_eq!(gauge.get(), base + 2);
    let b0_id = b0.book.unwrap().id;

    assert!(service.delete_book(delete_request("B1")).await.unwrap().into_inner().success);
    assert_eq!(gauge.get(), base + 1);

    // A missing book changes nothing.
    assert!(!service.delete_book(delete_request("B1")).await.unwrap().into_inner().success);
    assert_eq!(gauge.get(), base + 1);

    // Delete a book whose table slot is replaced while the delete waits:
    // the replacement stays live, so the gauge must not move.
    let id: BookId = b0_id.parse().unwrap();
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
    tokio::time::sleep(Duration::from_millis(20)).await;

    let deleter = {
        let service = service.clone();
        let b0_id = b0_id.clone();
        tokio::spawn(async move { service.delete_book(delete_request(&b0_id)).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let replacement = Book::new(id, BookFields::new("Dune", "Frank Herbert", "978-1", 1966));
    store.install_entry(id, Arc::new(Entry::new(replacement)));
    let _ = release_tx.send(());
    assert!(holder.await.unwrap());

    let resp = deleter.await.unwrap().unwrap().into_inner();
    assert!(resp.success);
    assert_eq!(gauge.get(), base + 1);
    assert_eq!(store.len().await, 1);
}
