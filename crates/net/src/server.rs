//! gRPC service implementation.
//!
//! Bridges the tonic-generated `BookService` trait to [`BookStore`].
//! Not-found and busy outcomes travel back as `success = false` with a
//! message; only an interrupted lock wait becomes a transport error
//! (`CANCELLED`).

use crate::convert;
use bookstore_common::Book;
use bookstore_metrics::{metrics, record_outcome};
use bookstore_proto::book as pb;
use bookstore_storage::{BookStore, Removal, StoreError};
use std::sync::Arc;

pub const ADDED: &str = "Book added successfully";
pub const FOUND: &str = "Book found";
pub const UPDATED: &str = "Book updated successfully";
pub const DELETED: &str = "Book deleted successfully";
pub const NOT_FOUND: &str = "Book not found";
pub const BUSY: &str = "Book is currently being modified, please retry later";

/// Store operations that wait on an entry lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Get,
    Update,
    Delete,
    List,
}

impl Op {
    fn label(self) -> &'static str {
        match self {
            Op::Get => "get",
            Op::Update => "update",
            Op::Delete => "delete",
            Op::List => "list",
        }
    }

    fn interrupted(self) -> tonic::Status {
        let description = match self {
            Op::Get => "Interrupted while waiting to read book",
            Op::Update => "Interrupted while waiting to update book",
            Op::Delete => "Interrupted while waiting to delete book",
            Op::List => "Interrupted while listing books",
        };
        tonic::Status::cancelled(description)
    }
}

/// Map a store failure to its domain message, or to a transport error
/// when the wait was interrupted.
pub fn rejection(op: Op, err: &StoreError) -> Result<&'static str, tonic::Status> {
    match err {
        StoreError::NotFound(_) => {
            record_outcome(op.label(), "not_found");
            Ok(NOT_FOUND)
        }
        StoreError::Busy(_) => {
            record_outcome(op.label(), "busy");
            Ok(BUSY)
        }
        StoreError::Interrupted => {
            record_outcome(op.label(), "interrupted");
            Err(op.interrupted())
        }
    }
}

fn book_response(
    op: Op,
    result: Result<Arc<Book>, StoreError>,
    ok_message: &str,
) -> Result<tonic::Response<pb::BookResponse>, tonic::Status> {
    let response = match result {
        Ok(book) => {
            record_outcome(op.label(), "ok");
            pb::BookResponse {
                book: Some(convert::book_to_proto(&book)),
                success: true,
                message: ok_message.to_string(),
            }
        }
        Err(e) => pb::BookResponse {
            book: None,
            success: false,
            message: rejection(op, &e)?.to_string(),
        },
    };
    Ok(tonic::Response::new(response))
}

// ---------------------------------------------------------------------------
// Book gRPC service
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BookService {
    pub store: Arc<BookStore>,
}

impl BookService {
    pub fn new(store: Arc<BookStore>) -> Self {
        Self { store }
    }
}

#[tonic::async_trait]
impl pb::book_service_server::BookService for BookService {
    async fn add_book(
        &self,
        request: tonic::Request<pb::AddBookRequest>,
    ) -> Result<tonic::Response<pb::BookResponse>, tonic::Status> {
        let _timer = bookstore_metrics::inbound_rpc("add_book");
        let fields = convert::fields_from_add(request.into_inner());

        let book = self.store.add(fields).await;
        record_outcome("add", "ok");
        metrics().books.inc();
        tracing::info!(id = %book.id(), title = %book.title(), "added book");

        Ok(tonic::Response::new(pb::BookResponse {
            book: Some(convert::book_to_proto(&book)),
            success: true,
            message: ADDED.to_string(),
        }))
    }

    async fn delete_book(
        &self,
        request: tonic::Request<pb::DeleteBookRequest>,
    ) -> Result<tonic::Response<pb::DeleteBookResponse>, tonic::Status> {
        let _timer = bookstore_metrics::inbound_rpc("delete_book");
        let req = request.into_inner();

        let response = match self.store.delete(&req.id).await {
            Ok(removal) => {
                record_outcome(Op::Delete.label(), "ok");
                if removal == Removal::Removed {
                    metrics().books.dec();
                }
                tracing::info!(id = %req.id, ?removal, "deleted book");
                pb::DeleteBookResponse {
                    success: true,
                    message: DELETED.to_string(),
                }
            }
            Err(e) => pb::DeleteBookResponse {
                success: false,
                message: rejection(Op::Delete, &e)?.to_string(),
            },
        };
        Ok(tonic::Response::new(response))
    }

    async fn get_book(
        &self,
        request: tonic::Request<pb::GetBookRequest>,
    ) -> Result<tonic::Response<pb::BookResponse>, tonic::Status> {
        let _timer = bookstore_metrics::inbound_rpc("get_book");
        let req = request.into_inner();

        book_response(Op::Get, self.store.get(&req.id).await, FOUND)
    }

    async fn list_books(
        &self,
        _request: tonic::Request<pb::ListBooksRequest>,
    ) -> Result<tonic::Response<pb::ListBooksResponse>, tonic::Status> {
        let _timer = bookstore_metrics::inbound_rpc("list_books");

        let listing = self.store.list().await.map_err(|e| {
            record_outcome(Op::List.label(), "interrupted");
            tracing::debug!("list_books: {}", e);
            Op::List.interrupted()
        })?;
        record_outcome(Op::List.label(), "ok");
        if listing.skipped > 0 {
            metrics().list_skipped.inc_by(listing.skipped as u64);
            tracing::warn!(
                skipped = listing.skipped,
                returned = listing.books.len(),
                "listing is incomplete: some books were locked"
            );
        }

        Ok(tonic::Response::new(pb::ListBooksResponse {
            books: listing
                .books
                .iter()
                .map(|b| convert::book_to_proto(b))
                .collect(),
        }))
    }

    async fn update_book(
        &self,
        request: tonic::Request<pb::UpdateBookRequest>,
    ) -> Result<tonic::Response<pb::BookResponse>, tonic::Status> {
        let _timer = bookstore_metrics::inbound_rpc("update_book");
        let (id, fields) = convert::fields_from_update(request.into_inner());

        let result = self.store.update(&id, fields).await;
        if result.is_ok() {
            tracing::info!(%id, "updated book");
        }
        book_response(Op::Update, result, UPDATED)
    }
}
