//! gRPC layer for the book service.
//!
//! Provides:
//! - `BookService`: bridges the `BookService` proto to [`BookStore`]
//! - `BookClient`: a retrying client for the same service
//! - `build_server`: assembles the service into a tonic `Router`

#![allow(clippy::result_large_err)]

pub mod client;
pub mod convert;
pub mod retry;
pub mod server;

pub use client::{BookClient, Reply};
pub use retry::{is_retryable, CallError, Retry, RetryPolicy};
pub use server::BookService;

use bookstore_proto::book::book_service_server::BookServiceServer;
use bookstore_storage::BookStore;
use std::sync::Arc;

/// Build a tonic `Router` serving the book service over `store`.
pub fn build_server(store: Arc<BookStore>) -> tonic::transport::server::Router {
    tonic::transport::Server::builder().add_service(BookServiceServer::new(BookService::new(store)))
}
