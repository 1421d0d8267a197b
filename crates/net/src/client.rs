//! Retrying gRPC client for the book service.
//!
//! Every call goes through [`Retry::run`]; transport failures with a
//! transient code are retried, domain rejections come back as a [`Reply`]
//! with `success = false`.

use crate::convert;
use crate::retry::{CallError, Retry};
use bookstore_common::{Book, BookFields};
use bookstore_metrics::outbound_rpc;
use bookstore_proto::book as pb;
use bookstore_proto::book::book_service_client::BookServiceClient;
use tonic::transport::Channel;

/// Outcome of a call that reached the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    pub success: bool,
    pub message: String,
    pub value: Option<T>,
}

impl<T> Reply<T> {
    fn new(success: bool, message: String, value: Option<T>) -> Self {
        Self {
            success,
            message,
            value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookClient {
    inner: BookServiceClient<Channel>,
    retry: Retry,
}

impl BookClient {
    /// Build a client whose channel connects on first use, so an absent
    /// server shows up as a retryable `UNAVAILABLE` on the first call.
    pub fn connect_lazy(endpoint: &str, retry: Retry) -> Result<Self, CallError> {
        let channel = Channel::from_shared(endpoint.to_string())
            .map_err(|e| CallError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?
            .connect_lazy();
        Ok(Self::from_channel(channel, retry))
    }

    pub fn from_channel(channel: Channel, retry: Retry) -> Self {
        Self {
            inner: BookServiceClient::new(channel),
            retry,
        }
    }

    pub fn retry(&self) -> &Retry {
        &self.retry
    }

    pub async fn add_book(&self, fields: &BookFields) -> Result<Reply<Book>, CallError> {
        let resp = self
            .retry
            .run("add_book", || {
                let mut client = self.inner.clone();
                let req = convert::add_request(fields);
                async move {
                    let _timer = outbound_rpc("add_book");
                    client.add_book(req).await
                }
            })
            .await?;
        book_reply("add_book", resp.into_inner())
    }

    pub async fn get_book(&self, id: &str) -> Result<Reply<Book>, CallError> {
        let resp = self
            .retry
            .run("get_book", || {
                let mut client = self.inner.clone();
                let req = pb::GetBookRequest { id: id.to_string() };
                async move {
                    let _timer = outbound_rpc("get_book");
                    client.get_book(req).await
                }
            })
            .await?;
        book_reply("get_book", resp.into_inner())
    }

    pub async fn update_book(
        &self,
        id: &str,
        fields: &BookFields,
    ) -> Result<Reply<Book>, CallError> {
        let resp = self
            .retry
            .run("update_book", || {
                let mut client = self.inner.clone();
                let req = convert::update_request(id, fields);
                async move {
                    let _timer = outbound_rpc("update_book");
                    client.update_book(req).await
                }
            })
            .await?;
        book_reply("update_book", resp.into_inner())
    }

    pub async fn delete_book(&self, id: &str) -> Result<Reply<()>, CallError> {
        let resp = self
            .retry
            .run("delete_book", || {
                let mut client = self.inner.clone();
                let req = pb::DeleteBookRequest { id: id.to_string() };
                async move {
                    let _timer = outbound_rpc("delete_book");
                    client.delete_book(req).await
                }
            })
            .await?
            .into_inner();
        let value = resp.success.then_some(());
        Ok(Reply::new(resp.success, resp.message, value))
    }

    /// All books the server could read without waiting. Books locked at
    /// the time of the call are silently absent.
    pub async fn list_books(&self) -> Result<Vec<Book>, CallError> {
        let resp = self
            .retry
            .run("list_books", || {
                let mut client = self.inner.clone();
                async move {
                    let _timer = outbound_rpc("list_books");
                    client.list_books(pb::ListBooksRequest {}).await
                }
            })
            .await?
            .into_inner();
        resp.books
            .iter()
            .map(|b| convert::book_from_proto(b).map_err(|status| malformed("list_books", status)))
            .collect()
    }
}

fn malformed(operation: &str, status: tonic::Status) -> CallError {
    CallError::Rpc {
        operation: operation.to_string(),
        attempts: 1,
        status,
    }
}

fn book_reply(operation: &str, resp: pb::BookResponse) -> Result<Reply<Book>, CallError> {
    let book = match resp.book.as_ref() {
        Some(b) if resp.success => {
            Some(convert::book_from_proto(b).map_err(|status| malformed(operation, status))?)
        }
        _ => None,
    };
    Ok(Reply::new(resp.success, resp.message, book))
}
