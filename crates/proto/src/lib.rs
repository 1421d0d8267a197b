//! Generated gRPC code for the book service protobuf definitions.

/// Book records and the `BookService` (AddBook, DeleteBook, GetBook,
/// ListBooks, UpdateBook).
pub mod book {
    tonic::include_proto!("bookstore.v1");
}
