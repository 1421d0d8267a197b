//! Conversions between proto types and domain types.

use bookstore_common::{Book, BookFields, BookId};
use bookstore_proto::book as pb;

// ---------------------------------------------------------------------------
// Book
// ---------------------------------------------------------------------------

pub fn book_to_proto(book: &Book) -> pb::Book {
    pb::Book {
        id: book.id().to_string(),
        title: book.title().to_string(),
        author: book.author().to_string(),
        isbn: book.isbn().to_string(),
        publication_year: book.publication_year(),
    }
}

pub fn book_from_proto(proto: &pb::Book) -> Result<Book, tonic::Status> {
    let id: BookId = proto
        .id
        .parse()
        .map_err(|e| tonic::Status::internal(format!("invalid book in response: {}", e)))?;
    Ok(Book::new(
        id,
        BookFields {
            title: proto.title.clone(),
            author: proto.author.clone(),
            isbn: proto.isbn.clone(),
            publication_year: proto.publication_year,
        },
    ))
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub fn fields_from_add(req: pb::AddBookRequest) -> BookFields {
    BookFields {
        title: req.title,
        author: req.author,
        isbn: req.isbn,
        publication_year: req.publication_year,
    }
}

/// Split an update request into the target id and the new fields.
pub fn fields_from_update(req: pb::UpdateBookRequest) -> (String, BookFields) {
    (
        req.id,
        BookFields {
            title: req.title,
            author: req.author,
            isbn: req.isbn,
            publication_year: req.publication_year,
        },
    )
}

pub fn add_request(fields: &BookFields) -> pb::AddBookRequest {
    pb::AddBookRequest {
        title: fields.title.clone(),
        author: fields.author.clone(),
        isbn: fields.isbn.clone(),
        publication_year: fields.publication_year,
    }
}

pub fn update_request(id: &str, fields: &BookFields) -> pb::UpdateBookRequest {
    pb::UpdateBookRequest {
        id: id.to_string(),
        title: fields.title.clone(),
        author: fields.author.clone(),
        isbn: fields.isbn.clone(),
        publication_year: fields.publication_year,
    }
}
