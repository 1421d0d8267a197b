//! bookstore-common: value types shared by the server and the client.
//!
//! Provides the `BookId` identifier (`"B" + n`), the immutable `Book`
//! record, and the `BookFields` payload carried by add and update.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix of every book identifier.
pub const ID_PREFIX: char = 'B';

// ---------------------------------------------------------------------------
// BookId
// ---------------------------------------------------------------------------

/// Identifier of a book, rendered as `B<n>`.
///
/// The numeric suffix is the store's allocation counter at the time the
/// book was added, so identifiers order by creation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BookId(u64);

impl BookId {
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// The numeric suffix.
    pub const fn seq(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid book id {0:?}: expected B<number>")]
pub struct ParseBookIdError(String);

impl FromStr for BookId {
    type Err = ParseBookIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix(ID_PREFIX)
            .ok_or_else(|| ParseBookIdError(s.to_string()))?;
        // Reject signs and non-canonical zero padding so that every id has
        // exactly one textual form.
        if digits.is_empty()
            || !digits.bytes().all(|b| b.is_ascii_digit())
            || (digits.len() > 1 && digits.starts_with('0'))
        {
            return Err(ParseBookIdError(s.to_string()));
        }
        digits
            .parse()
            .map(Self)
            .map_err(|_| ParseBookIdError(s.to_string()))
    }
}

impl TryFrom<String> for BookId {
    type Error = ParseBookIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BookId> for String {
    fn from(id: BookId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ID_PREFIX, self.0)
    }
}

impl fmt::Debug for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BookId({})", self)
    }
}

// ---------------------------------------------------------------------------
// Book
// ---------------------------------------------------------------------------

/// The mutable part of a book: everything except its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookFields {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub publication_year: i32,
}

impl BookFields {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        isbn: impl Into<String>,
        publication_year: i32,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            isbn: isbn.into(),
            publication_year,
        }
    }
}

/// An immutable, fully populated book record.
///
/// Updates never mutate a `Book`; they build a new one with the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    id: BookId,
    fields: BookFields,
}

impl Book {
    pub fn new(id: BookId, fields: BookFields) -> Self {
        Self { id, fields }
    }

    pub fn id(&self) -> BookId {
        self.id
    }

    pub fn fields(&self) -> &BookFields {
        &self.fields
    }

    pub fn title(&self) -> &str {
        &self.fields.title
    }

    pub fn author(&self) -> &str {
        &self.fields.author
    }

    pub fn isbn(&self) -> &str {
        &self.fields.isbn
    }

    pub fn publication_year(&self) -> i32 {
        self.fields.publication_year
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {} (ID: {})", self.title(), self.author(), self.id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
