//! User-level actions and how their results are shown.

use bookstore_common::{Book, BookFields};
use bookstore_net::{BookClient, CallError, Reply};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Add(BookFields),
    Get(String),
    Update(String, BookFields),
    Delete(String),
    List,
}

impl Action {
    /// Verb used in error lines, as in "Error adding book".
    pub fn verb(&self) -> &'static str {
        match self {
            Action::Add(_) => "adding book",
            Action::Get(_) => "getting book",
            Action::Update(..) => "updating book",
            Action::Delete(_) => "deleting book",
            Action::List => "listing books",
        }
    }

    /// Run the action and render what the user should see.
    ///
    /// Domain rejections are part of the rendered text; only failed calls
    /// return an error.
    pub async fn run(&self, client: &BookClient) -> Result<String, CallError> {
        let out = match self {
            Action::Add(fields) => render_added(&client.add_book(fields).await?),
            Action::Get(id) => render_found(&client.get_book(id.trim()).await?),
            Action::Update(id, fields) => {
                render_message(&client.update_book(id.trim(), fields).await?)
            }
            Action::Delete(id) => render_message(&client.delete_book(id.trim()).await?),
            Action::List => render_listing(&client.list_books().await?),
        };
        Ok(out)
    }
}

fn render_message<T>(reply: &Reply<T>) -> String {
    format!(" {}", reply.message)
}

pub fn render_added(reply: &Reply<Book>) -> String {
    match &reply.value {
        Some(book) => format!(" {}\n Book ID: {}", reply.message, book.id()),
        None => render_message(reply),
    }
}

pub fn render_found(reply: &Reply<Book>) -> String {
    match &reply.value {
        Some(book) => format!(" {}\n{}", reply.message, render_details(book)),
        None => render_message(reply),
    }
}

pub fn render_details(book: &Book) -> String {
    format!(
        "Book Details:\n   ID: {}\n   Title: {}\n   Author: {}\n   ISBN: {}\n   Year: {}",
        book.id(),
        book.title(),
        book.author(),
        book.isbn(),
        book.publication_year()
    )
}

pub fn render_listing(books: &[Book]) -> String {
    let mut out = String::from(" Book List:");
    if books.is_empty() {
        out.push_str("\n   No books available");
    }
    for book in books {
        out.push_str(&format!("\n    {}", book));
    }
    out
}
