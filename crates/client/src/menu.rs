//! Numbered interactive menu.
//!
//! Reads choices from any line-oriented input so the same loop runs on a
//! terminal and in tests. Ctrl+C while waiting for input leaves the menu;
//! Ctrl+C during an action only interrupts a pending retry.

use anyhow::Result;
use bookstore_common::BookFields;
use bookstore_net::BookClient;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;

use crate::action::Action;

const BANNER: &str = "\n=== Book Management System ===\n\
1. Add Book\n\
2. Delete Book\n\
3. Get Book\n\
4. List Books\n\
5. Update Book\n\
6. Exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Choice {
    Run(Action),
    Exit,
    /// Unusable input; the text explains why.
    Invalid(String),
}

/// Run the menu until the user exits, input ends, or `cancel` fires while
/// waiting for a choice. `cancel` is reset before every prompt.
pub async fn run<R, W>(
    client: &BookClient,
    input: &mut R,
    out: &mut W,
    cancel: &watch::Sender<bool>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        cancel.send_replace(false);
        let mut interrupted = cancel.subscribe();

        let choice = tokio::select! {
            choice = read_choice(input, out) => choice?,
            _ = interrupted.wait_for(|c| *c) => None,
        };

        match choice {
            Some(Choice::Run(action)) => {
                let text = match action.run(client).await {
                    Ok(text) => text,
                    Err(e) => format!("Error {}: {}", action.verb(), e),
                };
                write_line(out, &text).await?;
            }
            Some(Choice::Invalid(reason)) => write_line(out, &reason).await?,
            Some(Choice::Exit) | None => {
                write_line(out, "Exiting...").await?;
                return Ok(());
            }
        }
    }
}

/// Show the menu and read one complete choice. `None` at end of input.
pub async fn read_choice<R, W>(input: &mut R, out: &mut W) -> Result<Option<Choice>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    write_line(out, BANNER).await?;
    let Some(option) = prompt(input, out, "Choose an option: ").await? else {
        return Ok(None);
    };

    let choice = match option.trim() {
        "1" => match read_fields(input, out, "Enter").await? {
            Some(Ok(fields)) => Choice::Run(Action::Add(fields)),
            Some(Err(invalid)) => invalid,
            None => return Ok(None),
        },
        "2" => match prompt(input, out, "Enter book ID to delete: ").await? {
            Some(id) => Choice::Run(Action::Delete(id)),
            None => return Ok(None),
        },
        "3" => match prompt(input, out, "Enter book ID to get: ").await? {
            Some(id) => Choice::Run(Action::Get(id)),
            None => return Ok(None),
        },
        "4" => Choice::Run(Action::List),
        "5" => {
            let Some(id) = prompt(input, out, "Enter book ID to update: ").await? else {
                return Ok(None);
            };
            match read_fields(input, out, "Enter new").await? {
                Some(Ok(fields)) => Choice::Run(Action::Update(id, fields)),
                Some(Err(invalid)) => invalid,
                None => return Ok(None),
            }
        }
        "6" => Choice::Exit,
        _ => Choice::Invalid("Invalid option!".to_string()),
    };
    Ok(Some(choice))
}

/// Prompt for the four book fields. The inner `Err` carries an invalid year.
async fn read_fields<R, W>(
    input: &mut R,
    out: &mut W,
    lead: &str,
) -> Result<Option<Result<BookFields, Choice>>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut values = Vec::with_capacity(4);
    for field in ["title", "author", "ISBN", "publication year"] {
        match prompt(input, out, &format!("{} {}: ", lead, field)).await? {
            Some(value) => values.push(value),
            None => return Ok(None),
        }
    }
    let year = values.pop().unwrap_or_default();
    let Ok(year) = year.trim().parse::<i32>() else {
        return Ok(Some(Err(Choice::Invalid(format!(
            "Invalid publication year: {}",
            year.trim()
        )))));
    };
    let isbn = values.pop().unwrap_or_default();
    let author = values.pop().unwrap_or_default();
    let title = values.pop().unwrap_or_default();
    Ok(Some(Ok(BookFields::new(title, author, isbn, year))))
}

async fn prompt<R, W>(input: &mut R, out: &mut W, label: &str) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    out.write_all(label.as_bytes()).await?;
    out.flush().await?;

    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

async fn write_line<W: AsyncWrite + Unpin>(out: &mut W, line: &str) -> Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}
