use std::path::PathBuf;

use anyhow::{Context, Result};
use bookstore_common::BookFields;
use bookstore_config::Config;
use clap::{Args, Parser, Subcommand};

use crate::action::Action;

#[derive(Parser, Debug)]
#[command(author, version, about = "Client for the book store service", long_about = None)]
pub struct Cli {
    /// YAML config providing the server address and retry policy.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Server host. Overrides the config file.
    #[arg(long)]
    pub host: Option<String>,

    /// Server port. Overrides the config file.
    #[arg(long)]
    pub port: Option<u16>,

    /// Runs the interactive menu when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a book and print its identifier.
    Add(BookArgs),
    /// Show one book.
    Get { id: String },
    /// Replace every field of an existing book.
    Update {
        id: String,
        #[command(flatten)]
        book: BookArgs,
    },
    /// Delete a book.
    Delete { id: String },
    /// List the books that are not being modified right now.
    List,
    /// Interactive numbered menu.
    Menu,
}

#[derive(Args, Debug, Clone)]
pub struct BookArgs {
    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub author: String,

    #[arg(long)]
    pub isbn: String,

    /// Publication year.
    #[arg(long)]
    pub year: i32,
}

impl From<BookArgs> for BookFields {
    fn from(args: BookArgs) -> Self {
        BookFields::new(args.title, args.author, args.isbn, args.year)
    }
}

impl Command {
    /// The one-shot action for this command, or `None` for the menu.
    pub fn into_action(self) -> Option<Action> {
        match self {
            Command::Add(book) => Some(Action::Add(book.into())),
            Command::Get { id } => Some(Action::Get(id)),
            Command::Update { id, book } => Some(Action::Update(id, book.into())),
            Command::Delete { id } => Some(Action::Delete(id)),
            Command::List => Some(Action::List),
            Command::Menu => None,
        }
    }
}

impl Cli {
    /// Effective configuration: the file (or defaults) with flag overrides.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => bookstore_config::load_from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_to_menu() {
        let cli = Cli::try_parse_from(["bookstore-client"]).unwrap();
        assert!(cli.command.is_none());
        let config = cli.load_config().unwrap();
        assert_eq!(config.endpoint(), "http://localhost:8980");
    }

    #[test]
    fn test_parse_update() {
        let cli = Cli::try_parse_from([
            "bookstore-client",
            "--port",
            "9000",
            "update",
            "B3",
            "--title",
            "Emma",
            "--author",
            "Austen",
            "--isbn",
            "978-1",
            "--year",
            "1815",
        ])
        .unwrap();
        assert_eq!(cli.load_config().unwrap().port, 9000);
        let action = cli.command.unwrap().into_action().unwrap();
        assert_eq!(
            action,
            Action::Update("B3".into(), BookFields::new("Emma", "Austen", "978-1", 1815))
        );
    }

    #[test]
    fn test_add_requires_all_fields() {
        let result = Cli::try_parse_from(["bookstore-client", "add", "--title", "Emma"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host: 10.0.0.5\nport: 7000\nretry:\n  max_attempts: 5").unwrap();
        let path = file.path().to_str().unwrap();

        let cli =
            Cli::try_parse_from(["bookstore-client", "--config", path, "--host", "127.0.0.1", "list"])
                .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.address(), "127.0.0.1:7000");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(cli.command.unwrap().into_action(), Some(Action::List));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli =
            Cli::try_parse_from(["bookstore-client", "--config", "/no/such/config.yaml"]).unwrap();
        let err = cli.load_config().unwrap_err();
        assert!(err.to_string().contains("/no/such/config.yaml"));
    }
}
