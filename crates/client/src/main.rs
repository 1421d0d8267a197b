use std::sync::Arc;

use anyhow::{Context, Result};
use bookstore_client::{
    cli::{Cli, Command},
    menu,
};
use bookstore_net::{BookClient, Retry, RetryPolicy};
use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    bookstore_metrics::init_tracing();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    // Ctrl+C cuts short any retry backoff in progress.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let cancel_tx = Arc::new(cancel_tx);
    spawn_ctrl_c_listener(cancel_tx.clone());

    let retry = Retry::new(RetryPolicy::from(&config.retry)).with_cancel(cancel_rx);
    let client = BookClient::connect_lazy(&config.endpoint(), retry)
        .with_context(|| format!("cannot use server address {}", config.endpoint()))?;

    match cli.command.and_then(Command::into_action) {
        Some(action) => {
            let text = action
                .run(&client)
                .await
                .with_context(|| format!("Error {}", action.verb()))?;
            println!("{text}");
        }
        None => {
            let mut stdin = BufReader::new(tokio::io::stdin());
            let mut stdout = tokio::io::stdout();
            menu::run(&client, &mut stdin, &mut stdout, &cancel_tx).await?;
        }
    }

    Ok(())
}

fn spawn_ctrl_c_listener(cancel: Arc<watch::Sender<bool>>) {
    tokio::spawn(async move {
        loop {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(?error, "ctrl-c handler failed");
                return;
            }
            cancel.send_replace(true);
        }
    });
}
