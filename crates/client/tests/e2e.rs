use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bookstore_client::{action::Action, menu};
use bookstore_common::BookFields;
use bookstore_net::{BookClient, CallError, Retry, RetryPolicy};
use bookstore_storage::{BookStore, LockPolicy};
use tokio::sync::watch;

async fn spawn_server(port: u16) -> String {
    let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
    let router = bookstore_net::build_server(Arc::new(BookStore::new(LockPolicy::default())));
    tokio::spawn(async move {
        router.serve(addr).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    format!("http://{}", addr)
}

#[tokio::test]
async fn menu_session_end_to_end() {
    let endpoint = spawn_server(17350).await;
    let client = BookClient::connect_lazy(&endpoint, Retry::default()).unwrap();
    let (cancel, _) = watch::channel(false);

    let script = "1\nDune\nFrank Herbert\n978-0441013593\n1965\n\
                  3\nB0\n\
                  5\nB0\nDune Messiah\nFrank Herbert\n978-0593098233\n1969\n\
                  4\n\
                  2\nB0\n\
                  3\nB0\n\
                  4\n\
                  7\n\
                  6\n";
    let mut input = script.as_bytes();
    let mut out = Vec::new();
    menu::run(&client, &mut input, &mut out, &cancel).await.unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains(" Book added successfully\n Book ID: B0"));
    assert!(text.contains(" Book found\nBook Details:\n   ID: B0\n   Title: Dune\n"));
    assert!(text.contains(" Book updated successfully"));
    assert!(text.contains("    Dune Messiah by Frank Herbert (ID: B0)"));
    assert!(text.contains(" Book deleted successfully"));
    assert!(text.contains(" Book not found"));
    assert!(text.contains("   No books available"));
    assert!(text.contains("Invalid option!"));
    assert!(text.trim_end().ends_with("Exiting..."));
}

#[tokio::test]
async fn menu_exits_at_end_of_input() {
    let endpoint = spawn_server(17351).await;
    let client = BookClient::connect_lazy(&endpoint, Retry::default()).unwrap();
    let (cancel, _) = watch::channel(false);

    let mut input = "4\n".as_bytes();
    let mut out = Vec::new();
    menu::run(&client, &mut input, &mut out, &cancel).await.unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains(" Book List:"));
    assert!(text.trim_end().ends_with("Exiting..."));
}

#[tokio::test]
async fn one_shot_actions() {
    let endpoint = spawn_server(17352).await;
    let client = BookClient::connect_lazy(&endpoint, Retry::default()).unwrap();

    let added = Action::Add(BookFields::new("Emma", "Jane Austen", "978-1", 1815))
        .run(&client)
        .await
        .unwrap();
    assert_eq!(added, " Book added successfully\n Book ID: B0");

    let listed = Action::List.run(&client).await.unwrap();
    assert_eq!(listed, " Book List:\n    Emma by Jane Austen (ID: B0)");

    let deleted = Action::Delete(" B0 ".into()).run(&client).await.unwrap();
    assert_eq!(deleted, " Book deleted successfully");
}

#[tokio::test]
async fn cancel_interrupts_backoff() {
    // Nothing listens here, so every attempt is UNAVAILABLE.
    let (cancel, rx) = watch::channel(false);
    let retry = Retry::new(RetryPolicy {
        initial_backoff: Duration::from_secs(30),
        max_backoff: Duration::from_secs(30),
        ..RetryPolicy::default()
    })
    .with_cancel(rx);
    let client = BookClient::connect_lazy("http://127.0.0.1:17359", retry).unwrap();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.send_replace(true);
        tokio::time::sleep(Duration::from_secs(1)).await;
    });

    let result = tokio::time::timeout(Duration::from_secs(10), Action::List.run(&client))
        .await
        .unwrap();
    assert!(matches!(result, Err(CallError::Interrupted { .. })));
}
