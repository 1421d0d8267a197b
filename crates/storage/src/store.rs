//! The book store: identifier allocation plus a table of lockable entries.
//!
//! The table is a sharded concurrent map `BookId -> Arc<Entry>`. A shard is
//! locked only for the structural step of an operation (lookup, insert,
//! compare-and-remove) and never across an await, so no lock covers the
//! whole store and contention on one book never stalls another.

use crate::entry::Entry;
use crate::lock::{Acquire, Interrupt, LockPolicy};
use bookstore_common::{Book, BookFields, BookId};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No live book under this identifier.
    #[error("book {0} not found")]
    NotFound(String),
    /// The entry lock could not be taken within the retry budget.
    #[error("book {0} is locked by another operation")]
    Busy(BookId),
    /// The store was shut down while the operation waited for a lock.
    #[error("interrupted while waiting for a book lock")]
    Interrupted,
}

/// Result of [`BookStore::list`].
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// Books in ascending identifier order.
    pub books: Vec<Arc<Book>>,
    /// Entries left out because their lock was contended.
    pub skipped: usize,
}

/// What a successful [`BookStore::delete`] did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The cleared entry was removed from the table.
    Removed,
    /// The cleared entry had already been replaced under the same id; the
    /// replacement was left in place.
    Superseded,
}

/// Concurrent in-memory book store.
///
/// Constructed once at startup and shared (`Arc<BookStore>`) with the
/// request handlers. [`BookStore::shutdown`] releases every lock waiter.
#[derive(Debug)]
pub struct BookStore {
    entries: DashMap<BookId, Arc<Entry>>,
    next_seq: AtomicU64,
    policy: LockPolicy,
    shutdown: watch::Sender<bool>,
}

impl Default for BookStore {
    fn default() -> Self {
        Self::new(LockPolicy::default())
    }
}

impl BookStore {
    pub fn new(policy: LockPolicy) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            entries: DashMap::new(),
            next_seq: AtomicU64::new(0),
            policy,
            shutdown,
        }
    }

    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    /// Add a book under a freshly allocated identifier. Never waits on an
    /// entry lock, so it cannot be busy or interrupted.
    pub async fn add(&self, fields: BookFields) -> Arc<Book> {
        let id = BookId::new(self.next_seq.fetch_add(1, Ordering::SeqCst));
        let book = Book::new(id, fields);
        let entry = Arc::new(Entry::new(book.clone()));

        self.entries.insert(id, entry);
        tracing::debug!(%id, "book added");
        Arc::new(book)
    }

    /// Current version of a book.
    pub async fn get(&self, id: &str) -> Result<Arc<Book>, StoreError> {
        let (id, entry) = self.lookup(id)?;
        let mut interrupt = self.interrupt();

        // Bound so the guard is dropped before `entry`.
        let result = match entry.read(&self.policy, &mut interrupt).await {
            Acquire::Acquired(guard) => guard
                .snapshot()
                .ok_or_else(|| StoreError::NotFound(id.to_string())),
            Acquire::Exhausted => Err(self.busy(id, "get")),
            Acquire::Interrupted => Err(StoreError::Interrupted),
        };
        result
    }

    /// Replace a book's fields, keeping its identifier.
    pub async fn update(&self, id: &str, fields: BookFields) -> Result<Arc<Book>, StoreError> {
        let (id, entry) = self.lookup(id)?;
        let mut interrupt = self.interrupt();

        let mut guard = match entry.write(&self.policy, &mut interrupt).await {
            Acquire::Acquired(guard) => guard,
            Acquire::Exhausted => return Err(self.busy(id, "update")),
            Acquire::Interrupted => return Err(StoreError::Interrupted),
        };
        // A delete may have won the lock while we waited.
        if guard.snapshot().is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let book = guard.replace(Book::new(id, fields));
        tracing::debug!(%id, "book updated");
        Ok(book)
    }

    /// Delete a book. The entry is cleared under its write lock, then
    /// removed from the table only if the table still maps the identifier
    /// to that same entry.
    pub async fn delete(&self, id: &str) -> Result<Removal, StoreError> {
        let (id, entry) = self.lookup(id)?;
        let mut interrupt = self.interrupt();

        let mut guard = match entry.write(&self.policy, &mut interrupt).await {
            Acquire::Acquired(guard) => guard,
            Acquire::Exhausted => return Err(self.busy(id, "delete")),
            Acquire::Interrupted => return Err(StoreError::Interrupted),
        };
        if guard.clear().is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }

        let removal = match self
            .entries
            .remove_if(&id, |_, current| Arc::ptr_eq(current, &entry))
        {
            Some(_) => Removal::Removed,
            None => Removal::Superseded,
        };
        drop(guard);

        tracing::debug!(%id, ?removal, "book deleted");
        Ok(removal)
    }

    /// Best-effort listing. Each entry gets one timed read attempt; an
    /// entry that stays locked for the whole attempt is left out and
    /// counted in [`Listing::skipped`] rather than failing the listing.
    pub async fn list(&self) -> Result<Listing, StoreError> {
        let mut entries: Vec<(BookId, Arc<Entry>)> = self
            .entries
            .iter()
            .map(|item| (*item.key(), Arc::clone(item.value())))
            .collect();
        entries.sort_unstable_by_key(|(id, _)| *id);
        let mut interrupt = self.interrupt();

        let mut listing = Listing::default();
        for (id, entry) in entries {
            let outcome = entry.read_once(&self.policy, &mut interrupt).await;
            match outcome {
                Acquire::Acquired(guard) => {
                    if let Some(book) = guard.snapshot() {
                        listing.books.push(book);
                    }
                }
                Acquire::Exhausted => {
                    tracing::debug!(%id, "list skipped contended book");
                    listing.skipped += 1;
                }
                Acquire::Interrupted => return Err(StoreError::Interrupted),
            }
        }
        Ok(listing)
    }

    /// Number of books currently in the table.
    pub async fn len(&self) -> usize {
        self.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Interrupt every current and future lock wait. Operations that were
    /// waiting return [`StoreError::Interrupted`].
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        tracing::info!("book store shut down, lock waiters interrupted");
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Take the write lock of `id` without a deadline and keep it until
    /// `release` resolves. Returns `false` when there is no such book.
    #[cfg(any(test, feature = "testing"))]
    pub async fn hold_write_lock(
        &self,
        id: BookId,
        release: impl std::future::Future<Output = ()>,
    ) -> bool {
        let Some(entry) = self.entry(id) else {
            return false;
        };
        let _held = entry.write_unbounded().await;
        release.await;
        true
    }

    fn interrupt(&self) -> Interrupt {
        Interrupt::new(self.shutdown.subscribe())
    }

    fn busy(&self, id: BookId, op: &'static str) -> StoreError {
        tracing::warn!(
            %id,
            op,
            attempts = self.policy.max_attempts,
            "gave up waiting for book lock"
        );
        StoreError::Busy(id)
    }

    fn lookup(&self, raw: &str) -> Result<(BookId, Arc<Entry>), StoreError> {
        let not_found = || StoreError::NotFound(raw.to_string());
        let id: BookId = raw.parse().map_err(|_| not_found())?;
        let entry = self
            .entries
            .get(&id)
            .map(|item| Arc::clone(item.value()))
            .ok_or_else(not_found)?;
        Ok((id, entry))
    }

    #[cfg(any(test, feature = "testing"))]
    pub(crate) fn entry(&self, id: BookId) -> Option<Arc<Entry>> {
        self.entries.get(&id).map(|item| Arc::clone(item.value()))
    }

    /// Put `entry` in the table under `id`, replacing whatever was there.
    #[cfg(any(test, feature = "testing"))]
    pub fn install_entry(&self, id: BookId, entry: Arc<Entry>) {
        self.entries.insert(id, entry);
    }
}
