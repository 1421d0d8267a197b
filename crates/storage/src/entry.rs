//! A lockable slot holding the current version of one book.
//!
//! The slot's reader/writer lock is the unit of concurrency control:
//! readers share it, a writer has it alone. Content can only be replaced
//! or cleared through an [`EntryWriteGuard`], so every mutation happens
//! with the write lock held.

use crate::lock::{acquire_once, acquire_with_retry, Acquire, Interrupt, LockPolicy};
use bookstore_common::Book;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Current book for one identifier, or `None` once deleted.
#[derive(Debug)]
pub struct Entry {
    slot: RwLock<Option<Arc<Book>>>,
}

impl Entry {
    pub fn new(book: Book) -> Self {
        Self {
            slot: RwLock::new(Some(Arc::new(book))),
        }
    }

    /// Shared access with bounded retry.
    pub(crate) async fn read(
        &self,
        policy: &LockPolicy,
        interrupt: &mut Interrupt,
    ) -> Acquire<EntryReadGuard<'_>> {
        match acquire_with_retry(policy, interrupt, || self.slot.read()).await {
            Acquire::Acquired(guard) => Acquire::Acquired(EntryReadGuard(guard)),
            Acquire::Exhausted => Acquire::Exhausted,
            Acquire::Interrupted => Acquire::Interrupted,
        }
    }

    /// Shared access, one timed attempt only.
    pub(crate) async fn read_once(
        &self,
        policy: &LockPolicy,
        interrupt: &mut Interrupt,
    ) -> Acquire<EntryReadGuard<'_>> {
        let mut lock = || self.slot.read();
        match acquire_once(policy, interrupt, &mut lock).await {
            Acquire::Acquired(guard) => Acquire::Acquired(EntryReadGuard(guard)),
            Acquire::Exhausted => Acquire::Exhausted,
            Acquire::Interrupted => Acquire::Interrupted,
        }
    }

    /// Exclusive access with bounded retry.
    pub(crate) async fn write(
        &self,
        policy: &LockPolicy,
        interrupt: &mut Interrupt,
    ) -> Acquire<EntryWriteGuard<'_>> {
        match acquire_with_retry(policy, interrupt, || self.slot.write()).await {
            Acquire::Acquired(guard) => Acquire::Acquired(EntryWriteGuard(guard)),
            Acquire::Exhausted => Acquire::Exhausted,
            Acquire::Interrupted => Acquire::Interrupted,
        }
    }

    /// Exclusive access without a deadline. Tests use this to hold an
    /// entry while other operations contend for it.
    #[cfg(any(test, feature = "testing"))]
    pub(crate) async fn write_unbounded(&self) -> EntryWriteGuard<'_> {
        EntryWriteGuard(self.slot.write().await)
    }
}

/// Shared lock on an [`Entry`].
#[derive(Debug)]
pub struct EntryReadGuard<'a>(RwLockReadGuard<'a, Option<Arc<Book>>>);

impl EntryReadGuard<'_> {
    /// The book currently held, without copying it.
    pub fn snapshot(&self) -> Option<Arc<Book>> {
        self.0.clone()
    }
}

/// Exclusive lock on an [`Entry`].
#[derive(Debug)]
pub struct EntryWriteGuard<'a>(RwLockWriteGuard<'a, Option<Arc<Book>>>);

impl EntryWriteGuard<'_> {
    pub fn snapshot(&self) -> Option<Arc<Book>> {
        self.0.clone()
    }

    /// Swap in a new version and return it.
    pub fn replace(&mut self, book: Book) -> Arc<Book> {
        let book = Arc::new(book);
        *self.0 = Some(book.clone());
        book
    }

    /// Mark the entry deleted, returning the last version.
    pub fn clear(&mut self) -> Option<Arc<Book>> {
        self.0.take()
    }
}
