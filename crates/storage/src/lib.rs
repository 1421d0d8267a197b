//! In-memory book store with per-record reader/writer locking.
//!
//! Every book lives in its own [`Entry`]; the [`BookStore`] table only maps
//! identifiers to entries. Lock waits are bounded by a [`LockPolicy`] and
//! surface as [`StoreError::Busy`] instead of blocking a handler forever.

pub mod entry;
pub mod lock;
pub mod store;

pub use entry::Entry;
pub use lock::LockPolicy;
pub use store::{BookStore, Listing, Removal, StoreError};
