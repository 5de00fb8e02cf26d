//! Storage backends for Tally
//!
//! The core talks to storage only through the `GraphStore` / `StoreTx`
//! traits. The shipped implementation is `SqliteStore`.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{in_transaction, read_only, GraphStore, OpenStore, StorageError, StorageResult, StoreTx};
