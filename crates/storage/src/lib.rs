//! taxwise-storage: the `SessionStore` trait, record types, error types,
//! and two backends (in-memory and JSON files).

pub mod conformance;
mod error;
mod file;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use file::FileSessionStore;
pub use memory::InMemorySessionStore;
pub use record::{now_rfc3339, SessionRecord, SessionSummary};
pub use traits::SessionStore;
