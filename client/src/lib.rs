//! Terminal client for checking OpenAI billing usage through the balance relay.

/// Config directory and user settings
pub mod config;

/// Page controller: submit, refresh, rename, persistence
pub mod page;

/// In-memory balance table
pub mod rows;

/// Persistent key-value store
pub mod storage;

/// Relay HTTP client
pub mod usage_client;

pub use page::{FetchKind, FetchTicket, Page, PageError};
pub use rows::RowStore;
pub use storage::{Storage, StorageError};
pub use usage_client::{ClientError, RelayRequest, UsageClient};
