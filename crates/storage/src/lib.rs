#![forbid(unsafe_code)]

pub mod progress_store;
pub mod repository;
pub mod sqlite;

pub use progress_store::{FileProgressStore, InMemoryProgressStore, ProgressStore, ProgressStoreError};
pub use repository::{Storage, StorageError};
