pub mod db;
pub mod repositories;
pub mod sqlite_store;
pub mod store;

pub use sqlite_store::SqliteStore;
pub use store::{NullStore, RecordStore, StoreError, StoreSnapshot};

#[cfg(any(test, feature = "mocks"))]
pub use store::MockRecordStore;
