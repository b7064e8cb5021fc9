mod error;
pub mod sqlite;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use sqlite::SqliteStorage;
pub use traits::{Collection, Record, RecordStore};
