//! Storage boundary: row-level inserts and deletes against the target
//! database.

pub mod adapter;
pub mod error;
pub mod memory;
pub mod mysql;
pub mod options;

pub use adapter::RowStore;
pub use error::{DbError, DbResult};
pub use memory::MemoryStore;
pub use mysql::MySqlStore;
pub use options::ConnectionOptions;
