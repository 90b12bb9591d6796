pub mod db;
pub mod types;

pub use db::RowStore;
pub use types::RowStoreError;
