pub mod config;
pub mod error;
pub mod query;
pub mod repository;
pub mod retry;
pub mod schema;

pub use config::DatabaseConfig;
pub use error::{classify, StorageError, StorageResult};
pub use repository::{
    bulk_insert_names_with, bulk_upsert_with, delete_names_for_business_ids_with,
    get_ids_by_abns_with, Repository, UpsertOutcome,
};
