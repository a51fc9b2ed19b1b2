//! Core domain types shared by the ingestion pipeline and the search API.
//!
//! This crate has no knowledge of Postgres, HTTP, or XML — it only defines
//! the shape of a [`Business`] record, the raw record the parser produces,
//! and the normalization rules that turn one into the other.

pub mod adapter;
pub mod business;
pub mod dates;
pub mod raw;
pub mod search;

pub use adapter::normalize;
pub use business::{Business, BusinessName, NormalizedBusiness};
pub use raw::{RawBusinessName, RawRecord};
pub use search::{Pagination, ResponseMeta, SearchPage, SearchQuery};
