//! Output module for queries and reports
//!
//! This module handles:
//! - Searching the store and normalizing products for display
//! - Printing store statistics, sources and job tables

mod search;
pub mod stats;

pub use search::{product_details, search, MerchantView, ProductView, SearchQuery, SearchResponse};
pub use stats::{format_bytes, print_jobs, print_sources, print_statistics};
