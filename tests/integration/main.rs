//! Integration tests for Shelf-Harvest
//!
//! These tests use wiremock to stand in for a retailer site and run the
//! full discover, fetch, extract and ingest cycle end-to-end.

mod common;
mod crawl_tests;
mod scheduler_tests;
