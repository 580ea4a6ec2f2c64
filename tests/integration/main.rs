//! Integration tests for the crawl-to-search pipeline
//!
//! These tests use wiremock to stand in for the convênio site and run the
//! full crawl, ingestion and query cycle against a SQLite file.

mod extraction;
mod pipeline;
