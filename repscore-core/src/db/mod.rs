//! Database layer for repscore
//!
//! This module provides the storage boundary using SQLite with:
//! - Schema migrations
//! - Raw event ingestion and snapshot reads
//! - Transactional swap of the derived tables

pub mod repo;
pub mod schema;

pub use repo::{Database, DerivedCounts, ReviewActivity};
