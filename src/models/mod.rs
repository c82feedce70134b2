//! Core data models for the versioned object store.
//!
//! These entities represent buckets, object versions and their attributes.
//! They map to database tables via `sqlx::FromRow` and serialize as JSON via
//! `serde`.

pub mod bucket;
pub mod metadata;
pub mod object;
