//! Storage services: path layout, payload storage, version metadata and the
//! coordinator tying them together.

pub mod bucket_service;
pub mod content_store;
pub mod error;
pub mod metadata_store;
pub mod object_service;
pub mod paths;
