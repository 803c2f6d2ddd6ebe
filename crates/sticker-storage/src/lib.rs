//! Blob staging for media handed between pipeline stages.
//!
//! This crate provides:
//! - The [`BlobStaging`] seam (put/get/delete/exists)
//! - Local-disk and Cloudflare R2 backends
//! - The staging key layout shared by every stage

pub mod config;
pub mod error;
pub mod keys;
pub mod local;
pub mod r2;
pub mod staging;

pub use config::StagingConfig;
pub use error::{StorageError, StorageResult};
pub use keys::{converted_key, raw_key};
pub use local::LocalStaging;
pub use r2::{R2Config, R2Staging};
pub use staging::BlobStaging;
