#![warn(missing_docs)]

//! Object storage for the ferry transfer control plane.
//!
//! The transfer adapter never holds object state of its own; every decision
//! is re-derived from a [`StorageCapability`]. This crate defines that
//! capability, the [`ActionDescriptor`]s backends hand out for direct
//! downloads, and a few backends:
//!
//! - [`MemoryStorage`] keeps objects in a shared in-process map
//! - [`FileSystemStorage`] keeps objects under a root directory
//! - `S3Storage` keeps objects in an S3-compatible bucket and hands out
//!   presigned download URLs (requires the `s3` feature)
//!
//! Backends are constructed from configuration through a
//! [`StorageRegistry`].

mod action;
pub use action::*;

mod capability;
pub use capability::*;

mod endpoint;
pub use endpoint::*;

mod error;
pub use error::*;

mod fs;
pub use fs::*;

mod memory;
pub use memory::*;

mod registry;
pub use registry::*;

#[cfg(feature = "s3")]
pub mod s3;
#[cfg(feature = "s3")]
pub use s3::S3Storage;
