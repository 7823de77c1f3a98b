#![warn(missing_docs)]

//! Server side of a Git LFS style batch transfer protocol.
//!
//! A transport layer authenticates each request into an
//! [`Identity`](ferry_permission::Identity) and hands it to one of the entry
//! points here:
//!
//! - [`BatchProcessor::process`] answers a batch request with per-object
//!   [`TransferResponse`]s, delegating each object to a [`TransferAdapter`].
//! - [`ObjectService::put`] / [`ObjectService::fetch`] serve the object
//!   endpoint that upload actions point at.
//! - [`ObjectVerifier::verify`] answers the verify action issued alongside
//!   each upload.
//!
//! Nothing is cached between calls; every answer is derived from the storage
//! backend at the time of the request.

mod adapter;
pub use adapter::*;

mod batch;
pub use batch::*;

mod error;
pub use error::*;

mod objects;
pub use objects::*;

mod response;
pub use response::*;

mod settings;
pub use settings::*;

mod verify;
pub use verify::*;
