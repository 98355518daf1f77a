//! Pixelgate - an HTTP image proxy core.
//!
//! Given a source image URL and an ordered set of requested transformations,
//! pixelgate fetches (or reuses a disk-cached copy of) the source bytes,
//! applies the transformation pipeline, and produces a response carrying the
//! encoded image plus cache-validation metadata (ETag, conditional 304).
//!
//! The crate deliberately stops at the HTTP boundary: routing, CORS, and
//! process startup belong to the embedding server, which hands parsed query
//! pairs to [`application::RequestOrchestrator`] and writes the returned
//! [`application::ProxyResponse`] verbatim.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the transform pipeline and orchestrator.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name, also used as the author tag stamped on decoded images.
pub const NAME: &str = "pixelgate";
