//! imagepress - cached, retrying batch image processing.
//!
//! This crate compresses and resizes images in batches, keeps processed
//! results in a bounded persistent cache, retries failed processing with
//! exponential backoff, and tracks usage statistics across runs.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing services and use cases.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for storage, processing and delivery.
pub mod infrastructure;
/// Presentation layer containing command dispatch and output.
pub mod presentation;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "imagepress";
