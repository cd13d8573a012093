//! Presentation layer: command dispatch and text output.

/// Composition root and command dispatch.
pub mod app;
/// Text rendering of command results.
pub mod report;

pub use app::App;
