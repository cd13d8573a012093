//! Pure domain services.

mod output_filename;

pub use output_filename::derive_output_filename;
