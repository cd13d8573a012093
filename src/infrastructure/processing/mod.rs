//! Image processor adapters.

mod image_crate_processor;

pub use image_crate_processor::ImageCrateProcessor;
