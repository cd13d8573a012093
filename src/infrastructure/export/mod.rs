//! Export target adapters.

mod fs_export_target;

pub use fs_export_target::FsExportTarget;
