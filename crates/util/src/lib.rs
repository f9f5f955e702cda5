//! Utility helpers shared across the nodemap crates.

mod async_runtime;
mod path_processing;
mod redaction;

pub use async_runtime::block_on_future;
pub use path_processing::{config_file_path, expand_tilde};
pub use redaction::redact_sensitive;
