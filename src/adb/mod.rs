// ADB module - Android Debug Bridge transport
// Two interchangeable backends (adb_client talking to the ADB server, or the
// `adb` binary) behind one `AdbClient` trait, dispatched by `AdbBackend`.

pub mod backend;
pub mod error;
pub mod framebuffer;
pub mod parse;
pub mod rust_impl;
pub mod shell;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export the main types and functions for easy access
pub use backend::{AdbBackend, BackendKind};
pub use error::{AdbError, AdbResult};
pub use rust_impl::RustAdb;
pub use shell::AdbShell;
pub use types::{AdbClient, Device, ImageCapture, KEYCODE_BACK, KEYCODE_HOME};
