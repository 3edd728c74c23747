//! User-facing features built on the core services.

pub mod clipboard;

pub use clipboard::{ClipboardFeature, ConfirmationCapability};
