//! # clipsharp
//!
//! Clipboard and OLE data transfer for Windows.
//!
//! The crate models the data-transfer protocol as plain Rust types and keeps
//! every OS call behind a small platform layer:
//!
//! - [`FormatRegistry`] - format names to numeric ids, seeded with the
//!   standard and well-known formats
//! - [`codec`] - byte layouts of the payloads (text, `CF_HDROP`, file
//!   descriptors, shell ID lists, DIBs, `HTML Format`)
//! - [`DataStore`] - a writable data object that renders payloads on demand
//! - [`ComDataObject`] - typed reads from any [`DataSource`]
//! - [`Clipboard`] - the process clipboard, driven from a dedicated
//!   apartment thread with a bounded wait per call
//!
//! # Architecture
//!
//! ```text
//! DataStore ──publish──> Arc<DataStore> ──OleSetClipboard──> OS clipboard
//!                                                                │
//! ComDataObject <── DataSource (OleDataSource / RenderedSource) <┘
//! ```
//!
//! Windows-only pieces live in [`platform`]. On other targets the same
//! model runs over process memory, which is what the test suite exercises.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(not(windows), forbid(unsafe_code))]

/// Apartment thread that serializes clipboard calls
pub mod apartment;

/// Process clipboard service and backends
pub mod clipboard;

/// Payload byte layouts
pub mod codec;

/// Configuration loading
pub mod config;

/// Error types
pub mod error;

/// Format ids and the name registry
pub mod format;

/// Subscriber setup for the binaries
pub mod logging;

/// Transfer media and format descriptors
pub mod medium;

/// Text recognition
pub mod ocr;

/// Typed reads over a data source
pub mod reader;

/// The data object contract
pub mod source;

/// Writable data object
pub mod store;

/// OS resources behind the media
pub mod sys;

/// Windows OLE integration
#[cfg(windows)]
pub mod platform;

pub use clipboard::{Clipboard, ClipboardBackend, MemoryClipboard};
pub use error::{ClipError, ClipResult};
pub use format::{FormatId, FormatRegistry, KnownFormat};
pub use medium::{Aspect, DataObjectFormat, DropEffect, FormatEtc, StgMedium, Tymed};
pub use reader::{BitmapMode, ClipData, ComDataObject};
pub use source::DataSource;
pub use store::{DataStore, Payload};

/// Common imports
pub mod prelude {
    pub use crate::clipboard::{Clipboard, ClipboardBackend, MemoryClipboard};
    pub use crate::error::{ClipError, ClipResult};
    pub use crate::format::{FormatId, FormatRegistry, KnownFormat};
    pub use crate::medium::{FormatEtc, StgMedium, Tymed};
    pub use crate::reader::ComDataObject;
    pub use crate::source::DataSource;
    pub use crate::store::DataStore;
}
