//! Windows OLE integration.
//!
//! - [`SystemFormats`] registers format names in the OS format table
//! - [`ComDataStore`] serves a published [`DataStore`](crate::store::DataStore)
//!   as a COM `IDataObject`
//! - [`OleDataSource`] reads any native `IDataObject` through the
//!   [`DataSource`](crate::source::DataSource) contract
//! - [`OleClipboard`] is the system clipboard backend
//! - [`shell_id_list_from_paths`] resolves paths to shell item ID lists
//!
//! Everything here must run on a thread that entered an OLE apartment.

#![allow(unsafe_code)]

mod client;
mod formats;
mod native;
mod ole_clipboard;
mod server;
mod shell;

pub use client::OleDataSource;
pub use formats::SystemFormats;
pub use ole_clipboard::OleClipboard;
pub use server::{ComDataStore, ComFormatEnumerator};
pub use shell::shell_id_list_from_paths;
