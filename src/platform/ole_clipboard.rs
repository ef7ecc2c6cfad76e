//! System clipboard backend.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use windows::Win32::Foundation::S_OK;
use windows::Win32::System::Com::IDataObject;
use windows::Win32::System::Ole::{OleFlushClipboard, OleGetClipboard, OleIsCurrentClipboard, OleSetClipboard};

use super::client::OleDataSource;
use super::server::ComDataStore;
use crate::clipboard::ClipboardBackend;
use crate::source::DataSource;
use crate::store::DataStore;
use crate::ClipResult;

/// The OLE clipboard
///
/// Keeps the last published store next to the interface handed to OLE so
/// [`ClipboardBackend::is_current`] can match one against the other.
#[derive(Default)]
pub struct OleClipboard {
    published: Mutex<Option<(Arc<DataStore>, IDataObject)>>,
}

// SAFETY: the interface is created, compared and released only on the
// apartment thread that runs every backend call.
unsafe impl Send for OleClipboard {}
// SAFETY: see above
unsafe impl Sync for OleClipboard {}

impl OleClipboard {
    /// Backend with nothing published
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardBackend for OleClipboard {
    fn open(&self) -> ClipResult<Box<dyn DataSource>> {
        // SAFETY: called on an OLE apartment thread
        let object = unsafe { OleGetClipboard() }?;
        Ok(Box::new(OleDataSource::new(object)))
    }

    fn set(&self, store: Arc<DataStore>) -> ClipResult<()> {
        let object = ComDataStore::create(Arc::clone(&store));
        // SAFETY: called on an OLE apartment thread
        unsafe { OleSetClipboard(&object) }?;
        *self.published.lock() = Some((store, object));
        Ok(())
    }

    fn flush(&self) -> ClipResult<()> {
        // SAFETY: called on an OLE apartment thread
        unsafe { OleFlushClipboard() }?;
        if self.published.lock().take().is_some() {
            debug!("Released the flushed data object");
        }
        Ok(())
    }

    fn is_current(&self, store: &Arc<DataStore>) -> ClipResult<bool> {
        let published = self.published.lock();
        let Some((current, object)) = published.as_ref() else {
            return Ok(false);
        };
        if !Arc::ptr_eq(current, store) {
            return Ok(false);
        }
        // SAFETY: called on an OLE apartment thread
        Ok(unsafe { OleIsCurrentClipboard(object) } == S_OK)
    }

    fn clear(&self) -> ClipResult<()> {
        // SAFETY: called on an OLE apartment thread
        unsafe { OleSetClipboard(None::<&IDataObject>) }?;
        self.published.lock().take();
        Ok(())
    }
}
