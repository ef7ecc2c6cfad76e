//! Process-wide clipboard access.
//!
//! [`Clipboard`] serializes every clipboard call onto its [`Apartment`]
//! thread and bounds how long a caller waits. The OS side sits behind
//! [`ClipboardBackend`]: the OLE clipboard on Windows, or
//! [`MemoryClipboard`], which models the same set / flush / open life cycle
//! in process memory.

use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::apartment::Apartment;
use crate::format::FormatRegistry;
use crate::reader::ComDataObject;
use crate::source::{DataSource, RenderedSource};
use crate::store::DataStore;
use crate::ClipResult;

/// Data object handed to [`Clipboard::with_data_object`] callbacks
pub type ClipboardData = ComDataObject<Box<dyn DataSource>>;

/// OS clipboard operations, always invoked on the apartment thread
pub trait ClipboardBackend: Send + Sync {
    /// Current clipboard contents (`OleGetClipboard`)
    fn open(&self) -> ClipResult<Box<dyn DataSource>>;

    /// Put `store` on the clipboard (`OleSetClipboard`)
    fn set(&self, store: Arc<DataStore>) -> ClipResult<()>;

    /// Render everything and release the store (`OleFlushClipboard`)
    fn flush(&self) -> ClipResult<()>;

    /// True if `store` is the live clipboard object (`OleIsCurrentClipboard`)
    fn is_current(&self, store: &Arc<DataStore>) -> ClipResult<bool>;

    /// Empty the clipboard (`OleSetClipboard(NULL)`)
    fn clear(&self) -> ClipResult<()>;
}

/// Clipboard service
pub struct Clipboard {
    apartment: Apartment,
    backend: Arc<dyn ClipboardBackend>,
    registry: Arc<FormatRegistry>,
}

impl Clipboard {
    /// Service over `backend`, waiting at most `timeout` per call
    pub fn new(
        backend: impl ClipboardBackend + 'static,
        registry: Arc<FormatRegistry>,
        timeout: Duration,
    ) -> ClipResult<Self> {
        Ok(Self {
            apartment: Apartment::new(timeout)?,
            backend: Arc::new(backend),
            registry,
        })
    }

    /// The system OLE clipboard
    ///
    /// Every call runs on this clipboard's own worker and waits at most
    /// `timeout`, whichever thread the caller is on.
    #[cfg(windows)]
    pub fn system(timeout: Duration) -> ClipResult<Self> {
        let registry = Arc::new(FormatRegistry::system()?);
        Self::new(crate::platform::OleClipboard::new(), registry, timeout)
    }

    /// The system OLE clipboard
    #[cfg(not(windows))]
    pub fn system(_timeout: Duration) -> ClipResult<Self> {
        Err(crate::ClipError::Unsupported("system clipboard"))
    }

    /// Registry shared with every reader and store
    pub fn registry(&self) -> &Arc<FormatRegistry> {
        &self.registry
    }

    /// Empty store bound to this clipboard's registry
    pub fn new_store(&self) -> DataStore {
        DataStore::new(Arc::clone(&self.registry))
    }

    /// Run `f` against the current clipboard contents
    pub fn with_data_object<R, F>(&self, f: F) -> ClipResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&ClipboardData) -> R + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let registry = Arc::clone(&self.registry);
        self.apartment
            .run(move || {
                let data = ComDataObject::new(backend.open()?, registry);
                Ok(f(&data))
            })?
    }

    /// Publish `store` and flush it, so the data outlives this process
    ///
    /// Returns the published object.
    pub fn set_data_store(&self, store: DataStore) -> ClipResult<Arc<DataStore>> {
        let store = store.publish();
        let backend = Arc::clone(&self.backend);
        let published = Arc::clone(&store);
        self.apartment.run(move || {
            backend.set(published)?;
            backend.flush()
        })??;
        info!("Clipboard set and flushed ({} formats)", store.formats().len());
        Ok(store)
    }

    /// True if `store` is still the live clipboard object
    pub fn is_current(&self, store: &Arc<DataStore>) -> ClipResult<bool> {
        let backend = Arc::clone(&self.backend);
        let store = Arc::clone(store);
        self.apartment.run(move || backend.is_current(&store))?
    }

    /// Empty the clipboard
    pub fn clear(&self) -> ClipResult<()> {
        let backend = Arc::clone(&self.backend);
        self.apartment.run(move || backend.clear())??;
        info!("Clipboard cleared");
        Ok(())
    }

    /// Clipboard text, unicode first
    pub fn get_text(&self) -> ClipResult<Option<String>> {
        self.with_data_object(|data| data.get_text())
    }

    /// Replace the clipboard with `text`
    pub fn set_text(&self, text: impl Into<String>) -> ClipResult<()> {
        let mut store = self.new_store();
        store.set_text(text);
        self.set_data_store(store).map(drop)
    }

    /// Replace the clipboard with `image`
    pub fn set_image(&self, image: RgbaImage) -> ClipResult<()> {
        let mut store = self.new_store();
        store.set_image(image);
        self.set_data_store(store).map(drop)
    }
}

// =============================================================================
// In-process backend
// =============================================================================

#[derive(Default)]
enum Contents {
    #[default]
    Empty,
    Live(Arc<DataStore>),
    Flushed(Arc<RenderedSource>),
}

/// Clipboard kept in process memory
///
/// Mirrors the OLE life cycle: `set` holds the live object, `flush` renders
/// every offer into an owned snapshot and drops the live object.
#[derive(Default)]
pub struct MemoryClipboard {
    contents: Mutex<Contents>,
}

impl MemoryClipboard {
    /// Empty clipboard
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardBackend for MemoryClipboard {
    fn open(&self) -> ClipResult<Box<dyn DataSource>> {
        Ok(match &*self.contents.lock() {
            Contents::Empty => Box::new(RenderedSource::default()),
            Contents::Live(store) => Box::new(Arc::clone(store)),
            Contents::Flushed(snapshot) => Box::new(Arc::clone(snapshot)),
        })
    }

    fn set(&self, store: Arc<DataStore>) -> ClipResult<()> {
        *self.contents.lock() = Contents::Live(store);
        Ok(())
    }

    fn flush(&self) -> ClipResult<()> {
        let mut contents = self.contents.lock();
        if let Contents::Live(store) = &*contents {
            let snapshot = RenderedSource::snapshot(store.as_ref())?;
            debug!("Flushed {} rendered formats", snapshot.len());
            *contents = Contents::Flushed(Arc::new(snapshot));
        }
        Ok(())
    }

    fn is_current(&self, store: &Arc<DataStore>) -> ClipResult<bool> {
        Ok(matches!(&*self.contents.lock(), Contents::Live(live) if Arc::ptr_eq(live, store)))
    }

    fn clear(&self) -> ClipResult<()> {
        *self.contents.lock() = Contents::Empty;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use image::Rgba;

    use super::*;
    use crate::apartment::DEFAULT_TIMEOUT;
    use crate::format::FormatId;
    use crate::ClipError;

    fn clipboard() -> Clipboard {
        let registry = Arc::new(FormatRegistry::in_memory().unwrap());
        Clipboard::new(MemoryClipboard::new(), registry, DEFAULT_TIMEOUT).unwrap()
    }

    #[test]
    fn test_text_survives_flush() {
        let clipboard = clipboard();
        assert_eq!(clipboard.get_text().unwrap(), None);

        clipboard.set_text("hello").unwrap();
        assert_eq!(clipboard.get_text().unwrap().as_deref(), Some("hello"));
    }

    #[test]
    fn test_flush_releases_store() {
        let clipboard = clipboard();
        let mut store = clipboard.new_store();
        store.set_text("x");
        let published = clipboard.set_data_store(store).unwrap();

        assert!(!clipboard.is_current(&published).unwrap());
        assert_eq!(Arc::strong_count(&published), 1);
    }

    #[test]
    fn test_image_and_clear() {
        let clipboard = clipboard();
        clipboard
            .set_image(RgbaImage::from_pixel(2, 3, Rgba([5, 6, 7, 255])))
            .unwrap();

        let formats = clipboard.with_data_object(|data| data.format_ids()).unwrap();
        assert_eq!(formats, vec![FormatId::CF_BITMAP, FormatId::CF_DIB]);
        let image = clipboard
            .with_data_object(|data| data.get_transparent_bitmap())
            .unwrap()
            .unwrap();
        assert_eq!(image.dimensions(), (2, 3));

        clipboard.clear().unwrap();
        assert!(clipboard.with_data_object(|data| data.format_ids()).unwrap().is_empty());
    }

    struct SlowBackend;

    impl ClipboardBackend for SlowBackend {
        fn open(&self) -> ClipResult<Box<dyn DataSource>> {
            thread::sleep(Duration::from_millis(300));
            Ok(Box::new(RenderedSource::default()))
        }

        fn set(&self, _store: Arc<DataStore>) -> ClipResult<()> {
            Ok(())
        }

        fn flush(&self) -> ClipResult<()> {
            Ok(())
        }

        fn is_current(&self, _store: &Arc<DataStore>) -> ClipResult<bool> {
            Ok(false)
        }

        fn clear(&self) -> ClipResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_stuck_backend_times_out() {
        let registry = Arc::new(FormatRegistry::in_memory().unwrap());
        let clipboard = Clipboard::new(SlowBackend, registry, Duration::from_millis(30)).unwrap();
        let err = clipboard.get_text().unwrap_err();
        assert!(matches!(err, ClipError::ApartmentTimeout(30)));
    }
}
