//! Publish / flush / read scenarios through the in-process clipboard.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver};
use image::{Rgba, RgbaImage};

use clipsharp::codec::DropFiles;
use clipsharp::prelude::*;
use clipsharp::source::DataSource;
use clipsharp::{BitmapMode, ClipData};

fn clipboard() -> Clipboard {
    let registry = Arc::new(FormatRegistry::in_memory().unwrap());
    Clipboard::new(MemoryClipboard::new(), registry, Duration::from_secs(5)).unwrap()
}

#[test]
fn test_unicode_text_round_trip() {
    let clipboard = clipboard();
    let text = "héllo wörld ✓ 日本語 \u{1F600}";
    clipboard.set_text(text).unwrap();

    assert_eq!(clipboard.get_text().unwrap().as_deref(), Some(text));
    let raw = clipboard
        .with_data_object(|data| data.get_bytes(FormatId::CF_UNICODETEXT, -1))
        .unwrap()
        .unwrap();
    let expected: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).chain([0, 0]).collect();
    assert_eq!(raw, expected);
}

#[test]
fn test_file_drop_round_trip() {
    let clipboard = clipboard();
    let path = if cfg!(windows) {
        PathBuf::from(r"C:\Users\Public\report.txt")
    } else {
        PathBuf::from("/srv/share/report.txt")
    };
    let mut store = clipboard.new_store();
    store.set_file_drop_list([&path]).unwrap();
    clipboard.set_data_store(store).unwrap();

    let files = clipboard
        .with_data_object(|data| data.get_file_drop_list())
        .unwrap()
        .unwrap();
    assert_eq!(files, vec![path.clone()]);

    let raw = clipboard
        .with_data_object(|data| data.get_bytes(FormatId::CF_HDROP, -1))
        .unwrap()
        .unwrap();
    assert!(raw.ends_with(&[0, 0, 0, 0]));
    let parsed = DropFiles::parse(&raw).unwrap();
    assert!(parsed.wide);
    assert_eq!(parsed.files, vec![path]);
}

#[test]
fn test_bitmap_strategies_after_flush() {
    let clipboard = clipboard();
    let mut image = RgbaImage::from_pixel(5, 3, Rgba([40, 80, 120, 255]));
    image.put_pixel(2, 1, Rgba([255, 0, 0, 64]));
    clipboard.set_image(image).unwrap();

    let (normal, bitmap, dib) = clipboard
        .with_data_object(|data| {
            (
                data.get_bitmap(BitmapMode::Normal),
                data.get_bitmap(BitmapMode::Bitmap),
                data.get_bitmap(BitmapMode::Dib),
            )
        })
        .unwrap();
    let (normal, bitmap, dib) = (normal.unwrap(), bitmap.unwrap(), dib.unwrap());

    for decoded in [&normal, &bitmap, &dib] {
        assert_eq!(decoded.dimensions(), (5, 3));
    }
    assert_eq!(normal.get_pixel(2, 1)[3], 255);
    assert_eq!(bitmap.get_pixel(2, 1)[3], 64);
    assert_eq!(bitmap.get_pixel(0, 0), &Rgba([40, 80, 120, 255]));
}

#[test]
fn test_indexed_presence() {
    let registry = Arc::new(FormatRegistry::in_memory().unwrap());
    let custom = registry.register("Indexed Payload").unwrap();
    let never = registry.register("Never Published").unwrap();

    let mut store = DataStore::new(Arc::clone(&registry));
    store.set_data(custom, 2, b"third".to_vec());
    let data = ComDataObject::new(store.publish(), registry);

    for index in [-1, 0, 1, 3] {
        assert!(!data.data_present_at(custom, index), "index {}", index);
        assert!(!data.data_present_at(never, index));
    }
    assert!(data.data_present_at(custom, 2));
    assert!(!data.data_present_at(never, 2));
    assert_eq!(data.get_bytes(custom, 2).as_deref(), Some(&b"third"[..]));
}

#[test]
fn test_enumeration_order_and_reset() {
    let registry = Arc::new(FormatRegistry::in_memory().unwrap());
    let [a, b, c] = ["Alpha", "Bravo", "Charlie"].map(|name| registry.register(name).unwrap());

    let mut store = DataStore::new(Arc::clone(&registry));
    for format in [a, b, c] {
        store.set_data(format, -1, vec![1u8]);
    }
    let store = store.publish();

    let mut formats = store.enumerator();
    let first: Vec<FormatId> = formats.next_batch(10).iter().map(|etc| etc.format).collect();
    assert_eq!(first, vec![a, b, c]);
    assert!(formats.next_batch(1).is_empty());

    formats.reset();
    let again: Vec<FormatId> = formats.map(|etc| etc.format).collect();
    assert_eq!(again, vec![a, b, c]);

    let offered: Vec<FormatId> = store.enum_formats().unwrap().iter().map(|etc| etc.format).collect();
    assert_eq!(offered, vec![a, b, c]);
}

#[test]
fn test_live_object_until_flush() {
    let registry = Arc::new(FormatRegistry::in_memory().unwrap());
    let backend = MemoryClipboard::new();
    let mut store = DataStore::new(Arc::clone(&registry));
    store.set_text("live");
    let store = store.publish();

    backend.set(Arc::clone(&store)).unwrap();
    assert!(backend.is_current(&store).unwrap());
    backend.flush().unwrap();
    assert!(!backend.is_current(&store).unwrap());
    assert_eq!(Arc::strong_count(&store), 1);

    let data = ComDataObject::new(backend.open().unwrap(), registry);
    assert!(matches!(data.get_data(FormatId::CF_UNICODETEXT), Some(ClipData::Text(t)) if t == "live"));
}

#[test]
fn test_clear_empties_clipboard() {
    let clipboard = clipboard();
    clipboard.set_text("gone soon").unwrap();
    clipboard.clear().unwrap();
    assert_eq!(clipboard.get_text().unwrap(), None);
    assert!(clipboard.with_data_object(|data| data.format_ids()).unwrap().is_empty());
}

/// Backend whose `set` blocks until released, like a call marshaled to a
/// thread that is not pumping messages
struct StuckBackend {
    release: Receiver<()>,
}

impl ClipboardBackend for StuckBackend {
    fn open(&self) -> ClipResult<Box<dyn DataSource>> {
        Ok(Box::new(clipsharp::source::RenderedSource::default()))
    }

    fn set(&self, _store: Arc<DataStore>) -> ClipResult<()> {
        let _ = self.release.recv();
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
fn test_stuck_set_times_out() {
    let registry = Arc::new(FormatRegistry::in_memory().unwrap());
    let (release_tx, release_rx) = bounded::<()>(0);
    let clipboard = Clipboard::new(StuckBackend { release: release_rx }, registry, Duration::from_millis(100)).unwrap();

    let started = Instant::now();
    let result = clipboard.set_text("never lands");
    assert!(matches!(result, Err(ClipError::ApartmentTimeout(100))));
    assert!(started.elapsed() < Duration::from_millis(700));

    // Teardown must not wait on the wedged worker either
    let started = Instant::now();
    drop(clipboard);
    assert!(started.elapsed() < Duration::from_millis(700));

    drop(release_tx);
}
