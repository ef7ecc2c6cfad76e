//! Publishing side: an in-memory data object served to consumers.
//!
//! A [`DataStore`] is filled mutably, then frozen with [`DataStore::publish`]
//! and handed to the clipboard. From then on every call is `&self`: the
//! consumer may query, enumerate and fetch at any later time, any number of
//! times, possibly from several threads, and each fetch renders the stored
//! payload into a fresh medium it owns.
//!
//! # Medium selection
//!
//! ```text
//! Payload              Format            Medium
//! -------------------  ----------------  ------------------------------
//! Bitmap               CF_BITMAP         GDI (premultiplied 32bpp)
//! Bitmap               anything else     HGLOBAL (packed 32bpp DIB)
//! EnhMetafile          CF_ENHMETAFILE    ENHMF
//! Stream               any               HGLOBAL, or ISTREAM if only that
//! everything else      any               HGLOBAL
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use enumflags2::{make_bitflags, BitFlags};
use image::RgbaImage;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::codec::{dib, encode_string, DropFiles, FileDescriptor, HtmlFormat, ShellIdList};
use crate::format::{FormatId, FormatRegistry, KnownFormat};
use crate::medium::{Aspect, DropEffect, FormatEtc, QueryStatus, StgMedium, Tymed};
use crate::source::DataSource;
use crate::sys::{DeviceBitmap, EnhMetafile, GlobalMemory};
use crate::{ClipError, ClipResult};

/// Media kinds a store can serve
const SERVABLE: BitFlags<Tymed> =
    make_bitflags!(Tymed::{HGlobal | IStream | IStorage | Gdi | MfPict | EnhMf});

// =============================================================================
// Payloads
// =============================================================================

/// Seekable byte source that can be shared across threads
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Stream payload, rewound and read in full on every fetch
#[derive(Clone)]
pub struct SharedStream(Arc<Mutex<Box<dyn ReadSeek>>>);

impl SharedStream {
    /// Wrap a seekable reader
    pub fn new(stream: impl ReadSeek + 'static) -> Self {
        Self(Arc::new(Mutex::new(Box::new(stream))))
    }

    /// Stream over an in-memory buffer
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::new(Cursor::new(bytes.into()))
    }

    /// Rewind and read the whole stream
    pub fn read_all(&self) -> ClipResult<Vec<u8>> {
        let mut stream = self.0.lock();
        stream.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

impl fmt::Debug for SharedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedStream")
    }
}

/// Value published under one (format, index) pair
#[derive(Debug, Clone)]
pub enum Payload {
    /// String, encoded per format on fetch
    Text(String),
    /// Raw bytes
    Bytes(Bytes),
    /// Seekable stream
    Stream(SharedStream),
    /// Straight RGBA image
    Bitmap(RgbaImage),
    /// Paths for `CF_HDROP`
    FileList(Vec<PathBuf>),
    /// Shell item lists for `Shell IDList Array`
    IdList(ShellIdList),
    /// Descriptors for `FileGroupDescriptorW`
    FileGroup(Vec<FileDescriptor>),
    /// Serialized enhanced metafile records
    EnhMetafile(Vec<u8>),
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes.into())
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<RgbaImage> for Payload {
    fn from(image: RgbaImage) -> Self {
        Self::Bitmap(image)
    }
}

// =============================================================================
// Data Store
// =============================================================================

/// In-memory data object published to the clipboard
pub struct DataStore {
    registry: Arc<FormatRegistry>,
    order: Vec<FormatId>,
    entries: HashMap<FormatId, BTreeMap<i32, Payload>>,
}

impl fmt::Debug for DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStore").field("formats", &self.order).finish()
    }
}

impl DataStore {
    /// Empty store resolving format names through `registry`
    pub fn new(registry: Arc<FormatRegistry>) -> Self {
        Self {
            registry,
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }

    /// Registry used for names and string encodings
    pub fn registry(&self) -> &Arc<FormatRegistry> {
        &self.registry
    }

    /// Publish `payload` under `format` at item `index` (-1 for the whole data)
    ///
    /// Formats are enumerated in the order they were first set.
    pub fn set_data(&mut self, format: FormatId, index: i32, payload: impl Into<Payload>) -> &mut Self {
        let slot = self.entries.entry(format).or_insert_with(|| {
            self.order.push(format);
            BTreeMap::new()
        });
        slot.insert(index, payload.into());
        trace!("Stored format {} at index {}", format, index);
        self
    }

    /// Publish a string under a string-valued format
    ///
    /// Fails with [`ClipError::InvalidArgument`] when the format has no
    /// fixed encoding.
    pub fn set_string(&mut self, format: FormatId, text: impl Into<String>) -> ClipResult<&mut Self> {
        if self.registry.string_encoding(format).is_none() {
            return Err(ClipError::InvalidArgument(format!(
                "{} is not a string format",
                self.registry.name_of(format)
            )));
        }
        Ok(self.set_data(format, -1, Payload::Text(text.into())))
    }

    /// Publish unicode text; the OS synthesizes `CF_TEXT` and `CF_OEMTEXT`
    pub fn set_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.set_data(FormatId::CF_UNICODETEXT, -1, Payload::Text(text.into()))
    }

    /// Publish an HTML fragment as `HTML Format`
    pub fn set_html(&mut self, fragment: &str) -> &mut Self {
        let format = self.registry.known(KnownFormat::Html);
        self.set_data(format, -1, Payload::Text(HtmlFormat::build(fragment, None)))
    }

    /// Publish a `CF_HDROP` list; relative paths are made absolute
    pub fn set_file_drop_list<P: AsRef<Path>>(&mut self, paths: impl IntoIterator<Item = P>) -> ClipResult<&mut Self> {
        let cwd = std::env::current_dir()?;
        let files = paths
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                if p.is_absolute() {
                    p.to_path_buf()
                } else {
                    cwd.join(p)
                }
            })
            .collect();
        Ok(self.set_data(FormatId::CF_HDROP, -1, Payload::FileList(files)))
    }

    /// Publish a `Shell IDList Array`
    pub fn set_shell_id_list(&mut self, list: ShellIdList) -> &mut Self {
        let format = self.registry.known(KnownFormat::ShellIdList);
        self.set_data(format, -1, Payload::IdList(list))
    }

    /// Publish an image as `CF_BITMAP` and `CF_DIB`
    pub fn set_image(&mut self, image: RgbaImage) -> &mut Self {
        self.set_data(FormatId::CF_BITMAP, -1, Payload::Bitmap(image.clone()));
        self.set_data(FormatId::CF_DIB, -1, Payload::Bitmap(image))
    }

    /// Publish encoded image bytes under each of `formats` (e.g. PNG and image/png)
    pub fn set_image_stream(&mut self, bytes: impl Into<Bytes>, formats: &[KnownFormat]) -> &mut Self {
        let stream = SharedStream::from_bytes(bytes);
        for &known in formats {
            let format = self.registry.known(known);
            self.set_data(format, -1, Payload::Stream(stream.clone()));
        }
        self
    }

    /// Publish virtual files: `FileGroupDescriptorW` plus `FileContents` at 0..n
    pub fn set_file_contents(&mut self, files: Vec<(FileDescriptor, Payload)>) -> &mut Self {
        let descriptor_format = self.registry.known(KnownFormat::FileDescriptorW);
        let contents_format = self.registry.known(KnownFormat::FileContents);

        let (descriptors, contents): (Vec<_>, Vec<_>) = files.into_iter().unzip();
        self.set_data(descriptor_format, -1, Payload::FileGroup(descriptors));
        for (index, content) in contents.into_iter().enumerate() {
            self.set_data(contents_format, index as i32, content);
        }
        self
    }

    /// Publish `Preferred DropEffect`
    pub fn set_drop_effect(&mut self, effect: BitFlags<DropEffect>) -> &mut Self {
        let format = self.registry.known(KnownFormat::PreferredDropEffect);
        self.set_data(format, -1, effect.bits().to_le_bytes().to_vec())
    }

    /// Publish `CF_LOCALE`
    pub fn set_locale(&mut self, lcid: u32) -> &mut Self {
        self.set_data(FormatId::CF_LOCALE, -1, lcid.to_le_bytes().to_vec())
    }

    /// Formats in publication order
    pub fn formats(&self) -> &[FormatId] {
        &self.order
    }

    /// True if `format` was published at exactly `index`
    pub fn data_present(&self, format: FormatId, index: i32) -> bool {
        self.payload(format, index).is_some()
    }

    /// Stored payload at (format, index)
    pub fn payload(&self, format: FormatId, index: i32) -> Option<&Payload> {
        self.entries.get(&format)?.get(&index)
    }

    /// Freeze the store for serving
    pub fn publish(self) -> Arc<Self> {
        debug!("Publishing data store with {} formats", self.order.len());
        Arc::new(self)
    }

    /// Restartable snapshot of the published formats
    pub fn enumerator(&self) -> FormatEnumerator {
        FormatEnumerator::new(
            self.order
                .iter()
                .map(|&format| FormatEtc::new(format).with_tymed(FormatEtc::advertised_tymed(format)))
                .collect(),
        )
    }

    /// Render into a caller-supplied global block (`GetDataHere`)
    ///
    /// The block grows when the payload does not fit.
    pub fn get_data_here(&self, etc: &FormatEtc, medium: &mut StgMedium) -> ClipResult<()> {
        if let Some(err) = self.query_get_data(etc).into_error(etc) {
            return Err(err);
        }
        let payload = self.require(etc)?;
        let StgMedium::HGlobal(memory) = medium else {
            return Err(ClipError::InvalidMedium {
                expected: Tymed::HGlobal,
                actual: medium.tymed(),
            });
        };
        let bytes = self.render_bytes(etc.format, payload)?;
        memory.write_all(&bytes)
    }

    fn require(&self, etc: &FormatEtc) -> ClipResult<&Payload> {
        self.payload(etc.format, etc.index).ok_or(ClipError::FormatUnavailable {
            format: etc.format,
            index: etc.index,
        })
    }

    /// Media `render` can produce for `payload` under `format`
    fn media_for(format: FormatId, payload: &Payload) -> BitFlags<Tymed> {
        match payload {
            Payload::Bitmap(_) if format == FormatId::CF_BITMAP => Tymed::Gdi.into(),
            Payload::EnhMetafile(_) if format == FormatId::CF_ENHMETAFILE => Tymed::EnhMf.into(),
            Payload::Stream(_) => Tymed::HGlobal | Tymed::IStream,
            _ => Tymed::HGlobal.into(),
        }
    }

    fn render(&self, etc: &FormatEtc, payload: &Payload) -> ClipResult<StgMedium> {
        if !etc.tymed.intersects(Self::media_for(etc.format, payload)) {
            return Err(ClipError::UnsupportedMedium(etc.tymed));
        }

        match payload {
            Payload::Bitmap(image) if etc.format == FormatId::CF_BITMAP => {
                Ok(StgMedium::Gdi(DeviceBitmap::from_image(image)?))
            }
            Payload::EnhMetafile(bits) if etc.format == FormatId::CF_ENHMETAFILE => {
                Ok(StgMedium::EnhMetafile(EnhMetafile::from_bytes(bits)?))
            }
            Payload::Stream(stream) if !etc.tymed.contains(Tymed::HGlobal) => {
                Ok(StgMedium::Stream(stream.read_all()?))
            }
            _ => {
                let bytes = self.render_bytes(etc.format, payload)?;
                Ok(StgMedium::HGlobal(GlobalMemory::from_bytes(&bytes)?))
            }
        }
    }

    fn render_bytes(&self, format: FormatId, payload: &Payload) -> ClipResult<Vec<u8>> {
        Ok(match payload {
            Payload::Text(text) => {
                let encoding = self.registry.string_encoding(format).ok_or_else(|| {
                    ClipError::InvalidArgument(format!(
                        "no string encoding for {}",
                        self.registry.name_of(format)
                    ))
                })?;
                encode_string(text, encoding)
            }
            Payload::Bytes(bytes) => bytes.to_vec(),
            Payload::Stream(stream) => stream.read_all()?,
            Payload::Bitmap(image) => dib::encode_dib(image),
            Payload::FileList(files) => DropFiles::new(files.clone()).build(),
            Payload::IdList(list) => list.build(),
            Payload::FileGroup(descriptors) => FileDescriptor::build_group(descriptors)?,
            Payload::EnhMetafile(bits) => bits.clone(),
        })
    }
}

impl DataSource for DataStore {
    fn query_get_data(&self, etc: &FormatEtc) -> QueryStatus {
        if etc.aspect != Aspect::Content {
            return QueryStatus::InvalidAspect;
        }
        if !etc.tymed.intersects(SERVABLE) {
            return QueryStatus::InvalidTymed;
        }
        if etc.format.id() == 0 {
            return QueryStatus::NoData;
        }
        if !self.data_present(etc.format, etc.index) {
            return QueryStatus::InvalidFormat;
        }
        match self.payload(etc.format, etc.index) {
            Some(payload) if !etc.tymed.intersects(Self::media_for(etc.format, payload)) => QueryStatus::InvalidTymed,
            _ => QueryStatus::Ok,
        }
    }

    fn get_data(&self, etc: &FormatEtc) -> ClipResult<StgMedium> {
        if let Some(err) = self.query_get_data(etc).into_error(etc) {
            return Err(err);
        }
        let payload = self.require(etc)?;
        let medium = self.render(etc, payload)?;
        debug!(
            "Rendered {} index {} as {:?}",
            self.registry.name_of(etc.format),
            etc.index,
            medium.tymed()
        );
        Ok(medium)
    }

    fn enum_formats(&self) -> ClipResult<Vec<FormatEtc>> {
        Ok(self.enumerator().collect())
    }
}

// =============================================================================
// Format Enumerator
// =============================================================================

/// Restartable cursor over a store's offers (`IEnumFORMATETC`)
///
/// The sequence is fixed when the enumerator is created; clones share it but
/// keep their own position.
#[derive(Debug, Clone)]
pub struct FormatEnumerator {
    offers: Arc<[FormatEtc]>,
    position: usize,
}

impl FormatEnumerator {
    /// Enumerator over `offers`
    pub fn new(offers: Vec<FormatEtc>) -> Self {
        Self {
            offers: offers.into(),
            position: 0,
        }
    }

    /// Up to `count` offers; fewer means the end was reached (`Next`)
    pub fn next_batch(&mut self, count: usize) -> Vec<FormatEtc> {
        let end = self.position.saturating_add(count).min(self.offers.len());
        let batch = self.offers[self.position..end].to_vec();
        self.position = end;
        batch
    }

    /// Skip `count` offers; false if fewer remained (`Skip`)
    pub fn advance(&mut self, count: usize) -> bool {
        let remaining = self.remaining();
        self.position = self.position.saturating_add(count).min(self.offers.len());
        count <= remaining
    }

    /// Restart from the first offer (`Reset`)
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Offers not yet returned
    pub fn remaining(&self) -> usize {
        self.offers.len() - self.position
    }
}

impl Iterator for FormatEnumerator {
    type Item = FormatEtc;

    fn next(&mut self) -> Option<FormatEtc> {
        let offer = self.offers.get(self.position).copied()?;
        self.position += 1;
        Some(offer)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl ExactSizeIterator for FormatEnumerator {}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;
    use crate::codec::{decode_string, TextEncoding};

    fn store() -> DataStore {
        DataStore::new(Arc::new(FormatRegistry::in_memory().unwrap()))
    }

    #[test]
    fn test_query_checks_in_order() {
        let mut store = store();
        store.set_text("x");
        let etc = FormatEtc::new(FormatId::CF_UNICODETEXT);

        assert_eq!(store.query_get_data(&etc), QueryStatus::Ok);
        assert_eq!(
            store.query_get_data(&etc.with_aspect(Aspect::Icon).with_tymed(Tymed::File)),
            QueryStatus::InvalidAspect
        );
        assert_eq!(store.query_get_data(&etc.with_tymed(Tymed::File)), QueryStatus::InvalidTymed);
        assert_eq!(store.query_get_data(&FormatEtc::new(FormatId(0))), QueryStatus::NoData);
        assert_eq!(
            store.query_get_data(&FormatEtc::new(FormatId::CF_TEXT)),
            QueryStatus::InvalidFormat
        );
    }

    #[test]
    fn test_text_uses_format_encoding() {
        let mut store = store();
        store.set_text("héllo");
        store.set_string(FormatId::CF_TEXT, "ansi é").unwrap();

        let unicode = store.get_data(&FormatEtc::new(FormatId::CF_UNICODETEXT)).unwrap();
        assert_eq!(unicode.string(TextEncoding::Utf16).unwrap(), "héllo");

        let ansi = store.get_data(&FormatEtc::new(FormatId::CF_TEXT)).unwrap();
        assert_eq!(ansi.bytes().unwrap().last(), Some(&0));
        assert_eq!(ansi.string(TextEncoding::Ansi).unwrap(), "ansi é");
    }

    #[test]
    fn test_text_without_encoding_is_invalid_argument() {
        let mut store = store();
        assert!(matches!(
            store.set_string(FormatId::CF_DIB, "x"),
            Err(ClipError::InvalidArgument(_))
        ));

        store.set_data(FormatId::CF_DIB, -1, "not a bitmap");
        let err = store.get_data(&FormatEtc::new(FormatId::CF_DIB)).unwrap_err();
        assert!(matches!(err, ClipError::InvalidArgument(_)));
    }

    #[test]
    fn test_bitmap_media() {
        let mut store = store();
        store.set_image(RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255])));

        let gdi = store.get_data(&FormatEtc::new(FormatId::CF_BITMAP)).unwrap();
        assert_eq!(gdi.bitmap().unwrap().dimensions(), (3, 2));

        let dib = store.get_data(&FormatEtc::new(FormatId::CF_DIB)).unwrap();
        assert_eq!(dib::dib_dimensions(&dib.bytes().unwrap()).unwrap(), (3, 2));

        let hglobal_only = FormatEtc::new(FormatId::CF_BITMAP).with_tymed(Tymed::HGlobal);
        assert_eq!(store.query_get_data(&hglobal_only), QueryStatus::InvalidTymed);
        assert_eq!(
            store.query_get_data(&FormatEtc::new(FormatId::CF_BITMAP).with_tymed(Tymed::Gdi)),
            QueryStatus::Ok
        );
        assert!(matches!(
            store.get_data(&hglobal_only),
            Err(ClipError::UnsupportedMedium(_))
        ));
    }

    #[test]
    fn test_stream_media() {
        let mut store = store();
        store.set_image_stream(vec![0x89, b'P', b'N', b'G'], &[KnownFormat::Png, KnownFormat::PngMime]);
        let png = store.registry().known(KnownFormat::Png);

        let hglobal = store.get_data(&FormatEtc::new(png)).unwrap();
        assert_eq!(hglobal.tymed(), Some(Tymed::HGlobal));

        let stream = store.get_data(&FormatEtc::new(png).with_tymed(Tymed::IStream)).unwrap();
        assert_eq!(stream.tymed(), Some(Tymed::IStream));
        assert_eq!(stream.bytes().unwrap(), vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_index_presence() {
        let mut store = store();
        store.set_data(FormatId::CF_RIFF, 2, vec![1u8]);

        assert!(store.data_present(FormatId::CF_RIFF, 2));
        for index in [-1, 0, 1] {
            assert!(!store.data_present(FormatId::CF_RIFF, index));
            let etc = FormatEtc::new(FormatId::CF_RIFF).with_index(index);
            assert_eq!(store.query_get_data(&etc), QueryStatus::InvalidFormat);
        }
    }

    #[test]
    fn test_drop_list_is_absolute() {
        let mut store = store();
        store.set_file_drop_list(["relative.txt"]).unwrap();

        let medium = store.get_data(&FormatEtc::new(FormatId::CF_HDROP)).unwrap();
        let files = medium.drop_files().unwrap().files;
        assert_eq!(files.len(), 1);
        assert!(files[0].is_absolute());
        assert!(files[0].ends_with("relative.txt"));
    }

    #[test]
    fn test_file_contents_indices() {
        let mut store = store();
        store.set_file_contents(vec![
            (FileDescriptor::new("a.txt"), Payload::from(b"first".to_vec())),
            (FileDescriptor::new("b.txt"), Payload::from(b"second".to_vec())),
        ]);

        let group = store.registry().known(KnownFormat::FileDescriptorW);
        let contents = store.registry().known(KnownFormat::FileContents);

        let descriptors = store.get_data(&FormatEtc::new(group)).unwrap().file_descriptors().unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[1].name, "b.txt");

        let second = store.get_data(&FormatEtc::new(contents).with_index(1)).unwrap();
        assert_eq!(second.bytes().unwrap(), b"second");
        assert!(!store.data_present(contents, -1));
    }

    #[test]
    fn test_get_data_here_grows_block() {
        let mut store = store();
        store.set_text("a longer string than the block");

        let mut medium = StgMedium::HGlobal(GlobalMemory::alloc(2).unwrap());
        store
            .get_data_here(&FormatEtc::new(FormatId::CF_UNICODETEXT), &mut medium)
            .unwrap();
        assert_eq!(
            decode_string(&medium.bytes().unwrap(), TextEncoding::Utf16),
            "a longer string than the block"
        );

        let mut wrong = StgMedium::Stream(Vec::new());
        assert!(store
            .get_data_here(&FormatEtc::new(FormatId::CF_UNICODETEXT), &mut wrong)
            .is_err());
    }

    #[test]
    fn test_enumerator_order_reset_and_skip() {
        let mut store = store();
        store.set_text("a");
        store.set_image(RgbaImage::new(1, 1));
        store.set_locale(0x0409);

        let mut formats = store.enumerator();
        let all = formats.next_batch(10);
        let ids: Vec<_> = all.iter().map(|e| e.format).collect();
        assert_eq!(
            ids,
            vec![FormatId::CF_UNICODETEXT, FormatId::CF_BITMAP, FormatId::CF_DIB, FormatId::CF_LOCALE]
        );
        assert_eq!(all[1].tymed, Tymed::Gdi);
        assert_eq!(all[0].index, -1);
        assert!(formats.next_batch(1).is_empty());

        formats.reset();
        assert!(formats.advance(3));
        let mut copy = formats.clone();
        assert_eq!(formats.next().map(|e| e.format), Some(FormatId::CF_LOCALE));
        assert_eq!(copy.next().map(|e| e.format), Some(FormatId::CF_LOCALE));
        assert!(!formats.advance(1));
    }

    #[test]
    fn test_published_store_serves_threads() {
        let mut store = store();
        store.set_text("shared");
        let published = store.publish();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&published);
                std::thread::spawn(move || {
                    let medium = store.get_data(&FormatEtc::new(FormatId::CF_UNICODETEXT)).unwrap();
                    medium.string(TextEncoding::Utf16).unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "shared");
        }
    }
}
