//! Consuming side: typed getters over any [`DataSource`].
//!
//! Every getter checks presence with `query_get_data` before fetching, and
//! turns extraction failures into `None` after logging them and handing them
//! to the optional [`ComDataObject::on_error`] hook. Absence is never an
//! error; only misuse (asking for a string from a format without a string
//! encoding, or writing through the reader) is.
//!
//! The medium returned by the source is owned by the getter and dropped (and
//! its OS resource released) before the getter returns, on success and on
//! every failure path.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use enumflags2::BitFlags;
use image::RgbaImage;
use tracing::{debug, warn};

use crate::codec::dib::{self, AlphaMode};
use crate::codec::{FileDescriptor, HtmlFormat, Record, ShellIdList, TextEncoding};
use crate::format::{FormatId, FormatRegistry, KnownFormat};
use crate::medium::{DataObjectFormat, DropEffect, FormatEtc, MetafilePict, QueryStatus, StgMedium, Tymed};
use crate::source::DataSource;
use crate::{ClipError, ClipResult};

/// How [`ComDataObject::get_bitmap`] obtains pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapMode {
    /// `CF_BITMAP`, alpha discarded
    Normal,
    /// `CF_BITMAP`, 32bpp pixels read as premultiplied alpha
    Bitmap,
    /// `CF_DIB` packed bitmap
    Dib,
}

/// Value returned by [`ComDataObject::get_data`]
#[derive(Debug)]
pub enum ClipData {
    /// String formats
    Text(String),
    /// `Preferred DropEffect`
    DropEffect(BitFlags<DropEffect>),
    /// `CF_HDROP`, `FileName`, `FileNameW`
    FileList(Vec<PathBuf>),
    /// `FileGroupDescriptorW`
    FileDescriptors(Vec<FileDescriptor>),
    /// `CF_BITMAP`
    Image(RgbaImage),
    /// `CF_ENHMETAFILE` records
    EnhMetafile(Vec<u8>),
    /// `CF_METAFILEPICT`
    Metafile(MetafilePict),
    /// `Shell IDList Array`
    ShellIdList(ShellIdList),
    /// Any other format, as raw bytes
    Bytes(Vec<u8>),
}

type ErrorHook = Box<dyn Fn(&ClipError) + Send + Sync>;

/// Read adapter over a native or in-process data object
pub struct ComDataObject<S: DataSource> {
    source: S,
    registry: Arc<FormatRegistry>,
    on_error: Option<ErrorHook>,
}

impl<S: DataSource> ComDataObject<S> {
    /// Wrap `source`, resolving format names through `registry`
    pub fn new(source: S, registry: Arc<FormatRegistry>) -> Self {
        Self {
            source,
            registry,
            on_error: None,
        }
    }

    /// Receive every extraction failure the getters swallow
    pub fn on_error(mut self, hook: impl Fn(&ClipError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    /// The wrapped source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Registry used for names and encodings
    pub fn registry(&self) -> &Arc<FormatRegistry> {
        &self.registry
    }

    /// Unwrap the source
    pub fn into_inner(self) -> S {
        self.source
    }

    fn report(&self, operation: &str, format: FormatId, err: &ClipError) {
        warn!(
            "{} failed for {}: {}",
            operation,
            self.registry.display_name(format),
            err
        );
        if let Some(hook) = &self.on_error {
            hook(err);
        }
    }

    /// Fetch and extract, mapping absence and failures to `None`
    fn extract<T>(
        &self,
        operation: &str,
        etc: &FormatEtc,
        f: impl FnOnce(StgMedium) -> ClipResult<T>,
    ) -> Option<T> {
        if !self.source.query_get_data(etc).is_ok() {
            return None;
        }
        let result = self.source.get_data(etc).and_then(f);
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.report(operation, etc.format, &e);
                None
            }
        }
    }

    // =========================================================================
    // Formats
    // =========================================================================

    /// Offers of the source
    ///
    /// With `all`, every tag in `1..=0xFFFF` is probed with `query_get_data`
    /// instead, which also finds formats the source can render but does not
    /// enumerate.
    pub fn formats(&self, all: bool) -> Vec<DataObjectFormat> {
        let offers = if all {
            (1..=FormatId::LAST)
                .map(|id| FormatEtc::new(FormatId(id)))
                .filter(|etc| self.source.query_get_data(etc).is_ok())
                .collect()
        } else {
            match self.source.enum_formats() {
                Ok(offers) => offers,
                Err(e) => {
                    self.report("EnumFormatEtc", FormatId(0), &e);
                    Vec::new()
                }
            }
        };

        offers
            .iter()
            .map(|etc| {
                let canonical = self.source.canonical_format(etc) == QueryStatus::SameFormatEtc;
                DataObjectFormat::from_format_etc(etc, canonical)
            })
            .collect()
    }

    /// Enumerated format tags
    pub fn format_ids(&self) -> Vec<FormatId> {
        self.formats(false).into_iter().map(|f| f.format).collect()
    }

    /// True if `format` is offered for the whole data
    pub fn data_present(&self, format: FormatId) -> bool {
        self.data_present_at(format, -1)
    }

    /// True if `format` is offered at item `index`
    pub fn data_present_at(&self, format: FormatId, index: i32) -> bool {
        self.source
            .query_get_data(&FormatEtc::new(format).with_index(index))
            .is_ok()
    }

    /// Canonical equivalent of `etc`
    pub fn canonical_format(&self, etc: &FormatEtc) -> QueryStatus {
        self.source.canonical_format(etc)
    }

    // =========================================================================
    // Strings
    // =========================================================================

    /// String stored under `format`, decoded with the format's encoding
    ///
    /// Fails with [`ClipError::InvalidArgument`] when `format` does not carry
    /// a string.
    pub fn get_string(&self, format: FormatId) -> ClipResult<Option<String>> {
        let encoding = self.registry.string_encoding(format).ok_or_else(|| {
            ClipError::InvalidArgument(format!(
                "{} has no string encoding",
                self.registry.display_name(format)
            ))
        })?;
        Ok(self.get_string_with(format, encoding))
    }

    /// String stored under `format`, decoded with an explicit encoding
    pub fn get_string_with(&self, format: FormatId, encoding: TextEncoding) -> Option<String> {
        self.extract("GetString", &FormatEtc::new(format).with_tymed(Tymed::HGlobal), |m| {
            m.string(encoding)
        })
    }

    /// Unicode text, falling back to `CF_TEXT`
    pub fn get_text(&self) -> Option<String> {
        self.get_string_with(FormatId::CF_UNICODETEXT, TextEncoding::Utf16)
            .or_else(|| self.get_string_with(FormatId::CF_TEXT, TextEncoding::Ansi))
    }

    /// `HTML Format` with its header decoded
    pub fn get_html(&self) -> Option<HtmlFormat> {
        let format = self.registry.known(KnownFormat::Html);
        let text = self.get_string_with(format, TextEncoding::Utf8)?;
        match HtmlFormat::parse(&text) {
            Ok(html) => Some(html),
            Err(e) => {
                self.report("GetHtml", format, &e);
                None
            }
        }
    }

    // =========================================================================
    // Bytes and records
    // =========================================================================

    /// Raw bytes of any byte-carrying medium
    pub fn get_bytes(&self, format: FormatId, index: i32) -> Option<Vec<u8>> {
        self.extract("GetBytes", &FormatEtc::new(format).with_index(index), |m| m.bytes())
    }

    /// Readable copy of a global memory, stream or metafile payload
    pub fn get_stream(&self, format: FormatId, index: i32) -> Option<Cursor<Vec<u8>>> {
        self.get_bytes(format, index).map(Cursor::new)
    }

    /// Fixed-size record at the start of a global memory block
    pub fn read_record<T: Record>(&self, format: FormatId) -> Option<T> {
        self.extract("ReadHGlobal", &FormatEtc::new(format).with_tymed(Tymed::HGlobal), |m| {
            m.read_record::<T>()
        })
    }

    /// `Preferred DropEffect`
    pub fn get_drop_effect(&self) -> Option<BitFlags<DropEffect>> {
        self.read_record(self.registry.known(KnownFormat::PreferredDropEffect))
    }

    /// Locale identifier from `CF_LOCALE`
    pub fn get_locale(&self) -> Option<u32> {
        self.read_record(FormatId::CF_LOCALE)
    }

    // =========================================================================
    // Files
    // =========================================================================

    /// Paths from `CF_HDROP`
    pub fn get_file_drop_list(&self) -> Option<Vec<PathBuf>> {
        self.extract("GetFileDropList", &FormatEtc::new(FormatId::CF_HDROP), |m| {
            Ok(m.drop_files()?.files)
        })
    }

    /// Descriptors from `FileGroupDescriptorW`
    pub fn get_file_descriptors(&self) -> Option<Vec<FileDescriptor>> {
        let format = self.registry.known(KnownFormat::FileDescriptorW);
        self.extract("GetFileDescriptors", &FormatEtc::new(format), |m| m.file_descriptors())
    }

    /// Contents of virtual file `index`
    pub fn get_file_content(&self, index: i32) -> Option<Cursor<Vec<u8>>> {
        self.get_stream(self.registry.known(KnownFormat::FileContents), index)
    }

    /// Every virtual file paired with its contents
    ///
    /// Files whose contents cannot be fetched are left out.
    pub fn get_file_contents(&self) -> Option<Vec<(FileDescriptor, Cursor<Vec<u8>>)>> {
        let descriptors = self.get_file_descriptors()?;
        Some(
            descriptors
                .into_iter()
                .enumerate()
                .filter_map(|(i, d)| self.get_file_content(i as i32).map(|c| (d, c)))
                .collect(),
        )
    }

    /// Parent folder and items from `Shell IDList Array`
    pub fn get_shell_id_list(&self) -> Option<ShellIdList> {
        let format = self.registry.known(KnownFormat::ShellIdList);
        self.extract("GetShellIdList", &FormatEtc::new(format), |m| m.shell_id_list())
    }

    // =========================================================================
    // Pictures
    // =========================================================================

    /// `CF_METAFILEPICT`
    pub fn get_metafile(&self) -> Option<MetafilePict> {
        let etc = FormatEtc::new(FormatId::CF_METAFILEPICT).with_tymed(Tymed::MfPict);
        self.extract("GetMetafile", &etc, |m| match m {
            StgMedium::MetafilePict(pict) => Ok(pict),
            other => Err(ClipError::InvalidMedium {
                expected: Tymed::MfPict,
                actual: other.tymed(),
            }),
        })
    }

    /// `CF_ENHMETAFILE` records
    pub fn get_enhanced_metafile(&self) -> Option<Vec<u8>> {
        let etc = FormatEtc::new(FormatId::CF_ENHMETAFILE).with_tymed(Tymed::EnhMf);
        self.extract("GetEnhancedMetafile", &etc, |m| match m {
            StgMedium::EnhMetafile(emf) => emf.bits(),
            other => Err(ClipError::InvalidMedium {
                expected: Tymed::EnhMf,
                actual: other.tymed(),
            }),
        })
    }

    /// Image from `CF_BITMAP` or `CF_DIB`
    pub fn get_bitmap(&self, mode: BitmapMode) -> Option<RgbaImage> {
        match mode {
            BitmapMode::Normal | BitmapMode::Bitmap => {
                let alpha = if mode == BitmapMode::Normal {
                    AlphaMode::Ignore
                } else {
                    AlphaMode::Premultiplied
                };
                let etc = FormatEtc::new(FormatId::CF_BITMAP).with_tymed(Tymed::Gdi);
                self.extract("GetBitmap", &etc, |m| m.bitmap()?.to_image(alpha))
            }
            BitmapMode::Dib => {
                let etc = FormatEtc::new(FormatId::CF_DIB).with_tymed(Tymed::HGlobal);
                self.extract("GetBitmap", &etc, |m| {
                    let lock = m.hglobal()?.lock()?;
                    dib::decode_dib(&lock)
                })
            }
        }
    }

    /// Best available image, keeping transparency where the source has it
    ///
    /// Tries PNG streams first, then the first dropped file, then the
    /// bitmap formats that are offered, then both bitmap modes regardless.
    pub fn get_transparent_bitmap(&self) -> Option<RgbaImage> {
        let offered = self.format_ids();
        let png = [
            self.registry.known(KnownFormat::Png),
            self.registry.known(KnownFormat::PngMime),
        ];

        for format in png {
            if offered.contains(&format) {
                if let Some(image) = self.decode_image_stream(format) {
                    return Some(image);
                }
            }
        }

        if offered.contains(&FormatId::CF_HDROP) {
            if let Some(path) = self.get_file_drop_list().and_then(|files| files.into_iter().next()) {
                match image::open(&path) {
                    Ok(image) => return Some(image.to_rgba8()),
                    Err(e) => self.report("GetTransparentBitmap", FormatId::CF_HDROP, &ClipError::from(e)),
                }
            }
        }

        if offered.contains(&FormatId::CF_BITMAP) {
            if let Some(image) = self.get_bitmap(BitmapMode::Bitmap) {
                return Some(image);
            }
        }
        if offered.contains(&FormatId::CF_DIB) {
            if let Some(image) = self.get_bitmap(BitmapMode::Dib) {
                return Some(image);
            }
        }

        debug!("No offered image format decoded, probing bitmap formats");
        self.get_bitmap(BitmapMode::Bitmap)
            .or_else(|| self.get_bitmap(BitmapMode::Dib))
    }

    fn decode_image_stream(&self, format: FormatId) -> Option<RgbaImage> {
        let bytes = self.get_bytes(format, -1)?;
        match image::load_from_memory(&bytes) {
            Ok(image) => Some(image.to_rgba8()),
            Err(e) => {
                self.report("GetTransparentBitmap", format, &ClipError::from(e));
                None
            }
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Fetch `format` as the value its kind suggests
    pub fn get_data(&self, format: FormatId) -> Option<ClipData> {
        if let Some(encoding) = self.registry.string_encoding(format) {
            let text = self.get_string_with(format, encoding)?;
            return Some(match self.registry.known_format(format) {
                Some(KnownFormat::FileNameA | KnownFormat::FileNameW) => {
                    ClipData::FileList(vec![PathBuf::from(text)])
                }
                _ => ClipData::Text(text),
            });
        }

        match (format, self.registry.known_format(format)) {
            (_, Some(KnownFormat::PreferredDropEffect)) => self.get_drop_effect().map(ClipData::DropEffect),
            (_, Some(KnownFormat::FileDescriptorW)) => {
                self.get_file_descriptors().map(ClipData::FileDescriptors)
            }
            (_, Some(KnownFormat::ShellIdList)) => self.get_shell_id_list().map(ClipData::ShellIdList),
            (FormatId::CF_HDROP, _) => self.get_file_drop_list().map(ClipData::FileList),
            (FormatId::CF_BITMAP, _) => self.get_bitmap(BitmapMode::Normal).map(ClipData::Image),
            (FormatId::CF_ENHMETAFILE, _) => self.get_enhanced_metafile().map(ClipData::EnhMetafile),
            (FormatId::CF_METAFILEPICT, _) => self.get_metafile().map(ClipData::Metafile),
            _ => self.get_bytes(format, -1).map(ClipData::Bytes),
        }
    }

    /// Writing through the reader is not supported
    pub fn set_data(&self, _format: FormatId, _data: ClipData) -> ClipResult<()> {
        Err(ClipError::NotImplemented("SetData on a read adapter"))
    }
}
