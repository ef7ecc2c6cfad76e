//! Transfer media and format descriptors.
//!
//! [`FormatEtc`] names what a consumer asks for; [`StgMedium`] is what it gets
//! back. Each medium variant owns its OS resource and releases it on drop, so
//! a medium that is dropped on an error path never leaks.

use std::path::PathBuf;

use enumflags2::{bitflags, BitFlags};

use crate::codec::{DropFiles, FileDescriptor, Record, ShellIdList, TextEncoding};
use crate::format::FormatId;
use crate::sys::{DeviceBitmap, EnhMetafile, GlobalMemory, Metafile};
use crate::{ClipError, ClipResult};

// =============================================================================
// Descriptors
// =============================================================================

/// Medium kinds a format can travel in (`TYMED_*`)
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tymed {
    /// Global memory block
    HGlobal = 0x01,
    /// File on disk
    File = 0x02,
    /// COM stream
    IStream = 0x04,
    /// Structured storage
    IStorage = 0x08,
    /// GDI bitmap handle
    Gdi = 0x10,
    /// Windows metafile picture
    MfPict = 0x20,
    /// Enhanced metafile handle
    EnhMf = 0x40,
}

/// Rendering aspect of a format (`DVASPECT_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Aspect {
    /// Full content
    Content = 1,
    /// Thumbnail
    Thumbnail = 2,
    /// Icon
    Icon = 4,
    /// Print preview
    DocPrint = 8,
}

impl Aspect {
    /// Decode a raw `DVASPECT` value
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::Content),
            2 => Some(Self::Thumbnail),
            4 => Some(Self::Icon),
            8 => Some(Self::DocPrint),
            _ => None,
        }
    }
}

/// Drop effects carried by the shell's DROPEFFECT formats
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropEffect {
    /// Copy
    Copy = 0x1,
    /// Move
    Move = 0x2,
    /// Link
    Link = 0x4,
    /// Scrolling is occurring in the target
    Scroll = 0x8000_0000,
}

/// Format request or offer (`FORMATETC`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatEtc {
    /// Format tag
    pub format: FormatId,
    /// Aspect
    pub aspect: Aspect,
    /// Item index, -1 for the whole data
    pub index: i32,
    /// Acceptable media
    pub tymed: BitFlags<Tymed>,
}

impl FormatEtc {
    /// Content aspect, index -1, any medium
    pub fn new(format: FormatId) -> Self {
        Self {
            format,
            aspect: Aspect::Content,
            index: -1,
            tymed: BitFlags::all(),
        }
    }

    /// Same request for a specific item index
    pub fn with_index(mut self, index: i32) -> Self {
        self.index = index;
        self
    }

    /// Same request restricted to `tymed`
    pub fn with_tymed(mut self, tymed: impl Into<BitFlags<Tymed>>) -> Self {
        self.tymed = tymed.into();
        self
    }

    /// Same request for another aspect
    pub fn with_aspect(mut self, aspect: Aspect) -> Self {
        self.aspect = aspect;
        self
    }

    /// Medium kind a producer advertises for `format` when enumerating
    pub fn advertised_tymed(format: FormatId) -> Tymed {
        match format {
            FormatId::CF_BITMAP => Tymed::Gdi,
            FormatId::CF_ENHMETAFILE => Tymed::EnhMf,
            FormatId::CF_METAFILEPICT => Tymed::MfPict,
            _ => Tymed::HGlobal,
        }
    }
}

/// One offer made by a data source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataObjectFormat {
    /// Format tag
    pub format: FormatId,
    /// Aspect
    pub aspect: Aspect,
    /// Item index
    pub index: i32,
    /// Media the format is offered in
    pub tymed: BitFlags<Tymed>,
    /// True when the offer is already in canonical form
    pub canonical: bool,
}

impl DataObjectFormat {
    /// Build an offer from an enumerated descriptor
    pub fn from_format_etc(etc: &FormatEtc, canonical: bool) -> Self {
        Self {
            format: etc.format,
            aspect: etc.aspect,
            index: etc.index,
            tymed: etc.tymed,
            canonical,
        }
    }

    /// True when the source reports this offer as its own canonical form
    pub fn is_canonical(&self) -> bool {
        self.canonical
    }

    /// True if the offer can travel in `tymed`
    pub fn supports(&self, tymed: Tymed) -> bool {
        self.tymed.contains(tymed)
    }

    /// Descriptor requesting exactly this offer
    pub fn format_etc(&self) -> FormatEtc {
        FormatEtc {
            format: self.format,
            aspect: self.aspect,
            index: self.index,
            tymed: self.tymed,
        }
    }
}

/// Outcome of a capability query (`QueryGetData`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// The request can be served
    Ok,
    /// Null format; nothing to serve (`S_FALSE`)
    NoData,
    /// Format not offered at that index (`DV_E_FORMATETC`)
    InvalidFormat,
    /// None of the requested media can be produced (`DV_E_TYMED`)
    InvalidTymed,
    /// Aspect other than content (`DV_E_DVASPECT`)
    InvalidAspect,
    /// Canonical form equals the request (`DATA_S_SAMEFORMATETC`)
    SameFormatEtc,
}

impl QueryStatus {
    /// True if data can be fetched
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Equivalent `HRESULT`
    pub const fn hresult(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::NoData => 1,
            Self::InvalidFormat => 0x8004_0064_u32 as i32,
            Self::InvalidTymed => 0x8004_0069_u32 as i32,
            Self::InvalidAspect => 0x8004_006B_u32 as i32,
            Self::SameFormatEtc => 0x0004_0130,
        }
    }

    /// Decode an `HRESULT` returned by a native source
    pub fn from_hresult(hr: i32) -> Self {
        match hr as u32 {
            0 => Self::Ok,
            1 => Self::NoData,
            0x8004_0069 => Self::InvalidTymed,
            0x8004_006B => Self::InvalidAspect,
            0x0004_0130 => Self::SameFormatEtc,
            _ => Self::InvalidFormat,
        }
    }

    /// Error equivalent for a failed query
    pub fn into_error(self, etc: &FormatEtc) -> Option<ClipError> {
        match self {
            Self::Ok | Self::SameFormatEtc => None,
            Self::NoData | Self::InvalidFormat => Some(ClipError::FormatUnavailable {
                format: etc.format,
                index: etc.index,
            }),
            Self::InvalidTymed => Some(ClipError::UnsupportedMedium(etc.tymed)),
            Self::InvalidAspect => Some(ClipError::UnsupportedAspect(etc.aspect)),
        }
    }
}

// =============================================================================
// Transfer Medium
// =============================================================================

/// Windows metafile picture (`METAFILEPICT`)
#[derive(Debug)]
pub struct MetafilePict {
    /// Mapping mode (`MM_*`)
    pub mapping_mode: i32,
    /// Picture width
    pub x_ext: i32,
    /// Picture height
    pub y_ext: i32,
    /// Metafile records
    pub metafile: Metafile,
}

impl MetafilePict {
    /// Deep copy
    pub fn try_clone(&self) -> ClipResult<Self> {
        Ok(Self {
            mapping_mode: self.mapping_mode,
            x_ext: self.x_ext,
            y_ext: self.y_ext,
            metafile: self.metafile.try_clone()?,
        })
    }
}

/// Transfer medium (`STGMEDIUM`), one variant per medium kind
#[derive(Debug)]
pub enum StgMedium {
    /// No medium
    Null,
    /// Global memory block
    HGlobal(GlobalMemory),
    /// File path
    File(PathBuf),
    /// Stream contents
    Stream(Vec<u8>),
    /// Structured storage contents
    Storage(Vec<u8>),
    /// GDI bitmap
    Gdi(DeviceBitmap),
    /// Windows metafile picture
    MetafilePict(MetafilePict),
    /// Enhanced metafile
    EnhMetafile(EnhMetafile),
}

impl StgMedium {
    /// Medium kind, `None` for [`StgMedium::Null`]
    pub fn tymed(&self) -> Option<Tymed> {
        match self {
            Self::Null => None,
            Self::HGlobal(_) => Some(Tymed::HGlobal),
            Self::File(_) => Some(Tymed::File),
            Self::Stream(_) => Some(Tymed::IStream),
            Self::Storage(_) => Some(Tymed::IStorage),
            Self::Gdi(_) => Some(Tymed::Gdi),
            Self::MetafilePict(_) => Some(Tymed::MfPict),
            Self::EnhMetafile(_) => Some(Tymed::EnhMf),
        }
    }

    /// Independent copy of the medium and its resource
    pub fn try_clone(&self) -> ClipResult<Self> {
        Ok(match self {
            Self::Null => Self::Null,
            Self::HGlobal(m) => Self::HGlobal(m.try_clone()?),
            Self::File(p) => Self::File(p.clone()),
            Self::Stream(b) => Self::Stream(b.clone()),
            Self::Storage(b) => Self::Storage(b.clone()),
            Self::Gdi(b) => Self::Gdi(b.try_clone()?),
            Self::MetafilePict(m) => Self::MetafilePict(m.try_clone()?),
            Self::EnhMetafile(m) => Self::EnhMetafile(m.try_clone()?),
        })
    }

    fn invalid(&self, expected: Tymed) -> ClipError {
        ClipError::InvalidMedium {
            expected,
            actual: self.tymed(),
        }
    }

    /// The global memory block, or [`ClipError::InvalidMedium`]
    pub fn hglobal(&self) -> ClipResult<&GlobalMemory> {
        match self {
            Self::HGlobal(m) => Ok(m),
            _ => Err(self.invalid(Tymed::HGlobal)),
        }
    }

    /// The GDI bitmap, or [`ClipError::InvalidMedium`]
    pub fn bitmap(&self) -> ClipResult<&DeviceBitmap> {
        match self {
            Self::Gdi(b) => Ok(b),
            _ => Err(self.invalid(Tymed::Gdi)),
        }
    }

    /// Raw payload bytes of any byte-carrying medium
    pub fn bytes(&self) -> ClipResult<Vec<u8>> {
        match self {
            Self::HGlobal(m) => m.to_vec(),
            Self::Stream(b) | Self::Storage(b) => Ok(b.clone()),
            Self::File(p) => Ok(std::fs::read(p)?),
            Self::EnhMetafile(m) => m.bits(),
            Self::MetafilePict(m) => m.metafile.bits(),
            Self::Null | Self::Gdi(_) => Err(self.invalid(Tymed::HGlobal)),
        }
    }

    /// Decode a string stored in global memory
    pub fn string(&self, encoding: TextEncoding) -> ClipResult<String> {
        let lock = self.hglobal()?.lock()?;
        Ok(crate::codec::decode_string(&lock, encoding))
    }

    /// Reinterpret the start of a global memory block as a fixed record
    pub fn read_record<T: Record>(&self) -> ClipResult<T> {
        let lock = self.hglobal()?.lock()?;
        T::read(&lock)
    }

    /// Decode a DROPFILES block
    pub fn drop_files(&self) -> ClipResult<DropFiles> {
        let lock = self.hglobal()?.lock()?;
        DropFiles::parse(&lock)
    }

    /// Decode a FILEGROUPDESCRIPTORW block
    pub fn file_descriptors(&self) -> ClipResult<Vec<FileDescriptor>> {
        let lock = self.hglobal()?.lock()?;
        FileDescriptor::parse_group(&lock)
    }

    /// Decode a CIDA block
    pub fn shell_id_list(&self) -> ClipResult<ShellIdList> {
        let lock = self.hglobal()?.lock()?;
        ShellIdList::parse(&lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_etc_defaults() {
        let etc = FormatEtc::new(FormatId::CF_TEXT);
        assert_eq!(etc.aspect, Aspect::Content);
        assert_eq!(etc.index, -1);
        assert!(etc.tymed.contains(Tymed::HGlobal | Tymed::Gdi | Tymed::EnhMf));

        let etc = etc.with_index(3).with_tymed(Tymed::IStream);
        assert_eq!(etc.index, 3);
        assert_eq!(etc.tymed, Tymed::IStream);
    }

    #[test]
    fn test_advertised_tymed() {
        assert_eq!(FormatEtc::advertised_tymed(FormatId::CF_BITMAP), Tymed::Gdi);
        assert_eq!(FormatEtc::advertised_tymed(FormatId::CF_ENHMETAFILE), Tymed::EnhMf);
        assert_eq!(FormatEtc::advertised_tymed(FormatId::CF_METAFILEPICT), Tymed::MfPict);
        assert_eq!(FormatEtc::advertised_tymed(FormatId::CF_DIB), Tymed::HGlobal);
    }

    #[test]
    fn test_query_status_hresults() {
        assert_eq!(QueryStatus::InvalidFormat.hresult() as u32, 0x8004_0064);
        assert_eq!(QueryStatus::from_hresult(0x8004_0069_u32 as i32), QueryStatus::InvalidTymed);
        assert_eq!(QueryStatus::from_hresult(0), QueryStatus::Ok);
        assert!(QueryStatus::Ok.is_ok());
        assert!(!QueryStatus::NoData.is_ok());
    }

    #[test]
    fn test_wrong_medium_is_invalid() {
        let medium = StgMedium::Stream(vec![1, 2, 3]);
        let err = medium.hglobal().unwrap_err();
        assert!(matches!(
            err,
            ClipError::InvalidMedium {
                expected: Tymed::HGlobal,
                actual: Some(Tymed::IStream)
            }
        ));
        assert_eq!(medium.bytes().unwrap(), vec![1, 2, 3]);
        assert!(StgMedium::Null.bytes().is_err());
    }

    #[test]
    fn test_clone_is_independent() {
        let mut medium = StgMedium::HGlobal(GlobalMemory::from_bytes(b"abc").unwrap());
        let copy = medium.try_clone().unwrap();
        if let StgMedium::HGlobal(memory) = &mut medium {
            memory.lock_mut().unwrap()[0] = b'x';
        }
        assert_eq!(medium.bytes().unwrap(), b"xbc");
        drop(medium);
        assert_eq!(copy.bytes().unwrap(), b"abc");
    }
}
