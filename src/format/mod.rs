//! Clipboard format identifiers.
//!
//! A clipboard format is a 16-bit tag. Values below `0xC000` are the
//! predefined `CF_*` formats; values in `0xC000..=0xFFFF` are assigned by the
//! OS when an application registers a format by name. This module holds the
//! predefined constants, the set of registered names the library knows how
//! to marshal ([`KnownFormat`]), and the [`FormatRegistry`] that maps between
//! tags and names.

mod registry;

use std::fmt;

pub use registry::{FormatBackend, FormatRegistry, InMemoryFormats};

// =============================================================================
// Format Identifier
// =============================================================================

/// Numeric clipboard format tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormatId(pub u32);

impl FormatId {
    /// ANSI text
    pub const CF_TEXT: Self = Self(1);
    /// Device-dependent bitmap handle (HBITMAP)
    pub const CF_BITMAP: Self = Self(2);
    /// Windows metafile picture (METAFILEPICT)
    pub const CF_METAFILEPICT: Self = Self(3);
    /// Microsoft Symbolic Link format
    pub const CF_SYLK: Self = Self(4);
    /// Software Arts' Data Interchange Format
    pub const CF_DIF: Self = Self(5);
    /// Tagged-image file format
    pub const CF_TIFF: Self = Self(6);
    /// OEM character set text
    pub const CF_OEMTEXT: Self = Self(7);
    /// Packed device-independent bitmap (BITMAPINFO + bits)
    pub const CF_DIB: Self = Self(8);
    /// Color palette handle
    pub const CF_PALETTE: Self = Self(9);
    /// Pen computing extension data
    pub const CF_PENDATA: Self = Self(10);
    /// RIFF audio
    pub const CF_RIFF: Self = Self(11);
    /// Standard wave audio
    pub const CF_WAVE: Self = Self(12);
    /// UTF-16LE text
    pub const CF_UNICODETEXT: Self = Self(13);
    /// Enhanced metafile handle
    pub const CF_ENHMETAFILE: Self = Self(14);
    /// File drop list (DROPFILES)
    pub const CF_HDROP: Self = Self(15);
    /// Locale identifier for text on the clipboard
    pub const CF_LOCALE: Self = Self(16);
    /// Packed DIB with a BITMAPV5HEADER
    pub const CF_DIBV5: Self = Self(17);
    /// Owner-display format
    pub const CF_OWNERDISPLAY: Self = Self(0x0080);
    /// Private text display format
    pub const CF_DSPTEXT: Self = Self(0x0081);
    /// Private bitmap display format
    pub const CF_DSPBITMAP: Self = Self(0x0082);
    /// Private metafile-picture display format
    pub const CF_DSPMETAFILEPICT: Self = Self(0x0083);
    /// Private enhanced-metafile display format
    pub const CF_DSPENHMETAFILE: Self = Self(0x008E);

    /// First tag handed out for registered formats
    pub const FIRST_REGISTERED: u32 = 0xC000;
    /// Last valid format tag
    pub const LAST: u32 = 0xFFFF;

    /// Returns the raw tag
    pub const fn id(self) -> u32 {
        self.0
    }

    /// True for tags assigned by name registration
    pub const fn is_registered(self) -> bool {
        self.0 >= Self::FIRST_REGISTERED && self.0 <= Self::LAST
    }

    /// True for the predefined `CF_*` tags
    pub fn is_standard(self) -> bool {
        standard_entry(self).is_some()
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FormatId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Predefined format: tag, constant name, display name
pub(crate) struct StandardFormat {
    pub(crate) id: FormatId,
    pub(crate) constant: &'static str,
    pub(crate) display: Option<&'static str>,
}

pub(crate) const STANDARD_FORMATS: &[StandardFormat] = &[
    std_format(FormatId::CF_TEXT, "CF_TEXT", Some("Text")),
    std_format(FormatId::CF_BITMAP, "CF_BITMAP", Some("Bitmap")),
    std_format(FormatId::CF_METAFILEPICT, "CF_METAFILEPICT", Some("MetaFilePict")),
    std_format(FormatId::CF_SYLK, "CF_SYLK", Some("SymbolicLink")),
    std_format(FormatId::CF_DIF, "CF_DIF", Some("DataInterchangeFormat")),
    std_format(FormatId::CF_TIFF, "CF_TIFF", Some("TaggedImageFileFormat")),
    std_format(FormatId::CF_OEMTEXT, "CF_OEMTEXT", Some("OEMText")),
    std_format(FormatId::CF_DIB, "CF_DIB", Some("DeviceIndependentBitmap")),
    std_format(FormatId::CF_PALETTE, "CF_PALETTE", Some("Palette")),
    std_format(FormatId::CF_PENDATA, "CF_PENDATA", Some("PenData")),
    std_format(FormatId::CF_RIFF, "CF_RIFF", Some("RiffAudio")),
    std_format(FormatId::CF_WAVE, "CF_WAVE", Some("WaveAudio")),
    std_format(FormatId::CF_UNICODETEXT, "CF_UNICODETEXT", Some("UnicodeText")),
    std_format(FormatId::CF_ENHMETAFILE, "CF_ENHMETAFILE", Some("EnhancedMetafile")),
    std_format(FormatId::CF_HDROP, "CF_HDROP", Some("FileDrop")),
    std_format(FormatId::CF_LOCALE, "CF_LOCALE", Some("Locale")),
    std_format(FormatId::CF_DIBV5, "CF_DIBV5", None),
    std_format(FormatId::CF_OWNERDISPLAY, "CF_OWNERDISPLAY", None),
    std_format(FormatId::CF_DSPTEXT, "CF_DSPTEXT", None),
    std_format(FormatId::CF_DSPBITMAP, "CF_DSPBITMAP", None),
    std_format(FormatId::CF_DSPMETAFILEPICT, "CF_DSPMETAFILEPICT", None),
    std_format(FormatId::CF_DSPENHMETAFILE, "CF_DSPENHMETAFILE", None),
];

const fn std_format(id: FormatId, constant: &'static str, display: Option<&'static str>) -> StandardFormat {
    StandardFormat { id, constant, display }
}

pub(crate) fn standard_entry(id: FormatId) -> Option<&'static StandardFormat> {
    STANDARD_FORMATS.iter().find(|f| f.id == id)
}

// =============================================================================
// Registered Formats
// =============================================================================

macro_rules! known_formats {
    ($( $(#[$doc:meta])* $variant:ident => $native:literal, $constant:expr; )*) => {
        /// Registered clipboard formats the library marshals by name
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum KnownFormat {
            $( $(#[$doc])* $variant, )*
        }

        impl KnownFormat {
            /// Every known format, in registration order
            pub const ALL: &'static [KnownFormat] = &[$(KnownFormat::$variant),*];

            /// Name registered with the OS
            pub const fn native_name(self) -> &'static str {
                match self {
                    $(KnownFormat::$variant => $native,)*
                }
            }

            /// Shell header constant naming this format, if any
            pub const fn constant_name(self) -> Option<&'static str> {
                match self {
                    $(KnownFormat::$variant => $constant,)*
                }
            }
        }
    };
}

known_formats! {
    /// Shell item ID list array (CIDA)
    ShellIdList => "Shell IDList Array", Some("CFSTR_SHELLIDLIST");
    /// Icon positions for a shell ID list
    ShellIdListOffset => "Shell Object Offsets", Some("CFSTR_SHELLIDLISTOFFSET");
    /// NRESARRAY of network resources
    NetResources => "Net Resource", Some("CFSTR_NETRESOURCES");
    /// ANSI file group descriptor
    FileDescriptorA => "FileGroupDescriptor", Some("CFSTR_FILEDESCRIPTORA");
    /// Unicode file group descriptor
    FileDescriptorW => "FileGroupDescriptorW", Some("CFSTR_FILEDESCRIPTORW");
    /// Contents of one file in a file group, selected by index
    FileContents => "FileContents", Some("CFSTR_FILECONTENTS");
    /// Single ANSI file name
    FileNameA => "FileName", Some("CFSTR_FILENAMEA");
    /// Single Unicode file name
    FileNameW => "FileNameW", Some("CFSTR_FILENAMEW");
    /// Printer friendly name
    PrinterGroup => "PrinterFriendlyName", Some("CFSTR_PRINTERGROUP");
    /// ANSI rename map for a file drop
    FileNameMapA => "FileNameMap", Some("CFSTR_FILENAMEMAPA");
    /// Unicode rename map for a file drop
    FileNameMapW => "FileNameMapW", Some("CFSTR_FILENAMEMAPW");
    /// ANSI URL
    ShellUrl => "UniformResourceLocator", Some("CFSTR_SHELLURL");
    /// Unicode URL
    InetUrlW => "UniformResourceLocatorW", Some("CFSTR_INETURLW");
    /// DROPEFFECT the source prefers
    PreferredDropEffect => "Preferred DropEffect", Some("CFSTR_PREFERREDDROPEFFECT");
    /// DROPEFFECT the target performed
    PerformedDropEffect => "Performed DropEffect", Some("CFSTR_PERFORMEDDROPEFFECT");
    /// DROPEFFECT reported after a paste
    PasteSucceeded => "Paste Succeeded", Some("CFSTR_PASTESUCCEEDED");
    /// Set while the shell runs a drag loop
    InDragLoop => "InShellDragLoop", Some("CFSTR_INDRAGLOOP");
    /// Mounted volume path
    MountedVolume => "MountedVolume", Some("CFSTR_MOUNTEDVOLUME");
    /// Data object persisted by the shell
    PersistedDataObject => "PersistedDataObject", Some("CFSTR_PERSISTEDDATAOBJECT");
    /// CLSID of the drop target
    TargetClsid => "TargetCLSID", Some("CFSTR_TARGETCLSID");
    /// DROPEFFECT before optimized moves are resolved
    LogicalPerformedDropEffect => "Logical Performed DropEffect", Some("CFSTR_LOGICALPERFORMEDDROPEFFECT");
    /// Autoplay enumerated ID list array
    AutoplayShellIdLists => "Autoplay Enumerated IDList Array", Some("CFSTR_AUTOPLAY_SHELLIDLISTS");
    /// Marks data from an untrusted source
    UntrustedDragDrop => "UntrustedDragDrop", Some("CFSTR_UNTRUSTEDDRAGDROP");
    /// FILE_ATTRIBUTES_ARRAY
    FileAttributesArray => "File Attributes Array", Some("CFSTR_FILE_ATTRIBUTES_ARRAY");
    /// Parameters for an invoked drop command
    InvokeCommandDropParam => "InvokeCommand DropParam", Some("CFSTR_INVOKECOMMAND_DROPPARAM");
    /// CLSID of the shell drop handler
    ShellDropHandler => "DropHandlerCLSID", Some("CFSTR_SHELLDROPHANDLER");
    /// DROPDESCRIPTION shown during drag
    DropDescription => "DropDescription", Some("CFSTR_DROPDESCRIPTION");
    /// Security zone of the data's origin
    ZoneIdentifier => "ZoneIdentifier", Some("CFSTR_ZONEIDENTIFIER");
    /// XAML markup
    Xaml => "Xaml", None;
    /// XAML package
    XamlPackage => "XamlPackage", None;
    /// Serialized application trust
    ApplicationTrust => "ApplicationTrust", None;
    /// CF_HTML fragment
    Html => "HTML Format", None;
    /// Rich Text Format
    Rtf => "Rich Text Format", None;
    /// Comma-separated values
    Csv => "CSV", None;
    /// Serialized object
    Serializable => "PersistentObject", None;
    /// PNG image stream
    Png => "PNG", None;
    /// PNG image stream (MIME name)
    PngMime => "image/png", None;
    /// JPEG image stream
    Jfif => "JFIF", None;
    /// JPEG image stream (MIME name)
    JpegMime => "image/jpeg", None;
    /// GIF image stream
    Gif => "GIF", None;
    /// GIF image stream (MIME name)
    GifMime => "image/gif", None;
}

/// Constant aliases that share a registered name with another format
pub(crate) const CONSTANT_ALIASES: &[(&str, KnownFormat)] = &[("CFSTR_INETURLA", KnownFormat::ShellUrl)];

/// Display names for registered formats
pub(crate) const KNOWN_DISPLAY_NAMES: &[(&str, KnownFormat)] = &[
    ("Html", KnownFormat::Html),
    ("Rtf", KnownFormat::Rtf),
    ("CommaSeparatedValue", KnownFormat::Csv),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_tags() {
        assert_eq!(FormatId::CF_UNICODETEXT.id(), 13);
        assert_eq!(FormatId::CF_HDROP.id(), 15);
        assert!(FormatId::CF_DSPENHMETAFILE.is_standard());
        assert!(!FormatId(0xC123).is_standard());
        assert!(FormatId(0xC123).is_registered());
        assert!(!FormatId::CF_TEXT.is_registered());
    }

    #[test]
    fn test_known_format_names() {
        assert_eq!(KnownFormat::ShellIdList.native_name(), "Shell IDList Array");
        assert_eq!(KnownFormat::ShellIdList.constant_name(), Some("CFSTR_SHELLIDLIST"));
        assert_eq!(KnownFormat::Html.native_name(), "HTML Format");
        assert_eq!(KnownFormat::Html.constant_name(), None);
        assert_eq!(KnownFormat::ALL.len(), 41);
    }
}
