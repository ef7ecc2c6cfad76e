//! Tag ↔ name registry for clipboard formats.

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use super::{
    standard_entry, FormatId, KnownFormat, CONSTANT_ALIASES, KNOWN_DISPLAY_NAMES, STANDARD_FORMATS,
};
use crate::codec::TextEncoding;
use crate::{ClipError, ClipResult};

/// OS facility that assigns tags to format names
///
/// Registration is case-insensitive and idempotent: registering the same name
/// twice yields the same tag.
pub trait FormatBackend: Send + Sync {
    /// Registers `name` (or looks up its existing registration)
    fn register(&self, name: &str) -> ClipResult<FormatId>;

    /// Returns the registered name of `id`, if the OS knows it
    fn lookup_name(&self, id: FormatId) -> Option<String>;
}

/// Process-local format backend
///
/// Assigns tags from `0xC000` upward. Used off Windows and in tests.
#[derive(Debug, Default)]
pub struct InMemoryFormats {
    names: Mutex<Vec<String>>,
}

impl InMemoryFormats {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }
}

impl FormatBackend for InMemoryFormats {
    fn register(&self, name: &str) -> ClipResult<FormatId> {
        let mut names = self.names.lock();
        if let Some(pos) = names.iter().position(|n| n.eq_ignore_ascii_case(name)) {
            return Ok(FormatId(FormatId::FIRST_REGISTERED + pos as u32));
        }

        let id = FormatId::FIRST_REGISTERED + names.len() as u32;
        if id > FormatId::LAST {
            return Err(ClipError::Registration {
                name: name.to_string(),
                reason: "format table is full".to_string(),
            });
        }
        names.push(name.to_string());
        Ok(FormatId(id))
    }

    fn lookup_name(&self, id: FormatId) -> Option<String> {
        let index = id.0.checked_sub(FormatId::FIRST_REGISTERED)? as usize;
        self.names.lock().get(index).cloned()
    }
}

#[derive(Debug, Clone)]
struct Entry {
    native: String,
    constant: Option<&'static str>,
}

#[derive(Debug, Default)]
struct Cache {
    by_id: HashMap<FormatId, Entry>,
    by_name: HashMap<String, FormatId>,
}

impl Cache {
    fn insert(&mut self, id: FormatId, native: String, constant: Option<&'static str>) {
        self.by_name.insert(native.to_ascii_lowercase(), id);
        self.by_id.entry(id).or_insert(Entry { native, constant });
    }
}

/// Thread-safe mapping between format tags and names
///
/// Every [`KnownFormat`] is registered when the registry is built, so
/// [`FormatRegistry::known`] never touches the OS. Names registered later are
/// resolved once and cached for the registry's lifetime. Share it with
/// `Arc<FormatRegistry>`.
pub struct FormatRegistry {
    backend: Box<dyn FormatBackend>,
    known: Vec<FormatId>,
    cache: RwLock<Cache>,
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("known", &self.known.len())
            .field("cached", &self.cache.read().by_id.len())
            .finish()
    }
}

impl FormatRegistry {
    /// Build a registry, registering every [`KnownFormat`] with `backend`
    ///
    /// A failed registration is returned as [`ClipError::Registration`].
    pub fn new(backend: impl FormatBackend + 'static) -> ClipResult<Self> {
        let backend: Box<dyn FormatBackend> = Box::new(backend);
        let mut cache = Cache::default();
        let mut known = Vec::with_capacity(KnownFormat::ALL.len());

        for &format in KnownFormat::ALL {
            let id = backend.register(format.native_name()).map_err(|e| match e {
                ClipError::Registration { .. } => e,
                other => ClipError::Registration {
                    name: format.native_name().to_string(),
                    reason: other.to_string(),
                },
            })?;
            trace!(name = format.native_name(), id = id.0, "registered known format");
            cache.insert(id, format.native_name().to_string(), format.constant_name());
            known.push(id);
        }

        debug!(count = known.len(), "format registry initialized");

        Ok(Self {
            backend,
            known,
            cache: RwLock::new(cache),
        })
    }

    /// Registry backed by [`InMemoryFormats`]
    pub fn in_memory() -> ClipResult<Self> {
        Self::new(InMemoryFormats::new())
    }

    /// Registry backed by the OS format table
    #[cfg(windows)]
    pub fn system() -> ClipResult<Self> {
        Self::new(crate::platform::SystemFormats)
    }

    /// Registry for the current platform: the OS table on Windows, in-memory elsewhere
    pub fn native() -> ClipResult<Self> {
        #[cfg(windows)]
        {
            Self::system()
        }
        #[cfg(not(windows))]
        {
            Self::in_memory()
        }
    }

    /// Tag of a known format
    pub fn known(&self, format: KnownFormat) -> FormatId {
        self.known[format as usize]
    }

    /// Returns the known format behind `id`, if any
    pub fn known_format(&self, id: FormatId) -> Option<KnownFormat> {
        KnownFormat::ALL.iter().copied().find(|&k| self.known(k) == id)
    }

    /// True if `id` is the tag of `format`
    pub fn is(&self, id: FormatId, format: KnownFormat) -> bool {
        self.known(format) == id
    }

    /// Register a format by name, returning the existing tag if already registered
    pub fn register(&self, name: &str) -> ClipResult<FormatId> {
        if name.is_empty() {
            return Err(ClipError::InvalidArgument("empty format name".to_string()));
        }

        if let Some(&id) = self.cache.read().by_name.get(&name.to_ascii_lowercase()) {
            return Ok(id);
        }

        let id = self.backend.register(name)?;
        debug!(name, id = id.0, "registered clipboard format");
        self.cache.write().insert(id, name.to_string(), None);
        Ok(id)
    }

    /// Resolve a name to a tag
    ///
    /// Accepts, in order: `CF_*` / `CFSTR_*` constant names, display names
    /// (`"UnicodeText"`, `"FileDrop"`), `"Format{N}"`, and registered names.
    /// Unknown names are registered.
    pub fn id_of(&self, name: &str) -> ClipResult<FormatId> {
        if let Some(f) = STANDARD_FORMATS.iter().find(|f| f.constant == name) {
            return Ok(f.id);
        }
        if let Some(&k) = KnownFormat::ALL.iter().find(|k| k.constant_name() == Some(name)) {
            return Ok(self.known(k));
        }
        if let Some(&(_, k)) = CONSTANT_ALIASES.iter().find(|(alias, _)| *alias == name) {
            return Ok(self.known(k));
        }
        if let Some(f) = STANDARD_FORMATS.iter().find(|f| f.display == Some(name)) {
            return Ok(f.id);
        }
        if let Some(&(_, k)) = KNOWN_DISPLAY_NAMES.iter().find(|(display, _)| *display == name) {
            return Ok(self.known(k));
        }
        if let Some(id) = parse_format_number(name) {
            return Ok(id);
        }
        self.register(name)
    }

    /// Canonical name of a tag
    ///
    /// Predefined formats yield their constant name, registered formats their
    /// registered name, and unknown tags `"Format{N}"`.
    pub fn name_of(&self, id: FormatId) -> String {
        if let Some(f) = standard_entry(id) {
            return f.constant.to_string();
        }
        self.native_name(id).unwrap_or_else(|| format!("Format{}", id.0))
    }

    /// Registered name of a tag, querying the backend on a cache miss
    pub fn native_name(&self, id: FormatId) -> Option<String> {
        if let Some(entry) = self.cache.read().by_id.get(&id) {
            return Some(entry.native.clone());
        }

        let name = self.backend.lookup_name(id)?;
        self.cache.write().insert(id, name.clone(), None);
        Some(name)
    }

    /// Header constant name of a tag (`CF_TEXT`, `CFSTR_SHELLIDLIST`), if any
    pub fn constant_name(&self, id: FormatId) -> Option<&'static str> {
        if let Some(f) = standard_entry(id) {
            return Some(f.constant);
        }
        self.cache.read().by_id.get(&id).and_then(|e| e.constant)
    }

    /// Human-readable name in the style of the .NET `DataFormats` names
    pub fn display_name(&self, id: FormatId) -> String {
        if let Some(display) = standard_entry(id).and_then(|f| f.display) {
            return display.to_string();
        }
        self.name_of(id)
    }

    /// Text encoding used by a string-valued format
    ///
    /// The mapping is fixed per format; `None` means the format does not carry
    /// a string.
    pub fn string_encoding(&self, id: FormatId) -> Option<TextEncoding> {
        match id {
            FormatId::CF_TEXT | FormatId::CF_OEMTEXT => return Some(TextEncoding::Ansi),
            FormatId::CF_UNICODETEXT => return Some(TextEncoding::Utf16),
            _ => {}
        }

        match self.known_format(id)? {
            KnownFormat::Rtf | KnownFormat::Csv | KnownFormat::ShellUrl | KnownFormat::FileNameA => {
                Some(TextEncoding::Ansi)
            }
            KnownFormat::Html | KnownFormat::Xaml => Some(TextEncoding::Utf8),
            KnownFormat::ApplicationTrust | KnownFormat::InetUrlW | KnownFormat::FileNameW => {
                Some(TextEncoding::Utf16)
            }
            _ => None,
        }
    }
}

/// `"Format{N}"` with plain decimal digits and `N` a valid tag
fn parse_format_number(name: &str) -> Option<FormatId> {
    let digits = name.strip_prefix("Format")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let id = digits.parse::<u32>().ok()?;
    (1..=FormatId::LAST).contains(&id).then_some(FormatId(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> FormatRegistry {
        FormatRegistry::in_memory().unwrap()
    }

    #[test]
    fn test_standard_names_round_trip() {
        let registry = registry();
        for f in STANDARD_FORMATS {
            let id = registry.id_of(f.constant).unwrap();
            assert_eq!(id, f.id);
            assert_eq!(registry.name_of(id), f.constant);
        }
    }

    #[test]
    fn test_known_names_round_trip() {
        let registry = registry();
        for &k in KnownFormat::ALL {
            let id = registry.id_of(k.native_name()).unwrap();
            assert_eq!(id, registry.known(k));
            assert_eq!(registry.name_of(id), k.native_name());

            if let Some(constant) = k.constant_name() {
                assert_eq!(registry.id_of(constant).unwrap(), id);
                assert_eq!(registry.constant_name(id), Some(constant));
            }
        }
    }

    #[test]
    fn test_inet_url_alias() {
        let registry = registry();
        assert_eq!(
            registry.id_of("CFSTR_INETURLA").unwrap(),
            registry.known(KnownFormat::ShellUrl)
        );
    }

    #[test]
    fn test_register_is_case_insensitive() {
        let registry = registry();
        let a = registry.register("My Custom Format").unwrap();
        let b = registry.register("my custom format").unwrap();
        assert_eq!(a, b);
        assert!(a.is_registered());
        assert_eq!(registry.name_of(a), "My Custom Format");
    }

    #[test]
    fn test_register_rejects_empty_name() {
        assert!(matches!(registry().register(""), Err(ClipError::InvalidArgument(_))));
    }

    #[test]
    fn test_format_n_names() {
        let registry = registry();
        assert_eq!(registry.id_of("Format49999").unwrap(), FormatId(49999));
        assert_eq!(registry.name_of(FormatId(0xFFF0)), "Format65520");
        assert_eq!(registry.id_of("Format65535").unwrap(), FormatId(0xFFFF));
    }

    #[test]
    fn test_format_n_outside_tag_range_is_registered() {
        let registry = registry();
        for name in ["Format0", "Format65536", "Format+5", "Format", "Format 7"] {
            let id = registry.id_of(name).unwrap();
            assert!(id.is_registered(), "{}", name);
            assert_eq!(registry.name_of(id), name);
        }
    }

    #[test]
    fn test_display_names() {
        let registry = registry();
        assert_eq!(registry.display_name(FormatId::CF_UNICODETEXT), "UnicodeText");
        assert_eq!(registry.display_name(FormatId::CF_HDROP), "FileDrop");
        assert_eq!(registry.id_of("DeviceIndependentBitmap").unwrap(), FormatId::CF_DIB);
        assert_eq!(registry.id_of("Html").unwrap(), registry.known(KnownFormat::Html));
        assert_eq!(
            registry.display_name(registry.known(KnownFormat::Png)),
            "PNG"
        );
    }

    #[test]
    fn test_string_encoding_table() {
        let registry = registry();
        assert_eq!(registry.string_encoding(FormatId::CF_TEXT), Some(TextEncoding::Ansi));
        assert_eq!(registry.string_encoding(FormatId::CF_UNICODETEXT), Some(TextEncoding::Utf16));
        assert_eq!(
            registry.string_encoding(registry.known(KnownFormat::Html)),
            Some(TextEncoding::Utf8)
        );
        assert_eq!(
            registry.string_encoding(registry.known(KnownFormat::InetUrlW)),
            Some(TextEncoding::Utf16)
        );
        assert_eq!(
            registry.string_encoding(registry.known(KnownFormat::Csv)),
            Some(TextEncoding::Ansi)
        );
        assert_eq!(registry.string_encoding(FormatId::CF_DIB), None);
        assert_eq!(registry.string_encoding(registry.known(KnownFormat::Png)), None);
    }

    struct FailingBackend;

    impl FormatBackend for FailingBackend {
        fn register(&self, _name: &str) -> ClipResult<FormatId> {
            Err(ClipError::Unsupported("no format table"))
        }

        fn lookup_name(&self, _id: FormatId) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_failed_registration_is_fatal() {
        let err = FormatRegistry::new(FailingBackend).unwrap_err();
        assert!(matches!(err, ClipError::Registration { .. }));
        assert!(err.is_fatal());
    }
}
