//! The read contract every data object offers.
//!
//! [`DataSource`] is the `IDataObject` read surface: capability query, fetch,
//! enumeration and canonical format. [`DataStore`](crate::store::DataStore)
//! implements it to serve published data; on Windows the native clipboard
//! object is wrapped in the same trait, so [`ComDataObject`] reads both the
//! same way.
//!
//! [`ComDataObject`]: crate::reader::ComDataObject

use std::sync::Arc;

use crate::medium::{FormatEtc, QueryStatus, StgMedium};
use crate::ClipResult;

/// Native data-source read contract
pub trait DataSource {
    /// Can `etc` be served? (`QueryGetData`)
    fn query_get_data(&self, etc: &FormatEtc) -> QueryStatus;

    /// Render `etc` into a fresh medium owned by the caller (`GetData`)
    fn get_data(&self, etc: &FormatEtc) -> ClipResult<StgMedium>;

    /// Offers in publication order (`EnumFormatEtc(DATADIR_GET)`)
    fn enum_formats(&self) -> ClipResult<Vec<FormatEtc>>;

    /// Canonical equivalent of `etc` (`GetCanonicalFormatEtc`)
    fn canonical_format(&self, _etc: &FormatEtc) -> QueryStatus {
        QueryStatus::SameFormatEtc
    }
}

impl<S: DataSource + ?Sized> DataSource for Box<S> {
    fn query_get_data(&self, etc: &FormatEtc) -> QueryStatus {
        (**self).query_get_data(etc)
    }

    fn get_data(&self, etc: &FormatEtc) -> ClipResult<StgMedium> {
        (**self).get_data(etc)
    }

    fn enum_formats(&self) -> ClipResult<Vec<FormatEtc>> {
        (**self).enum_formats()
    }

    fn canonical_format(&self, etc: &FormatEtc) -> QueryStatus {
        (**self).canonical_format(etc)
    }
}

impl<S: DataSource + ?Sized> DataSource for Arc<S> {
    fn query_get_data(&self, etc: &FormatEtc) -> QueryStatus {
        (**self).query_get_data(etc)
    }

    fn get_data(&self, etc: &FormatEtc) -> ClipResult<StgMedium> {
        (**self).get_data(etc)
    }

    fn enum_formats(&self) -> ClipResult<Vec<FormatEtc>> {
        (**self).enum_formats()
    }

    fn canonical_format(&self, etc: &FormatEtc) -> QueryStatus {
        (**self).canonical_format(etc)
    }
}

impl<S: DataSource + ?Sized> DataSource for &S {
    fn query_get_data(&self, etc: &FormatEtc) -> QueryStatus {
        (**self).query_get_data(etc)
    }

    fn get_data(&self, etc: &FormatEtc) -> ClipResult<StgMedium> {
        (**self).get_data(etc)
    }

    fn enum_formats(&self) -> ClipResult<Vec<FormatEtc>> {
        (**self).enum_formats()
    }

    fn canonical_format(&self, etc: &FormatEtc) -> QueryStatus {
        (**self).canonical_format(etc)
    }
}

/// Owned snapshot of rendered media
///
/// This is what a flushed clipboard holds once the publishing object has
/// been released: every offer rendered once, handed out as copies.
#[derive(Debug, Default)]
pub struct RenderedSource {
    entries: Vec<(FormatEtc, StgMedium)>,
}

impl RenderedSource {
    /// Render every offer of `source`
    ///
    /// An offer that only exists per item (like `FileContents`) is rendered
    /// at indices 0, 1, .. until one is missing. Offers that fail to render
    /// are skipped; a consumer sees them as absent.
    pub fn snapshot(source: &dyn DataSource) -> ClipResult<Self> {
        let mut entries = Vec::new();
        for offer in source.enum_formats()? {
            match source.get_data(&offer) {
                Ok(medium) => entries.push((offer, medium)),
                Err(e) if e.is_absence() => {
                    for index in 0.. {
                        let item = offer.with_index(index);
                        let Ok(medium) = source.get_data(&item) else {
                            break;
                        };
                        entries.push((item, medium));
                    }
                }
                Err(e) => tracing::warn!("Dropping format {} from snapshot: {}", offer.format, e),
            }
        }
        Ok(Self { entries })
    }

    /// Number of rendered offers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was rendered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, etc: &FormatEtc) -> Option<&(FormatEtc, StgMedium)> {
        self.entries
            .iter()
            .find(|(offer, _)| offer.format == etc.format && offer.index == etc.index)
    }
}

impl DataSource for RenderedSource {
    fn query_get_data(&self, etc: &FormatEtc) -> QueryStatus {
        if etc.format.id() == 0 {
            return QueryStatus::NoData;
        }
        match self.find(etc) {
            None => QueryStatus::InvalidFormat,
            Some((offer, _)) if !offer.tymed.intersects(etc.tymed) => QueryStatus::InvalidTymed,
            Some(_) => QueryStatus::Ok,
        }
    }

    fn get_data(&self, etc: &FormatEtc) -> ClipResult<StgMedium> {
        let status = self.query_get_data(etc);
        if let Some(err) = status.into_error(etc) {
            return Err(err);
        }
        match self.find(etc) {
            Some((_, medium)) => medium.try_clone(),
            None => Err(crate::ClipError::FormatUnavailable {
                format: etc.format,
                index: etc.index,
            }),
        }
    }

    fn enum_formats(&self) -> ClipResult<Vec<FormatEtc>> {
        let mut offers: Vec<FormatEtc> = Vec::new();
        for (offer, _) in &self.entries {
            if !offers.iter().any(|o| o.format == offer.format) {
                offers.push(offer.with_index(-1));
            }
        }
        Ok(offers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatId;
    use crate::medium::Tymed;
    use crate::sys::GlobalMemory;

    #[test]
    fn test_snapshot_hands_out_copies() {
        let source = RenderedSource {
            entries: vec![(
                FormatEtc::new(FormatId::CF_TEXT).with_tymed(Tymed::HGlobal),
                StgMedium::HGlobal(GlobalMemory::from_bytes(b"hi\0").unwrap()),
            )],
        };

        let etc = FormatEtc::new(FormatId::CF_TEXT);
        assert!(source.query_get_data(&etc).is_ok());
        assert_eq!(source.get_data(&etc).unwrap().bytes().unwrap()[..2], *b"hi");
        assert_eq!(source.get_data(&etc).unwrap().bytes().unwrap()[..2], *b"hi");

        let gdi_only = etc.with_tymed(Tymed::Gdi);
        assert_eq!(source.query_get_data(&gdi_only), QueryStatus::InvalidTymed);
        assert_eq!(
            source.query_get_data(&FormatEtc::new(FormatId::CF_DIB)),
            QueryStatus::InvalidFormat
        );
        assert_eq!(source.query_get_data(&FormatEtc::new(FormatId(0))), QueryStatus::NoData);
    }
}
