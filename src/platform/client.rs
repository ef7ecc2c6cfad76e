//! Reading a native `IDataObject`.

use std::ffi::c_void;

use tracing::trace;
use windows::Win32::Foundation::{DV_E_DVASPECT, DV_E_FORMATETC, DV_E_TYMED};
use windows::Win32::System::Com::{CoTaskMemFree, IDataObject, DATADIR_GET, FORMATETC};

use super::native::{from_native_format, take_native_medium, to_native_format};
use crate::medium::{FormatEtc, QueryStatus, StgMedium};
use crate::source::DataSource;
use crate::{ClipError, ClipResult};

/// [`DataSource`] over an OS data object, e.g. from `OleGetClipboard`
///
/// Every fetched medium is copied into owned memory and the native medium
/// released before returning.
#[derive(Debug, Clone)]
pub struct OleDataSource(IDataObject);

impl OleDataSource {
    /// Wrap `object`
    pub fn new(object: IDataObject) -> Self {
        Self(object)
    }

    /// The wrapped interface
    pub fn as_raw(&self) -> &IDataObject {
        &self.0
    }
}

impl DataSource for OleDataSource {
    fn query_get_data(&self, etc: &FormatEtc) -> QueryStatus {
        let native = to_native_format(etc);
        // SAFETY: native lives across the call
        let hr = unsafe { self.0.QueryGetData(&native) };
        QueryStatus::from_hresult(hr.0)
    }

    fn get_data(&self, etc: &FormatEtc) -> ClipResult<StgMedium> {
        let native = to_native_format(etc);
        // SAFETY: native lives across the call
        let medium = unsafe { self.0.GetData(&native) }.map_err(|e| {
            trace!("GetData {:?} failed: {}", etc, e);
            let code = e.code();
            if code == DV_E_FORMATETC || code == DV_E_TYMED || code == DV_E_DVASPECT {
                if let Some(err) = QueryStatus::from_hresult(code.0).into_error(etc) {
                    return err;
                }
            }
            ClipError::Os(e)
        })?;
        // SAFETY: medium was just returned by GetData
        unsafe { take_native_medium(medium) }
    }

    fn enum_formats(&self) -> ClipResult<Vec<FormatEtc>> {
        // SAFETY: plain COM calls; every returned ptd is freed once
        unsafe {
            let enumerator = self.0.EnumFormatEtc(DATADIR_GET.0 as u32)?;
            let mut offers = Vec::new();
            loop {
                let mut batch = [FORMATETC::default(); 16];
                let mut fetched = 0u32;
                enumerator.Next(&mut batch, Some(std::ptr::addr_of_mut!(fetched))).ok()?;
                for native in &batch[..fetched as usize] {
                    if !native.ptd.is_null() {
                        CoTaskMemFree(Some(native.ptd as *const c_void));
                    }
                    match from_native_format(native) {
                        Some(etc) => offers.push(etc),
                        None => trace!("Skipping offer with aspect {}", native.dwAspect),
                    }
                }
                if (fetched as usize) < batch.len() {
                    break;
                }
            }
            Ok(offers)
        }
    }

    fn canonical_format(&self, etc: &FormatEtc) -> QueryStatus {
        let native = to_native_format(etc);
        let mut out = FORMATETC::default();
        // SAFETY: both structs live across the call
        let hr = unsafe { self.0.GetCanonicalFormatEtc(&native, &mut out) };
        if !out.ptd.is_null() {
            // SAFETY: the callee allocated ptd for us
            unsafe { CoTaskMemFree(Some(out.ptd as *const c_void)) };
        }
        QueryStatus::from_hresult(hr.0)
    }
}
