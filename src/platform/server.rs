//! `IDataObject` over a published [`DataStore`].

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};
use windows::core::{implement, Result as WinResult, HRESULT};
use windows::Win32::Foundation::{
    BOOL, DATA_S_SAMEFORMATETC, E_INVALIDARG, E_NOTIMPL, E_POINTER, OLE_E_ADVISENOTSUPPORTED, S_FALSE, S_OK,
};
use windows::Win32::System::Com::{
    IAdviseSink, IDataObject, IDataObject_Impl, IEnumFORMATETC, IEnumFORMATETC_Impl, IEnumSTATDATA, DATADIR_GET,
    FORMATETC, STGMEDIUM,
};

use super::native::{borrow_hglobal, from_native_format, into_native_medium, to_com_error, to_native_format};
use crate::medium::{FormatEtc, QueryStatus, StgMedium};
use crate::source::DataSource;
use crate::store::{DataStore, FormatEnumerator};
use crate::sys::GlobalMemory;

/// COM data object serving a store
///
/// Handed to `OleSetClipboard`; every request renders a fresh medium from
/// the immutable store.
#[implement(IDataObject)]
pub struct ComDataStore {
    store: Arc<DataStore>,
}

impl ComDataStore {
    /// Wrap `store` and return the interface
    pub fn create(store: Arc<DataStore>) -> IDataObject {
        Self { store }.into()
    }
}

/// Decode a caller's `FORMATETC`, or the HRESULT to answer with
unsafe fn read_format(pformatetc: *const FORMATETC) -> Result<FormatEtc, HRESULT> {
    // SAFETY: COM callers pass a valid pointer or null
    let etc = unsafe { pformatetc.as_ref() }.ok_or(E_POINTER)?;
    from_native_format(etc).ok_or(HRESULT(QueryStatus::InvalidAspect.hresult()))
}

impl IDataObject_Impl for ComDataStore_Impl {
    fn GetData(&self, pformatetcin: *const FORMATETC) -> WinResult<STGMEDIUM> {
        // SAFETY: pointer from the COM caller
        let etc = unsafe { read_format(pformatetcin) }?;
        let medium = self.store.get_data(&etc).map_err(|e| {
            trace!("GetData {:?} refused: {}", etc, e);
            to_com_error(&e)
        })?;
        into_native_medium(medium).map_err(|e| to_com_error(&e))
    }

    fn GetDataHere(&self, pformatetc: *const FORMATETC, pmedium: *mut STGMEDIUM) -> WinResult<()> {
        // SAFETY: pointers from the COM caller
        let etc = unsafe { read_format(pformatetc) }?;
        let native = unsafe { pmedium.as_mut() }.ok_or(E_POINTER)?;
        let Some(handle) = (unsafe { borrow_hglobal(native) }) else {
            return Err(to_com_error(&crate::ClipError::UnsupportedMedium(etc.tymed)));
        };

        // The caller keeps ownership of its block; hand it back even on failure
        let mut medium = StgMedium::HGlobal(unsafe { GlobalMemory::from_raw(handle) });
        let result = self.store.get_data_here(&etc, &mut medium);
        if let StgMedium::HGlobal(memory) = medium {
            native.u.hGlobal = memory.into_raw();
        }
        result.map_err(|e| to_com_error(&e))
    }

    fn QueryGetData(&self, pformatetc: *const FORMATETC) -> HRESULT {
        // SAFETY: pointer from the COM caller
        match unsafe { read_format(pformatetc) } {
            Ok(etc) => HRESULT(self.store.query_get_data(&etc).hresult()),
            Err(hr) => hr,
        }
    }

    fn GetCanonicalFormatEtc(&self, pformatectin: *const FORMATETC, pformatetcout: *mut FORMATETC) -> HRESULT {
        // SAFETY: pointers from the COM caller
        let Some(out) = (unsafe { pformatetcout.as_mut() }) else {
            return E_POINTER;
        };
        match unsafe { read_format(pformatectin) } {
            Ok(etc) => {
                *out = to_native_format(&etc);
                DATA_S_SAMEFORMATETC
            }
            Err(hr) => hr,
        }
    }

    fn SetData(&self, _pformatetc: *const FORMATETC, _pmedium: *const STGMEDIUM, _frelease: BOOL) -> WinResult<()> {
        Err(E_NOTIMPL.into())
    }

    fn EnumFormatEtc(&self, dwdirection: u32) -> WinResult<IEnumFORMATETC> {
        if dwdirection != DATADIR_GET.0 as u32 {
            debug!("EnumFormatEtc direction {} not supported", dwdirection);
            return Err(E_NOTIMPL.into());
        }
        Ok(ComFormatEnumerator::create(self.store.enumerator()))
    }

    fn DAdvise(&self, _pformatetc: *const FORMATETC, _advf: u32, _padvsink: Option<&IAdviseSink>) -> WinResult<u32> {
        Err(OLE_E_ADVISENOTSUPPORTED.into())
    }

    fn DUnadvise(&self, _dwconnection: u32) -> WinResult<()> {
        Err(OLE_E_ADVISENOTSUPPORTED.into())
    }

    fn EnumDAdvise(&self) -> WinResult<IEnumSTATDATA> {
        Err(OLE_E_ADVISENOTSUPPORTED.into())
    }
}

/// `IEnumFORMATETC` over a [`FormatEnumerator`]
#[implement(IEnumFORMATETC)]
pub struct ComFormatEnumerator {
    inner: Mutex<FormatEnumerator>,
}

impl ComFormatEnumerator {
    /// Wrap `inner` and return the interface
    pub fn create(inner: FormatEnumerator) -> IEnumFORMATETC {
        Self {
            inner: Mutex::new(inner),
        }
        .into()
    }
}

impl IEnumFORMATETC_Impl for ComFormatEnumerator_Impl {
    fn Next(&self, celt: u32, rgelt: *mut FORMATETC, pceltfetched: *mut u32) -> HRESULT {
        if rgelt.is_null() || (celt > 1 && pceltfetched.is_null()) {
            return E_INVALIDARG;
        }
        let batch = self.inner.lock().next_batch(celt as usize);
        for (i, etc) in batch.iter().enumerate() {
            // SAFETY: the caller provides room for celt entries
            unsafe { rgelt.add(i).write(to_native_format(etc)) };
        }
        if !pceltfetched.is_null() {
            // SAFETY: checked for null
            unsafe { *pceltfetched = batch.len() as u32 };
        }
        if batch.len() == celt as usize {
            S_OK
        } else {
            S_FALSE
        }
    }

    fn Skip(&self, celt: u32) -> HRESULT {
        if self.inner.lock().advance(celt as usize) {
            S_OK
        } else {
            S_FALSE
        }
    }

    fn Reset(&self) -> WinResult<()> {
        self.inner.lock().reset();
        Ok(())
    }

    fn Clone(&self) -> WinResult<IEnumFORMATETC> {
        Ok(ComFormatEnumerator::create(self.inner.lock().clone()))
    }
}
