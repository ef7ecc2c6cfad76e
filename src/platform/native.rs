//! Conversions between the crate's media types and `FORMATETC` / `STGMEDIUM`.
//!
//! Outgoing media hand their handles to the receiver. Incoming media are
//! copied into owned wrappers and the original is released, so no native
//! handle escapes this module.

use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::os::windows::ffi::OsStrExt;
use std::path::PathBuf;
use std::ptr;

use enumflags2::BitFlags;
use windows::core::PWSTR;
use windows::Win32::Foundation::{
    DV_E_DVASPECT, DV_E_FORMATETC, DV_E_TYMED, E_FAIL, E_NOTIMPL, E_OUTOFMEMORY, HGLOBAL,
};
use windows::Win32::Graphics::Gdi::HMETAFILE;
use windows::Win32::System::Com::{
    CoTaskMemAlloc, IStream, FORMATETC, STGMEDIUM, STGMEDIUM_0, STREAM_SEEK_SET,
};
use windows::Win32::System::Ole::ReleaseStgMedium;
use windows::Win32::UI::Shell::SHCreateMemStream;

use crate::format::FormatId;
use crate::medium::{Aspect, FormatEtc, MetafilePict, StgMedium, Tymed};
use crate::sys::{DeviceBitmap, EnhMetafile, GlobalMemory, Metafile};
use crate::{ClipError, ClipResult};

/// `METAFILEPICT` as laid out in global memory
#[repr(C)]
#[derive(Clone, Copy)]
struct RawMetafilePict {
    mm: i32,
    x_ext: i32,
    y_ext: i32,
    hmf: HMETAFILE,
}

// =============================================================================
// FORMATETC
// =============================================================================

pub(crate) fn to_native_format(etc: &FormatEtc) -> FORMATETC {
    FORMATETC {
        cfFormat: etc.format.id() as u16,
        ptd: ptr::null_mut(),
        dwAspect: etc.aspect as u32,
        lindex: etc.index,
        tymed: etc.tymed.bits(),
    }
}

/// `None` for an aspect outside `DVASPECT`
pub(crate) fn from_native_format(etc: &FORMATETC) -> Option<FormatEtc> {
    Some(FormatEtc {
        format: FormatId(u32::from(etc.cfFormat)),
        aspect: Aspect::from_raw(etc.dwAspect)?,
        index: etc.lindex,
        tymed: BitFlags::from_bits_truncate(etc.tymed),
    })
}

// =============================================================================
// STGMEDIUM
// =============================================================================

fn native_medium(tymed: Tymed, u: STGMEDIUM_0) -> STGMEDIUM {
    STGMEDIUM {
        tymed: tymed as u32,
        u,
        pUnkForRelease: ManuallyDrop::new(None),
    }
}

/// Hand `medium` over as a native medium the receiver releases
pub(crate) fn into_native_medium(medium: StgMedium) -> ClipResult<STGMEDIUM> {
    Ok(match medium {
        StgMedium::Null => STGMEDIUM {
            tymed: 0,
            u: STGMEDIUM_0 {
                hGlobal: HGLOBAL::default(),
            },
            pUnkForRelease: ManuallyDrop::new(None),
        },
        StgMedium::HGlobal(memory) => native_medium(
            Tymed::HGlobal,
            STGMEDIUM_0 {
                hGlobal: memory.into_raw(),
            },
        ),
        StgMedium::Gdi(bitmap) => native_medium(
            Tymed::Gdi,
            STGMEDIUM_0 {
                hBitmap: bitmap.into_raw(),
            },
        ),
        StgMedium::EnhMetafile(emf) => native_medium(
            Tymed::EnhMf,
            STGMEDIUM_0 {
                hEnhMetaFile: emf.into_raw(),
            },
        ),
        StgMedium::MetafilePict(pict) => {
            let mut memory = GlobalMemory::alloc(std::mem::size_of::<RawMetafilePict>())?;
            {
                let mut lock = memory.lock_mut()?;
                let raw = RawMetafilePict {
                    mm: pict.mapping_mode,
                    x_ext: pict.x_ext,
                    y_ext: pict.y_ext,
                    hmf: pict.metafile.into_raw(),
                };
                // SAFETY: the block was sized for the struct
                unsafe { ptr::write_unaligned(lock.as_mut_ptr().cast::<RawMetafilePict>(), raw) };
            }
            native_medium(
                Tymed::MfPict,
                STGMEDIUM_0 {
                    hMetaFilePict: memory.into_raw().0,
                },
            )
        }
        StgMedium::Stream(bytes) => {
            // SAFETY: SHCreateMemStream copies the buffer
            let stream = unsafe { SHCreateMemStream(Some(&bytes)) }.ok_or(ClipError::OutOfMemory(bytes.len()))?;
            native_medium(
                Tymed::IStream,
                STGMEDIUM_0 {
                    pstm: ManuallyDrop::new(Some(stream)),
                },
            )
        }
        StgMedium::File(path) => {
            let wide: Vec<u16> = path.as_os_str().encode_wide().chain(std::iter::once(0)).collect();
            let len = wide.len() * 2;
            // SAFETY: allocation is sized for the string; the receiver frees it
            let name = unsafe {
                let buffer = CoTaskMemAlloc(len).cast::<u16>();
                if buffer.is_null() {
                    return Err(ClipError::OutOfMemory(len));
                }
                ptr::copy_nonoverlapping(wide.as_ptr(), buffer, wide.len());
                PWSTR(buffer)
            };
            native_medium(Tymed::File, STGMEDIUM_0 { lpszFileName: name })
        }
        StgMedium::Storage(_) => return Err(ClipError::UnsupportedMedium(Tymed::IStorage.into())),
    })
}

/// Copy a received medium into an owned [`StgMedium`], then release it
///
/// # Safety
/// `medium` must be a valid medium returned by `IDataObject::GetData`.
pub(crate) unsafe fn take_native_medium(mut medium: STGMEDIUM) -> ClipResult<StgMedium> {
    // SAFETY: caller guarantees the union member matches tymed
    let copied = unsafe { copy_native_medium(&medium) };
    // SAFETY: medium came from GetData and is released exactly once
    unsafe { ReleaseStgMedium(&mut medium) };
    copied
}

unsafe fn copy_native_medium(medium: &STGMEDIUM) -> ClipResult<StgMedium> {
    let tymed = BitFlags::<Tymed>::from_bits(medium.tymed)
        .ok()
        .and_then(|flags| flags.exactly_one());
    // SAFETY: each arm reads the union member selected by tymed
    unsafe {
        match tymed {
            None if medium.tymed == 0 => Ok(StgMedium::Null),
            Some(Tymed::HGlobal) => Ok(StgMedium::HGlobal(GlobalMemory::copy_from_raw(medium.u.hGlobal)?)),
            Some(Tymed::Gdi) => Ok(StgMedium::Gdi(DeviceBitmap::copy_from_raw(medium.u.hBitmap)?)),
            Some(Tymed::EnhMf) => Ok(StgMedium::EnhMetafile(EnhMetafile::copy_from_raw(medium.u.hEnhMetaFile)?)),
            Some(Tymed::MfPict) => {
                let memory = GlobalMemory::copy_from_raw(HGLOBAL(medium.u.hMetaFilePict))?;
                let lock = memory.lock()?;
                if lock.len() < std::mem::size_of::<RawMetafilePict>() {
                    return Err(ClipError::malformed("METAFILEPICT", format!("{} bytes", lock.len())));
                }
                let raw = ptr::read_unaligned(lock.as_ptr().cast::<RawMetafilePict>());
                Ok(StgMedium::MetafilePict(MetafilePict {
                    mapping_mode: raw.mm,
                    x_ext: raw.x_ext,
                    y_ext: raw.y_ext,
                    metafile: Metafile::copy_from_raw(raw.hmf)?,
                }))
            }
            Some(Tymed::IStream) => match &*medium.u.pstm {
                Some(stream) => Ok(StgMedium::Stream(read_stream(stream)?)),
                None => Err(ClipError::malformed("STGMEDIUM", "null stream")),
            },
            Some(Tymed::File) => {
                let name = medium
                    .u
                    .lpszFileName
                    .to_string()
                    .map_err(|e| ClipError::malformed("file name", e.to_string()))?;
                Ok(StgMedium::File(PathBuf::from(name)))
            }
            Some(other) => Err(ClipError::UnsupportedMedium(other.into())),
            None => Err(ClipError::malformed("STGMEDIUM", format!("tymed {:#x}", medium.tymed))),
        }
    }
}

unsafe fn read_stream(stream: &IStream) -> ClipResult<Vec<u8>> {
    // SAFETY: stream is a live interface; buffers outlive the calls
    unsafe {
        if let Err(e) = stream.Seek(0, STREAM_SEEK_SET, None) {
            tracing::trace!("Stream is not seekable: {}", e);
        }
        let mut out = Vec::new();
        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            let mut read = 0u32;
            stream
                .Read(buffer.as_mut_ptr().cast::<c_void>(), buffer.len() as u32, Some(std::ptr::addr_of_mut!(read)))
                .ok()?;
            if read == 0 {
                break;
            }
            out.extend_from_slice(&buffer[..read as usize]);
        }
        Ok(out)
    }
}

/// Read a medium the caller still owns, e.g. in `GetDataHere`
///
/// # Safety
/// `medium` must be a valid medium.
pub(crate) unsafe fn borrow_hglobal(medium: &STGMEDIUM) -> Option<HGLOBAL> {
    // SAFETY: the union member matches tymed
    (medium.tymed == Tymed::HGlobal as u32).then(|| unsafe { medium.u.hGlobal })
}

// =============================================================================
// Errors
// =============================================================================

/// HRESULT reported to a COM caller for `err`
pub(crate) fn to_com_error(err: &ClipError) -> windows::core::Error {
    let code = match err {
        ClipError::FormatUnavailable { .. } => DV_E_FORMATETC,
        ClipError::UnsupportedMedium(_) | ClipError::InvalidMedium { .. } => DV_E_TYMED,
        ClipError::UnsupportedAspect(_) => DV_E_DVASPECT,
        ClipError::OutOfMemory(_) => E_OUTOFMEMORY,
        ClipError::NotImplemented(_) => E_NOTIMPL,
        ClipError::Os(e) => return e.clone(),
        _ => E_FAIL,
    };
    code.into()
}
