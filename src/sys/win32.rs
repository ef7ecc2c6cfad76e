//! Win32 handles behind the transfer media.
//!
//! Every wrapper owns its handle and frees it on drop. Handles received from
//! another process's data object are copied with `copy_from_raw`; the
//! caller keeps releasing the original through `ReleaseStgMedium`.

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::ops::{Deref, DerefMut};
use std::ptr;

use image::RgbaImage;
use windows::core::{PCSTR, PCWSTR};
use windows::Win32::Foundation::{GlobalFree, HANDLE, HGLOBAL, HWND};
use windows::Win32::Globalization::{MultiByteToWideChar, WideCharToMultiByte, CP_ACP, MULTI_BYTE_TO_WIDE_CHAR_FLAGS};
use windows::Win32::Graphics::Gdi::{
    BitBlt, CopyEnhMetaFileW, CopyMetaFileW, CreateCompatibleBitmap, CreateCompatibleDC, CreateDIBSection, DeleteDC,
    DeleteEnhMetaFile, DeleteMetaFile, DeleteObject, GetDC, GetDIBits, GetEnhMetaFileBits, GetMetaFileBitsEx,
    GetObjectW, ReleaseDC, SelectObject, SetEnhMetaFileBits, SetMetaFileBitsEx, BITMAP, BITMAPINFO,
    BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HBITMAP, HDC, HENHMETAFILE, HGDIOBJ, HMETAFILE, SRCCOPY,
};
use windows::Win32::System::Memory::{
    GlobalAlloc, GlobalLock as OsGlobalLock, GlobalReAlloc, GlobalSize, GlobalUnlock, GMEM_MOVEABLE, GMEM_ZEROINIT,
};
use windows::Win32::System::Ole::OleInitialize;

use crate::codec::dib;
use crate::{ClipError, ClipResult};

fn last_error() -> ClipError {
    ClipError::Os(windows::core::Error::from_win32())
}

// =============================================================================
// Global Memory
// =============================================================================

/// Movable global memory block (`HGLOBAL`)
#[derive(Debug)]
pub struct GlobalMemory {
    handle: HGLOBAL,
}

// SAFETY: HGLOBAL handles are process-wide and not tied to a thread.
unsafe impl Send for GlobalMemory {}

impl GlobalMemory {
    /// Allocate a zeroed block of `len` bytes
    pub fn alloc(len: usize) -> ClipResult<Self> {
        // SAFETY: plain allocation, the handle is owned by the result
        let handle = unsafe { GlobalAlloc(GMEM_MOVEABLE | GMEM_ZEROINIT, len) }.map_err(|_| ClipError::OutOfMemory(len))?;
        Ok(Self { handle })
    }

    /// Allocate a block holding a copy of `data`
    pub fn from_bytes(data: &[u8]) -> ClipResult<Self> {
        let mut memory = Self::alloc(data.len())?;
        memory.lock_mut()?[..data.len()].copy_from_slice(data);
        Ok(memory)
    }

    /// Take ownership of `handle`
    ///
    /// # Safety
    /// `handle` must be a valid movable global block that nothing else frees.
    pub(crate) unsafe fn from_raw(handle: HGLOBAL) -> Self {
        Self { handle }
    }

    /// Copy a block owned by someone else
    ///
    /// # Safety
    /// `handle` must be a valid global block for the duration of the call.
    pub(crate) unsafe fn copy_from_raw(handle: HGLOBAL) -> ClipResult<Self> {
        let borrowed = std::mem::ManuallyDrop::new(Self { handle });
        Self::from_bytes(&borrowed.lock()?)
    }

    /// Give up ownership, e.g. when handing the block to OLE
    pub(crate) fn into_raw(self) -> HGLOBAL {
        let this = std::mem::ManuallyDrop::new(self);
        this.handle
    }

    /// Block size in bytes (`GlobalSize`)
    pub fn len(&self) -> usize {
        // SAFETY: handle is valid while self lives
        unsafe { GlobalSize(self.handle) }
    }

    /// True for a zero-sized block
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lock for reading; unlocked when the guard drops
    pub fn lock(&self) -> ClipResult<GlobalLock<'_>> {
        let len = self.len();
        // SAFETY: handle is valid; the guard unlocks it
        let data = unsafe { OsGlobalLock(self.handle) };
        if data.is_null() {
            if len == 0 {
                return Ok(GlobalLock { memory: None, bytes: &[] });
            }
            return Err(last_error());
        }
        // SAFETY: a locked block is readable for GlobalSize bytes
        let bytes = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), len) };
        Ok(GlobalLock {
            memory: Some(self.handle),
            bytes,
        })
    }

    /// Lock for writing; unlocked when the guard drops
    pub fn lock_mut(&mut self) -> ClipResult<GlobalLockMut<'_>> {
        let len = self.len();
        // SAFETY: handle is valid and exclusively borrowed
        let data = unsafe { OsGlobalLock(self.handle) };
        if data.is_null() {
            if len == 0 {
                return Ok(GlobalLockMut {
                    memory: None,
                    bytes: &mut [],
                });
            }
            return Err(last_error());
        }
        // SAFETY: a locked block is writable for GlobalSize bytes
        let bytes = unsafe { std::slice::from_raw_parts_mut(data.cast::<u8>(), len) };
        Ok(GlobalLockMut {
            memory: Some(self.handle),
            bytes,
        })
    }

    /// Grow or shrink the block, zero-filling new bytes
    pub fn resize(&mut self, len: usize) -> ClipResult<()> {
        // SAFETY: the block is not locked; &mut self rules out live guards
        let handle = unsafe { GlobalReAlloc(self.handle, len, (GMEM_MOVEABLE | GMEM_ZEROINIT).0) }
            .map_err(|_| ClipError::OutOfMemory(len))?;
        self.handle = handle;
        Ok(())
    }
}

impl Drop for GlobalMemory {
    fn drop(&mut self) {
        // SAFETY: we own the handle
        unsafe {
            let _ = GlobalFree(self.handle);
        }
    }
}

fn unlock(memory: Option<HGLOBAL>) {
    if let Some(handle) = memory {
        // SAFETY: paired with the GlobalLock that produced the guard
        unsafe {
            let _ = GlobalUnlock(handle);
        }
    }
}

/// Read lock on a [`GlobalMemory`]
#[derive(Debug)]
pub struct GlobalLock<'a> {
    memory: Option<HGLOBAL>,
    bytes: &'a [u8],
}

impl Deref for GlobalLock<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

impl Drop for GlobalLock<'_> {
    fn drop(&mut self) {
        unlock(self.memory);
    }
}

/// Write lock on a [`GlobalMemory`]
#[derive(Debug)]
pub struct GlobalLockMut<'a> {
    memory: Option<HGLOBAL>,
    bytes: &'a mut [u8],
}

impl Deref for GlobalLockMut<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

impl DerefMut for GlobalLockMut<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.bytes
    }
}

impl Drop for GlobalLockMut<'_> {
    fn drop(&mut self) {
        unlock(self.memory);
    }
}

// =============================================================================
// Device Bitmaps
// =============================================================================

/// Memory DC with one object selected; restores and deletes on drop
struct MemoryDc {
    dc: HDC,
    previous: HGDIOBJ,
}

impl MemoryDc {
    fn with(screen: HDC, object: HGDIOBJ) -> ClipResult<Self> {
        // SAFETY: screen is a live DC owned by the caller
        let dc = unsafe { CreateCompatibleDC(screen) };
        if dc.is_invalid() {
            return Err(last_error());
        }
        // SAFETY: dc was just created
        let previous = unsafe { SelectObject(dc, object) };
        Ok(Self { dc, previous })
    }
}

impl Drop for MemoryDc {
    fn drop(&mut self) {
        // SAFETY: dc is ours; previous came from it
        unsafe {
            SelectObject(self.dc, self.previous);
            let _ = DeleteDC(self.dc);
        }
    }
}

/// Screen DC released on drop
struct ScreenDc(HDC);

impl ScreenDc {
    fn get() -> ClipResult<Self> {
        // SAFETY: the desktop DC is always available to the process
        let dc = unsafe { GetDC(HWND::default()) };
        if dc.is_invalid() {
            return Err(last_error());
        }
        Ok(Self(dc))
    }
}

impl Drop for ScreenDc {
    fn drop(&mut self) {
        // SAFETY: paired with GetDC
        unsafe {
            ReleaseDC(HWND::default(), self.0);
        }
    }
}

fn bitmap_info(width: u32, height: u32) -> BITMAPINFO {
    BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: width as i32,
            biHeight: -(height as i32), // top-down
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Device-dependent bitmap (`HBITMAP`)
#[derive(Debug)]
pub struct DeviceBitmap {
    handle: HBITMAP,
    width: u32,
    height: u32,
    bits_per_pixel: u16,
}

// SAFETY: GDI bitmaps are process-wide objects; they are never selected into
// a DC outside the calls below.
unsafe impl Send for DeviceBitmap {}

impl DeviceBitmap {
    /// Render a straight RGBA image into a fresh device bitmap
    pub fn from_image(image: &RgbaImage) -> ClipResult<Self> {
        let (width, height) = image.dimensions();
        Self::from_bgra(width, height, &dib::to_premultiplied_bgra(image))
    }

    /// Bitmap from top-down premultiplied BGRA rows
    ///
    /// The rows go through a 32bpp DIB section that is blitted into a bitmap
    /// compatible with the screen.
    pub fn from_bgra(width: u32, height: u32, bgra: &[u8]) -> ClipResult<Self> {
        let len = width as usize * height as usize * 4;
        if bgra.len() < len {
            return Err(ClipError::InvalidArgument(format!(
                "{} bytes for a {}x{} bitmap",
                bgra.len(),
                width,
                height
            )));
        }

        let screen = ScreenDc::get()?;
        let info = bitmap_info(width, height);
        let mut bits: *mut c_void = ptr::null_mut();
        // SAFETY: info describes a 32bpp top-down section of len bytes
        let section = unsafe { CreateDIBSection(screen.0, &info, DIB_RGB_COLORS, &mut bits, HANDLE::default(), 0)? };
        let section = OwnedBitmap(section);
        if bits.is_null() {
            return Err(last_error());
        }
        // SAFETY: the section's bits are len bytes long
        unsafe { ptr::copy_nonoverlapping(bgra.as_ptr(), bits.cast::<u8>(), len) };

        let handle = blit_copy(&screen, section.0, width, height)?;
        Ok(Self {
            handle,
            width,
            height,
            bits_per_pixel: 32,
        })
    }

    /// Copy a bitmap owned by someone else
    ///
    /// # Safety
    /// `handle` must be a valid bitmap not selected into any DC.
    pub(crate) unsafe fn copy_from_raw(handle: HBITMAP) -> ClipResult<Self> {
        let mut bm = BITMAP::default();
        // SAFETY: bm is a BITMAP-sized out buffer
        let got = unsafe {
            GetObjectW(
                HGDIOBJ(handle.0),
                std::mem::size_of::<BITMAP>() as i32,
                Some(ptr::addr_of_mut!(bm).cast::<c_void>()),
            )
        };
        if got == 0 {
            return Err(ClipError::malformed("HBITMAP", "GetObject failed"));
        }

        let (width, height) = (bm.bmWidth.unsigned_abs(), bm.bmHeight.unsigned_abs());
        let screen = ScreenDc::get()?;
        Ok(Self {
            handle: blit_copy(&screen, handle, width, height)?,
            width,
            height,
            bits_per_pixel: bm.bmBitsPixel,
        })
    }

    /// Give up ownership, e.g. when handing the bitmap to OLE
    pub(crate) fn into_raw(self) -> HBITMAP {
        let this = std::mem::ManuallyDrop::new(self);
        this.handle
    }

    /// Width and height in pixels
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Color depth of the bitmap
    pub fn bits_per_pixel(&self) -> u16 {
        self.bits_per_pixel
    }

    /// Pixels as top-down 32bpp BGRA rows (`GetDIBits`)
    pub fn read_bgra(&self) -> ClipResult<Vec<u8>> {
        let screen = ScreenDc::get()?;
        let mut info = bitmap_info(self.width, self.height);
        let mut bgra = vec![0u8; self.width as usize * self.height as usize * 4];
        // SAFETY: bgra holds height rows of 32bpp pixels as info describes
        let lines = unsafe {
            GetDIBits(
                screen.0,
                self.handle,
                0,
                self.height,
                Some(bgra.as_mut_ptr().cast::<c_void>()),
                &mut info,
                DIB_RGB_COLORS,
            )
        };
        if lines == 0 && self.height != 0 {
            return Err(last_error());
        }
        Ok(bgra)
    }

    /// Independent copy
    pub fn try_clone(&self) -> ClipResult<Self> {
        let screen = ScreenDc::get()?;
        Ok(Self {
            handle: blit_copy(&screen, self.handle, self.width, self.height)?,
            ..*self
        })
    }
}

impl Drop for DeviceBitmap {
    fn drop(&mut self) {
        // SAFETY: we own the handle
        unsafe {
            let _ = DeleteObject(self.handle);
        }
    }
}

/// Temporary bitmap deleted on drop
struct OwnedBitmap(HBITMAP);

impl Drop for OwnedBitmap {
    fn drop(&mut self) {
        // SAFETY: we own the handle
        unsafe {
            let _ = DeleteObject(self.0);
        }
    }
}

/// Copy `source` into a new screen-compatible bitmap through two memory DCs
fn blit_copy(screen: &ScreenDc, source: HBITMAP, width: u32, height: u32) -> ClipResult<HBITMAP> {
    // SAFETY: screen is live; the new bitmap is owned by OwnedBitmap until returned
    let target = OwnedBitmap(unsafe { CreateCompatibleBitmap(screen.0, width as i32, height as i32) });
    if target.0.is_invalid() {
        return Err(last_error());
    }

    {
        let src = MemoryDc::with(screen.0, source.into())?;
        let dst = MemoryDc::with(screen.0, target.0.into())?;
        // SAFETY: both DCs are live with the bitmaps selected
        unsafe { BitBlt(dst.dc, 0, 0, width as i32, height as i32, src.dc, 0, 0, SRCCOPY)? };
    }

    let target = std::mem::ManuallyDrop::new(target);
    Ok(target.0)
}

// =============================================================================
// Metafiles
// =============================================================================

/// Enhanced metafile (`HENHMETAFILE`)
#[derive(Debug)]
pub struct EnhMetafile {
    handle: HENHMETAFILE,
}

// SAFETY: metafile handles are process-wide GDI objects
unsafe impl Send for EnhMetafile {}

impl EnhMetafile {
    /// Load from serialized records (`SetEnhMetaFileBits`)
    pub fn from_bytes(bits: &[u8]) -> ClipResult<Self> {
        // SAFETY: bits is a readable buffer
        let handle = unsafe { SetEnhMetaFileBits(bits) };
        if handle.is_invalid() {
            return Err(ClipError::malformed("enhanced metafile", "rejected by GDI"));
        }
        Ok(Self { handle })
    }

    /// Copy a metafile owned by someone else
    ///
    /// # Safety
    /// `handle` must be a valid enhanced metafile.
    pub(crate) unsafe fn copy_from_raw(handle: HENHMETAFILE) -> ClipResult<Self> {
        // SAFETY: caller guarantees the handle
        let copy = unsafe { CopyEnhMetaFileW(handle, PCWSTR::null()) };
        if copy.is_invalid() {
            return Err(last_error());
        }
        Ok(Self { handle: copy })
    }

    pub(crate) fn into_raw(self) -> HENHMETAFILE {
        let this = std::mem::ManuallyDrop::new(self);
        this.handle
    }

    /// Serialized records (`GetEnhMetaFileBits`)
    pub fn bits(&self) -> ClipResult<Vec<u8>> {
        // SAFETY: first call sizes the buffer, second fills it
        unsafe {
            let len = GetEnhMetaFileBits(self.handle, None);
            let mut bits = vec![0u8; len as usize];
            GetEnhMetaFileBits(self.handle, Some(&mut bits));
            Ok(bits)
        }
    }

    /// Independent copy
    pub fn try_clone(&self) -> ClipResult<Self> {
        // SAFETY: self.handle is valid while self lives
        unsafe { Self::copy_from_raw(self.handle) }
    }
}

impl Drop for EnhMetafile {
    fn drop(&mut self) {
        // SAFETY: we own the handle
        unsafe {
            let _ = DeleteEnhMetaFile(self.handle);
        }
    }
}

/// Windows metafile (`HMETAFILE`)
#[derive(Debug)]
pub struct Metafile {
    handle: HMETAFILE,
}

// SAFETY: metafile handles are process-wide GDI objects
unsafe impl Send for Metafile {}

impl Metafile {
    /// Load from serialized records (`SetMetaFileBitsEx`)
    pub fn from_bytes(bits: &[u8]) -> ClipResult<Self> {
        // SAFETY: bits is a readable buffer
        let handle = unsafe { SetMetaFileBitsEx(bits) };
        if handle.is_invalid() {
            return Err(ClipError::malformed("metafile", "rejected by GDI"));
        }
        Ok(Self { handle })
    }

    /// Copy a metafile owned by someone else
    ///
    /// # Safety
    /// `handle` must be a valid metafile.
    pub(crate) unsafe fn copy_from_raw(handle: HMETAFILE) -> ClipResult<Self> {
        // SAFETY: caller guarantees the handle
        let copy = unsafe { CopyMetaFileW(handle, PCWSTR::null()) };
        if copy.is_invalid() {
            return Err(last_error());
        }
        Ok(Self { handle: copy })
    }

    pub(crate) fn into_raw(self) -> HMETAFILE {
        let this = std::mem::ManuallyDrop::new(self);
        this.handle
    }

    /// Serialized records (`GetMetaFileBitsEx`)
    pub fn bits(&self) -> ClipResult<Vec<u8>> {
        // SAFETY: first call sizes the buffer, second fills it
        unsafe {
            let len = GetMetaFileBitsEx(self.handle, 0, None);
            let mut bits = vec![0u8; len as usize];
            GetMetaFileBitsEx(self.handle, len, Some(bits.as_mut_ptr().cast::<c_void>()));
            Ok(bits)
        }
    }

    /// Independent copy
    pub fn try_clone(&self) -> ClipResult<Self> {
        // SAFETY: self.handle is valid while self lives
        unsafe { Self::copy_from_raw(self.handle) }
    }
}

impl Drop for Metafile {
    fn drop(&mut self) {
        // SAFETY: we own the handle
        unsafe {
            let _ = DeleteMetaFile(self.handle);
        }
    }
}

// =============================================================================
// ANSI Code Page / Apartment
// =============================================================================

/// Encode with the process ANSI code page (`CP_ACP`)
pub fn ansi_encode(text: &str) -> Vec<u8> {
    let wide: Vec<u16> = text.encode_utf16().collect();
    if wide.is_empty() {
        return Vec::new();
    }
    // SAFETY: first call sizes the buffer, second fills it
    unsafe {
        let len = WideCharToMultiByte(CP_ACP, 0, &wide, None, PCSTR::null(), None);
        let mut out = vec![0u8; len.max(0) as usize];
        WideCharToMultiByte(CP_ACP, 0, &wide, Some(&mut out), PCSTR::null(), None);
        out
    }
}

/// Decode with the process ANSI code page (`CP_ACP`)
pub fn ansi_decode(data: &[u8]) -> String {
    if data.is_empty() {
        return String::new();
    }
    // SAFETY: first call sizes the buffer, second fills it
    unsafe {
        let len = MultiByteToWideChar(CP_ACP, MULTI_BYTE_TO_WIDE_CHAR_FLAGS(0), data, None);
        let mut wide = vec![0u16; len.max(0) as usize];
        MultiByteToWideChar(CP_ACP, MULTI_BYTE_TO_WIDE_CHAR_FLAGS(0), data, Some(&mut wide));
        String::from_utf16_lossy(&wide)
    }
}

/// Initialize OLE (and a single-threaded COM apartment) on this thread
pub fn enter_apartment() -> ClipResult<()> {
    // SAFETY: reserved parameter must be null
    unsafe { OleInitialize(None)? };
    tracing::debug!("OLE initialized on {:?}", std::thread::current().name());
    Ok(())
}
