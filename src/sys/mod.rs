//! OS resources behind the transfer media.
//!
//! On Windows these wrap real handles (`HGLOBAL`, `HBITMAP`, `HENHMETAFILE`,
//! `HMETAFILEPICT` contents) and release them on drop. Elsewhere the same API
//! is backed by process memory so the data-transfer model, codecs and
//! [`DataStore`](crate::store::DataStore) run and test everywhere.
//!
//! Both backends expose:
//!
//! - [`GlobalMemory`] with scoped [`GlobalLock`] / [`GlobalLockMut`] guards
//! - [`DeviceBitmap`], a 32bpp premultiplied device bitmap
//! - [`Metafile`] and [`EnhMetafile`]
//! - [`ansi_encode`] / [`ansi_decode`] for the ANSI code page
//! - [`enter_apartment`], which prepares the calling thread for OLE

#[cfg(not(windows))]
mod portable;
#[cfg(windows)]
mod win32;

#[cfg(not(windows))]
pub use portable::{
    ansi_decode, ansi_encode, enter_apartment, DeviceBitmap, EnhMetafile, GlobalLock, GlobalLockMut, GlobalMemory,
    Metafile,
};
#[cfg(windows)]
pub use win32::{
    ansi_decode, ansi_encode, enter_apartment, DeviceBitmap, EnhMetafile, GlobalLock, GlobalLockMut, GlobalMemory,
    Metafile,
};

use image::RgbaImage;

use crate::codec::dib::{self, AlphaMode};
use crate::ClipResult;

impl GlobalMemory {
    /// Copy the whole block into a `Vec`
    pub fn to_vec(&self) -> ClipResult<Vec<u8>> {
        Ok(self.lock()?.to_vec())
    }

    /// Independent block with the same contents
    pub fn try_clone(&self) -> ClipResult<Self> {
        Self::from_bytes(&self.lock()?)
    }

    /// Overwrite the block with `bytes`, growing it when needed
    pub fn write_all(&mut self, bytes: &[u8]) -> ClipResult<()> {
        if self.len() < bytes.len() {
            self.resize(bytes.len())?;
        }
        let mut lock = self.lock_mut()?;
        lock[..bytes.len()].copy_from_slice(bytes);
        lock[bytes.len()..].fill(0);
        Ok(())
    }
}

impl DeviceBitmap {
    /// Read the bitmap as straight RGBA, interpreting alpha per `mode`
    pub fn to_image(&self, mode: AlphaMode) -> ClipResult<RgbaImage> {
        let (width, height) = self.dimensions();
        let mode = if self.bits_per_pixel() < 32 { AlphaMode::Ignore } else { mode };
        dib::from_bgra(width, height, &self.read_bgra()?, mode)
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    #[test]
    fn test_global_memory_write_all_grows() {
        let mut memory = GlobalMemory::alloc(2).unwrap();
        memory.write_all(b"hello").unwrap();
        assert!(memory.len() >= 5);
        assert_eq!(&memory.to_vec().unwrap()[..5], b"hello");

        let copy = memory.try_clone().unwrap();
        memory.write_all(b"x").unwrap();
        assert_eq!(&copy.to_vec().unwrap()[..5], b"hello");
    }

    #[test]
    fn test_device_bitmap_keeps_alpha() {
        let mut image = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255]));
        image.put_pixel(1, 0, Rgba([255, 0, 0, 128]));

        let bitmap = DeviceBitmap::from_image(&image).unwrap();
        assert_eq!(bitmap.dimensions(), (2, 2));
        assert_eq!(bitmap.bits_per_pixel(), 32);

        let straight = bitmap.to_image(AlphaMode::Premultiplied).unwrap();
        assert_eq!(straight.get_pixel(1, 0), &Rgba([255, 0, 0, 128]));
        assert_eq!(straight.get_pixel(0, 1), &Rgba([0, 0, 255, 255]));

        let flat = bitmap.to_image(AlphaMode::Ignore).unwrap();
        assert_eq!(flat.get_pixel(1, 0)[3], 255);
    }
}
