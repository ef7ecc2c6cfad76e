//! Process-memory backend used off Windows.

use std::ops::{Deref, DerefMut};

use image::RgbaImage;

use crate::codec::dib;
use crate::codec::text::{windows1252_decode, windows1252_encode};
use crate::{ClipError, ClipResult};

/// Movable global memory block
#[derive(Debug)]
pub struct GlobalMemory {
    bytes: Vec<u8>,
}

impl GlobalMemory {
    /// Allocate a zeroed block of `len` bytes
    pub fn alloc(len: usize) -> ClipResult<Self> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(len).map_err(|_| ClipError::OutOfMemory(len))?;
        bytes.resize(len, 0);
        Ok(Self { bytes })
    }

    /// Allocate a block holding a copy of `data`
    pub fn from_bytes(data: &[u8]) -> ClipResult<Self> {
        let mut memory = Self::alloc(data.len())?;
        memory.bytes.copy_from_slice(data);
        Ok(memory)
    }

    /// Block size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for a zero-sized block
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lock for reading; unlocked when the guard drops
    pub fn lock(&self) -> ClipResult<GlobalLock<'_>> {
        Ok(GlobalLock { bytes: &self.bytes })
    }

    /// Lock for writing; unlocked when the guard drops
    pub fn lock_mut(&mut self) -> ClipResult<GlobalLockMut<'_>> {
        Ok(GlobalLockMut { bytes: &mut self.bytes })
    }

    /// Grow or shrink the block, zero-filling new bytes
    pub fn resize(&mut self, len: usize) -> ClipResult<()> {
        if len > self.bytes.len() {
            self.bytes
                .try_reserve_exact(len - self.bytes.len())
                .map_err(|_| ClipError::OutOfMemory(len))?;
        }
        self.bytes.resize(len, 0);
        Ok(())
    }
}

/// Read lock on a [`GlobalMemory`]
#[derive(Debug)]
pub struct GlobalLock<'a> {
    bytes: &'a [u8],
}

impl Deref for GlobalLock<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

/// Write lock on a [`GlobalMemory`]
#[derive(Debug)]
pub struct GlobalLockMut<'a> {
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

/// 32bpp device bitmap with premultiplied alpha
#[derive(Debug, Clone)]
pub struct DeviceBitmap {
    width: u32,
    height: u32,
    bgra: Vec<u8>,
}

impl DeviceBitmap {
    /// Render a straight RGBA image into a fresh bitmap
    pub fn from_image(image: &RgbaImage) -> ClipResult<Self> {
        let (width, height) = image.dimensions();
        Ok(Self {
            width,
            height,
            bgra: dib::to_premultiplied_bgra(image),
        })
    }

    /// Bitmap from top-down premultiplied BGRA rows
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
        Ok(Self {
            width,
            height,
            bgra: bgra[..len].to_vec(),
        })
    }

    /// Width and height in pixels
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Color depth of the bitmap
    pub fn bits_per_pixel(&self) -> u16 {
        32
    }

    /// Pixels as top-down BGRA rows
    pub fn read_bgra(&self) -> ClipResult<Vec<u8>> {
        Ok(self.bgra.clone())
    }

    /// Independent copy
    pub fn try_clone(&self) -> ClipResult<Self> {
        Ok(self.clone())
    }
}

macro_rules! metafile_type {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone)]
        pub struct $name {
            bits: Vec<u8>,
        }

        impl $name {
            /// Load from serialized records
            pub fn from_bytes(bits: &[u8]) -> ClipResult<Self> {
                Ok(Self { bits: bits.to_vec() })
            }

            /// Serialized records
            pub fn bits(&self) -> ClipResult<Vec<u8>> {
                Ok(self.bits.clone())
            }

            /// Independent copy
            pub fn try_clone(&self) -> ClipResult<Self> {
                Ok(self.clone())
            }
        }
    };
}

metafile_type!(Metafile, "Windows metafile");
metafile_type!(EnhMetafile, "Enhanced metafile");

/// Encode with the ANSI code page (Windows-1252 here)
pub fn ansi_encode(text: &str) -> Vec<u8> {
    windows1252_encode(text)
}

/// Decode with the ANSI code page (Windows-1252 here)
pub fn ansi_decode(data: &[u8]) -> String {
    windows1252_decode(data)
}

/// No apartment model outside Windows
pub fn enter_apartment() -> ClipResult<()> {
    tracing::trace!("No OLE apartment on this platform");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_guards() {
        let mut memory = GlobalMemory::from_bytes(b"data").unwrap();
        {
            let mut lock = memory.lock_mut().unwrap();
            lock[0] = b'D';
        }
        assert_eq!(&*memory.lock().unwrap(), b"Data");
        memory.resize(6).unwrap();
        assert_eq!(memory.to_vec().unwrap(), b"Data\0\0");
    }

    #[test]
    fn test_huge_alloc_is_out_of_memory() {
        let err = GlobalMemory::alloc(usize::MAX).unwrap_err();
        assert!(matches!(err, ClipError::OutOfMemory(_)));
    }

    #[test]
    fn test_from_bgra_checks_length() {
        assert!(DeviceBitmap::from_bgra(2, 2, &[0; 8]).is_err());
        let bitmap = DeviceBitmap::from_bgra(1, 1, &[1, 2, 3, 4]).unwrap();
        assert_eq!(bitmap.read_bgra().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_metafile_copies_are_independent() {
        let metafile = EnhMetafile::from_bytes(&[1, 0, 0, 0, 8, 0, 0, 0]).unwrap();
        let copy = metafile.try_clone().unwrap();
        drop(metafile);
        assert_eq!(copy.bits().unwrap(), vec![1, 0, 0, 0, 8, 0, 0, 0]);
    }
}
