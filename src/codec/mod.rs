//! Binary layouts of the data carried by clipboard formats.
//!
//! Everything here is pure byte work with no OS calls, so it runs and is
//! tested on every platform:
//!
//! - [`text`] - per-format string encodings and byte-order-mark detection
//! - [`DropFiles`] - `CF_HDROP` path lists
//! - [`FileDescriptor`] - `FileGroupDescriptorW` records
//! - [`ShellIdList`] / [`IdList`] - `Shell IDList Array` (CIDA) and PIDLs
//! - [`dib`] - packed device-independent bitmaps and alpha conversion
//! - [`HtmlFormat`] - the `HTML Format` header

pub mod dib;
mod drop_files;
mod file_descriptor;
mod html;
mod id_list;
pub mod text;

pub use drop_files::DropFiles;
pub use file_descriptor::{FileDescriptor, SizePoint, FILE_DESCRIPTOR_SIZE};
pub use html::HtmlFormat;
pub use id_list::{IdList, ShellIdList};
pub use text::{decode_string, encode_string, TextEncoding};

use enumflags2::BitFlags;

use crate::medium::DropEffect;
use crate::{ClipError, ClipResult};

/// Fixed-size little-endian record that can be read from the start of a
/// global memory block
pub trait Record: Sized {
    /// Bytes the record occupies
    const SIZE: usize;

    /// Decode from `bytes`, which must hold at least [`Record::SIZE`] bytes
    fn read(bytes: &[u8]) -> ClipResult<Self>;
}

fn require(bytes: &[u8], size: usize, what: &'static str) -> ClipResult<()> {
    if bytes.len() < size {
        return Err(ClipError::malformed(
            what,
            format!("{} bytes, need {}", bytes.len(), size),
        ));
    }
    Ok(())
}

impl Record for u32 {
    const SIZE: usize = 4;

    fn read(bytes: &[u8]) -> ClipResult<Self> {
        require(bytes, Self::SIZE, "DWORD")?;
        Ok(read_u32(bytes, 0))
    }
}

impl Record for i32 {
    const SIZE: usize = 4;

    fn read(bytes: &[u8]) -> ClipResult<Self> {
        require(bytes, Self::SIZE, "LONG")?;
        Ok(read_i32(bytes, 0))
    }
}

impl Record for u64 {
    const SIZE: usize = 8;

    fn read(bytes: &[u8]) -> ClipResult<Self> {
        require(bytes, Self::SIZE, "QWORD")?;
        Ok(read_u64(bytes, 0))
    }
}

impl Record for [u8; 16] {
    const SIZE: usize = 16;

    fn read(bytes: &[u8]) -> ClipResult<Self> {
        require(bytes, Self::SIZE, "GUID")?;
        let mut guid = [0u8; 16];
        guid.copy_from_slice(&bytes[..16]);
        Ok(guid)
    }
}

impl Record for BitFlags<DropEffect> {
    const SIZE: usize = 4;

    fn read(bytes: &[u8]) -> ClipResult<Self> {
        Ok(BitFlags::from_bits_truncate(u32::read(bytes)?))
    }
}

// =============================================================================
// Little-endian helpers (callers check bounds)
// =============================================================================

pub(crate) fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

pub(crate) fn read_i32(data: &[u8], offset: usize) -> i32 {
    read_u32(data, offset) as i32
}

pub(crate) fn read_u64(data: &[u8], offset: usize) -> u64 {
    u64::from(read_u32(data, offset)) | (u64::from(read_u32(data, offset + 4)) << 32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_records() {
        let bytes = [0x05, 0x00, 0x00, 0x80, 0xFF];
        assert_eq!(u32::read(&bytes).unwrap(), 0x8000_0005);
        assert_eq!(i32::read(&bytes).unwrap(), 0x8000_0005_u32 as i32);

        let effect = BitFlags::<DropEffect>::read(&bytes).unwrap();
        assert!(effect.contains(DropEffect::Copy | DropEffect::Link | DropEffect::Scroll));
        assert!(!effect.contains(DropEffect::Move));
    }

    #[test]
    fn test_short_record_is_malformed() {
        let err = u64::read(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, ClipError::Malformed { what: "QWORD", .. }));
    }

    #[test]
    fn test_read_u64_halves() {
        let bytes = [1, 0, 0, 0, 2, 0, 0, 0];
        assert_eq!(read_u64(&bytes, 0), (2u64 << 32) | 1);
    }
}
