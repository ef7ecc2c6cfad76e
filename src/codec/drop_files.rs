//! `CF_HDROP` file lists.

use std::path::PathBuf;

use bytes::{BufMut, BytesMut};

use super::{read_i32, read_u32};
use crate::{ClipError, ClipResult};

/// DROPFILES header plus its path list
///
/// # Format
/// ```text
/// Offset | Size | Field
/// -------|------|------
/// 0      | 4    | pFiles (offset of the path list)
/// 4      | 8    | pt (drop point)
/// 12     | 4    | fNC (point is in non-client coordinates)
/// 16     | 4    | fWide (paths are UTF-16)
/// 20     | ...  | path\0path\0\0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropFiles {
    /// Drop point
    pub point: (i32, i32),
    /// Drop point is in non-client coordinates
    pub non_client: bool,
    /// Path list is UTF-16
    pub wide: bool,
    /// Dropped paths
    pub files: Vec<PathBuf>,
}

impl DropFiles {
    /// Size of the fixed header
    pub const HEADER_SIZE: usize = 20;

    /// Wide (UTF-16) drop list for `files`
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            wide: true,
            files,
            ..Self::default()
        }
    }

    /// Serialize header and double-null-terminated path list
    pub fn build(&self) -> Vec<u8> {
        let mut out = BytesMut::with_capacity(Self::HEADER_SIZE + 2);
        out.put_u32_le(Self::HEADER_SIZE as u32);
        out.put_i32_le(self.point.0);
        out.put_i32_le(self.point.1);
        out.put_u32_le(u32::from(self.non_client));
        out.put_u32_le(u32::from(self.wide));

        for file in &self.files {
            let path = file.to_string_lossy();
            if self.wide {
                for unit in path.encode_utf16() {
                    out.put_u16_le(unit);
                }
                out.put_u16_le(0);
            } else {
                out.put_slice(&crate::sys::ansi_encode(&path));
                out.put_u8(0);
            }
        }

        // Final terminator; an empty list still needs both nulls
        if self.wide {
            out.put_u16_le(0);
            if self.files.is_empty() {
                out.put_u16_le(0);
            }
        } else {
            out.put_u8(0);
            if self.files.is_empty() {
                out.put_u8(0);
            }
        }

        out.to_vec()
    }

    /// Parse a DROPFILES block
    pub fn parse(data: &[u8]) -> ClipResult<Self> {
        if data.len() < Self::HEADER_SIZE {
            return Err(ClipError::malformed(
                "DROPFILES",
                format!("{} bytes, header needs {}", data.len(), Self::HEADER_SIZE),
            ));
        }

        let p_files = read_u32(data, 0) as usize;
        let point = (read_i32(data, 4), read_i32(data, 8));
        let non_client = read_u32(data, 12) != 0;
        let wide = read_u32(data, 16) != 0;

        if p_files < Self::HEADER_SIZE || p_files > data.len() {
            return Err(ClipError::malformed(
                "DROPFILES",
                format!("pFiles offset {} outside {} byte block", p_files, data.len()),
            ));
        }

        let list = &data[p_files..];
        let files = if wide { parse_wide_list(list)? } else { parse_ansi_list(list)? };

        Ok(Self {
            point,
            non_client,
            wide,
            files,
        })
    }
}

fn parse_wide_list(list: &[u8]) -> ClipResult<Vec<PathBuf>> {
    let units: Vec<u16> = list
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .collect();

    let mut files = Vec::new();
    let mut rest = &units[..];
    loop {
        let Some(end) = rest.iter().position(|&c| c == 0) else {
            if rest.is_empty() {
                break;
            }
            return Err(ClipError::malformed("DROPFILES", "unterminated path"));
        };
        if end == 0 {
            break;
        }
        files.push(PathBuf::from(String::from_utf16_lossy(&rest[..end])));
        rest = &rest[end + 1..];
    }
    Ok(files)
}

fn parse_ansi_list(list: &[u8]) -> ClipResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut rest = list;
    loop {
        let Some(end) = rest.iter().position(|&b| b == 0) else {
            if rest.is_empty() {
                break;
            }
            return Err(ClipError::malformed("DROPFILES", "unterminated path"));
        };
        if end == 0 {
            break;
        }
        files.push(PathBuf::from(crate::sys::ansi_decode(&rest[..end])));
        rest = &rest[end + 1..];
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_layout() {
        let drop = DropFiles::new(vec![PathBuf::from("C:\\a.txt"), PathBuf::from("C:\\b")]);
        let data = drop.build();

        assert_eq!(read_u32(&data, 0), 20);
        assert_eq!(read_u32(&data, 16), 1);

        let list = &data[20..];
        let expected: Vec<u8> = "C:\\a.txt\0C:\\b\0\0"
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect();
        assert_eq!(list, &expected[..]);
        assert!(data.ends_with(&[0, 0, 0, 0]));
    }

    #[test]
    fn test_parse_round_trip() {
        let drop = DropFiles::new(vec![PathBuf::from("/tmp/one"), PathBuf::from("/tmp/twö")]);
        let parsed = DropFiles::parse(&drop.build()).unwrap();
        assert_eq!(parsed, drop);
    }

    #[test]
    fn test_empty_list() {
        let data = DropFiles::new(Vec::new()).build();
        assert_eq!(data.len(), 24);
        assert!(DropFiles::parse(&data).unwrap().files.is_empty());
    }

    #[test]
    fn test_parse_ansi_list() {
        let mut data = vec![0u8; 20];
        data[0] = 20;
        data.extend_from_slice(b"C:\\x\0C:\\y\0\0");
        let parsed = DropFiles::parse(&data).unwrap();
        assert!(!parsed.wide);
        assert_eq!(parsed.files, vec![PathBuf::from("C:\\x"), PathBuf::from("C:\\y")]);
    }

    #[test]
    fn test_parse_rejects_bad_offset() {
        let mut data = DropFiles::new(vec![PathBuf::from("x")]).build();
        data[0] = 0xFF;
        assert!(matches!(DropFiles::parse(&data), Err(ClipError::Malformed { .. })));
        assert!(DropFiles::parse(&[0u8; 8]).is_err());
    }

    #[test]
    fn test_parse_rejects_unterminated_path() {
        let mut data = vec![0u8; 20];
        data[0] = 20;
        data[16] = 1;
        data.extend_from_slice(&[b'a', 0, b'b', 0]);
        assert!(DropFiles::parse(&data).is_err());
    }
}
