//! `FileGroupDescriptorW` records.

use std::path::Path;
use std::time::SystemTime;

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};
use enumflags2::{bitflags, BitFlags};

use super::{read_i32, read_u32, read_u64};
use crate::{ClipError, ClipResult};

/// Size of one FILEDESCRIPTORW record
pub const FILE_DESCRIPTOR_SIZE: usize = 592;

/// Maximum file name length in UTF-16 units, excluding the terminator
const MAX_NAME_UNITS: usize = 259;

/// Seconds between 1601-01-01 and 1970-01-01
const FILETIME_UNIX_OFFSET: i64 = 11_644_473_600;
const FILETIME_TICKS_PER_SECOND: i64 = 10_000_000;

/// Which FILEDESCRIPTORW fields are valid (`FD_*`)
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FdFlag {
    Clsid = 0x0000_0001,
    SizePoint = 0x0000_0002,
    Attributes = 0x0000_0004,
    CreateTime = 0x0000_0008,
    AccessTime = 0x0000_0010,
    WritesTime = 0x0000_0020,
    FileSize = 0x0000_0040,
    ProgressUi = 0x0000_4000,
    LinkUi = 0x0000_8000,
    Unicode = 0x8000_0000,
}

/// Display size and position of a file's icon (`sizel` + `pointl`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizePoint {
    /// Width
    pub cx: i32,
    /// Height
    pub cy: i32,
    /// Horizontal position
    pub x: i32,
    /// Vertical position
    pub y: i32,
}

/// One file in a multi-file transfer
///
/// Optional fields are present exactly when their `FD_*` flag is set; a
/// cleared flag decodes as `None`, never as zero.
///
/// # Format (592 bytes)
/// ```text
/// Offset | Size | Field
/// -------|------|------
/// 0      | 4    | dwFlags
/// 4      | 16   | clsid
/// 20     | 8    | sizel
/// 28     | 8    | pointl
/// 36     | 4    | dwFileAttributes
/// 40     | 8    | ftCreationTime
/// 48     | 8    | ftLastAccessTime
/// 56     | 8    | ftLastWriteTime
/// 64     | 8    | nFileSizeHigh, nFileSizeLow
/// 72     | 520  | cFileName (UTF-16, 260 units)
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Class of the file's handler
    pub clsid: Option<[u8; 16]>,
    /// Icon size and position
    pub size_point: Option<SizePoint>,
    /// `FILE_ATTRIBUTE_*` bits
    pub attributes: Option<u32>,
    /// Creation time
    pub creation_time: Option<DateTime<Utc>>,
    /// Last access time
    pub access_time: Option<DateTime<Utc>>,
    /// Last write time
    pub write_time: Option<DateTime<Utc>>,
    /// Size in bytes
    pub file_size: Option<u64>,
    /// Shell should show a progress dialog while copying
    pub show_progress_ui: bool,
    /// Shell should treat the file as a shortcut
    pub link_ui: bool,
    /// File name, possibly with a relative directory part
    pub name: String,
}

impl FileDescriptor {
    /// Descriptor carrying only a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Describe a file on disk: name, attributes, times and size
    pub fn from_path(path: &Path) -> ClipResult<Self> {
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ClipError::InvalidArgument(format!("{} has no file name", path.display())))?;

        Ok(Self {
            attributes: Some(file_attributes(&metadata)),
            creation_time: metadata.created().ok().map(system_time_to_utc),
            access_time: metadata.accessed().ok().map(system_time_to_utc),
            write_time: metadata.modified().ok().map(system_time_to_utc),
            file_size: (!metadata.is_dir()).then(|| metadata.len()),
            show_progress_ui: true,
            ..Self::new(name)
        })
    }

    fn flags(&self) -> BitFlags<FdFlag> {
        let mut flags = BitFlags::from(FdFlag::Unicode);
        let fields = [
            (self.clsid.is_some(), FdFlag::Clsid),
            (self.size_point.is_some(), FdFlag::SizePoint),
            (self.attributes.is_some(), FdFlag::Attributes),
            (self.creation_time.is_some(), FdFlag::CreateTime),
            (self.access_time.is_some(), FdFlag::AccessTime),
            (self.write_time.is_some(), FdFlag::WritesTime),
            (self.file_size.is_some(), FdFlag::FileSize),
            (self.show_progress_ui, FdFlag::ProgressUi),
            (self.link_ui, FdFlag::LinkUi),
        ];
        for (present, flag) in fields {
            if present {
                flags |= flag;
            }
        }
        flags
    }

    /// Parse one record
    pub fn parse(data: &[u8]) -> ClipResult<Self> {
        if data.len() < FILE_DESCRIPTOR_SIZE {
            return Err(ClipError::malformed(
                "FILEDESCRIPTORW",
                format!("{} bytes, need {}", data.len(), FILE_DESCRIPTOR_SIZE),
            ));
        }

        let flags = BitFlags::<FdFlag>::from_bits_truncate(read_u32(data, 0));
        let time_at = |flag: FdFlag, offset: usize| -> ClipResult<Option<DateTime<Utc>>> {
            if flags.contains(flag) {
                filetime_to_utc(read_u64(data, offset)).map(Some)
            } else {
                Ok(None)
            }
        };

        let clsid = flags.contains(FdFlag::Clsid).then(|| {
            let mut clsid = [0u8; 16];
            clsid.copy_from_slice(&data[4..20]);
            clsid
        });
        let size_point = flags.contains(FdFlag::SizePoint).then(|| SizePoint {
            cx: read_i32(data, 20),
            cy: read_i32(data, 24),
            x: read_i32(data, 28),
            y: read_i32(data, 32),
        });
        let attributes = flags.contains(FdFlag::Attributes).then(|| read_u32(data, 36));
        let file_size = flags
            .contains(FdFlag::FileSize)
            .then(|| (u64::from(read_u32(data, 64)) << 32) | u64::from(read_u32(data, 68)));

        let name: Vec<u16> = data[72..FILE_DESCRIPTOR_SIZE]
            .chunks_exact(2)
            .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
            .take_while(|&c| c != 0)
            .collect();

        Ok(Self {
            clsid,
            size_point,
            attributes,
            creation_time: time_at(FdFlag::CreateTime, 40)?,
            access_time: time_at(FdFlag::AccessTime, 48)?,
            write_time: time_at(FdFlag::WritesTime, 56)?,
            file_size,
            show_progress_ui: flags.contains(FdFlag::ProgressUi),
            link_ui: flags.contains(FdFlag::LinkUi),
            name: String::from_utf16_lossy(&name),
        })
    }

    /// Serialize one 592-byte record
    pub fn build(&self) -> ClipResult<Vec<u8>> {
        let name: Vec<u16> = self.name.encode_utf16().collect();
        if name.len() > MAX_NAME_UNITS {
            return Err(ClipError::InvalidArgument(format!(
                "file name is {} UTF-16 units, maximum is {}",
                name.len(),
                MAX_NAME_UNITS
            )));
        }

        let mut out = BytesMut::with_capacity(FILE_DESCRIPTOR_SIZE);
        out.put_u32_le(self.flags().bits());
        out.put_slice(&self.clsid.unwrap_or_default());

        let sp = self.size_point.unwrap_or_default();
        out.put_i32_le(sp.cx);
        out.put_i32_le(sp.cy);
        out.put_i32_le(sp.x);
        out.put_i32_le(sp.y);

        out.put_u32_le(self.attributes.unwrap_or(0));
        for time in [self.creation_time, self.access_time, self.write_time] {
            out.put_u64_le(time.map(utc_to_filetime).transpose()?.unwrap_or(0));
        }

        let size = self.file_size.unwrap_or(0);
        out.put_u32_le((size >> 32) as u32);
        out.put_u32_le(size as u32);

        for unit in &name {
            out.put_u16_le(*unit);
        }
        out.resize(FILE_DESCRIPTOR_SIZE, 0);

        Ok(out.to_vec())
    }

    /// Parse a FILEGROUPDESCRIPTORW block: a count followed by that many records
    ///
    /// The block must hold every declared record.
    pub fn parse_group(data: &[u8]) -> ClipResult<Vec<Self>> {
        if data.len() < 4 {
            return Err(ClipError::malformed("FILEGROUPDESCRIPTORW", "missing item count"));
        }

        let count = read_u32(data, 0) as usize;
        let expected = count
            .checked_mul(FILE_DESCRIPTOR_SIZE)
            .and_then(|n| n.checked_add(4))
            .filter(|&n| n <= data.len())
            .ok_or_else(|| {
                ClipError::malformed(
                    "FILEGROUPDESCRIPTORW",
                    format!("{} records declared in {} bytes", count, data.len()),
                )
            })?;

        data[4..expected]
            .chunks_exact(FILE_DESCRIPTOR_SIZE)
            .map(Self::parse)
            .collect()
    }

    /// Serialize a FILEGROUPDESCRIPTORW block
    pub fn build_group(descriptors: &[Self]) -> ClipResult<Vec<u8>> {
        let mut out = Vec::with_capacity(4 + descriptors.len() * FILE_DESCRIPTOR_SIZE);
        out.extend_from_slice(&(descriptors.len() as u32).to_le_bytes());
        for descriptor in descriptors {
            out.extend_from_slice(&descriptor.build()?);
        }
        Ok(out)
    }
}

// =============================================================================
// FILETIME Conversion
// =============================================================================

fn filetime_to_utc(raw: u64) -> ClipResult<DateTime<Utc>> {
    let ticks = i64::try_from(raw).map_err(|_| ClipError::malformed("FILETIME", format!("{} out of range", raw)))?;
    let secs = ticks.div_euclid(FILETIME_TICKS_PER_SECOND) - FILETIME_UNIX_OFFSET;
    let nanos = (ticks.rem_euclid(FILETIME_TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
        .ok_or_else(|| ClipError::malformed("FILETIME", format!("{} out of range", ticks)))
}

/// FILETIME ticks for `time`; times before 1601 or past the 63-bit tick
/// range are rejected
fn utc_to_filetime(time: DateTime<Utc>) -> ClipResult<u64> {
    let out_of_range = || ClipError::InvalidArgument(format!("{} is outside the FILETIME range", time));
    let ticks = time
        .timestamp()
        .checked_add(FILETIME_UNIX_OFFSET)
        .and_then(|secs| secs.checked_mul(FILETIME_TICKS_PER_SECOND))
        .and_then(|ticks| ticks.checked_add(i64::from(time.timestamp_subsec_nanos() / 100)))
        .ok_or_else(out_of_range)?;
    u64::try_from(ticks).map_err(|_| out_of_range())
}

fn system_time_to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[cfg(windows)]
fn file_attributes(metadata: &std::fs::Metadata) -> u32 {
    use std::os::windows::fs::MetadataExt;
    metadata.file_attributes()
}

#[cfg(not(windows))]
fn file_attributes(metadata: &std::fs::Metadata) -> u32 {
    const FILE_ATTRIBUTE_READONLY: u32 = 0x01;
    const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x10;
    const FILE_ATTRIBUTE_NORMAL: u32 = 0x80;

    let mut attributes = if metadata.is_dir() {
        FILE_ATTRIBUTE_DIRECTORY
    } else {
        FILE_ATTRIBUTE_NORMAL
    };
    if metadata.permissions().readonly() {
        attributes = (attributes & !FILE_ATTRIBUTE_NORMAL) | FILE_ATTRIBUTE_READONLY;
    }
    attributes
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample() -> FileDescriptor {
        FileDescriptor {
            attributes: Some(0x20),
            creation_time: Some(Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap()),
            write_time: Some(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()),
            file_size: Some(0x1_0000_0010),
            show_progress_ui: true,
            ..FileDescriptor::new("report.txt")
        }
    }

    #[test]
    fn test_record_layout() {
        let data = sample().build().unwrap();
        assert_eq!(data.len(), FILE_DESCRIPTOR_SIZE);

        let flags = read_u32(&data, 0);
        assert_eq!(flags, 0x8000_0000 | 0x4000 | 0x40 | 0x20 | 0x08 | 0x04);
        assert_eq!(read_u32(&data, 36), 0x20);
        assert_eq!(read_u32(&data, 64), 1);
        assert_eq!(read_u32(&data, 68), 0x10);
        assert_eq!(u16::from_le_bytes([data[72], data[73]]), u16::from(b'r'));
    }

    #[test]
    fn test_group_round_trip_keeps_absent_fields() {
        let descriptors = vec![sample(), FileDescriptor::new("bare")];
        let data = FileDescriptor::build_group(&descriptors).unwrap();
        assert_eq!(data.len(), 4 + 2 * FILE_DESCRIPTOR_SIZE);

        let parsed = FileDescriptor::parse_group(&data).unwrap();
        assert_eq!(parsed, descriptors);

        assert_eq!(parsed[0].access_time, None);
        assert_eq!(parsed[0].clsid, None);
        assert_eq!(parsed[1].file_size, None);
        assert_eq!(parsed[1].attributes, None);
        assert_eq!(parsed[1].creation_time, None);
    }

    #[test]
    fn test_set_flag_with_zero_value_is_present() {
        let descriptor = FileDescriptor {
            file_size: Some(0),
            attributes: Some(0),
            ..FileDescriptor::new("empty")
        };
        let parsed = FileDescriptor::parse(&descriptor.build().unwrap()).unwrap();
        assert_eq!(parsed.file_size, Some(0));
        assert_eq!(parsed.attributes, Some(0));
    }

    #[test]
    fn test_parse_group_rejects_short_block() {
        let mut data = FileDescriptor::build_group(&[sample()]).unwrap();
        data[0] = 3;
        assert!(matches!(
            FileDescriptor::parse_group(&data),
            Err(ClipError::Malformed { .. })
        ));
    }

    #[test]
    fn test_name_too_long() {
        let descriptor = FileDescriptor::new("x".repeat(300));
        assert!(matches!(descriptor.build(), Err(ClipError::InvalidArgument(_))));
    }

    #[test]
    fn test_filetime_epoch() {
        let unix_epoch = filetime_to_utc(116_444_736_000_000_000).unwrap();
        assert_eq!(unix_epoch.timestamp(), 0);
        assert_eq!(utc_to_filetime(unix_epoch).unwrap(), 116_444_736_000_000_000);
    }

    #[test]
    fn test_time_outside_filetime_range_rejected() {
        let mut far_future = sample();
        far_future.write_time = Some(DateTime::<Utc>::MAX_UTC);
        assert!(matches!(far_future.build(), Err(ClipError::InvalidArgument(_))));

        let mut before_1601 = sample();
        before_1601.creation_time = Some(Utc.with_ymd_and_hms(1336, 3, 23, 0, 0, 0).unwrap());
        assert!(matches!(before_1601.build(), Err(ClipError::InvalidArgument(_))));

        let earliest = Utc.with_ymd_and_hms(1601, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(utc_to_filetime(earliest).unwrap(), 0);
    }

    #[test]
    fn test_filetime_above_i64_is_malformed() {
        assert!(matches!(filetime_to_utc(u64::MAX), Err(ClipError::Malformed { .. })));
        assert!(matches!(filetime_to_utc(1 << 63), Err(ClipError::Malformed { .. })));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let descriptor = FileDescriptor::from_path(&path).unwrap();
        assert_eq!(descriptor.name, "data.bin");
        assert_eq!(descriptor.file_size, Some(3));
        assert!(descriptor.write_time.is_some());
        assert!(descriptor.attributes.is_some());
    }
}
