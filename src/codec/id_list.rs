//! Shell item identifier lists (PIDLs) and the CIDA array.

use bytes::{BufMut, BytesMut};

use super::{read_u16, read_u32};
use crate::{ClipError, ClipResult};

/// Owned item identifier list
///
/// A PIDL is a chain of `SHITEMID`s (`u16` byte count including itself, then
/// opaque data) closed by a zero count. The bytes held here always include
/// that terminator, so every `IdList` is self-contained.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdList(Vec<u8>);

impl IdList {
    /// The empty list, which names the desktop
    pub fn desktop() -> Self {
        Self(vec![0, 0])
    }

    /// Build a list from raw item payloads (without their length prefixes)
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a [u8]>) -> ClipResult<Self> {
        let mut out = BytesMut::new();
        for item in items {
            let cb = u16::try_from(item.len() + 2)
                .map_err(|_| ClipError::InvalidArgument(format!("{} byte SHITEMID", item.len())))?;
            out.put_u16_le(cb);
            out.put_slice(item);
        }
        out.put_u16_le(0);
        Ok(Self(out.to_vec()))
    }

    /// Copy the list starting at `data`, stopping after its terminator
    pub fn parse(data: &[u8]) -> ClipResult<Self> {
        let mut pos = 0;
        loop {
            if pos + 2 > data.len() {
                return Err(ClipError::malformed("ITEMIDLIST", "missing terminator"));
            }
            let cb = read_u16(data, pos) as usize;
            if cb == 0 {
                return Ok(Self(data[..pos + 2].to_vec()));
            }
            if cb < 2 {
                return Err(ClipError::malformed("ITEMIDLIST", format!("item size {}", cb)));
            }
            pos += cb;
        }
    }

    /// Raw bytes, terminator included
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Byte size, terminator included (`ILGetSize`)
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// True for the desktop list
    pub fn is_desktop(&self) -> bool {
        self.0.len() == 2
    }

    /// Item payloads without their length prefixes
    pub fn items(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let mut pos = 0;
        std::iter::from_fn(move || {
            let cb = read_u16(&self.0, pos) as usize;
            if cb == 0 {
                return None;
            }
            let item = &self.0[pos + 2..pos + cb];
            pos += cb;
            Some(item)
        })
    }

    /// Fresh list holding `self` followed by `child` (`ILCombine`)
    ///
    /// The result owns its bytes; neither input is referenced afterwards.
    pub fn join(&self, child: &IdList) -> IdList {
        let mut bytes = Vec::with_capacity(self.size() + child.size() - 2);
        bytes.extend_from_slice(&self.0[..self.0.len() - 2]);
        bytes.extend_from_slice(&child.0);
        IdList(bytes)
    }
}

/// Parent folder plus child items (`CIDA`, "Shell IDList Array")
///
/// # Format
/// ```text
/// Offset      | Size          | Field
/// ------------|---------------|------
/// 0           | 4             | cidl (number of children)
/// 4           | 4 * (cidl+1)  | aoffset[] (parent first, relative to CIDA start)
/// ...         | ...           | PIDL data
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellIdList {
    /// Folder the children are relative to
    pub parent: IdList,
    /// Child lists, relative to `parent`
    pub items: Vec<IdList>,
}

impl ShellIdList {
    /// Parse a CIDA block
    pub fn parse(data: &[u8]) -> ClipResult<Self> {
        if data.len() < 8 {
            return Err(ClipError::malformed("CIDA", format!("{} bytes", data.len())));
        }

        let count = read_u32(data, 0) as usize;
        let table_end = count
            .checked_add(1)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(4))
            .filter(|&n| n <= data.len())
            .ok_or_else(|| ClipError::malformed("CIDA", format!("{} items declared in {} bytes", count, data.len())))?;

        let list_at = |slot: usize| -> ClipResult<IdList> {
            let offset = read_u32(data, 4 + slot * 4) as usize;
            if offset < table_end || offset >= data.len() {
                return Err(ClipError::malformed("CIDA", format!("offset {} out of range", offset)));
            }
            IdList::parse(&data[offset..])
        };

        let parent = list_at(0)?;
        let items = (1..=count).map(list_at).collect::<ClipResult<Vec<_>>>()?;
        Ok(Self { parent, items })
    }

    /// Serialize to a CIDA block
    pub fn build(&self) -> Vec<u8> {
        let table_len = 4 + 4 * (self.items.len() + 1);
        let lists = std::iter::once(&self.parent).chain(&self.items);

        let mut out = BytesMut::with_capacity(table_len);
        out.put_u32_le(self.items.len() as u32);
        let mut offset = table_len;
        for list in lists.clone() {
            out.put_u32_le(offset as u32);
            offset += list.size();
        }
        for list in lists {
            out.put_slice(list.as_bytes());
        }
        out.to_vec()
    }

    /// Self-contained parent+child lists, one per item
    pub fn absolute_items(&self) -> Vec<IdList> {
        self.items.iter().map(|item| self.parent.join(item)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&[u8]]) -> IdList {
        IdList::from_items(items.iter().copied()).unwrap()
    }

    #[test]
    fn test_from_items_layout() {
        let pidl = list(&[b"ab", b"c"]);
        assert_eq!(pidl.as_bytes(), &[4, 0, b'a', b'b', 3, 0, b'c', 0, 0]);
        assert_eq!(pidl.items().collect::<Vec<_>>(), vec![&b"ab"[..], &b"c"[..]]);
        assert!(IdList::desktop().is_desktop());
    }

    #[test]
    fn test_parse_stops_at_terminator() {
        let mut bytes = list(&[b"xyz"]).as_bytes().to_vec();
        bytes.extend_from_slice(b"trailing");
        let parsed = IdList::parse(&bytes).unwrap();
        assert_eq!(parsed, list(&[b"xyz"]));
        assert!(IdList::parse(&[5, 0, 1]).is_err());
    }

    #[test]
    fn test_join_owns_bytes() {
        let parent = list(&[b"drive"]);
        let child = list(&[b"file"]);
        let joined = parent.join(&child);
        drop(parent);
        assert_eq!(joined, list(&[b"drive", b"file"]));
        assert_eq!(IdList::desktop().join(&child), child);
    }

    #[test]
    fn test_cida_round_trip() {
        let cida = ShellIdList {
            parent: list(&[b"folder"]),
            items: vec![list(&[b"one"]), list(&[b"two", b"deep"])],
        };
        let data = cida.build();
        assert_eq!(read_u32(&data, 0), 2);
        assert_eq!(read_u32(&data, 4), 16);

        let parsed = ShellIdList::parse(&data).unwrap();
        assert_eq!(parsed, cida);
        assert_eq!(
            parsed.absolute_items(),
            vec![list(&[b"folder", b"one"]), list(&[b"folder", b"two", b"deep"])]
        );
    }

    #[test]
    fn test_cida_rejects_bad_offsets() {
        let mut data = ShellIdList {
            parent: IdList::desktop(),
            items: vec![list(&[b"a"])],
        }
        .build();
        data[8] = 0xF0;
        assert!(ShellIdList::parse(&data).is_err());
        assert!(ShellIdList::parse(&[9, 0, 0, 0, 0, 0, 0, 0]).is_err());
    }
}
