//! Shell item ID lists for file system paths.

use std::path::{Path, PathBuf};

use tracing::debug;
use windows::core::HSTRING;
use windows::Win32::System::Com::{CoTaskMemFree, IBindCtx};
use windows::Win32::UI::Shell::Common::ITEMIDLIST;
use windows::Win32::UI::Shell::{ILGetSize, SHParseDisplayName};

use crate::codec::{IdList, ShellIdList};
use crate::{ClipError, ClipResult};

/// Resolve `paths` to a `Shell IDList Array` rooted at the desktop
///
/// Relative paths are taken against the current directory. Each item is
/// the absolute ID list of its path.
pub fn shell_id_list_from_paths(paths: &[PathBuf]) -> ClipResult<ShellIdList> {
    crate::apartment::enter_current_thread()?;
    let cwd = std::env::current_dir()?;
    let items = paths
        .iter()
        .map(|path| absolute_id_list(&cwd.join(path)))
        .collect::<ClipResult<Vec<_>>>()?;
    debug!("Resolved {} shell items", items.len());
    Ok(ShellIdList {
        parent: IdList::desktop(),
        items,
    })
}

fn absolute_id_list(path: &Path) -> ClipResult<IdList> {
    let mut pidl: *mut ITEMIDLIST = std::ptr::null_mut();
    // SAFETY: pidl receives a CoTaskMem allocation owned by us
    unsafe { SHParseDisplayName(&HSTRING::from(path.as_os_str()), None::<&IBindCtx>, &mut pidl, 0, None) }
        .map_err(|e| ClipError::InvalidArgument(format!("{}: {}", path.display(), e.message())))?;

    // SAFETY: pidl is a valid list of ILGetSize bytes, freed exactly once
    unsafe {
        let size = ILGetSize(Some(pidl)) as usize;
        let bytes = std::slice::from_raw_parts(pidl.cast::<u8>(), size);
        let list = IdList::parse(bytes);
        CoTaskMemFree(Some(pidl.cast_const().cast()));
        list
    }
}
