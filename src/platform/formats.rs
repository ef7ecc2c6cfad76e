//! OS clipboard format table.

use windows::core::HSTRING;
use windows::Win32::System::DataExchange::{GetClipboardFormatNameW, RegisterClipboardFormatW};

use crate::format::{FormatBackend, FormatId};
use crate::{ClipError, ClipResult};

/// Format backend over `RegisterClipboardFormatW`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFormats;

impl FormatBackend for SystemFormats {
    fn register(&self, name: &str) -> ClipResult<FormatId> {
        // SAFETY: the HSTRING outlives the call and is null-terminated
        let id = unsafe { RegisterClipboardFormatW(&HSTRING::from(name)) };
        if id == 0 {
            return Err(ClipError::Registration {
                name: name.to_string(),
                reason: windows::core::Error::from_win32().to_string(),
            });
        }
        Ok(FormatId(id))
    }

    fn lookup_name(&self, id: FormatId) -> Option<String> {
        let mut buffer = [0u16; 256];
        // SAFETY: buffer is writable for its whole length
        let len = unsafe { GetClipboardFormatNameW(id.id(), &mut buffer) };
        if len <= 0 {
            return None;
        }
        Some(String::from_utf16_lossy(&buffer[..len as usize]))
    }
}
