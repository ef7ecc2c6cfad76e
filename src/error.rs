//! Error types for clipboard and data-transfer operations.

use enumflags2::BitFlags;
use thiserror::Error;

use crate::format::FormatId;
use crate::medium::{Aspect, Tymed};

/// Result type for clipboard operations
pub type ClipResult<T> = std::result::Result<T, ClipError>;

/// Errors that can occur while marshaling clipboard data
#[derive(Error, Debug)]
pub enum ClipError {
    /// The requested format is not offered at the requested index
    #[error("format {format} is not available at index {index}")]
    FormatUnavailable {
        /// Requested format
        format: FormatId,
        /// Requested item index (-1 for all)
        index: i32,
    },

    /// Only the content aspect is served
    #[error("unsupported aspect {0:?}")]
    UnsupportedAspect(Aspect),

    /// None of the requested media kinds can be produced
    #[error("unsupported medium {0:?}")]
    UnsupportedMedium(BitFlags<Tymed>),

    /// The producer handed over the wrong medium kind for the format
    #[error("invalid medium: expected {expected:?}, got {actual:?}")]
    InvalidMedium {
        /// Medium kind the extraction needs
        expected: Tymed,
        /// Medium kind that was delivered
        actual: Option<Tymed>,
    },

    /// Native data does not match its documented layout
    #[error("malformed {what}: {reason}")]
    Malformed {
        /// Structure being decoded
        what: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Caller passed an argument the operation cannot use
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// OS memory allocation failed
    #[error("out of memory allocating {0} bytes")]
    OutOfMemory(usize),

    /// The apartment worker did not complete within its timeout
    #[error("apartment call timed out after {0}ms")]
    ApartmentTimeout(u64),

    /// The apartment worker has shut down
    #[error("apartment worker is not running")]
    ApartmentClosed,

    /// Operation is intentionally not supported
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// Clipboard format registration failed
    #[error("failed to register clipboard format {name:?}: {reason}")]
    Registration {
        /// Format name
        name: String,
        /// Backend failure
        reason: String,
    },

    /// Operation needs a facility this platform lacks
    #[error("unsupported on this platform: {0}")]
    Unsupported(&'static str),

    /// Image decode or encode error
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Text recognition failed
    #[error("ocr error: {0}")]
    Ocr(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Windows API error
    #[cfg(windows)]
    #[error("windows error: {0}")]
    Os(#[from] windows::core::Error),
}

impl ClipError {
    /// Shorthand for a [`ClipError::Malformed`] error
    pub fn malformed(what: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            what,
            reason: reason.into(),
        }
    }

    /// Returns true if the error only signals that data is not offered
    pub fn is_absence(&self) -> bool {
        matches!(
            self,
            Self::FormatUnavailable { .. } | Self::UnsupportedAspect(_) | Self::UnsupportedMedium(_)
        )
    }

    /// Returns true if the error indicates a contract violation by the producer
    /// or a broken precondition that retrying cannot fix
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidMedium { .. } | Self::Malformed { .. } | Self::ApartmentTimeout(_) | Self::Registration { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClipError::malformed("DROPFILES", "header too small");
        assert_eq!(err.to_string(), "malformed DROPFILES: header too small");

        let err = ClipError::FormatUnavailable {
            format: FormatId::CF_UNICODETEXT,
            index: 2,
        };
        assert_eq!(err.to_string(), "format 13 is not available at index 2");
    }

    #[test]
    fn test_is_absence() {
        assert!(ClipError::UnsupportedAspect(Aspect::Icon).is_absence());
        assert!(ClipError::FormatUnavailable {
            format: FormatId::CF_TEXT,
            index: -1
        }
        .is_absence());
        assert!(!ClipError::OutOfMemory(16).is_absence());
    }

    #[test]
    fn test_is_fatal() {
        assert!(ClipError::ApartmentTimeout(100).is_fatal());
        assert!(ClipError::InvalidMedium {
            expected: Tymed::HGlobal,
            actual: Some(Tymed::Gdi)
        }
        .is_fatal());
        assert!(!ClipError::NotImplemented("SetData").is_fatal());
    }
}
