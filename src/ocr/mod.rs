//! Text recognition over clipboard images.
//!
//! [`OcrEngine`] is the seam; on Windows [`WindowsOcr`] drives the system
//! `Windows.Media.Ocr` recognizer. Other platforms have no engine and
//! [`default_engine`] reports [`ClipError::Unsupported`](crate::ClipError::Unsupported).

use image::RgbaImage;

use crate::ClipResult;

/// Recognizes text in an image
pub trait OcrEngine {
    /// Recognize the text in `image`
    ///
    /// `language` is a BCP-47 tag; `None` lets the engine pick from the
    /// user's profile languages.
    fn recognize(&self, image: &RgbaImage, language: Option<&str>) -> ClipResult<String>;

    /// Language tags the engine can recognize
    fn available_languages(&self) -> ClipResult<Vec<String>>;
}

/// Remove every whitespace character
///
/// Recognizers insert spaces between CJK glyphs; stripping them gives back
/// the original run of text.
pub fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// The platform's engine
#[cfg(windows)]
pub fn default_engine() -> ClipResult<Box<dyn OcrEngine>> {
    Ok(Box::new(WindowsOcr))
}

/// The platform's engine
#[cfg(not(windows))]
pub fn default_engine() -> ClipResult<Box<dyn OcrEngine>> {
    Err(crate::ClipError::Unsupported("text recognition"))
}

#[cfg(windows)]
pub use windows_ocr::WindowsOcr;

#[cfg(windows)]
mod windows_ocr {
    use image::RgbaImage;
    use tracing::debug;
    use windows::core::HSTRING;
    use windows::Globalization::Language;
    use windows::Graphics::Imaging::{BitmapAlphaMode, BitmapPixelFormat, SoftwareBitmap};
    use windows::Media::Ocr::OcrEngine as SystemOcr;
    use windows::Storage::Streams::DataWriter;

    use super::OcrEngine;
    use crate::codec::dib;
    use crate::{ClipError, ClipResult};

    /// `Windows.Media.Ocr` recognizer
    #[derive(Debug, Default, Clone, Copy)]
    pub struct WindowsOcr;

    impl WindowsOcr {
        fn engine(language: Option<&str>) -> ClipResult<SystemOcr> {
            let engine = match language {
                Some(tag) => {
                    let language = Language::CreateLanguage(&HSTRING::from(tag))?;
                    if !SystemOcr::IsLanguageSupported(&language)? {
                        return Err(ClipError::Ocr(format!("language {} is not installed", tag)));
                    }
                    SystemOcr::TryCreateFromLanguage(&language)?
                }
                None => SystemOcr::TryCreateFromUserProfileLanguages()?,
            };
            debug!("OCR engine language: {}", engine.RecognizerLanguage()?.LanguageTag()?);
            Ok(engine)
        }
    }

    impl OcrEngine for WindowsOcr {
        fn recognize(&self, image: &RgbaImage, language: Option<&str>) -> ClipResult<String> {
            let engine = Self::engine(language)?;
            let (width, height) = image.dimensions();
            if width > SystemOcr::MaxImageDimension()? || height > SystemOcr::MaxImageDimension()? {
                return Err(ClipError::Ocr(format!("{}x{} image is too large", width, height)));
            }

            let writer = DataWriter::new()?;
            writer.WriteBytes(&dib::to_premultiplied_bgra(image))?;
            let buffer = writer.DetachBuffer()?;
            let bitmap = SoftwareBitmap::CreateCopyWithAlphaFromBuffer(
                &buffer,
                BitmapPixelFormat::Bgra8,
                width as i32,
                height as i32,
                BitmapAlphaMode::Premultiplied,
            )?;

            let result = engine.RecognizeAsync(&bitmap)?.get()?;
            Ok(result.Text()?.to_string_lossy())
        }

        fn available_languages(&self) -> ClipResult<Vec<String>> {
            let languages = SystemOcr::AvailableRecognizerLanguages()?;
            let mut tags = Vec::new();
            for i in 0..languages.Size()? {
                tags.push(languages.GetAt(i)?.LanguageTag()?.to_string_lossy());
            }
            Ok(tags)
        }
    }
}
