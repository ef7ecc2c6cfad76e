//! clpc - put files or stdin on the clipboard
//!
//! ```text
//! clpc notes.txt               # text, encoding from the byte-order mark
//! clpc -t png shot.png         # PNG stream plus CF_BITMAP / CF_DIB
//! clpc a.txt b.txt             # CF_HDROP file list
//! some-command | clpc          # stdin as text (or as an image)
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, info};

use clipsharp::codec::text::{decode_text_file, looks_like_text};
use clipsharp::config::Config;
use clipsharp::format::KnownFormat;
use clipsharp::store::DataStore;
use clipsharp::Clipboard;

/// Command-line arguments for clpc
#[derive(Parser, Debug)]
#[command(name = "clpc")]
#[command(version, about = "Copy files or standard input to the clipboard", long_about = None)]
struct Args {
    /// Files to copy (reads stdin when omitted)
    files: Vec<PathBuf>,

    /// How to publish the input
    #[arg(short = 't', long = "type", value_enum, default_value_t = DataType::Auto)]
    data_type: DataType,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Input interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DataType {
    /// Pick from extension and content
    Auto,
    /// Unicode text
    Text,
    /// Bitmap only
    Image,
    /// PNG stream and bitmap
    Png,
    /// JPEG stream and bitmap
    Jpeg,
    /// GIF stream and bitmap
    Gif,
    /// CF_HDROP file list
    FileList,
    /// Shell item ID list (Windows)
    ShellIdList,
}

/// Encoded image kinds with named clipboard formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Other,
}

impl ImageKind {
    fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" | "jfif" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "bmp" | "dib" => Some(Self::Other),
            _ => None,
        }
    }

    fn from_content(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Gif => Some(Self::Gif),
            image::ImageFormat::Bmp => Some(Self::Other),
            _ => None,
        }
    }

    fn stream_formats(self) -> &'static [KnownFormat] {
        match self {
            Self::Png => &[KnownFormat::Png, KnownFormat::PngMime],
            Self::Jpeg => &[KnownFormat::Jfif, KnownFormat::JpegMime],
            Self::Gif => &[KnownFormat::Gif, KnownFormat::GifMime],
            Self::Other => &[],
        }
    }
}

/// What ends up on the clipboard
#[derive(Debug)]
enum Content {
    Text(String),
    Image { bytes: Vec<u8>, kind: ImageKind },
    FileList(Vec<PathBuf>),
    ShellIdList(Vec<PathBuf>),
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load_or_default(args.config.as_deref())?;
    clipsharp::logging::init(clipsharp::logging::level_for(args.verbose, &config.logging.level))?;

    let content = match args.files.as_slice() {
        [] => {
            let mut bytes = Vec::new();
            std::io::stdin()
                .read_to_end(&mut bytes)
                .context("Failed to read standard input")?;
            from_stdin(args.data_type, bytes)?
        }
        files => from_files(args.data_type, files)?,
    };
    debug!("Publishing {:?}", content_kind(&content));

    let clipboard = Clipboard::system(config.apartment_timeout()).context("Failed to open the clipboard")?;
    let mut store = clipboard.new_store();
    fill_store(&mut store, content)?;
    clipboard
        .set_data_store(store)
        .context("Failed to set clipboard contents")?;

    info!("Clipboard updated");
    Ok(())
}

fn content_kind(content: &Content) -> &'static str {
    match content {
        Content::Text(_) => "text",
        Content::Image { .. } => "image",
        Content::FileList(_) => "file list",
        Content::ShellIdList(_) => "shell ID list",
    }
}

fn image_kind(data_type: DataType) -> Option<ImageKind> {
    match data_type {
        DataType::Png => Some(ImageKind::Png),
        DataType::Jpeg => Some(ImageKind::Jpeg),
        DataType::Gif => Some(ImageKind::Gif),
        DataType::Image => Some(ImageKind::Other),
        _ => None,
    }
}

fn from_stdin(data_type: DataType, bytes: Vec<u8>) -> Result<Content> {
    if let Some(kind) = image_kind(data_type) {
        return Ok(Content::Image { bytes, kind });
    }
    match data_type {
        DataType::Auto => match ImageKind::from_content(&bytes) {
            Some(kind) => Ok(Content::Image { bytes, kind }),
            None => Ok(Content::Text(decode_text_file(&bytes).0)),
        },
        DataType::Text => Ok(Content::Text(decode_text_file(&bytes).0)),
        _ => bail!("--type {:?} needs file arguments", data_type),
    }
}

fn from_files(data_type: DataType, files: &[PathBuf]) -> Result<Content> {
    match data_type {
        DataType::FileList => return Ok(Content::FileList(files.to_vec())),
        DataType::ShellIdList => return Ok(Content::ShellIdList(files.to_vec())),
        _ => {}
    }

    let [file] = files else {
        if data_type == DataType::Auto {
            return Ok(Content::FileList(files.to_vec()));
        }
        bail!("--type {:?} takes a single file", data_type);
    };

    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    if let Some(kind) = image_kind(data_type) {
        return Ok(Content::Image { bytes, kind });
    }
    if data_type == DataType::Text {
        return Ok(Content::Text(decode_text_file(&bytes).0));
    }

    if let Some(kind) = ImageKind::from_extension(file) {
        return Ok(Content::Image { bytes, kind });
    }
    if looks_like_text(&bytes) {
        let (text, encoding) = decode_text_file(&bytes);
        debug!("{} decoded as {:?}", file.display(), encoding);
        return Ok(Content::Text(text));
    }
    Ok(Content::FileList(files.to_vec()))
}

fn fill_store(store: &mut DataStore, content: Content) -> Result<()> {
    match content {
        Content::Text(text) => {
            store.set_text(text);
        }
        Content::Image { bytes, kind } => {
            let image = image::load_from_memory(&bytes).context("Failed to decode image")?;
            store.set_image(image.to_rgba8());
            store.set_image_stream(bytes, kind.stream_formats());
        }
        Content::FileList(files) => {
            store.set_file_drop_list(&files)?;
        }
        Content::ShellIdList(files) => {
            set_shell_id_list(store, &files)?;
        }
    }
    Ok(())
}

#[cfg(windows)]
fn set_shell_id_list(store: &mut DataStore, files: &[PathBuf]) -> Result<()> {
    let list = clipsharp::platform::shell_id_list_from_paths(files).context("Failed to resolve shell items")?;
    store.set_shell_id_list(list);
    Ok(())
}

#[cfg(not(windows))]
fn set_shell_id_list(_store: &mut DataStore, _files: &[PathBuf]) -> Result<()> {
    bail!("shell ID lists are only available on Windows")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_multiple_files_is_file_list() {
        let files = vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")];
        let content = from_files(DataType::Auto, &files).unwrap();
        assert!(matches!(content, Content::FileList(f) if f.len() == 2));
    }

    #[test]
    fn test_auto_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("notes.txt");
        std::fs::write(&text, [0xFF, 0xFE, b'h', 0, b'i', 0]).unwrap();
        assert!(matches!(from_files(DataType::Auto, &[text]).unwrap(), Content::Text(t) if t == "hi"));

        let binary = dir.path().join("blob.bin");
        std::fs::write(&binary, [1, 0, 2, 0]).unwrap();
        assert!(matches!(from_files(DataType::Auto, &[binary]).unwrap(), Content::FileList(_)));

        let png = dir.path().join("shot.PNG");
        std::fs::write(&png, [0x89, b'P', b'N', b'G']).unwrap();
        assert!(matches!(
            from_files(DataType::Auto, &[png]).unwrap(),
            Content::Image { kind: ImageKind::Png, .. }
        ));
    }

    #[test]
    fn test_stdin() {
        let content = from_stdin(DataType::Auto, b"plain".to_vec()).unwrap();
        assert!(matches!(content, Content::Text(t) if t == "plain"));
        assert!(from_stdin(DataType::FileList, Vec::new()).is_err());
    }

    #[test]
    fn test_single_file_types_reject_many() {
        let files = vec![PathBuf::from("a.png"), PathBuf::from("b.png")];
        assert!(from_files(DataType::Png, &files).is_err());
    }

    #[test]
    fn test_fill_store_image() {
        let registry = std::sync::Arc::new(clipsharp::format::FormatRegistry::in_memory().unwrap());
        let mut store = DataStore::new(std::sync::Arc::clone(&registry));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::RgbaImage::new(2, 2)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();

        fill_store(
            &mut store,
            Content::Image {
                bytes: bytes.into_inner(),
                kind: ImageKind::Png,
            },
        )
        .unwrap();
        assert_eq!(store.formats().len(), 4);
        assert!(store.data_present(registry.known(KnownFormat::PngMime), -1));
    }
}
