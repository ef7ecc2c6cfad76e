//! clipocr - recognize text in the clipboard image
//!
//! Reads the best available image from the clipboard, prints the recognized
//! text and puts it back on the clipboard as unicode text.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use clipsharp::config::Config;
use clipsharp::ocr::{default_engine, strip_whitespace};
use clipsharp::Clipboard;

/// Command-line arguments for clipocr
#[derive(Parser, Debug)]
#[command(name = "clipocr")]
#[command(version, about = "Recognize text in the clipboard image", long_about = None)]
struct Args {
    /// Recognition language as a BCP-47 tag (e.g. "en-US", "ja")
    #[arg(short, long)]
    language: Option<String>,

    /// Print the installed recognition languages and exit
    #[arg(long)]
    list_languages: bool,

    /// Remove all whitespace from the result (for CJK text)
    #[arg(short, long)]
    strip: bool,

    /// Print the text without copying it to the clipboard
    #[arg(long)]
    no_copy: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = Config::load_or_default(args.config.as_deref())?.with_overrides(args.language.clone(), args.strip);
    config.validate()?;
    clipsharp::logging::init(clipsharp::logging::level_for(args.verbose, &config.logging.level))?;

    // Recognition runs here; clipboard calls still go through the worker
    clipsharp::apartment::enter_current_thread().context("Failed to initialize the apartment")?;

    let engine = default_engine()?;
    if args.list_languages {
        for language in engine.available_languages()? {
            println!("{}", language);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let clipboard = Clipboard::system(config.apartment_timeout()).context("Failed to open the clipboard")?;
    let Some(image) = clipboard.with_data_object(|data| data.get_transparent_bitmap())? else {
        eprintln!("no image in clipboard");
        return Ok(ExitCode::FAILURE);
    };
    debug!("Clipboard image {}x{}", image.width(), image.height());

    let mut text = engine
        .recognize(&image, config.ocr.language.as_deref())
        .context("Text recognition failed")?;
    if config.ocr.trim_whitespace {
        text = strip_whitespace(&text);
    }

    if text.trim().is_empty() {
        eprintln!("no text detected");
        return Ok(ExitCode::FAILURE);
    }

    println!("{}", text);
    if !args.no_copy {
        clipboard.set_text(text).context("Failed to copy text")?;
        info!("Recognized text copied to clipboard");
    }

    Ok(ExitCode::SUCCESS)
}
