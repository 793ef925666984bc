//! Getting a rendered image out of the process: PNG bytes, files and the clipboard.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};
use tracing::{info, warn};

use crate::error::{QRError, QRResult};
use crate::render::RasterImage;

// PNG
//------------------------------------------------------------------------------

pub fn encode_png(img: &RasterImage) -> QRResult<Vec<u8>> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || img.as_raw().is_empty() {
        return Err(QRError::EncodingFailed(format!("cannot encode empty {w}x{h} image as PNG")));
    }

    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(img.as_raw(), w, h, ExtendedColorType::Rgba8)?;
    Ok(bytes)
}

pub fn decode_png(bytes: &[u8]) -> QRResult<RasterImage> {
    let img = image::load(Cursor::new(bytes), ImageFormat::Png)?;
    Ok(img.into_rgba8())
}

// File
//------------------------------------------------------------------------------

/// Writes `bytes` to `path`, creating or truncating it. The file handle is
/// released on every path out of this function.
pub fn write_to_path(bytes: &[u8], path: &Path) -> QRResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(bytes)?;
    writer.flush()?;
    info!(path = %path.display(), bytes = bytes.len(), "Saved image");
    Ok(())
}

/// Appends `.png` unless the path already ends with it (case-insensitive).
pub fn ensure_png_extension(path: impl Into<PathBuf>) -> PathBuf {
    let mut path = path.into();
    let is_png = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("png"));
    if !is_png {
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".png");
        path.set_file_name(name);
    }
    path
}

// Save dialog
//------------------------------------------------------------------------------

/// Asks the user where to save. `None` means the user cancelled.
pub trait SaveDialog {
    fn choose_path(&mut self, suggested_name: &str) -> Option<PathBuf>;
}

/// Line-oriented save prompt. An empty answer or end of input cancels.
pub struct PromptSaveDialog<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptSaveDialog<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> SaveDialog for PromptSaveDialog<R, W> {
    fn choose_path(&mut self, suggested_name: &str) -> Option<PathBuf> {
        write!(self.output, "Save image as [{suggested_name}]: ").ok()?;
        self.output.flush().ok()?;

        let mut line = String::new();
        if self.input.read_line(&mut line).ok()? == 0 {
            return None;
        }

        let answer = line.trim();
        match answer {
            "" => None,
            "." => Some(ensure_png_extension(suggested_name)),
            _ => Some(ensure_png_extension(answer)),
        }
    }
}

// Clipboard
//------------------------------------------------------------------------------

pub trait ClipboardSink {
    /// Replaces the clipboard contents with `img`.
    fn set_image(&mut self, img: &RasterImage) -> Result<(), String>;
}

/// The OS clipboard. A connection is opened per write.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn set_image(&mut self, img: &RasterImage) -> Result<(), String> {
        let mut clipboard = arboard::Clipboard::new().map_err(|e| e.to_string())?;
        clipboard.clear().map_err(|e| e.to_string())?;

        let data = arboard::ImageData {
            width: img.width() as usize,
            height: img.height() as usize,
            bytes: Cow::Borrowed(img.as_raw()),
        };
        clipboard.set_image(data).map_err(|e| e.to_string())
    }
}

/// Best effort: failures are logged, never returned.
pub fn place_on_clipboard(img: &RasterImage, clipboard: &mut dyn ClipboardSink) {
    match clipboard.set_image(img) {
        Ok(()) => info!(width = img.width(), height = img.height(), "Copied image to clipboard"),
        Err(e) => warn!("Failed to copy image to clipboard: {e}"),
    }
}

// Targets
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    File(PathBuf),
    Clipboard,
}

pub fn export(
    img: &RasterImage,
    target: &ExportTarget,
    clipboard: &mut dyn ClipboardSink,
) -> QRResult<()> {
    match target {
        ExportTarget::File(path) => write_to_path(&encode_png(img)?, path),
        ExportTarget::Clipboard => {
            place_on_clipboard(img, clipboard);
            Ok(())
        }
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::{ClipboardSink, RasterImage};

    #[derive(Default)]
    pub struct MemoryClipboard {
        pub contents: Option<RasterImage>,
        pub fail: bool,
    }

    impl ClipboardSink for MemoryClipboard {
        fn set_image(&mut self, img: &RasterImage) -> Result<(), String> {
            if self.fail {
                return Err("clipboard unavailable".to_string());
            }
            self.contents = Some(img.clone());
            Ok(())
        }
    }
}


#[cfg(test)]
mod file_tests {
    use image::Rgba;

    use super::test_utils::MemoryClipboard;
    use super::{decode_png, ensure_png_extension, export, write_to_path, ExportTarget};
    use crate::error::QRError;
    use crate::render::RasterImage;

    #[test]
    fn test_write_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qr.png");
        write_to_path(b"first", &path).unwrap();
        write_to_path(b"2nd", &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"2nd");
    }

    #[test]
    fn test_write_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("qr.png");
        let err = write_to_path(b"data", &path).unwrap_err();
        assert!(matches!(err, QRError::Io(_)));
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qr.png");
        let img = RasterImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let mut clipboard = MemoryClipboard::default();

        export(&img, &ExportTarget::File(path.clone()), &mut clipboard).unwrap();
        assert_eq!(decode_png(&std::fs::read(&path).unwrap()).unwrap(), img);
        assert!(clipboard.contents.is_none());
    }

    #[test]
    fn test_export_to_clipboard() {
        let img = RasterImage::from_pixel(2, 2, Rgba([9, 9, 9, 9]));
        let mut clipboard = MemoryClipboard::default();
        export(&img, &ExportTarget::Clipboard, &mut clipboard).unwrap();
        assert_eq!(clipboard.contents, Some(img.clone()));

        let mut broken = MemoryClipboard { fail: true, ..Default::default() };
        assert!(export(&img, &ExportTarget::Clipboard, &mut broken).is_ok());
        assert!(broken.contents.is_none());
    }

    #[test]
    fn test_ensure_png_extension() {
        assert_eq!(ensure_png_extension("qr"), std::path::PathBuf::from("qr.png"));
        assert_eq!(ensure_png_extension("dir/qr.PNG"), std::path::PathBuf::from("dir/qr.PNG"));
        assert_eq!(ensure_png_extension("qr.jpg"), std::path::PathBuf::from("qr.jpg.png"));
    }
}
