//! # qrbar
//!
//! A small QR code studio: type some text, pick two colors, and get a QR code image
//! you can preview in the terminal, copy to the clipboard or save as PNG.
//!
//! ## Features
//!
//! - **Color Specs**: Pure white, fully saturated hue/brightness/opacity, or hex codes
//! - **Rasterization**: Blocky nearest-neighbour rendering at any target size, centered, with a 4 module quiet zone
//! - **Export**: Lossless PNG bytes, files and the system clipboard
//! - **Preferences**: Text and colors remembered across runs in a TOML file
//! - **Last-write-wins Regeneration**: A background worker that only ever delivers the newest request
//!
//! ## Quick Start
//!
//! ```rust
//! use qrbar::{regenerate, ColorSpec, Settings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings {
//!     text: "HELLO".to_string(),
//!     fg: ColorSpec::from_hex("#1E3A8A")?,
//!     bg: ColorSpec::WhiteOverride,
//!     ..Settings::default()
//! };
//!
//! let img = regenerate(&settings)?;
//! assert_eq!(img.dimensions(), (270, 270));
//!
//! let png = qrbar::export::encode_png(&img)?;
//! assert!(!png.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ### Remembering Settings
//!
//! ```rust,no_run
//! use qrbar::settings::PreferenceFile;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PreferenceFile::default_location()?;
//! let mut prefs = store.load_or_default();
//!
//! let mut settings = prefs.to_settings();
//! settings.text = "https://example.com".to_string();
//!
//! prefs.apply_settings(&settings);
//! store.save(&prefs)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! 1. [`ColorSpec`]s are resolved to RGBA pixels
//! 2. A [`SymbolEncoder`] turns the text into a [`SymbolGrid`] of the smallest version that fits
//! 3. [`rasterize`] draws the grid onto a canvas of the requested size
//! 4. [`export`] turns the image into PNG bytes, a file or clipboard contents
//!
//! Encoding failures never clear what is on screen: [`Preview`] keeps the prior image.

pub mod color;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod render;
pub mod settings;
pub mod shell;
pub mod symbol;

pub use color::{resolve, ColorSpec};
pub use error::{QRError, QRResult};
pub use export::ExportTarget;
pub use pipeline::{regenerate, Preview, Regenerator};
pub use render::{rasterize, RasterImage};
pub use settings::{Preferences, Settings};
pub use symbol::{ECLevel, QrCodeEncoder, SymbolEncoder, SymbolGrid};
