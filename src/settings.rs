//! Generation settings and their persistence.
//!
//! [`Settings`] is the value handed to the pipeline on every regeneration.
//! [`Preferences`] is its on-disk form: a TOML file keyed the way earlier
//! releases stored their values, so old files keep loading. Every key is
//! optional; missing keys fall back to the documented defaults.
//!
//! # File Location
//!
//! - Linux: `~/.config/qrbar/preferences.toml`
//! - macOS: `~/Library/Application Support/qrbar/preferences.toml`
//! - Windows: `%APPDATA%\qrbar\preferences.toml`

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::color::ColorSpec;
use crate::error::{QRError, QRResult};
use crate::symbol::ECLevel;

pub const DEFAULT_SIZE: (u32, u32) = (270, 270);
/// Largest image side accepted from the command line.
pub const MAX_SIDE: u32 = 8192;
pub const DEFAULT_BG_HEX: &str = "#FFFFFF";
pub const DEFAULT_FG_HEX: &str = "#000000";

// Settings
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub text: String,
    pub fg: ColorSpec,
    pub bg: ColorSpec,
    pub size: (u32, u32),
    pub ec_level: ECLevel,
}

impl Default for Settings {
    fn default() -> Self {
        Preferences::default().to_settings()
    }
}

// Preferences
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_bg_white: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg_color_hue: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg_color_brightness: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg_color_opacity: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_fg_white: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fg_color_hue: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fg_color_brightness: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fg_color_opacity: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg_hex_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fg_hex_code: Option<String>,
}

/// Stored keys of one color layer.
struct Layer<'a> {
    is_white: Option<bool>,
    hue: Option<f32>,
    brightness: Option<f32>,
    opacity: Option<f32>,
    hex: Option<&'a str>,
    default: LayerDefault,
}

/// Values used when a layer key is absent.
struct LayerDefault {
    is_white: bool,
    hue: f32,
    brightness: f32,
    opacity: f32,
    hex: &'static str,
}

const BG_DEFAULT: LayerDefault =
    LayerDefault { is_white: true, hue: 0.0, brightness: 1.0, opacity: 1.0, hex: DEFAULT_BG_HEX };
const FG_DEFAULT: LayerDefault =
    LayerDefault { is_white: false, hue: 0.0, brightness: 0.0, opacity: 1.0, hex: DEFAULT_FG_HEX };

impl Layer<'_> {
    fn to_color_spec(&self) -> ColorSpec {
        let d = &self.default;
        let has_hsb = self.hue.is_some() || self.brightness.is_some() || self.opacity.is_some();
        let hsba = ColorSpec::hsba(
            self.hue.unwrap_or(d.hue),
            self.brightness.unwrap_or(d.brightness),
            self.opacity.unwrap_or(d.opacity),
        );

        match (self.is_white, self.hex) {
            (Some(true), _) => ColorSpec::WhiteOverride,
            (Some(false), _) => hsba,
            (None, _) if has_hsb => hsba,
            // Written by a release that only knew hex codes
            (None, Some(hex)) => ColorSpec::from_hex_or(Some(hex), fallback_hex(d.hex)),
            (None, None) if d.is_white => ColorSpec::WhiteOverride,
            (None, None) => hsba,
        }
    }

    /// Keys that reload to the same color, with unused slots at their defaults.
    /// A hex color keeps only its hex key.
    fn filled(&self) -> LayerKeys {
        let d = &self.default;
        match self.to_color_spec() {
            hex @ ColorSpec::HexRgba { .. } => layer_keys(hex),
            spec => {
                let (white, hue, brightness, opacity, _) = layer_keys(spec);
                (
                    white,
                    Some(hue.unwrap_or(d.hue)),
                    Some(brightness.unwrap_or(d.brightness)),
                    Some(opacity.unwrap_or(d.opacity)),
                    Some(d.hex.to_string()),
                )
            }
        }
    }
}

fn fallback_hex(hex: &str) -> ColorSpec {
    ColorSpec::from_hex_or(Some(hex), ColorSpec::hex(0, 0, 0, 255))
}

type LayerKeys = (Option<bool>, Option<f32>, Option<f32>, Option<f32>, Option<String>);

fn layer_keys(spec: ColorSpec) -> LayerKeys {
    match spec {
        ColorSpec::WhiteOverride => (Some(true), None, None, None, None),
        ColorSpec::Hsba { hue, brightness, alpha } => {
            (Some(false), Some(hue), Some(brightness), Some(alpha), None)
        }
        hex @ ColorSpec::HexRgba { .. } => (None, None, None, None, Some(hex.to_string())),
    }
}

impl Preferences {
    fn bg_layer(&self) -> Layer<'_> {
        Layer {
            is_white: self.is_bg_white,
            hue: self.bg_color_hue,
            brightness: self.bg_color_brightness,
            opacity: self.bg_color_opacity,
            hex: self.bg_hex_code.as_deref(),
            default: BG_DEFAULT,
        }
    }

    fn fg_layer(&self) -> Layer<'_> {
        Layer {
            is_white: self.is_fg_white,
            hue: self.fg_color_hue,
            brightness: self.fg_color_brightness,
            opacity: self.fg_color_opacity,
            hex: self.fg_hex_code.as_deref(),
            default: FG_DEFAULT,
        }
    }

    pub fn text(&self) -> &str {
        self.qr_text.as_deref().unwrap_or_default()
    }

    pub fn fg(&self) -> ColorSpec {
        self.fg_layer().to_color_spec()
    }

    pub fn bg(&self) -> ColorSpec {
        self.bg_layer().to_color_spec()
    }

    pub fn to_settings(&self) -> Settings {
        Settings {
            text: self.text().to_string(),
            fg: self.fg(),
            bg: self.bg(),
            size: DEFAULT_SIZE,
            ec_level: ECLevel::default(),
        }
    }

    /// Stores text and colors of `settings`. Keys of the other representations
    /// of a color are cleared so the file cannot disagree with itself.
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.qr_text = Some(settings.text.clone());

        let (white, hue, brightness, opacity, hex) = layer_keys(settings.bg);
        self.is_bg_white = white;
        self.bg_color_hue = hue;
        self.bg_color_brightness = brightness;
        self.bg_color_opacity = opacity;
        self.bg_hex_code = hex;

        let (white, hue, brightness, opacity, hex) = layer_keys(settings.fg);
        self.is_fg_white = white;
        self.fg_color_hue = hue;
        self.fg_color_brightness = brightness;
        self.fg_color_opacity = opacity;
        self.fg_hex_code = hex;
    }

    /// Every key the effective colors use, filled in with its value. Reloading
    /// the result gives back the same text and colors.
    pub fn resolved(&self) -> Self {
        let (is_bg_white, bg_color_hue, bg_color_brightness, bg_color_opacity, bg_hex_code) =
            self.bg_layer().filled();
        let (is_fg_white, fg_color_hue, fg_color_brightness, fg_color_opacity, fg_hex_code) =
            self.fg_layer().filled();

        Self {
            qr_text: Some(self.text().to_string()),
            is_bg_white,
            bg_color_hue,
            bg_color_brightness,
            bg_color_opacity,
            is_fg_white,
            fg_color_hue,
            fg_color_brightness,
            fg_color_opacity,
            bg_hex_code,
            fg_hex_code,
        }
    }

    pub fn to_toml(&self) -> QRResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| QRError::InvalidPreferences(format!("failed to serialize: {e}")))
    }

    pub fn from_toml(content: &str) -> QRResult<Self> {
        toml::from_str(content).map_err(|e| QRError::InvalidPreferences(e.to_string()))
    }
}

// Store
//------------------------------------------------------------------------------

/// Loads preferences at start and saves them on change.
#[derive(Debug, Clone)]
pub struct PreferenceFile {
    path: PathBuf,
}

impl PreferenceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The platform config directory, see the module docs.
    pub fn default_location() -> QRResult<Self> {
        let dir = dirs::config_dir().ok_or_else(|| {
            QRError::InvalidPreferences("failed to determine config directory".to_string())
        })?;
        Ok(Self::new(dir.join("qrbar").join("preferences.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// A missing file is not an error and yields the defaults.
    pub fn load(&self) -> QRResult<Preferences> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No preference file, using defaults");
            return Ok(Preferences::default());
        }

        let content = fs::read_to_string(&self.path)?;
        Preferences::from_toml(&content).map_err(|e| {
            QRError::InvalidPreferences(format!("{}: {e}", self.path.display()))
        })
    }

    pub fn load_or_default(&self) -> Preferences {
        self.load().unwrap_or_else(|e| {
            warn!("Ignoring unreadable preferences: {e}");
            Preferences::default()
        })
    }

    /// Writes to a temp file next to the target, then renames it over the target.
    pub fn save(&self, prefs: &Preferences) -> QRResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let content = prefs.to_toml()?;
        let temp_path = self.path.with_extension("toml.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &self.path)?;

        debug!(path = %self.path.display(), "Saved preferences");
        Ok(())
    }

    pub fn reset(&self) -> QRResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod preferences_tests {
    use test_case::test_case;

    use super::{Preferences, Settings, DEFAULT_SIZE};
    use crate::color::ColorSpec;
    use crate::symbol::ECLevel;

    #[test]
    fn test_first_run_defaults() {
        let prefs = Preferences::default();
        let resolved = prefs.resolved();
        assert_eq!(resolved.is_bg_white, Some(true));
        assert_eq!(resolved.is_fg_white, Some(false));
        assert_eq!(resolved.fg_color_opacity, Some(1.0));
        assert_eq!(resolved.bg_hex_code.as_deref(), Some("#FFFFFF"));
        assert_eq!(resolved.fg_hex_code.as_deref(), Some("#000000"));
        assert_eq!(resolved.qr_text.as_deref(), Some(""));

        let settings = prefs.to_settings();
        assert_eq!(settings.bg, ColorSpec::WhiteOverride);
        assert_eq!(settings.fg, ColorSpec::hsba(0.0, 0.0, 1.0));
        assert_eq!(settings.fg.resolve(), crate::color::BLACK);
        assert_eq!(settings.size, DEFAULT_SIZE);
        assert_eq!(settings.ec_level, ECLevel::M);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_camel_case_keys() {
        let content = r##"
            qrText = "hello"
            isBgWhite = false
            bgColorHue = 0.5
            bgColorBrightness = 0.25
            bgColorOpacity = 0.75
            isFgWhite = true
            fgColorHue = 0.1
        "##;
        let prefs = Preferences::from_toml(content).unwrap();
        assert_eq!(prefs.text(), "hello");
        assert_eq!(prefs.bg(), ColorSpec::hsba(0.5, 0.25, 0.75));
        assert_eq!(prefs.fg(), ColorSpec::WhiteOverride);
    }

    #[test_case("bgHexCode = \"#00ff00\"", ColorSpec::hex(0, 255, 0, 255); "legacy hex")]
    #[test_case("bgHexCode = \"green\"", ColorSpec::hex(255, 255, 255, 255); "malformed hex")]
    #[test_case("bgHexCode = \"#+1+2+3\"", ColorSpec::hex(255, 255, 255, 255); "sign prefixed hex")]
    #[test_case("bgHexCode = \"#00ff00\"\nbgColorHue = 0.5", ColorSpec::hsba(0.5, 1.0, 1.0); "hsb wins over hex")]
    #[test_case("bgHexCode = \"#00ff00\"\nisBgWhite = true", ColorSpec::WhiteOverride; "flag wins over hex")]
    #[test_case("isBgWhite = false", ColorSpec::hsba(0.0, 1.0, 1.0); "flag off uses hsb defaults")]
    #[test_case("", ColorSpec::WhiteOverride; "nothing stored")]
    fn test_bg_resolution(content: &str, exp: ColorSpec) {
        assert_eq!(Preferences::from_toml(content).unwrap().bg(), exp);
    }

    #[test_case("fgHexCode = \"#FF0000\"", ColorSpec::hex(255, 0, 0, 255); "legacy hex")]
    #[test_case("fgHexCode = \"#12\"", ColorSpec::hex(0, 0, 0, 255); "malformed hex")]
    #[test_case("fgColorBrightness = 1.0", ColorSpec::hsba(0.0, 1.0, 1.0); "partial hsb")]
    #[test_case("", ColorSpec::hsba(0.0, 0.0, 1.0); "nothing stored")]
    fn test_fg_resolution(content: &str, exp: ColorSpec) {
        assert_eq!(Preferences::from_toml(content).unwrap().fg(), exp);
    }

    #[test_case("bgHexCode = \"#00ff00\"\nfgHexCode = \"#ff0000\""; "legacy hex")]
    #[test_case("bgHexCode = \"green\"\nfgHexCode = \"#+1+2+3\""; "malformed hex")]
    #[test_case("isBgWhite = true\nbgHexCode = \"#00ff00\"\nfgColorHue = 0.3"; "flag and partial hsb")]
    #[test_case("bgColorOpacity = 0.5\nisFgWhite = true"; "hsb and white fg")]
    #[test_case(""; "nothing stored")]
    fn test_resolved_reloads_same_colors(content: &str) {
        let prefs = Preferences::from_toml(content).unwrap();
        let reloaded = Preferences::from_toml(&prefs.resolved().to_toml().unwrap()).unwrap();
        assert_eq!(reloaded.bg(), prefs.bg());
        assert_eq!(reloaded.fg(), prefs.fg());
        assert_eq!(reloaded.text(), prefs.text());
    }

    #[test]
    fn test_resolved_hex_layer() {
        let resolved = Preferences::from_toml("bgHexCode = \"#00ff00\"\nfgHexCode = \"green\"")
            .unwrap()
            .resolved();
        assert_eq!(resolved.is_bg_white, None);
        assert_eq!(resolved.bg_hex_code.as_deref(), Some("#00FF00"));
        // Malformed codes show the fallback actually in use
        assert_eq!(resolved.is_fg_white, None);
        assert_eq!(resolved.fg_hex_code.as_deref(), Some("#000000"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Preferences::from_toml("qrText = ").is_err());
        assert!(Preferences::from_toml("isBgWhite = \"yes\"").is_err());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let prefs = Preferences::from_toml("someFutureKey = 3\nqrText = \"x\"").unwrap();
        assert_eq!(prefs.text(), "x");
    }

    #[test_case(ColorSpec::WhiteOverride, ColorSpec::hsba(0.3, 0.6, 0.9); "white and hsba")]
    #[test_case(ColorSpec::hex(1, 2, 3, 255), ColorSpec::hex(250, 0, 0, 128); "hex")]
    #[test_case(ColorSpec::hsba(1.0, 1.0, 0.0), ColorSpec::WhiteOverride; "transparent bg and white fg")]
    fn test_apply_settings(bg: ColorSpec, fg: ColorSpec) {
        let settings = Settings { text: "abc".to_string(), fg, bg, ..Settings::default() };
        // Start from a file that disagrees with every layer
        let mut prefs = Preferences::from_toml(
            "isBgWhite = false\nbgHexCode = \"#123456\"\nfgColorHue = 0.9\nisFgWhite = true",
        )
        .unwrap();
        prefs.apply_settings(&settings);

        let reloaded = Preferences::from_toml(&prefs.to_toml().unwrap()).unwrap();
        assert_eq!(reloaded.to_settings(), settings);
    }

    #[test]
    fn test_serialized_keys() {
        let mut prefs = Preferences::default();
        prefs.apply_settings(&Settings {
            text: "hi".to_string(),
            fg: ColorSpec::hsba(0.5, 0.5, 1.0),
            bg: ColorSpec::WhiteOverride,
            ..Settings::default()
        });
        let content = prefs.to_toml().unwrap();
        assert!(content.contains("qrText = \"hi\""));
        assert!(content.contains("isBgWhite = true"));
        assert!(content.contains("isFgWhite = false"));
        assert!(content.contains("fgColorHue = 0.5"));
        assert!(!content.contains("bgColorHue"));
        assert!(!content.contains("HexCode"));
    }
}

#[cfg(test)]
mod store_tests {
    use super::{PreferenceFile, Preferences, Settings};
    use crate::color::ColorSpec;
    use crate::error::QRError;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceFile::new(dir.path().join("preferences.toml"));
        assert!(!store.exists());
        assert_eq!(store.load().unwrap(), Preferences::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceFile::new(dir.path().join("nested").join("preferences.toml"));

        let mut prefs = Preferences::default();
        prefs.apply_settings(&Settings {
            text: "https://example.com".to_string(),
            fg: ColorSpec::hex(0x33, 0x66, 0x99, 255),
            ..Settings::default()
        });
        store.save(&prefs).unwrap();

        assert!(store.exists());
        assert!(!store.path().with_extension("toml.tmp").exists());
        let loaded = store.load().unwrap();
        assert_eq!(loaded, prefs);
        assert_eq!(loaded.text(), "https://example.com");
        assert_eq!(loaded.fg(), ColorSpec::hex(0x33, 0x66, 0x99, 255));
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceFile::new(dir.path().join("preferences.toml"));
        std::fs::write(store.path(), "qrText = [").unwrap();

        assert!(matches!(store.load(), Err(QRError::InvalidPreferences(_))));
        assert_eq!(store.load_or_default(), Preferences::default());
    }

    #[test]
    fn test_reset() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceFile::new(dir.path().join("preferences.toml"));
        store.reset().unwrap();
        store.save(&Preferences::default()).unwrap();
        store.reset().unwrap();
        assert!(!store.exists());
    }
}
