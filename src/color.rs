//! Color specifications and their resolution to concrete RGBA pixels.
//!
//! A [`ColorSpec`] is what the user controls produce: either the white override,
//! a hue/brightness/opacity triple at full saturation, or a hex code carried over
//! from older preference files. [`resolve`] turns any of them into an [`Rgba`]
//! pixel and never fails; out of range inputs are clamped.

#![allow(clippy::many_single_char_names)]

use std::fmt::{Display, Error, Formatter};
use std::str::FromStr;

use image::Rgba;

use crate::error::{QRError, QRResult};

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

// Color spec
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ColorSpec {
    WhiteOverride,
    /// Hue, brightness and alpha in `[0, 1]`. Saturation is always
    /// [`ColorSpec::SATURATION`].
    Hsba { hue: f32, brightness: f32, alpha: f32 },
    HexRgba { r: u8, g: u8, b: u8, a: u8 },
}

impl ColorSpec {
    pub const SATURATION: f32 = 1.0;

    pub const fn hsba(hue: f32, brightness: f32, alpha: f32) -> Self {
        Self::Hsba { hue, brightness, alpha }
    }

    pub const fn hex(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::HexRgba { r, g, b, a }
    }

    /// Parses `#RRGGBB` or `#RRGGBBAA`, case-insensitive, with or without `#`.
    pub fn from_hex(hex: &str) -> QRResult<Self> {
        let hex = hex.trim();
        let digits = hex.strip_prefix('#').unwrap_or(hex);

        if !matches!(digits.len(), 6 | 8) || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(QRError::InvalidPreferences(format!(
                "invalid hex color '{hex}', expected #RRGGBB"
            )));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| QRError::InvalidPreferences(format!("invalid hex color '{hex}'")))
        };

        let a = if digits.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::hex(channel(0)?, channel(2)?, channel(4)?, a))
    }

    /// Like [`ColorSpec::from_hex`] but falls back to `default` when `hex` is absent or malformed.
    pub fn from_hex_or(hex: Option<&str>, default: Self) -> Self {
        hex.and_then(|h| Self::from_hex(h).ok()).unwrap_or(default)
    }

    pub fn resolve(self) -> Rgba<u8> {
        resolve(self)
    }
}

impl Display for ColorSpec {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        match *self {
            Self::WhiteOverride => f.write_str("white"),
            Self::Hsba { hue, brightness, alpha } => write!(f, "{hue},{brightness},{alpha}"),
            Self::HexRgba { r, g, b, a: 255 } => write!(f, "#{r:02X}{g:02X}{b:02X}"),
            Self::HexRgba { r, g, b, a } => write!(f, "#{r:02X}{g:02X}{b:02X}{a:02X}"),
        }
    }
}

/// Accepts `white`, a hex code, or `hue,brightness,alpha`.
impl FromStr for ColorSpec {
    type Err = QRError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("white") {
            return Ok(Self::WhiteOverride);
        }

        if s.contains(',') {
            let parts = s
                .split(',')
                .map(|p| p.trim().parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| QRError::InvalidPreferences(format!("invalid color '{s}': {e}")))?;
            return match parts[..] {
                [hue, brightness, alpha] => Ok(Self::hsba(hue, brightness, alpha)),
                [hue, brightness] => Ok(Self::hsba(hue, brightness, 1.0)),
                _ => Err(QRError::InvalidPreferences(format!(
                    "invalid color '{s}', expected hue,brightness[,alpha]"
                ))),
            };
        }

        Self::from_hex(s)
    }
}

// Resolver
//------------------------------------------------------------------------------

pub fn resolve(spec: ColorSpec) -> Rgba<u8> {
    match spec {
        ColorSpec::WhiteOverride => WHITE,
        ColorSpec::Hsba { hue, brightness, alpha } => {
            let [r, g, b] = hsb_to_rgb(hue, ColorSpec::SATURATION, brightness);
            Rgba([r, g, b, unit_to_u8(alpha)])
        }
        ColorSpec::HexRgba { r, g, b, a } => Rgba([r, g, b, a]),
    }
}

/// Hue, saturation and brightness in `[0, 1]`. NaN is treated as 0.
fn hsb_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let h = clamp_unit(h) * 360.0;
    let s = clamp_unit(s);
    let v = clamp_unit(v);

    let c = v * s;
    let h_prime = h / 60.0;
    let x = c * (1.0 - ((h_prime % 2.0) - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h_prime < 1.0 {
        (c, x, 0.0)
    } else if h_prime < 2.0 {
        (x, c, 0.0)
    } else if h_prime < 3.0 {
        (0.0, c, x)
    } else if h_prime < 4.0 {
        (0.0, x, c)
    } else if h_prime < 5.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    [unit_to_u8(r + m), unit_to_u8(g + m), unit_to_u8(b + m)]
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

fn unit_to_u8(v: f32) -> u8 {
    (clamp_unit(v) * 255.0).round() as u8
}
