use std::fmt::{Display, Error, Formatter};
use std::str::FromStr;

use qrcode::{Color, EcLevel, QrCode};
use tracing::debug;

use crate::error::{QRError, QRResult};

// Error correction level
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone, PartialOrd, Ord, Default)]
pub enum ECLevel {
    L = 0,
    #[default]
    M = 1,
    Q = 2,
    H = 3,
}

impl From<ECLevel> for EcLevel {
    fn from(ecl: ECLevel) -> Self {
        match ecl {
            ECLevel::L => EcLevel::L,
            ECLevel::M => EcLevel::M,
            ECLevel::Q => EcLevel::Q,
            ECLevel::H => EcLevel::H,
        }
    }
}

impl Display for ECLevel {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        let s = match self {
            Self::L => "L",
            Self::M => "M",
            Self::Q => "Q",
            Self::H => "H",
        };
        f.write_str(s)
    }
}

impl FromStr for ECLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "L" | "l" => Ok(Self::L),
            "M" | "m" => Ok(Self::M),
            "Q" | "q" => Ok(Self::Q),
            "H" | "h" => Ok(Self::H),
            other => Err(format!("invalid error correction level '{other}', expected L, M, Q or H")),
        }
    }
}

// Symbol grid
//------------------------------------------------------------------------------

/// Square module matrix of a QR symbol, `true` being a dark module.
/// Modules are stored row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolGrid {
    w: usize,
    modules: Box<[bool]>,
}

impl SymbolGrid {
    pub fn new(w: usize, modules: Vec<bool>) -> QRResult<Self> {
        if w == 0 || modules.len() != w * w {
            return Err(QRError::EncodingFailed(format!(
                "grid of {} modules is not a non-empty square of side {w}",
                modules.len()
            )));
        }
        Ok(Self { w, modules: modules.into_boxed_slice() })
    }

    pub fn from_fn(w: usize, is_dark: impl Fn(usize, usize) -> bool) -> QRResult<Self> {
        let modules = (0..w * w).map(|i| is_dark(i / w, i % w)).collect();
        Self::new(w, modules)
    }

    /// Parses one line per row, `dark` marking dark modules and any other char light.
    pub fn from_debug_str(s: &str, dark: char) -> QRResult<Self> {
        let rows = s.lines().map(str::trim).filter(|l| !l.is_empty()).collect::<Vec<_>>();
        let w = rows.len();
        let modules = rows.iter().flat_map(|r| r.chars().map(|c| c == dark)).collect();
        Self::new(w, modules)
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn modules(&self) -> &[bool] {
        &self.modules
    }

    pub fn is_dark(&self, r: usize, c: usize) -> bool {
        debug_assert!(r < self.w && c < self.w, "module ({r}, {c}) out of bounds");
        self.modules[r * self.w + c]
    }

    pub fn count_dark_modules(&self) -> usize {
        self.modules.iter().filter(|&&m| m).count()
    }

    pub fn to_debug_str(&self, dark: char, light: char) -> String {
        let mut res = String::with_capacity(self.w * (self.w + 1));
        for r in 0..self.w {
            if r > 0 {
                res.push('\n');
            }
            for c in 0..self.w {
                res.push(if self.is_dark(r, c) { dark } else { light });
            }
        }
        res
    }
}

// Encoder
//------------------------------------------------------------------------------

/// Turns text into a QR module grid. The grid is sized to the smallest version
/// that fits the text.
pub trait SymbolEncoder {
    fn encode(&self, text: &str) -> QRResult<SymbolGrid>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QrCodeEncoder {
    ecl: ECLevel,
}

impl QrCodeEncoder {
    pub fn new(ecl: ECLevel) -> Self {
        Self { ecl }
    }

    pub fn ec_level(&self) -> ECLevel {
        self.ecl
    }
}

impl SymbolEncoder for QrCodeEncoder {
    fn encode(&self, text: &str) -> QRResult<SymbolGrid> {
        let code = QrCode::with_error_correction_level(text.as_bytes(), self.ecl.into())?;
        debug!(
            version = ?code.version(),
            ec_level = %self.ecl,
            width = code.width(),
            bytes = text.len(),
            "Encoded symbol"
        );

        let w = code.width();
        let modules = code.into_colors().into_iter().map(|c| c == Color::Dark).collect();
        SymbolGrid::new(w, modules)
    }
}



#[cfg(test)]
mod encoder_tests {
    use test_case::test_case;

    use super::fixtures::{ANNEX_I, HELLO};
    use super::{ECLevel, QrCodeEncoder, SymbolEncoder};

    #[test_case("01234567", ANNEX_I; "annex i")]
    #[test_case("HELLO", HELLO; "hello")]
    fn test_fixture(text: &str, exp: &str) {
        let grid = QrCodeEncoder::new(ECLevel::M).encode(text).unwrap();
        let exp = exp.lines().map(str::trim).collect::<Vec<_>>().join("\n");
        assert_eq!(grid.to_debug_str('#', '.'), exp);
    }

    #[test]
    fn test_hello_center_is_light() {
        let grid = QrCodeEncoder::new(ECLevel::M).encode("HELLO").unwrap();
        assert_eq!(grid.width(), 21);
        assert!(!grid.is_dark(10, 10));
    }

    #[test_case("", 21; "empty")]
    #[test_case("Hello, world!🌎", 25; "emoji")]
    #[test_case(&"1234567890".repeat(15), 37; "long numeric")]
    fn test_min_version(text: &str, w: usize) {
        let grid = QrCodeEncoder::default().encode(text).unwrap();
        assert_eq!(grid.width(), w);
    }

    #[test]
    fn test_higher_ec_level_grows_symbol() {
        let text = "B3@j#Z%8vK!3zC^8&rF9*b6".repeat(4);
        let low = QrCodeEncoder::new(ECLevel::L).encode(&text).unwrap();
        let high = QrCodeEncoder::new(ECLevel::H).encode(&text).unwrap();
        assert!(high.width() > low.width());
    }

    #[test]
    fn test_data_too_long() {
        let text = "1234567890".repeat(800);
        let err = QrCodeEncoder::new(ECLevel::H).encode(&text).unwrap_err();
        assert!(err.is_encoding_failure());
    }

    #[test]
    fn test_ec_level_parse() {
        assert_eq!("q".parse::<ECLevel>().unwrap(), ECLevel::Q);
        assert_eq!(" H ".parse::<ECLevel>().unwrap(), ECLevel::H);
        assert!("X".parse::<ECLevel>().is_err());
        assert_eq!(ECLevel::default(), ECLevel::M);
    }
}
