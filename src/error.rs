use std::io;

// Error
//------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum QRError {
    // Generation
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    // Export
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // Preferences
    #[error("Invalid preferences: {0}")]
    InvalidPreferences(String),
}

impl QRError {
    pub fn is_encoding_failure(&self) -> bool {
        matches!(self, Self::EncodingFailed(_))
    }
}

impl From<qrcode::types::QrError> for QRError {
    fn from(err: qrcode::types::QrError) -> Self {
        Self::EncodingFailed(err.to_string())
    }
}

impl From<image::ImageError> for QRError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => Self::Io(e),
            e => Self::EncodingFailed(e.to_string()),
        }
    }
}

pub type QRResult<T> = Result<T, QRError>;
