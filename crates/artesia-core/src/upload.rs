//! Upload format detection.

use serde::{Deserialize, Serialize};

/// Image formats accepted for conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    /// JPEG / JFIF.
    Jpeg,
    /// PNG.
    Png,
    /// GIF (87a or 89a).
    Gif,
    /// WebP (RIFF container).
    Webp,
    /// Windows bitmap.
    Bmp,
    /// TIFF, either byte order.
    Tiff,
    /// AVIF (ISO-BMFF `ftypavif`).
    Avif,
}

impl ImageFormat {
    /// Detect the format from the file's magic bytes.
    ///
    /// Returns `None` for empty input and for formats that are recognised but
    /// not accepted for conversion, such as icons or HDR.
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        ::image::guess_format(bytes).ok().and_then(Self::from_image)
    }

    fn from_image(format: ::image::ImageFormat) -> Option<Self> {
        match format {
            ::image::ImageFormat::Jpeg => Some(Self::Jpeg),
            ::image::ImageFormat::Png => Some(Self::Png),
            ::image::ImageFormat::Gif => Some(Self::Gif),
            ::image::ImageFormat::WebP => Some(Self::Webp),
            ::image::ImageFormat::Bmp => Some(Self::Bmp),
            ::image::ImageFormat::Tiff => Some(Self::Tiff),
            ::image::ImageFormat::Avif => Some(Self::Avif),
            _ => None,
        }
    }

    const fn to_image(self) -> ::image::ImageFormat {
        match self {
            Self::Jpeg => ::image::ImageFormat::Jpeg,
            Self::Png => ::image::ImageFormat::Png,
            Self::Gif => ::image::ImageFormat::Gif,
            Self::Webp => ::image::ImageFormat::WebP,
            Self::Bmp => ::image::ImageFormat::Bmp,
            Self::Tiff => ::image::ImageFormat::Tiff,
            Self::Avif => ::image::ImageFormat::Avif,
        }
    }

    /// MIME type for data URLs and content headers.
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        self.to_image().to_mime_type()
    }
}
