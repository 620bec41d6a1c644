//! Raster image assets for the signature and the stamp.
//!
//! Images are decoded once with the `image` crate and kept as zlib-compressed
//! RGB samples plus an optional alpha channel, ready to be embedded into a PDF
//! as an image XObject with a soft mask.
//!
//! # Example
//!
//! ```rust
//! use contract2pdf::images::ImageFormat;
//! assert_eq!(ImageFormat::from_path("stempel.png"), Some(ImageFormat::Png));
//! assert_eq!(ImageFormat::from_magic(b"\x89PNG\r\n\x1a\n...."), Some(ImageFormat::Png));
//! ```

use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::debug;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;
use std::path::Path;

/// Image formats accepted for assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// JPEG image format
    Jpeg,
    /// PNG image format
    Png,
}

impl ImageFormat {
    /// Detect image format from file extension.
    pub fn from_path(path: &str) -> Option<ImageFormat> {
        let lower = path.to_lowercase();
        if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            Some(ImageFormat::Jpeg)
        } else if lower.ends_with(".png") {
            Some(ImageFormat::Png)
        } else {
            None
        }
    }

    /// Detect image format from the leading bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<ImageFormat> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }

    fn decoder_format(&self) -> image::ImageFormat {
        match self {
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Png => image::ImageFormat::Png,
        }
    }
}

/// Error types for image operations.
#[derive(Debug)]
pub enum ImageError {
    /// Failed to read the image file
    LoadError(String),
    /// The bytes could not be decoded as an image
    DecodeError(String),
    /// Neither the content nor the file name identify a supported format
    UnsupportedFormat(String),
}

impl std::fmt::Display for ImageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageError::LoadError(e) => write!(f, "Failed to load image: {}", e),
            ImageError::DecodeError(e) => write!(f, "Failed to decode image: {}", e),
            ImageError::UnsupportedFormat(e) => write!(f, "Unsupported image format: {}", e),
        }
    }
}

impl std::error::Error for ImageError {}

/// A decoded image ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub width: u32,
    pub height: u32,
    /// Original path or label
    pub source: String,
    rgb: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

impl ImageAsset {
    /// Decodes an image from memory. The format is taken from the magic bytes,
    /// falling back to the extension of `source`.
    pub fn from_bytes(bytes: &[u8], source: &str) -> Result<Self, ImageError> {
        let format = ImageFormat::from_magic(bytes)
            .or_else(|| ImageFormat::from_path(source))
            .ok_or_else(|| ImageError::UnsupportedFormat(source.to_string()))?;

        let decoded = image::load_from_memory_with_format(bytes, format.decoder_format())
            .map_err(|e| ImageError::DecodeError(format!("{}: {}", source, e)))?
            .to_rgba8();
        let (width, height) = decoded.dimensions();

        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for pixel in decoded.pixels() {
            let [r, g, b, a] = pixel.0;
            rgb.extend_from_slice(&[r, g, b]);
            alpha.push(a);
        }
        let has_transparency = alpha.iter().any(|a| *a != u8::MAX);

        debug!(
            "Decoded {} ({}x{}, transparency: {})",
            source, width, height, has_transparency
        );

        Ok(ImageAsset {
            width,
            height,
            source: source.to_string(),
            rgb: deflate(&rgb)?,
            alpha: if has_transparency {
                Some(deflate(&alpha)?)
            } else {
                None
            },
        })
    }

    /// Reads and decodes an image file.
    pub fn load(path: &Path) -> Result<Self, ImageError> {
        let bytes = std::fs::read(path).map_err(|e| {
            ImageError::LoadError(format!("Failed to read file {}: {}", path.display(), e))
        })?;
        Self::from_bytes(&bytes, &path.display().to_string())
    }

    pub fn has_alpha(&self) -> bool {
        self.alpha.is_some()
    }

    /// Adds this image to `doc` as an image XObject (with an `SMask` when the
    /// image has transparency) and returns its object id.
    pub fn embed(&self, doc: &mut Document) -> ObjectId {
        let mut image_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.width as i64,
            "Height" => self.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };
        if let Some(alpha) = &self.alpha {
            let smask_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => self.width as i64,
                    "Height" => self.height as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                    "Filter" => "FlateDecode",
                },
                alpha.clone(),
            ));
            image_dict.set("SMask", Object::Reference(smask_id));
        }
        doc.add_object(Stream::new(image_dict, self.rgb.clone()))
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, ImageError> {
    let compression_error = |e: std::io::Error| ImageError::DecodeError(format!("compression failed: {}", e));
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(compression_error)?;
    encoder.finish().map_err(compression_error)
}
