//! Compressed-image codec collaborator.
//!
//! The protocol moves opaque encoded bytes; only the receiver decodes
//! them, to validate the reconstruction and to feed the display slots.

use bytes::Bytes;
use image::ImageFormat;
use serde::Serialize;

use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageKind {
    Jpeg,
    Png,
    Bmp,
    Other,
}

impl From<ImageFormat> for ImageKind {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpeg => Self::Jpeg,
            ImageFormat::Png => Self::Png,
            ImageFormat::Bmp => Self::Bmp,
            _ => Self::Other,
        }
    }
}

/// A successfully decoded image. Keeps the encoded bytes it came from
/// so it can be persisted without a lossy re-encode.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub kind: ImageKind,
    pub encoded: Bytes,
}

/// `decode(bytes) -> image | DecodeError`.
pub trait ImageCodec: Send + Sync {
    fn decode(&self, bytes: &Bytes) -> Result<DecodedImage, DecodeError>;
}

/// [`ImageCodec`] backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCodec;

impl ImageCodec for RasterCodec {
    fn decode(&self, bytes: &Bytes) -> Result<DecodedImage, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        let format = image::guess_format(bytes).map_err(|_| DecodeError::UnknownFormat)?;
        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;

        Ok(DecodedImage {
            width: decoded.width(),
            height: decoded.height(),
            kind: format.into(),
            encoded: bytes.clone(),
        })
    }
}

/// Decode any supported image and re-encode it as JPEG at `quality`.
pub fn reencode_jpeg(bytes: &[u8], quality: u8) -> Result<Bytes, DecodeError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let mut out = Vec::new();
    {
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
        encoder
            .encode_image(&decoded.to_rgb8())
            .map_err(|e| DecodeError::Encode(e.to_string()))?;
    }
    Ok(Bytes::from(out))
}
