//! Turning a captured image into what goes on the wire.

use std::path::Path;

use rand::Rng;
use tracing::debug;

use mosaic_core::{CapturedImage, MosaicError, TaskError, reencode_jpeg};

/// Quality range for automated captures with a randomized quality.
pub const RANDOM_QUALITY: (u8, u8) = (30, 80);

/// How to re-encode before sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// Send the file's bytes untouched.
    Original,
    Fixed(u8),
    /// A fresh quality in `min..=max` for every image.
    Random { min: u8, max: u8 },
}

impl Quality {
    /// The JPEG quality to use for the next image, if any.
    pub fn pick(&self) -> Option<u8> {
        match *self {
            Self::Original => None,
            Self::Fixed(q) => Some(q.clamp(1, 100)),
            Self::Random { min, max } => {
                let (lo, hi) = (min.min(max).max(1), max.max(min).min(100));
                Some(rand::thread_rng().gen_range(lo..=hi))
            }
        }
    }
}

/// Re-encode `image` as JPEG at `quality`, renaming it to `<stem>.jpg`.
///
/// Encoding runs on the blocking pool.
pub async fn prepare(image: CapturedImage, quality: Option<u8>) -> Result<CapturedImage, MosaicError> {
    let Some(q) = quality else {
        return Ok(image);
    };
    let CapturedImage { filename, bytes } = image;
    let stem = Path::new(&filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let encoded = tokio::task::spawn_blocking(move || reencode_jpeg(&bytes, q))
        .await
        .map_err(TaskError::from)??;
    debug!(quality = q, bytes = encoded.len(), "re-encoded as jpeg");

    Ok(CapturedImage {
        filename: format!("{stem}.jpg"),
        bytes: encoded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png() -> Bytes {
        let img = RgbImage::from_fn(16, 8, |x, y| Rgb([x as u8 * 15, y as u8 * 30, 120]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        Bytes::from(out.into_inner())
    }

    #[tokio::test]
    async fn reencodes_to_jpeg_and_renames() {
        let captured = CapturedImage {
            filename: "cam.png".into(),
            bytes: png(),
        };
        let out = prepare(captured, Some(50)).await.unwrap();
        assert_eq!(out.filename, "cam.jpg");
        assert!(out.bytes.starts_with(&[0xFF, 0xD8]));
    }

    #[tokio::test]
    async fn original_quality_passes_through() {
        let captured = CapturedImage {
            filename: "raw.bin".into(),
            bytes: Bytes::from_static(b"whatever"),
        };
        let out = prepare(captured.clone(), None).await.unwrap();
        assert_eq!(out, captured);
    }

    #[tokio::test]
    async fn undecodable_input_is_a_decode_error() {
        let captured = CapturedImage {
            filename: "bad.png".into(),
            bytes: Bytes::from_static(b"not an image"),
        };
        let err = prepare(captured, Some(40)).await.unwrap_err();
        assert!(matches!(err, MosaicError::Decode(_)));
    }

    #[test]
    fn random_quality_stays_in_range() {
        let quality = Quality::Random { min: 30, max: 80 };
        for _ in 0..200 {
            let q = quality.pick().unwrap();
            assert!((30..=80).contains(&q));
        }
        assert_eq!(Quality::Fixed(0).pick(), Some(1));
        assert_eq!(Quality::Original.pick(), None);
    }
}
