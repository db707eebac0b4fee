//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Sniff format | `image::guess_format` (magic bytes, never the extension) |
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image` crate decoders |
//! | Orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Sharpening | `image::imageops::unsharpen` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::ResizeParams;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::Read;
use std::path::Path;

/// Bytes read from the head of a file when sniffing its format.
const SNIFF_LEN: u64 = 64;

/// Detect the image format of a file from its leading bytes.
///
/// Returns `Ok(None)` for content that is not an image, or is an image format
/// whose decoder is not compiled in. The file extension is ignored.
pub fn sniff_format(path: &Path) -> std::io::Result<Option<ImageFormat>> {
    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    std::fs::File::open(path)?
        .take(SNIFF_LEN)
        .read_to_end(&mut head)?;
    Ok(image::guess_format(&head)
        .ok()
        .filter(|format| format.reading_enabled()))
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(path: &Path, e: image::ImageError) -> BackendError {
    BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
}

fn open_decoder(path: &Path) -> Result<impl ImageDecoder, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .into_decoder()
        .map_err(|e| decode_error(path, e))
}

fn swaps_axes(orientation: Orientation) -> bool {
    matches!(
        orientation,
        Orientation::Rotate90
            | Orientation::Rotate270
            | Orientation::Rotate90FlipH
            | Orientation::Rotate270FlipH
    )
}

/// Load and decode an image from disk, upright according to its EXIF tag.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    let mut decoder = open_decoder(path)?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder).map_err(|e| decode_error(path, e))?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Encode as baseline JPEG. Alpha is dropped since JPEG cannot carry it.
fn save_jpeg(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let file = std::fs::File::create(path).map_err(BackendError::Io)?;
    let writer = std::io::BufWriter::new(file);
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality as u8);
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let mut decoder = open_decoder(path)?;
        let (width, height) = decoder.dimensions();
        let orientation = decoder
            .orientation()
            .unwrap_or(Orientation::NoTransforms);
        if swaps_axes(orientation) {
            Ok(Dimensions {
                width: height,
                height: width,
            })
        } else {
            Ok(Dimensions { width, height })
        }
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let resized = img.resize_exact(params.width, params.height, FilterType::Lanczos3);

        let final_img = match params.sharpening {
            Some(sharpening) => DynamicImage::from(image::imageops::unsharpen(
                &resized,
                sharpening.sigma,
                sharpening.threshold,
            )),
            None => resized,
        };

        save_jpeg(&final_img, &params.output, params.quality.value())
    }
}
