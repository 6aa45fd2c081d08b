//! Turns a user-supplied URL or image file into a value that fits in the persisted store.
//!
//! URLs pass through untouched. Files under 15 MiB become a base64 data URI of the
//! original bytes. Larger files are decoded, downscaled to a size-tiered longer edge
//! and re-encoded as JPEG. Above 30 MiB the caller must first choose between
//! [`CompressionChoice::Compress`] and [`CompressionChoice::AsIs`].

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageEncoder, ImageReader};
use thiserror::Error;

mod resize;

pub use resize::fit_within;

const MIB: u64 = 1024 * 1024;

pub const MAX_UPLOAD_BYTES: u64 = 50 * MIB;
pub const PASSTHROUGH_LIMIT_BYTES: u64 = 15 * MIB;
pub const CONFIRM_THRESHOLD_BYTES: u64 = 30 * MIB;
const TIER_LARGE_BYTES: u64 = 20 * MIB;

const AUTO_QUALITY: u8 = 95;
const COMPRESS_MAX_EDGE: u32 = 1920;
const COMPRESS_QUALITY: u8 = 85;
const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("image url is empty")]
    EmptyUrl,
    #[error("unsupported media type: {mime}")]
    UnsupportedMediaType { mime: String },
    #[error("image is {size} bytes; the limit is {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },
    #[error("image of {size} bytes needs a compression choice")]
    ChoiceRequired { size: u64 },
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("failed to encode image: {0}")]
    Encode(String),
}

pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// The caller's answer when a file is over [`CONFIRM_THRESHOLD_BYTES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionChoice {
    Compress,
    AsIs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestPlan {
    Passthrough,
    Reencode { max_edge: u32, quality: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Builds a file whose type is sniffed from its magic bytes.
    pub fn sniffed(bytes: Vec<u8>) -> Self {
        let mime = sniff_mime(&bytes);
        Self {
            mime: mime.to_string(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A storable image reference plus diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub image_ref: String,
    pub byte_len: usize,
    pub plan: IngestPlan,
    pub dimensions: Option<(u32, u32)>,
}

pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes).map_or(FALLBACK_MIME, |format| format.to_mime_type())
}

pub fn ingest_url(url: &str) -> IngestResult<EncodedImage> {
    let url = url.trim();
    if url.is_empty() {
        return Err(IngestError::EmptyUrl);
    }
    Ok(EncodedImage {
        image_ref: url.to_string(),
        byte_len: url.len(),
        plan: IngestPlan::Passthrough,
        dimensions: None,
    })
}

/// Cheap checks that run before any byte is decoded.
pub fn validate_file(file: &ImageFile) -> IngestResult<()> {
    if !file.mime.starts_with("image/") {
        return Err(IngestError::UnsupportedMediaType {
            mime: file.mime.clone(),
        });
    }
    if file.size() > MAX_UPLOAD_BYTES {
        return Err(IngestError::PayloadTooLarge {
            size: file.size(),
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

pub fn needs_choice(size: u64) -> bool {
    size > CONFIRM_THRESHOLD_BYTES
}

/// Longer-edge cap for automatic re-encoding, tiered by raw size.
pub fn tier_max_edge(size: u64) -> u32 {
    if size < TIER_LARGE_BYTES {
        3000
    } else if size < CONFIRM_THRESHOLD_BYTES {
        2400
    } else {
        1600
    }
}

pub fn plan_for(size: u64, choice: Option<CompressionChoice>) -> IngestResult<IngestPlan> {
    if size < PASSTHROUGH_LIMIT_BYTES {
        return Ok(IngestPlan::Passthrough);
    }
    let auto = IngestPlan::Reencode {
        max_edge: tier_max_edge(size),
        quality: AUTO_QUALITY,
    };
    if !needs_choice(size) {
        return Ok(auto);
    }
    match choice {
        Some(CompressionChoice::Compress) => Ok(IngestPlan::Reencode {
            max_edge: COMPRESS_MAX_EDGE,
            quality: COMPRESS_QUALITY,
        }),
        Some(CompressionChoice::AsIs) => Ok(auto),
        None => Err(IngestError::ChoiceRequired { size }),
    }
}

pub fn ingest_file(file: &ImageFile, choice: Option<CompressionChoice>) -> IngestResult<EncodedImage> {
    validate_file(file)?;
    if file.bytes.is_empty() {
        return Err(IngestError::Decode("file is empty".to_string()));
    }
    let plan = plan_for(file.size(), choice)?;
    tracing::debug!(size = file.size(), mime = %file.mime, ?plan, "ingesting image file");

    let encoded = match plan {
        IngestPlan::Passthrough => EncodedImage::from_bytes(&file.mime, &file.bytes, plan, None),
        IngestPlan::Reencode { max_edge, quality } => {
            let (jpeg, dimensions) = reencode_jpeg(&file.bytes, max_edge, quality)?;
            EncodedImage::from_bytes("image/jpeg", &jpeg, plan, Some(dimensions))
        }
    };
    tracing::info!(
        raw = file.size(),
        encoded = encoded.byte_len,
        dimensions = ?encoded.dimensions,
        "image ingested"
    );
    Ok(encoded)
}

impl EncodedImage {
    fn from_bytes(
        mime: &str,
        bytes: &[u8],
        plan: IngestPlan,
        dimensions: Option<(u32, u32)>,
    ) -> Self {
        let image_ref = format!("data:{mime};base64,{}", STANDARD.encode(bytes));
        Self {
            byte_len: image_ref.len(),
            image_ref,
            plan,
            dimensions,
        }
    }
}

/// Decodes, downsizes to `max_edge` and writes a JPEG at `quality`.
pub fn reencode_jpeg(bytes: &[u8], max_edge: u32, quality: u8) -> IngestResult<(Vec<u8>, (u32, u32))> {
    let rgb = {
        let decoded = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|err| IngestError::Decode(err.to_string()))?
            .decode()
            .map_err(|err| IngestError::Decode(err.to_string()))?;
        let (width, height) = fit_within(decoded.width(), decoded.height(), max_edge);
        let resized = if (width, height) == (decoded.width(), decoded.height()) {
            decoded
        } else {
            decoded.resize_exact(width, height, FilterType::Triangle)
        };
        resized.to_rgb8()
    };

    let (width, height) = rgb.dimensions();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(Cursor::new(&mut buffer), quality.clamp(1, 100))
        .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|err| IngestError::Encode(err.to_string()))?;
    Ok((buffer, (width, height)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn encode_as(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), format)
            .expect("fixture should encode");
        bytes
    }

    fn decode_data_uri(image_ref: &str) -> (String, Vec<u8>) {
        let rest = image_ref.strip_prefix("data:").expect("data uri");
        let (mime, payload) = rest.split_once(";base64,").expect("base64 marker");
        (mime.to_string(), STANDARD.decode(payload).expect("valid base64"))
    }

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn url_passes_through_trimmed() {
        let encoded = ingest_url("  https://a.test/bg.jpg \n").unwrap();
        assert_eq!(encoded.image_ref, "https://a.test/bg.jpg");
        assert_eq!(encoded.plan, IngestPlan::Passthrough);
        assert!(matches!(ingest_url("   "), Err(IngestError::EmptyUrl)));
    }

    #[test]
    fn non_image_mime_is_rejected_before_decoding() {
        let file = ImageFile::new("application/pdf", vec![0; 16]);
        let err = ingest_file(&file, None).expect_err("pdf should be rejected");
        assert!(matches!(err, IngestError::UnsupportedMediaType { ref mime } if mime == "application/pdf"));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let file = ImageFile::new("image/png", vec![0; (MAX_UPLOAD_BYTES + 1) as usize]);
        let err = ingest_file(&file, Some(CompressionChoice::Compress)).unwrap_err();
        assert!(matches!(err, IngestError::PayloadTooLarge { limit, .. } if limit == MAX_UPLOAD_BYTES));
    }

    #[test]
    fn three_mib_jpeg_passes_through_without_resize() {
        let bytes = vec![0xAB; 3 * MIB as usize];
        let file = ImageFile::new("image/jpeg", bytes.clone());
        let encoded = ingest_file(&file, None).unwrap();

        assert!(encoded.image_ref.starts_with("data:image/jpeg;base64,"));
        assert_eq!(encoded.plan, IngestPlan::Passthrough);
        assert_eq!(encoded.dimensions, None);
        assert_eq!(decode_data_uri(&encoded.image_ref).1, bytes);
    }

    #[test]
    fn plan_tiers_follow_raw_size() {
        assert_eq!(plan_for(14 * MIB, None).unwrap(), IngestPlan::Passthrough);
        assert_eq!(
            plan_for(15 * MIB, None).unwrap(),
            IngestPlan::Reencode { max_edge: 3000, quality: 95 }
        );
        assert_eq!(
            plan_for(25 * MIB, None).unwrap(),
            IngestPlan::Reencode { max_edge: 2400, quality: 95 }
        );
        assert_eq!(
            plan_for(30 * MIB, None).unwrap(),
            IngestPlan::Reencode { max_edge: 1600, quality: 95 }
        );
    }

    #[test]
    fn large_files_require_a_choice() {
        assert!(matches!(
            plan_for(40 * MIB, None),
            Err(IngestError::ChoiceRequired { size }) if size == 40 * MIB
        ));
        assert_eq!(
            plan_for(40 * MIB, Some(CompressionChoice::Compress)).unwrap(),
            IngestPlan::Reencode { max_edge: 1920, quality: 85 }
        );
    }

    #[test]
    fn as_is_never_uses_the_compress_tier() {
        for size in [31 * MIB, 40 * MIB, MAX_UPLOAD_BYTES] {
            let plan = plan_for(size, Some(CompressionChoice::AsIs)).unwrap();
            match plan {
                IngestPlan::Reencode { max_edge, quality } => {
                    assert!(max_edge <= 3000);
                    assert_ne!(max_edge, COMPRESS_MAX_EDGE);
                    assert_eq!(quality, AUTO_QUALITY);
                }
                IngestPlan::Passthrough => panic!("large file should be re-encoded"),
            }
        }
    }

    #[test]
    fn reencode_caps_longer_edge_and_emits_jpeg() {
        let png = encode_as(&gradient(2400, 1600), ImageFormat::Png);
        let (jpeg, dimensions) = reencode_jpeg(&png, COMPRESS_MAX_EDGE, COMPRESS_QUALITY).unwrap();

        assert_eq!(dimensions, (1920, 1280));
        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
        let reread = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((reread.width(), reread.height()), (1920, 1280));
    }

    #[test]
    fn corrupt_bytes_report_decode_error() {
        let err = reencode_jpeg(b"definitely not pixels", 1920, 85).unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)));

        let file = ImageFile::new("image/png", Vec::new());
        assert!(matches!(ingest_file(&file, None), Err(IngestError::Decode(_))));
    }

    #[test]
    fn file_above_passthrough_limit_is_reencoded_as_jpeg() {
        // An uncompressed bitmap is the cheapest way to get past 15 MiB.
        let bmp = encode_as(&gradient(2600, 2200), ImageFormat::Bmp);
        assert!(bmp.len() as u64 >= PASSTHROUGH_LIMIT_BYTES);

        let encoded = ingest_file(&ImageFile::sniffed(bmp), None).unwrap();
        assert_eq!(encoded.plan, IngestPlan::Reencode { max_edge: 3000, quality: 95 });
        assert_eq!(encoded.dimensions, Some((2600, 2200)));
        let (mime, jpeg) = decode_data_uri(&encoded.image_ref);
        assert_eq!(mime, "image/jpeg");
        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn sniff_mime_reads_magic_bytes() {
        let png = encode_as(&gradient(4, 4), ImageFormat::Png);
        assert_eq!(sniff_mime(&png), "image/png");
        assert_eq!(sniff_mime(b"hello"), FALLBACK_MIME);
    }
}
