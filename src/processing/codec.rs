//! Codec operations consumed by the transformer
//!
//! The transformer only talks to [`ImageCodec`]. [`ImageCrateCodec`] is the
//! stock implementation on top of `image`, `webp` (libwebp), `color_quant`
//! and `png`.

use std::io::Cursor;

use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType as PngCompression, FilterType, PngEncoder};
use image::{DynamicImage, ImageReader};
use tracing::debug;

use crate::error::{Result, ImgpressError};
use crate::processing::formats::SourceFormat;

/// Operations of the external codec library.
///
/// Every method takes the raw source file bytes and returns the encoded
/// output. Quality values are forwarded untouched.
pub trait ImageCodec: Send + Sync {
    /// Decode any supported input and encode it as JPEG
    fn transform_jpeg(&self, source: &[u8], quality: u8) -> Result<Vec<u8>>;

    /// Recompress a JPEG. `None` keeps the image data bit-exact.
    fn compress_jpeg(&self, source: &[u8], quality: Option<u8>) -> Result<Vec<u8>>;

    /// Recompress a PNG without changing pixels
    fn lossless_compress_png(&self, source: &[u8]) -> Result<Vec<u8>>;

    /// Reduce a PNG to a palette bounded by `max_quality`
    fn png_quantize(&self, source: &[u8], max_quality: u8) -> Result<Vec<u8>>;

    /// Decode any supported input and encode it as lossy WebP
    fn transform_webp(&self, source: &[u8], quality: u8) -> Result<Vec<u8>>;

    /// Decode any supported input and encode it as lossless WebP
    fn transform_webp_lossless(&self, source: &[u8]) -> Result<Vec<u8>>;

    /// Decode any supported input and encode it as AVIF
    fn transform_avif(&self, source: &[u8], quality: u8) -> Result<Vec<u8>>;

    /// Whether sources of `format` can be decoded at all
    fn can_decode(&self, _format: SourceFormat) -> bool {
        true
    }
}

/// AVIF encoder speed (1 = slowest/best, 10 = fastest)
pub const DEFAULT_AVIF_SPEED: u8 = 6;

const AVIF_SPEED_RANGE: (u8, u8) = (1, 10);

/// libwebp quality used for lossless output (effort, not fidelity)
const WEBP_LOSSLESS_EFFORT: f32 = 75.0;

/// NeuQuant sampling factor, 1 (best) to 30 (fastest)
const NEUQUANT_SAMPLE_FACTOR: i32 = 10;

/// Codec backed by the `image` crate family
#[derive(Debug, Clone)]
pub struct ImageCrateCodec {
    avif_speed: u8,
}

impl ImageCrateCodec {
    pub fn new() -> Self {
        Self {
            avif_speed: DEFAULT_AVIF_SPEED,
        }
    }

    /// Override the AVIF encoder speed, clamped to 1..=10
    pub fn with_avif_speed(mut self, speed: u8) -> Self {
        self.avif_speed = speed.clamp(AVIF_SPEED_RANGE.0, AVIF_SPEED_RANGE.1);
        self
    }

    fn decode(&self, source: &[u8]) -> Result<DynamicImage> {
        let reader = ImageReader::new(Cursor::new(source)).with_guessed_format()?;
        debug!("Decoding {:?} input ({} bytes)", reader.format(), source.len());
        Ok(reader.decode()?)
    }

    fn encode_jpeg(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        let mut output = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut output, quality);
        rgb.write_with_encoder(encoder)?;
        Ok(output)
    }
}

impl Default for ImageCrateCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for ImageCrateCodec {
    fn transform_jpeg(&self, source: &[u8], quality: u8) -> Result<Vec<u8>> {
        let image = self.decode(source)?;
        self.encode_jpeg(&image, quality)
    }

    fn compress_jpeg(&self, source: &[u8], quality: Option<u8>) -> Result<Vec<u8>> {
        match quality {
            Some(quality) => {
                let image = self.decode(source)?;
                self.encode_jpeg(&image, quality)
            }
            None => strip_jpeg_metadata(source),
        }
    }

    fn lossless_compress_png(&self, source: &[u8]) -> Result<Vec<u8>> {
        let image = self.decode(source)?;
        let mut output = Vec::new();
        let encoder = PngEncoder::new_with_quality(
            &mut output,
            PngCompression::Best,
            FilterType::Adaptive,
        );
        image.write_with_encoder(encoder)?;
        Ok(output)
    }

    fn png_quantize(&self, source: &[u8], max_quality: u8) -> Result<Vec<u8>> {
        let rgba = self.decode(source)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        let colors = palette_size(max_quality);

        let quantizer = color_quant::NeuQuant::new(NEUQUANT_SAMPLE_FACTOR, colors, rgba.as_raw());
        let color_map = quantizer.color_map_rgba();

        let indices: Vec<u8> = rgba
            .pixels()
            .map(|pixel| quantizer.index_of(&pixel.0) as u8)
            .collect();

        let mut palette = Vec::with_capacity(colors * 3);
        let mut alphas = Vec::with_capacity(colors);
        for entry in color_map.chunks_exact(4) {
            palette.extend_from_slice(&entry[..3]);
            alphas.push(entry[3]);
        }

        debug!("Quantized {}x{} image to {} colors", width, height, colors);

        let mut output = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut output, width, height);
            encoder.set_color(png::ColorType::Indexed);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_compression(png::Compression::Best);
            encoder.set_palette(palette);
            if alphas.iter().any(|&a| a != u8::MAX) {
                encoder.set_trns(alphas);
            }

            let mut writer = encoder
                .write_header()
                .map_err(|e| ImgpressError::codec("png_quantize", e.to_string()))?;
            writer
                .write_image_data(&indices)
                .map_err(|e| ImgpressError::codec("png_quantize", e.to_string()))?;
            writer
                .finish()
                .map_err(|e| ImgpressError::codec("png_quantize", e.to_string()))?;
        }

        Ok(output)
    }

    fn transform_webp(&self, source: &[u8], quality: u8) -> Result<Vec<u8>> {
        let rgba = self.decode(source)?.to_rgba8();
        let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
        let memory = encoder
            .encode_simple(false, f32::from(quality))
            .map_err(|e| ImgpressError::codec("transform_webp", format!("{e:?}")))?;
        Ok(memory.to_vec())
    }

    fn transform_webp_lossless(&self, source: &[u8]) -> Result<Vec<u8>> {
        let rgba = self.decode(source)?.to_rgba8();
        let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
        let memory = encoder
            .encode_simple(true, WEBP_LOSSLESS_EFFORT)
            .map_err(|e| ImgpressError::codec("transform_webp_lossless", format!("{e:?}")))?;
        Ok(memory.to_vec())
    }

    fn transform_avif(&self, source: &[u8], quality: u8) -> Result<Vec<u8>> {
        let rgba = DynamicImage::ImageRgba8(self.decode(source)?.to_rgba8());
        let mut output = Vec::new();
        let encoder = AvifEncoder::new_with_speed_quality(&mut output, self.avif_speed, quality);
        rgba.write_with_encoder(encoder)?;
        Ok(output)
    }

    fn can_decode(&self, format: SourceFormat) -> bool {
        // AVIF decoding links dav1d and is opt-in
        format != SourceFormat::Avif || cfg!(feature = "avif-decode")
    }
}

/// Palette size for a quantization quality ceiling
pub fn palette_size(max_quality: u8) -> usize {
    let scaled = (256.0 * f64::from(max_quality) / 100.0).round() as usize;
    scaled.clamp(2, 256)
}

/// Drop metadata segments from a JPEG stream.
///
/// APP1 (EXIF/XMP), APP3-APP15 and COM segments are removed. APP0 (JFIF),
/// APP2 (ICC profile), tables and the entropy-coded scan are copied
/// verbatim, so decoded pixels are identical.
pub fn strip_jpeg_metadata(source: &[u8]) -> Result<Vec<u8>> {
    const OP: &str = "compress_jpeg";

    if !source.starts_with(&[0xFF, 0xD8]) {
        return Err(ImgpressError::codec(OP, "missing SOI marker"));
    }

    let mut output = Vec::with_capacity(source.len());
    output.extend_from_slice(&source[..2]);
    let mut pos = 2;

    loop {
        if pos + 1 >= source.len() {
            return Err(ImgpressError::codec(OP, "truncated before start of scan"));
        }
        if source[pos] != 0xFF {
            return Err(ImgpressError::codec(
                OP,
                format!("expected marker at offset {}", pos),
            ));
        }

        let marker = source[pos + 1];
        match marker {
            // fill byte
            0xFF => pos += 1,
            // EOI without a scan
            0xD9 => {
                output.extend_from_slice(&source[pos..pos + 2]);
                return Ok(output);
            }
            // SOS: everything from here on is kept
            0xDA => {
                output.extend_from_slice(&source[pos..]);
                return Ok(output);
            }
            0x01 | 0xD0..=0xD7 => {
                output.extend_from_slice(&source[pos..pos + 2]);
                pos += 2;
            }
            _ => {
                if pos + 3 >= source.len() {
                    return Err(ImgpressError::codec(OP, "truncated segment header"));
                }
                let length = usize::from(u16::from_be_bytes([source[pos + 2], source[pos + 3]]));
                let end = pos + 2 + length;
                if length < 2 || end > source.len() {
                    return Err(ImgpressError::codec(
                        OP,
                        format!("bad segment length {} at offset {}", length, pos),
                    ));
                }
                if !is_metadata_marker(marker) {
                    output.extend_from_slice(&source[pos..end]);
                }
                pos = end;
            }
        }
    }
}

fn is_metadata_marker(marker: u8) -> bool {
    marker == 0xE1 || (0xE3..=0xEF).contains(&marker) || marker == 0xFE
}
