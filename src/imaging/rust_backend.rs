//! Pure Rust raster engine, no external binaries.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP, BMP, AVIF enc.) | `image` crate |
//! | Decode multi-page TIFF → layers | `tiff::decoder::Decoder` page walk |
//! | Decode GIF frames → layers | `image::codecs::gif::GifDecoder` + `AnimationDecoder` |
//! | Decode Photoshop → composite + layers | `psd::Psd` |
//! | Merge layers | `image::imageops::overlay` in container order |
//! | Resize / outbound thumbnail | `resize_exact` / `resize_to_fill` with `Lanczos3` |
//! | Rotate (multiples of 90°) | `rotate90` / `rotate180` / `rotate270` |
//! | Rotate (other angles) | `imageproc::geometric_transformations::rotate_about_center` |
//! | Encode JPEG (quality, density) | `image::codecs::jpeg::JpegEncoder` |
//! | Encode AVIF (quality) | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//!
//! Only the ICC profile survives a decode/encode cycle; [`RasterImage::strip`]
//! drops it. The `image` encoders write no EXIF of their own.

use super::backend::{Dimensions, Layer, LayerId, RasterEngine, RasterError, RasterImage};
use super::params::{EncodeOptions, Palette, Quality, ThumbnailMode};
use crate::spec::ResolutionUnit;
use image::codecs::jpeg::{JpegEncoder, PixelDensity, PixelDensityUnit};
use image::imageops::FilterType;
use image::{
    AnimationDecoder, DynamicImage, ImageBuffer, ImageDecoder, ImageEncoder, ImageFormat,
    ImageReader, Rgb, RgbImage, Rgba, RgbaImage,
};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;
use tracing::debug;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const PSD_MAGIC: &[u8; 4] = b"8BPS";

/// Pure Rust engine using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

fn decode_error(path: &Path, err: impl std::fmt::Display) -> RasterError {
    RasterError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), err))
}

/// Sniff the format from content, falling back to the extension.
fn guess_format(path: &Path) -> Result<ImageFormat, RasterError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    reader
        .format()
        .or_else(|| ImageFormat::from_path(path).ok())
        .ok_or_else(|| RasterError::UnsupportedFormat(path.display().to_string()))
}

/// Whether the file starts with the Photoshop signature.
fn is_photoshop(path: &Path) -> Result<bool, RasterError> {
    let mut head = Vec::with_capacity(PSD_MAGIC.len());
    File::open(path)?
        .take(PSD_MAGIC.len() as u64)
        .read_to_end(&mut head)?;
    Ok(head == PSD_MAGIC)
}

/// Decode a Photoshop document: the merged composite first, then every layer.
///
/// Layers come out canvas-sized, so they all share the composite's dimensions.
fn decode_photoshop(path: &Path) -> Result<Vec<DynamicImage>, RasterError> {
    let bytes = std::fs::read(path)?;
    let psd = psd::Psd::from_bytes(&bytes).map_err(|e| decode_error(path, e))?;
    let (width, height) = (psd.width(), psd.height());
    let to_image = |rgba: Vec<u8>| {
        RgbaImage::from_raw(width, height, rgba)
            .map(DynamicImage::ImageRgba8)
            .ok_or_else(|| decode_error(path, "pixel data does not match the canvas size"))
    };

    let mut images = vec![to_image(psd.rgba())?];
    for layer in psd.layers() {
        images.push(to_image(layer.rgba())?);
    }

    debug!(path = %path.display(), layers = images.len() - 1, "Decoded Photoshop document");
    Ok(images)
}

/// Decode a single-image file, keeping its ICC profile.
fn decode_single(path: &Path) -> Result<(DynamicImage, Option<Vec<u8>>), RasterError> {
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()
        .map_err(|e| decode_error(path, e))?;
    let icc = decoder.icc_profile().ok().flatten();
    let image = DynamicImage::from_decoder(decoder).map_err(|e| decode_error(path, e))?;
    Ok((image, icc))
}

/// Decode every GIF frame, composited to the full canvas.
fn decode_gif_frames(path: &Path) -> Result<Vec<DynamicImage>, RasterError> {
    let reader = BufReader::new(File::open(path)?);
    let decoder =
        image::codecs::gif::GifDecoder::new(reader).map_err(|e| decode_error(path, e))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| decode_error(path, e))?;
    Ok(frames
        .into_iter()
        .map(|frame| DynamicImage::ImageRgba8(frame.into_buffer()))
        .collect())
}

/// Decode every page (IFD) of a TIFF file.
fn decode_tiff_pages(path: &Path) -> Result<Vec<DynamicImage>, RasterError> {
    let reader = BufReader::new(File::open(path)?);
    let mut decoder = tiff::decoder::Decoder::new(reader).map_err(|e| decode_error(path, e))?;
    let mut pages = Vec::new();

    loop {
        let (width, height) = decoder.dimensions().map_err(|e| decode_error(path, e))?;
        let color = decoder.colortype().map_err(|e| decode_error(path, e))?;
        let data = decoder.read_image().map_err(|e| decode_error(path, e))?;
        pages.push(tiff_page_to_image(width, height, color, data)?);

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(|e| decode_error(path, e))?;
    }

    debug!(path = %path.display(), pages = pages.len(), "Decoded TIFF pages");
    Ok(pages)
}

fn tiff_page_to_image(
    width: u32,
    height: u32,
    color: tiff::ColorType,
    data: tiff::decoder::DecodingResult,
) -> Result<DynamicImage, RasterError> {
    use tiff::ColorType as C;
    use tiff::decoder::DecodingResult as D;

    let image = match (color, data) {
        (C::Gray(8), D::U8(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageLuma8)
        }
        (C::GrayA(8), D::U8(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageLumaA8)
        }
        (C::RGB(8), D::U8(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgb8)
        }
        (C::RGBA(8), D::U8(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgba8)
        }
        (C::CMYK(8), D::U8(buf)) => {
            ImageBuffer::from_raw(width, height, cmyk_to_rgb(&buf)).map(DynamicImage::ImageRgb8)
        }
        (C::Gray(16), D::U16(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageLuma16)
        }
        (C::RGB(16), D::U16(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgb16)
        }
        (C::RGBA(16), D::U16(buf)) => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgba16)
        }
        (color, _) => {
            return Err(RasterError::UnsupportedFormat(format!(
                "TIFF color type {color:?}"
            )));
        }
    };

    image.ok_or_else(|| {
        RasterError::ProcessingFailed("TIFF page buffer does not match its dimensions".into())
    })
}

/// Naive CMYK → RGB, 8 bits per channel.
fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    cmyk.chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - u16::from(px[3]);
            [px[0], px[1], px[2]].map(|c| ((255 - u16::from(c)) * k / 255) as u8)
        })
        .collect()
}

/// Parse `#rrggbb` / `rrggbb`.
fn parse_hex_color(value: &str) -> Option<Rgb<u8>> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

/// Composite onto an opaque background and drop the alpha channel.
fn flatten(image: &DynamicImage, background: Rgb<u8>) -> DynamicImage {
    let rgba = image.to_rgba8();
    let flat = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let alpha = u16::from(a);
        let blend =
            |c: u8, bg: u8| ((u16::from(c) * alpha + u16::from(bg) * (255 - alpha) + 127) / 255) as u8;
        Rgb([
            blend(r, background[0]),
            blend(g, background[1]),
            blend(b, background[2]),
        ])
    });
    DynamicImage::ImageRgb8(flat)
}

/// Center `source` on a transparent canvas large enough to hold it rotated by `theta`.
fn rotation_canvas(source: &RgbaImage, theta: f32) -> RgbaImage {
    let (w, h) = (source.width() as f32, source.height() as f32);
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let width = ((w * cos + h * sin).ceil() as u32).max(source.width());
    let height = ((w * sin + h * cos).ceil() as u32).max(source.height());

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    let x = i64::from((width - source.width()) / 2);
    let y = i64::from((height - source.height()) / 2);
    image::imageops::overlay(&mut canvas, source, x, y);
    canvas
}

fn rotate(image: &DynamicImage, degrees: i32) -> DynamicImage {
    match degrees.rem_euclid(360) {
        0 => image.clone(),
        90 => image.rotate90(),
        180 => image.rotate180(),
        270 => image.rotate270(),
        other => {
            let theta = (other as f32).to_radians();
            let canvas = rotation_canvas(&image.to_rgba8(), theta);
            DynamicImage::ImageRgba8(imageproc::geometric_transformations::rotate_about_center(
                &canvas,
                theta,
                imageproc::geometric_transformations::Interpolation::Bilinear,
                Rgba([0, 0, 0, 0]),
            ))
        }
    }
}

/// How [`write_image`] encodes.
struct WriteSettings<'a> {
    quality: Quality,
    flatten_onto: Option<Rgb<u8>>,
    density: Option<PixelDensity>,
    icc_profile: Option<&'a [u8]>,
}

impl Default for WriteSettings<'_> {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            flatten_onto: None,
            density: None,
            icc_profile: None,
        }
    }
}

fn attach_icc(encoder: &mut impl ImageEncoder, icc: Option<&[u8]>) {
    if let Some(icc) = icc {
        if let Err(e) = encoder.set_icc_profile(icc.to_vec()) {
            debug!(error = %e, "Encoder does not take ICC profiles, dropping it");
        }
    }
}

/// Save with the format inferred from the extension.
fn write_image(
    image: &DynamicImage,
    path: &Path,
    settings: &WriteSettings<'_>,
) -> Result<(), RasterError> {
    let format = ImageFormat::from_path(path)
        .map_err(|_| RasterError::UnsupportedFormat(path.display().to_string()))?;

    // JPEG has no alpha channel; composite on white unless told otherwise.
    let flatten_onto = match (settings.flatten_onto, format) {
        (Some(bg), _) => Some(bg),
        (None, ImageFormat::Jpeg) if image.color().has_alpha() => Some(WHITE),
        (None, _) => None,
    };
    let image = match flatten_onto {
        Some(bg) => flatten(image, bg),
        None => image.clone(),
    };

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let quality = settings.quality.value() as u8;

    let result = match format {
        ImageFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
            if let Some(density) = settings.density {
                encoder.set_pixel_density(density);
            }
            attach_icc(&mut encoder, settings.icc_profile);
            DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)
        }
        ImageFormat::Avif => {
            let mut encoder =
                image::codecs::avif::AvifEncoder::new_with_speed_quality(&mut writer, 6, quality);
            attach_icc(&mut encoder, settings.icc_profile);
            image.write_with_encoder(encoder)
        }
        ImageFormat::Png => {
            let mut encoder = image::codecs::png::PngEncoder::new(&mut writer);
            attach_icc(&mut encoder, settings.icc_profile);
            image.write_with_encoder(encoder)
        }
        other => image.write_to(&mut writer, other),
    };

    result.map_err(|e| {
        RasterError::ProcessingFailed(format!("Failed to encode {}: {}", path.display(), e))
    })
}

fn pixel_density(unit: ResolutionUnit, x: u32, y: u32) -> Result<PixelDensity, RasterError> {
    let to_u16 = |v: u32| {
        u16::try_from(v)
            .map_err(|_| RasterError::InvalidOption(format!("resolution {v} is out of range")))
    };
    Ok(PixelDensity {
        density: (to_u16(x)?, to_u16(y)?),
        unit: match unit {
            ResolutionUnit::PixelsPerInch => PixelDensityUnit::Inches,
            ResolutionUnit::PixelsPerCentimeter => PixelDensityUnit::Centimeters,
        },
    })
}

impl RasterEngine for RustBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn RasterImage>, RasterError> {
        let (pages, icc_profile) = if is_photoshop(path)? {
            (decode_photoshop(path)?, None)
        } else {
            match guess_format(path)? {
                ImageFormat::Tiff => (decode_tiff_pages(path)?, None),
                ImageFormat::Gif => (decode_gif_frames(path)?, None),
                _ => {
                    let (image, icc) = decode_single(path)?;
                    (vec![image], icc)
                }
            }
        };

        if pages.is_empty() {
            return Err(decode_error(path, "no image data"));
        }

        Ok(Box::new(RustImage {
            layers: pages
                .into_iter()
                .enumerate()
                .map(|(i, image)| (LayerId(i), image))
                .collect(),
            icc_profile,
        }))
    }
}

/// Decoded image held by [`RustBackend`].
pub struct RustImage {
    layers: Vec<(LayerId, DynamicImage)>,
    icc_profile: Option<Vec<u8>>,
}

impl RustImage {
    fn primary(&self) -> Result<&DynamicImage, RasterError> {
        self.layers
            .first()
            .map(|(_, image)| image)
            .ok_or_else(|| RasterError::ProcessingFailed("Image has no layers left".into()))
    }

    fn map_layers(&mut self, f: impl Fn(&DynamicImage) -> DynamicImage) {
        for (_, image) in &mut self.layers {
            *image = f(image);
        }
    }
}

impl RasterImage for RustImage {
    fn size(&self) -> Dimensions {
        self.layers
            .first()
            .map(|(_, image)| Dimensions::new(image.width(), image.height()))
            .unwrap_or(Dimensions::new(0, 0))
    }

    fn layers(&self) -> Vec<Layer> {
        self.layers
            .iter()
            .map(|(id, image)| Layer {
                id: *id,
                size: Dimensions::new(image.width(), image.height()),
            })
            .collect()
    }

    fn remove_layer(&mut self, id: LayerId) -> Result<(), RasterError> {
        let index = self
            .layers
            .iter()
            .position(|(layer, _)| *layer == id)
            .ok_or(RasterError::LayerNotFound(id))?;
        self.layers.remove(index);
        Ok(())
    }

    fn merge_layers(&mut self) -> Result<(), RasterError> {
        let Some(((first_id, first), rest)) = self.layers.split_first() else {
            return Ok(());
        };
        if rest.is_empty() {
            return Ok(());
        }
        let same_size = |image: &DynamicImage| {
            image.width() == first.width() && image.height() == first.height()
        };
        if let Some((id, odd)) = rest.iter().find(|(_, image)| !same_size(image)) {
            return Err(RasterError::MergeFailed(format!(
                "layer {id} is {}x{}, layer {first_id} is {}x{}",
                odd.width(),
                odd.height(),
                first.width(),
                first.height()
            )));
        }

        let mut canvas = first.to_rgba8();
        for (_, layer) in rest {
            image::imageops::overlay(&mut canvas, &layer.to_rgba8(), 0, 0);
        }
        let first_id = *first_id;
        self.layers = vec![(first_id, DynamicImage::ImageRgba8(canvas))];
        Ok(())
    }

    fn save_layer(&self, id: LayerId, path: &Path) -> Result<(), RasterError> {
        let (_, image) = self
            .layers
            .iter()
            .find(|(layer, _)| *layer == id)
            .ok_or(RasterError::LayerNotFound(id))?;
        write_image(
            image,
            path,
            &WriteSettings {
                quality: Quality::new(100).unwrap_or_default(),
                icc_profile: self.icc_profile.as_deref(),
                ..WriteSettings::default()
            },
        )
    }

    fn resize(&mut self, size: Dimensions) -> Result<(), RasterError> {
        self.map_layers(|image| image.resize_exact(size.width, size.height, FilterType::Lanczos3));
        Ok(())
    }

    fn thumbnail(&mut self, size: Dimensions, mode: ThumbnailMode) -> Result<(), RasterError> {
        match mode {
            ThumbnailMode::Outbound => self.map_layers(|image| {
                image.resize_to_fill(size.width, size.height, FilterType::Lanczos3)
            }),
        }
        Ok(())
    }

    fn rotate(&mut self, degrees: i32) -> Result<(), RasterError> {
        if degrees.rem_euclid(360) != 0 {
            self.map_layers(|image| rotate(image, degrees));
        }
        Ok(())
    }

    fn use_palette(&mut self, palette: Palette) -> Result<(), RasterError> {
        match palette {
            Palette::Rgb => self.map_layers(|image| {
                if image.color().has_alpha() {
                    DynamicImage::ImageRgba8(image.to_rgba8())
                } else {
                    DynamicImage::ImageRgb8(image.to_rgb8())
                }
            }),
        }
        Ok(())
    }

    fn strip(&mut self) -> Result<(), RasterError> {
        self.icc_profile = None;
        Ok(())
    }

    fn save(&self, path: &Path, options: &EncodeOptions) -> Result<(), RasterError> {
        let quality = Quality::new(options.quality).ok_or_else(|| {
            RasterError::InvalidOption(format!("quality {} is not in 1..=100", options.quality))
        })?;

        let flatten_onto = if options.disable_alpha {
            let background = match options.background_color.as_deref() {
                Some(color) => parse_hex_color(color).ok_or_else(|| {
                    RasterError::InvalidOption(format!("background color {color:?}"))
                })?,
                None => WHITE,
            };
            Some(background)
        } else {
            None
        };

        let density = pixel_density(
            options.resolution_unit,
            options.resolution_x,
            options.resolution_y,
        )?;

        write_image(
            self.primary()?,
            path,
            &WriteSettings {
                quality,
                flatten_onto,
                density: Some(density),
                icc_profile: self.icc_profile.as_deref(),
            },
        )
    }
}
