//! Image-to-PDF builder
//!
//! Each JPEG or PNG becomes one page sized to the image's pixel dimensions,
//! with the image painted over the whole page. JPEG data is embedded as is;
//! PNG data is decoded and re-packed as Flate-compressed samples.

use std::io::{Cursor, Write};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Dictionary, Object, ObjectId, Stream};
use tracing::{debug, info, instrument, warn};

use crate::artifact::{ArtifactKind, OutputArtifact};
use crate::document::{CompressionProfile, OutputDocument, PageSet};
use crate::error::HexonError;

/// An uploaded image
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// `None` for anything that is not JPEG or PNG
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            _ => None,
        }
    }
}

/// Build one document with a page per supported image
///
/// Images of other types are skipped. Fails with `UnsupportedInput` when no
/// image is usable or when a JPEG/PNG cannot be decoded.
#[instrument(skip_all, fields(images = images.len()))]
pub fn images_to_pdf(images: &[ImageInput]) -> Result<OutputArtifact, HexonError> {
    let mut set = PageSet::new();

    for image in images {
        let Some(kind) = ImageKind::from_mime(&image.mime_type) else {
            warn!(name = %image.name, mime = %image.mime_type, "Skipping unsupported image type");
            continue;
        };
        let xobject = match kind {
            ImageKind::Jpeg => jpeg_xobject(&image.bytes, &mut set),
            ImageKind::Png => png_xobject(&image.bytes, &mut set),
        }
        .map_err(|e| HexonError::UnsupportedInput(format!("Image '{}': {}", image.name, e)))?;

        add_image_page(&mut set, xobject);
        debug!(name = %image.name, ?kind, width = xobject.width, height = xobject.height, "Added image page");
    }

    if set.is_empty() {
        return Err(HexonError::UnsupportedInput(
            "No JPEG or PNG images supplied".into(),
        ));
    }

    let mut output = OutputDocument::new("1.7");
    output.append(set)?;
    let page_count = output.page_count();
    let bytes = output.serialize(CompressionProfile::Medium)?;
    let artifact = OutputArtifact::new(ArtifactKind::ImagePdf, bytes, page_count);

    info!(pages = page_count, bytes = artifact.byte_len(), name = %artifact.name, "Built PDF from images");
    Ok(artifact)
}

/// An image XObject already stored in the arena
#[derive(Debug, Clone, Copy)]
struct PlacedImage {
    id: ObjectId,
    width: u32,
    height: u32,
}

fn add_image_page(set: &mut PageSet, image: PlacedImage) {
    let content = format!("q {} 0 0 {} 0 0 cm /Im1 Do Q", image.width, image.height);
    let content_id = set.push(Stream::new(Dictionary::new(), content.into_bytes()));

    let mut xobjects = Dictionary::new();
    xobjects.set("Im1", Object::Reference(image.id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(image.width as i64),
            Object::Integer(image.height as i64),
        ]),
    );
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Reference(content_id));

    let page_id = set.push(page);
    set.push_page(page_id, image.width as f32, image.height as f32);
}

fn image_dict(width: u32, height: u32, color_space: &str, filter: &str) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.as_bytes().to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
    dict
}

fn encoded_stream(dict: Dictionary, content: Vec<u8>) -> Stream {
    let mut stream = Stream::new(dict, content);
    stream.allows_compression = false;
    stream
}

/// JPEG frame header: width, height and component count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct JpegInfo {
    pub width: u32,
    pub height: u32,
    pub components: u8,
}

/// Scan markers up to the first start-of-frame
pub(crate) fn parse_jpeg_header(data: &[u8]) -> Result<JpegInfo, String> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err("not a valid JPEG file".into());
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            return Err("invalid JPEG marker".into());
        }
        let marker = data[pos + 1];
        pos += 2;

        match marker {
            // Fill bytes
            0xFF => {
                pos -= 1;
                continue;
            }
            // SOF0..SOF15, minus DHT, JPG and DAC
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                if pos + 8 > data.len() {
                    return Err("truncated JPEG frame header".into());
                }
                let height = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as u32;
                let width = u16::from_be_bytes([data[pos + 5], data[pos + 6]]) as u32;
                let components = data[pos + 7];
                if width == 0 || height == 0 {
                    return Err("JPEG has zero dimensions".into());
                }
                return Ok(JpegInfo {
                    width,
                    height,
                    components,
                });
            }
            0xD9 | 0xDA => break,
            0xD0..=0xD7 | 0x01 => continue,
            _ => {
                if pos + 2 > data.len() {
                    return Err("truncated JPEG segment".into());
                }
                let length = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
                pos += length;
            }
        }
    }

    Err("no JPEG frame header found".into())
}


fn jpeg_xobject(bytes: &[u8], set: &mut PageSet) -> Result<PlacedImage, String> {
    let info = parse_jpeg_header(bytes)?;
    let color_space = match info.components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        4 => "DeviceCMYK",
        n => return Err(format!("unsupported JPEG component count {}", n)),
    };

    let dict = image_dict(info.width, info.height, color_space, "DCTDecode");
    let id = set.push(encoded_stream(dict, bytes.to_vec()));
    Ok(PlacedImage {
        id,
        width: info.width,
        height: info.height,
    })
}

fn png_xobject(bytes: &[u8], set: &mut PageSet) -> Result<PlacedImage, String> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info().map_err(|e| e.to_string())?;
    let mut buffer = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buffer).map_err(|e| e.to_string())?;
    let data = &buffer[..frame.buffer_size()];

    let (color_space, channels, has_alpha) = match frame.color_type {
        png::ColorType::Grayscale => ("DeviceGray", 1, false),
        png::ColorType::GrayscaleAlpha => ("DeviceGray", 1, true),
        png::ColorType::Rgb => ("DeviceRGB", 3, false),
        png::ColorType::Rgba => ("DeviceRGB", 3, true),
        // Expanded to RGB by the decoder
        png::ColorType::Indexed => return Err("palette was not expanded".into()),
    };

    let (color, alpha) = if has_alpha {
        split_alpha(data, channels)
    } else {
        (data.to_vec(), Vec::new())
    };

    let mut dict = image_dict(frame.width, frame.height, color_space, "FlateDecode");
    if has_alpha {
        let mask = image_dict(frame.width, frame.height, "DeviceGray", "FlateDecode");
        let mask_id = set.push(encoded_stream(mask, deflate(&alpha)?));
        dict.set("SMask", Object::Reference(mask_id));
    }
    let id = set.push(encoded_stream(dict, deflate(&color)?));

    Ok(PlacedImage {
        id,
        width: frame.width,
        height: frame.height,
    })
}

/// Separate interleaved samples into colour and alpha planes
fn split_alpha(data: &[u8], channels: usize) -> (Vec<u8>, Vec<u8>) {
    let stride = channels + 1;
    let pixels = data.len() / stride;
    let mut color = Vec::with_capacity(pixels * channels);
    let mut alpha = Vec::with_capacity(pixels);
    for pixel in data.chunks_exact(stride) {
        color.extend_from_slice(&pixel[..channels]);
        alpha.push(pixel[channels]);
    }
    (color, alpha)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(|e| e.to_string())?;
    encoder.finish().map_err(|e| e.to_string())
}
