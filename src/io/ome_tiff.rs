//! OME-TIFF read/write for bias fields and corrected mosaics.
//!
//! Files are BigTIFF with Deflate (zlib) compression, one page per channel.
//! Axes follow `TZCYX` with `T = Z = 1`; the first page carries the OME-XML
//! document in its `ImageDescription` tag.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::compression::Deflate;
use tiff::encoder::{TiffEncoder, TiffValue, colortype};
use tiff::tags::Tag;

use crate::domain::{BiasField, CorrectedMosaic, Plane32};
use crate::error::AppError;

/// OME `Pixels@Type` of the samples in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OmePixelType {
    Float,
    Uint16,
}

impl OmePixelType {
    fn as_str(self) -> &'static str {
        match self {
            OmePixelType::Float => "float",
            OmePixelType::Uint16 => "uint16",
        }
    }
}

/// Build the OME-XML document describing a `C`-channel `width × height` stack.
pub fn ome_xml(name: &str, width: usize, height: usize, channels: usize, pixel_type: OmePixelType) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push_str(r#"<OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06">"#);
    xml.push_str(&format!(r#"<Image ID="Image:0" Name="{}">"#, escape_xml(name)));
    xml.push_str(&format!(
        r#"<Pixels ID="Pixels:0" DimensionOrder="XYCZT" Type="{}" SizeX="{width}" SizeY="{height}" SizeC="{channels}" SizeZ="1" SizeT="1">"#,
        pixel_type.as_str()
    ));
    for c in 0..channels {
        xml.push_str(&format!(r#"<Channel ID="Channel:0:{c}" SamplesPerPixel="1"/>"#));
    }
    for c in 0..channels {
        xml.push_str(&format!(
            r#"<TiffData IFD="{c}" FirstC="{c}" FirstZ="0" FirstT="0" PlaneCount="1"/>"#
        ));
    }
    xml.push_str("</Pixels></Image></OME>");
    xml
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn image_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Write a bias field as a `float` OME-TIFF.
pub fn write_bias_field(path: &Path, field: &BiasField) -> Result<(), AppError> {
    let (width, height) = (field.width(), field.height());
    let xml = ome_xml(&image_name(path), width, height, field.channel_count(), OmePixelType::Float);

    // DMatrix is column-major; its transpose's storage is the row-major page.
    let pages: Vec<Vec<f32>> = field
        .channels
        .iter()
        .map(|p| p.transpose().as_slice().to_vec())
        .collect();

    write_pages::<colortype::Gray32Float>(path, width, height, &pages, &xml)?;
    tracing::debug!(path = %path.display(), channels = pages.len(), "bias field written");
    Ok(())
}

/// Write a corrected mosaic as a `uint16` OME-TIFF.
pub fn write_corrected(path: &Path, mosaic: &CorrectedMosaic) -> Result<(), AppError> {
    let xml = ome_xml(
        &image_name(path),
        mosaic.width,
        mosaic.height,
        mosaic.channel_count(),
        OmePixelType::Uint16,
    );
    write_pages::<colortype::Gray16>(path, mosaic.width, mosaic.height, &mosaic.channels, &xml)?;
    tracing::debug!(path = %path.display(), channels = mosaic.channel_count(), "corrected mosaic written");
    Ok(())
}

fn write_pages<C>(
    path: &Path,
    width: usize,
    height: usize,
    pages: &[Vec<C::Inner>],
    xml: &str,
) -> Result<(), AppError>
where
    C: colortype::ColorType,
    [C::Inner]: TiffValue,
{
    let dims = |v: usize| {
        u32::try_from(v).map_err(|_| AppError::new(3, format!("Image dimension {v} is too large for TIFF.")))
    };
    let (w, h) = (dims(width)?, dims(height)?);
    if w == 0 || h == 0 || pages.is_empty() {
        return Err(AppError::new(3, format!("Refusing to write an empty image to '{}'.", path.display())));
    }

    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))?;
    let tiff_err = |e: tiff::TiffError| AppError::new(2, format!("Failed to write TIFF '{}': {e}", path.display()));

    let mut encoder = TiffEncoder::new_big(BufWriter::new(file)).map_err(tiff_err)?;
    for (i, page) in pages.iter().enumerate() {
        if page.len() != width * height {
            return Err(AppError::new(
                4,
                format!("Page {i} holds {} samples, expected {}.", page.len(), width * height),
            ));
        }
        let mut image = encoder
            .new_image_with_compression::<C, _>(w, h, Deflate::default())
            .map_err(tiff_err)?;
        if i == 0 {
            image
                .encoder()
                .write_tag(Tag::ImageDescription, xml)
                .map_err(tiff_err)?;
        }
        image.write_data(page).map_err(tiff_err)?;
    }
    Ok(())
}

/// Read a (Big)TIFF bias field: every page is one channel.
///
/// Accepts `f32`, `f64`, `u16` and `u8` grayscale pages of a common shape.
pub fn read_bias_field(path: &Path) -> Result<BiasField, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open flat field '{}': {e}", path.display())))?;
    let tiff_err = |e: tiff::TiffError| AppError::new(2, format!("Invalid flat field '{}': {e}", path.display()));

    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(tiff_err)?
        .with_limits(Limits::unlimited());

    let mut channels: Vec<Plane32> = Vec::new();
    loop {
        let (w, h) = decoder.dimensions().map_err(tiff_err)?;
        let (w, h) = (w as usize, h as usize);
        match decoder.colortype().map_err(tiff_err)? {
            ColorType::Gray(_) => {}
            other => {
                return Err(AppError::new(
                    2,
                    format!("Flat field page {} has unsupported color type {other:?}.", channels.len()),
                ));
            }
        }

        let samples: Vec<f32> = match decoder.read_image().map_err(tiff_err)? {
            DecodingResult::F32(v) => v,
            DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
            DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
            DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
            _ => {
                return Err(AppError::new(
                    2,
                    format!("Flat field '{}' has an unsupported sample format.", path.display()),
                ));
            }
        };
        if samples.len() != w * h {
            return Err(AppError::new(
                2,
                format!("Flat field page {} is truncated.", channels.len()),
            ));
        }
        if let Some(first) = channels.first() {
            if first.shape() != (h, w) {
                return Err(AppError::new(
                    2,
                    format!(
                        "Flat field pages differ in size ({}x{} vs {w}x{h}).",
                        first.ncols(),
                        first.nrows()
                    ),
                ));
            }
        }
        channels.push(Plane32::from_row_slice(h, w, &samples));

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(tiff_err)?;
    }

    tracing::debug!(path = %path.display(), channels = channels.len(), "bias field loaded");
    Ok(BiasField { channels })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_lists_every_channel() {
        let xml = ome_xml("a&b.ome.tiff", 8, 4, 2, OmePixelType::Uint16);
        assert!(xml.contains(r#"Name="a&amp;b.ome.tiff""#));
        assert!(xml.contains(r#"Type="uint16" SizeX="8" SizeY="4" SizeC="2" SizeZ="1" SizeT="1""#));
        assert!(xml.contains(r#"<TiffData IFD="1" FirstC="1""#));
        assert_eq!(xml.matches("<Channel ").count(), 2);
    }

    #[test]
    fn bias_field_survives_a_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flatfield.ome.tiff");
        let field = BiasField {
            channels: vec![
                Plane32::from_fn(3, 5, |r, c| (r * 5 + c) as f32 * 0.01),
                Plane32::from_element(3, 5, 0.5),
            ],
        };

        write_bias_field(&path, &field).unwrap();
        let back = read_bias_field(&path).unwrap();

        assert_eq!(back.channel_count(), 2);
        assert_eq!((back.width(), back.height()), (5, 3));
        assert_eq!(back.channels, field.channels);
    }

    #[test]
    fn corrected_mosaic_is_uint16_with_ome_description() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan_flatfield_corrected.ome.tiff");
        let mosaic = CorrectedMosaic {
            width: 3,
            height: 2,
            channels: vec![vec![0, 1, 2, 3, 4, 65535]],
        };
        write_corrected(&path, &mosaic).unwrap();

        let mut decoder = Decoder::new(BufReader::new(File::open(&path).unwrap())).unwrap();
        let description = decoder.get_tag_ascii_string(Tag::ImageDescription).unwrap();
        assert!(description.contains(r#"Type="uint16""#));
        match decoder.read_image().unwrap() {
            DecodingResult::U16(v) => assert_eq!(v, vec![0, 1, 2, 3, 4, 65535]),
            _ => panic!("expected u16 samples"),
        }
        assert!(!decoder.more_images());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = read_bias_field(Path::new("/definitely/not/here.ome.tiff")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
