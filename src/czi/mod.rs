//! Minimal reader for Zeiss CZI (ZISRAW) mosaic scans.
//!
//! Only what the flat-field recipes need is supported:
//!
//! - file header + subblock directory
//! - mosaic detection (`M` dimension) and channel count (`C` dimension)
//! - layer-0 tiles with their bounding boxes
//! - uncompressed `Gray8` / `Gray16` / `Gray32Float` pixel payloads
//!
//! Anything else (JPEG-XR/zstd compression, RGB pixel types, pyramids) is
//! reported as an error rather than guessed at.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::domain::{Plane, TileBox};
use crate::error::AppError;

pub mod segment;
pub mod writer;

pub use segment::{Compression, DimensionEntry, DirectoryEntry, PixelType};
pub use writer::{CziWriter, TilePlacement};

use segment::{
    ByteReader, FileHeader, SegmentHeader, DIRECTORY_RESERVED_LEN, DIRECTORY_SEGMENT_ID, ENTRY_FIXED_LEN,
    DIMENSION_ENTRY_LEN, FILE_SEGMENT_ID, SEGMENT_HEADER_LEN, SUBBLOCK_SEGMENT_ID, SUBBLOCK_SIZES_LEN,
};

/// A layer-0 subblock: one tile of one channel.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Index into the subblock directory.
    pub entry_index: usize,
    /// Channel index relative to the smallest `C` start in the file.
    pub channel: usize,
    /// Mosaic tile index (`M`), if present.
    pub mosaic_index: Option<i32>,
    pub bbox: TileBox,
    pub pixel_type: PixelType,
}

/// An opened CZI file.
pub struct CziFile<R = BufReader<File>> {
    name: PathBuf,
    reader: R,
    entries: Vec<DirectoryEntry>,
}

impl CziFile<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::new(2, format!("Failed to open CZI file '{}': {e}", path.display())))?;
        Self::from_reader(path, BufReader::new(file))
    }
}

impl<R: Read + Seek> CziFile<R> {
    /// Parse the file header and subblock directory from any seekable source.
    pub fn from_reader(name: impl Into<PathBuf>, mut reader: R) -> Result<Self, AppError> {
        let name = name.into();
        let label = name.display().to_string();

        let file_segment = read_segment_header(&mut reader, 0, &label)?;
        if file_segment.id != FILE_SEGMENT_ID {
            return Err(AppError::new(2, format!("Not a CZI file (bad magic): {label}")));
        }
        let payload = read_exact_vec(&mut reader, file_segment.payload_len(), &label)?;
        let header = FileHeader::parse(&payload)?;

        if header.directory_position <= 0 {
            return Err(AppError::new(2, format!("CZI file has no subblock directory: {label}")));
        }

        let dir_segment = read_segment_header(&mut reader, header.directory_position as u64, &label)?;
        dir_segment.expect_id(DIRECTORY_SEGMENT_ID)?;
        let payload = read_exact_vec(&mut reader, dir_segment.payload_len(), &label)?;

        let mut r = ByteReader::new(&payload);
        let count = r.i32()?;
        if count < 0 {
            return Err(AppError::new(2, format!("Corrupt CZI directory ({count} entries): {label}")));
        }
        r.skip(DIRECTORY_RESERVED_LEN)?;
        let entries = (0..count)
            .map(|_| DirectoryEntry::parse(&mut r))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            file = %label,
            major = header.major,
            minor = header.minor,
            subblocks = entries.len(),
            "opened CZI"
        );

        Ok(Self { name, reader, entries })
    }

    pub fn name(&self) -> &Path {
        &self.name
    }

    /// A scan is a mosaic when its subblocks carry a mosaic (`M`) index.
    pub fn is_mosaic(&self) -> bool {
        self.entries.iter().any(|e| e.dim(b'M').is_some())
    }

    /// Number of channels: the extent of the `C` dimension, 1 when absent.
    pub fn channel_count(&self) -> usize {
        match self.channel_range() {
            Some((lo, hi)) => (hi - lo + 1) as usize,
            None => 1,
        }
    }

    fn channel_range(&self) -> Option<(i32, i32)> {
        self.entries
            .iter()
            .filter_map(|e| e.dim(b'C'))
            .fold(None, |acc, d| {
                let lo = d.start;
                let hi = d.start + d.size.max(1) - 1;
                Some(match acc {
                    None => (lo, hi),
                    Some((a, b)) => (a.min(lo), b.max(hi)),
                })
            })
    }

    /// Layer-0 tiles in directory order.
    pub fn tiles(&self) -> Result<Vec<Tile>, AppError> {
        let c0 = self.channel_range().map(|(lo, _)| lo).unwrap_or(0);
        let mut out = Vec::new();
        for (entry_index, entry) in self.entries.iter().enumerate() {
            if !entry.is_layer0() {
                continue;
            }
            let channel = entry.index_of(b'C').map(|c| (c - c0) as usize).unwrap_or(0);
            out.push(Tile {
                entry_index,
                channel,
                mosaic_index: entry.index_of(b'M'),
                bbox: entry.bounding_box()?,
                pixel_type: entry.pixel_type,
            });
        }
        Ok(out)
    }

    /// Read a tile's pixels as an `h × w` plane.
    pub fn read_tile(&mut self, tile: &Tile) -> Result<Plane, AppError> {
        let label = self.name.display().to_string();
        let entry = self.entries.get(tile.entry_index).ok_or_else(|| {
            AppError::new(4, format!("Tile {} is not in the directory of {label}.", tile.entry_index))
        })?;

        let bpp = entry.pixel_type.bytes_per_pixel().ok_or_else(|| {
            AppError::new(
                2,
                format!("Unsupported CZI pixel type {} in {label}.", entry.pixel_type.raw()),
            )
        })?;
        if entry.compression != Compression::Uncompressed {
            return Err(AppError::new(
                2,
                format!("Unsupported CZI compression {} in {label}.", entry.compression.raw()),
            ));
        }

        let position = u64::try_from(entry.file_position).map_err(|_| {
            AppError::new(2, format!("Corrupt CZI subblock position {} in {label}.", entry.file_position))
        })?;
        let pixel_type = entry.pixel_type;
        let TileBox { w, h, .. } = tile.bbox;

        let segment = read_segment_header(&mut self.reader, position, &label)?;
        segment.expect_id(SUBBLOCK_SEGMENT_ID)?;

        let sizes = read_exact_vec(&mut self.reader, SUBBLOCK_SIZES_LEN, &label)?;
        let mut r = ByteReader::new(&sizes);
        let metadata_size = r.i32()?;
        let _attachment_size = r.i32()?;
        let data_size = r.i64()?;
        if metadata_size < 0 || data_size < 0 {
            return Err(AppError::new(2, format!("Corrupt CZI subblock sizes in {label}.")));
        }

        // The subblock repeats its directory entry; its dimension count fixes the header length.
        let fixed = read_exact_vec(&mut self.reader, ENTRY_FIXED_LEN, &label)?;
        let dim_count = i32::from_le_bytes([fixed[28], fixed[29], fixed[30], fixed[31]]).max(0) as usize;
        let entry_len = ENTRY_FIXED_LEN + DIMENSION_ENTRY_LEN * dim_count;
        let header_len = segment::subblock_header_len(entry_len);

        let data_offset = position
            .checked_add((SEGMENT_HEADER_LEN + header_len) as u64 + metadata_size as u64)
            .ok_or_else(|| AppError::new(2, format!("Corrupt CZI subblock offset in {label}.")))?;

        let expected = w
            .checked_mul(h)
            .and_then(|n| n.checked_mul(bpp))
            .ok_or_else(|| AppError::new(2, format!("CZI tile {w}x{h} is too large in {label}.")))?;
        if (data_size as usize) < expected {
            return Err(AppError::new(
                2,
                format!(
                    "CZI subblock holds {data_size} byte(s), expected {expected} for a {w}x{h} tile in {label}."
                ),
            ));
        }

        self.reader
            .seek(SeekFrom::Start(data_offset))
            .map_err(|e| AppError::new(2, format!("Failed to seek in '{label}': {e}")))?;
        let data = read_exact_vec(&mut self.reader, expected, &label)?;

        Ok(decode_samples(&data, pixel_type, w, h))
    }
}

fn decode_samples(data: &[u8], pixel_type: PixelType, w: usize, h: usize) -> Plane {
    match pixel_type {
        PixelType::Gray8 => Plane::from_row_iterator(h, w, data.iter().map(|&v| v as f64)),
        PixelType::Gray16 => Plane::from_row_iterator(
            h,
            w,
            data.chunks_exact(2).map(|b| u16::from_le_bytes([b[0], b[1]]) as f64),
        ),
        PixelType::Gray32Float => Plane::from_row_iterator(
            h,
            w,
            data.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64),
        ),
        PixelType::Other(_) => Plane::zeros(h, w),
    }
}

fn read_segment_header<R: Read + Seek>(
    reader: &mut R,
    position: u64,
    label: &str,
) -> Result<SegmentHeader, AppError> {
    reader
        .seek(SeekFrom::Start(position))
        .map_err(|e| AppError::new(2, format!("Failed to seek in '{label}': {e}")))?;
    let bytes = read_exact_vec(reader, SEGMENT_HEADER_LEN, label)?;
    SegmentHeader::parse(&bytes)
}

/// Read exactly `len` bytes; sizes come from the file, so the buffer only grows with data actually present.
fn read_exact_vec<R: Read>(reader: &mut R, len: usize, label: &str) -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::new();
    reader
        .by_ref()
        .take(len as u64)
        .read_to_end(&mut buf)
        .map_err(|e| AppError::new(2, format!("Failed to read CZI file '{label}': {e}")))?;
    if buf.len() != len {
        return Err(AppError::new(
            2,
            format!("Truncated CZI file '{label}': need {len} byte(s), found {}.", buf.len()),
        ));
    }
    Ok(buf)
}
