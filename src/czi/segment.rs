//! ZISRAW segment layouts.
//!
//! All integers are little endian. Every segment is a 32-byte header
//! (16-byte id, allocated size, used size) followed by its payload.

use crate::domain::TileBox;
use crate::error::AppError;

pub const SEGMENT_HEADER_LEN: usize = 32;
pub const SEGMENT_ALIGNMENT: u64 = 32;

pub const FILE_SEGMENT_ID: &str = "ZISRAWFILE";
pub const DIRECTORY_SEGMENT_ID: &str = "ZISRAWDIRECTORY";
pub const SUBBLOCK_SEGMENT_ID: &str = "ZISRAWSUBBLOCK";

/// Allocated payload size of the file header segment.
pub const FILE_HEADER_ALLOCATED: usize = 512;
pub const DIRECTORY_RESERVED_LEN: usize = 124;
pub const ENTRY_FIXED_LEN: usize = 32;
pub const DIMENSION_ENTRY_LEN: usize = 20;
/// Subblock header (sizes + directory entry + fill) is at least this long.
pub const SUBBLOCK_MIN_HEADER_LEN: usize = 256;
pub const SUBBLOCK_SIZES_LEN: usize = 16;

/// Sample layout of a subblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    Gray8,
    Gray16,
    Gray32Float,
    Other(i32),
}

impl PixelType {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => PixelType::Gray8,
            1 => PixelType::Gray16,
            2 => PixelType::Gray32Float,
            other => PixelType::Other(other),
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            PixelType::Gray8 => 0,
            PixelType::Gray16 => 1,
            PixelType::Gray32Float => 2,
            PixelType::Other(raw) => raw,
        }
    }

    /// Bytes per sample for the supported single-channel layouts.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            PixelType::Gray8 => Some(1),
            PixelType::Gray16 => Some(2),
            PixelType::Gray32Float => Some(4),
            PixelType::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Uncompressed,
    Other(i32),
}

impl Compression {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Compression::Uncompressed,
            other => Compression::Other(other),
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            Compression::Uncompressed => 0,
            Compression::Other(raw) => raw,
        }
    }
}

/// Little-endian cursor over an in-memory payload.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], AppError> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.buf.len()).ok_or_else(|| {
            AppError::new(
                2,
                format!(
                    "Truncated CZI data: need {n} byte(s) at offset {}, have {}.",
                    self.pos,
                    self.buf.len().saturating_sub(self.pos)
                ),
            )
        })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), AppError> {
        self.take(n).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8, AppError> {
        Ok(self.take(1)?[0])
    }

    pub fn i32(&mut self) -> Result<i32, AppError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i64(&mut self) -> Result<i64, AppError> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(i64::from_le_bytes(raw))
    }

    pub fn f32(&mut self) -> Result<f32, AppError> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Segment header: id + allocated/used payload sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
    pub id: String,
    pub allocated_size: i64,
    pub used_size: i64,
}

impl SegmentHeader {
    pub fn new(id: &str, used_size: usize) -> Self {
        let allocated = align_up(used_size as u64, SEGMENT_ALIGNMENT) as i64;
        Self {
            id: id.to_string(),
            allocated_size: allocated,
            used_size: used_size as i64,
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, AppError> {
        let mut r = ByteReader::new(bytes);
        let raw_id = r.take(16)?;
        let id_len = raw_id.iter().position(|&b| b == 0).unwrap_or(raw_id.len());
        let id = String::from_utf8_lossy(&raw_id[..id_len]).into_owned();
        let allocated_size = r.i64()?;
        let used_size = r.i64()?;
        if allocated_size < 0 || used_size < 0 {
            return Err(AppError::new(2, format!("Corrupt CZI segment '{id}': negative size.")));
        }
        Ok(Self {
            id,
            allocated_size,
            used_size,
        })
    }

    pub fn encode(&self) -> [u8; SEGMENT_HEADER_LEN] {
        let mut out = [0u8; SEGMENT_HEADER_LEN];
        let id = self.id.as_bytes();
        let n = id.len().min(16);
        out[..n].copy_from_slice(&id[..n]);
        out[16..24].copy_from_slice(&self.allocated_size.to_le_bytes());
        out[24..32].copy_from_slice(&self.used_size.to_le_bytes());
        out
    }

    /// Number of meaningful payload bytes (`used`, falling back to `allocated`).
    pub fn payload_len(&self) -> usize {
        if self.used_size > 0 {
            self.used_size as usize
        } else {
            self.allocated_size as usize
        }
    }

    pub fn expect_id(&self, id: &str) -> Result<(), AppError> {
        if self.id != id {
            return Err(AppError::new(
                2,
                format!("Expected CZI segment '{id}', found '{}'.", self.id),
            ));
        }
        Ok(())
    }
}

/// The part of the `ZISRAWFILE` payload this reader uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub major: i32,
    pub minor: i32,
    pub file_part: i32,
    pub directory_position: i64,
    pub metadata_position: i64,
    pub attachment_directory_position: i64,
}

impl FileHeader {
    pub fn parse(payload: &[u8]) -> Result<Self, AppError> {
        let mut r = ByteReader::new(payload);
        let major = r.i32()?;
        let minor = r.i32()?;
        r.skip(8)?;
        // Primary file GUID and file GUID.
        r.skip(32)?;
        let file_part = r.i32()?;
        let directory_position = r.i64()?;
        let metadata_position = r.i64()?;
        let _update_pending = r.i32()?;
        let attachment_directory_position = r.i64()?;
        Ok(Self {
            major,
            minor,
            file_part,
            directory_position,
            metadata_position,
            attachment_directory_position,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FILE_HEADER_ALLOCATED);
        out.extend_from_slice(&self.major.to_le_bytes());
        out.extend_from_slice(&self.minor.to_le_bytes());
        out.extend_from_slice(&[0u8; 8]);
        out.extend_from_slice(&[0u8; 32]);
        out.extend_from_slice(&self.file_part.to_le_bytes());
        out.extend_from_slice(&self.directory_position.to_le_bytes());
        out.extend_from_slice(&self.metadata_position.to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(&self.attachment_directory_position.to_le_bytes());
        out.resize(FILE_HEADER_ALLOCATED, 0);
        out
    }
}

/// One dimension of a directory entry (`X`, `Y`, `C`, `M`, `S`, `Z`, `T`, ...).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimensionEntry {
    pub dimension: u8,
    pub start: i32,
    pub size: i32,
    pub start_coordinate: f32,
    pub stored_size: i32,
}

impl DimensionEntry {
    pub fn new(dimension: u8, start: i32, size: i32) -> Self {
        Self {
            dimension,
            start,
            size,
            start_coordinate: start as f32,
            stored_size: size,
        }
    }

    fn parse(r: &mut ByteReader<'_>) -> Result<Self, AppError> {
        let name = r.take(4)?;
        Ok(Self {
            dimension: name[0].to_ascii_uppercase(),
            start: r.i32()?,
            size: r.i32()?,
            start_coordinate: r.f32()?,
            stored_size: r.i32()?,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[self.dimension, 0, 0, 0]);
        out.extend_from_slice(&self.start.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.start_coordinate.to_le_bytes());
        out.extend_from_slice(&self.stored_size.to_le_bytes());
    }
}

/// A `DV` subblock directory entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    pub pixel_type: PixelType,
    pub file_position: i64,
    pub file_part: i32,
    pub compression: Compression,
    pub pyramid_type: u8,
    pub dimensions: Vec<DimensionEntry>,
}

impl DirectoryEntry {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<Self, AppError> {
        let schema = r.take(2)?;
        if schema != b"DV" {
            return Err(AppError::new(
                2,
                format!(
                    "Unsupported CZI directory entry schema '{}'.",
                    String::from_utf8_lossy(schema)
                ),
            ));
        }
        let pixel_type = PixelType::from_raw(r.i32()?);
        let file_position = r.i64()?;
        let file_part = r.i32()?;
        let compression = Compression::from_raw(r.i32()?);
        let pyramid_type = r.u8()?;
        r.skip(5)?;
        let count = r.i32()?;
        if !(0..=64).contains(&count) {
            return Err(AppError::new(
                2,
                format!("Corrupt CZI directory entry: {count} dimensions."),
            ));
        }
        let dimensions = (0..count)
            .map(|_| DimensionEntry::parse(r))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            pixel_type,
            file_position,
            file_part,
            compression,
            pyramid_type,
            dimensions,
        })
    }

    pub fn encoded_len(&self) -> usize {
        ENTRY_FIXED_LEN + DIMENSION_ENTRY_LEN * self.dimensions.len()
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(b"DV");
        out.extend_from_slice(&self.pixel_type.raw().to_le_bytes());
        out.extend_from_slice(&self.file_position.to_le_bytes());
        out.extend_from_slice(&self.file_part.to_le_bytes());
        out.extend_from_slice(&self.compression.raw().to_le_bytes());
        out.push(self.pyramid_type);
        out.extend_from_slice(&[0u8; 5]);
        out.extend_from_slice(&(self.dimensions.len() as i32).to_le_bytes());
        for dim in &self.dimensions {
            dim.encode(out);
        }
    }

    pub fn dim(&self, dimension: u8) -> Option<&DimensionEntry> {
        self.dimensions.iter().find(|d| d.dimension == dimension)
    }

    /// Start index along `dimension`, if the entry has it.
    pub fn index_of(&self, dimension: u8) -> Option<i32> {
        self.dim(dimension).map(|d| d.start)
    }

    /// Full-resolution tiles only (no pyramid levels, no subsampled storage).
    pub fn is_layer0(&self) -> bool {
        if self.pyramid_type != 0 {
            return false;
        }
        match (self.dim(b'X'), self.dim(b'Y')) {
            (Some(x), Some(y)) => x.size == x.stored_size && y.size == y.stored_size,
            _ => false,
        }
    }

    pub fn bounding_box(&self) -> Result<TileBox, AppError> {
        let (x, y) = match (self.dim(b'X'), self.dim(b'Y')) {
            (Some(x), Some(y)) => (x, y),
            _ => {
                return Err(AppError::new(2, "CZI subblock has no X/Y dimension."));
            }
        };
        if x.stored_size <= 0 || y.stored_size <= 0 {
            return Err(AppError::new(
                2,
                format!("CZI subblock has empty extent {}x{}.", x.stored_size, y.stored_size),
            ));
        }
        Ok(TileBox {
            x: x.start as i64,
            y: y.start as i64,
            w: x.stored_size as usize,
            h: y.stored_size as usize,
        })
    }
}

pub fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// Length of the subblock header (sizes + entry + fill) for a given entry.
pub fn subblock_header_len(entry_len: usize) -> usize {
    (SUBBLOCK_SIZES_LEN + entry_len).max(SUBBLOCK_MIN_HEADER_LEN)
}
