//! Minimal CZI writer: file header, uncompressed subblocks, directory.
//!
//! Used to produce synthetic mosaic corpora; the output is read back by
//! [`CziFile`](super::CziFile).

use std::io::{Seek, SeekFrom, Write};

use crate::domain::{Plane, TileBox};
use crate::error::AppError;

use super::segment::{
    align_up, subblock_header_len, DimensionEntry, DirectoryEntry, FileHeader, SegmentHeader, Compression,
    PixelType, DIRECTORY_RESERVED_LEN, DIRECTORY_SEGMENT_ID, FILE_HEADER_ALLOCATED, FILE_SEGMENT_ID,
    SEGMENT_ALIGNMENT, SEGMENT_HEADER_LEN, SUBBLOCK_SEGMENT_ID,
};

/// Where a tile goes and which channel/mosaic/scene it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct TilePlacement {
    pub bbox: TileBox,
    pub channel: i32,
    /// `Some` marks the file as a mosaic scan.
    pub mosaic_index: Option<i32>,
    pub scene: Option<i32>,
}

pub struct CziWriter<W: Write + Seek> {
    inner: W,
    position: u64,
    entries: Vec<DirectoryEntry>,
}

impl<W: Write + Seek> CziWriter<W> {
    /// Start a new file; the header is rewritten with the directory position on `finish`.
    pub fn new(inner: W) -> Result<Self, AppError> {
        let mut writer = Self {
            inner,
            position: 0,
            entries: Vec::new(),
        };
        let header = placeholder_header(0);
        writer.write_segment(FILE_SEGMENT_ID, &header, FILE_HEADER_ALLOCATED)?;
        Ok(writer)
    }

    /// Append one uncompressed subblock holding `plane` (row-major on disk).
    pub fn write_tile(
        &mut self,
        placement: &TilePlacement,
        pixel_type: PixelType,
        plane: &Plane,
    ) -> Result<(), AppError> {
        let TileBox { x, y, w, h } = placement.bbox;
        if plane.shape() != (h, w) {
            return Err(AppError::new(
                4,
                format!("Tile plane is {:?}, placement expects {h}x{w}.", plane.shape()),
            ));
        }
        let data = encode_samples(plane, pixel_type)?;

        let mut dimensions = vec![
            DimensionEntry::new(b'X', x as i32, w as i32),
            DimensionEntry::new(b'Y', y as i32, h as i32),
            DimensionEntry::new(b'C', placement.channel, 1),
            DimensionEntry::new(b'Z', 0, 1),
            DimensionEntry::new(b'T', 0, 1),
        ];
        if let Some(s) = placement.scene {
            dimensions.push(DimensionEntry::new(b'S', s, 1));
        }
        if let Some(m) = placement.mosaic_index {
            dimensions.push(DimensionEntry::new(b'M', m, 1));
        }

        let entry = DirectoryEntry {
            pixel_type,
            file_position: self.position as i64,
            file_part: 0,
            compression: Compression::Uncompressed,
            pyramid_type: 0,
            dimensions,
        };

        let header_len = subblock_header_len(entry.encoded_len());
        let mut payload = Vec::with_capacity(header_len + data.len());
        payload.extend_from_slice(&0i32.to_le_bytes());
        payload.extend_from_slice(&0i32.to_le_bytes());
        payload.extend_from_slice(&(data.len() as i64).to_le_bytes());
        entry.encode(&mut payload);
        payload.resize(header_len, 0);
        payload.extend_from_slice(&data);

        let used = payload.len();
        self.write_segment(SUBBLOCK_SEGMENT_ID, &payload, used)?;
        self.entries.push(entry);
        Ok(())
    }

    /// Write the subblock directory, patch the file header, and return the sink.
    pub fn finish(mut self) -> Result<W, AppError> {
        let directory_position = self.position;

        let mut payload = Vec::new();
        payload.extend_from_slice(&(self.entries.len() as i32).to_le_bytes());
        payload.resize(4 + DIRECTORY_RESERVED_LEN, 0);
        for entry in &self.entries {
            entry.encode(&mut payload);
        }
        let used = payload.len();
        self.write_segment(DIRECTORY_SEGMENT_ID, &payload, used)?;

        let header = placeholder_header(directory_position as i64);
        self.inner
            .seek(SeekFrom::Start(SEGMENT_HEADER_LEN as u64))
            .map_err(|e| AppError::new(2, format!("Failed to seek CZI output: {e}")))?;
        self.inner
            .write_all(&header)
            .map_err(|e| AppError::new(2, format!("Failed to write CZI header: {e}")))?;
        self.inner
            .flush()
            .map_err(|e| AppError::new(2, format!("Failed to flush CZI output: {e}")))?;

        Ok(self.inner)
    }

    fn write_segment(&mut self, id: &str, payload: &[u8], used: usize) -> Result<(), AppError> {
        let mut header = SegmentHeader::new(id, used);
        let allocated = align_up(payload.len() as u64, SEGMENT_ALIGNMENT);
        header.allocated_size = allocated as i64;

        let padding = vec![0u8; allocated as usize - payload.len()];
        for part in [&header.encode()[..], payload, &padding[..]] {
            self.inner
                .write_all(part)
                .map_err(|e| AppError::new(2, format!("Failed to write CZI segment '{id}': {e}")))?;
        }

        self.position += SEGMENT_HEADER_LEN as u64 + allocated;
        Ok(())
    }
}

fn placeholder_header(directory_position: i64) -> Vec<u8> {
    FileHeader {
        major: 1,
        minor: 0,
        file_part: 0,
        directory_position,
        metadata_position: 0,
        attachment_directory_position: 0,
    }
    .encode()
}

fn encode_samples(plane: &Plane, pixel_type: PixelType) -> Result<Vec<u8>, AppError> {
    let (h, w) = plane.shape();
    let row_major = (0..h).flat_map(|r| (0..w).map(move |c| plane[(r, c)]));
    let out = match pixel_type {
        PixelType::Gray8 => row_major.map(|v| v.round().clamp(0.0, u8::MAX as f64) as u8).collect(),
        PixelType::Gray16 => row_major
            .flat_map(|v| (v.round().clamp(0.0, u16::MAX as f64) as u16).to_le_bytes())
            .collect(),
        PixelType::Gray32Float => row_major.flat_map(|v| (v as f32).to_le_bytes()).collect(),
        PixelType::Other(raw) => {
            return Err(AppError::new(4, format!("Cannot write CZI pixel type {raw}.")));
        }
    };
    Ok(out)
}
