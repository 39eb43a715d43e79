//! Shared types for capture operations.

use super::error::CaptureError;
use super::pool::{BufferPool, PooledBuffer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which output to capture: display `display_index` on graphics adapter
/// `adapter_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DisplaySelector {
    pub display_index: u32,
    pub adapter_index: u32,
}

impl DisplaySelector {
    pub fn new(display_index: u32, adapter_index: u32) -> Self {
        Self {
            display_index,
            adapter_index,
        }
    }
}

impl std::fmt::Display for DisplaySelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "display {} on adapter {}", self.display_index, self.adapter_index)
    }
}

/// 32-bit pixel layouts a source may hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Blue, green, red, alpha
    #[default]
    Bgra8,
    /// Blue, green, red, unused
    Bgrx8,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        4
    }
}

/// A frame mapped by a capture session, valid until the session releases it.
///
/// Rows start every `row_pitch` bytes; the pitch may exceed
/// `width * bytes_per_pixel` when the source pads its rows.
#[derive(Debug, Clone, Copy)]
pub struct MappedFrame<'a> {
    pub width: u32,
    pub height: u32,
    pub row_pitch: usize,
    pub format: PixelFormat,
    pub data: &'a [u8],
}

/// Outcome of a single acquire attempt.
#[derive(Debug)]
pub enum Acquired<'a> {
    /// A new frame is mapped and must be released after copying
    Ready(MappedFrame<'a>),
    /// Nothing new arrived within the timeout
    TimedOut,
}

/// An owned, tightly packed copy of a captured frame.
///
/// Dropping the frame disposes its pixel buffer.
#[derive(Debug)]
pub struct Frame {
    number: u64,
    width: u32,
    height: u32,
    format: PixelFormat,
    captured_at: DateTime<Utc>,
    buffer: PooledBuffer,
}

impl Frame {
    /// Copy a mapped frame row by row into a buffer taken from `pool`.
    pub fn copy_from(
        mapped: &MappedFrame<'_>,
        number: u64,
        pool: &Arc<BufferPool>,
    ) -> Result<Self, CaptureError> {
        let row_bytes = validate_layout(mapped)?;
        let mut buffer = pool.take(row_bytes * mapped.height as usize);

        for (dst, src) in buffer
            .chunks_exact_mut(row_bytes)
            .zip(mapped.data.chunks(mapped.row_pitch))
        {
            dst.copy_from_slice(&src[..row_bytes]);
        }

        Ok(Self {
            number,
            width: mapped.width,
            height: mapped.height,
            format: mapped.format,
            captured_at: Utc::now(),
            buffer,
        })
    }

    /// Build a frame from tightly packed pixels that belong to no pool.
    pub fn from_pixels(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, CaptureError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(format.bytes_per_pixel()));
        if width == 0 || height == 0 || expected != Some(data.len()) {
            return Err(CaptureError::InvalidFrame(format!(
                "{}x{} frame does not match {} bytes of pixels",
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            number: 1,
            width,
            height,
            format,
            captured_at: Utc::now(),
            buffer: PooledBuffer::detached(data),
        })
    }

    /// 1-based position of this frame within its capture session.
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Bytes per row; frames are always tightly packed.
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// All pixel bytes, row after row.
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    /// Pixel bytes of row `y`, or `None` past the last row.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let stride = self.stride();
        let start = y as usize * stride;
        self.buffer.get(start..start + stride)
    }

    /// Copy the pixels out, e.g. to keep them beyond the frame's lifetime.
    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }
}

/// Check that `mapped` describes a readable buffer; returns the packed row size.
fn validate_layout(mapped: &MappedFrame<'_>) -> Result<usize, CaptureError> {
    if mapped.width == 0 || mapped.height == 0 {
        return Err(CaptureError::InvalidFrame(format!(
            "empty frame {}x{}",
            mapped.width, mapped.height
        )));
    }

    let row_bytes = mapped.width as usize * mapped.format.bytes_per_pixel();
    if mapped.row_pitch < row_bytes {
        return Err(CaptureError::InvalidFrame(format!(
            "row pitch {} is smaller than a {} byte row",
            mapped.row_pitch, row_bytes
        )));
    }

    let required = mapped
        .row_pitch
        .checked_mul(mapped.height as usize - 1)
        .and_then(|rows| rows.checked_add(row_bytes))
        .ok_or_else(|| {
            CaptureError::InvalidFrame(format!(
                "row pitch {} overflows a {} row frame",
                mapped.row_pitch, mapped.height
            ))
        })?;
    if mapped.data.len() < required {
        return Err(CaptureError::InvalidFrame(format!(
            "{}x{} frame with pitch {} needs {} bytes, got {}",
            mapped.width,
            mapped.height,
            mapped.row_pitch,
            required,
            mapped.data.len()
        )));
    }

    Ok(row_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded_source(width: u32, height: u32, pitch: usize) -> Vec<u8> {
        let mut data = vec![0xEE; pitch * height as usize];
        for y in 0..height as usize {
            for x in 0..width as usize * 4 {
                data[y * pitch + x] = (y * 16 + x) as u8;
            }
        }
        data
    }

    #[test]
    fn test_copy_strips_row_padding() {
        let pool = BufferPool::new(1);
        let data = padded_source(2, 3, 12);
        let mapped = MappedFrame {
            width: 2,
            height: 3,
            row_pitch: 12,
            format: PixelFormat::Bgra8,
            data: &data,
        };

        let frame = Frame::copy_from(&mapped, 7, &pool).unwrap();
        assert_eq!(frame.number(), 7);
        assert_eq!(frame.stride(), 8);
        assert_eq!(frame.data().len(), 24);
        assert_eq!(frame.row(1).unwrap(), &[16, 17, 18, 19, 20, 21, 22, 23]);
        assert!(frame.row(3).is_none());
        assert!(!frame.data().contains(&0xEE));
    }

    #[test]
    fn test_copy_accepts_short_last_row() {
        let pool = BufferPool::new(1);
        // Last row carries no padding.
        let mut data = padded_source(1, 2, 8);
        data.truncate(8 + 4);
        let mapped = MappedFrame {
            width: 1,
            height: 2,
            row_pitch: 8,
            format: PixelFormat::Bgrx8,
            data: &data,
        };

        let frame = Frame::copy_from(&mapped, 1, &pool).unwrap();
        assert_eq!(frame.row(1).unwrap(), &[16, 17, 18, 19]);
        assert_eq!(frame.format(), PixelFormat::Bgrx8);
    }

    #[test]
    fn test_copy_rejects_small_pitch() {
        let pool = BufferPool::new(1);
        let data = vec![0; 64];
        let mapped = MappedFrame {
            width: 4,
            height: 2,
            row_pitch: 8,
            format: PixelFormat::Bgra8,
            data: &data,
        };

        assert!(matches!(
            Frame::copy_from(&mapped, 1, &pool),
            Err(CaptureError::InvalidFrame(_))
        ));
        assert_eq!(pool.issued(), 0);
    }

    #[test]
    fn test_copy_rejects_truncated_buffer() {
        let pool = BufferPool::new(1);
        let data = vec![0; 20];
        let mapped = MappedFrame {
            width: 2,
            height: 3,
            row_pitch: 8,
            format: PixelFormat::Bgra8,
            data: &data,
        };

        assert!(matches!(
            Frame::copy_from(&mapped, 1, &pool),
            Err(CaptureError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_copy_rejects_overflowing_pitch() {
        let pool = BufferPool::new(1);
        let data = vec![0; 64];
        let mapped = MappedFrame {
            width: 2,
            height: 3,
            row_pitch: usize::MAX / 2 + 1,
            format: PixelFormat::Bgra8,
            data: &data,
        };

        match Frame::copy_from(&mapped, 1, &pool) {
            Err(CaptureError::InvalidFrame(message)) => assert!(message.contains("overflows")),
            other => panic!("unexpected result: {:?}", other.map(|f| f.number())),
        }
        assert_eq!(pool.issued(), 0);
    }

    #[test]
    fn test_frame_drop_disposes_buffer() {
        let pool = BufferPool::new(1);
        let data = padded_source(2, 2, 8);
        let mapped = MappedFrame {
            width: 2,
            height: 2,
            row_pitch: 8,
            format: PixelFormat::Bgra8,
            data: &data,
        };

        let frame = Frame::copy_from(&mapped, 1, &pool).unwrap();
        assert_eq!(pool.outstanding(), 1);
        drop(frame);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_from_pixels_checks_length() {
        assert!(Frame::from_pixels(2, 2, PixelFormat::Bgra8, vec![0; 16]).is_ok());
        assert!(Frame::from_pixels(2, 2, PixelFormat::Bgra8, vec![0; 15]).is_err());
        assert!(Frame::from_pixels(0, 2, PixelFormat::Bgra8, Vec::new()).is_err());
    }

    #[test]
    fn test_selector_display() {
        assert_eq!(DisplaySelector::new(1, 0).to_string(), "display 1 on adapter 0");
    }
}
