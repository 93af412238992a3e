//! Little-endian reader/writer for the LUMA diagnostic file format (§6.5).
//!
//! Layout: `i16 width, i16 height, i32 user_header_size`, then
//! `user_header_size` bytes of caller-supplied header (or, when the caller
//! supplies none, this module's own `i32 temporal_offset_x, i32
//! temporal_offset_y, f64 angle_degrees`), then `width*height` luma bytes.
//!
//! Modeled on `zune_core::bytestream`'s reader/writer split: a thin cursor
//! over a byte slice (or `Vec` for the writer) with typed little-endian
//! reads, used only by the CLI and by tests that need deterministic
//! fixtures. The core pipeline itself never touches files (per the
//! specification's Non-goals), only the `ImageBuffer<u8>` values built from
//! them.
use core::fmt;

/// The core's own temporal-state header, written when the caller supplies
/// no user header.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TemporalHeader
{
    pub temporal_offset_x: i32,
    pub temporal_offset_y: i32,
    pub angle_degrees: f64
}

/// A decoded LUMA file: dimensions, the optional raw user header bytes (or
/// a parsed [`TemporalHeader`] when the header size matches one), and the
/// luma samples.
#[derive(Clone, Debug, PartialEq)]
pub struct LumaImage
{
    pub width: u16,
    pub height: u16,
    pub user_header: Vec<u8>,
    pub temporal_header: Option<TemporalHeader>,
    pub samples: Vec<u8>
}

const TEMPORAL_HEADER_SIZE: usize = 4 + 4 + 8;

#[derive(Debug)]
pub enum LumaIoError
{
    /// Not enough bytes remained to read the requested field.
    Truncated { wanted: usize, available: usize },
    /// `width * height` does not match the number of trailing bytes.
    SampleCountMismatch { expected: usize, found: usize }
}

impl fmt::Display for LumaIoError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self
        {
            LumaIoError::Truncated { wanted, available } =>
            {
                write!(f, "LUMA file truncated: wanted {wanted} bytes, {available} available")
            }
            LumaIoError::SampleCountMismatch { expected, found } =>
            {
                write!(f, "LUMA file sample count mismatch: expected {expected}, found {found}")
            }
        }
    }
}

impl std::error::Error for LumaIoError {}

/// A minimal little-endian cursor over a borrowed byte slice.
struct ByteReader<'a>
{
    bytes: &'a [u8],
    position: usize
}

impl<'a> ByteReader<'a>
{
    fn new(bytes: &'a [u8]) -> ByteReader<'a>
    {
        ByteReader { bytes, position: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], LumaIoError>
    {
        let available = self.bytes.len() - self.position;
        if available < len
        {
            return Err(LumaIoError::Truncated { wanted: len, available });
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn read_i16(&mut self) -> Result<i16, LumaIoError>
    {
        let bytes = self.take(2)?;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_i32(&mut self) -> Result<i32, LumaIoError>
    {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_f64(&mut self) -> Result<f64, LumaIoError>
    {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(buf))
    }
}

/// Parse a LUMA file from `bytes`.
pub fn read_luma(bytes: &[u8]) -> Result<LumaImage, LumaIoError>
{
    let mut reader = ByteReader::new(bytes);
    let width = reader.read_i16()? as u16;
    let height = reader.read_i16()? as u16;
    let user_header_size = reader.read_i32()? as usize;
    let header_bytes = reader.take(user_header_size)?.to_vec();

    let temporal_header = if user_header_size == TEMPORAL_HEADER_SIZE
    {
        let mut header_reader = ByteReader::new(&header_bytes);
        Some(TemporalHeader {
            temporal_offset_x: header_reader.read_i32()?,
            temporal_offset_y: header_reader.read_i32()?,
            angle_degrees: header_reader.read_f64()?
        })
    }
    else
    {
        None
    };

    let expected = width as usize * height as usize;
    let samples = reader.take(expected)?.to_vec();
    if samples.len() != expected
    {
        return Err(LumaIoError::SampleCountMismatch { expected, found: samples.len() });
    }

    Ok(LumaImage {
        width,
        height,
        user_header: header_bytes,
        temporal_header,
        samples
    })
}

/// Serialize a LUMA file carrying the core's own [`TemporalHeader`].
#[must_use]
pub fn write_luma_with_temporal_header(
    width: u16,
    height: u16,
    header: TemporalHeader,
    samples: &[u8]
) -> Vec<u8>
{
    let mut out = Vec::with_capacity(2 + 2 + 4 + TEMPORAL_HEADER_SIZE + samples.len());
    out.extend_from_slice(&(width as i16).to_le_bytes());
    out.extend_from_slice(&(height as i16).to_le_bytes());
    out.extend_from_slice(&(TEMPORAL_HEADER_SIZE as i32).to_le_bytes());
    out.extend_from_slice(&header.temporal_offset_x.to_le_bytes());
    out.extend_from_slice(&header.temporal_offset_y.to_le_bytes());
    out.extend_from_slice(&header.angle_degrees.to_le_bytes());
    out.extend_from_slice(samples);
    out
}

/// Serialize a LUMA file with a caller-supplied opaque user header (or none
/// at all, if `user_header` is empty).
#[must_use]
pub fn write_luma_with_user_header(width: u16, height: u16, user_header: &[u8], samples: &[u8]) -> Vec<u8>
{
    let mut out = Vec::with_capacity(2 + 2 + 4 + user_header.len() + samples.len());
    out.extend_from_slice(&(width as i16).to_le_bytes());
    out.extend_from_slice(&(height as i16).to_le_bytes());
    out.extend_from_slice(&(user_header.len() as i32).to_le_bytes());
    out.extend_from_slice(user_header);
    out.extend_from_slice(samples);
    out
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn round_trips_temporal_header()
    {
        let header = TemporalHeader {
            temporal_offset_x: 12,
            temporal_offset_y: -7,
            angle_degrees: 3.5
        };
        let samples = vec![1u8, 2, 3, 4, 5, 6];
        let bytes = write_luma_with_temporal_header(3, 2, header, &samples);
        let decoded = read_luma(&bytes).unwrap();

        assert_eq!(decoded.width, 3);
        assert_eq!(decoded.height, 2);
        assert_eq!(decoded.samples, samples);
        assert_eq!(decoded.temporal_header, Some(header));
    }

    #[test]
    fn round_trips_opaque_user_header()
    {
        let user_header = vec![0xDE, 0xAD, 0xBE, 0xEF, 0x01];
        let samples = vec![9u8; 4];
        let bytes = write_luma_with_user_header(2, 2, &user_header, &samples);
        let decoded = read_luma(&bytes).unwrap();

        assert_eq!(decoded.user_header, user_header);
        assert_eq!(decoded.temporal_header, None);
        assert_eq!(decoded.samples, samples);
    }

    #[test]
    fn truncated_file_is_an_error()
    {
        let bytes = [1u8, 0, 1, 0, 0, 0, 0, 0];
        assert!(matches!(read_luma(&bytes), Err(LumaIoError::Truncated { .. })));
    }

    #[test]
    fn sample_count_mismatch_is_an_error()
    {
        let bytes = write_luma_with_user_header(10, 10, &[], &[1, 2, 3]);
        assert!(matches!(
            read_luma(&bytes),
            Err(LumaIoError::SampleCountMismatch { .. })
        ));
    }
}
