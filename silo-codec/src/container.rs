//! Container framing: writer and reader.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use silo_core::Timestamp;

use crate::checksum::{ChecksumWriter, Digest};
use crate::error::{CodecError, CodecResult};

/// Size of the container header in bytes.
pub const CONTAINER_HEADER_SIZE: usize = 16;

/// Magic bytes identifying a Silo container.
const CONTAINER_MAGIC: &[u8; 8] = b"SILOARC1";

/// Current container format version.
const CONTAINER_VERSION: u32 = 1;

/// Maximum frame body size in bytes.
///
/// Far above any single record the stream source will deliver; the limit
/// exists so a corrupted length prefix fails decoding instead of a
/// multi-gigabyte allocation.
const FRAME_BODY_BYTES_MAX: u64 = 128 * 1024 * 1024;

/// Compression codec applied to each frame body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Compression {
    /// No compression.
    #[default]
    None = 0,
    /// Deflate, applied per frame.
    Deflate = 1,
}

impl Compression {
    /// Returns the single-byte discriminant stored in the header.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Creates a `Compression` from its byte discriminant.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::None),
            1 => Some(Self::Deflate),
            _ => None,
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Deflate => write!(f, "deflate"),
        }
    }
}

/// A record as stored in the container.
///
/// Offsets are intentionally absent; they are artifact metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedRecord {
    /// Record timestamp in milliseconds.
    pub timestamp: Timestamp,
    /// Optional record key.
    pub key: Option<Bytes>,
    /// Optional record value.
    pub value: Option<Bytes>,
}

/// Append-only container writer.
///
/// Writes the header on construction and one frame per appended record.
/// The byte count and digest reflect exactly what has been written, at
/// every point in time.
#[derive(Debug)]
pub struct BatchWriter {
    out: ChecksumWriter,
    compression: Compression,
    scratch: BytesMut,
}

impl BatchWriter {
    /// Creates a writer and emits the container header.
    #[must_use]
    pub fn new(compression: Compression) -> Self {
        let mut out = ChecksumWriter::new();
        out.write(CONTAINER_MAGIC);
        out.write(&CONTAINER_VERSION.to_le_bytes());
        out.write(&[compression.as_byte(), 0, 0, 0]);
        Self {
            out,
            compression,
            scratch: BytesMut::new(),
        }
    }

    /// Returns the compression codec frames are written with.
    #[must_use]
    pub const fn compression(&self) -> Compression {
        self.compression
    }

    /// Returns the total encoded size so far, header included.
    #[must_use]
    pub const fn byte_size(&self) -> u64 {
        self.out.bytes_written()
    }

    /// Appends one record as a frame.
    ///
    /// # Errors
    /// Returns an error if the encoded body exceeds the frame size limit
    /// or compression fails.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)] // Lengths bounded by FRAME_BODY_BYTES_MAX.
    pub fn append(
        &mut self,
        timestamp: Timestamp,
        key: Option<&[u8]>,
        value: Option<&[u8]>,
    ) -> CodecResult<()> {
        self.scratch.clear();
        self.scratch.put_i64_le(timestamp.as_millis());
        put_optional(&mut self.scratch, key);
        put_optional(&mut self.scratch, value);

        if self.scratch.len() as u64 > FRAME_BODY_BYTES_MAX {
            return Err(CodecError::FrameTooLarge {
                size: self.scratch.len() as u64,
                max: FRAME_BODY_BYTES_MAX,
            });
        }

        match self.compression {
            Compression::None => {
                self.out.write(&(self.scratch.len() as u32).to_le_bytes());
                self.out.write(&self.scratch);
            }
            Compression::Deflate => {
                let mut encoder =
                    DeflateEncoder::new(Vec::new(), flate2::Compression::default());
                encoder
                    .write_all(&self.scratch)
                    .map_err(|e| CodecError::io("deflate", e))?;
                let compressed = encoder.finish().map_err(|e| CodecError::io("deflate", e))?;
                self.out.write(&(compressed.len() as u32).to_le_bytes());
                self.out.write(&compressed);
            }
        }

        Ok(())
    }

    /// Finalizes the container, yielding the payload and its digest.
    #[must_use]
    pub fn finish(self) -> (Bytes, Digest) {
        self.out.finish()
    }
}

fn put_optional(buf: &mut BytesMut, data: Option<&[u8]>) {
    match data {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        Some(bytes) => {
            buf.put_i32_le(bytes.len() as i32);
            buf.put_slice(bytes);
        }
        None => buf.put_i32_le(-1),
    }
}

/// Container reader.
///
/// Validates the header on construction, then yields records in order.
#[derive(Debug)]
pub struct BatchReader {
    buf: Bytes,
    compression: Compression,
    position: u64,
}

impl BatchReader {
    /// Opens a container for reading.
    ///
    /// # Errors
    /// Returns an error if the header is missing, carries the wrong magic,
    /// or names an unknown version or compression codec.
    pub fn new(payload: Bytes) -> CodecResult<Self> {
        let mut buf = payload;
        if buf.remaining() < CONTAINER_HEADER_SIZE {
            return Err(CodecError::InvalidHeader {
                reason: "container shorter than header",
            });
        }

        let mut magic = [0u8; 8];
        buf.copy_to_slice(&mut magic);
        if &magic != CONTAINER_MAGIC {
            return Err(CodecError::InvalidHeader {
                reason: "bad magic",
            });
        }

        let version = buf.get_u32_le();
        if version != CONTAINER_VERSION {
            return Err(CodecError::UnsupportedVersion { version });
        }

        let compression_byte = buf.get_u8();
        let compression = Compression::from_byte(compression_byte)
            .ok_or(CodecError::UnsupportedCompression {
                byte: compression_byte,
            })?;
        buf.advance(3); // Reserved.

        Ok(Self {
            buf,
            compression,
            position: CONTAINER_HEADER_SIZE as u64,
        })
    }

    /// Returns the compression codec declared in the header.
    #[must_use]
    pub const fn compression(&self) -> Compression {
        self.compression
    }

    fn next_record(&mut self) -> CodecResult<Option<ArchivedRecord>> {
        if !self.buf.has_remaining() {
            return Ok(None);
        }
        if self.buf.remaining() < 4 {
            return Err(CodecError::TruncatedFrame {
                offset: self.position,
                expected: 4,
                found: self.buf.remaining() as u64,
            });
        }

        let body_len = u64::from(self.buf.get_u32_le());
        self.position += 4;
        if body_len > FRAME_BODY_BYTES_MAX {
            return Err(CodecError::FrameTooLarge {
                size: body_len,
                max: FRAME_BODY_BYTES_MAX,
            });
        }
        if (self.buf.remaining() as u64) < body_len {
            return Err(CodecError::TruncatedFrame {
                offset: self.position,
                expected: body_len,
                found: self.buf.remaining() as u64,
            });
        }

        #[allow(clippy::cast_possible_truncation)] // Bounded by FRAME_BODY_BYTES_MAX.
        let raw = self.buf.copy_to_bytes(body_len as usize);
        self.position += body_len;

        let body = match self.compression {
            Compression::None => raw,
            Compression::Deflate => {
                let mut decoder = DeflateDecoder::new(&raw[..]);
                let mut decompressed = Vec::new();
                decoder
                    .read_to_end(&mut decompressed)
                    .map_err(|e| CodecError::io("inflate", e))?;
                Bytes::from(decompressed)
            }
        };

        decode_body(&body, self.position).map(Some)
    }
}

impl Iterator for BatchReader {
    type Item = CodecResult<ArchivedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[allow(clippy::cast_sign_loss)] // Lengths checked non-negative before cast.
fn decode_body(body: &Bytes, frame_offset: u64) -> CodecResult<ArchivedRecord> {
    let mut buf = body.clone();
    if buf.remaining() < 8 + 4 {
        return Err(CodecError::TruncatedFrame {
            offset: frame_offset,
            expected: 12,
            found: buf.remaining() as u64,
        });
    }

    let timestamp = Timestamp::from_millis(buf.get_i64_le());
    let key = get_optional(&mut buf, frame_offset)?;
    let value = get_optional(&mut buf, frame_offset)?;

    Ok(ArchivedRecord {
        timestamp,
        key,
        value,
    })
}

#[allow(clippy::cast_sign_loss)] // Length checked non-negative before cast.
fn get_optional(buf: &mut Bytes, frame_offset: u64) -> CodecResult<Option<Bytes>> {
    if buf.remaining() < 4 {
        return Err(CodecError::TruncatedFrame {
            offset: frame_offset,
            expected: 4,
            found: buf.remaining() as u64,
        });
    }
    let len = buf.get_i32_le();
    if len < 0 {
        return Ok(None);
    }
    if buf.remaining() < len as usize {
        return Err(CodecError::TruncatedFrame {
            offset: frame_offset,
            expected: len as u64,
            found: buf.remaining() as u64,
        });
    }
    Ok(Some(buf.copy_to_bytes(len as usize)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<ArchivedRecord> {
        vec![
            ArchivedRecord {
                timestamp: Timestamp::from_millis(1_475_273_684_343),
                key: Some(Bytes::from_static(b"user-1")),
                value: Some(Bytes::from_static(b"payload one")),
            },
            ArchivedRecord {
                timestamp: Timestamp::from_millis(1_475_273_744_343),
                key: None,
                value: Some(Bytes::from_static(b"keyless")),
            },
            ArchivedRecord {
                timestamp: Timestamp::from_millis(1_475_273_804_343),
                key: Some(Bytes::from_static(b"tombstone")),
                value: None,
            },
            ArchivedRecord {
                timestamp: Timestamp::from_millis(1_475_273_864_343),
                key: None,
                value: None,
            },
        ]
    }

    fn roundtrip(compression: Compression) {
        let records = sample_records();
        let mut writer = BatchWriter::new(compression);
        for record in &records {
            writer
                .append(record.timestamp, record.key.as_deref(), record.value.as_deref())
                .unwrap();
        }
        let (payload, _) = writer.finish();

        let reader = BatchReader::new(payload).unwrap();
        assert_eq!(reader.compression(), compression);
        let decoded: Vec<_> = reader.collect::<CodecResult<_>>().unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_roundtrip_uncompressed() {
        roundtrip(Compression::None);
    }

    #[test]
    fn test_roundtrip_deflate() {
        roundtrip(Compression::Deflate);
    }

    #[test]
    fn test_empty_container_roundtrip() {
        let (payload, _) = BatchWriter::new(Compression::None).finish();
        assert_eq!(payload.len(), CONTAINER_HEADER_SIZE);
        let decoded: Vec<_> = BatchReader::new(payload)
            .unwrap()
            .collect::<CodecResult<_>>()
            .unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_byte_size_grows_per_append() {
        let mut writer = BatchWriter::new(Compression::None);
        assert_eq!(writer.byte_size(), CONTAINER_HEADER_SIZE as u64);

        writer
            .append(Timestamp::from_millis(1), None, Some(b"abc".as_slice()))
            .unwrap();
        // Frame: 4 (len) + 8 (timestamp) + 4 (-1 key) + 4 + 3 (value).
        assert_eq!(writer.byte_size(), CONTAINER_HEADER_SIZE as u64 + 23);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut payload = BytesMut::new();
        payload.put_slice(b"NOTSILO!");
        payload.put_u32_le(CONTAINER_VERSION);
        payload.put_slice(&[0, 0, 0, 0]);
        let result = BatchReader::new(payload.freeze());
        assert!(matches!(result, Err(CodecError::InvalidHeader { .. })));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut payload = BytesMut::new();
        payload.put_slice(CONTAINER_MAGIC);
        payload.put_u32_le(99);
        payload.put_slice(&[0, 0, 0, 0]);
        let result = BatchReader::new(payload.freeze());
        assert!(matches!(
            result,
            Err(CodecError::UnsupportedVersion { version: 99 })
        ));
    }

    #[test]
    fn test_unknown_compression_rejected() {
        let mut payload = BytesMut::new();
        payload.put_slice(CONTAINER_MAGIC);
        payload.put_u32_le(CONTAINER_VERSION);
        payload.put_slice(&[7, 0, 0, 0]);
        let result = BatchReader::new(payload.freeze());
        assert!(matches!(
            result,
            Err(CodecError::UnsupportedCompression { byte: 7 })
        ));
    }

    #[test]
    fn test_truncated_frame_detected() {
        let mut writer = BatchWriter::new(Compression::None);
        writer
            .append(Timestamp::from_millis(1), Some(b"key".as_slice()), Some(b"value".as_slice()))
            .unwrap();
        let (payload, _) = writer.finish();

        let truncated = payload.slice(..payload.len() - 3);
        let result: CodecResult<Vec<_>> = BatchReader::new(truncated).unwrap().collect();
        assert!(matches!(result, Err(CodecError::TruncatedFrame { .. })));
    }

    #[test]
    fn test_digest_differs_when_order_differs() {
        let mut a = BatchWriter::new(Compression::None);
        a.append(Timestamp::from_millis(1), None, Some(b"x".as_slice())).unwrap();
        a.append(Timestamp::from_millis(2), None, Some(b"y".as_slice())).unwrap();
        let (_, digest_a) = a.finish();

        let mut b = BatchWriter::new(Compression::None);
        b.append(Timestamp::from_millis(2), None, Some(b"y".as_slice())).unwrap();
        b.append(Timestamp::from_millis(1), None, Some(b"x".as_slice())).unwrap();
        let (_, digest_b) = b.finish();

        assert_ne!(digest_a, digest_b);
    }
}
