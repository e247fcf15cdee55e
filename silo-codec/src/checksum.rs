//! Checksum-counting output buffer.
//!
//! Every byte of a container passes through [`ChecksumWriter`], which
//! maintains an incremental MD5 digest and a byte counter alongside the
//! buffer itself. The digest is order-dependent over the exact encoded
//! byte stream, so it doubles as the artifact's integrity checksum for
//! sinks (object stores verify uploads against it).

use bytes::{BufMut, Bytes, BytesMut};
use md5::{Digest as _, Md5};

/// Finalized MD5 digest of an encoded container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Digest([u8; 16]);

impl Digest {
    /// Returns the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Returns the digest as a lowercase hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; 16]> for Digest {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Output buffer that tracks byte count and MD5 incrementally.
#[derive(Debug, Default)]
pub struct ChecksumWriter {
    buf: BytesMut,
    digest: Md5,
    bytes_written: u64,
}

impl ChecksumWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes to the buffer, updating digest and counter.
    pub fn write(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
        self.digest.update(data);
        self.bytes_written += data.len() as u64;
    }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Consumes the writer, yielding the buffered bytes and final digest.
    #[must_use]
    pub fn finish(self) -> (Bytes, Digest) {
        let digest: [u8; 16] = self.digest.finalize().into();
        (self.buf.freeze(), Digest(digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_every_write() {
        let mut writer = ChecksumWriter::new();
        assert_eq!(writer.bytes_written(), 0);
        writer.write(b"hello");
        writer.write(b", world");
        assert_eq!(writer.bytes_written(), 12);

        let (bytes, _) = writer.finish();
        assert_eq!(&bytes[..], b"hello, world");
    }

    #[test]
    fn test_digest_matches_one_shot() {
        let mut incremental = ChecksumWriter::new();
        incremental.write(b"abc");
        incremental.write(b"def");
        let (_, digest) = incremental.finish();

        let mut one_shot = ChecksumWriter::new();
        one_shot.write(b"abcdef");
        let (_, expected) = one_shot.finish();

        assert_eq!(digest, expected);
    }

    #[test]
    fn test_digest_is_order_dependent() {
        let mut a = ChecksumWriter::new();
        a.write(b"first");
        a.write(b"second");
        let (_, digest_a) = a.finish();

        let mut b = ChecksumWriter::new();
        b.write(b"second");
        b.write(b"first");
        let (_, digest_b) = b.finish();

        assert_ne!(digest_a, digest_b);
    }

    #[test]
    fn test_known_digest() {
        // MD5("") is the canonical empty digest.
        let (_, digest) = ChecksumWriter::new().finish();
        assert_eq!(digest.to_hex(), "d41d8cd98f00b204e9800998ecf8427e");
    }
}
