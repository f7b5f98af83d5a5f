//! Delimiter-based framing for syslog over TCP.
//!
//! Each message on a stream is terminated by a configurable byte sequence,
//! a newline by default. When the delimiter is `\n` a preceding `\r` is
//! stripped so CRLF senders are accepted too.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Default message delimiter.
pub const DEFAULT_DELIMITER: &[u8] = b"\n";

/// Minimum accepted frame length in bytes.
pub const MIN_FRAME_LENGTH: usize = 64;

/// Maximum accepted frame length in bytes (16 MiB).
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

pub(crate) fn clamp_frame_length(value: usize) -> usize {
    value.clamp(MIN_FRAME_LENGTH, MAX_FRAME_LENGTH)
}

/// Splits a byte stream on a delimiter and appends it when encoding.
#[derive(Clone, Debug)]
pub struct DelimitedCodec {
    delimiter: Vec<u8>,
    max_frame_length: usize,
    search_from: usize,
}

impl DelimitedCodec {
    /// Create a codec for `delimiter`, falling back to a newline when empty.
    #[must_use]
    pub fn new(delimiter: impl Into<Vec<u8>>, max_frame_length: usize) -> Self {
        let mut delimiter = delimiter.into();
        if delimiter.is_empty() {
            delimiter = DEFAULT_DELIMITER.to_vec();
        }
        Self {
            delimiter,
            max_frame_length: clamp_frame_length(max_frame_length),
            search_from: 0,
        }
    }

    #[must_use]
    pub fn delimiter(&self) -> &[u8] { &self.delimiter }

    #[must_use]
    pub fn max_frame_length(&self) -> usize { self.max_frame_length }

    fn find_delimiter(&self, src: &[u8]) -> Option<usize> {
        src.get(self.search_from..)?
            .windows(self.delimiter.len())
            .position(|window| window == self.delimiter.as_slice())
            .map(|offset| offset + self.search_from)
    }

    fn oversized(&self, size: usize) -> io::Error {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame exceeds max length: {size} > {}", self.max_frame_length),
        )
    }

    fn strip_cr(&self, mut frame: BytesMut) -> Bytes {
        if self.delimiter == DEFAULT_DELIMITER && frame.last() == Some(&b'\r') {
            frame.truncate(frame.len() - 1);
        }
        frame.freeze()
    }
}

impl Default for DelimitedCodec {
    fn default() -> Self { Self::new(DEFAULT_DELIMITER, 64 * 1024) }
}

impl Decoder for DelimitedCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(index) = self.find_delimiter(src) {
            self.search_from = 0;
            if index > self.max_frame_length {
                return Err(self.oversized(index));
            }
            let frame = src.split_to(index);
            src.advance(self.delimiter.len());
            return Ok(Some(self.strip_cr(frame)));
        }
        if src.len() > self.max_frame_length {
            return Err(self.oversized(src.len()));
        }
        // Rescan the tail in case a multi-byte delimiter straddles reads.
        self.search_from = src.len().saturating_sub(self.delimiter.len() - 1);
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        self.search_from = 0;
        if src.is_empty() {
            return Ok(None);
        }
        let frame = src.split();
        Ok(Some(self.strip_cr(frame)))
    }
}

impl<T: AsRef<[u8]>> Encoder<T> for DelimitedCodec {
    type Error = io::Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = item.as_ref();
        if payload.len() > self.max_frame_length {
            return Err(self.oversized(payload.len()));
        }
        dst.reserve(payload.len() + self.delimiter.len());
        dst.put_slice(payload);
        dst.put_slice(&self.delimiter);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_newline_and_strips_cr() {
        let mut codec = DelimitedCodec::default();
        let mut buf = BytesMut::from(&b"<13>one\r\n<13>two\n<13>th"[..]);
        assert_eq!(codec.decode(&mut buf).expect("decode"), Some(Bytes::from_static(b"<13>one")));
        assert_eq!(codec.decode(&mut buf).expect("decode"), Some(Bytes::from_static(b"<13>two")));
        assert_eq!(codec.decode(&mut buf).expect("decode"), None);
        buf.extend_from_slice(b"ree");
        assert_eq!(
            codec.decode_eof(&mut buf).expect("eof"),
            Some(Bytes::from_static(b"<13>three"))
        );
        assert_eq!(codec.decode_eof(&mut buf).expect("eof"), None);
    }

    #[test]
    fn multi_byte_delimiter_across_reads() {
        let mut codec = DelimitedCodec::new(b"\r\n\r\n".to_vec(), 1024);
        let mut buf = BytesMut::from(&b"first\r\n"[..]);
        assert_eq!(codec.decode(&mut buf).expect("decode"), None);
        buf.extend_from_slice(b"\r\nsecond");
        assert_eq!(codec.decode(&mut buf).expect("decode"), Some(Bytes::from_static(b"first")));
        assert_eq!(&buf[..], b"second");
    }

    #[test]
    fn rejects_oversized_frames() {
        let mut codec = DelimitedCodec::new(b"\n".to_vec(), 0);
        let mut buf = BytesMut::from(vec![b'a'; MIN_FRAME_LENGTH + 1].as_slice());
        let err = codec.decode(&mut buf).expect_err("oversized");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn encoder_appends_delimiter() {
        let mut codec = DelimitedCodec::new(b"\0".to_vec(), 1024);
        let mut dst = BytesMut::new();
        codec.encode("<13>hi", &mut dst).expect("encode");
        assert_eq!(&dst[..], b"<13>hi\0");
    }

    #[test]
    fn empty_delimiter_falls_back_to_newline() {
        assert_eq!(DelimitedCodec::new(Vec::new(), 1024).delimiter(), b"\n");
    }
}
