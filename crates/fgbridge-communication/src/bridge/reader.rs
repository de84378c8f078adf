//! Frame decoding from a raw byte stream
//!
//! The serial line has no flow control and may carry noise, so the reader
//! hunts for START, trusts the header for the payload length (after
//! bounding it), and then skips ahead to the next END on the wire.

use fgbridge_core::codec::{self, Header, END, HEADER_SIZE, START};
use fgbridge_core::{Frame, FrameError, FrameResult, MAX_DECLARED_LENGTH};
use std::io::{self, Read};

/// A decoded frame together with its wire bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// The decoded frame
    pub frame: Frame,
    /// START + header + payload + END, exactly as assembled
    pub encoded: Vec<u8>,
}

impl DecodedFrame {
    /// Encoded length in bytes
    pub fn len(&self) -> usize {
        self.encoded.len()
    }

    /// Always false: a decoded frame holds at least START, header and END
    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }
}

/// Decodes one frame per call from a blocking byte source
pub struct FrameReader<R> {
    source: R,
    max_payload: usize,
    exhausted: bool,
}

impl<R: Read> FrameReader<R> {
    /// Create a reader that rejects payloads longer than `max_payload`
    ///
    /// The bound is clamped to what the header can express.
    pub fn new(source: R, max_payload: usize) -> Self {
        Self {
            source,
            max_payload: max_payload.min(MAX_DECLARED_LENGTH),
            exhausted: false,
        }
    }

    /// Largest payload this reader accepts
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Check if the last read hit end of file
    ///
    /// Timeouts do not count; only a read returning zero bytes does.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Get a reference to the byte source
    pub fn get_ref(&self) -> &R {
        &self.source
    }

    /// Get a mutable reference to the byte source
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.source
    }

    /// Unwrap the byte source
    pub fn into_inner(self) -> R {
        self.source
    }

    /// Read the next frame
    ///
    /// Returns `Ok(None)` when the source ends before a frame is complete;
    /// nothing is kept from the partial attempt. An oversized header is
    /// rejected after its 4 bytes, so the next call hunts for START again
    /// right behind it. A frame whose buffer cannot be allocated is drained
    /// from the source. Both are reported as transient errors.
    pub fn read_frame(&mut self) -> FrameResult<Option<DecodedFrame>> {
        if self.skip_until(START)?.is_none() {
            return Ok(None);
        }

        let mut header_buf = [0u8; HEADER_SIZE];
        if !self.fill(&mut header_buf)? {
            tracing::trace!("Stream ended inside header");
            return Ok(None);
        }

        let Header {
            kind,
            declared_length,
        } = codec::decode_header(&header_buf);
        let len = declared_length as usize;
        tracing::debug!("Received kind {} header, {} payload bytes", kind, len);

        if len > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                declared: len,
                max: self.max_payload,
            });
        }

        let size = codec::encoded_len(len);
        let mut buf = Vec::new();
        if buf.try_reserve_exact(size).is_err() {
            self.drain(len + 1)?;
            return Err(FrameError::Allocation { size });
        }

        buf.push(START);
        buf.extend_from_slice(&header_buf);
        buf.resize(1 + HEADER_SIZE + len, 0);
        if !self.fill(&mut buf[1 + HEADER_SIZE..])? {
            tracing::trace!("Stream ended inside payload of kind {}", kind);
            return Ok(None);
        }
        buf.push(END);

        match self.skip_until(END)? {
            Some(0) => {}
            Some(skipped) => {
                let err = FrameError::MalformedFrame {
                    reason: format!("{} stray bytes before END", skipped),
                };
                tracing::warn!("Kind {}: {}, resynchronized", kind, err);
            }
            None => tracing::debug!("Stream ended before END of kind {}", kind),
        }

        let frame = Frame::new(kind, buf[1 + HEADER_SIZE..1 + HEADER_SIZE + len].to_vec());
        Ok(Some(DecodedFrame {
            frame,
            encoded: buf,
        }))
    }

    /// Discard bytes until `marker` is consumed
    ///
    /// Returns how many other bytes were skipped, or `None` if the source
    /// ended first.
    fn skip_until(&mut self, marker: u8) -> FrameResult<Option<usize>> {
        let mut skipped = 0;
        let mut byte = [0u8; 1];
        loop {
            if !self.fill(&mut byte)? {
                return Ok(None);
            }
            if byte[0] == marker {
                return Ok(Some(skipped));
            }
            skipped += 1;
        }
    }

    /// Discard up to `count` bytes to keep framing aligned
    fn drain(&mut self, mut count: usize) -> FrameResult<()> {
        let mut scratch = [0u8; 64];
        while count > 0 {
            let chunk = count.min(scratch.len());
            match self.source.read(&mut scratch[..chunk]) {
                Ok(0) => {
                    self.exhausted = true;
                    break;
                }
                Ok(n) => {
                    self.exhausted = false;
                    count -= n;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_end_of_stream(&e) => break,
                Err(e) => return Err(FrameError::Io(e)),
            }
        }
        Ok(())
    }

    /// Fill `buf` completely; `false` if the source ended first
    fn fill(&mut self, buf: &mut [u8]) -> FrameResult<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.source.read(&mut buf[filled..]) {
                Ok(0) => {
                    self.exhausted = true;
                    return Ok(false);
                }
                Ok(n) => {
                    self.exhausted = false;
                    filled += n;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_end_of_stream(&e) => return Ok(false),
                Err(e) => return Err(FrameError::Io(e)),
            }
        }
        Ok(true)
    }
}

/// Read timeouts on the serial port mean no more bytes are coming
fn is_end_of_stream(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(bytes: &[u8]) -> FrameReader<Cursor<Vec<u8>>> {
        FrameReader::new(Cursor::new(bytes.to_vec()), 1024)
    }

    /// Source that yields its bytes in small pieces
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    /// Source that times out once its bytes run out
    struct TimesOut(Cursor<Vec<u8>>);

    impl Read for TimesOut {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.read(buf)? {
                0 => Err(io::Error::new(io::ErrorKind::TimedOut, "timed out")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_decode_known_frame() {
        let wire = [0x02, 0x00, 0x05, 0x00, 0x03, 0x41, 0x42, 0x43, 0x03];
        let decoded = reader(&wire).read_frame().unwrap().unwrap();
        assert_eq!(decoded.frame, Frame::new(5, vec![0x41, 0x42, 0x43]));
        assert_eq!(decoded.encoded, wire.to_vec());
        assert_eq!(decoded.len(), 9);
    }

    #[test]
    fn test_header_only_frame() {
        let wire = [START, 0x00, 0x07, 0x00, 0x00, END];
        let decoded = reader(&wire).read_frame().unwrap().unwrap();
        assert_eq!(decoded.frame, Frame::empty(7));
        assert_eq!(decoded.encoded, wire.to_vec());
    }

    #[test]
    fn test_last_payload_byte_is_kept() {
        let wire = [START, 0x00, 0x01, 0x00, 0x02, 0xAA, 0xBB, END];
        let decoded = reader(&wire).read_frame().unwrap().unwrap();
        assert_eq!(decoded.frame.payload, vec![0xAA, 0xBB]);
        assert_eq!(decoded.encoded[6], 0xBB);
        assert_eq!(decoded.encoded[7], END);
    }

    #[test]
    fn test_resync_after_noise() {
        let mut wire = vec![0xFF, 0x13, 0x37, 0x00];
        wire.extend_from_slice(&[START, 0x00, 0x05, 0x00, 0x01, 0x41, END]);
        let mut r = reader(&wire);
        assert_eq!(r.read_frame().unwrap().unwrap().frame, Frame::new(5, vec![0x41]));
        assert!(r.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_trailing_noise_before_end_is_skipped() {
        let mut wire = vec![START, 0x00, 0x09, 0x00, 0x01, 0x10, 0x77, 0x78, END];
        wire.extend_from_slice(&[START, 0x00, 0x0A, 0x00, 0x00, END]);
        let mut r = reader(&wire);
        assert_eq!(r.read_frame().unwrap().unwrap().frame, Frame::new(9, vec![0x10]));
        assert_eq!(r.read_frame().unwrap().unwrap().frame, Frame::empty(10));
    }

    #[test]
    fn test_missing_end_still_yields_frame() {
        let wire = [START, 0x00, 0x05, 0x00, 0x01, 0x41];
        let decoded = reader(&wire).read_frame().unwrap().unwrap();
        assert_eq!(decoded.frame, Frame::new(5, vec![0x41]));
        assert_eq!(*decoded.encoded.last().unwrap(), END);
    }

    #[test]
    fn test_truncated_header() {
        assert!(reader(&[START, 0x00, 0x05]).read_frame().unwrap().is_none());
    }

    #[test]
    fn test_truncated_payload() {
        let wire = [START, 0x00, 0x05, 0x00, 0x04, 0x41, 0x42];
        assert!(reader(&wire).read_frame().unwrap().is_none());
    }

    #[test]
    fn test_exhaustion_tracking() {
        let mut r = reader(&[START, 0x00, 0x05, 0x00, 0x00, END]);
        assert!(r.read_frame().unwrap().is_some());
        assert!(!r.is_exhausted());
        assert!(r.read_frame().unwrap().is_none());
        assert!(r.is_exhausted());

        let src = TimesOut(Cursor::new(Vec::new()));
        let mut r = FrameReader::new(src, 16);
        assert!(r.read_frame().unwrap().is_none());
        assert!(!r.is_exhausted());
    }

    #[test]
    fn test_no_start_marker() {
        assert!(reader(&[0x00, 0x01, 0x03]).read_frame().unwrap().is_none());
        assert!(reader(&[]).read_frame().unwrap().is_none());
    }

    #[test]
    fn test_oversized_header_resyncs_on_next_start() {
        // A stray START in line noise followed by a garbage length
        let mut wire = vec![START, 0x00, 0x00, 0xFF, 0xFF];
        wire.extend_from_slice(&[START, 0x00, 0x05, 0x00, 0x03, 0x41, 0x42, 0x43, END]);

        let mut r = reader(&wire);
        let err = r.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge {
                declared: 65535,
                max: 1024
            }
        ));
        assert!(err.is_transient());

        let decoded = r.read_frame().unwrap().expect("frame after noise");
        assert_eq!(decoded.frame, Frame::new(5, vec![0x41, 0x42, 0x43]));
        assert!(r.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_oversized_header_is_not_drained() {
        let mut wire = vec![START, 0x00, 0x05, 0x00, 0x10];
        wire.extend_from_slice(&[0xEE; 16]);
        wire.push(END);
        wire.extend_from_slice(&[START, 0x00, 0x06, 0x00, 0x00, END]);

        let mut r = FrameReader::new(Cursor::new(wire), 8);
        assert!(r.read_frame().is_err());
        // Only the header was consumed.
        assert_eq!(r.get_ref().position(), 5);
        assert_eq!(r.read_frame().unwrap().unwrap().frame, Frame::empty(6));
    }

    #[test]
    fn test_max_payload_clamped_to_header_width() {
        let r = FrameReader::new(Cursor::new(Vec::new()), usize::MAX);
        assert_eq!(r.max_payload(), MAX_DECLARED_LENGTH);
    }

    #[test]
    fn test_short_reads_are_reassembled() {
        let wire = vec![0x99, START, 0x01, 0x00, 0x00, 0x03, 1, 2, 3, END];
        let mut r = FrameReader::new(
            Trickle {
                data: wire,
                pos: 0,
                step: 1,
            },
            1024,
        );
        let decoded = r.read_frame().unwrap().unwrap();
        assert_eq!(decoded.frame, Frame::new(0x0100, vec![1, 2, 3]));
    }

    #[test]
    fn test_timeout_counts_as_stream_end() {
        let src = TimesOut(Cursor::new(vec![START, 0x00, 0x05, 0x00, 0x02, 0x41]));
        assert!(FrameReader::new(src, 1024).read_frame().unwrap().is_none());
    }

    #[test]
    fn test_io_error_surfaces() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            }
        }
        let err = FrameReader::new(Broken, 16).read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(_)));
        assert!(!err.is_transient());
    }
}
