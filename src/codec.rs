//! Wire framing for the automation protocol.
//!
//! Every message on the socket is a JSON document, UTF-8 encoded, then
//! base64 encoded and wrapped in a pair of two-byte delimiters:
//!
//! ```text
//! \x02\x02 <base64(json)> \x02\x02
//! ```
//!
//! There is no length prefix. The delimiter byte is outside the base64
//! alphabet, so the decoder can find frame boundaries by scanning for
//! delimiter runs without looking at the payload.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// The single delimiter byte.
pub const DELIMITER: u8 = 0x02;

/// Start and end marker: the delimiter repeated twice.
pub const MARKER: [u8; 2] = [DELIMITER, DELIMITER];

/// Incomplete frames larger than this are discarded.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Errors for a single frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid base64 in frame: {0}")]
    Base64(#[source] base64::DecodeError),

    #[error("frame payload is not UTF-8: {0}")]
    Utf8(#[source] std::string::FromUtf8Error),

    #[error("frame payload is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("failed to serialize payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("incomplete frame exceeded {MAX_FRAME_SIZE} bytes and was dropped")]
    Oversized,
}

/// Encode a payload into one wire frame.
pub fn encode_frame<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>, FrameError> {
    let json = serde_json::to_vec(payload).map_err(FrameError::Encode)?;
    let body = STANDARD.encode(json);

    let mut frame = Vec::with_capacity(body.len() + MARKER.len() * 2);
    frame.extend_from_slice(&MARKER);
    frame.extend_from_slice(body.as_bytes());
    frame.extend_from_slice(&MARKER);
    Ok(frame)
}

/// Decode the bytes found between a start and end marker.
fn decode_body(body: &[u8]) -> Result<Value, FrameError> {
    let raw = STANDARD.decode(body).map_err(FrameError::Base64)?;
    let text = String::from_utf8(raw).map_err(FrameError::Utf8)?;
    serde_json::from_str(&text).map_err(FrameError::Json)
}

fn find_marker(haystack: &[u8]) -> Option<usize> {
    haystack.windows(MARKER.len()).position(|w| w == MARKER)
}

/// Accumulates raw socket bytes and yields whole payloads.
///
/// Bytes are appended with [`FrameDecoder::extend`]; [`FrameDecoder::frames`]
/// then lazily drains every complete frame currently buffered. A trailing
/// incomplete frame stays in the buffer for the next read.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Where the search for the current frame's end marker resumes.
    end_scan: usize,
}

impl FrameDecoder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            end_scan: 0,
        }
    }

    /// Append received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bytes waiting for a frame to complete.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Iterate over the complete frames in the buffer, in arrival order.
    ///
    /// A malformed frame yields an error for that frame only; scanning
    /// continues with the next start marker.
    pub const fn frames(&mut self) -> Frames<'_> {
        Frames { decoder: self }
    }

    fn next_frame(&mut self) -> Option<Result<Value, FrameError>> {
        loop {
            let Some(start) = find_marker(&self.buffer) else {
                // Keep a lone trailing delimiter: it may be half of a start marker.
                let keep = usize::from(self.buffer.last() == Some(&DELIMITER));
                let cut = self.buffer.len() - keep;
                self.buffer.drain(..cut);
                self.end_scan = 0;
                return None;
            };
            if start > 0 {
                self.buffer.drain(..start);
                self.end_scan = 0;
            }

            let from = self.end_scan.max(MARKER.len());
            let Some(offset) = find_marker(&self.buffer[from..]) else {
                if self.buffer.len() > MAX_FRAME_SIZE {
                    self.buffer.clear();
                    self.end_scan = 0;
                    return Some(Err(FrameError::Oversized));
                }
                // The last byte may be the first half of the end marker.
                self.end_scan = (self.buffer.len() - 1).max(MARKER.len());
                return None;
            };
            self.end_scan = 0;

            let body_end = from + offset;
            if body_end == MARKER.len() {
                // An end marker directly followed by a start marker.
                self.buffer.drain(..MARKER.len());
                continue;
            }

            return match decode_body(&self.buffer[MARKER.len()..body_end]) {
                Ok(payload) => {
                    self.buffer.drain(..body_end + MARKER.len());
                    Some(Ok(payload))
                }
                Err(e) => {
                    // A frame that lost its end marker ends at the next
                    // frame's start marker, so that marker is kept.
                    self.buffer.drain(..MARKER.len());
                    Some(Err(e))
                }
            };
        }
    }
}

/// Lazy iterator over decoded frames, see [`FrameDecoder::frames`].
pub struct Frames<'a> {
    decoder: &'a mut FrameDecoder,
}

impl Iterator for Frames<'_> {
    type Item = Result<Value, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decoder.next_frame()
    }
}
