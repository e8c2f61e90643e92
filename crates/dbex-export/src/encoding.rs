//! Per-cell byte handling applied while writing CSV

use std::borrow::Cow;

use dbex_core::{ExtractorError, Result};
use encoding_rs::Encoding;

/// What happens to the bytes of each cell before it is written.
///
/// The default passes bytes through untouched, malformed sequences
/// included. Transcoding decodes the source character set and encodes the
/// target one; stripping then drops every malformed UTF-8 sequence. Both
/// can be enabled independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodingPolicy {
    strip_invalid: bool,
    transcode: Option<(&'static Encoding, &'static Encoding)>,
}

impl EncodingPolicy {
    /// Write bytes as received
    pub fn passthrough() -> Self {
        Self::default()
    }

    pub fn with_strip_invalid(mut self, strip: bool) -> Self {
        self.strip_invalid = strip;
        self
    }

    /// Transcode from one character set label to another (e.g. "latin1", "utf-8")
    pub fn with_transcoding(mut self, from: &str, to: &str) -> Result<Self> {
        self.transcode = Some((lookup(from)?, lookup(to)?));
        Ok(self)
    }

    pub fn is_passthrough(&self) -> bool {
        !self.strip_invalid && self.transcode.is_none()
    }

    pub fn strips_invalid(&self) -> bool {
        self.strip_invalid
    }

    pub fn apply<'a>(&self, cell: Cow<'a, [u8]>) -> Cow<'a, [u8]> {
        let cell = match self.transcode {
            Some((from, to)) => {
                let (decoded, _) = from.decode_without_bom_handling(&cell);
                let (encoded, _, _) = to.encode(&decoded);
                Cow::Owned(encoded.into_owned())
            }
            None => cell,
        };

        if self.strip_invalid && std::str::from_utf8(&cell).is_err() {
            Cow::Owned(strip_invalid_utf8(&cell))
        } else {
            cell
        }
    }
}

fn lookup(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
        ExtractorError::InvalidConfig(format!("Unknown character set \"{}\".", label))
    })
}

fn strip_invalid_utf8(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.extend_from_slice(chunk.valid().as_bytes());
    }
    out
}
