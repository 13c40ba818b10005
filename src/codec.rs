//! Reversible text compression for persisted cache data.
//!
//! [`DeflateCodec`] writes a tagged envelope so that its output can always
//! be decoded: `z:` + base64(zlib(text)) when compression worked, `p:` +
//! text when it did not. Untagged input decodes to itself, so plain JSON
//! written by [`PassthroughCodec`] can be read back by either codec.

use std::io::{Read, Write};

use base64::{Engine, engine::general_purpose::STANDARD};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use thiserror::Error;
use tracing::warn;

const DEFLATE_TAG: &str = "z:";
const PLAIN_TAG: &str = "p:";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("compressed payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("compressed payload could not be inflated: {0}")]
    Inflate(#[from] std::io::Error),
}

/// String-to-string codec used before writing to durable storage.
///
/// `decompress(compress(x)) == x` for every `x`, including `""`.
pub trait TextCodec {
    fn compress(&self, text: &str) -> String;

    fn decompress(&self, text: &str) -> Result<String, CodecError>;
}

/// Identity codec; used when no compressor is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCodec;

impl TextCodec for PassthroughCodec {
    fn compress(&self, text: &str) -> String {
        text.to_string()
    }

    fn decompress(&self, text: &str) -> Result<String, CodecError> {
        Ok(text.to_string())
    }
}

/// zlib + base64 codec.
#[derive(Debug, Clone, Copy)]
pub struct DeflateCodec {
    level: Compression,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl DeflateCodec {
    /// `level` is clamped to zlib's 0..=9.
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    fn deflate(&self, text: &str) -> std::io::Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(text.as_bytes())?;
        encoder.finish()
    }

    fn inflate(bytes: &[u8]) -> Result<String, CodecError> {
        let mut decoder = ZlibDecoder::new(bytes);
        let mut text = String::new();
        decoder.read_to_string(&mut text)?;
        Ok(text)
    }
}

impl TextCodec for DeflateCodec {
    fn compress(&self, text: &str) -> String {
        match self.deflate(text) {
            Ok(bytes) => format!("{DEFLATE_TAG}{}", STANDARD.encode(bytes)),
            Err(err) => {
                warn!(error = %err, "compression unavailable, storing plain text");
                format!("{PLAIN_TAG}{text}")
            }
        }
    }

    fn decompress(&self, text: &str) -> Result<String, CodecError> {
        if let Some(encoded) = text.strip_prefix(DEFLATE_TAG) {
            let bytes = STANDARD.decode(encoded)?;
            Self::inflate(&bytes)
        } else if let Some(plain) = text.strip_prefix(PLAIN_TAG) {
            Ok(plain.to_string())
        } else {
            Ok(text.to_string())
        }
    }
}
