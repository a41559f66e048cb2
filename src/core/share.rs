//! Compact share codes for schemas
//!
//! `JSON -> raw deflate -> base64 (URL-safe, unpadded)`. Decoding repairs
//! schemas that arrive without identifiers.

use std::io::{Read, Write};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use crate::core::identity::assign_identities;
use crate::core::schema::Schema;

/// Upper bound on the inflated payload
pub const MAX_DECODED_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("Share code is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Share code could not be (de)compressed: {0}")]
    Compression(#[from] std::io::Error),

    #[error("Share code does not contain a valid schema: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Share code expands beyond {MAX_DECODED_BYTES} bytes")]
    TooLarge,
}

pub fn encode(schema: &Schema) -> Result<String, ShareError> {
    let json = serde_json::to_vec(schema)?;
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;
    Ok(URL_SAFE_NO_PAD.encode(compressed))
}

pub fn decode(code: &str) -> Result<Schema, ShareError> {
    let compressed = URL_SAFE_NO_PAD.decode(code.trim())?;
    let mut json = Vec::new();
    DeflateDecoder::new(compressed.as_slice())
        .take(MAX_DECODED_BYTES + 1)
        .read_to_end(&mut json)?;
    if json.len() as u64 > MAX_DECODED_BYTES {
        return Err(ShareError::TooLarge);
    }

    let schema: Schema = serde_json::from_slice(&json)?;
    if schema.has_missing_identities() {
        tracing::debug!("Share code lacks identifiers, assigning fresh ones");
        return Ok(assign_identities(schema));
    }
    Ok(schema)
}
