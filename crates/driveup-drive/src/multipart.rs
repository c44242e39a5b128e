//! `multipart/related` payloads for the Drive upload endpoint
//!
//! The body has two parts joined by a per-request boundary: JSON metadata
//! (name, media type, parent folder) and the file content as base64.

use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::write::EncoderStringWriter;
use serde_json::json;
use uuid::Uuid;

/// Bytes fed to the encoder per write
pub const ENCODE_CHUNK_SIZE: usize = 8 * 1024;

/// Encodes `data` as standard base64, feeding the encoder in bounded chunks
///
/// The encoder carries partial 3-byte groups between writes, so the output is
/// identical to a single-shot encode.
pub fn encode_base64_chunked(data: &[u8]) -> std::io::Result<String> {
    let mut encoder = EncoderStringWriter::new(&STANDARD);
    for chunk in data.chunks(ENCODE_CHUNK_SIZE) {
        encoder.write_all(chunk)?;
    }
    Ok(encoder.into_inner())
}

/// A fully assembled multipart request body
#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    body: String,
}

impl MultipartBody {
    /// Builds the body for uploading `data` as `name` into folder `parent_id`
    pub fn build(name: &str, mime_type: &str, parent_id: &str, data: &[u8]) -> std::io::Result<Self> {
        Self::with_boundary(new_boundary(), name, mime_type, parent_id, data)
    }

    /// Builds the body with an explicit boundary marker
    pub fn with_boundary(
        boundary: String,
        name: &str,
        mime_type: &str,
        parent_id: &str,
        data: &[u8],
    ) -> std::io::Result<Self> {
        let metadata = json!({
            "name": name,
            "mimeType": mime_type,
            "parents": [parent_id],
        });
        let encoded = encode_base64_chunked(data)?;

        let mut body = String::with_capacity(encoded.len() + 512);
        body.push_str(&format!("--{}\r\n", boundary));
        body.push_str("Content-Type: application/json; charset=UTF-8\r\n\r\n");
        body.push_str(&metadata.to_string());
        body.push_str(&format!("\r\n--{}\r\n", boundary));
        body.push_str(&format!("Content-Type: {}\r\n", mime_type));
        body.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
        body.push_str(&encoded);
        body.push_str(&format!("\r\n--{}--", boundary));

        Ok(Self { boundary, body })
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header
    pub fn content_type(&self) -> String {
        format!("multipart/related; boundary={}", self.boundary)
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }
}

fn new_boundary() -> String {
    format!("driveup_{}", Uuid::new_v4().simple())
}
