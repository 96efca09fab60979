//! Content-type driven codec registry.
//!
//! Maps a `Content-Type` header to the functions that turn request bodies
//! into [`Content`] and back. Lookup ignores directives (`; charset=...`).

mod media_type;

pub use media_type::MediaType;

use serde_json::{Map, Value};

use crate::models::Content;

/// Content type assumed for writes that carry no `Content-Type` header.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Errors raised by codec lookup and (de)serialization.
#[derive(Debug)]
pub enum CodecError {
    UnsupportedContentType(String),
    Decode(serde_json::Error),
    ContentMismatch { expected: &'static str },
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::UnsupportedContentType(ct) => write!(
                f,
                "unsupported content-type, no mapping implementation: {}",
                ct
            ),
            CodecError::Decode(e) => write!(f, "malformed payload: {}", e),
            CodecError::ContentMismatch { expected } => write!(
                f,
                "content does not match codec: expected {} content",
                expected
            ),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Decode(e)
    }
}

/// Turns a request body into storable content.
pub type Decoder = fn(&[u8]) -> Result<Content, CodecError>;

/// Turns stored content into a response body.
pub type Encoder = fn(&Content) -> Result<Vec<u8>, CodecError>;

/// The codecs known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Json,
    OctetStream,
}

impl Codec {
    /// Resolves the codec for a header value, ignoring directives.
    pub fn for_content_type(content_type: &str) -> Result<Self, CodecError> {
        match MediaType::parse(content_type) {
            Some(mt) if mt.is_json() => Ok(Codec::Json),
            Some(mt) if mt.is_octet_stream() => Ok(Codec::OctetStream),
            _ => Err(CodecError::UnsupportedContentType(content_type.to_string())),
        }
    }

    pub fn decoder(self) -> Decoder {
        match self {
            Codec::Json => decode_json,
            Codec::OctetStream => decode_octet_stream,
        }
    }

    pub fn encoder(self) -> Encoder {
        match self {
            Codec::Json => encode_json,
            Codec::OctetStream => encode_octet_stream,
        }
    }
}

pub fn decoder_for(content_type: &str) -> Result<Decoder, CodecError> {
    Codec::for_content_type(content_type).map(Codec::decoder)
}

pub fn encoder_for(content_type: &str) -> Result<Encoder, CodecError> {
    Codec::for_content_type(content_type).map(Codec::encoder)
}

fn decode_json(body: &[u8]) -> Result<Content, CodecError> {
    let map: Map<String, Value> = serde_json::from_slice(body)?;
    Ok(Content::Json(map))
}

fn encode_json(content: &Content) -> Result<Vec<u8>, CodecError> {
    match content {
        Content::Json(map) => Ok(serde_json::to_vec(map)?),
        Content::Binary(_) => Err(CodecError::ContentMismatch { expected: "JSON" }),
    }
}

fn decode_octet_stream(body: &[u8]) -> Result<Content, CodecError> {
    Ok(Content::Binary(body.to_vec()))
}

fn encode_octet_stream(content: &Content) -> Result<Vec<u8>, CodecError> {
    match content {
        Content::Binary(bytes) => Ok(bytes.clone()),
        Content::Json(_) => Err(CodecError::ContentMismatch { expected: "binary" }),
    }
}
