use std::io::Write;

use crucible_types::SignedBidSubmission;
use flate2::{write::GzEncoder, Compression};
use ssz::Encode;

use crate::error::RelayError;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const SSZ_CONTENT_TYPE: &str = "application/octet-stream";
pub const GZIP_CONTENT_ENCODING: &str = "gzip";

/// Request body ready to be sent to a relay.
#[derive(Debug)]
pub struct EncodedBody {
    pub body: Vec<u8>,
    pub content_type: &'static str,
    pub content_encoding: Option<&'static str>,
}

pub fn encode_submission(
    submission: &SignedBidSubmission,
    ssz: bool,
    gzip: bool,
) -> Result<EncodedBody, RelayError> {
    let (body, content_type) = if ssz {
        (submission.as_ssz_bytes(), SSZ_CONTENT_TYPE)
    } else {
        let body =
            serde_json::to_vec(submission).map_err(|e| RelayError::Encoding(e.to_string()))?;
        (body, JSON_CONTENT_TYPE)
    };

    if !gzip {
        return Ok(EncodedBody { body, content_type, content_encoding: None });
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&body).map_err(|e| RelayError::Encoding(e.to_string()))?;
    let body = encoder.finish().map_err(|e| RelayError::Encoding(e.to_string()))?;

    Ok(EncodedBody { body, content_type, content_encoding: Some(GZIP_CONTENT_ENCODING) })
}
