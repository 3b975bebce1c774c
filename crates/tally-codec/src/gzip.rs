//! gzip content encoding.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::{CodecError, CodecResult};

/// Value of `Content-Encoding` / `Accept-Encoding` for this codec.
pub const GZIP: &str = "gzip";

pub fn compress(body: &[u8]) -> CodecResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2 + 32), Compression::default());
    encoder.write_all(body)?;
    Ok(encoder.finish()?)
}

/// Inflate `body`, refusing output larger than `limit` bytes.
pub fn decompress(body: &[u8], limit: usize) -> CodecResult<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(body)
        .take(limit as u64 + 1)
        .read_to_end(&mut out)?;
    if out.len() > limit {
        return Err(CodecError::TooLarge { limit });
    }
    Ok(out)
}

/// True if a header value such as `gzip, deflate;q=0.5` lists gzip.
pub fn accepts_gzip(header: &str) -> bool {
    header
        .split(',')
        .any(|part| part.split(';').next().is_some_and(|enc| enc.trim().eq_ignore_ascii_case(GZIP)))
}
